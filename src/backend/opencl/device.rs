//! OpenCL device

use std::sync::Arc;

use log::debug;
use ocl::core::{DeviceInfo, DeviceInfoResult};
use ocl::{Context as OclContext, Device as OclDevice, DeviceType, Platform, Program as OclProgram, Queue};

use super::buffer::OpenCLBuffer;
use super::kernel::OpenCLProgram;
use crate::backend::{Buffer, Device, KernelArg, Program};
use crate::config::DeviceClass;
use crate::error::{Error, Result};
use crate::renderer::KernelSource;

/// OpenCL device
///
/// Holds the selected device with its own context and in-order command
/// queue.
pub struct OpenCLDevice {
    device: OclDevice,
    context: OclContext,
    queue: Queue,
    class: DeviceClass,
}

impl OpenCLDevice {
    /// Whether any platform exposes at least one device.
    pub fn is_available() -> bool {
        Platform::list().into_iter().any(|platform| {
            OclDevice::list_all(platform)
                .map(|devices| !devices.is_empty())
                .unwrap_or(false)
        })
    }

    /// Opens the first device of `class` found on any platform.
    pub fn open(class: DeviceClass) -> Result<Self> {
        let device_type = match class {
            DeviceClass::Gpu => DeviceType::GPU,
            DeviceClass::Cpu => DeviceType::CPU,
            DeviceClass::Host => {
                return Err(Error::DeviceUnavailable(
                    "the host class has no OpenCL device".to_string(),
                ));
            }
        };

        for platform in Platform::list() {
            let devices = match OclDevice::list(platform, Some(device_type)) {
                Ok(devices) => devices,
                Err(e) => {
                    debug!("skipping platform {platform:?}: {e}");
                    continue;
                }
            };
            if let Some(device) = devices.first().copied() {
                return Self::with_device(platform, device, class);
            }
        }

        Err(Error::DeviceUnavailable(format!("no OpenCL {class} device found")))
    }

    fn with_device(platform: Platform, device: OclDevice, class: DeviceClass) -> Result<Self> {
        let unavailable = |e: ocl::Error| Error::DeviceUnavailable(e.to_string());
        let context = OclContext::builder()
            .platform(platform)
            .devices(device)
            .build()
            .map_err(unavailable)?;
        let queue = Queue::new(&context, device, None).map_err(unavailable)?;

        debug!(
            "opened OpenCL {class} device {}",
            device.name().unwrap_or_else(|_| "Unknown".to_string())
        );
        Ok(Self {
            device,
            context,
            queue,
            class,
        })
    }

    fn query_max_alloc(&self) -> usize {
        match self.device.info(DeviceInfo::MaxMemAllocSize) {
            Ok(DeviceInfoResult::MaxMemAllocSize(n)) => usize::try_from(n).unwrap_or(usize::MAX),
            _ => 0,
        }
    }
}

impl Device for OpenCLDevice {
    fn class(&self) -> DeviceClass {
        self.class
    }

    fn name(&self) -> String {
        self.device.name().unwrap_or_else(|_| "Unknown".to_string())
    }

    fn max_alloc_bytes(&self) -> usize {
        self.query_max_alloc()
    }

    fn alloc(&self, bytes: usize) -> Result<Box<dyn Buffer>> {
        if bytes == 0 {
            return Err(Error::BufferAllocation(
                "zero-sized buffers are not supported".to_string(),
            ));
        }
        Ok(Box::new(OpenCLBuffer::allocate(&self.queue, bytes)?))
    }

    fn alloc_from(&self, data: &[u8]) -> Result<Box<dyn Buffer>> {
        let buffer = self.alloc(data.len())?;
        buffer.write(0, data)?;
        Ok(buffer)
    }

    fn build(&self, kernel: &KernelSource, options: &str) -> Result<Arc<dyn Program>> {
        debug!("compiling OpenCL kernel {}", kernel.entry);
        let program = OclProgram::builder()
            .src(kernel.source.as_str())
            .devices(self.device)
            .cmplr_opt(options)
            .build(&self.context)
            .map_err(|e| Error::Compilation {
                entry: kernel.entry.clone(),
                log: e.to_string(),
            })?;

        Ok(Arc::new(OpenCLProgram::new(
            program,
            kernel.signature.clone(),
            kernel.entry.clone(),
        )))
    }

    fn launch(
        &self,
        program: &dyn Program,
        args: &[KernelArg<'_>],
        global_size: usize,
    ) -> Result<()> {
        if global_size == 0 {
            return Ok(());
        }
        let program = program
            .as_any()
            .downcast_ref::<OpenCLProgram>()
            .ok_or_else(|| Error::Launch {
                entry: program.entry().to_string(),
                message: "program was not built for an OpenCL device".to_string(),
            })?;
        program.enqueue(&self.queue, args, global_size)
    }
}

// Safety: OpenCL context and queue are thread-safe
unsafe impl Send for OpenCLDevice {}
unsafe impl Sync for OpenCLDevice {}
