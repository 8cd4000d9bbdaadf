//! Execution runtime: one device, its kernel cache and configuration.
//!
//! Arrays hold their runtime through an `Arc`. Process-wide runtimes for the
//! GPU and CPU device classes are created on first use; when no device of
//! the requested class can be opened the next class in the fallback chain is
//! tried, ending with the in-process host device.

use std::fmt;
use std::sync::{Arc, OnceLock};

use log::{info, trace, warn};

use crate::backend::{Device, HostDevice, KernelArg, Program};
use crate::cache::KernelCache;
use crate::config::{DeviceClass, RuntimeConfig};
use crate::error::Result;
use crate::renderer::{KernelSignature, render};

static GPU_RUNTIME: OnceLock<Arc<Runtime>> = OnceLock::new();
static CPU_RUNTIME: OnceLock<Arc<Runtime>> = OnceLock::new();
static GLOBAL_RUNTIME: OnceLock<Arc<Runtime>> = OnceLock::new();

pub struct Runtime {
    device: Box<dyn Device>,
    cache: KernelCache,
    config: RuntimeConfig,
}

impl Runtime {
    /// Creates a runtime on an explicit device.
    pub fn new(device: Box<dyn Device>, config: RuntimeConfig) -> Arc<Self> {
        info!(
            "created {} runtime on device '{}'",
            device.class(),
            device.name()
        );
        Arc::new(Self {
            device,
            cache: KernelCache::new(),
            config,
        })
    }

    /// Fresh runtime on the host device with default configuration.
    pub fn host() -> Arc<Self> {
        Self::host_with_config(RuntimeConfig::default())
    }

    pub fn host_with_config(config: RuntimeConfig) -> Arc<Self> {
        Self::new(Box::new(HostDevice::new()), config)
    }

    /// Opens a fresh runtime for `class`, falling back along the chain.
    pub fn open(class: DeviceClass, config: RuntimeConfig) -> Arc<Self> {
        Self::new(open_device(class), config)
    }

    /// Process-wide runtime preferring a GPU device.
    pub fn gpu() -> Arc<Self> {
        Arc::clone(GPU_RUNTIME.get_or_init(|| Self::open(DeviceClass::Gpu, RuntimeConfig::from_env())))
    }

    /// Process-wide runtime preferring a CPU device.
    pub fn cpu() -> Arc<Self> {
        Arc::clone(CPU_RUNTIME.get_or_init(|| Self::open(DeviceClass::Cpu, RuntimeConfig::from_env())))
    }

    /// Process-wide runtime of the class named by `PARVEC_DEVICE` (GPU by default).
    ///
    /// The environment is read on the first call only; later changes to it
    /// do not move arrays to another runtime.
    pub fn global() -> Arc<Self> {
        Arc::clone(GLOBAL_RUNTIME.get_or_init(|| {
            let config = RuntimeConfig::from_env();
            match config.preferred_class {
                DeviceClass::Gpu => Self::gpu(),
                DeviceClass::Cpu => Self::cpu(),
                DeviceClass::Host => Self::host_with_config(config),
            }
        }))
    }

    pub fn device(&self) -> &dyn Device {
        self.device.as_ref()
    }

    /// Class of the device actually in use, after any fallback.
    pub fn class(&self) -> DeviceClass {
        self.device.class()
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Number of compiled kernels held by the cache.
    pub fn cached_kernels(&self) -> usize {
        self.cache.len()
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Resolves the program for `sig`, rendering and building it on first use.
    pub fn kernel(&self, sig: &KernelSignature) -> Result<Arc<dyn Program>> {
        self.cache.get_or_insert_with(sig, || {
            let source = render(sig);
            self.device.build(&source, &self.config.build_options)
        })
    }

    /// Resolves `sig` and launches it over `global_size` work items.
    pub(crate) fn launch(
        &self,
        sig: &KernelSignature,
        args: &[KernelArg<'_>],
        global_size: usize,
    ) -> Result<()> {
        if global_size == 0 {
            return Ok(());
        }
        let program = self.kernel(sig)?;
        trace!("launch {sig} with {} arguments", args.len());
        self.device.launch(program.as_ref(), args, global_size)
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("class", &self.device.class())
            .field("device", &self.device.name())
            .field("cached_kernels", &self.cache.len())
            .field("config", &self.config)
            .finish()
    }
}

fn fallback_chain(class: DeviceClass) -> &'static [DeviceClass] {
    match class {
        DeviceClass::Gpu => &[DeviceClass::Gpu, DeviceClass::Cpu],
        DeviceClass::Cpu => &[DeviceClass::Cpu, DeviceClass::Gpu],
        DeviceClass::Host => &[],
    }
}

fn open_device(class: DeviceClass) -> Box<dyn Device> {
    for &candidate in fallback_chain(class) {
        match open_accelerator(candidate) {
            Ok(device) => {
                if candidate != class {
                    warn!("no {class} device available, using {candidate} device instead");
                }
                return device;
            }
            Err(e) => warn!("could not open {candidate} device: {e}"),
        }
    }
    if class != DeviceClass::Host {
        warn!("no OpenCL device available for {class}, using the host device");
    }
    Box::new(HostDevice::new())
}

#[cfg(feature = "opencl")]
fn open_accelerator(class: DeviceClass) -> Result<Box<dyn Device>> {
    let device = crate::backend::OpenCLDevice::open(class)?;
    Ok(Box::new(device))
}

#[cfg(not(feature = "opencl"))]
fn open_accelerator(class: DeviceClass) -> Result<Box<dyn Device>> {
    Err(crate::error::Error::DeviceUnavailable(format!(
        "{class} devices need the `opencl` feature"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dtype::ScalarType;
    use crate::ops::Operation;

    #[test]
    fn test_host_runtime() {
        let runtime = Runtime::host();
        assert_eq!(runtime.class(), DeviceClass::Host);
        assert_eq!(runtime.device().name(), "host");
        assert_eq!(runtime.cached_kernels(), 0);
    }

    #[test]
    fn test_kernel_is_compiled_once() {
        let runtime = Runtime::host();
        let sig = KernelSignature::binary(Operation::Minus, ScalarType::I16, ScalarType::I16, ScalarType::I16);
        let first = runtime.kernel(&sig).unwrap();
        let second = runtime.kernel(&sig).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(runtime.cached_kernels(), 1);

        runtime.clear_cache();
        assert_eq!(runtime.cached_kernels(), 0);
    }

    #[test]
    fn test_failed_build_is_surfaced() {
        let runtime = Runtime::host();
        let sig = KernelSignature::binary(Operation::LeftShift, ScalarType::F32, ScalarType::F32, ScalarType::F32);
        assert!(runtime.kernel(&sig).is_err());
        assert_eq!(runtime.cached_kernels(), 0);
    }

    #[test]
    fn test_fallback_chain_order() {
        assert_eq!(fallback_chain(DeviceClass::Gpu), [DeviceClass::Gpu, DeviceClass::Cpu]);
        assert_eq!(fallback_chain(DeviceClass::Cpu), [DeviceClass::Cpu, DeviceClass::Gpu]);
        assert!(fallback_chain(DeviceClass::Host).is_empty());
    }

    #[test]
    fn test_open_host_never_fails() {
        let runtime = Runtime::open(DeviceClass::Host, RuntimeConfig::default());
        assert_eq!(runtime.class(), DeviceClass::Host);
    }
}
