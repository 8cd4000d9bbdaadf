//! OpenCL C source generation.
//!
//! [`render`] turns a [`KernelSignature`] into kernel source text and an
//! entry-point name. It never touches a device, so the generated text can be
//! inspected in unit tests.
//!
//! Argument layouts (every length argument is a `ulong`):
//!
//! | kind    | arguments                                  | work items |
//! |---------|--------------------------------------------|------------|
//! | unary   | `a`, `out`, `n`                            | `n`        |
//! | binary  | `a`, `b`, `out`, `n`                       | `n`        |
//! | select  | `pred`, `a`, `b`, `out`, `n`               | `n`        |
//! | copy    | `src`, `dst`, `n`                          | `n`        |
//! | reduce  | `data`, `remaining`, `stride`              | `stride`   |
//! | compact | `src`, `pred`, `dst`, `counter`, `n`       | `n`        |
//! | rotate  | `src`, `dst`, `shift`, `n`                 | `n`        |
//! | iota    | `dst`, `n`                                 | `n`        |

use std::fmt;

use crate::dtype::ScalarType;
use crate::ops::Operation;

/// What a kernel does, independent of element types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KernelKind {
    Unary(Operation),
    Binary(Operation),
    /// `out[i] = pred[i] ? a[i] : b[i]`
    Select,
    Copy,
    /// One in-place folding pass of a tree reduction
    Reduce(Operation),
    /// Atomic-counter stream compaction
    Compact,
    /// `dst[(i + shift) % n] = src[i]`
    Rotate,
    /// `dst[i] = i`
    Iota,
}

impl KernelKind {
    fn entry_stem(self) -> String {
        match self {
            KernelKind::Unary(op) => format!("unary_{}", op.name()),
            KernelKind::Binary(op) => format!("binary_{}", op.name()),
            KernelKind::Select => "select".to_string(),
            KernelKind::Copy => "copy".to_string(),
            KernelKind::Reduce(op) => format!("reduce_{}", op.name()),
            KernelKind::Compact => "compact".to_string(),
            KernelKind::Rotate => "rotate".to_string(),
            KernelKind::Iota => "iota".to_string(),
        }
    }
}

/// Kernel kind plus the ordered element types taking part in it
/// (inputs first, output last). Used as the kernel cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KernelSignature {
    pub kind: KernelKind,
    pub types: Vec<ScalarType>,
}

impl KernelSignature {
    pub fn unary(op: Operation, input: ScalarType, output: ScalarType) -> Self {
        debug_assert_eq!(op.arity(), 1, "{op} is not unary");
        Self {
            kind: KernelKind::Unary(op),
            types: vec![input, output],
        }
    }

    pub fn binary(op: Operation, lhs: ScalarType, rhs: ScalarType, output: ScalarType) -> Self {
        debug_assert_eq!(op.arity(), 2, "{op} is not binary");
        Self {
            kind: KernelKind::Binary(op),
            types: vec![lhs, rhs, output],
        }
    }

    pub fn select(ty: ScalarType) -> Self {
        Self {
            kind: KernelKind::Select,
            types: vec![ScalarType::Bool, ty, ty, ty],
        }
    }

    pub fn copy(ty: ScalarType) -> Self {
        Self {
            kind: KernelKind::Copy,
            types: vec![ty, ty],
        }
    }

    pub fn reduce(op: Operation, ty: ScalarType) -> Self {
        debug_assert!(op.is_associative(), "{op} cannot fold a reduction");
        Self {
            kind: KernelKind::Reduce(op),
            types: vec![ty],
        }
    }

    pub fn compact(ty: ScalarType) -> Self {
        Self {
            kind: KernelKind::Compact,
            types: vec![ty, ScalarType::Bool, ty],
        }
    }

    pub fn rotate(ty: ScalarType) -> Self {
        Self {
            kind: KernelKind::Rotate,
            types: vec![ty, ty],
        }
    }

    pub fn iota(ty: ScalarType) -> Self {
        Self {
            kind: KernelKind::Iota,
            types: vec![ty],
        }
    }

    /// Entry-point name, unique per signature.
    pub fn entry_name(&self) -> String {
        let mut name = format!("pv_{}", self.kind.entry_stem());
        for ty in &self.types {
            name.push('_');
            name.push_str(ty.tag());
        }
        name
    }
}

impl fmt::Display for KernelSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.entry_name())
    }
}

/// Rendered kernel: the signature it implements, its entry name and source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelSource {
    pub signature: KernelSignature,
    pub entry: String,
    pub source: String,
}

/// Renders the OpenCL C source for `signature`.
pub fn render(signature: &KernelSignature) -> KernelSource {
    let entry = signature.entry_name();
    let cl = |i: usize| signature.types[i].cl_name();

    let source = match signature.kind {
        KernelKind::Unary(op) => format!(
            r#"
__kernel void {entry}(
    __global const {t_a}* aa,
    __global {t_b}* bb,
    const ulong n
) {{
    const size_t i = get_global_id(0);
    if (i >= n) return;
    const {t_a} a = aa[i];
    {t_b} b;
    {fragment}
    bb[i] = b;
}}
"#,
            t_a = cl(0),
            t_b = cl(1),
            fragment = op.fragment(),
        ),
        KernelKind::Binary(op) => format!(
            r#"
__kernel void {entry}(
    __global const {t_a}* aa,
    __global const {t_b}* bb,
    __global {t_c}* cc,
    const ulong n
) {{
    const size_t i = get_global_id(0);
    if (i >= n) return;
    const {t_a} a = aa[i];
    const {t_b} b = bb[i];
    {t_c} c;
    {fragment}
    cc[i] = c;
}}
"#,
            t_a = cl(0),
            t_b = cl(1),
            t_c = cl(2),
            fragment = op.fragment(),
        ),
        KernelKind::Select => format!(
            r#"
__kernel void {entry}(
    __global const {t_p}* pred,
    __global const {t}* aa,
    __global const {t}* bb,
    __global {t}* out,
    const ulong n
) {{
    const size_t i = get_global_id(0);
    if (i >= n) return;
    out[i] = pred[i] ? aa[i] : bb[i];
}}
"#,
            t_p = cl(0),
            t = cl(1),
        ),
        KernelKind::Copy => format!(
            r#"
__kernel void {entry}(
    __global const {t}* src,
    __global {t}* dst,
    const ulong n
) {{
    const size_t i = get_global_id(0);
    if (i >= n) return;
    dst[i] = src[i];
}}
"#,
            t = cl(0),
        ),
        KernelKind::Reduce(op) => format!(
            r#"
__kernel void {entry}(
    __global {t}* data,
    const ulong remaining,
    const ulong stride
) {{
    const size_t i = get_global_id(0);
    if (i >= stride) return;
    {t} acc = data[i];
    for (ulong j = i + stride; j < remaining; j += stride) {{
        const {t} a = acc;
        const {t} b = data[j];
        {t} c;
        {fragment}
        acc = c;
    }}
    data[i] = acc;
}}
"#,
            t = cl(0),
            fragment = op.fragment(),
        ),
        KernelKind::Compact => format!(
            r#"
#pragma OPENCL EXTENSION cl_khr_global_int32_base_atomics : enable

__kernel void {entry}(
    __global const {t}* src,
    __global const {t_p}* pred,
    __global {t}* dst,
    __global uint* counter,
    const ulong n
) {{
    const size_t i = get_global_id(0);
    if (i >= n) return;
    if (pred[i]) {{
        const uint slot = atomic_inc(counter);
        dst[slot] = src[i];
    }}
}}
"#,
            t = cl(0),
            t_p = cl(1),
        ),
        KernelKind::Rotate => format!(
            r#"
__kernel void {entry}(
    __global const {t}* src,
    __global {t}* dst,
    const ulong shift,
    const ulong n
) {{
    const size_t i = get_global_id(0);
    if (i >= n) return;
    dst[(i + shift) % n] = src[i];
}}
"#,
            t = cl(0),
        ),
        KernelKind::Iota => format!(
            r#"
__kernel void {entry}(
    __global {t}* dst,
    const ulong n
) {{
    const size_t i = get_global_id(0);
    if (i >= n) return;
    dst[i] = ({t})i;
}}
"#,
            t = cl(0),
        ),
    };

    KernelSource {
        signature: signature.clone(),
        entry,
        source,
    }
}
