//! Kernel selection.

use crate::core::kernel::{BinaryKernel, PortableKernel};
use crate::simd::detect::{simd_level, SimdLevel};
use crate::simd::kernels::WideKernel;

/// The kernel for a given capability tier.
pub fn kernel_for(level: SimdLevel) -> &'static dyn BinaryKernel {
    match level {
        SimdLevel::Avx2 | SimdLevel::Neon => &WideKernel,
        SimdLevel::Scalar => &PortableKernel,
    }
}

/// The best kernel for the running CPU.
///
/// Called once per context allocation; the returned kernel is bound into
/// the context for its whole lifetime.
pub fn select_kernel() -> &'static dyn BinaryKernel {
    kernel_for(simd_level())
}
