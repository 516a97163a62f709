//! Kernel selection for the binary GEMM core.
//!
//! The inner product of this library is `popcount(a AND b)` over 64-bit
//! words. How fast that runs depends on the CPU's popcount story:
//!
//! | Architecture | Facility | Kernel |
//! |--------------|----------|--------|
//! | x86_64 + AVX2 | vectorizable word AND + popcount | [`WideKernel`] |
//! | aarch64 | NEON `cnt` | [`WideKernel`] |
//! | anything else | scalar `popcnt`/fallback | [`PortableKernel`](crate::core::PortableKernel) |
//!
//! Selection happens once, at context allocation: [`select_kernel`]
//! inspects the CPU via [`simd_level`] and the chosen kernel is bound into
//! the [`GemmContext`](crate::core::GemmContext). There is no per-call
//! dispatch, and the choice fixes the depth tile — and with it the
//! column alignment of every operand the context allocates.
//!
//! # Module Contents
//!
//! - [`detect`]: CPU capability probing ([`SimdLevel`])
//! - [`dispatch`]: kernel selection ([`select_kernel`], [`kernel_for`])
//! - [`kernels`]: the wide-depth kernel implementation

pub mod detect;
pub mod dispatch;
pub mod kernels;

pub use detect::{simd_level, SimdLevel};
pub use dispatch::{kernel_for, select_kernel};
pub use kernels::WideKernel;
