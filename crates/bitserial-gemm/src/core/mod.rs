//! Core bit-serial GEMM algorithms.
//!
//! The product of two low-precision integer matrices is assembled from
//! binary matrix products, one per bit-plane pair, each computed as
//! AND+popcount inner products over 64-bit words:
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │ for lbit in 0..lhs_bits, rbit in 0..rhs_bits:   (driver)       │
//! │   alpha = ±2^(lbit+rbit)                                       │
//! │   for rhs panel of rhs_block rows:              (cache level)  │
//! │     for lhs block of lhs_block rows:                           │
//! │       for 2x2 output tile:                      (register)     │
//! │         for d in depth words:                                  │
//! │           acc[i,j] += popcount(a_i[d] AND b_j[d])              │
//! │       CT[j,i] += alpha * acc[i,j]                              │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Module Contents
//!
//! - [`context`]: [`GemmContext`] — buffer ownership and allocation
//! - [`gemm`](self::gemm()): the bit-serial driver and [`gemm_naive`]
//!   reference
//! - [`kernel`]: the [`BinaryKernel`] backend trait and portable
//!   microkernel
//! - [`tiling`]: the cache-block planner

pub mod context;
pub mod gemm;
pub mod kernel;
pub mod tiling;

pub use context::GemmContext;
pub use gemm::{gemm, gemm_naive};
pub use kernel::{binary_gemm, BinaryKernel, BlockBounds, OutShape, PortableKernel, RegBlock};
pub use tiling::{compute_block_size, finetune_block_size, plan_blocks, BlockPlan};

#[cfg(feature = "parallel")]
pub use gemm::gemm_parallel;
