//! Bit-serial integer matrix multiplication.
//!
//! This crate multiplies low-precision integer matrices by decomposing
//! each operand into **bit-planes** — one binary matrix per bit of
//! precision — and assembling the product from binary matrix products,
//! each computed as `AND` + popcount reductions over 64-bit words:
//!
//! ```text
//! A · Bᵀ = Σ_{lbit, rbit}  ±2^(lbit+rbit) · (A_lbit · B_rbit)
//! ```
//!
//! Per-operand precision (1..=64 bits) and signedness are independent;
//! a 1-bit signed operand uses the *bipolar* encoding over {−1, +1}.
//!
//! # Conventions
//!
//! - The RHS is supplied **already transposed**: a logical
//!   `depth × output_cols` matrix is packed as `output_cols` rows of
//!   `depth` columns.
//! - The output is produced **transposed**: row-major
//!   `output_cols × output_rows`, logical dimensions only.
//!
//! # Quick Start
//!
//! ```
//! use bitserial_gemm::bitserial_matmul;
//!
//! let lhs = [1u8, 2, 3, 0, 1, 2]; // 2x3, 2-bit values
//! let rhs_t = [1u8, 0, 1, 2, 1, 0]; // RHS transposed, 2x3
//!
//! let ct = bitserial_matmul(&lhs, 2, 3, &rhs_t, 2, 2).unwrap();
//! assert_eq!(ct, [4, 2, 4, 1]);
//! ```
//!
//! For mixed precision or signed operands, use the [`BitSerialGemm`]
//! builder; for repeated multiplications over the same shapes, allocate a
//! [`GemmContext`] once and re-import operands between calls.
//!
//! # Architecture
//!
//! | Component | Module | Responsibility |
//! |-----------|--------|----------------|
//! | Bit-packer | [`matrix`] | dense ↔ bit-plane conversion |
//! | Block planner | [`tiling`](crate::core::tiling) | cache/register block shapes |
//! | Binary kernel | [`kernel`](crate::core::kernel) | one bit-plane pair product |
//! | Bit-serial driver | [`gemm`](crate::core::gemm) | plane iteration, scales, signs |
//! | Context | [`context`](crate::core::context) | buffer ownership and allocation |
//! | Dispatch | [`simd`] | kernel choice at context creation |
//!
//! # Features
//!
//! - `parallel`: rayon-based driver that distributes RHS row panels
//!   across threads (`BitSerialGemm::execute_parallel`).

pub mod api;
pub mod core;
pub mod error;
pub mod matrix;
pub mod simd;

pub use crate::api::{bitserial_matmul, BitSerialGemm};
pub use crate::core::{gemm, gemm_naive, BinaryKernel, GemmContext, PortableKernel};
pub use crate::error::{BitSerialError, Result};
pub use crate::matrix::{align_to, BitSerialMatrix, Layout};
pub use crate::simd::{select_kernel, simd_level, SimdLevel, WideKernel};
