//! Error types for context allocation and the packing surface.

use thiserror::Error;

/// Errors reported by the fallible (user-facing) API.
///
/// Internal invariants of the kernel and planner are programmer errors and
/// are enforced by assertion instead.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BitSerialError {
    /// Requested precision outside `1..=64` bits.
    #[error("precision must be in 1..=64 bits, got {0}")]
    UnsupportedPrecision(usize),

    /// A GEMM dimension was zero.
    #[error("matrix dimensions must be non-zero: lhs_rows={lhs_rows}, depth={depth}, rhs_rows={rhs_rows}")]
    ZeroDimension {
        lhs_rows: usize,
        depth: usize,
        rhs_rows: usize,
    },

    /// A dense buffer does not match its declared shape.
    #[error("dense buffer length mismatch for {operand}: expected {expected} elements, got {actual}")]
    BufferSize {
        operand: &'static str,
        expected: usize,
        actual: usize,
    },
}

/// Result type for bit-serial GEMM operations.
pub type Result<T> = std::result::Result<T, BitSerialError>;
