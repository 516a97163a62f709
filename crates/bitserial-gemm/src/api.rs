//! High-level entry points.

use crate::core::context::GemmContext;
use crate::error::{BitSerialError, Result};
use crate::matrix::Layout;

/// One-shot bit-serial matrix multiplication for unsigned operands of a
/// shared precision.
///
/// `lhs` is row-major `lhs_rows × depth`; `rhs_t` is the right-hand
/// operand **already transposed**, row-major `rhs_rows × depth` (so the
/// logical RHS is `depth × rhs_rows`). The result is the **transposed**
/// product: row-major `rhs_rows × lhs_rows`.
///
/// # Example
///
/// ```
/// use bitserial_gemm::bitserial_matmul;
///
/// let lhs = [1u8, 2, 3, 0, 1, 2]; // 2x3, 2-bit values
/// let rhs_t = [1u8, 0, 1, 2, 1, 0]; // RHS transposed, 2x3
///
/// let ct = bitserial_matmul(&lhs, 2, 3, &rhs_t, 2, 2).unwrap();
/// assert_eq!(ct, [4, 2, 4, 1]); // logical product [[4,4],[2,1]], transposed
/// ```
pub fn bitserial_matmul(
    lhs: &[u8],
    lhs_rows: usize,
    depth: usize,
    rhs_t: &[u8],
    rhs_rows: usize,
    nbits: usize,
) -> Result<Vec<i32>> {
    BitSerialGemm::new(lhs_rows, depth, rhs_rows)
        .lhs_bits(nbits)
        .rhs_bits(nbits)
        .execute(lhs, rhs_t)
}

/// Builder for configuring a bit-serial GEMM.
///
/// Per-operand precision and signedness default to 8-bit unsigned. A
/// 1-bit signed operand uses the bipolar ({−1, +1}) encoding.
///
/// # Example
///
/// ```
/// use bitserial_gemm::BitSerialGemm;
///
/// // 4-bit signed LHS (values two's-complement in the low 4 bits)
/// // against 2-bit unsigned RHS.
/// let lhs = [0b1111u8, 2]; // [-1, 2]
/// let rhs_t = [3u8, 1];
///
/// let ct = BitSerialGemm::new(1, 2, 1)
///     .lhs_bits(4)
///     .lhs_signed(true)
///     .rhs_bits(2)
///     .execute(&lhs, &rhs_t)
///     .unwrap();
/// assert_eq!(ct, [-1]); // (-1)*3 + 2*1
/// ```
#[derive(Debug, Clone)]
pub struct BitSerialGemm {
    lhs_rows: usize,
    depth: usize,
    rhs_rows: usize,
    lhs_bits: usize,
    rhs_bits: usize,
    lhs_signed: bool,
    rhs_signed: bool,
}

impl BitSerialGemm {
    /// Create a builder for `lhs_rows × depth × rhs_rows`.
    pub fn new(lhs_rows: usize, depth: usize, rhs_rows: usize) -> Self {
        Self {
            lhs_rows,
            depth,
            rhs_rows,
            lhs_bits: 8,
            rhs_bits: 8,
            lhs_signed: false,
            rhs_signed: false,
        }
    }

    /// LHS precision in bits.
    pub fn lhs_bits(mut self, bits: usize) -> Self {
        self.lhs_bits = bits;
        self
    }

    /// RHS precision in bits.
    pub fn rhs_bits(mut self, bits: usize) -> Self {
        self.rhs_bits = bits;
        self
    }

    /// Interpret the LHS top bit-plane as negative (two's complement;
    /// bipolar when 1-bit).
    pub fn lhs_signed(mut self, signed: bool) -> Self {
        self.lhs_signed = signed;
        self
    }

    /// Interpret the RHS top bit-plane as negative (two's complement;
    /// bipolar when 1-bit).
    pub fn rhs_signed(mut self, signed: bool) -> Self {
        self.rhs_signed = signed;
        self
    }

    fn context(&self, lhs: &[u8], rhs_t: &[u8]) -> Result<GemmContext> {
        if lhs.len() != self.lhs_rows * self.depth {
            return Err(BitSerialError::BufferSize {
                operand: "lhs",
                expected: self.lhs_rows * self.depth,
                actual: lhs.len(),
            });
        }
        if rhs_t.len() != self.rhs_rows * self.depth {
            return Err(BitSerialError::BufferSize {
                operand: "rhs",
                expected: self.rhs_rows * self.depth,
                actual: rhs_t.len(),
            });
        }

        let mut ctx = GemmContext::alloc(
            self.lhs_rows,
            self.depth,
            self.rhs_rows,
            self.lhs_bits,
            self.rhs_bits,
            self.lhs_signed,
            self.rhs_signed,
        )?;
        ctx.lhs.import(lhs, Layout::RowMajor);
        ctx.rhs.import(rhs_t, Layout::RowMajor);
        Ok(ctx)
    }

    /// Pack both operands, multiply, and return the transposed product
    /// (row-major `rhs_rows × lhs_rows`).
    pub fn execute(&self, lhs: &[u8], rhs_t: &[u8]) -> Result<Vec<i32>> {
        let mut ctx = self.context(lhs, rhs_t)?;
        ctx.gemm();
        Ok(ctx.result().to_vec())
    }

    /// Like [`execute`](Self::execute), with RHS row panels distributed
    /// across the rayon thread pool. The result is identical.
    #[cfg(feature = "parallel")]
    pub fn execute_parallel(&self, lhs: &[u8], rhs_t: &[u8]) -> Result<Vec<i32>> {
        let mut ctx = self.context(lhs, rhs_t)?;
        ctx.gemm_parallel();
        Ok(ctx.result().to_vec())
    }
}
