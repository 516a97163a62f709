//! Binary GEMM microkernels.
//!
//! A binary kernel computes `CT += alpha * (A · Bᵀ)` where `A` and `B` are
//! single bit-planes packed as rows of 64-bit words and `CT` is an int32
//! accumulator in transposed layout. The inner product of two binary rows
//! is `popcount(a AND b)` summed over the row's words.
//!
//! Two levels of tiling:
//!
//! - **Cache level** ([`binary_gemm`]): iterate RHS row blocks, then LHS
//!   row blocks, so one LHS panel, one RHS panel and their output tile stay
//!   cache-resident.
//! - **Register level** ([`BinaryKernel::gemm_block`]): inside a block,
//!   produce a small grid of output cells at once, sweeping the depth in
//!   word-sized tiles and keeping the partial popcounts in registers.
//!
//! The [`BinaryKernel`] trait is the backend seam: implementations choose
//! the register-tile shape, the cache budget, and the block microkernel.
//! One implementation is bound per [`GemmContext`](crate::core::GemmContext)
//! at allocation time; there is no per-call dispatch.

use crate::core::gemm::plane_weight;
use crate::matrix::BitSerialMatrix;

/// Register-tile shape of a kernel: output cells along the LHS and RHS row
/// dimensions, and the depth tile in 64-bit words.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegBlock {
    pub lhs: usize,
    pub depth: usize,
    pub rhs: usize,
}

/// One cache block's position inside the operand row ranges.
#[derive(Debug, Clone, Copy)]
pub struct BlockBounds {
    pub lhs_start: usize,
    pub lhs_len: usize,
    pub rhs_start: usize,
    pub rhs_len: usize,
}

/// Logical output bounds: cells at or beyond these row counts belong to
/// alignment padding and are never written.
#[derive(Debug, Clone, Copy)]
pub struct OutShape {
    pub lhs_rows: usize,
    pub rhs_rows: usize,
}

/// Backend seam for the binary GEMM core.
///
/// Capabilities: register-tile shape, cache budget, the block microkernel,
/// and the row-sum reduction.
pub trait BinaryKernel: Sync {
    /// Register-tile multiples; cache blocks are always multiples of these.
    fn reg_block(&self) -> RegBlock;

    /// Cache budget in bits for the block planner.
    fn cache_bits(&self) -> usize {
        32 * 1024 * 8
    }

    /// Multiply one cache block: `CT += alpha * (A · Bᵀ)` restricted to
    /// `bounds`, with `CT` in transposed layout of stride `out.lhs_rows`.
    ///
    /// `a` and `bt` are whole-plane (or panel) word slices of
    /// `depth_words` words per row. Cells outside `out` are skipped, so
    /// padding rows never materialize in the output; padding columns hold
    /// no set bits and cannot contribute.
    fn gemm_block(
        &self,
        a: &[u64],
        bt: &[u64],
        ct: &mut [i32],
        alpha: i32,
        depth_words: usize,
        bounds: BlockBounds,
        out: OutShape,
    );

    /// Reduce a bit-serial matrix to per-row signed integer sums.
    ///
    /// Per row: popcount each bit-plane's words, weight by `±2^bit` (top
    /// plane negative when signed), accumulate. Padding columns are zero
    /// and contribute nothing.
    ///
    /// # Panics
    ///
    /// Panics if `sums.len() != m.nrows`.
    fn row_sums(&self, m: &BitSerialMatrix, sums: &mut [i32]) {
        assert_eq!(sums.len(), m.nrows, "row-sum buffer length mismatch");
        for r in 0..m.nrows {
            let mut row_acc = 0i32;
            for b in 0..m.nbits {
                let mut bit_acc = 0i32;
                for &word in m.row_words(b, r) {
                    bit_acc += word.count_ones() as i32;
                }
                let weight = plane_weight(m.nbits, m.is_signed, b);
                row_acc = row_acc.wrapping_add(bit_acc.wrapping_mul(weight));
            }
            sums[r] = row_acc;
        }
    }
}

/// Cache-blocked binary GEMM over one pair of bit-planes.
///
/// `a` holds `rows_a` packed rows, `bt` holds `rows_bt` packed rows (a
/// whole plane or one allocation-aligned panel of it), and `ct` is the
/// matching transposed output region of shape
/// `out.rhs_rows × out.lhs_rows`.
///
/// # Panics
///
/// Asserts the blocking invariants: allocated row counts divisible by
/// their blocks, blocks divisible by the register tile, and the depth
/// divisible by the kernel's depth tile.
#[allow(clippy::too_many_arguments)]
pub fn binary_gemm(
    kernel: &dyn BinaryKernel,
    a: &[u64],
    bt: &[u64],
    ct: &mut [i32],
    alpha: i32,
    rows_a: usize,
    depth_words: usize,
    rows_bt: usize,
    out: OutShape,
    lhs_block: usize,
    rhs_block: usize,
) {
    let reg = kernel.reg_block();
    assert_eq!(rows_a % lhs_block, 0, "LHS rows not divisible by block");
    assert_eq!(rows_bt % rhs_block, 0, "RHS rows not divisible by block");
    assert_eq!(lhs_block % reg.lhs, 0, "LHS block not divisible by tile");
    assert_eq!(rhs_block % reg.rhs, 0, "RHS block not divisible by tile");
    assert_eq!(depth_words % reg.depth, 0, "depth not divisible by tile");
    assert_eq!(ct.len(), out.lhs_rows * out.rhs_rows);

    for b_bt in (0..rows_bt).step_by(rhs_block) {
        for b_a in (0..rows_a).step_by(lhs_block) {
            kernel.gemm_block(
                a,
                bt,
                ct,
                alpha,
                depth_words,
                BlockBounds {
                    lhs_start: b_a,
                    lhs_len: lhs_block,
                    rhs_start: b_bt,
                    rhs_len: rhs_block,
                },
                out,
            );
        }
    }
}

/// Portable scalar kernel: 2×1×2 register tile, `u64::count_ones` inner
/// product, 32 KiB cache budget.
#[derive(Debug, Default, Clone, Copy)]
pub struct PortableKernel;

impl BinaryKernel for PortableKernel {
    fn reg_block(&self) -> RegBlock {
        RegBlock {
            lhs: 2,
            depth: 1,
            rhs: 2,
        }
    }

    fn gemm_block(
        &self,
        a: &[u64],
        bt: &[u64],
        ct: &mut [i32],
        alpha: i32,
        depth_words: usize,
        bounds: BlockBounds,
        out: OutShape,
    ) {
        for r_bt in (bounds.rhs_start..bounds.rhs_start + bounds.rhs_len).step_by(2) {
            let bt_rows = &bt[r_bt * depth_words..];
            for r_a in (bounds.lhs_start..bounds.lhs_start + bounds.lhs_len).step_by(2) {
                let a_rows = &a[r_a * depth_words..];
                let mut acc = [0i32; 4];
                for d in 0..depth_words {
                    let a0 = a_rows[d];
                    let a1 = a_rows[d + depth_words];
                    let b0 = bt_rows[d];
                    let b1 = bt_rows[d + depth_words];
                    acc[0] += (a0 & b0).count_ones() as i32;
                    acc[1] += (a0 & b1).count_ones() as i32;
                    acc[2] += (a1 & b0).count_ones() as i32;
                    acc[3] += (a1 & b1).count_ones() as i32;
                }
                for i in 0..2 {
                    for j in 0..2 {
                        if r_a + i < out.lhs_rows && r_bt + j < out.rhs_rows {
                            let idx = (r_bt + j) * out.lhs_rows + (r_a + i);
                            ct[idx] = ct[idx].wrapping_add(acc[i * 2 + j].wrapping_mul(alpha));
                        }
                    }
                }
            }
        }
    }
}
