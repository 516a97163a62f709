//! Bit-serial GEMM driver.
//!
//! Integer GEMM decomposes into binary GEMMs: for operands of `lhs_bits`
//! and `rhs_bits` precision, every bit-plane pair `(lbit, rbit)` contributes
//! `±2^(lbit+rbit) · popcount(A_lbit AND B_rbit)` to the product. The
//! driver walks all pairs, derives each pair's scale and sign from the
//! operands' signedness, and hands the pair to the binary kernel. Iteration
//! order is unobservable: the accumulator is int32 with wrapping addition.
//!
//! # Plane weights
//!
//! Each side contributes a per-plane weight; a pair's `alpha` is the
//! wrapping product of the two:
//!
//! - unsigned plane `b`: `2^b`
//! - signed top plane (`b == nbits − 1`): `−2^b` (two's complement)
//! - bipolar plane: `2`, unsigned — see below
//!
//! # Bipolar operands
//!
//! A bipolar matrix `W` over {−1, +1} packs as the binary plane
//! `B = (W + 1) / 2`, so `W = 2B − 1`. Substituting into the product leaves
//! the plane itself with doubled weight plus affine terms that the kernel
//! cannot see; those are restored from row sums:
//!
//! - one bipolar operand: `W·xᵀ = 2(B·xᵀ) − 1·xᵀ`, so each accumulator
//!   cell starts at the negated row sum of the non-bipolar operand;
//! - both bipolar: `W_a·W_bᵀ = 4(B_a·B_bᵀ) − 2·p(a) − 2·p(b) + d` per
//!   cell, applied as a fix-up after the binary pass (`p` is the plane
//!   popcount per row; the signed row-sum utility returns `−p` for bipolar
//!   matrices, and `d` is the logical inner dimension).

use crate::core::context::GemmContext;
use crate::core::kernel::{binary_gemm, BinaryKernel, OutShape};
use crate::matrix::BitSerialMatrix;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Weight of bit-plane `bit` under two's-complement interpretation,
/// reduced mod 2³².
pub(crate) fn plane_weight(nbits: usize, is_signed: bool, bit: usize) -> i32 {
    let mag = if bit < 32 { 1u32 << bit } else { 0 };
    if is_signed && bit + 1 == nbits {
        mag.wrapping_neg() as i32
    } else {
        mag as i32
    }
}

fn plane_weights(m: &BitSerialMatrix) -> Vec<i32> {
    if m.is_bipolar() {
        vec![2]
    } else {
        (0..m.nbits)
            .map(|b| plane_weight(m.nbits, m.is_signed, b))
            .collect()
    }
}

/// How the accumulator is prepared before the binary pass.
enum AccumInit {
    Zero,
    /// LHS is bipolar: every cell of output row `j` starts at
    /// `−row_sums(rhs)[j]`.
    NegRhsRowSums(Vec<i32>),
    /// RHS is bipolar: cell `(j, i)` starts at `−row_sums(lhs)[i]`.
    NegLhsRowSums(Vec<i32>),
    /// Both bipolar: zero init, affine fix-up after the binary pass.
    BipolarPair {
        depth: i32,
        lhs_sums: Vec<i32>,
        rhs_sums: Vec<i32>,
    },
}

struct DriverPlan {
    lhs_weights: Vec<i32>,
    rhs_weights: Vec<i32>,
    init: AccumInit,
}

fn driver_plan(
    kernel: &dyn BinaryKernel,
    lhs: &BitSerialMatrix,
    rhs: &BitSerialMatrix,
) -> DriverPlan {
    let init = match (lhs.is_bipolar(), rhs.is_bipolar()) {
        (false, false) => AccumInit::Zero,
        (true, false) => {
            let mut sums = vec![0i32; rhs.nrows];
            kernel.row_sums(rhs, &mut sums);
            AccumInit::NegRhsRowSums(sums)
        }
        (false, true) => {
            let mut sums = vec![0i32; lhs.nrows];
            kernel.row_sums(lhs, &mut sums);
            AccumInit::NegLhsRowSums(sums)
        }
        (true, true) => {
            let mut lhs_sums = vec![0i32; lhs.nrows];
            kernel.row_sums(lhs, &mut lhs_sums);
            let mut rhs_sums = vec![0i32; rhs.nrows];
            kernel.row_sums(rhs, &mut rhs_sums);
            AccumInit::BipolarPair {
                depth: lhs.ncols as i32,
                lhs_sums,
                rhs_sums,
            }
        }
    };
    DriverPlan {
        lhs_weights: plane_weights(lhs),
        rhs_weights: plane_weights(rhs),
        init,
    }
}

/// Run the full bit-serial pass for one RHS row panel.
///
/// `ct` is the panel's region of the transposed output (stride
/// `lhs.nrows`); `panel` indexes allocation-aligned panels of `rhs_block`
/// RHS rows. Panels write disjoint output regions, which is what makes the
/// parallel driver safe.
#[allow(clippy::too_many_arguments)]
fn gemm_panel(
    kernel: &dyn BinaryKernel,
    lhs: &BitSerialMatrix,
    rhs: &BitSerialMatrix,
    lhs_block: usize,
    rhs_block: usize,
    plan: &DriverPlan,
    panel: usize,
    ct: &mut [i32],
) {
    let stride = lhs.nrows;
    let panel_rows = ct.len() / stride;
    let panel_start = panel * rhs_block;
    let depth_words = lhs.words_per_row();

    match &plan.init {
        AccumInit::Zero | AccumInit::BipolarPair { .. } => ct.fill(0),
        AccumInit::NegRhsRowSums(sums) => {
            for j in 0..panel_rows {
                ct[j * stride..(j + 1) * stride].fill(sums[panel_start + j].wrapping_neg());
            }
        }
        AccumInit::NegLhsRowSums(sums) => {
            for j in 0..panel_rows {
                for (cell, s) in ct[j * stride..(j + 1) * stride].iter_mut().zip(sums) {
                    *cell = s.wrapping_neg();
                }
            }
        }
    }

    let out = OutShape {
        lhs_rows: stride,
        rhs_rows: panel_rows,
    };
    for (lbit, &lhs_weight) in plan.lhs_weights.iter().enumerate() {
        for (rbit, &rhs_weight) in plan.rhs_weights.iter().enumerate() {
            let alpha = lhs_weight.wrapping_mul(rhs_weight);
            if alpha == 0 {
                // Weights are powers of two; a zero product means every
                // contribution of this pair vanishes mod 2^32.
                continue;
            }
            let bt = &rhs.bitplane_words(rbit)[panel_start * depth_words..]
                [..rhs_block * depth_words];
            binary_gemm(
                kernel,
                lhs.bitplane_words(lbit),
                bt,
                ct,
                alpha,
                lhs.nrows_a,
                depth_words,
                rhs_block,
                out,
                lhs_block,
                rhs_block,
            );
        }
    }

    if let AccumInit::BipolarPair {
        depth,
        lhs_sums,
        rhs_sums,
    } = &plan.init
    {
        for j in 0..panel_rows {
            let row_term = depth.wrapping_add(2i32.wrapping_mul(rhs_sums[panel_start + j]));
            for (cell, ls) in ct[j * stride..(j + 1) * stride].iter_mut().zip(lhs_sums) {
                *cell = cell.wrapping_add(row_term.wrapping_add(2i32.wrapping_mul(*ls)));
            }
        }
    }
}

/// Bit-serial GEMM: fill the context's accumulator with the transposed
/// product of its two operands.
///
/// # Panics
///
/// Asserts that the operands agree on the inner dimension and its
/// alignment (guaranteed for contexts built by
/// [`GemmContext::alloc`](crate::core::GemmContext::alloc)).
pub fn gemm(ctx: &mut GemmContext) {
    let kernel = ctx.kernel;
    assert_eq!(ctx.lhs.ncols, ctx.rhs.ncols, "inner dimensions differ");
    assert_eq!(ctx.lhs.ncols_a, ctx.rhs.ncols_a, "inner alignment differs");

    let plan = driver_plan(kernel, &ctx.lhs, &ctx.rhs);
    let panel_len = ctx.rhs_block * ctx.lhs.nrows;
    let (lhs, rhs) = (&ctx.lhs, &ctx.rhs);
    let (lhs_block, rhs_block) = (ctx.lhs_block, ctx.rhs_block);
    for (panel, ct) in ctx.res.chunks_mut(panel_len).enumerate() {
        gemm_panel(kernel, lhs, rhs, lhs_block, rhs_block, &plan, panel, ct);
    }
}

/// Parallel bit-serial GEMM: identical result to [`gemm`], with RHS row
/// panels distributed across threads. Panels own disjoint slices of the
/// accumulator, so no output cell is written from two threads.
#[cfg(feature = "parallel")]
pub fn gemm_parallel(ctx: &mut GemmContext) {
    let kernel = ctx.kernel;
    assert_eq!(ctx.lhs.ncols, ctx.rhs.ncols, "inner dimensions differ");
    assert_eq!(ctx.lhs.ncols_a, ctx.rhs.ncols_a, "inner alignment differs");

    let plan = driver_plan(kernel, &ctx.lhs, &ctx.rhs);
    let panel_len = ctx.rhs_block * ctx.lhs.nrows;
    let (lhs, rhs) = (&ctx.lhs, &ctx.rhs);
    let (lhs_block, rhs_block) = (ctx.lhs_block, ctx.rhs_block);
    ctx.res
        .par_chunks_mut(panel_len)
        .enumerate()
        .for_each(|(panel, ct)| {
            gemm_panel(kernel, lhs, rhs, lhs_block, rhs_block, &plan, panel, ct);
        });
}

/// Unblocked reference GEMM over decoded elements.
///
/// Decodes every element through the operand's integer interpretation
/// (unsigned, two's complement, or bipolar) and multiplies with the
/// schoolbook triple loop, writing the same transposed layout as [`gemm`].
/// Independent of the bit-plane kernel machinery; intended for
/// verification.
pub fn gemm_naive(ctx: &mut GemmContext) {
    assert_eq!(ctx.lhs.ncols, ctx.rhs.ncols, "inner dimensions differ");
    let out_rows = ctx.lhs.nrows;
    let out_cols = ctx.rhs.nrows;
    for j in 0..out_cols {
        for i in 0..out_rows {
            let mut acc = 0i32;
            for k in 0..ctx.lhs.ncols {
                let prod = ctx.lhs.element(i, k).wrapping_mul(ctx.rhs.element(j, k));
                acc = acc.wrapping_add(prod as i32);
            }
            ctx.res[j * out_rows + i] = acc;
        }
    }
}
