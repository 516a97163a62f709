//! Cache-block size planning.
//!
//! The planner picks row-block sizes `(lhs_block, rhs_block)` so that one
//! LHS panel, one RHS panel, and the int32 output tile they produce fit a
//! target cache budget:
//!
//! ```text
//! d_bits · (lhs_block + rhs_block) + 32 · lhs_block · rhs_block ≤ cache_bits
//! ```
//!
//! With `lhs_block = lhs_mult · x` and `rhs_block = rhs_mult · x` this is a
//! quadratic in `x`; the planner takes the floor of the positive root. Two
//! refinements follow:
//!
//! 1. If a block exceeds its matrix's row count, cache blocking is
//!    pointless: fall back to register-only blocking (rows rounded up to
//!    the register tile).
//! 2. If rounding the row count up to the block wastes more than 10% of a
//!    dimension, [`finetune_block_size`] searches smaller multiples of the
//!    register tile for the candidate with the least padding.

use crate::matrix::align_to;

/// Planned cache-block sizes for the two operand row dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockPlan {
    pub lhs_block: usize,
    pub rhs_block: usize,
}

/// Solve the cache working-set model for block sizes.
///
/// `lhs_mult` and `rhs_mult` are the register-tile multiples along each row
/// dimension, `d_bits` the (aligned) depth of one panel row in bits, and
/// `cache_bits` the cache budget.
///
/// # Panics
///
/// Panics if the budget cannot fit even a single register tile's working
/// set (non-positive root); such a configuration is pathological.
pub fn compute_block_size(
    lhs_mult: usize,
    rhs_mult: usize,
    cache_bits: usize,
    d_bits: usize,
) -> (usize, usize) {
    let a = 32.0 * lhs_mult as f64 * rhs_mult as f64;
    let b = d_bits as f64 * (lhs_mult + rhs_mult) as f64;
    let c = cache_bits as f64;
    let discr = (b * b + 4.0 * a * c).sqrt();
    let x = ((-b + discr) / (2.0 * a)).floor() as i64;
    assert!(
        x > 0,
        "cache budget of {cache_bits} bits is smaller than one row's working set"
    );
    (lhs_mult * x as usize, rhs_mult * x as usize)
}

/// Search below `bs_max` for the block size that pads `rows` the least.
///
/// Candidates descend from `bs_max` in steps of `bs_div`, keeping only
/// multiples of `bs_div`; ties keep the larger candidate.
pub fn finetune_block_size(rows: usize, bs_max: usize, bs_div: usize) -> usize {
    let mut best_cand = bs_max;
    let mut min_penalty = align_to(rows, best_cand) - rows;
    let mut cand = bs_max;
    while cand > bs_div {
        if cand % bs_div == 0 {
            let penalty = align_to(rows, cand) - rows;
            if penalty < min_penalty {
                best_cand = cand;
                min_penalty = penalty;
            }
        }
        cand -= bs_div;
    }
    best_cand
}

/// Plan cache blocks for a GEMM of `lhs_rows × depth × rhs_rows`.
///
/// `d_bits` must already be aligned to the kernel's depth tile in bits.
pub fn plan_blocks(
    lhs_rows: usize,
    rhs_rows: usize,
    d_bits: usize,
    lhs_mult: usize,
    rhs_mult: usize,
    cache_bits: usize,
) -> BlockPlan {
    let (mut lhs_block, mut rhs_block) =
        compute_block_size(lhs_mult, rhs_mult, cache_bits, d_bits);

    if lhs_block > lhs_rows || rhs_block > rhs_rows {
        // The whole problem fits a cache block; register blocking only.
        lhs_block = align_to(lhs_rows, lhs_mult);
        rhs_block = align_to(rhs_rows, rhs_mult);
    } else {
        // Shrink a block when rounding up to it wastes more than 10% of
        // the dimension.
        if 10 * (align_to(lhs_rows, lhs_block) - lhs_rows) > lhs_rows {
            lhs_block = finetune_block_size(lhs_rows, lhs_block, lhs_mult);
        }
        if 10 * (align_to(rhs_rows, rhs_block) - rhs_rows) > rhs_rows {
            rhs_block = finetune_block_size(rhs_rows, rhs_block, rhs_mult);
        }
    }

    BlockPlan {
        lhs_block,
        rhs_block,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CACHE_BITS: usize = 32 * 1024 * 8;

    #[test]
    fn test_compute_block_size_reference_config() {
        // 2x2 register tile, 64-bit depth rows, 32 KiB budget.
        let (lhs, rhs) = compute_block_size(2, 2, CACHE_BITS, 64);
        assert_eq!(lhs, 88);
        assert_eq!(rhs, 88);
    }

    #[test]
    fn test_compute_block_size_fits_budget() {
        for d_bits in [64, 256, 1024, 4096] {
            let (lhs, rhs) = compute_block_size(2, 2, CACHE_BITS, d_bits);
            let working_set = d_bits * (lhs + rhs) + 32 * lhs * rhs;
            assert!(
                working_set <= CACHE_BITS,
                "d_bits={d_bits}: working set {working_set} exceeds budget"
            );

            // The next multiple up must no longer fit.
            let (bigger_l, bigger_r) = (lhs + 2, rhs + 2);
            let bigger = d_bits * (bigger_l + bigger_r) + 32 * bigger_l * bigger_r;
            assert!(bigger > CACHE_BITS, "d_bits={d_bits}: root not maximal");
        }
    }

    #[test]
    fn test_compute_block_size_minimum_viable() {
        // A budget barely past one 2x2 tile's working set forces x == 1.
        let (lhs, rhs) = compute_block_size(2, 2, 400, 64);
        assert_eq!((lhs, rhs), (2, 2));
    }

    #[test]
    #[should_panic(expected = "cache budget")]
    fn test_compute_block_size_pathological_budget() {
        compute_block_size(2, 2, 100, 64);
    }

    #[test]
    fn test_finetune_prefers_exact_divisor() {
        // 100 rows, initial block 88: 50 divides 100 exactly.
        assert_eq!(finetune_block_size(100, 88, 2), 50);
    }

    #[test]
    fn test_finetune_tie_keeps_larger() {
        // Penalty 0 at 50, 20, 10, 4, 2: the descending search keeps 50.
        let best = finetune_block_size(100, 88, 2);
        assert_eq!(align_to(100, best) - 100, 0);
        assert_eq!(best, 50);
    }

    #[test]
    fn test_finetune_result_is_tile_multiple() {
        for rows in [3, 7, 33, 97, 130] {
            let best = finetune_block_size(rows, 88, 2);
            assert_eq!(best % 2, 0);
            assert!(best <= 88);
            assert!(align_to(rows, best) - rows <= align_to(rows, 88) - rows);
        }
    }

    #[test]
    fn test_plan_blocks_register_only_fallback() {
        // Tiny matrices: blocks clamp to register-aligned row counts.
        let plan = plan_blocks(2, 3, 64, 2, 2, CACHE_BITS);
        assert_eq!(plan.lhs_block, 2);
        assert_eq!(plan.rhs_block, 4);
    }

    #[test]
    fn test_plan_blocks_finetunes_bad_quantization() {
        // 100 rows against an 88 block pads by 76%; fine-tune recovers.
        let plan = plan_blocks(100, 100, 64, 2, 2, CACHE_BITS);
        assert_eq!(plan.lhs_block, 50);
        assert_eq!(plan.rhs_block, 50);
    }

    #[test]
    fn test_plan_blocks_keeps_good_quantization() {
        // 170 rows pad to 176: 6 rows is under the 10% threshold.
        let plan = plan_blocks(170, 170, 64, 2, 2, CACHE_BITS);
        assert_eq!(plan.lhs_block, 88);
        assert_eq!(plan.rhs_block, 88);
    }

    #[test]
    fn test_plan_blocks_divisibility_invariants() {
        for (l, r) in [(7, 3), (100, 640), (88, 88), (1, 1), (513, 129)] {
            let plan = plan_blocks(l, r, 256, 2, 2, CACHE_BITS);
            assert_eq!(plan.lhs_block % 2, 0);
            assert_eq!(plan.rhs_block % 2, 0);
            assert_eq!(align_to(l, plan.lhs_block) % plan.lhs_block, 0);
            assert_eq!(align_to(r, plan.rhs_block) % plan.rhs_block, 0);
        }
    }
}
