//! Wide-depth binary kernel.
//!
//! Same 2×2 output tile as the portable kernel, but the depth sweep
//! processes four words per step. The fixed-trip inner loop compiles to
//! straight-line AND+popcount over 256 bits per operand row, which the
//! backend vectorizes on AVX2 and NEON targets. Choosing this kernel
//! means a depth tile of 4 words, so contexts built on it align the inner
//! dimension to 256 bits.

use crate::core::kernel::{BinaryKernel, BlockBounds, OutShape, RegBlock};

/// 2×4×2 kernel: 2×2 output tile, four-word depth tile.
#[derive(Debug, Default, Clone, Copy)]
pub struct WideKernel;

impl BinaryKernel for WideKernel {
    fn reg_block(&self) -> RegBlock {
        RegBlock {
            lhs: 2,
            depth: 4,
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
        debug_assert_eq!(depth_words % 4, 0);
        for r_bt in (bounds.rhs_start..bounds.rhs_start + bounds.rhs_len).step_by(2) {
            let bt_rows = &bt[r_bt * depth_words..];
            for r_a in (bounds.lhs_start..bounds.lhs_start + bounds.lhs_len).step_by(2) {
                let a_rows = &a[r_a * depth_words..];
                let mut acc = [0i32; 4];
                for d in (0..depth_words).step_by(4) {
                    for t in 0..4 {
                        let a0 = a_rows[d + t];
                        let a1 = a_rows[d + t + depth_words];
                        let b0 = bt_rows[d + t];
                        let b1 = bt_rows[d + t + depth_words];
                        acc[0] += (a0 & b0).count_ones() as i32;
                        acc[1] += (a0 & b1).count_ones() as i32;
                        acc[2] += (a1 & b0).count_ones() as i32;
                        acc[3] += (a1 & b1).count_ones() as i32;
                    }
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::context::GemmContext;
    use crate::core::kernel::PortableKernel;
    use crate::matrix::Layout;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn test_wide_matches_portable() {
        let mut rng = StdRng::seed_from_u64(99);
        for (m, k, n, bits, signed) in [
            (3, 100, 5, 2, false),
            (8, 256, 8, 4, true),
            (7, 300, 3, 3, false),
            (2, 64, 2, 1, true),
        ] {
            let lhs: Vec<u8> = (0..m * k)
                .map(|_| rng.gen_range(0..(1u16 << bits)) as u8)
                .collect();
            let rhs: Vec<u8> = (0..n * k)
                .map(|_| rng.gen_range(0..(1u16 << bits)) as u8)
                .collect();

            let run = |kernel: &'static dyn BinaryKernel| {
                let mut ctx =
                    GemmContext::alloc_with_kernel(m, k, n, bits, bits, signed, signed, kernel)
                        .unwrap();
                ctx.lhs.import(&lhs, Layout::RowMajor);
                ctx.rhs.import(&rhs, Layout::RowMajor);
                ctx.gemm();
                ctx.result().to_vec()
            };

            assert_eq!(
                run(&WideKernel),
                run(&PortableKernel),
                "shape ({m},{k},{n}) bits={bits} signed={signed}"
            );
        }
    }

    #[test]
    fn test_wide_depth_tile_shape() {
        let reg = WideKernel.reg_block();
        assert_eq!((reg.lhs, reg.depth, reg.rhs), (2, 4, 2));
    }
}
