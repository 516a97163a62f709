//! GEMM context: operand, accumulator, and block-plan ownership.

use std::fmt;

use crate::core::kernel::BinaryKernel;
use crate::core::tiling::plan_blocks;
use crate::error::{BitSerialError, Result};
use crate::matrix::{align_to, BitSerialMatrix};

/// Owns everything one bit-serial GEMM needs: the two packed operands, the
/// int32 accumulator, the planned cache-block sizes, and the kernel bound
/// at allocation time.
///
/// The RHS operand is stored logically transposed (`nrows` = output
/// columns, `ncols` = inner dimension) and the accumulator holds the
/// transposed product: row-major `rhs.nrows × lhs.nrows`, logical
/// dimensions only. All buffers live exactly as long as the context.
pub struct GemmContext {
    pub lhs: BitSerialMatrix,
    pub rhs: BitSerialMatrix,
    /// Cache-block size along LHS rows; divides `lhs.nrows_a`.
    pub lhs_block: usize,
    /// Cache-block size along RHS rows; divides `rhs.nrows_a`.
    pub rhs_block: usize,
    pub(crate) res: Vec<i32>,
    pub(crate) kernel: &'static dyn BinaryKernel,
}

impl GemmContext {
    /// Allocate a context with the kernel best suited to the running CPU.
    ///
    /// Aligns `depth` to the kernel's depth tile, runs the block planner,
    /// and allocates both operands with their block size as row alignment
    /// so the kernel's divisibility invariants hold by construction.
    ///
    /// # Errors
    ///
    /// [`BitSerialError::UnsupportedPrecision`] when a precision is outside
    /// `1..=64`, [`BitSerialError::ZeroDimension`] when any dimension is
    /// zero.
    #[allow(clippy::too_many_arguments)]
    pub fn alloc(
        lhs_rows: usize,
        depth: usize,
        rhs_rows: usize,
        lhs_bits: usize,
        rhs_bits: usize,
        lhs_signed: bool,
        rhs_signed: bool,
    ) -> Result<Self> {
        Self::alloc_with_kernel(
            lhs_rows,
            depth,
            rhs_rows,
            lhs_bits,
            rhs_bits,
            lhs_signed,
            rhs_signed,
            crate::simd::select_kernel(),
        )
    }

    /// Allocate a context bound to an explicit kernel.
    #[allow(clippy::too_many_arguments)]
    pub fn alloc_with_kernel(
        lhs_rows: usize,
        depth: usize,
        rhs_rows: usize,
        lhs_bits: usize,
        rhs_bits: usize,
        lhs_signed: bool,
        rhs_signed: bool,
        kernel: &'static dyn BinaryKernel,
    ) -> Result<Self> {
        for bits in [lhs_bits, rhs_bits] {
            if !(1..=64).contains(&bits) {
                return Err(BitSerialError::UnsupportedPrecision(bits));
            }
        }
        if lhs_rows == 0 || depth == 0 || rhs_rows == 0 {
            return Err(BitSerialError::ZeroDimension {
                lhs_rows,
                depth,
                rhs_rows,
            });
        }

        let reg = kernel.reg_block();
        let colalign = reg.depth * 64;
        let depth_al = align_to(depth, colalign);
        let plan = plan_blocks(
            lhs_rows,
            rhs_rows,
            depth_al,
            reg.lhs,
            reg.rhs,
            kernel.cache_bits(),
        );

        let lhs = BitSerialMatrix::alloc(
            lhs_bits,
            lhs_rows,
            depth,
            lhs_signed,
            plan.lhs_block,
            colalign,
        );
        let rhs = BitSerialMatrix::alloc(
            rhs_bits,
            rhs_rows,
            depth,
            rhs_signed,
            plan.rhs_block,
            colalign,
        );
        // The result is not aligned: cells for padding rows never
        // materialize.
        let res = vec![0i32; lhs_rows * rhs_rows];

        Ok(Self {
            lhs,
            rhs,
            lhs_block: plan.lhs_block,
            rhs_block: plan.rhs_block,
            res,
            kernel,
        })
    }

    /// The kernel bound at allocation.
    pub fn kernel(&self) -> &'static dyn BinaryKernel {
        self.kernel
    }

    /// The transposed product: row-major `rhs.nrows × lhs.nrows`.
    pub fn result(&self) -> &[i32] {
        &self.res
    }

    /// Multiply the packed operands into the accumulator.
    pub fn gemm(&mut self) {
        crate::core::gemm::gemm(self);
    }

    /// Multiply with RHS row panels distributed across threads.
    #[cfg(feature = "parallel")]
    pub fn gemm_parallel(&mut self) {
        crate::core::gemm::gemm_parallel(self);
    }
}

impl fmt::Display for GemmContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "GEMMContext")?;
        writeln!(f, "LHS: {}", self.lhs)?;
        writeln!(f, "Block size: {}", self.lhs_block)?;
        writeln!(f, "RHS: {}", self.rhs)?;
        writeln!(f, "Block size: {}", self.rhs_block)?;
        let actual_ops =
            2.0 * self.lhs.nrows as f64 * self.lhs.ncols as f64 * self.rhs.nrows as f64;
        let alloc_ops =
            2.0 * self.lhs.nrows_a as f64 * self.lhs.ncols_a as f64 * self.rhs.nrows_a as f64;
        writeln!(f, "Actual ops: {actual_ops}")?;
        writeln!(f, "Allocated ops: {alloc_ops}")?;
        write!(f, "Actual op percentage: {}", 100.0 * actual_ops / alloc_ops)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::kernel::PortableKernel;
    use crate::simd::WideKernel;

    fn alloc(lhs_rows: usize, depth: usize, rhs_rows: usize) -> GemmContext {
        GemmContext::alloc_with_kernel(
            lhs_rows,
            depth,
            rhs_rows,
            2,
            2,
            false,
            false,
            &PortableKernel,
        )
        .unwrap()
    }

    #[test]
    fn test_alloc_block_invariants() {
        for (m, k, n) in [(1, 1, 1), (7, 100, 3), (97, 65, 211), (256, 512, 640)] {
            let ctx = alloc(m, k, n);
            assert_eq!(ctx.lhs.nrows_a % ctx.lhs_block, 0, "shape ({m},{k},{n})");
            assert_eq!(ctx.rhs.nrows_a % ctx.rhs_block, 0, "shape ({m},{k},{n})");
            assert_eq!(ctx.lhs.ncols_a % 64, 0);
            assert_eq!(ctx.lhs.ncols_a, ctx.rhs.ncols_a);
            assert_eq!(ctx.lhs_block % 2, 0);
            assert_eq!(ctx.rhs_block % 2, 0);
        }
    }

    #[test]
    fn test_alloc_accumulator_is_logical_size() {
        let ctx = alloc(7, 100, 3);
        assert_eq!(ctx.result().len(), 21);
        assert!(ctx.lhs.nrows_a >= 8);
    }

    #[test]
    fn test_alloc_blocks_fit_cache_or_fallback() {
        for (m, k, n) in [(7, 100, 3), (300, 64, 300), (100, 1000, 100)] {
            let ctx = alloc(m, k, n);
            let d_bits = ctx.lhs.ncols_a;
            let working_set =
                d_bits * (ctx.lhs_block + ctx.rhs_block) + 32 * ctx.lhs_block * ctx.rhs_block;
            let register_only = ctx.lhs_block == crate::matrix::align_to(m, 2)
                && ctx.rhs_block == crate::matrix::align_to(n, 2);
            assert!(
                working_set <= PortableKernel.cache_bits() || register_only,
                "shape ({m},{k},{n}): blocks ({}, {}) neither fit nor fallback",
                ctx.lhs_block,
                ctx.rhs_block
            );
        }
    }

    #[test]
    fn test_alloc_wide_kernel_depth_alignment() {
        let ctx = GemmContext::alloc_with_kernel(4, 100, 4, 2, 2, false, false, &WideKernel)
            .unwrap();
        assert_eq!(ctx.lhs.ncols_a % 256, 0);
        assert_eq!(ctx.lhs.ncols_a, 256);
    }

    #[test]
    fn test_kernel_accessor_returns_bound_kernel() {
        let ctx = GemmContext::alloc_with_kernel(2, 64, 2, 2, 2, false, false, &PortableKernel)
            .unwrap();
        assert_eq!(ctx.kernel().reg_block().depth, 1);

        let ctx =
            GemmContext::alloc_with_kernel(2, 64, 2, 2, 2, false, false, &WideKernel).unwrap();
        assert_eq!(ctx.kernel().reg_block().depth, 4);
        assert_eq!(ctx.lhs.ncols_a, ctx.kernel().reg_block().depth * 64);

        // The default path binds whatever dispatch selects for this CPU.
        let ctx = GemmContext::alloc(2, 64, 2, 2, 2, false, false).unwrap();
        assert_eq!(
            ctx.kernel().reg_block(),
            crate::simd::select_kernel().reg_block()
        );
    }

    #[test]
    fn test_alloc_rejects_bad_precision() {
        assert!(matches!(
            GemmContext::alloc(2, 2, 2, 0, 2, false, false),
            Err(BitSerialError::UnsupportedPrecision(0))
        ));
        assert!(matches!(
            GemmContext::alloc(2, 2, 2, 2, 65, false, false),
            Err(BitSerialError::UnsupportedPrecision(65))
        ));
    }

    #[test]
    fn test_alloc_rejects_zero_dimension() {
        assert!(matches!(
            GemmContext::alloc(2, 0, 2, 2, 2, false, false),
            Err(BitSerialError::ZeroDimension { .. })
        ));
    }

    #[test]
    fn test_display_reports_utilization() {
        let ctx = alloc(2, 3, 2);
        let text = ctx.to_string();
        assert!(text.contains("GEMMContext"));
        assert!(text.contains("Block size:"));
        assert!(text.contains("Actual op percentage:"));
    }
}
