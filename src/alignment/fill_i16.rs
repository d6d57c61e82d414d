//! 16-bit striped DP fill.
//!
//! Eight signed 16-bit lanes per vector, storing true scores with
//! `i16::MIN` as the -inf sink. The sink is sticky under saturating
//! subtraction; a diagonal chain of saturating adds can climb away from
//! it by at most the read length times the match reward, which for
//! short-read lengths stays tens of thousands below any reportable
//! score. This is the fallback engine when the 8-bit fill saturates and
//! the primary engine for deep end-to-end score shifts.

use crate::alignment::matrix::SSEMatrix;
use crate::alignment::metrics::SSEMetrics;
use crate::alignment::profile::{QueryProfile, WPERV_I16};
use crate::alignment::{gather, AlignMode, FillState};
use crate::compute::simd_abstraction::portable_intrinsics as simd;
use crate::compute::simd_abstraction::Vec128;
use crate::errors::AlignError;
use crate::scoring::{Scoring, TAlScore};

#[inline]
fn pen_i16(p: i32) -> i16 {
    p.clamp(0, i16::MAX as i32) as i16
}

/// Blend barred lanes of `v` down to -inf: keep `v` where `m` is all-ones,
/// substitute `vneg` elsewhere.
#[inline]
#[allow(unsafe_op_in_unsafe_fn)]
unsafe fn bar_lanes(v: Vec128, m: Vec128, vneg: Vec128) -> Vec128 {
    simd::or(simd::and(v, m), simd::andnot(m, vneg))
}

/// Run the striped affine-gap recurrence at 16-bit precision and gather
/// solution cells.
pub(crate) fn fill(
    prof: &QueryProfile,
    refw: &[u8],
    mode: AlignMode,
    sc: &Scoring,
    minsc: TAlScore,
    mat: &mut SSEMatrix,
    met: &mut SSEMetrics,
) -> Result<FillState, AlignError> {
    let nrow = prof.rdlen();
    let ncol = refw.len();
    debug_assert!(ncol > 0);

    mat.init(nrow, ncol, WPERV_I16);
    let nvecrow = mat.nvecrow();
    met.col += ncol as u64;
    met.cell += (nrow * ncol) as u64;

    log::trace!("16-bit fill: {}x{} ({} stripes)", nrow, ncol, nvecrow);

    unsafe {
        let vzero = simd::setzero();
        let vneg = simd::splat_i16(i16::MIN);
        let vceil = simd::splat_i16(i16::MAX);
        let vrdopen = simd::splat_i16(pen_i16(sc.read_gap_open()));
        let vrdext = simd::splat_i16(pen_i16(sc.read_gap_extend()));
        let vrfopen = simd::splat_i16(pen_i16(sc.ref_gap_open()));
        let vrfext = simd::splat_i16(pen_i16(sc.ref_gap_extend()));
        let local = matches!(mode, AlignMode::Local);
        let mut vsat = vzero;

        // Stage the initial H column (column -1) in the TMP vectors of
        // column 0, and the initial E column. Local alignments may start
        // anywhere, so the local boundary H is 0; end-to-end paths must
        // enter through row -1, so it is -inf.
        let vh_init = if local { vzero } else { vneg };
        for i in 0..nvecrow {
            simd::store(mat.at(i, 0, SSEMatrix::TMP), vh_init);
            simd::store(mat.at(i, 0, SSEMatrix::E), vneg);
        }

        // F chain entering row 0: -inf except the open-from-row--1
        // candidate in lane 0 when no barrier covers row 0.
        let f0 = {
            let mut lanes = [i16::MIN; WPERV_I16];
            if sc.gapbar == 0 {
                lanes[0] = pen_i16(sc.ref_gap_open()).wrapping_neg();
            }
            simd::loadu(lanes.as_ptr() as *const u8)
        };
        // After a lane shift the vacated lane 0 must read -inf, not 0.
        let vlane0_neg = simd::splat_low_u32(i16::MIN as u16 as u32);

        for j in 0..ncol {
            let refc = refw[j].min(4) as usize;
            let (pcol, pmat) = if j == 0 {
                (0, SSEMatrix::TMP)
            } else {
                (j - 1, SSEMatrix::H)
            };

            // Diagonal input for stripe 0; the shifted-in 0 in lane 0 is
            // exactly the row -1 boundary score.
            let mut vh = simd::shift_lane_i16(simd::load(mat.at(nvecrow - 1, pcol, pmat)));
            let mut vf = f0;

            for i in 0..nvecrow {
                met.inner += 1;
                let ve = simd::load(mat.at(i, j, SSEMatrix::E));
                let vsum = simd::adds_i16(vh, prof.vec16(refc, i));
                vsat = simd::or(vsat, simd::cmpeq_i16(vsum, vceil));
                let mut vcell = simd::max_i16(vsum, ve);
                vcell = simd::max_i16(vcell, vf);
                if local {
                    vcell = simd::max_i16(vcell, vzero);
                }
                simd::store(mat.at(i, j, SSEMatrix::H), vcell);
                simd::store(mat.at(i, j, SSEMatrix::F), vf);
                if j + 1 < ncol {
                    let ve_next =
                        simd::max_i16(simd::subs_i16(vcell, vrdopen), simd::subs_i16(ve, vrdext));
                    simd::store(
                        mat.at(i, j + 1, SSEMatrix::E),
                        bar_lanes(ve_next, prof.gbar16(i), vneg),
                    );
                }
                vf = simd::max_i16(simd::subs_i16(vcell, vrfopen), simd::subs_i16(vf, vrfext));
                if i + 1 < nvecrow {
                    vf = bar_lanes(vf, prof.gbar16(i + 1), vneg);
                }
                vh = simd::load(mat.at(i, pcol, pmat));
            }

            // Lazy-F fix-up, as in the 8-bit engine but with the signed
            // sink substituted into shifted and barred lanes.
            let mut vf_chain = simd::or(simd::shift_lane_i16(vf), vlane0_neg);
            vf_chain = bar_lanes(vf_chain, prof.gbar16(0), vneg);
            let mut passes = 0usize;
            loop {
                let mut changed = false;
                for i in 0..nvecrow {
                    met.fixup += 1;
                    let f_old = simd::load(mat.at(i, j, SSEMatrix::F));
                    let f_new = simd::max_i16(f_old, vf_chain);
                    let h_old = simd::load(mat.at(i, j, SSEMatrix::H));
                    let h_new = simd::max_i16(h_old, f_new);
                    if simd::movemask_u8(simd::cmpeq_i16(f_new, f_old)) != 0xffff {
                        simd::store(mat.at(i, j, SSEMatrix::F), f_new);
                        changed = true;
                    }
                    if simd::movemask_u8(simd::cmpeq_i16(h_new, h_old)) != 0xffff {
                        simd::store(mat.at(i, j, SSEMatrix::H), h_new);
                        if j + 1 < ncol {
                            let ve = simd::load(mat.at(i, j + 1, SSEMatrix::E));
                            let cand = bar_lanes(
                                simd::subs_i16(h_new, vrdopen),
                                prof.gbar16(i),
                                vneg,
                            );
                            simd::store(mat.at(i, j + 1, SSEMatrix::E), simd::max_i16(ve, cand));
                        }
                        changed = true;
                    }
                    vf_chain =
                        simd::max_i16(simd::subs_i16(h_new, vrfopen), simd::subs_i16(f_new, vrfext));
                    if i + 1 < nvecrow {
                        vf_chain = bar_lanes(vf_chain, prof.gbar16(i + 1), vneg);
                    }
                }
                passes += 1;
                if !changed {
                    break;
                }
                debug_assert!(
                    passes <= nvecrow.max(WPERV_I16) + 1,
                    "lazy-F loop failed to converge"
                );
                vf_chain = simd::or(simd::shift_lane_i16(vf_chain), vlane0_neg);
                vf_chain = bar_lanes(vf_chain, prof.gbar16(0), vneg);
            }

            if simd::movemask_u8(vsat) != 0 {
                return Err(AlignError::Saturated);
            }
        }
    }

    Ok(gather(mat, sc, mode, minsc, 0, met))
}
