//! 8-bit striped DP fill.
//!
//! Sixteen unsigned byte lanes per vector. Scores are stored as
//! `score + off`: local mode stores the floored score directly
//! (`off = 0`), end-to-end mode shifts by `off = 1 - minsc` so every
//! reportable score sits strictly above the 0 = -inf sink. Saturating
//! unsigned arithmetic provides both the local floor and the sink for
//! free; a lane that reaches 255 during the add sets the sticky
//! saturation flag and the fill reports [`AlignError::Saturated`] so the
//! caller can retry with 16-bit lanes.

use crate::alignment::matrix::SSEMatrix;
use crate::alignment::metrics::SSEMetrics;
use crate::alignment::profile::{QueryProfile, WPERV_U8};
use crate::alignment::{gather, AlignMode, FillState};
use crate::compute::simd_abstraction::portable_intrinsics as simd;
use crate::errors::AlignError;
use crate::scoring::{Scoring, TAlScore};

/// Largest end-to-end score shift the 8-bit representation accepts;
/// anything deeper leaves too little headroom above the sink.
const MAX_OFF_U8: i64 = 192;

#[inline]
fn pen_u8(p: i32) -> u8 {
    p.clamp(0, 255) as u8
}

/// Run the striped affine-gap recurrence at 8-bit precision and gather
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

    let off: i64 = match mode {
        AlignMode::Local => 0,
        AlignMode::EndToEnd => (1 - minsc).max(0),
    };
    if off > MAX_OFF_U8 {
        return Err(AlignError::Saturated);
    }
    // A positive match reward lets an end-to-end path dip below any fixed
    // shift before recovering; the unsigned sink would swallow it. Those
    // fills belong to the 16-bit engine.
    if matches!(mode, AlignMode::EndToEnd) && sc.match_bonus > 0 {
        return Err(AlignError::Saturated);
    }
    if prof.bias() + prof.max_bonus() > 255 {
        return Err(AlignError::Saturated);
    }

    mat.init(nrow, ncol, WPERV_U8);
    let nvecrow = mat.nvecrow();
    met.col += ncol as u64;
    met.cell += (nrow * ncol) as u64;

    log::trace!("8-bit fill: {}x{} ({} stripes), off={}", nrow, ncol, nvecrow, off);

    unsafe {
        let vzero = simd::setzero();
        let vbias = simd::splat_u8(prof.bias() as u8);
        let vceil = simd::splat_u8(0xff);
        let vrdopen = simd::splat_u8(pen_u8(sc.read_gap_open()));
        let vrdext = simd::splat_u8(pen_u8(sc.read_gap_extend()));
        let vrfopen = simd::splat_u8(pen_u8(sc.ref_gap_open()));
        let vrfext = simd::splat_u8(pen_u8(sc.ref_gap_extend()));
        // Row -1 boundary value, inserted into lane 0 of the shifted
        // diagonal vector.
        let vboundary = simd::splat_low_u32(off as u32);
        let mut vsat = vzero;

        // Stage the initial H column (column -1) in the TMP vectors of
        // column 0; stage the initial E column alongside. Both are the
        // stored -inf, which in this representation is 0.
        for i in 0..nvecrow {
            simd::store(mat.at(i, 0, SSEMatrix::TMP), vzero);
            simd::store(mat.at(i, 0, SSEMatrix::E), vzero);
        }

        // F chain entering row 0: -inf except the open-from-row--1
        // candidate in lane 0 when no barrier covers row 0.
        let f0 = {
            let mut lanes = [0u8; WPERV_U8];
            if sc.gapbar == 0 {
                lanes[0] = (off - sc.ref_gap_open() as i64).clamp(0, 255) as u8;
            }
            simd::loadu(lanes.as_ptr())
        };

        for j in 0..ncol {
            let refc = refw[j].min(4) as usize;
            let (pcol, pmat) = if j == 0 {
                (0, SSEMatrix::TMP)
            } else {
                (j - 1, SSEMatrix::H)
            };

            // Diagonal input for stripe 0: previous column's last H stripe
            // shifted up one lane, row -1 boundary in lane 0.
            let mut vh = simd::load(mat.at(nvecrow - 1, pcol, pmat));
            vh = simd::or(simd::shift_lane_u8(vh), vboundary);
            let mut vf = f0;

            for i in 0..nvecrow {
                met.inner += 1;
                let ve = simd::load(mat.at(i, j, SSEMatrix::E));
                let vsum = simd::adds_u8(vh, prof.vec8(refc, i));
                vsat = simd::or(vsat, simd::cmpeq_u8(vsum, vceil));
                let mut vcell = simd::subs_u8(vsum, vbias);
                vcell = simd::max_u8(vcell, ve);
                vcell = simd::max_u8(vcell, vf);
                simd::store(mat.at(i, j, SSEMatrix::H), vcell);
                simd::store(mat.at(i, j, SSEMatrix::F), vf);
                if j + 1 < ncol {
                    let ve_next =
                        simd::max_u8(simd::subs_u8(vcell, vrdopen), simd::subs_u8(ve, vrdext));
                    simd::store(
                        mat.at(i, j + 1, SSEMatrix::E),
                        simd::and(ve_next, prof.gbar8(i)),
                    );
                }
                // F chain into the next stripe.
                vf = simd::max_u8(simd::subs_u8(vcell, vrfopen), simd::subs_u8(vf, vrfext));
                if i + 1 < nvecrow {
                    vf = simd::and(vf, prof.gbar8(i + 1));
                }
                vh = simd::load(mat.at(i, pcol, pmat));
            }

            // Lazy-F fix-up: wrap the chain into stripe 0 and re-propagate
            // until a full pass changes nothing. Each pass carries the
            // chain across one more lane boundary, so the pass count is
            // bounded by the lane count.
            let mut vf_chain = simd::and(simd::shift_lane_u8(vf), prof.gbar8(0));
            let mut passes = 0usize;
            loop {
                let mut changed = false;
                for i in 0..nvecrow {
                    met.fixup += 1;
                    let f_old = simd::load(mat.at(i, j, SSEMatrix::F));
                    let f_new = simd::max_u8(f_old, vf_chain);
                    let h_old = simd::load(mat.at(i, j, SSEMatrix::H));
                    let h_new = simd::max_u8(h_old, f_new);
                    if simd::movemask_u8(simd::cmpeq_u8(f_new, f_old)) != 0xffff {
                        simd::store(mat.at(i, j, SSEMatrix::F), f_new);
                        changed = true;
                    }
                    if simd::movemask_u8(simd::cmpeq_u8(h_new, h_old)) != 0xffff {
                        simd::store(mat.at(i, j, SSEMatrix::H), h_new);
                        if j + 1 < ncol {
                            let ve = simd::load(mat.at(i, j + 1, SSEMatrix::E));
                            let ve_new = simd::max_u8(
                                ve,
                                simd::and(simd::subs_u8(h_new, vrdopen), prof.gbar8(i)),
                            );
                            simd::store(mat.at(i, j + 1, SSEMatrix::E), ve_new);
                        }
                        changed = true;
                    }
                    vf_chain =
                        simd::max_u8(simd::subs_u8(h_new, vrfopen), simd::subs_u8(f_new, vrfext));
                    if i + 1 < nvecrow {
                        vf_chain = simd::and(vf_chain, prof.gbar8(i + 1));
                    }
                }
                passes += 1;
                if !changed {
                    break;
                }
                debug_assert!(
                    passes <= nvecrow.max(WPERV_U8) + 1,
                    "lazy-F loop failed to converge"
                );
                vf_chain = simd::and(simd::shift_lane_u8(vf_chain), prof.gbar8(0));
            }

            if simd::movemask_u8(vsat) != 0 {
                return Err(AlignError::Saturated);
            }
        }
    }

    Ok(gather(mat, sc, mode, minsc, -off, met))
}
