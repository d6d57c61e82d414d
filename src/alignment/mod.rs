//! Striped affine-gap alignment engine.
//!
//! One candidate alignment runs through this pipeline:
//!
//! 1. [`profile::QueryProfile`] precomputes per-reference-letter striped
//!    cost vectors for the read.
//! 2. [`matrix::SSEMatrix`] holds the E/F/H vector quartets and the
//!    per-cell backtrace mask words.
//! 3. [`fill_u8`] / [`fill_i16`] execute the striped recurrence; the 8-bit
//!    engine runs first and the 16-bit engine picks up saturated or
//!    unrepresentable fills.
//! 4. [`backtrace`] reconstructs one alignment per reported solution cell.
//!
//! [`SwAligner`] owns the per-thread pieces and resolves the lane width
//! once per alignment.

pub mod backtrace;
pub mod fill_i16;
pub mod fill_u8;
pub mod matrix;
pub mod metrics;
pub mod profile;

use rand::Rng;

pub use backtrace::{Alignment, BtOp, BtTransition, CellDecision};
pub use matrix::SSEMatrix;
pub use metrics::{SSEMetrics, SSEMetricsAggregator};
pub use profile::QueryProfile;

use crate::errors::AlignError;
use crate::scoring::{Scoring, TAlScore};

/// Alignment mode: local permits soft clipping (scores floored at 0);
/// end-to-end covers the whole read against a free reference window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlignMode {
    Local,
    EndToEnd,
}

/// A cell whose H score met the acceptance predicate during gathering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SolutionCell {
    pub row: usize,
    pub col: usize,
    pub score: TAlScore,
}

/// Outcome of one fill: the accepted cells plus the stored-to-real score
/// offset the backtrace needs.
#[derive(Debug, Clone)]
pub struct FillState {
    /// Best accepted score and its cell, if any cell was accepted.
    pub best: Option<(TAlScore, usize, usize)>,
    /// Accepted cells; best-first unless row-first ordering is configured.
    pub solutions: Vec<SolutionCell>,
    /// Added to stored matrix words to recover real scores.
    pub offsetsc: TAlScore,
}

/// Scan the filled matrix for solution cells.
///
/// Local mode accepts cells at or above `minsc` (and above the 0 floor)
/// that are local maxima along their column, honoring the `rowlo`
/// restriction. End-to-end mode accepts final-row cells at or above
/// `minsc`; ties on score break to the leftmost column.
pub(crate) fn gather(
    mat: &SSEMatrix,
    sc: &Scoring,
    mode: AlignMode,
    minsc: TAlScore,
    offsetsc: TAlScore,
    met: &mut metrics::SSEMetrics,
) -> FillState {
    let nrow = mat.nrow();
    let ncol = mat.ncol();
    let mut solutions: Vec<SolutionCell> = Vec::new();
    match mode {
        AlignMode::Local => {
            // Cells sitting on the floor are empty, not alignments.
            let eff_minsc = minsc.max(1);
            for j in 0..ncol {
                for i in 0..nrow {
                    met.gathcell += 1;
                    let h = mat.helt(i, j) as TAlScore + offsetsc;
                    if h < eff_minsc {
                        continue;
                    }
                    if sc.rowlo >= 0 && (i as i64) < sc.rowlo {
                        continue;
                    }
                    let hs = mat.helt(i, j);
                    let up_ok = i == 0 || mat.helt(i - 1, j) <= hs;
                    let dn_ok = i + 1 == nrow || mat.helt(i + 1, j) <= hs;
                    if up_ok && dn_ok {
                        met.gathsol += 1;
                        solutions.push(SolutionCell { row: i, col: j, score: h });
                    }
                }
            }
            if sc.row_first {
                solutions.sort_by_key(|s| (s.row, s.col));
            } else {
                solutions.sort_by(|a, b| {
                    b.score
                        .cmp(&a.score)
                        .then(a.row.cmp(&b.row))
                        .then(a.col.cmp(&b.col))
                });
            }
        }
        AlignMode::EndToEnd => {
            let i = nrow - 1;
            for j in 0..ncol {
                met.gathcell += 1;
                let h = mat.helt(i, j) as TAlScore + offsetsc;
                if h >= minsc {
                    met.gathsol += 1;
                    solutions.push(SolutionCell { row: i, col: j, score: h });
                }
            }
            solutions.sort_by(|a, b| b.score.cmp(&a.score).then(a.col.cmp(&b.col)));
        }
    }
    let best = solutions
        .iter()
        .max_by(|a, b| a.score.cmp(&b.score).then(b.col.cmp(&a.col)))
        .map(|s| (s.score, s.row, s.col));
    FillState { best, solutions, offsetsc }
}

/// Per-thread striped aligner: query profile, DP matrix, metrics and the
/// state of the most recent fill. Reused across candidates; buffers are
/// recycled, not reallocated.
pub struct SwAligner<'a> {
    sc: &'a Scoring,
    mode: AlignMode,
    read: Vec<u8>,
    quals: Vec<u8>,
    refw: Vec<u8>,
    prof: Option<QueryProfile>,
    mat: SSEMatrix,
    met: SSEMetrics,
    state: Option<FillState>,
    floorsc: TAlScore,
}

impl<'a> SwAligner<'a> {
    pub fn new(sc: &'a Scoring) -> SwAligner<'a> {
        SwAligner {
            sc,
            mode: AlignMode::Local,
            read: Vec::new(),
            quals: Vec::new(),
            refw: Vec::new(),
            prof: None,
            mat: SSEMatrix::new(),
            met: SSEMetrics::new(),
            state: None,
            floorsc: 0,
        }
    }

    /// Prepare for a new read: build the query profile and fix the mode
    /// and score floor for subsequent candidates.
    pub fn init_read(
        &mut self,
        read: &[u8],
        quals: &[u8],
        mode: AlignMode,
    ) -> Result<(), AlignError> {
        let prof = QueryProfile::build(read, quals, self.sc)?;
        self.floorsc = match mode {
            AlignMode::Local => self.sc.score_floor(read.len()),
            AlignMode::EndToEnd => TAlScore::MIN / 2,
        };
        self.mode = mode;
        self.read = read.to_vec();
        self.quals = quals.to_vec();
        self.prof = Some(prof);
        self.state = None;
        Ok(())
    }

    /// Fill the matrix against one candidate reference window and gather
    /// solution cells. The 8-bit engine runs first; saturation (or an
    /// unrepresentable configuration) falls through to 16-bit lanes.
    ///
    /// Returns the best accepted score, or `None` when no cell met
    /// `minsc`.
    pub fn align(
        &mut self,
        refw: &[u8],
        minsc: TAlScore,
    ) -> Result<Option<TAlScore>, AlignError> {
        let prof = self.prof.as_ref().ok_or_else(|| {
            AlignError::InvalidConfiguration("align called before init_read".to_string())
        })?;
        if refw.is_empty() {
            self.state = None;
            return Ok(None);
        }
        self.met.dp += 1;
        let state = match fill_u8::fill(
            prof,
            refw,
            self.mode,
            self.sc,
            minsc,
            &mut self.mat,
            &mut self.met,
        ) {
            Ok(state) => state,
            Err(AlignError::Saturated) => {
                self.met.dpsat += 1;
                fill_i16::fill(
                    prof,
                    refw,
                    self.mode,
                    self.sc,
                    minsc,
                    &mut self.mat,
                    &mut self.met,
                )?
            }
            Err(e) => return Err(e),
        };
        if state.solutions.is_empty() {
            self.met.dpfail += 1;
        } else {
            self.met.dpsucc += 1;
        }
        self.refw = refw.to_vec();
        let best = state.best.map(|(score, _, _)| score);
        self.state = Some(state);
        Ok(best)
    }

    /// Solution cells from the most recent fill.
    pub fn solutions(&self) -> &[SolutionCell] {
        self.state.as_ref().map(|s| s.solutions.as_slice()).unwrap_or(&[])
    }

    /// Best accepted (score, row, col) from the most recent fill.
    pub fn best(&self) -> Option<(TAlScore, usize, usize)> {
        self.state.as_ref().and_then(|s| s.best)
    }

    /// Clear the per-cell backtrace state. Call once before walking the
    /// solutions of a fill.
    pub fn init_backtrace(&mut self) {
        self.mat.init_masks();
    }

    /// Walk one alignment back from a solution cell of the latest fill.
    pub fn backtrace_from<R: Rng>(
        &mut self,
        row: usize,
        col: usize,
        rng: &mut R,
    ) -> Result<Option<Alignment>, AlignError> {
        let offsetsc = match &self.state {
            Some(state) => state.offsetsc,
            None => {
                return Err(AlignError::InvalidConfiguration(
                    "backtrace without a completed fill".to_string(),
                ))
            }
        };
        backtrace::backtrace_from(
            &mut self.mat,
            self.sc,
            &self.read,
            &self.quals,
            &self.refw,
            self.mode,
            row,
            col,
            offsetsc,
            self.floorsc,
            &mut self.met,
            rng,
        )
    }

    pub fn matrix(&self) -> &SSEMatrix {
        &self.mat
    }

    pub fn matrix_mut(&mut self) -> &mut SSEMatrix {
        &mut self.mat
    }

    pub fn metrics(&self) -> &SSEMetrics {
        &self.met
    }

    /// Stored-to-real score offset of the latest fill.
    pub fn offsetsc(&self) -> TAlScore {
        self.state.as_ref().map(|s| s.offsetsc).unwrap_or(0)
    }

    /// Score floor in effect for the current read and mode.
    pub fn floorsc(&self) -> TAlScore {
        self.floorsc
    }
}
