//! Randomized backtrace over the filled matrix.
//!
//! Starting from a solution cell, the walk repeatedly asks
//! [`SSEMatrix::analyze_cell`] for a legal predecessor transition,
//! consuming read and reference characters until it reaches an origin.
//! Branch points memoize their remaining options in the per-cell mask
//! words, so a later walk from another solution cell resumes past choices
//! already taken instead of re-reporting the same alignment. Every cell a
//! reported alignment touched is flagged reported-through; walking into
//! such a cell aborts the walk.

use rand::Rng;

use crate::alignment::matrix::SSEMatrix;
use crate::alignment::metrics::SSEMetrics;
use crate::alignment::AlignMode;
use crate::errors::AlignError;
use crate::scoring::{Scoring, TAlScore};

/// Predecessor transition chosen for one backtrace step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BtTransition {
    /// H from the upper-left H plus the diagonal contribution.
    OallDiag,
    /// H from the H above minus the reference-gap open cost.
    OallRefOpen,
    /// H from the H to the left minus the read-gap open cost.
    OallReadOpen,
    /// F (or H) from the F above minus the reference-gap extend cost.
    RfgapExtend,
    /// E (or H) from the E to the left minus the read-gap extend cost.
    RdgapExtend,
}

/// Outcome of analyzing one cell.
#[derive(Debug, Clone, Copy)]
pub struct CellDecision {
    /// No way to backtrack from this cell.
    pub empty: bool,
    /// The chosen transition, when one exists.
    pub cur: Option<BtTransition>,
    /// More than one legal option existed and one was picked at random.
    pub branch: bool,
    /// Whether an alignment may terminate here: true only if the cell had
    /// no legal predecessors *ab initio*, not because its options were
    /// consumed by earlier walks.
    pub can_move_thru: bool,
    /// The cell was part of an already-reported alignment.
    pub reported_thru: bool,
}

/// One element of an alignment transcript, in read order after the walk
/// reverses it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BtOp {
    /// Read character `row` aligned to reference character `col`.
    Align { row: usize, col: usize },
    /// Gap in the read; reference character `col` consumed.
    ReadGap { col: usize },
    /// Gap in the reference; read character `row` consumed.
    RefGap { row: usize },
}

/// A reconstructed alignment from one solution cell.
#[derive(Debug, Clone)]
pub struct Alignment {
    pub score: TAlScore,
    /// First (row, col) cell of the alignment.
    pub row_start: usize,
    pub col_start: usize,
    /// Solution cell the walk started from.
    pub row_end: usize,
    pub col_end: usize,
    /// Transcript in read order.
    pub ops: Vec<BtOp>,
}

impl Alignment {
    /// Collapse the transcript into (op, run-length) pairs using the
    /// conventional M/D/I encoding.
    pub fn to_cigar(&self) -> Vec<(u8, u32)> {
        let mut cigar: Vec<(u8, u32)> = Vec::new();
        for op in &self.ops {
            let c = match op {
                BtOp::Align { .. } => b'M',
                BtOp::ReadGap { .. } => b'D',
                BtOp::RefGap { .. } => b'I',
            };
            match cigar.last_mut() {
                Some((last, n)) if *last == c => *n += 1,
                _ => cigar.push((c, 1)),
            }
        }
        cigar
    }
}

/// Walk one alignment back from solution cell (`row`, `col`).
///
/// Returns `Ok(None)` when the walk runs into consumed state (a
/// reported-through cell or an exhausted branch) — the alignment is simply
/// not reported. A transition that would leave the matrix is a scoring
/// inconsistency and comes back as [`AlignError::BacktraceUnderflow`].
#[allow(clippy::too_many_arguments)]
pub(crate) fn backtrace_from<R: Rng>(
    mat: &mut SSEMatrix,
    sc: &Scoring,
    read: &[u8],
    quals: &[u8],
    refw: &[u8],
    mode: AlignMode,
    start_row: usize,
    start_col: usize,
    offsetsc: TAlScore,
    floorsc: TAlScore,
    met: &mut SSEMetrics,
    rng: &mut R,
) -> Result<Option<Alignment>, AlignError> {
    debug_assert!(start_row < mat.nrow() && start_col < mat.ncol());
    met.bt += 1;
    let score = mat.helt(start_row, start_col) as TAlScore + offsetsc;
    let mut row = start_row;
    let mut col = start_col;
    let mut ct = SSEMatrix::H;
    let mut ops: Vec<BtOp> = Vec::new();
    let mut touched: Vec<(usize, usize)> = vec![(row, col)];

    loop {
        met.btcell += 1;
        // In local mode a cell at the score floor is outside the
        // alignment; by construction the walk never steps into one, so
        // this only guards the degenerate start cell.
        if matches!(mode, AlignMode::Local)
            && ct == SSEMatrix::H
            && (mat.helt(row, col) as TAlScore + offsetsc) <= floorsc
        {
            break;
        }
        let d = mat.analyze_cell(
            row,
            col,
            ct,
            refw[col],
            read[row],
            quals[row],
            sc,
            offsetsc,
            floorsc,
            rng,
        );
        if d.reported_thru {
            met.btfail += 1;
            return Ok(None);
        }
        if d.empty {
            if !d.can_move_thru {
                // Options were consumed by earlier reported alignments.
                met.btfail += 1;
                return Ok(None);
            }
            if ct != SSEMatrix::H {
                return Err(AlignError::BacktraceUnderflow { row, col });
            }
            if row > 0 && matches!(mode, AlignMode::EndToEnd) {
                return Err(AlignError::BacktraceUnderflow { row, col });
            }
            // Origin cell: it aligns its own read/reference pair.
            ops.push(BtOp::Align { row, col });
            break;
        }
        let cur = match d.cur {
            Some(c) => c,
            None => return Err(AlignError::BacktraceUnderflow { row, col }),
        };
        match cur {
            BtTransition::OallDiag => {
                if row == 0 || col == 0 {
                    return Err(AlignError::BacktraceUnderflow { row, col });
                }
                ops.push(BtOp::Align { row, col });
                row -= 1;
                col -= 1;
                ct = SSEMatrix::H;
            }
            BtTransition::OallRefOpen => {
                if row == 0 {
                    return Err(AlignError::BacktraceUnderflow { row, col });
                }
                ops.push(BtOp::RefGap { row });
                row -= 1;
                ct = SSEMatrix::H;
            }
            BtTransition::RfgapExtend => {
                if row == 0 {
                    return Err(AlignError::BacktraceUnderflow { row, col });
                }
                ops.push(BtOp::RefGap { row });
                row -= 1;
                ct = SSEMatrix::F;
            }
            BtTransition::OallReadOpen => {
                if col == 0 {
                    return Err(AlignError::BacktraceUnderflow { row, col });
                }
                ops.push(BtOp::ReadGap { col });
                col -= 1;
                ct = SSEMatrix::H;
            }
            BtTransition::RdgapExtend => {
                if col == 0 {
                    return Err(AlignError::BacktraceUnderflow { row, col });
                }
                ops.push(BtOp::ReadGap { col });
                col -= 1;
                ct = SSEMatrix::E;
            }
        }
        touched.push((row, col));
    }

    for (r, c) in touched {
        mat.set_reported_through(r, c);
    }
    met.btsucc += 1;
    ops.reverse();
    Ok(Some(Alignment {
        score,
        row_start: row,
        col_start: col,
        row_end: start_row,
        col_end: start_col,
        ops,
    }))
}
