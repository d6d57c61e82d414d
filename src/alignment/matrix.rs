//! Dense DP matrix storage for the striped aligner.
//!
//! Matrix memory layout:
//!
//! - Cell scores are packed into 128-bit vectors ([`Vec128`]).
//! - Vectors are packed into quartets; quartet members are one vector from
//!   E, one from F, one from H, and one temporary ("TMP").
//! - Quartets are packed into columns; the number of quartets per column is
//!   the number of query stripes (`nvecrow`).
//!
//! The TMP member serves two purposes. The TMP vectors of the first column
//! stage the initial column of H values before the fill starts. A parallel
//! array of 16-bit mask words (one per logical cell) carries the backtrace
//! state: which cells have been reported through, and the remaining legal
//! predecessor choices memoized per cell type.

use rand::Rng;

use crate::alignment::backtrace::{BtTransition, CellDecision};
use crate::compute::simd_abstraction::portable_intrinsics as simd;
use crate::compute::simd_abstraction::Vec128;
use crate::random::{next_u2, rand_from_mask};
use crate::scoring::{ref_code_to_mask, Scoring, TAlScore};

/// Number of vectors per matrix cell (E, F, H, TMP).
const NVEC_PER_CELL: usize = 4;

/// Striped DP matrix of E/F/H vector quartets plus per-cell backtrace
/// mask words.
///
/// A matrix instance is owned by one thread and recycled between candidate
/// alignments: [`SSEMatrix::init`] resizes the existing buffers rather than
/// reallocating them.
pub struct SSEMatrix {
    inited: bool,
    nrow: usize,
    ncol: usize,
    nvecrow: usize,
    wperv: usize,
    colstride: usize,
    rowstride: usize,
    buf: Vec<Vec128>,
    masks: Vec<u16>,
}

impl SSEMatrix {
    /// Quartet index of the E (read-gap) vector.
    pub const E: usize = 0;
    /// Quartet index of the F (reference-gap) vector.
    pub const F: usize = 1;
    /// Quartet index of the H (overall) vector.
    pub const H: usize = 2;
    /// Quartet index of the temporary vector.
    pub const TMP: usize = 3;

    pub fn new() -> SSEMatrix {
        SSEMatrix {
            inited: false,
            nrow: 0,
            ncol: 0,
            nvecrow: 0,
            wperv: 0,
            colstride: 0,
            rowstride: NVEC_PER_CELL,
            buf: Vec::new(),
            masks: Vec::new(),
        }
    }

    /// Size the matrix for an `nrow` x `ncol` fill with `wperv` score words
    /// per vector (16 for 8-bit scores, 8 for 16-bit scores).
    ///
    /// Existing buffers are reused when large enough. All vectors are
    /// zeroed; mask words are only cleared by [`SSEMatrix::init_masks`].
    pub fn init(&mut self, nrow: usize, ncol: usize, wperv: usize) {
        debug_assert!(nrow > 0 && ncol > 0);
        debug_assert!(wperv == 8 || wperv == 16);
        self.nrow = nrow;
        self.ncol = ncol;
        self.wperv = wperv;
        self.nvecrow = nrow.div_ceil(wperv);
        self.colstride = self.nvecrow * NVEC_PER_CELL;
        let nvec = self.colstride * ncol;
        let zero = unsafe { simd::setzero() };
        self.buf.clear();
        self.buf.resize(nvec, zero);
        self.masks.resize(nrow * ncol, 0);
        debug_assert!(self.buf.as_ptr() as usize % 16 == 0);
        self.inited = true;
    }

    #[inline]
    pub fn nrow(&self) -> usize {
        self.nrow
    }

    #[inline]
    pub fn ncol(&self) -> usize {
        self.ncol
    }

    #[inline]
    pub fn nvecrow(&self) -> usize {
        self.nvecrow
    }

    #[inline]
    pub fn wperv(&self) -> usize {
        self.wperv
    }

    #[inline]
    pub fn colstride(&self) -> usize {
        self.colstride
    }

    #[inline]
    pub fn rowstride(&self) -> usize {
        self.rowstride
    }

    /// Pointer to the vector for (`stripe`, `col`, quartet member `which`).
    /// All stride math funnels through here.
    #[inline]
    pub(crate) fn at(&mut self, stripe: usize, col: usize, which: usize) -> *mut Vec128 {
        debug_assert!(self.inited);
        debug_assert!(stripe < self.nvecrow);
        debug_assert!(col < self.ncol);
        debug_assert!(which < NVEC_PER_CELL);
        let idx = col * self.colstride + stripe * self.rowstride + which;
        unsafe { self.buf.as_mut_ptr().add(idx) }
    }

    /// Score element at logical (`row`, `col`) in matrix `mat` (E, F or H).
    ///
    /// Reads a u8 word when `wperv == 16`, an i16 word when `wperv == 8`.
    #[inline]
    pub fn elt(&self, row: usize, col: usize, mat: usize) -> i32 {
        debug_assert!(self.inited);
        debug_assert!(row < self.nrow);
        debug_assert!(col < self.ncol);
        debug_assert!(mat < Self::TMP);
        let lane = row / self.nvecrow;
        let stripe = row % self.nvecrow;
        let idx = col * self.colstride + stripe * self.rowstride + mat;
        unsafe {
            let p = self.buf.as_ptr().add(idx);
            if self.wperv == 16 {
                *(p as *const u8).add(lane) as i32
            } else {
                *(p as *const i16).add(lane) as i32
            }
        }
    }

    /// E element at (`row`, `col`).
    #[inline]
    pub fn eelt(&self, row: usize, col: usize) -> i32 {
        self.elt(row, col, Self::E)
    }

    /// F element at (`row`, `col`).
    #[inline]
    pub fn felt(&self, row: usize, col: usize) -> i32 {
        self.elt(row, col, Self::F)
    }

    /// H element at (`row`, `col`).
    #[inline]
    pub fn helt(&self, row: usize, col: usize) -> i32 {
        self.elt(row, col, Self::H)
    }

    /// Clear every mask word. Called once before each backtrace phase.
    pub fn init_masks(&mut self) {
        debug_assert!(self.inited);
        self.masks.iter_mut().for_each(|m| *m = 0);
    }

    #[inline]
    fn mask_word(&self, row: usize, col: usize) -> u16 {
        debug_assert!(row < self.nrow && col < self.ncol);
        self.masks[row * self.ncol + col]
    }

    /// Whether the cell was already part of a reported alignment.
    #[inline]
    pub fn reported_through(&self, row: usize, col: usize) -> bool {
        self.mask_word(row, col) & 1 != 0
    }

    /// Mark the cell as part of a reported alignment.
    #[inline]
    pub fn set_reported_through(&mut self, row: usize, col: usize) {
        self.masks[row * self.ncol + col] |= 1;
    }

    /// Whether the H remaining-options mask was stored for this cell.
    #[inline]
    pub fn is_h_mask_set(&self, row: usize, col: usize) -> bool {
        self.mask_word(row, col) & (1 << 1) != 0
    }

    /// Store the 5-bit mask of remaining legal H backtrack choices.
    #[inline]
    pub fn h_mask_set(&mut self, row: usize, col: usize, mask: u32) {
        debug_assert!(mask < 32);
        let w = &mut self.masks[row * self.ncol + col];
        *w &= !(0x3f << 1);
        *w |= (1 << 1) | ((mask as u16) << 2);
    }

    /// Stored 5-bit H mask.
    #[inline]
    pub fn h_mask(&self, row: usize, col: usize) -> u32 {
        ((self.mask_word(row, col) >> 2) & 31) as u32
    }

    /// Whether the E remaining-options mask was stored for this cell.
    #[inline]
    pub fn is_e_mask_set(&self, row: usize, col: usize) -> bool {
        self.mask_word(row, col) & (1 << 7) != 0
    }

    /// Store the 2-bit mask of remaining legal E backtrack choices.
    #[inline]
    pub fn e_mask_set(&mut self, row: usize, col: usize, mask: u32) {
        debug_assert!(mask < 4);
        let w = &mut self.masks[row * self.ncol + col];
        *w &= !(0x7 << 7);
        *w |= (1 << 7) | ((mask as u16) << 8);
    }

    /// Stored 2-bit E mask.
    #[inline]
    pub fn e_mask(&self, row: usize, col: usize) -> u32 {
        ((self.mask_word(row, col) >> 8) & 3) as u32
    }

    /// Whether the F remaining-options mask was stored for this cell.
    #[inline]
    pub fn is_f_mask_set(&self, row: usize, col: usize) -> bool {
        self.mask_word(row, col) & (1 << 10) != 0
    }

    /// Store the 2-bit mask of remaining legal F backtrack choices.
    #[inline]
    pub fn f_mask_set(&mut self, row: usize, col: usize, mask: u32) {
        debug_assert!(mask < 4);
        let w = &mut self.masks[row * self.ncol + col];
        *w &= !(0x7 << 10);
        *w |= (1 << 10) | ((mask as u16) << 11);
    }

    /// Stored 2-bit F mask.
    #[inline]
    pub fn f_mask(&self, row: usize, col: usize) -> u32 {
        ((self.mask_word(row, col) >> 11) & 3) as u32
    }

    /// Analyze a cell of the filled matrix during backtrace: determine the
    /// set of legal predecessor transitions consistent with the stored
    /// scores, memoize it, and pick one (uniformly at random among ties).
    ///
    /// Cells we can backtrack *from* must not end a backtrace, but cells
    /// whose options were consumed by earlier branches have to be told
    /// apart from cells that never had any: only the latter may terminate
    /// an alignment (`can_move_thru`).
    ///
    /// `offsetsc` converts stored words to real scores; `floorsc` is the
    /// local-mode score floor (far below any real score in end-to-end
    /// mode). Row 0 is terminal by contract: `empty` and `can_move_thru`
    /// both report true and no transition is produced.
    #[allow(clippy::too_many_arguments)]
    pub fn analyze_cell<R: Rng>(
        &mut self,
        row: usize,
        col: usize,
        ct: usize,
        refc: u8,
        readc: u8,
        readq: u8,
        sc: &Scoring,
        offsetsc: TAlScore,
        floorsc: TAlScore,
        rng: &mut R,
    ) -> CellDecision {
        let mut d = CellDecision {
            empty: false,
            cur: None,
            branch: false,
            can_move_thru: true,
            reported_thru: false,
        };
        d.reported_thru = self.reported_through(row, col);
        if d.reported_thru {
            d.can_move_thru = false;
            return d;
        }
        if row == 0 {
            d.empty = true;
            return d;
        }
        let row_from_end = self.nrow - row - 1;
        let gaps_allowed = row >= sc.gapbar as usize && row_from_end >= sc.gapbar as usize;

        if ct == Self::E {
            // In the E matrix the incoming transition comes from the left:
            // a gap open from H or a gap extend from E.
            let sc_cur = self.eelt(row, col) as TAlScore + offsetsc;
            debug_assert!(gaps_allowed);
            debug_assert!(col > 0);
            let mut mask = 0u32;
            let sc_h_left = self.helt(row, col - 1) as TAlScore + offsetsc;
            if sc_h_left > floorsc && sc_h_left - sc.read_gap_open() as TAlScore == sc_cur {
                mask |= 1 << 0;
            }
            let sc_e_left = self.eelt(row, col - 1) as TAlScore + offsetsc;
            if sc_e_left > floorsc && sc_e_left - sc.read_gap_extend() as TAlScore == sc_cur {
                mask |= 1 << 1;
            }
            let orig_mask = mask;
            if self.is_e_mask_set(row, col) {
                mask = self.e_mask(row, col);
            }
            match mask {
                3 => {
                    if next_u2(rng) != 0 {
                        d.cur = Some(BtTransition::OallReadOpen);
                        self.e_mask_set(row, col, 2); // may extend later
                    } else {
                        d.cur = Some(BtTransition::RdgapExtend);
                        self.e_mask_set(row, col, 1); // may open later
                    }
                    d.branch = true;
                }
                2 => {
                    d.cur = Some(BtTransition::RdgapExtend);
                    self.e_mask_set(row, col, 0);
                }
                1 => {
                    d.cur = Some(BtTransition::OallReadOpen);
                    self.e_mask_set(row, col, 0);
                }
                _ => {
                    d.empty = true;
                    d.can_move_thru = orig_mask == 0;
                }
            }
            debug_assert!(!d.empty || !d.can_move_thru || orig_mask == 0);
        } else if ct == Self::F {
            // In the F matrix the incoming transition comes from above:
            // a gap open from H or a gap extend from F.
            let sc_cur = self.felt(row, col) as TAlScore + offsetsc;
            debug_assert!(gaps_allowed);
            let mut mask = 0u32;
            let sc_h_up = self.helt(row - 1, col) as TAlScore + offsetsc;
            if sc_h_up > floorsc && sc_h_up - sc.ref_gap_open() as TAlScore == sc_cur {
                mask |= 1 << 0;
            }
            let sc_f_up = self.felt(row - 1, col) as TAlScore + offsetsc;
            if sc_f_up > floorsc && sc_f_up - sc.ref_gap_extend() as TAlScore == sc_cur {
                mask |= 1 << 1;
            }
            let orig_mask = mask;
            if self.is_f_mask_set(row, col) {
                mask = self.f_mask(row, col);
            }
            match mask {
                3 => {
                    if next_u2(rng) != 0 {
                        d.cur = Some(BtTransition::OallRefOpen);
                        self.f_mask_set(row, col, 2);
                    } else {
                        d.cur = Some(BtTransition::RfgapExtend);
                        self.f_mask_set(row, col, 1);
                    }
                    d.branch = true;
                }
                2 => {
                    d.cur = Some(BtTransition::RfgapExtend);
                    self.f_mask_set(row, col, 0);
                }
                1 => {
                    d.cur = Some(BtTransition::OallRefOpen);
                    self.f_mask_set(row, col, 0);
                }
                _ => {
                    d.empty = true;
                    d.can_move_thru = orig_mask == 0;
                }
            }
        } else {
            debug_assert!(ct == Self::H);
            let sc_cur = self.helt(row, col) as TAlScore + offsetsc;
            let sc_f_up = self.felt(row - 1, col) as TAlScore + offsetsc;
            let sc_h_up = self.helt(row - 1, col) as TAlScore + offsetsc;
            let sc_h_left = if col > 0 {
                self.helt(row, col - 1) as TAlScore + offsetsc
            } else {
                floorsc
            };
            let sc_e_left = if col > 0 {
                self.eelt(row, col - 1) as TAlScore + offsetsc
            } else {
                floorsc
            };
            let sc_h_upleft = if col > 0 {
                self.helt(row - 1, col - 1) as TAlScore + offsetsc
            } else {
                floorsc
            };
            let sc_diag = sc.score(readc, ref_code_to_mask(refc), readq as i32 - 33);
            let mut mask = 0u32;
            if gaps_allowed {
                if sc_h_up > floorsc && sc_cur == sc_h_up - sc.ref_gap_open() as TAlScore {
                    mask |= 1 << 0;
                }
                if sc_h_left > floorsc && sc_cur == sc_h_left - sc.read_gap_open() as TAlScore {
                    mask |= 1 << 1;
                }
                if sc_f_up > floorsc && sc_cur == sc_f_up - sc.ref_gap_extend() as TAlScore {
                    mask |= 1 << 2;
                }
                if sc_e_left > floorsc && sc_cur == sc_e_left - sc.read_gap_extend() as TAlScore {
                    mask |= 1 << 3;
                }
            }
            if sc_h_upleft > floorsc && sc_cur == sc_h_upleft + sc_diag {
                mask |= 1 << 4;
            }
            let orig_mask = mask;
            if self.is_h_mask_set(row, col) {
                mask = self.h_mask(row, col);
            }
            debug_assert!(gaps_allowed || mask == 1 << 4 || mask == 0);
            let opts = mask.count_ones();
            let mut select = None;
            if opts == 1 {
                select = Some(mask.trailing_zeros());
                self.h_mask_set(row, col, 0);
            } else if opts > 1 {
                let bit = rand_from_mask(rng, mask);
                select = Some(bit);
                mask &= !(1 << bit);
                self.h_mask_set(row, col, mask);
                d.branch = true;
            }
            match select {
                Some(4) => d.cur = Some(BtTransition::OallDiag),
                Some(0) => d.cur = Some(BtTransition::OallRefOpen),
                Some(1) => d.cur = Some(BtTransition::OallReadOpen),
                Some(2) => d.cur = Some(BtTransition::RfgapExtend),
                Some(3) => d.cur = Some(BtTransition::RdgapExtend),
                Some(_) => unreachable!(),
                None => {
                    d.empty = true;
                    d.can_move_thru = orig_mask == 0;
                }
            }
        }
        d
    }
}

impl Default for SSEMatrix {
    fn default() -> Self {
        Self::new()
    }
}
