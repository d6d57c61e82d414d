//! Striped query profiles.
//!
//! For each of the five reference letters (A, C, G, T, N) the profile
//! precomputes one vector per query stripe whose lane `k` holds the
//! match/mismatch contribution of query position `k * nvecrow + stripe`
//! against that letter. The 8-bit profile is bias-shifted so unsigned
//! saturating arithmetic can be used; the 16-bit profile stores signed
//! contributions directly.
//!
//! The profile also precomputes the gap-barrier masks: per-stripe lane
//! masks that are all-ones where a gap may occupy the row and all-zeros
//! within `gapbar` rows of either read end (and in padding lanes).

use crate::compute::simd_abstraction::portable_intrinsics as simd;
use crate::compute::simd_abstraction::Vec128;
use crate::errors::AlignError;
use crate::scoring::{ref_code_to_mask, Scoring};

/// Lanes per vector in 8-bit mode.
pub const WPERV_U8: usize = 16;
/// Lanes per vector in 16-bit mode.
pub const WPERV_I16: usize = 8;

/// Padding value for 16-bit profile lanes past the read end: strongly
/// negative so padding rows decay instead of competing, but far enough
/// from `i16::MIN` that a saturating add cannot wrap.
const PAD_I16: i16 = i16::MIN / 4;

/// Per-read precomputed profile shared by the 8- and 16-bit fillers.
pub struct QueryProfile {
    rdlen: usize,
    bias: i32,
    max_pen: i32,
    max_bonus: i32,
    nvecrow8: usize,
    nvecrow16: usize,
    prof8: Vec<Vec128>,
    prof16: Vec<Vec128>,
    gbar8: Vec<Vec128>,
    gbar16: Vec<Vec128>,
}

impl QueryProfile {
    /// Build the profile for `read` (codes 0..=4) with ASCII qualities
    /// `quals` under scheme `sc`.
    pub fn build(read: &[u8], quals: &[u8], sc: &Scoring) -> Result<QueryProfile, AlignError> {
        if read.is_empty() {
            return Err(AlignError::InvalidConfiguration(
                "empty read".to_string(),
            ));
        }
        if read.len() != quals.len() {
            return Err(AlignError::InvalidConfiguration(format!(
                "read length {} != quality length {}",
                read.len(),
                quals.len()
            )));
        }
        let m = read.len();
        let nvecrow8 = m.div_ceil(WPERV_U8);
        let nvecrow16 = m.div_ceil(WPERV_I16);

        // Lane contributions for every (letter, position) pair, and the
        // extremes that size the unsigned bias.
        let mut costs = vec![0i32; 5 * m];
        let mut min_cost = 0i32;
        let mut max_cost = 0i32;
        for letter in 0..5u8 {
            for i in 0..m {
                let q = quals[i] as i32 - 33;
                let c = sc.score(read[i], ref_code_to_mask(letter), q) as i32;
                costs[letter as usize * m + i] = c;
                min_cost = min_cost.min(c);
                max_cost = max_cost.max(c);
            }
        }
        let bias = -min_cost.min(0);
        let max_pen = bias;
        let max_bonus = max_cost.max(0);

        let mut prof8 = Vec::with_capacity(5 * nvecrow8);
        let mut prof16 = Vec::with_capacity(5 * nvecrow16);
        for letter in 0..5usize {
            for stripe in 0..nvecrow8 {
                let mut lanes = [0u8; WPERV_U8];
                for (k, lane) in lanes.iter_mut().enumerate() {
                    let i = k * nvecrow8 + stripe;
                    if i < m {
                        // Callers check the biased range before running the
                        // 8-bit fill; clamp is only a safety net here.
                        *lane = (costs[letter * m + i] + bias).clamp(0, 255) as u8;
                    }
                }
                prof8.push(unsafe { simd::loadu(lanes.as_ptr()) });
            }
            for stripe in 0..nvecrow16 {
                let mut lanes = [PAD_I16; WPERV_I16];
                for (k, lane) in lanes.iter_mut().enumerate() {
                    let i = k * nvecrow16 + stripe;
                    if i < m {
                        *lane = costs[letter * m + i] as i16;
                    }
                }
                prof16.push(unsafe { simd::loadu(lanes.as_ptr() as *const u8) });
            }
        }

        // A barrier larger than the read simply forbids gaps everywhere.
        let gapbar = sc.gapbar.max(0) as usize;
        let gap_row_ok = |i: usize| i < m && i >= gapbar && (m - 1 - i) >= gapbar;
        let mut gbar8 = Vec::with_capacity(nvecrow8);
        for stripe in 0..nvecrow8 {
            let mut lanes = [0u8; WPERV_U8];
            for (k, lane) in lanes.iter_mut().enumerate() {
                if gap_row_ok(k * nvecrow8 + stripe) {
                    *lane = 0xff;
                }
            }
            gbar8.push(unsafe { simd::loadu(lanes.as_ptr()) });
        }
        let mut gbar16 = Vec::with_capacity(nvecrow16);
        for stripe in 0..nvecrow16 {
            let mut lanes = [0i16; WPERV_I16];
            for (k, lane) in lanes.iter_mut().enumerate() {
                if gap_row_ok(k * nvecrow16 + stripe) {
                    *lane = -1;
                }
            }
            gbar16.push(unsafe { simd::loadu(lanes.as_ptr() as *const u8) });
        }

        Ok(QueryProfile {
            rdlen: m,
            bias,
            max_pen,
            max_bonus,
            nvecrow8,
            nvecrow16,
            prof8,
            prof16,
            gbar8,
            gbar16,
        })
    }

    #[inline]
    pub fn rdlen(&self) -> usize {
        self.rdlen
    }

    /// Amount added to every 8-bit profile lane so it fits an unsigned
    /// byte; subtracted back out inside the 8-bit fill.
    #[inline]
    pub fn bias(&self) -> i32 {
        self.bias
    }

    /// Largest penalty magnitude across the profile.
    #[inline]
    pub fn max_pen(&self) -> i32 {
        self.max_pen
    }

    /// Largest bonus across the profile.
    #[inline]
    pub fn max_bonus(&self) -> i32 {
        self.max_bonus
    }

    #[inline]
    pub fn nvecrow8(&self) -> usize {
        self.nvecrow8
    }

    #[inline]
    pub fn nvecrow16(&self) -> usize {
        self.nvecrow16
    }

    /// Biased 8-bit profile vector for `letter` at `stripe`.
    #[inline]
    pub(crate) fn vec8(&self, letter: usize, stripe: usize) -> Vec128 {
        debug_assert!(letter < 5 && stripe < self.nvecrow8);
        self.prof8[letter * self.nvecrow8 + stripe]
    }

    /// Signed 16-bit profile vector for `letter` at `stripe`.
    #[inline]
    pub(crate) fn vec16(&self, letter: usize, stripe: usize) -> Vec128 {
        debug_assert!(letter < 5 && stripe < self.nvecrow16);
        self.prof16[letter * self.nvecrow16 + stripe]
    }

    /// 8-bit gap-barrier mask for `stripe`.
    #[inline]
    pub(crate) fn gbar8(&self, stripe: usize) -> Vec128 {
        self.gbar8[stripe]
    }

    /// 16-bit gap-barrier mask for `stripe`.
    #[inline]
    pub(crate) fn gbar16(&self, stripe: usize) -> Vec128 {
        self.gbar16[stripe]
    }
}
