//! Random tie-breaking helpers for the backtrace.
//!
//! The backtrace walks one alignment per solution cell, choosing uniformly
//! among equally-scoring predecessor transitions. These helpers adapt any
//! [`rand::Rng`] to the two choice shapes the cell analysis needs: a coin
//! flip between two options and a uniform pick among the set bits of a
//! small legality mask.

use rand::Rng;

/// Uniform coin flip; returns 0 or 1.
pub fn next_u2<R: Rng>(rng: &mut R) -> u32 {
    rng.gen_range(0..2)
}

/// Pick one set bit of `mask` uniformly at random and return its index.
///
/// `mask` must be non-zero.
pub fn rand_from_mask<R: Rng>(rng: &mut R, mask: u32) -> u32 {
    debug_assert!(mask != 0, "rand_from_mask on empty mask");
    let nopts = mask.count_ones();
    let mut pick = rng.gen_range(0..nopts);
    let mut m = mask;
    loop {
        let bit = m.trailing_zeros();
        if pick == 0 {
            return bit;
        }
        pick -= 1;
        m &= !(1u32 << bit);
    }
}
