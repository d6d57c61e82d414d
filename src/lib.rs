//! Striped SIMD local/global aligner core for a short-read mapper.
//!
//! Given a DNA read, a candidate reference window, per-base qualities and
//! a scoring scheme, the engine fills an affine-gap DP matrix with
//! 128-bit striped vectors, detects whether any cell reaches the minimum
//! acceptable score, and reconstructs one alignment per reported solution
//! cell with a randomized, resumable backtrace.
//!
//! Seeding, read I/O, SAM emission and everything else around the DP core
//! are external collaborators; this crate only exposes the in-process
//! aligner surface.

pub mod alignment;
pub mod cohort;
pub mod compute;
pub mod errors;
pub mod random;
pub mod scoring;

pub use alignment::{AlignMode, Alignment, SwAligner};
pub use errors::AlignError;
pub use scoring::Scoring;
