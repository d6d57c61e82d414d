//! SIMD abstraction layer.
//!
//! Exposes a single portable surface for the 128-bit vector operations the
//! striped DP kernels use, hiding the ISA differences between x86_64
//! (SSE2) and aarch64 (NEON). The aligner fixes its vector width at 128
//! bits with 8- or 16-bit lanes, so unlike wider-vector designs there is
//! no runtime engine dispatch here — both supported targets guarantee
//! their baseline instruction set.
//!
//! Callers interact with [`Vec128`] plus the free functions in
//! [`portable_intrinsics`]; every function is `unsafe` because loads and
//! stores take raw pointers into the matrix buffer.

pub mod portable_intrinsics;
pub mod types;

pub use types::Vec128;
