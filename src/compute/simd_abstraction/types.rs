//! 128-bit vector type shared by both supported architectures.
//!
//! On x86_64 `Vec128` is the native `__m128i`. On aarch64 it is a
//! `#[repr(transparent)]` wrapper around `uint8x16_t` with reinterpret
//! helpers, so the portable ops can move between element widths without
//! lane reordering (every cast is a plain bit reinterpretation).

#[cfg(target_arch = "x86_64")]
pub use std::arch::x86_64 as simd_arch;

#[cfg(target_arch = "aarch64")]
pub use std::arch::aarch64 as simd_arch;

/// 128-bit integer vector; the unit of DP matrix storage.
#[cfg(target_arch = "x86_64")]
pub type Vec128 = simd_arch::__m128i;

/// 128-bit integer vector; the unit of DP matrix storage.
#[cfg(target_arch = "aarch64")]
#[derive(Copy, Clone)]
#[repr(transparent)]
pub struct Vec128(pub simd_arch::uint8x16_t);

#[cfg(target_arch = "aarch64")]
impl Vec128 {
    /// View as unsigned 8-bit lanes.
    #[inline]
    pub fn as_u8(self) -> simd_arch::uint8x16_t {
        self.0
    }

    /// Construct from unsigned 8-bit lanes.
    #[inline]
    pub fn from_u8(v: simd_arch::uint8x16_t) -> Self {
        Self(v)
    }

    /// View as signed 16-bit lanes.
    #[inline]
    pub fn as_s16(self) -> simd_arch::int16x8_t {
        unsafe { simd_arch::vreinterpretq_s16_u8(self.0) }
    }

    /// Construct from signed 16-bit lanes.
    #[inline]
    pub fn from_s16(v: simd_arch::int16x8_t) -> Self {
        Self(unsafe { simd_arch::vreinterpretq_u8_s16(v) })
    }

    /// View as unsigned 16-bit lanes.
    #[inline]
    pub fn as_u16(self) -> simd_arch::uint16x8_t {
        unsafe { simd_arch::vreinterpretq_u16_u8(self.0) }
    }

    /// Construct from unsigned 16-bit lanes.
    #[inline]
    pub fn from_u16(v: simd_arch::uint16x8_t) -> Self {
        Self(unsafe { simd_arch::vreinterpretq_u8_u16(v) })
    }

    /// View as unsigned 32-bit lanes.
    #[inline]
    pub fn as_u32(self) -> simd_arch::uint32x4_t {
        unsafe { simd_arch::vreinterpretq_u32_u8(self.0) }
    }

    /// Construct from unsigned 32-bit lanes.
    #[inline]
    pub fn from_u32(v: simd_arch::uint32x4_t) -> Self {
        Self(unsafe { simd_arch::vreinterpretq_u8_u32(v) })
    }
}

#[cfg(target_arch = "aarch64")]
impl std::fmt::Debug for Vec128 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let bytes: [u8; 16] = unsafe { std::mem::transmute(self.0) };
        write!(f, "Vec128({:?})", bytes)
    }
}
