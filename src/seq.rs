//! TCP sequence number arithmetic
//!
//! Sequence numbers live in a wrapping 32-bit space. Two values compare by the
//! sign of their wrapping difference, so ordering holds across the wrap as long
//! as they are less than 2^31 apart.

/// `a > b` in sequence space
#[inline]
pub fn seq_gt(a: u32, b: u32) -> bool {
    (a.wrapping_sub(b) as i32) > 0
}

/// `a >= b` in sequence space
#[inline]
pub fn seq_ge(a: u32, b: u32) -> bool {
    (a.wrapping_sub(b) as i32) >= 0
}

/// `a < b` in sequence space
#[inline]
pub fn seq_lt(a: u32, b: u32) -> bool {
    (a.wrapping_sub(b) as i32) < 0
}

/// `a <= b` in sequence space
#[inline]
pub fn seq_le(a: u32, b: u32) -> bool {
    (a.wrapping_sub(b) as i32) <= 0
}

/// Distance from `b` forward to `a`
#[inline]
pub fn seq_sub(a: u32, b: u32) -> u32 {
    a.wrapping_sub(b)
}
