use std::ops::Range;

/// mask of the lower `width` bits. `width` may be anything in `0..=64`.
#[inline]
pub const fn bit_range_lower(width: u32) -> u64 {
    if width >= u64::BITS {
        u64::MAX
    } else {
        (1 << width) - 1
    }
}

/// logical right shift, saturating to zero once every bit is shifted out.
#[inline]
pub const fn shr(bin: u64, amount: u32) -> u64 {
    if amount >= u64::BITS {
        0
    } else {
        bin >> amount
    }
}

/// bits `r.start..r.end` of `bin` (end exclusive), moved down to bit 0.
#[inline]
pub const fn extract(bin: u64, r: Range<u32>) -> u64 {
    shr(bin, r.start) & bit_range_lower(r.end - r.start)
}
