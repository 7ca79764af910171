//! Bit manipulation primitives for the metadata word codec.
//!
//! This module provides the rank/select operations the block codec is built
//! on. They are pure, total functions: out-of-range ranks yield the sentinel
//! position (64 for one word, 128 for two) instead of failing.
//!
//! # Performance Notes
//!
//! - [`popcount`] compiles to the `POPCNT` instruction on modern hardware
//! - [`select`] uses the clear-lowest-set-bit loop (`BLSR` on x86) followed
//!   by a trailing-zero count; with ranks bounded by the number of buckets
//!   per block it stays a handful of cycles per call
//!
//! # Usage
//!
//! These primitives locate bucket run boundaries inside a block's metadata
//! word: the `b`-th set bit marks the end of bucket `b`'s run.

#![allow(clippy::pedantic)]

/// Count the number of set bits (1s) in a u64 value.
///
/// # Examples
///
/// ```
/// use vqfilter::util::bitops::popcount;
///
/// assert_eq!(popcount(0b1010), 2);
/// assert_eq!(popcount(0), 0);
/// assert_eq!(popcount(u64::MAX), 64);
/// ```
#[inline(always)]
#[must_use]
pub const fn popcount(word: u64) -> u32 {
    word.count_ones()
}

/// Position of the `rank`-th set bit of `word` (0-based), or 64 if `word`
/// has fewer than `rank + 1` set bits.
///
/// `select(word, 0)` is the position of the lowest set bit.
///
/// # Examples
///
/// ```
/// use vqfilter::util::bitops::select;
///
/// assert_eq!(select(0b1011, 0), 0);
/// assert_eq!(select(0b1011, 1), 1);
/// assert_eq!(select(0b1011, 2), 3);
/// assert_eq!(select(0b1011, 3), 64); // only three set bits
/// assert_eq!(select(0, 0), 64);
/// ```
#[inline]
#[must_use]
pub const fn select(word: u64, rank: u32) -> u32 {
    let mut w = word;
    let mut r = 0;
    while r < rank {
        // Clear the lowest set bit; stays 0 once exhausted.
        w &= w.wrapping_sub(1);
        r += 1;
    }
    w.trailing_zeros()
}

/// Position of the `rank`-th set bit across a 128-bit value, or 128 if there
/// are fewer than `rank + 1` set bits.
///
/// The low word is searched first; ranks that fall past its population carry
/// into the high word. Kept alongside [`select`] because removal offset math
/// is specified over the two-word view.
///
/// # Examples
///
/// ```
/// use vqfilter::util::bitops::select_128;
///
/// let v = (0b1u128 << 70) | 0b101;
/// assert_eq!(select_128(v, 0), 0);
/// assert_eq!(select_128(v, 1), 2);
/// assert_eq!(select_128(v, 2), 70);
/// assert_eq!(select_128(v, 3), 128);
/// ```
#[inline]
#[must_use]
pub const fn select_128(value: u128, rank: u32) -> u32 {
    let low = value as u64;
    let low_ones = low.count_ones();
    if rank < low_ones {
        return select(low, rank);
    }
    let high = (value >> 64) as u64;
    let pos = select(high, rank - low_ones);
    if pos == 64 {
        128
    } else {
        64 + pos
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_popcount() {
        assert_eq!(popcount(0), 0);
        assert_eq!(popcount(1), 1);
        assert_eq!(popcount(0b1111_0000), 4);
        assert_eq!(popcount(u64::MAX), 64);
        assert_eq!(popcount(1 << 63), 1);
    }

    #[test]
    fn test_select_basic() {
        let w = 0b1001_0110u64;
        assert_eq!(select(w, 0), 1);
        assert_eq!(select(w, 1), 2);
        assert_eq!(select(w, 2), 4);
        assert_eq!(select(w, 3), 7);
        assert_eq!(select(w, 4), 64);
    }

    #[test]
    fn test_select_all_ones() {
        for rank in 0..64 {
            assert_eq!(select(u64::MAX, rank), rank);
        }
    }

    #[test]
    fn test_select_empty_word() {
        assert_eq!(select(0, 0), 64);
        assert_eq!(select(0, 17), 64);
    }

    #[test]
    fn test_select_high_bit() {
        assert_eq!(select(1 << 63, 0), 63);
        assert_eq!(select(1 << 63, 1), 64);
    }

    #[test]
    fn test_select_agrees_with_naive_scan() {
        // Cross-check against a bit-by-bit reference on a few mixed words.
        let words = [
            0x5bd1_e995_0f0f_0f0fu64,
            0x8000_0000_0000_0001,
            0x00ff_ff00_00ff_ff00,
        ];
        for &w in &words {
            let mut rank = 0;
            for pos in 0..64u32 {
                if w & (1 << pos) != 0 {
                    assert_eq!(select(w, rank), pos, "word {w:#x} rank {rank}");
                    rank += 1;
                }
            }
            assert_eq!(select(w, rank), 64);
        }
    }

    #[test]
    fn test_select_128_low_word() {
        assert_eq!(select_128(0b1010, 0), 1);
        assert_eq!(select_128(0b1010, 1), 3);
    }

    #[test]
    fn test_select_128_crosses_words() {
        let v = (u128::from(u64::MAX) << 64) | 0b1;
        assert_eq!(select_128(v, 0), 0);
        assert_eq!(select_128(v, 1), 64);
        assert_eq!(select_128(v, 64), 127);
        assert_eq!(select_128(v, 65), 128);
    }

    #[test]
    fn test_select_128_empty() {
        assert_eq!(select_128(0, 0), 128);
        assert_eq!(select_128(0, 100), 128);
    }

    #[test]
    fn test_select_128_consistent_with_select() {
        // For values that fit in the low word the two selects must agree.
        let w = 0x0123_4567_89ab_cdefu64;
        for rank in 0..popcount(w) {
            assert_eq!(select_128(u128::from(w), rank), select(w, rank));
        }
    }
}
