//! Fixed filter geometry and hash-to-bucket addressing.
//!
//! The geometry is deliberately rigid: a block is one cache line holding a
//! 64-bit metadata word plus 28 two-byte tag cells, addressed by 36 logical
//! buckets. These constants are load-bearing: the unary metadata encoding
//! only fits because `BUCKETS_PER_BLOCK + SLOTS_PER_BLOCK` equals the
//! metadata word width.
//!
//! # Addressing
//!
//! A 64-bit hash is first reduced modulo the filter's `range`, then split:
//! the low [`TAG_BITS`] become the stored tag, the remaining bits the
//! primary bucket index. The alternate bucket is a deterministic permutation
//! of the hash obtained by XOR-ing in the tag scaled by a fixed odd
//! multiplier. The multiplier value is part of the format: two builds must
//! route equal hashes to equal bucket pairs.

#![allow(clippy::pedantic)]

/// Bits of hash remainder stored per slot.
pub const TAG_BITS: u32 = 8;

/// Mask selecting the tag out of a hash or a tag cell.
pub const TAG_MASK: u64 = (1 << TAG_BITS) - 1;

/// Physical tag slots per block.
pub const SLOTS_PER_BLOCK: usize = 28;

/// Logical buckets per block.
pub const BUCKETS_PER_BLOCK: u32 = 36;

/// Free-space threshold below which an insert must consider the alternate
/// block (75% of the slots occupied).
pub const CHECK_ALT_THRESHOLD: u32 = 43;

/// The metadata word's top bit doubles as the per-block writer lock.
pub const LOCK_MASK: u64 = 1 << 63;

/// The 63 low bits of the metadata word that carry the unary encoding.
pub const MD_MASK: u64 = !LOCK_MASK;

/// Metadata word of a freshly initialized block: every run empty, lock
/// clear.
pub const EMPTY_MD: u64 = MD_MASK;

/// Fixed odd multiplier mixing the tag into the alternate bucket
/// derivation. Changing it breaks compatibility with persisted filters.
pub(crate) const ALT_MULTIPLIER: u64 = 0x5bd1_e995;

/// The two candidate buckets and the tag derived from one hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct BucketPair {
    /// Primary bucket index in `[0, nblocks * BUCKETS_PER_BLOCK)`.
    pub bucket: u64,
    /// Alternate bucket index in the same space; may equal `bucket`.
    pub alt_bucket: u64,
    /// Low [`TAG_BITS`] of the reduced hash.
    pub tag: u8,
}

/// Split a caller-supplied hash into its bucket pair and tag.
///
/// `range` is `nblocks * BUCKETS_PER_BLOCK * 2^TAG_BITS`; the reduction
/// keeps both bucket indices inside the filter for any u64 input.
#[inline]
pub(crate) fn split_hash(hash: u64, range: u64) -> BucketPair {
    let reduced = hash % range;
    let tag = (reduced & TAG_MASK) as u8;
    let bucket = reduced >> TAG_BITS;
    let alt_bucket = ((reduced ^ (u64::from(tag) * ALT_MULTIPLIER)) % range) >> TAG_BITS;
    BucketPair {
        bucket,
        alt_bucket,
        tag,
    }
}

/// Block index owning a filter-wide bucket index.
#[inline]
pub(crate) fn block_of(bucket: u64) -> u64 {
    bucket / u64::from(BUCKETS_PER_BLOCK)
}

/// Bucket offset within its block.
#[inline]
pub(crate) fn offset_of(bucket: u64) -> u32 {
    (bucket % u64::from(BUCKETS_PER_BLOCK)) as u32
}

/// Pack a tag and its payload into the 16-bit cell stored in a slot: low
/// byte tag, high byte value.
#[inline]
pub(crate) fn stored_cell(tag: u8, val: u8) -> u16 {
    u16::from(val) << 8 | u16::from(tag)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_RANGE: u64 = 37 * 36 * 256; // 1024-slot filter

    #[test]
    fn test_geometry_fills_the_metadata_word() {
        assert_eq!(BUCKETS_PER_BLOCK as usize + SLOTS_PER_BLOCK, 64);
        assert_eq!(EMPTY_MD, (1 << 63) - 1);
        assert_eq!(LOCK_MASK & MD_MASK, 0);
    }

    #[test]
    fn test_split_small_hash() {
        let p = split_hash(0x2A, TEST_RANGE);
        assert_eq!(p.tag, 0x2A);
        assert_eq!(p.bucket, 0);
    }

    #[test]
    fn test_split_separates_tag_and_bucket() {
        let p = split_hash(0x1_2A, TEST_RANGE);
        assert_eq!(p.tag, 0x2A);
        assert_eq!(p.bucket, 1);
    }

    #[test]
    fn test_buckets_stay_in_range() {
        let nbuckets = TEST_RANGE >> TAG_BITS;
        let mut h = 0x9e37_79b9_7f4a_7c15u64;
        for _ in 0..10_000 {
            h = h.wrapping_mul(0x2545_f491_4f6c_dd1d).wrapping_add(1);
            let p = split_hash(h, TEST_RANGE);
            assert!(p.bucket < nbuckets);
            assert!(p.alt_bucket < nbuckets);
        }
    }

    #[test]
    fn test_alt_bucket_is_deterministic() {
        let a = split_hash(0xdead_beef_cafe_f00d, TEST_RANGE);
        let b = split_hash(0xdead_beef_cafe_f00d, TEST_RANGE);
        assert_eq!(a, b);
    }

    #[test]
    fn test_zero_tag_aliases_buckets() {
        // A zero tag zeroes the permutation term, so both candidates agree.
        let p = split_hash(0xAB_00, TEST_RANGE);
        assert_eq!(p.tag, 0);
        assert_eq!(p.bucket, p.alt_bucket);
    }

    #[test]
    fn test_block_and_offset_decompose_bucket() {
        for bucket in [0u64, 35, 36, 71, 1000] {
            let recomposed =
                block_of(bucket) * u64::from(BUCKETS_PER_BLOCK) + u64::from(offset_of(bucket));
            assert_eq!(recomposed, bucket);
            assert!(offset_of(bucket) < BUCKETS_PER_BLOCK);
        }
    }

    #[test]
    fn test_stored_cell_packs_val_high() {
        assert_eq!(stored_cell(0x2A, 0), 0x002A);
        assert_eq!(stored_cell(0x2A, 7), 0x072A);
        assert_eq!(stored_cell(0xFF, 0xFF), 0xFFFF);
    }
}
