//! Serialization of the filter's fixed wire format (requires the `serde`
//! feature).
//!
//! A filter serializes as its parameter set (`nslots`, `nblocks`, `nelts`,
//! `range`, `key_remainder_bits`) followed by the packed block array: per
//! block a little-endian metadata word, then 28 little-endian 16-bit tag
//! cells. Endianness is fixed at little-endian; lock bits are stripped on
//! write and on read, so a persisted filter always reloads unlocked.
//!
//! Serialize the filter only while quiescent: a snapshot taken during
//! concurrent mutation may interleave block states from different moments.
//!
//! Deserialization validates the parameter set against the block payload
//! and rejects encodings whose metadata words could not have been produced
//! by filter operations.
//!
//! # Examples
//!
//! ```
//! use vqfilter::VectorQuotientFilter;
//!
//! let filter = VectorQuotientFilter::new(1024)?;
//! assert!(filter.insert_val(0x2A, 7));
//!
//! let bytes = bincode::serialize(&filter).unwrap();
//! let restored: VectorQuotientFilter = bincode::deserialize(&bytes).unwrap();
//! assert_eq!(restored.query(0x2A), Some(7));
//! # Ok::<(), vqfilter::FilterError>(())
//! ```

#![allow(clippy::pedantic)]

use std::fmt;

use serde::de::{self, MapAccess, SeqAccess, Visitor};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::core::block::Block;
use crate::core::layout::{BUCKETS_PER_BLOCK, SLOTS_PER_BLOCK, TAG_BITS};
use crate::filter::VectorQuotientFilter;
use crate::util::bitops::popcount;

/// Bytes per packed block: metadata word plus 28 tag cells.
const PACKED_BLOCK_BYTES: usize = 8 + 2 * SLOTS_PER_BLOCK;

const STRUCT_NAME: &str = "VectorQuotientFilter";
const FIELDS: &[&str] = &[
    "nslots",
    "nblocks",
    "nelts",
    "range",
    "key_remainder_bits",
    "blocks",
];

impl Serialize for VectorQuotientFilter {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct(STRUCT_NAME, FIELDS.len())?;
        state.serialize_field("nslots", &self.capacity())?;
        state.serialize_field("nblocks", &self.num_blocks())?;
        state.serialize_field("nelts", &self.len())?;
        state.serialize_field("range", &self.hash_range())?;
        state.serialize_field("key_remainder_bits", &self.remainder_bits())?;
        state.serialize_field("blocks", &PackedBlocks(self.block_slice()))?;
        state.end()
    }
}

/// Block array packed into the little-endian byte layout.
struct PackedBlocks<'a>(&'a [Block]);

impl Serialize for PackedBlocks<'_> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut buf = Vec::with_capacity(self.0.len() * PACKED_BLOCK_BYTES);
        for block in self.0 {
            buf.extend_from_slice(&block.md_view().to_le_bytes());
            for slot in 0..SLOTS_PER_BLOCK {
                buf.extend_from_slice(&block.cell(slot).to_le_bytes());
            }
        }
        serializer.serialize_bytes(&buf)
    }
}

/// Raw packed-block payload, accepted as bytes or as a sequence of integers
/// (the human-readable formats encode byte strings that way).
struct RawBlocks(Vec<u8>);

impl<'de> Deserialize<'de> for RawBlocks {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct BytesVisitor;

        impl<'de> Visitor<'de> for BytesVisitor {
            type Value = RawBlocks;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("packed block bytes")
            }

            fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<Self::Value, E> {
                Ok(RawBlocks(v.to_vec()))
            }

            fn visit_byte_buf<E: de::Error>(self, v: Vec<u8>) -> Result<Self::Value, E> {
                Ok(RawBlocks(v))
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
                let mut buf = Vec::with_capacity(seq.size_hint().unwrap_or(0));
                while let Some(byte) = seq.next_element::<u8>()? {
                    buf.push(byte);
                }
                Ok(RawBlocks(buf))
            }
        }

        deserializer.deserialize_byte_buf(BytesVisitor)
    }
}

#[derive(Default)]
struct PartialFilter {
    nslots: Option<u64>,
    nblocks: Option<u64>,
    nelts: Option<u64>,
    range: Option<u64>,
    key_remainder_bits: Option<u32>,
    blocks: Option<Vec<u8>>,
}

impl PartialFilter {
    fn build<E: de::Error>(self) -> Result<VectorQuotientFilter, E> {
        let nslots = self.nslots.ok_or_else(|| de::Error::missing_field("nslots"))?;
        let nblocks = self
            .nblocks
            .ok_or_else(|| de::Error::missing_field("nblocks"))?;
        let nelts = self.nelts.ok_or_else(|| de::Error::missing_field("nelts"))?;
        let range = self.range.ok_or_else(|| de::Error::missing_field("range"))?;
        let key_remainder_bits = self
            .key_remainder_bits
            .ok_or_else(|| de::Error::missing_field("key_remainder_bits"))?;
        let payload = self.blocks.ok_or_else(|| de::Error::missing_field("blocks"))?;

        if key_remainder_bits != TAG_BITS {
            return Err(de::Error::custom(format!(
                "unsupported remainder width {key_remainder_bits}, expected {TAG_BITS}"
            )));
        }
        if nblocks.checked_mul(SLOTS_PER_BLOCK as u64) != Some(nslots) {
            return Err(de::Error::custom("nslots inconsistent with nblocks"));
        }
        if nblocks.checked_mul(u64::from(BUCKETS_PER_BLOCK) << TAG_BITS) != Some(range) {
            return Err(de::Error::custom("range inconsistent with nblocks"));
        }
        let expected_len = usize::try_from(nblocks)
            .ok()
            .and_then(|n| n.checked_mul(PACKED_BLOCK_BYTES));
        if nblocks == 0 || expected_len != Some(payload.len()) {
            return Err(de::Error::custom("block payload length mismatch"));
        }

        let mut blocks = Vec::with_capacity(payload.len() / PACKED_BLOCK_BYTES);
        let mut total_occupancy = 0u64;
        for chunk in payload.chunks_exact(PACKED_BLOCK_BYTES) {
            let mut md_bytes = [0u8; 8];
            md_bytes.copy_from_slice(&chunk[..8]);
            let md = u64::from_le_bytes(md_bytes);
            let mut cells = [0u16; SLOTS_PER_BLOCK];
            for (slot, pair) in chunk[8..].chunks_exact(2).enumerate() {
                cells[slot] = u16::from_le_bytes([pair[0], pair[1]]);
            }
            // 63 - occupancy delimiters survive in the live bits; fewer
            // than 35 means more zeros than the block has slots.
            let live_ones = popcount(md & crate::core::layout::MD_MASK);
            if live_ones < 63 - SLOTS_PER_BLOCK as u32 {
                return Err(de::Error::custom("corrupt metadata word"));
            }
            total_occupancy += u64::from(crate::core::block::occupancy(md));
            blocks.push(Block::from_raw(md, cells));
        }
        if total_occupancy != nelts {
            return Err(de::Error::custom("nelts inconsistent with tag occupancy"));
        }

        Ok(VectorQuotientFilter::from_raw_parts(blocks, nelts))
    }
}

impl<'de> Deserialize<'de> for VectorQuotientFilter {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct FilterVisitor;

        impl<'de> Visitor<'de> for FilterVisitor {
            type Value = VectorQuotientFilter;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a serialized vector quotient filter")
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
                let partial = PartialFilter {
                    nslots: seq.next_element()?,
                    nblocks: seq.next_element()?,
                    nelts: seq.next_element()?,
                    range: seq.next_element()?,
                    key_remainder_bits: seq.next_element()?,
                    blocks: seq.next_element::<RawBlocks>()?.map(|raw| raw.0),
                };
                partial.build()
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut partial = PartialFilter::default();
                while let Some(key) = map.next_key::<String>()? {
                    match key.as_str() {
                        "nslots" => partial.nslots = Some(map.next_value()?),
                        "nblocks" => partial.nblocks = Some(map.next_value()?),
                        "nelts" => partial.nelts = Some(map.next_value()?),
                        "range" => partial.range = Some(map.next_value()?),
                        "key_remainder_bits" => {
                            partial.key_remainder_bits = Some(map.next_value()?)
                        }
                        "blocks" => {
                            partial.blocks = Some(map.next_value::<RawBlocks>()?.0)
                        }
                        _ => return Err(de::Error::unknown_field(&key, FIELDS)),
                    }
                }
                partial.build()
            }
        }

        deserializer.deserialize_struct(STRUCT_NAME, FIELDS, FilterVisitor)
    }
}
