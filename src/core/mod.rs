//! Core building blocks of the vector quotient filter.
//!
//! # Module Organization
//!
//! ```text
//! core/
//! ├── layout.rs  - fixed geometry constants + hash → bucket addressing
//! ├── block.rs   - cache-line block: metadata codec, tag vector, lock
//! └── mod.rs     - this file (public API)
//! ```
//!
//! The filter in [`crate::filter`] composes these pieces; everything here is
//! deliberately block-local. A block is a bit-packed encoding, not a general
//! container; the only operations it exposes are the match scanner and the
//! two mutations (grow a run, shrink a run), each of which rewrites the
//! metadata word with a single store.

#![allow(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod layout;

pub(crate) mod block;

// Re-export the geometry constants callers may want for sizing math.
pub use layout::{
    BUCKETS_PER_BLOCK, CHECK_ALT_THRESHOLD, EMPTY_MD, LOCK_MASK, MD_MASK, SLOTS_PER_BLOCK,
    TAG_BITS, TAG_MASK,
};
