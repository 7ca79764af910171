//! vqfilter: a concurrent vector quotient filter for Rust.
//!
//! A vector quotient filter is an approximate-membership data structure
//! that answers "is this key present?" and "what small values were
//! associated with it?" with zero false negatives for inserted keys, a
//! tunable false-positive rate, and support for deletion, at roughly two
//! bytes per key.
//!
//! # What Makes It Fast
//!
//! The filter is a flat array of 64-byte **blocks**, each a single cache
//! line holding a 64-bit metadata word and 28 two-byte tag cells. The
//! metadata word encodes 36 bucket runs in unary, so locating a bucket's
//! tags is a popcount and a select away, and every operation touches at
//! most two cache lines. Inserts pick the less loaded of two candidate
//! buckets, which keeps blocks evenly filled past 90% load.
//!
//! # Quick Start
//!
//! ```
//! use vqfilter::VectorQuotientFilter;
//!
//! // One slot per expected key; the filter rounds up to whole blocks.
//! let filter = VectorQuotientFilter::new(10_000)?;
//!
//! // The filter stores 64-bit hashes; see `vqfilter::hash` for hashers.
//! assert!(filter.insert(0xFEED_BEEF));
//! assert!(filter.contains(0xFEED_BEEF));
//! assert!(filter.remove(0xFEED_BEEF));
//! assert!(!filter.contains(0xFEED_BEEF));
//! # Ok::<(), vqfilter::FilterError>(())
//! ```
//!
//! # Attaching Values
//!
//! Each slot carries an optional 8-bit payload alongside the tag, useful
//! for small per-key annotations (a partition id, a count bucket, a k-mer
//! multiplicity class):
//!
//! ```
//! use vqfilter::VectorQuotientFilter;
//!
//! let filter = VectorQuotientFilter::new(1024)?;
//! assert!(filter.insert_val(0x2A, 7));
//! assert_eq!(filter.query(0x2A), Some(7));
//!
//! // Repeated inserts of one hash each keep their own payload.
//! assert!(filter.insert_val(0x2A, 9));
//! let mut vals = Vec::new();
//! assert!(filter.query_all(0x2A, &mut vals));
//! vals.sort_unstable();
//! assert_eq!(vals, [7, 9]);
//! # Ok::<(), vqfilter::FilterError>(())
//! ```
//!
//! # Concurrency
//!
//! All operations take `&self`. Writers synchronize through a one-bit
//! spinlock hosted in each block's metadata word; readers never lock.
//! Share the filter with an `Arc`:
//!
//! ```
//! use std::sync::Arc;
//! use vqfilter::VectorQuotientFilter;
//!
//! let filter = Arc::new(VectorQuotientFilter::new(100_000)?);
//!
//! let handles: Vec<_> = (0..4)
//!     .map(|t| {
//!         let f = Arc::clone(&filter);
//!         std::thread::spawn(move || {
//!             for i in 0..1000u64 {
//!                 assert!(f.insert(t * 1_000_000 + i * 257));
//!             }
//!         })
//!     })
//!     .collect();
//! for h in handles {
//!     h.join().unwrap();
//! }
//! assert_eq!(filter.len(), 4000);
//! # Ok::<(), vqfilter::FilterError>(())
//! ```
//!
//! # Feature Flags
//!
//! | Feature  | Enables                                              |
//! |----------|------------------------------------------------------|
//! | `serde`  | Persisting the filter's fixed wire format            |
//! | `xxhash` | [`hash::XxHasher`], an XXH3 hasher for fast ingest   |
//!
//! # Limits
//!
//! The filter does not resize: a full filter reports `false` from
//! `insert*` and the caller decides what to do. There is no iteration over
//! stored keys, payloads are fixed at 8 bits, and membership answers are
//! approximate: an absent key whose tag collides in a candidate bucket
//! yields a false positive at a rate of roughly `2^-6` near full load.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![cfg_attr(docsrs, feature(doc_cfg))]

/// Core block structures and geometry constants
pub mod core;

/// Error types and result alias
pub mod error;

/// The filter itself
pub mod filter;

/// Hash functions for producing filter inputs
pub mod hash;

/// Internal bit-level utilities
pub mod util;

/// Wire-format serialization (requires `serde` feature)
#[cfg(feature = "serde")]
#[cfg_attr(docsrs, doc(cfg(feature = "serde")))]
pub mod serde_support;

// Re-export the main types at the crate root
pub use error::{FilterError, Result};
pub use filter::VectorQuotientFilter;

/// Prelude module for convenient imports.
///
/// # Examples
///
/// ```
/// use vqfilter::prelude::*;
///
/// let filter = VectorQuotientFilter::new(1024)?;
/// assert!(filter.insert(1234));
/// # Ok::<(), vqfilter::FilterError>(())
/// ```
pub mod prelude {
    pub use crate::error::{FilterError, Result};
    pub use crate::filter::VectorQuotientFilter;
    pub use crate::hash::{DefaultHasher, FilterHasher, StdHasher};

    #[cfg(feature = "xxhash")]
    pub use crate::hash::XxHasher;
}
