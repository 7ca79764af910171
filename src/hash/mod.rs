//! Hash functions for producing filter inputs.
//!
//! The filter itself consumes caller-supplied 64-bit hashes; this module
//! provides vetted ways to produce them from raw keys.
//!
//! # Module Structure
//!
//! ```text
//! hash/
//! ├── hasher.rs  - FilterHasher trait and StdHasher (SipHash wrapper)
//! ├── xxhash.rs  - XXH3 implementation (optional, feature = "xxhash")
//! └── mod.rs     - this file (public API)
//! ```
//!
//! # Choosing a Hash Function
//!
//! | Hash Function | Speed     | Use Case                              |
//! |---------------|-----------|---------------------------------------|
//! | [`StdHasher`] | Medium    | Default, no extra dependency (SipHash)|
//! | [`XxHasher`]  | Very fast | Throughput-bound ingest (XXH3)        |
//!
//! # Examples
//!
//! ```
//! use vqfilter::hash::{FilterHasher, StdHasher};
//! use vqfilter::VectorQuotientFilter;
//!
//! let filter = VectorQuotientFilter::new(1024)?;
//! let hasher = StdHasher::new();
//!
//! let h = hasher.hash_bytes(b"ACGTACGT");
//! assert!(filter.insert(h));
//! assert!(filter.contains(hasher.hash_bytes(b"ACGTACGT")));
//! # Ok::<(), vqfilter::FilterError>(())
//! ```

pub mod hasher;

#[cfg(feature = "xxhash")]
pub mod xxhash;

// Re-export main types for convenience
pub use hasher::{FilterHasher, StdHasher};

#[cfg(feature = "xxhash")]
pub use xxhash::XxHasher;

/// Type alias for the default hasher.
///
/// Gives callers a stable name that does not depend on the concrete
/// implementation (currently [`StdHasher`]).
pub type DefaultHasher = StdHasher;
