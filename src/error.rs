//! Error types for filter construction.
//!
//! Only construction is fallible. A full filter, a missing key on remove or
//! query, and lock contention are all ordinary outcomes reported through
//! return values, so the error surface stays small: either the requested
//! capacity is unusable, or the block array could not be allocated.
//!
//! # Error Propagation
//!
//! ```
//! use vqfilter::{Result, VectorQuotientFilter};
//!
//! fn build(nslots: u64) -> Result<VectorQuotientFilter> {
//!     let filter = VectorQuotientFilter::new(nslots)?;
//!     Ok(filter)
//! }
//! # assert!(build(1024).is_ok());
//! # assert!(build(0).is_err());
//! ```

#![allow(clippy::module_name_repetitions)]

use std::fmt;

/// Result type alias for filter operations.
pub type Result<T> = std::result::Result<T, FilterError>;

/// Errors that can occur while constructing a filter.
///
/// # Design Notes
/// - `Clone` + `PartialEq` enable testing and error comparison
/// - Each variant carries the value that made construction fail
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterError {
    /// The requested slot count cannot produce a usable filter.
    ///
    /// Zero slots would mean zero blocks; slot counts near `u64::MAX`
    /// overflow the block-count and range arithmetic.
    InvalidCapacity {
        /// The slot count that was requested.
        nslots: u64,
    },

    /// The block array could not be allocated.
    AllocationFailed {
        /// Size of the failed allocation in bytes.
        bytes: u64,
    },
}

impl fmt::Display for FilterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidCapacity { nslots } => {
                write!(f, "Invalid filter capacity: {} slots.", nslots)
            }
            Self::AllocationFailed { bytes } => {
                write!(f, "Failed to allocate {} bytes for the block array.", bytes)
            }
        }
    }
}

impl std::error::Error for FilterError {}

impl FilterError {
    /// Create an `InvalidCapacity` error.
    #[must_use]
    pub fn invalid_capacity(nslots: u64) -> Self {
        Self::InvalidCapacity { nslots }
    }

    /// Create an `AllocationFailed` error.
    #[must_use]
    pub fn allocation_failed(bytes: u64) -> Self {
        Self::AllocationFailed { bytes }
    }
}
