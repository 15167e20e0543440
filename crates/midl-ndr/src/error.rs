//! NDR error types

use thiserror::Error;

/// Upper bound on the element count of any single conformant or varying
/// array accepted from the wire.
pub const MAX_NDR_ARRAY_ELEMENTS: u64 = 1 << 24;

/// Coarse classification of codec failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The buffer ended before a declared field could be read.
    Truncated,
    /// A declared size, selector or referent is internally inconsistent.
    Malformed,
}

/// NDR encoding/decoding errors
#[derive(Debug, Error)]
pub enum NdrError {
    /// Buffer exhausted before a field could be read
    #[error("buffer truncated: needed {needed} bytes, have {have}")]
    Truncated { needed: usize, have: usize },

    /// Declared element count cannot fit in what is left of the buffer
    #[error("array count {count} exceeds remaining buffer ({remaining} bytes)")]
    CountExceedsBuffer { count: u64, remaining: usize },

    /// Declared element count exceeds the configured maximum
    #[error("array count {count} exceeds limit of {limit} elements")]
    CountExceedsLimit { count: u64, limit: u64 },

    /// Size arithmetic overflowed
    #[error("integer overflow computing {0}")]
    IntegerOverflow(&'static str),

    /// Varying array window falls outside the array bounds
    #[error("invalid variance: offset={offset}, actual_count={actual_count}, max_count={max_count}")]
    InvalidVariance {
        offset: u32,
        actual_count: u32,
        max_count: u32,
    },

    /// Conformance value disagrees with the correlated size field
    #[error("conformance mismatch: max_count={max_count}, actual_count={actual_count}")]
    ConformanceMismatch { max_count: u32, actual_count: u32 },

    /// Array length does not match its declared dimensions
    #[error("array size mismatch: expected {expected}, got {got}")]
    ArraySizeMismatch { expected: usize, got: usize },

    /// Referent id that cannot be resolved
    #[error("invalid pointer: referent ID {0:#x}")]
    InvalidPointer(u32),

    /// Full pointer id reused for a value of a different type
    #[error("referent ID {0:#x} aliases a value of a different type")]
    AliasTypeMismatch(u32),

    /// Pointer nesting deeper than the decoder accepts
    #[error("pointer nesting exceeds {0} levels")]
    NestingTooDeep(usize),

    /// Full pointer refers back to a referent still being decoded
    #[error("referent ID {0:#x} refers to itself")]
    CyclicReferent(u32),

    /// Invalid string - bad terminator or encoding
    #[error("invalid string: {0}")]
    InvalidString(String),

    /// Invalid enum value
    #[error("invalid enum value: {0}")]
    InvalidEnumValue(i64),

    /// UTF-16 decoding error
    #[error("UTF-16 error: {0}")]
    Utf16Error(#[from] std::char::DecodeUtf16Error),
}

impl NdrError {
    /// Classify the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            NdrError::Truncated { .. } => ErrorKind::Truncated,
            _ => ErrorKind::Malformed,
        }
    }

    pub fn is_truncated(&self) -> bool {
        self.kind() == ErrorKind::Truncated
    }

    pub fn is_malformed(&self) -> bool {
        self.kind() == ErrorKind::Malformed
    }
}

/// Result type for NDR operations
pub type Result<T> = std::result::Result<T, NdrError>;
