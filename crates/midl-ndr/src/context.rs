//! NDR encoding/decoding context
//!
//! The context carries the negotiated data representation (byte order) and
//! the limits applied while decoding untrusted input.

use crate::error::MAX_NDR_ARRAY_ELEMENTS;

/// NDR encoding/decoding context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NdrContext {
    /// Whether to use little-endian byte order
    pub little_endian: bool,
    /// Largest element count accepted for one conformant/varying array
    pub max_array_elements: u64,
}

impl NdrContext {
    /// Create a new NDR context with little-endian byte order (default)
    pub const fn new() -> Self {
        Self {
            little_endian: true,
            max_array_elements: MAX_NDR_ARRAY_ELEMENTS,
        }
    }

    /// Create a context with big-endian byte order
    pub const fn big_endian() -> Self {
        Self {
            little_endian: false,
            max_array_elements: MAX_NDR_ARRAY_ELEMENTS,
        }
    }

    /// Override the array element limit.
    pub const fn with_max_array_elements(mut self, max: u64) -> Self {
        self.max_array_elements = max;
        self
    }

    /// Calculate padding needed to align to the given boundary
    #[inline]
    pub const fn align_padding(position: usize, alignment: usize) -> usize {
        if alignment <= 1 {
            return 0;
        }
        let remainder = position % alignment;
        if remainder == 0 {
            0
        } else {
            alignment - remainder
        }
    }

    /// Round `position` up to the next multiple of `alignment`.
    #[inline]
    pub const fn align_up(position: usize, alignment: usize) -> usize {
        position + Self::align_padding(position, alignment)
    }
}

impl Default for NdrContext {
    fn default() -> Self {
        Self::new()
    }
}
