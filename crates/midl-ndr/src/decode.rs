//! NDR decoding: the reader cursor and the `NdrDecode` trait
//!
//! Decoding mirrors encoding. `ndr_decode` consumes a value's inline part
//! and leaves its pointers pending; `ndr_decode_deferred` then reads the
//! pending pointees in field order, which is the order the writer drained
//! its deferred queue in.

use crate::encode::NdrLayout;
use crate::{NdrContext, NdrError, Result};
use bytes::{Buf, Bytes};
use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Deepest pointer nesting accepted while decoding.
pub const MAX_NDR_NESTING: usize = 256;

/// Trait for types that can be decoded from NDR format
pub trait NdrDecode: NdrLayout + Sized {
    /// Read the inline part of a value.
    fn ndr_decode(r: &mut NdrReader) -> Result<Self>;

    /// Read pointees left pending by `ndr_decode`.
    fn ndr_decode_deferred(&mut self, _r: &mut NdrReader) -> Result<()> {
        Ok(())
    }
}

macro_rules! read_scalar {
    ($name:ident, $ty:ty, $le:ident, $be:ident) => {
        #[inline]
        pub fn $name(&mut self) -> Result<$ty> {
            const WIDTH: usize = std::mem::size_of::<$ty>();
            self.align(WIDTH)?;
            let little_endian = self.ctx.little_endian;
            let mut src = self.take(WIDTH)?;
            Ok(if little_endian {
                src.$le()
            } else {
                src.$be()
            })
        }
    };
}

/// Position-tracked, bounds-checked input cursor for one marshaling unit.
pub struct NdrReader {
    buf: Bytes,
    pos: usize,
    ctx: NdrContext,
    depth: usize,
    full_referents: HashMap<u32, Arc<dyn Any + Send + Sync>>,
    in_progress: HashSet<u32>,
}

impl NdrReader {
    pub fn new(buf: Bytes) -> Self {
        Self::with_context(buf, NdrContext::default())
    }

    pub fn with_context(buf: Bytes, ctx: NdrContext) -> Self {
        Self {
            buf,
            pos: 0,
            ctx,
            depth: 0,
            full_referents: HashMap::new(),
            in_progress: HashSet::new(),
        }
    }

    pub fn context(&self) -> &NdrContext {
        &self.ctx
    }

    /// Current offset from the start of the marshaling unit
    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes left after the current position
    #[inline]
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    fn truncated(&self, needed: usize) -> NdrError {
        NdrError::Truncated {
            needed,
            have: self.remaining(),
        }
    }

    /// Borrow the next `len` bytes and advance past them.
    fn take(&mut self, len: usize) -> Result<&[u8]> {
        if len > self.remaining() {
            return Err(self.truncated(len));
        }
        let start = self.pos;
        self.pos += len;
        Ok(&self.buf[start..self.pos])
    }

    /// Skip padding up to the next multiple of `alignment`.
    pub fn align(&mut self, alignment: usize) -> Result<()> {
        let padding = NdrContext::align_padding(self.pos, alignment);
        if padding > self.remaining() {
            return Err(self.truncated(padding));
        }
        self.pos += padding;
        Ok(())
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_i8(&mut self) -> Result<i8> {
        Ok(self.take(1)?.get_i8())
    }

    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_u8()? != 0)
    }

    read_scalar!(read_u16, u16, get_u16_le, get_u16);
    read_scalar!(read_i16, i16, get_i16_le, get_i16);
    read_scalar!(read_u32, u32, get_u32_le, get_u32);
    read_scalar!(read_i32, i32, get_i32_le, get_i32);
    read_scalar!(read_u64, u64, get_u64_le, get_u64);
    read_scalar!(read_i64, i64, get_i64_le, get_i64);
    read_scalar!(read_f32, f32, get_f32_le, get_f32);
    read_scalar!(read_f64, f64, get_f64_le, get_f64);

    /// Raw bytes, no alignment. Shares the underlying buffer.
    pub fn read_bytes(&mut self, len: usize) -> Result<Bytes> {
        if len > self.remaining() {
            return Err(self.truncated(len));
        }
        let out = self.buf.slice(self.pos..self.pos + len);
        self.pos += len;
        Ok(out)
    }

    /// Read a conformance (max_count) value.
    pub fn read_conformance(&mut self) -> Result<u32> {
        self.read_u32()
    }

    /// Read a variance pair and check it against `max_count`.
    pub fn read_variance(&mut self, max_count: u64) -> Result<(u32, u32)> {
        let offset = self.read_u32()?;
        let actual_count = self.read_u32()?;
        if u64::from(offset) + u64::from(actual_count) > max_count {
            return Err(NdrError::InvalidVariance {
                offset,
                actual_count,
                max_count: u32::try_from(max_count).unwrap_or(u32::MAX),
            });
        }
        Ok((offset, actual_count))
    }

    /// Reject an element count that is over the configured limit, or whose
    /// elements could not possibly fit in the rest of the buffer. Must be
    /// called before allocating storage for wire-supplied counts.
    pub fn check_count(&self, count: u64, min_element_size: usize) -> Result<usize> {
        if count > self.ctx.max_array_elements {
            return Err(NdrError::CountExceedsLimit {
                count,
                limit: self.ctx.max_array_elements,
            });
        }
        let needed = count
            .checked_mul(min_element_size as u64)
            .ok_or(NdrError::IntegerOverflow("array byte size"))?;
        if needed > self.remaining() as u64 {
            return Err(NdrError::CountExceedsBuffer {
                count,
                remaining: self.remaining(),
            });
        }
        usize::try_from(count).map_err(|_| NdrError::IntegerOverflow("array count"))
    }

    /// Check a count that is only bounded by the configured limit, such as
    /// the max_count of a varying array of which only a window is sent.
    pub fn check_limit(&self, count: u64) -> Result<()> {
        if count > self.ctx.max_array_elements {
            return Err(NdrError::CountExceedsLimit {
                count,
                limit: self.ctx.max_array_elements,
            });
        }
        Ok(())
    }

    /// Read a referent id; zero means null.
    pub fn read_referent(&mut self) -> Result<u32> {
        self.read_u32()
    }

    /// Enter one level of pointee nesting.
    pub fn enter(&mut self) -> Result<()> {
        if self.depth >= MAX_NDR_NESTING {
            return Err(NdrError::NestingTooDeep(MAX_NDR_NESTING));
        }
        self.depth += 1;
        Ok(())
    }

    pub fn leave(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    /// Resolve a full-pointer referent. Returns the shared slot and whether
    /// this occurrence is the first, which owns reading the pointee.
    pub(crate) fn full_referent<T>(&mut self, id: u32) -> Result<(Arc<T>, bool)>
    where
        T: Any + Send + Sync + Default,
    {
        if let Some(existing) = self.full_referents.get(&id) {
            if self.in_progress.contains(&id) {
                return Err(NdrError::CyclicReferent(id));
            }
            let shared = Arc::clone(existing)
                .downcast::<T>()
                .map_err(|_| NdrError::AliasTypeMismatch(id))?;
            return Ok((shared, false));
        }
        let slot = Arc::new(T::default());
        self.full_referents
            .insert(id, Arc::clone(&slot) as Arc<dyn Any + Send + Sync>);
        Ok((slot, true))
    }

    pub(crate) fn begin_referent(&mut self, id: u32) {
        self.in_progress.insert(id);
    }

    pub(crate) fn end_referent(&mut self, id: u32) {
        self.in_progress.remove(&id);
    }

    /// Decode a top-level parameter and its deferred pointees.
    pub fn decode<T: NdrDecode>(&mut self) -> Result<T> {
        let mut value = T::ndr_decode(self)?;
        value.ndr_decode_deferred(self)?;
        Ok(value)
    }
}

impl std::fmt::Debug for NdrReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NdrReader")
            .field("position", &self.pos)
            .field("len", &self.buf.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    #[test]
    fn test_read_past_end_is_truncated() {
        let mut r = NdrReader::new(Bytes::from_static(&[1, 2, 3]));
        let err = r.read_u32().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Truncated);
        assert_eq!(r.position(), 0);
    }

    #[test]
    fn test_alignment_skips_padding() {
        let mut r = NdrReader::new(Bytes::from_static(&[7, 0xff, 0xff, 0xff, 1, 0, 0, 0]));
        assert_eq!(r.read_u8().unwrap(), 7);
        assert_eq!(r.read_u32().unwrap(), 1);
        assert!(r.is_empty());
    }

    #[test]
    fn test_padding_past_end_is_truncated() {
        let mut r = NdrReader::new(Bytes::from_static(&[7, 0]));
        r.read_u8().unwrap();
        assert!(r.align(4).unwrap_err().is_truncated());
    }

    #[test]
    fn test_check_count_against_buffer() {
        let r = NdrReader::new(Bytes::from(vec![0u8; 16]));
        assert_eq!(r.check_count(4, 4).unwrap(), 4);
        assert!(matches!(
            r.check_count(5, 4),
            Err(NdrError::CountExceedsBuffer { count: 5, .. })
        ));
        assert!(r.check_count(u64::MAX, 8).unwrap_err().is_malformed());
    }

    #[test]
    fn test_check_count_against_limit() {
        let ctx = NdrContext::default().with_max_array_elements(2);
        let r = NdrReader::with_context(Bytes::from(vec![0u8; 64]), ctx);
        assert!(matches!(
            r.check_count(3, 1),
            Err(NdrError::CountExceedsLimit { count: 3, limit: 2 })
        ));
    }

    #[test]
    fn test_variance_window() {
        let mut w = crate::NdrWriter::new();
        w.write_variance(2, 3).unwrap();
        let mut r = NdrReader::new(w.finish().unwrap());
        assert_eq!(r.read_variance(5).unwrap(), (2, 3));

        let mut w = crate::NdrWriter::new();
        w.write_variance(3, 3).unwrap();
        let mut r = NdrReader::new(w.finish().unwrap());
        assert!(matches!(
            r.read_variance(5),
            Err(NdrError::InvalidVariance { offset: 3, .. })
        ));
    }

    #[test]
    fn test_nesting_limit() {
        let mut r = NdrReader::new(Bytes::new());
        for _ in 0..MAX_NDR_NESTING {
            r.enter().unwrap();
        }
        assert!(matches!(r.enter(), Err(NdrError::NestingTooDeep(_))));
    }
}
