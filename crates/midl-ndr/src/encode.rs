//! NDR encoding: the writer cursor and the `NdrEncode` trait
//!
//! Encoding runs in two phases. A value's inline part is written where it
//! appears; the pointees of any embedded pointers are queued and written
//! once the enclosing construct is complete. [`NdrWriter::write_deferred`]
//! drains the queue in FIFO order, flushing the entries each pointee adds
//! before moving on to the next one.

use crate::{NdrContext, NdrError, Result};
use bytes::{BufMut, Bytes, BytesMut};
use std::collections::{HashMap, VecDeque};

/// First referent id handed out for non-null pointers in a marshaling unit.
pub const FIRST_REFERENT_ID: u32 = 0x0002_0000;

/// Alignment and minimum wire size of an NDR type.
pub trait NdrLayout {
    /// Natural alignment of the inline part.
    const NDR_ALIGN: usize;
    /// Smallest number of bytes one value can occupy on the wire.
    const NDR_MIN_SIZE: usize;
}

/// Trait for types that can be encoded to NDR format
pub trait NdrEncode: NdrLayout {
    /// Write the inline part of this value and queue its deferred pointees.
    fn ndr_encode<'a>(&'a self, w: &mut NdrWriter<'a>) -> Result<()>;
}

/// `max` usable in const context, for composite alignments.
pub const fn max_align(a: usize, b: usize) -> usize {
    if a > b {
        a
    } else {
        b
    }
}

type Deferred<'a> = Box<dyn FnOnce(&mut NdrWriter<'a>) -> Result<()> + 'a>;

macro_rules! write_scalar {
    ($name:ident, $ty:ty, $le:ident, $be:ident) => {
        #[inline]
        pub fn $name(&mut self, value: $ty) {
            self.align(std::mem::size_of::<$ty>());
            if self.ctx.little_endian {
                self.buf.$le(value);
            } else {
                self.buf.$be(value);
            }
        }
    };
}

/// Position-tracked output cursor for one marshaling unit.
///
/// Offsets are relative to the start of the unit, so alignment padding is
/// computed from `position()`. The referent table and deferred queue live
/// and die with the writer.
pub struct NdrWriter<'a> {
    buf: BytesMut,
    ctx: NdrContext,
    next_referent: u32,
    full_referents: HashMap<usize, u32>,
    deferred: VecDeque<Deferred<'a>>,
}

impl<'a> NdrWriter<'a> {
    pub fn new() -> Self {
        Self::with_context(NdrContext::default())
    }

    pub fn with_context(ctx: NdrContext) -> Self {
        Self {
            buf: BytesMut::new(),
            ctx,
            next_referent: FIRST_REFERENT_ID,
            full_referents: HashMap::new(),
            deferred: VecDeque::new(),
        }
    }

    pub fn context(&self) -> &NdrContext {
        &self.ctx
    }

    /// Current offset from the start of the marshaling unit
    #[inline]
    pub fn position(&self) -> usize {
        self.buf.len()
    }

    /// Zero-fill up to the next multiple of `alignment`.
    #[inline]
    pub fn align(&mut self, alignment: usize) {
        let padding = NdrContext::align_padding(self.buf.len(), alignment);
        self.buf.put_bytes(0, padding);
    }

    #[inline]
    pub fn write_u8(&mut self, value: u8) {
        self.buf.put_u8(value);
    }

    #[inline]
    pub fn write_i8(&mut self, value: i8) {
        self.buf.put_i8(value);
    }

    #[inline]
    pub fn write_bool(&mut self, value: bool) {
        self.buf.put_u8(value as u8);
    }

    write_scalar!(write_u16, u16, put_u16_le, put_u16);
    write_scalar!(write_i16, i16, put_i16_le, put_i16);
    write_scalar!(write_u32, u32, put_u32_le, put_u32);
    write_scalar!(write_i32, i32, put_i32_le, put_i32);
    write_scalar!(write_u64, u64, put_u64_le, put_u64);
    write_scalar!(write_i64, i64, put_i64_le, put_i64);
    write_scalar!(write_f32, f32, put_f32_le, put_f32);
    write_scalar!(write_f64, f64, put_f64_le, put_f64);

    /// Raw bytes, no alignment.
    pub fn write_bytes(&mut self, data: &[u8]) {
        self.buf.put_slice(data);
    }

    /// Write a conformance (max_count) value.
    pub fn write_conformance(&mut self, count: usize) -> Result<()> {
        let count = u32::try_from(count).map_err(|_| NdrError::IntegerOverflow("max_count"))?;
        self.write_u32(count);
        Ok(())
    }

    /// Write a variance (offset, actual_count) pair.
    pub fn write_variance(&mut self, offset: usize, actual_count: usize) -> Result<()> {
        let offset = u32::try_from(offset).map_err(|_| NdrError::IntegerOverflow("offset"))?;
        let actual =
            u32::try_from(actual_count).map_err(|_| NdrError::IntegerOverflow("actual_count"))?;
        self.write_u32(offset);
        self.write_u32(actual);
        Ok(())
    }

    /// Write a fresh non-null referent id and return it.
    pub fn write_referent(&mut self) -> u32 {
        let id = self.allocate_referent();
        self.write_u32(id);
        id
    }

    /// Write the null referent.
    pub fn write_null(&mut self) {
        self.write_u32(0);
    }

    fn allocate_referent(&mut self) -> u32 {
        let id = self.next_referent;
        self.next_referent = self.next_referent.wrapping_add(4).max(FIRST_REFERENT_ID);
        id
    }

    /// Look up the referent id for a full-pointer target identified by
    /// `addr`. Returns the id and whether this is its first occurrence.
    pub(crate) fn full_referent(&mut self, addr: usize) -> (u32, bool) {
        if let Some(&id) = self.full_referents.get(&addr) {
            return (id, false);
        }
        let id = self.allocate_referent();
        self.full_referents.insert(addr, id);
        (id, true)
    }

    /// Queue a pointee to be written after the current construct.
    pub fn defer<F>(&mut self, f: F)
    where
        F: FnOnce(&mut NdrWriter<'a>) -> Result<()> + 'a,
    {
        self.deferred.push_back(Box::new(f));
    }

    /// Number of queued pointees.
    pub fn deferred_len(&self) -> usize {
        self.deferred.len()
    }

    /// Drain the deferred queue.
    ///
    /// Entries run in FIFO order; pointees queued by an entry are flushed
    /// before the next entry at the same level.
    pub fn write_deferred(&mut self) -> Result<()> {
        let pending = std::mem::take(&mut self.deferred);
        for entry in pending {
            entry(self)?;
            if !self.deferred.is_empty() {
                self.write_deferred()?;
            }
        }
        Ok(())
    }

    /// Encode a top-level parameter followed by its deferred pointees.
    pub fn encode<T: NdrEncode>(&mut self, value: &'a T) -> Result<()> {
        value.ndr_encode(self)?;
        self.write_deferred()
    }

    /// Flush anything still queued and return the encoded unit.
    pub fn finish(mut self) -> Result<Bytes> {
        self.write_deferred()?;
        tracing::trace!(len = self.buf.len(), "ndr unit encoded");
        Ok(self.buf.freeze())
    }
}

impl Default for NdrWriter<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for NdrWriter<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NdrWriter")
            .field("position", &self.buf.len())
            .field("deferred", &self.deferred.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalars_are_aligned() {
        let mut w = NdrWriter::new();
        w.write_u8(1);
        w.write_u32(0x1234_5678);
        assert_eq!(w.position(), 8);
        w.write_u16(7);
        w.write_u64(9);
        assert_eq!(w.position(), 24);
        let bytes = w.finish().unwrap();
        assert_eq!(&bytes[..8], &[1, 0, 0, 0, 0x78, 0x56, 0x34, 0x12]);
    }

    #[test]
    fn test_big_endian_scalar() {
        let mut w = NdrWriter::with_context(NdrContext::big_endian());
        w.write_u32(0x0102_0304);
        assert_eq!(&w.finish().unwrap()[..], &[1, 2, 3, 4]);
    }

    #[test]
    fn test_referent_ids_increment() {
        let mut w = NdrWriter::new();
        assert_eq!(w.write_referent(), FIRST_REFERENT_ID);
        assert_eq!(w.write_referent(), FIRST_REFERENT_ID + 4);
    }

    #[test]
    fn test_deferred_fifo_depth_first() {
        let mut w = NdrWriter::new();
        w.defer(|w| {
            w.write_u8(1);
            w.defer(|w| {
                w.write_u8(2);
                Ok(())
            });
            Ok(())
        });
        w.defer(|w| {
            w.write_u8(3);
            Ok(())
        });
        assert_eq!(w.deferred_len(), 2);
        let bytes = w.finish().unwrap();
        assert_eq!(&bytes[..], &[1, 2, 3]);
    }

    #[test]
    fn test_full_referent_reuse() {
        let mut w = NdrWriter::new();
        let (a, first_a) = w.full_referent(0x1000);
        let (b, first_b) = w.full_referent(0x1000);
        let (c, _) = w.full_referent(0x2000);
        assert!(first_a);
        assert!(!first_b);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
