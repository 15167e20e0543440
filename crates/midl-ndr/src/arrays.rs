//! NDR array types
//!
//! - Fixed arrays (`[T; N]`): elements only
//! - Conformant arrays (`[size_is(n)]`): max_count, then elements
//! - Varying arrays (`[length_is(n)]`): offset and actual_count, then the
//!   transmitted window
//! - Conformant varying arrays: max_count, offset, actual_count, window
//! - Multi-dimensional conformant arrays: one max_count per dimension
//!
//! Every count read from the wire is checked against the remaining buffer
//! (and the configured element limit) before storage is allocated.

use crate::encode::{max_align, NdrLayout};
use crate::{NdrDecode, NdrEncode, NdrError, NdrReader, NdrWriter, Result};
use std::ops::{Deref, DerefMut};

/// Declared element counts of a conformant array, one per dimension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SizeInfo {
    dims: Vec<u32>,
}

impl SizeInfo {
    pub fn new(dims: Vec<u32>) -> Self {
        Self { dims }
    }

    pub fn dims(&self) -> &[u32] {
        &self.dims
    }

    /// Read `count` max_count values.
    pub fn read(r: &mut NdrReader, count: usize) -> Result<Self> {
        let mut dims = Vec::with_capacity(count);
        for _ in 0..count {
            dims.push(r.read_conformance()?);
        }
        Ok(Self { dims })
    }

    pub fn write(&self, w: &mut NdrWriter<'_>) {
        for &d in &self.dims {
            w.write_u32(d);
        }
    }

    /// Total element count across all dimensions.
    pub fn element_count(&self) -> Result<u64> {
        self.dims.iter().try_fold(1u64, |acc, &d| {
            acc.checked_mul(u64::from(d))
                .ok_or(NdrError::IntegerOverflow("array dimensions"))
        })
    }

    /// Validate the declared size against the reader before allocating.
    pub fn validate(&self, r: &NdrReader, min_element_size: usize) -> Result<usize> {
        r.check_count(self.element_count()?, min_element_size)
    }
}

/// Decode `count` elements, then their deferred pointees.
pub(crate) fn decode_elements<T: NdrDecode>(r: &mut NdrReader, count: usize) -> Result<Vec<T>> {
    let mut items = Vec::with_capacity(count);
    for _ in 0..count {
        items.push(T::ndr_decode(r)?);
    }
    Ok(items)
}

pub(crate) fn decode_elements_deferred<T: NdrDecode>(
    items: &mut [T],
    r: &mut NdrReader,
) -> Result<()> {
    for item in items {
        item.ndr_decode_deferred(r)?;
    }
    Ok(())
}

pub(crate) fn encode_elements<'a, T: NdrEncode>(items: &'a [T], w: &mut NdrWriter<'a>) -> Result<()> {
    w.align(T::NDR_ALIGN);
    for item in items {
        item.ndr_encode(w)?;
    }
    Ok(())
}

impl<T: NdrLayout, const N: usize> NdrLayout for [T; N] {
    const NDR_ALIGN: usize = T::NDR_ALIGN;
    const NDR_MIN_SIZE: usize = T::NDR_MIN_SIZE * N;
}

impl<T: NdrEncode, const N: usize> NdrEncode for [T; N] {
    fn ndr_encode<'a>(&'a self, w: &mut NdrWriter<'a>) -> Result<()> {
        encode_elements(self, w)
    }
}

impl<T: NdrDecode, const N: usize> NdrDecode for [T; N] {
    fn ndr_decode(r: &mut NdrReader) -> Result<Self> {
        r.align(T::NDR_ALIGN)?;
        let items = decode_elements::<T>(r, N)?;
        let got = items.len();
        items
            .try_into()
            .map_err(|_| NdrError::ArraySizeMismatch { expected: N, got })
    }

    fn ndr_decode_deferred(&mut self, r: &mut NdrReader) -> Result<()> {
        decode_elements_deferred(self, r)
    }
}

/// Conformant array - size determined at runtime
///
/// Wire format: max_count (u32), then max_count elements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConformantArray<T>(pub Vec<T>);

impl<T> ConformantArray<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self(items)
    }

    pub fn into_inner(self) -> Vec<T> {
        self.0
    }

    /// Write only the elements, for conformant structures whose max_count
    /// was hoisted to the start of the structure.
    pub fn encode_hoisted<'a>(&'a self, w: &mut NdrWriter<'a>) -> Result<()>
    where
        T: NdrEncode,
    {
        encode_elements(&self.0, w)
    }

    /// Read `max_count` elements whose count was read earlier.
    pub fn decode_hoisted(r: &mut NdrReader, max_count: u32) -> Result<Self>
    where
        T: NdrDecode,
    {
        let count = r.check_count(u64::from(max_count), T::NDR_MIN_SIZE)?;
        r.align(T::NDR_ALIGN)?;
        decode_elements(r, count).map(Self)
    }
}

impl<T> Default for ConformantArray<T> {
    fn default() -> Self {
        Self(Vec::new())
    }
}

impl<T> Deref for ConformantArray<T> {
    type Target = Vec<T>;

    fn deref(&self) -> &Vec<T> {
        &self.0
    }
}

impl<T> DerefMut for ConformantArray<T> {
    fn deref_mut(&mut self) -> &mut Vec<T> {
        &mut self.0
    }
}

impl<T> From<Vec<T>> for ConformantArray<T> {
    fn from(items: Vec<T>) -> Self {
        Self(items)
    }
}

impl<T: NdrLayout> NdrLayout for ConformantArray<T> {
    const NDR_ALIGN: usize = max_align(4, T::NDR_ALIGN);
    const NDR_MIN_SIZE: usize = 4;
}

impl<T: NdrEncode> NdrEncode for ConformantArray<T> {
    fn ndr_encode<'a>(&'a self, w: &mut NdrWriter<'a>) -> Result<()> {
        w.write_conformance(self.0.len())?;
        self.encode_hoisted(w)
    }
}

impl<T: NdrDecode> NdrDecode for ConformantArray<T> {
    fn ndr_decode(r: &mut NdrReader) -> Result<Self> {
        let max_count = r.read_conformance()?;
        Self::decode_hoisted(r, max_count)
    }

    fn ndr_decode_deferred(&mut self, r: &mut NdrReader) -> Result<()> {
        decode_elements_deferred(&mut self.0, r)
    }
}

/// Multi-dimensional conformant array, elements flattened in wire order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConformantArrayNd<T, const D: usize> {
    pub dims: [u32; D],
    pub items: Vec<T>,
}

impl<T, const D: usize> ConformantArrayNd<T, D> {
    pub fn new(dims: [u32; D], items: Vec<T>) -> Result<Self> {
        let expected = SizeInfo::new(dims.to_vec()).element_count()?;
        if expected != items.len() as u64 {
            return Err(NdrError::ArraySizeMismatch {
                expected: usize::try_from(expected).unwrap_or(usize::MAX),
                got: items.len(),
            });
        }
        Ok(Self { dims, items })
    }
}

impl<T: NdrLayout, const D: usize> NdrLayout for ConformantArrayNd<T, D> {
    const NDR_ALIGN: usize = max_align(4, T::NDR_ALIGN);
    const NDR_MIN_SIZE: usize = 4 * D;
}

impl<T: NdrEncode, const D: usize> NdrEncode for ConformantArrayNd<T, D> {
    fn ndr_encode<'a>(&'a self, w: &mut NdrWriter<'a>) -> Result<()> {
        let size = SizeInfo::new(self.dims.to_vec());
        let expected = size.element_count()?;
        if expected != self.items.len() as u64 {
            return Err(NdrError::ArraySizeMismatch {
                expected: usize::try_from(expected).unwrap_or(usize::MAX),
                got: self.items.len(),
            });
        }
        size.write(w);
        encode_elements(&self.items, w)
    }
}

impl<T: NdrDecode, const D: usize> NdrDecode for ConformantArrayNd<T, D> {
    fn ndr_decode(r: &mut NdrReader) -> Result<Self> {
        let size = SizeInfo::read(r, D)?;
        let count = size.validate(r, T::NDR_MIN_SIZE)?;
        r.align(T::NDR_ALIGN)?;
        let items = decode_elements(r, count)?;
        let mut dims = [0u32; D];
        dims.copy_from_slice(size.dims());
        Ok(Self { dims, items })
    }

    fn ndr_decode_deferred(&mut self, r: &mut NdrReader) -> Result<()> {
        decode_elements_deferred(&mut self.items, r)
    }
}

/// Varying array - fixed capacity `N`, transmitted window
///
/// Wire format: offset (u32), actual_count (u32), then actual_count
/// elements. The window must lie within the capacity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaryingArray<T, const N: usize> {
    pub offset: u32,
    pub items: Vec<T>,
}

impl<T, const N: usize> VaryingArray<T, N> {
    pub fn new(items: Vec<T>) -> Self {
        Self { offset: 0, items }
    }

    pub fn with_offset(offset: u32, items: Vec<T>) -> Self {
        Self { offset, items }
    }
}

impl<T, const N: usize> Default for VaryingArray<T, N> {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl<T: NdrLayout, const N: usize> NdrLayout for VaryingArray<T, N> {
    const NDR_ALIGN: usize = max_align(4, T::NDR_ALIGN);
    const NDR_MIN_SIZE: usize = 8;
}

impl<T: NdrEncode, const N: usize> NdrEncode for VaryingArray<T, N> {
    fn ndr_encode<'a>(&'a self, w: &mut NdrWriter<'a>) -> Result<()> {
        if u64::from(self.offset) + self.items.len() as u64 > N as u64 {
            return Err(NdrError::InvalidVariance {
                offset: self.offset,
                actual_count: u32::try_from(self.items.len()).unwrap_or(u32::MAX),
                max_count: u32::try_from(N).unwrap_or(u32::MAX),
            });
        }
        w.write_variance(self.offset as usize, self.items.len())?;
        encode_elements(&self.items, w)
    }
}

impl<T: NdrDecode, const N: usize> NdrDecode for VaryingArray<T, N> {
    fn ndr_decode(r: &mut NdrReader) -> Result<Self> {
        let (offset, actual_count) = r.read_variance(N as u64)?;
        let count = r.check_count(u64::from(actual_count), T::NDR_MIN_SIZE)?;
        r.align(T::NDR_ALIGN)?;
        let items = decode_elements(r, count)?;
        Ok(Self { offset, items })
    }

    fn ndr_decode_deferred(&mut self, r: &mut NdrReader) -> Result<()> {
        decode_elements_deferred(&mut self.items, r)
    }
}

/// Conformant varying array
///
/// Wire format: max_count, offset, actual_count, then the window. The
/// constructors raise `max_count` to cover the items, so a constructed value
/// compares equal to its decoded form. A `max_count` left too small after
/// editing the fields is raised to cover the window when encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConformantVaryingArray<T> {
    pub max_count: u32,
    pub offset: u32,
    pub items: Vec<T>,
}

impl<T> ConformantVaryingArray<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self::with_max(0, items)
    }

    pub fn with_max(max_count: u32, items: Vec<T>) -> Self {
        let len = u32::try_from(items.len()).unwrap_or(u32::MAX);
        Self {
            max_count: max_count.max(len),
            offset: 0,
            items,
        }
    }

    /// max_count as it will be written.
    pub fn effective_max_count(&self) -> Result<u32> {
        let needed = u64::from(self.offset) + self.items.len() as u64;
        let needed = u32::try_from(needed).map_err(|_| NdrError::IntegerOverflow("max_count"))?;
        Ok(self.max_count.max(needed))
    }
}

impl<T> Default for ConformantVaryingArray<T> {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl<T: NdrLayout> NdrLayout for ConformantVaryingArray<T> {
    const NDR_ALIGN: usize = max_align(4, T::NDR_ALIGN);
    const NDR_MIN_SIZE: usize = 12;
}

impl<T: NdrEncode> NdrEncode for ConformantVaryingArray<T> {
    fn ndr_encode<'a>(&'a self, w: &mut NdrWriter<'a>) -> Result<()> {
        let max_count = self.effective_max_count()?;
        w.write_u32(max_count);
        w.write_variance(self.offset as usize, self.items.len())?;
        encode_elements(&self.items, w)
    }
}

impl<T: NdrDecode> NdrDecode for ConformantVaryingArray<T> {
    fn ndr_decode(r: &mut NdrReader) -> Result<Self> {
        let max_count = r.read_conformance()?;
        r.check_limit(u64::from(max_count))?;
        let (offset, actual_count) = r.read_variance(u64::from(max_count))?;
        let count = r.check_count(u64::from(actual_count), T::NDR_MIN_SIZE)?;
        r.align(T::NDR_ALIGN)?;
        let items = decode_elements(r, count)?;
        Ok(Self {
            max_count,
            offset,
            items,
        })
    }

    fn ndr_decode_deferred(&mut self, r: &mut NdrReader) -> Result<()> {
        decode_elements_deferred(&mut self.items, r)
    }
}
