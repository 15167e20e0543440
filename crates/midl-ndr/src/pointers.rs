//! NDR pointer types
//!
//! NDR supports three pointer semantics:
//!
//! - Reference (`[ref]`): Non-null, data follows inline, no wire representation
//! - Unique (`[unique]`): Nullable, 4-byte referent ID, no aliasing
//! - Full (`[ptr]`): Nullable, 4-byte referent ID, aliasing allowed
//!
//! Unique and full pointees are deferred: the writer queues them and the
//! reader fetches them in `ndr_decode_deferred`.

use crate::encode::NdrLayout;
use crate::{NdrDecode, NdrEncode, NdrError, NdrReader, NdrWriter, Result};
use std::any::Any;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, OnceLock};

/// Trait for NDR pointer types
pub trait NdrPtr {
    type Target;

    /// Check if the pointer is null
    fn is_null(&self) -> bool;

    /// Get the inner value, if any
    fn get(&self) -> Option<&Self::Target>;
}

/// Reference pointer - non-null, data follows inline
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RefPtr<T>(pub T);

impl<T> RefPtr<T> {
    pub fn new(value: T) -> Self {
        Self(value)
    }

    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> Deref for RefPtr<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<T> DerefMut for RefPtr<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl<T> NdrPtr for RefPtr<T> {
    type Target = T;

    fn is_null(&self) -> bool {
        false
    }

    fn get(&self) -> Option<&T> {
        Some(&self.0)
    }
}

impl<T: NdrLayout> NdrLayout for RefPtr<T> {
    const NDR_ALIGN: usize = T::NDR_ALIGN;
    const NDR_MIN_SIZE: usize = T::NDR_MIN_SIZE;
}

impl<T: NdrEncode> NdrEncode for RefPtr<T> {
    fn ndr_encode<'a>(&'a self, w: &mut NdrWriter<'a>) -> Result<()> {
        self.0.ndr_encode(w)
    }
}

impl<T: NdrDecode> NdrDecode for RefPtr<T> {
    fn ndr_decode(r: &mut NdrReader) -> Result<Self> {
        T::ndr_decode(r).map(Self)
    }

    fn ndr_decode_deferred(&mut self, r: &mut NdrReader) -> Result<()> {
        self.0.ndr_decode_deferred(r)
    }
}

/// Read a pointee (inline part, then its own deferred data) one nesting
/// level down.
fn decode_pointee<T: NdrDecode>(r: &mut NdrReader) -> Result<T> {
    r.enter()?;
    let result = T::ndr_decode(r).and_then(|mut value| {
        value.ndr_decode_deferred(r)?;
        Ok(value)
    });
    r.leave();
    result
}

/// Unique pointer - nullable, no aliasing
///
/// Encoded as a 4-byte referent ID (0 = null); the pointee is deferred.
pub struct UniquePtr<T> {
    value: Option<Box<T>>,
    pending: bool,
}

impl<T> UniquePtr<T> {
    pub fn new(value: T) -> Self {
        Self {
            value: Some(Box::new(value)),
            pending: false,
        }
    }

    pub fn null() -> Self {
        Self {
            value: None,
            pending: false,
        }
    }

    pub fn is_null(&self) -> bool {
        self.value.is_none() && !self.pending
    }

    pub fn get(&self) -> Option<&T> {
        self.value.as_deref()
    }

    pub fn get_mut(&mut self) -> Option<&mut T> {
        self.value.as_deref_mut()
    }

    pub fn take(&mut self) -> Option<T> {
        self.value.take().map(|b| *b)
    }

    pub fn into_inner(self) -> Option<T> {
        self.value.map(|b| *b)
    }
}

impl<T> Default for UniquePtr<T> {
    fn default() -> Self {
        Self::null()
    }
}

impl<T> From<Option<T>> for UniquePtr<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => Self::new(v),
            None => Self::null(),
        }
    }
}

impl<T: Clone> Clone for UniquePtr<T> {
    fn clone(&self) -> Self {
        Self {
            value: self.value.clone(),
            pending: self.pending,
        }
    }
}

impl<T: PartialEq> PartialEq for UniquePtr<T> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl<T: Eq> Eq for UniquePtr<T> {}

impl<T: fmt::Debug> fmt::Debug for UniquePtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(v) => f.debug_tuple("UniquePtr").field(v).finish(),
            None => f.write_str("UniquePtr(null)"),
        }
    }
}

impl<T> NdrPtr for UniquePtr<T> {
    type Target = T;

    fn is_null(&self) -> bool {
        UniquePtr::is_null(self)
    }

    fn get(&self) -> Option<&T> {
        UniquePtr::get(self)
    }
}

impl<T> NdrLayout for UniquePtr<T> {
    const NDR_ALIGN: usize = 4;
    const NDR_MIN_SIZE: usize = 4;
}

impl<T: NdrEncode> NdrEncode for UniquePtr<T> {
    fn ndr_encode<'a>(&'a self, w: &mut NdrWriter<'a>) -> Result<()> {
        match self.value.as_deref() {
            None => w.write_null(),
            Some(pointee) => {
                w.write_referent();
                w.defer(move |w| pointee.ndr_encode(w));
            }
        }
        Ok(())
    }
}

impl<T: NdrDecode> NdrDecode for UniquePtr<T> {
    fn ndr_decode(r: &mut NdrReader) -> Result<Self> {
        let id = r.read_referent()?;
        Ok(Self {
            value: None,
            pending: id != 0,
        })
    }

    fn ndr_decode_deferred(&mut self, r: &mut NdrReader) -> Result<()> {
        if self.pending {
            self.pending = false;
            self.value = Some(Box::new(decode_pointee(r)?));
        }
        Ok(())
    }
}

/// Full pointer - nullable, aliasing allowed
///
/// Pointers that share a referent (clones made with [`FullPtr::alias`])
/// are sent with one referent ID and one copy of the pointee. On decode,
/// every occurrence of an ID resolves to the same shared value, including
/// occurrences that precede the one carrying the data.
pub struct FullPtr<T> {
    slot: Option<Arc<OnceLock<T>>>,
    pending: Option<u32>,
}

impl<T> FullPtr<T> {
    pub fn new(value: T) -> Self {
        Self {
            slot: Some(Arc::new(OnceLock::from(value))),
            pending: None,
        }
    }

    pub fn null() -> Self {
        Self {
            slot: None,
            pending: None,
        }
    }

    /// Another pointer to the same referent.
    pub fn alias(&self) -> Self {
        Self {
            slot: self.slot.clone(),
            pending: None,
        }
    }

    pub fn is_null(&self) -> bool {
        self.slot.is_none()
    }

    pub fn get(&self) -> Option<&T> {
        self.slot.as_ref().and_then(|slot| slot.get())
    }

    /// Whether both pointers refer to the same referent.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (&self.slot, &other.slot) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }
}

impl<T> Default for FullPtr<T> {
    fn default() -> Self {
        Self::null()
    }
}

impl<T> Clone for FullPtr<T> {
    fn clone(&self) -> Self {
        self.alias()
    }
}

impl<T: PartialEq> PartialEq for FullPtr<T> {
    fn eq(&self, other: &Self) -> bool {
        self.is_null() == other.is_null() && self.get() == other.get()
    }
}

impl<T: fmt::Debug> fmt::Debug for FullPtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.get() {
            Some(v) => f.debug_tuple("FullPtr").field(v).finish(),
            None if self.is_null() => f.write_str("FullPtr(null)"),
            None => f.write_str("FullPtr(<unresolved>)"),
        }
    }
}

impl<T> NdrPtr for FullPtr<T> {
    type Target = T;

    fn is_null(&self) -> bool {
        FullPtr::is_null(self)
    }

    fn get(&self) -> Option<&T> {
        FullPtr::get(self)
    }
}

impl<T> NdrLayout for FullPtr<T> {
    const NDR_ALIGN: usize = 4;
    const NDR_MIN_SIZE: usize = 4;
}

impl<T: NdrEncode> NdrEncode for FullPtr<T> {
    fn ndr_encode<'a>(&'a self, w: &mut NdrWriter<'a>) -> Result<()> {
        let Some(slot) = &self.slot else {
            w.write_null();
            return Ok(());
        };
        let (id, first) = w.full_referent(Arc::as_ptr(slot) as usize);
        w.write_u32(id);
        if first {
            let pointee = slot.get().ok_or(NdrError::InvalidPointer(id))?;
            w.defer(move |w| pointee.ndr_encode(w));
        }
        Ok(())
    }
}

impl<T> NdrDecode for FullPtr<T>
where
    T: NdrDecode + Any + Send + Sync,
{
    fn ndr_decode(r: &mut NdrReader) -> Result<Self> {
        let id = r.read_referent()?;
        if id == 0 {
            return Ok(Self::null());
        }
        let (slot, first) = r.full_referent::<OnceLock<T>>(id)?;
        Ok(Self {
            slot: Some(slot),
            pending: first.then_some(id),
        })
    }

    fn ndr_decode_deferred(&mut self, r: &mut NdrReader) -> Result<()> {
        let (Some(id), Some(slot)) = (self.pending.take(), &self.slot) else {
            return Ok(());
        };
        r.begin_referent(id);
        let value = decode_pointee::<T>(r);
        r.end_referent(id);
        // The slot is fresh for a first occurrence, so `set` cannot fail.
        let _ = slot.set(value?);
        Ok(())
    }
}
