//! NDR discriminated unions
//!
//! A union is a selector followed by the arm it selects. Encapsulated
//! unions carry the selector themselves ([`Encapsulated`]); for
//! non-encapsulated unions (`[switch_is(field)]`) the enclosing structure
//! writes the selector and calls the arm codec directly.
//!
//! Selectors with no matching arm are not an error. Implementations decode
//! them into a default arm that keeps the selector, so the value re-encodes
//! unchanged.

use crate::encode::{max_align, NdrLayout};
use crate::{NdrDecode, NdrEncode, NdrReader, NdrWriter, Result};

/// Integer types usable as a union selector.
pub trait NdrSelector: NdrDecode + Copy {
    fn write_selector(self, w: &mut NdrWriter<'_>);
}

macro_rules! impl_selector {
    ($($ty:ty => $write:ident),* $(,)?) => {
        $(
            impl NdrSelector for $ty {
                #[inline]
                fn write_selector(self, w: &mut NdrWriter<'_>) {
                    w.$write(self);
                }
            }
        )*
    };
}

impl_selector!(
    u8 => write_u8,
    i8 => write_i8,
    u16 => write_u16,
    i16 => write_i16,
    u32 => write_u32,
    i32 => write_i32,
);

/// Arm codec for a discriminated union.
pub trait NdrUnion: Sized {
    /// Wire type of the selector.
    type Selector: NdrSelector;

    /// Alignment of the largest arm.
    const ARM_ALIGN: usize;

    /// Selector value for the current arm.
    fn selector(&self) -> Self::Selector;

    /// Write the current arm's inline part.
    fn encode_arm<'a>(&'a self, w: &mut NdrWriter<'a>) -> Result<()>;

    /// Read the arm chosen by `selector`. Unknown selectors produce the
    /// default arm.
    fn decode_arm(selector: Self::Selector, r: &mut NdrReader) -> Result<Self>;

    /// Read pointees of the decoded arm.
    fn decode_arm_deferred(&mut self, _r: &mut NdrReader) -> Result<()> {
        Ok(())
    }
}

/// Encapsulated union: selector, then arm.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Encapsulated<U>(pub U);

impl<U> Encapsulated<U> {
    pub fn into_inner(self) -> U {
        self.0
    }
}

impl<U: NdrUnion> NdrLayout for Encapsulated<U> {
    const NDR_ALIGN: usize = max_align(U::Selector::NDR_ALIGN, U::ARM_ALIGN);
    const NDR_MIN_SIZE: usize = U::Selector::NDR_MIN_SIZE;
}

impl<U: NdrUnion> NdrEncode for Encapsulated<U> {
    fn ndr_encode<'a>(&'a self, w: &mut NdrWriter<'a>) -> Result<()> {
        w.align(Self::NDR_ALIGN);
        self.0.selector().write_selector(w);
        w.align(U::ARM_ALIGN);
        self.0.encode_arm(w)
    }
}

impl<U: NdrUnion> NdrDecode for Encapsulated<U> {
    fn ndr_decode(r: &mut NdrReader) -> Result<Self> {
        r.align(Self::NDR_ALIGN)?;
        let selector = U::Selector::ndr_decode(r)?;
        r.align(U::ARM_ALIGN)?;
        U::decode_arm(selector, r).map(Self)
    }

    fn ndr_decode_deferred(&mut self, r: &mut NdrReader) -> Result<()> {
        self.0.decode_arm_deferred(r)
    }
}
