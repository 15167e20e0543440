//! NDR primitive type implementations
//!
//! | MIDL Type     | Rust Type | Size | Alignment |
//! |---------------|-----------|------|-----------|
//! | boolean       | bool      | 1    | 1         |
//! | byte/char     | u8        | 1    | 1         |
//! | small         | i8        | 1    | 1         |
//! | short         | i16       | 2    | 2         |
//! | long/int      | i32       | 4    | 4         |
//! | hyper         | i64       | 8    | 8         |
//! | unsigned short| u16       | 2    | 2         |
//! | unsigned long | u32       | 4    | 4         |
//! | unsigned hyper| u64       | 8    | 8         |
//! | float         | f32       | 4    | 4         |
//! | double        | f64       | 8    | 8         |
//! | wchar_t       | u16       | 2    | 2         |
//! | GUID          | Guid      | 16   | 4         |

use crate::encode::NdrLayout;
use crate::{NdrDecode, NdrEncode, NdrError, NdrReader, NdrWriter, Result};
use std::fmt;
use std::str::FromStr;

macro_rules! impl_ndr_primitive {
    ($ty:ty, $write:ident, $read:ident) => {
        impl NdrLayout for $ty {
            const NDR_ALIGN: usize = std::mem::size_of::<$ty>();
            const NDR_MIN_SIZE: usize = std::mem::size_of::<$ty>();
        }

        impl NdrEncode for $ty {
            #[inline]
            fn ndr_encode<'a>(&'a self, w: &mut NdrWriter<'a>) -> Result<()> {
                w.$write(*self);
                Ok(())
            }
        }

        impl NdrDecode for $ty {
            #[inline]
            fn ndr_decode(r: &mut NdrReader) -> Result<Self> {
                r.$read()
            }
        }
    };
}

impl_ndr_primitive!(u8, write_u8, read_u8);
impl_ndr_primitive!(i8, write_i8, read_i8);
impl_ndr_primitive!(bool, write_bool, read_bool);
impl_ndr_primitive!(u16, write_u16, read_u16);
impl_ndr_primitive!(i16, write_i16, read_i16);
impl_ndr_primitive!(u32, write_u32, read_u32);
impl_ndr_primitive!(i32, write_i32, read_i32);
impl_ndr_primitive!(u64, write_u64, read_u64);
impl_ndr_primitive!(i64, write_i64, read_i64);
impl_ndr_primitive!(f32, write_f32, read_f32);
impl_ndr_primitive!(f64, write_f64, read_f64);

/// GUID / UUID in its NDR field layout
///
/// The first three fields follow the data representation byte order, the
/// last eight bytes are sent as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Guid {
    pub data1: u32,
    pub data2: u16,
    pub data3: u16,
    pub data4: [u8; 8],
}

impl Guid {
    /// Nil GUID
    pub const NIL: Self = Self {
        data1: 0,
        data2: 0,
        data3: 0,
        data4: [0; 8],
    };

    pub const fn new(data1: u32, data2: u16, data3: u16, data4: [u8; 8]) -> Self {
        Self {
            data1,
            data2,
            data3,
            data4,
        }
    }

    /// Build from the 128-bit value of the registry string form, so
    /// `0x00000131_0000_0000_c000_000000000046` is
    /// `00000131-0000-0000-C000-000000000046`.
    pub const fn from_u128(v: u128) -> Self {
        Self {
            data1: (v >> 96) as u32,
            data2: (v >> 80) as u16,
            data3: (v >> 64) as u16,
            data4: (v as u64).to_be_bytes(),
        }
    }

    pub const fn to_u128(&self) -> u128 {
        ((self.data1 as u128) << 96)
            | ((self.data2 as u128) << 80)
            | ((self.data3 as u128) << 64)
            | u64::from_be_bytes(self.data4) as u128
    }

    /// Random (version 4) GUID
    pub fn new_v4() -> Self {
        Self::from_u128(uuid::Uuid::new_v4().as_u128())
    }

    /// Parse a GUID from the hyphenated string form, with or without braces.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim_start_matches('{').trim_end_matches('}');
        uuid::Uuid::parse_str(s)
            .ok()
            .map(|u| Self::from_u128(u.as_u128()))
    }

    pub fn is_nil(&self) -> bool {
        *self == Self::NIL
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:08x}-{:04x}-{:04x}-{:02x}{:02x}-{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}",
            self.data1,
            self.data2,
            self.data3,
            self.data4[0],
            self.data4[1],
            self.data4[2],
            self.data4[3],
            self.data4[4],
            self.data4[5],
            self.data4[6],
            self.data4[7]
        )
    }
}

impl FromStr for Guid {
    type Err = NdrError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s).ok_or_else(|| NdrError::InvalidString(format!("not a GUID: {s}")))
    }
}

impl From<uuid::Uuid> for Guid {
    fn from(u: uuid::Uuid) -> Self {
        Self::from_u128(u.as_u128())
    }
}

impl From<Guid> for uuid::Uuid {
    fn from(g: Guid) -> Self {
        uuid::Uuid::from_u128(g.to_u128())
    }
}

impl NdrLayout for Guid {
    const NDR_ALIGN: usize = 4;
    const NDR_MIN_SIZE: usize = 16;
}

impl NdrEncode for Guid {
    fn ndr_encode<'a>(&'a self, w: &mut NdrWriter<'a>) -> Result<()> {
        w.write_u32(self.data1);
        w.write_u16(self.data2);
        w.write_u16(self.data3);
        w.write_bytes(&self.data4);
        Ok(())
    }
}

impl NdrDecode for Guid {
    fn ndr_decode(r: &mut NdrReader) -> Result<Self> {
        let data1 = r.read_u32()?;
        let data2 = r.read_u16()?;
        let data3 = r.read_u16()?;
        let tail = r.read_bytes(8)?;
        let mut data4 = [0u8; 8];
        data4.copy_from_slice(&tail);
        Ok(Self {
            data1,
            data2,
            data3,
            data4,
        })
    }
}
