//! NDR string types
//!
//! `[string]` strings are conformant varying arrays with a NUL terminator
//! counted in both max_count and actual_count.
//!
//! Wire format:
//! ```text
//! max_count: u32    # Maximum elements including NUL
//! offset: u32       # Always 0 when encoding
//! actual_count: u32 # Actual elements including NUL
//! chars[actual_count]
//! ```
//!
//! `UnicodeString` is the counted RPC_UNICODE_STRING form, whose byte
//! lengths travel in the structure and whose buffer is not terminated.

use crate::encode::NdrLayout;
use crate::{NdrDecode, NdrEncode, NdrError, NdrReader, NdrWriter, Result};

/// Read a conformant varying header and validate the window.
fn read_string_header(r: &mut NdrReader, unit_size: usize) -> Result<usize> {
    let max_count = r.read_conformance()?;
    r.check_limit(u64::from(max_count))?;
    let (_offset, actual_count) = r.read_variance(u64::from(max_count))?;
    r.check_count(u64::from(actual_count), unit_size)
}

fn strip_terminator<T: PartialEq + Default>(units: &mut Vec<T>) {
    if units.last() == Some(&T::default()) {
        units.pop();
    }
}

fn utf16_to_string(units: &[u16]) -> Result<String> {
    char::decode_utf16(units.iter().copied())
        .collect::<std::result::Result<String, _>>()
        .map_err(NdrError::from)
}

/// Wide string (`[string] wchar_t*`)
#[derive(Debug, Clone, PartialEq, Eq, Default, Hash)]
pub struct NdrWString(pub String);

impl NdrWString {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// Number of UTF-16 code units on the wire, terminator included.
    pub fn wire_len(&self) -> usize {
        self.0.encode_utf16().count() + 1
    }
}

impl From<String> for NdrWString {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for NdrWString {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for NdrWString {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl NdrLayout for NdrWString {
    const NDR_ALIGN: usize = 4;
    const NDR_MIN_SIZE: usize = 12;
}

impl NdrEncode for NdrWString {
    fn ndr_encode<'a>(&'a self, w: &mut NdrWriter<'a>) -> Result<()> {
        if self.0.contains('\0') {
            return Err(NdrError::InvalidString("embedded NUL".into()));
        }
        let len = self.wire_len();
        w.write_conformance(len)?;
        w.write_variance(0, len)?;
        for unit in self.0.encode_utf16() {
            w.write_u16(unit);
        }
        w.write_u16(0);
        Ok(())
    }
}

impl NdrDecode for NdrWString {
    fn ndr_decode(r: &mut NdrReader) -> Result<Self> {
        let count = read_string_header(r, 2)?;
        let mut units = Vec::with_capacity(count);
        for _ in 0..count {
            units.push(r.read_u16()?);
        }
        strip_terminator(&mut units);
        utf16_to_string(&units).map(Self)
    }
}

/// Narrow string (`[string] char*`)
#[derive(Debug, Clone, PartialEq, Eq, Default, Hash)]
pub struct NdrString(pub String);

impl NdrString {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl From<String> for NdrString {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for NdrString {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl NdrLayout for NdrString {
    const NDR_ALIGN: usize = 4;
    const NDR_MIN_SIZE: usize = 12;
}

impl NdrEncode for NdrString {
    fn ndr_encode<'a>(&'a self, w: &mut NdrWriter<'a>) -> Result<()> {
        let bytes = self.0.as_bytes();
        if bytes.contains(&0) {
            return Err(NdrError::InvalidString("embedded NUL".into()));
        }
        let len = bytes.len() + 1;
        w.write_conformance(len)?;
        w.write_variance(0, len)?;
        w.write_bytes(bytes);
        w.write_u8(0);
        Ok(())
    }
}

impl NdrDecode for NdrString {
    fn ndr_decode(r: &mut NdrReader) -> Result<Self> {
        let count = read_string_header(r, 1)?;
        let mut bytes = r.read_bytes(count)?.to_vec();
        strip_terminator(&mut bytes);
        String::from_utf8(bytes)
            .map(Self)
            .map_err(|e| NdrError::InvalidString(e.to_string()))
    }
}

/// Counted wide string (RPC_UNICODE_STRING)
///
/// ```text
/// typedef struct _RPC_UNICODE_STRING {
///     unsigned short Length;
///     unsigned short MaximumLength;
///     [size_is(MaximumLength/2), length_is(Length/2)] WCHAR* Buffer;
/// } RPC_UNICODE_STRING;
/// ```
///
/// Lengths are in bytes. Call [`UnicodeString::prepare`] before encoding
/// to derive them from the buffer contents.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UnicodeString {
    pub length: u16,
    pub maximum_length: u16,
    pub buffer: Option<String>,
    pending: bool,
}

impl UnicodeString {
    pub fn new(s: impl Into<String>) -> Self {
        Self {
            length: 0,
            maximum_length: 0,
            buffer: Some(s.into()),
            pending: false,
        }
    }

    /// Fill zero length fields from the buffer.
    pub fn prepare(&mut self) -> Result<()> {
        let Some(buffer) = &self.buffer else {
            return Ok(());
        };
        let bytes = buffer.encode_utf16().count() * 2;
        let bytes = u16::try_from(bytes).map_err(|_| NdrError::IntegerOverflow("Length"))?;
        if self.length == 0 {
            self.length = bytes;
        }
        if self.maximum_length < self.length {
            self.maximum_length = self.length;
        }
        Ok(())
    }

    pub fn as_str(&self) -> &str {
        self.buffer.as_deref().unwrap_or_default()
    }
}

impl NdrLayout for UnicodeString {
    const NDR_ALIGN: usize = 4;
    const NDR_MIN_SIZE: usize = 8;
}

impl NdrEncode for UnicodeString {
    fn ndr_encode<'a>(&'a self, w: &mut NdrWriter<'a>) -> Result<()> {
        w.align(4);
        w.write_u16(self.length);
        w.write_u16(self.maximum_length);
        let Some(buffer) = &self.buffer else {
            w.write_null();
            return Ok(());
        };
        if self.length > self.maximum_length {
            return Err(NdrError::ConformanceMismatch {
                max_count: u32::from(self.maximum_length / 2),
                actual_count: u32::from(self.length / 2),
            });
        }
        let units: Vec<u16> = buffer.encode_utf16().collect();
        let actual = usize::from(self.length / 2);
        if actual > units.len() {
            return Err(NdrError::ArraySizeMismatch {
                expected: actual,
                got: units.len(),
            });
        }
        let max_count = usize::from(self.maximum_length / 2);
        w.write_referent();
        w.defer(move |w| {
            w.write_conformance(max_count)?;
            w.write_variance(0, actual)?;
            for &unit in &units[..actual] {
                w.write_u16(unit);
            }
            Ok(())
        });
        Ok(())
    }
}

impl NdrDecode for UnicodeString {
    fn ndr_decode(r: &mut NdrReader) -> Result<Self> {
        r.align(4)?;
        let length = r.read_u16()?;
        let maximum_length = r.read_u16()?;
        let id = r.read_referent()?;
        Ok(Self {
            length,
            maximum_length,
            buffer: None,
            pending: id != 0,
        })
    }

    fn ndr_decode_deferred(&mut self, r: &mut NdrReader) -> Result<()> {
        if !self.pending {
            return Ok(());
        }
        self.pending = false;
        let max_count = r.read_conformance()?;
        if max_count != u32::from(self.maximum_length / 2) {
            return Err(NdrError::ConformanceMismatch {
                max_count,
                actual_count: u32::from(self.maximum_length / 2),
            });
        }
        let (_offset, actual_count) = r.read_variance(u64::from(max_count))?;
        if actual_count != u32::from(self.length / 2) {
            return Err(NdrError::ConformanceMismatch {
                max_count,
                actual_count,
            });
        }
        let count = r.check_count(u64::from(actual_count), 2)?;
        let mut units = Vec::with_capacity(count);
        for _ in 0..count {
            units.push(r.read_u16()?);
        }
        self.buffer = Some(utf16_to_string(&units)?);
        Ok(())
    }
}
