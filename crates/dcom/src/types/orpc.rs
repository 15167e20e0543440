//! ORPC (Object RPC) header types (MS-DCOM 2.2.13, 2.2.14)
//!
//! Every DCOM request starts with an ORPCTHIS and every response with an
//! ORPCTHAT; both may carry an extent array of opaque extensions.

use super::identifiers::Cid;
use midl_ndr::{
    ConformantArray, Guid, NdrDecode, NdrEncode, NdrError, NdrLayout, NdrReader, NdrWriter,
    UniquePtr,
};

/// Extension carrying extended error information.
pub const EXTENT_ERROR_INFO: Guid = Guid::from_u128(0x0000031c_0000_0000_c000_000000000046);

/// COM version structure (MS-DCOM 2.2.11)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct ComVersion {
    pub major: u16,
    pub minor: u16,
}

impl ComVersion {
    pub const SIZE: usize = 4;

    /// DCOM version 5.1 (Windows 2000)
    pub const DCOM_5_1: Self = Self { major: 5, minor: 1 };
    /// DCOM version 5.4 (Windows XP/2003)
    pub const DCOM_5_4: Self = Self { major: 5, minor: 4 };
    /// DCOM version 5.6 (Windows Vista)
    pub const DCOM_5_6: Self = Self { major: 5, minor: 6 };
    /// DCOM version 5.7 (Windows 7)
    pub const DCOM_5_7: Self = Self { major: 5, minor: 7 };

    pub const fn new(major: u16, minor: u16) -> Self {
        Self { major, minor }
    }
}

impl NdrLayout for ComVersion {
    const NDR_ALIGN: usize = 2;
    const NDR_MIN_SIZE: usize = 4;
}

impl NdrEncode for ComVersion {
    fn ndr_encode<'a>(&'a self, w: &mut NdrWriter<'a>) -> midl_ndr::Result<()> {
        w.write_u16(self.major);
        w.write_u16(self.minor);
        Ok(())
    }
}

impl NdrDecode for ComVersion {
    fn ndr_decode(r: &mut NdrReader) -> midl_ndr::Result<Self> {
        Ok(Self {
            major: r.read_u16()?,
            minor: r.read_u16()?,
        })
    }
}

/// One ORPC extension (MS-DCOM 2.2.21.4)
///
/// A conformant structure: the byte array is sized to `size` rounded up to
/// a multiple of 8 and zero-padded on the wire.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct OrpcExtent {
    pub id: Guid,
    /// Number of meaningful bytes in `data`.
    pub size: u32,
    pub data: Vec<u8>,
}

impl OrpcExtent {
    pub fn new(id: Guid, data: Vec<u8>) -> Self {
        Self {
            id,
            size: data.len() as u32,
            data,
        }
    }

    fn padded_len(size: u32) -> midl_ndr::Result<u32> {
        size.checked_add(7)
            .map(|n| n & !7)
            .ok_or(NdrError::IntegerOverflow("extent size"))
    }
}

impl NdrLayout for OrpcExtent {
    const NDR_ALIGN: usize = 4;
    const NDR_MIN_SIZE: usize = 24;
}

impl NdrEncode for OrpcExtent {
    fn ndr_encode<'a>(&'a self, w: &mut NdrWriter<'a>) -> midl_ndr::Result<()> {
        let max_count = Self::padded_len(self.size)?;
        if self.data.len() > max_count as usize {
            return Err(NdrError::ConformanceMismatch {
                max_count,
                actual_count: u32::try_from(self.data.len()).unwrap_or(u32::MAX),
            });
        }
        w.write_conformance(max_count as usize)?;
        self.id.ndr_encode(w)?;
        w.write_u32(self.size);
        w.write_bytes(&self.data);
        for _ in self.data.len()..max_count as usize {
            w.write_u8(0);
        }
        Ok(())
    }
}

impl NdrDecode for OrpcExtent {
    fn ndr_decode(r: &mut NdrReader) -> midl_ndr::Result<Self> {
        let max_count = r.read_conformance()?;
        let id = Guid::ndr_decode(r)?;
        let size = r.read_u32()?;
        if size > max_count {
            return Err(NdrError::ConformanceMismatch {
                max_count,
                actual_count: size,
            });
        }
        let padded = Self::padded_len(size)?;
        if padded != max_count {
            return Err(NdrError::ConformanceMismatch {
                max_count,
                actual_count: padded,
            });
        }
        let count = r.check_count(u64::from(max_count), 1)?;
        let raw = r.read_bytes(count)?;
        Ok(Self {
            id,
            size,
            data: raw[..size as usize].to_vec(),
        })
    }
}

/// Extension array (MS-DCOM 2.2.21.5)
///
/// `size` counts the extensions; the slot array is sized to `size` rounded
/// up to an even number and unused slots are null.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct OrpcExtentArray {
    pub size: u32,
    pub reserved: u32,
    pub extent: UniquePtr<ConformantArray<UniquePtr<OrpcExtent>>>,
}

impl OrpcExtentArray {
    pub fn new(extents: Vec<OrpcExtent>) -> Self {
        let size = extents.len() as u32;
        let mut slots: Vec<UniquePtr<OrpcExtent>> =
            extents.into_iter().map(UniquePtr::new).collect();
        if slots.len() % 2 == 1 {
            slots.push(UniquePtr::null());
        }
        Self {
            size,
            reserved: 0,
            extent: UniquePtr::new(ConformantArray::new(slots)),
        }
    }

    fn slot_count(size: u32) -> u32 {
        size.saturating_add(1) & !1
    }

    /// Non-null extensions in wire order.
    pub fn extents(&self) -> impl Iterator<Item = &OrpcExtent> {
        self.extent
            .get()
            .into_iter()
            .flat_map(|slots| slots.iter())
            .filter_map(|slot| slot.get())
    }

    pub fn find(&self, id: &Guid) -> Option<&OrpcExtent> {
        self.extents().find(|e| &e.id == id)
    }
}

impl NdrLayout for OrpcExtentArray {
    const NDR_ALIGN: usize = 4;
    const NDR_MIN_SIZE: usize = 12;
}

impl NdrEncode for OrpcExtentArray {
    fn ndr_encode<'a>(&'a self, w: &mut NdrWriter<'a>) -> midl_ndr::Result<()> {
        if let Some(slots) = self.extent.get() {
            let expected = Self::slot_count(self.size);
            if slots.len() != expected as usize {
                return Err(NdrError::ConformanceMismatch {
                    max_count: expected,
                    actual_count: u32::try_from(slots.len()).unwrap_or(u32::MAX),
                });
            }
        }
        w.align(Self::NDR_ALIGN);
        w.write_u32(self.size);
        w.write_u32(self.reserved);
        self.extent.ndr_encode(w)
    }
}

impl NdrDecode for OrpcExtentArray {
    fn ndr_decode(r: &mut NdrReader) -> midl_ndr::Result<Self> {
        r.align(Self::NDR_ALIGN)?;
        Ok(Self {
            size: r.read_u32()?,
            reserved: r.read_u32()?,
            extent: UniquePtr::ndr_decode(r)?,
        })
    }

    fn ndr_decode_deferred(&mut self, r: &mut NdrReader) -> midl_ndr::Result<()> {
        self.extent.ndr_decode_deferred(r)?;
        if let Some(slots) = self.extent.get() {
            if slots.len() as u64 != u64::from(Self::slot_count(self.size)) {
                return Err(NdrError::ConformanceMismatch {
                    max_count: u32::try_from(slots.len()).unwrap_or(u32::MAX),
                    actual_count: self.size,
                });
            }
        }
        Ok(())
    }
}

/// ORPCTHIS (MS-DCOM 2.2.13.1), first parameter of every DCOM request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrpcThis {
    pub version: ComVersion,
    /// ORPCF_* flags
    pub flags: u32,
    pub reserved1: u32,
    pub cid: Cid,
    pub extensions: UniquePtr<OrpcExtentArray>,
}

impl OrpcThis {
    /// Fresh header with a new causality id.
    pub fn new() -> Self {
        Self::with_cid(Cid::generate())
    }

    pub fn with_cid(cid: Cid) -> Self {
        Self {
            version: crate::DCOM_VERSION,
            flags: 0,
            reserved1: 0,
            cid,
            extensions: UniquePtr::null(),
        }
    }

    pub fn with_extensions(mut self, extensions: OrpcExtentArray) -> Self {
        self.extensions = UniquePtr::new(extensions);
        self
    }
}

impl Default for OrpcThis {
    fn default() -> Self {
        Self::with_cid(Cid::NIL)
    }
}

impl NdrLayout for OrpcThis {
    const NDR_ALIGN: usize = 4;
    const NDR_MIN_SIZE: usize = 32;
}

impl NdrEncode for OrpcThis {
    fn ndr_encode<'a>(&'a self, w: &mut NdrWriter<'a>) -> midl_ndr::Result<()> {
        w.align(Self::NDR_ALIGN);
        self.version.ndr_encode(w)?;
        w.write_u32(self.flags);
        w.write_u32(self.reserved1);
        self.cid.ndr_encode(w)?;
        self.extensions.ndr_encode(w)
    }
}

impl NdrDecode for OrpcThis {
    fn ndr_decode(r: &mut NdrReader) -> midl_ndr::Result<Self> {
        r.align(Self::NDR_ALIGN)?;
        Ok(Self {
            version: ComVersion::ndr_decode(r)?,
            flags: r.read_u32()?,
            reserved1: r.read_u32()?,
            cid: Cid::ndr_decode(r)?,
            extensions: UniquePtr::ndr_decode(r)?,
        })
    }

    fn ndr_decode_deferred(&mut self, r: &mut NdrReader) -> midl_ndr::Result<()> {
        self.extensions.ndr_decode_deferred(r)
    }
}

/// ORPCTHAT (MS-DCOM 2.2.13.2), first out-parameter of every DCOM response.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct OrpcThat {
    pub flags: u32,
    pub extensions: UniquePtr<OrpcExtentArray>,
}

impl OrpcThat {
    pub fn new() -> Self {
        Self::default()
    }
}

impl NdrLayout for OrpcThat {
    const NDR_ALIGN: usize = 4;
    const NDR_MIN_SIZE: usize = 8;
}

impl NdrEncode for OrpcThat {
    fn ndr_encode<'a>(&'a self, w: &mut NdrWriter<'a>) -> midl_ndr::Result<()> {
        w.align(Self::NDR_ALIGN);
        w.write_u32(self.flags);
        self.extensions.ndr_encode(w)
    }
}

impl NdrDecode for OrpcThat {
    fn ndr_decode(r: &mut NdrReader) -> midl_ndr::Result<Self> {
        r.align(Self::NDR_ALIGN)?;
        Ok(Self {
            flags: r.read_u32()?,
            extensions: UniquePtr::ndr_decode(r)?,
        })
    }

    fn ndr_decode_deferred(&mut self, r: &mut NdrReader) -> midl_ndr::Result<()> {
        self.extensions.ndr_decode_deferred(r)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_orpc_this_new() {
        let this = OrpcThis::new();
        assert_eq!(this.version, ComVersion::DCOM_5_7);
        assert_eq!(this.flags, 0);
        assert!(!this.cid.is_nil());
        assert!(this.extensions.is_null());
    }

    #[test]
    fn test_orpc_this_without_extensions_is_32_bytes() {
        let this = OrpcThis::new();
        let mut w = NdrWriter::new();
        w.encode(&this).unwrap();
        let bytes = w.finish().unwrap();
        assert_eq!(bytes.len(), 32);
        assert_eq!(&bytes[0..4], &[5, 0, 7, 0]);
        assert_eq!(&bytes[28..32], &[0, 0, 0, 0]);

        let decoded: OrpcThis = NdrReader::new(bytes).decode().unwrap();
        assert_eq!(decoded, this);
    }

    #[test]
    fn test_extent_padding() {
        let extent = OrpcExtent::new(EXTENT_ERROR_INFO, vec![1, 2, 3]);
        let mut w = NdrWriter::new();
        w.encode(&extent).unwrap();
        let bytes = w.finish().unwrap();
        // max_count + id + size + 8 padded data bytes
        assert_eq!(bytes.len(), 4 + 16 + 4 + 8);
        assert_eq!(&bytes[0..4], &8u32.to_le_bytes());
        assert_eq!(&bytes[24..], &[1, 2, 3, 0, 0, 0, 0, 0]);

        let decoded: OrpcExtent = NdrReader::new(bytes).decode().unwrap();
        assert_eq!(decoded, extent);
    }

    #[test]
    fn test_extent_size_beyond_conformance() {
        let id = EXTENT_ERROR_INFO;
        let mut w = NdrWriter::new();
        w.write_u32(8);
        id.ndr_encode(&mut w).unwrap();
        w.write_u32(9);
        w.write_bytes(&[0; 8]);
        let bytes = w.finish().unwrap();

        let err = NdrReader::new(bytes).decode::<OrpcExtent>().unwrap_err();
        assert!(matches!(
            err,
            NdrError::ConformanceMismatch {
                max_count: 8,
                actual_count: 9
            }
        ));
    }

    #[test]
    fn test_extent_conformance_must_match_padded_size() {
        let id = EXTENT_ERROR_INFO;
        let mut w = NdrWriter::new();
        w.write_u32(16);
        id.ndr_encode(&mut w).unwrap();
        w.write_u32(3);
        w.write_bytes(&[1, 2, 3, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
        let bytes = w.finish().unwrap();

        let err = NdrReader::new(bytes).decode::<OrpcExtent>().unwrap_err();
        assert!(err.is_malformed());
        assert!(matches!(
            err,
            NdrError::ConformanceMismatch {
                max_count: 16,
                actual_count: 8
            }
        ));
    }

    #[test]
    fn test_extent_array_pads_slots() {
        let array = OrpcExtentArray::new(vec![OrpcExtent::new(EXTENT_ERROR_INFO, vec![0xaa; 12])]);
        assert_eq!(array.size, 1);
        assert_eq!(array.extent.get().unwrap().len(), 2);

        let this = OrpcThis::new().with_extensions(array.clone());
        let mut w = NdrWriter::new();
        w.encode(&this).unwrap();
        let bytes = w.finish().unwrap();

        let decoded: OrpcThis = NdrReader::new(bytes).decode().unwrap();
        let extensions = decoded.extensions.get().unwrap();
        assert_eq!(extensions, &array);
        assert_eq!(extensions.extents().count(), 1);
        assert_eq!(
            extensions.find(&EXTENT_ERROR_INFO).unwrap().data,
            vec![0xaa; 12]
        );
    }

    #[test]
    fn test_extent_array_slot_mismatch_rejected() {
        let mut array = OrpcExtentArray::new(vec![OrpcExtent::default()]);
        array.size = 3;
        let mut w = NdrWriter::new();
        assert!(matches!(
            w.encode(&array),
            Err(NdrError::ConformanceMismatch { .. })
        ));
    }

    #[test]
    fn test_orpc_that_round_trip() {
        let that = OrpcThat::new();
        let mut w = NdrWriter::new();
        w.encode(&that).unwrap();
        let bytes = w.finish().unwrap();
        assert_eq!(bytes.len(), 8);

        let decoded: OrpcThat = NdrReader::new(bytes).decode().unwrap();
        assert!(decoded.extensions.is_null());
    }
}
