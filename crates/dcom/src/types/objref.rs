//! Object references (MS-DCOM 2.2.18)
//!
//! A marshaled interface pointer travels as an MInterfacePointer: a counted
//! byte blob holding an OBJREF. The standard OBJREF wraps a STDOBJREF, which
//! is also sent on its own in IRemUnknown results.

use super::error::{DcomError, Result};
use super::identifiers::{Iid, Ipid, Oid, Oxid};
use super::stringbinding::DualStringArray;
use midl_ndr::{Guid, NdrDecode, NdrEncode, NdrError, NdrLayout, NdrReader, NdrWriter};

/// OBJREF signature, "MEOW" in little-endian
pub const OBJREF_SIGNATURE: u32 = 0x574F_454D;

/// OBJREF flags selecting the variant
pub mod objref_flags {
    pub const OBJREF_STANDARD: u32 = 0x1;
    pub const OBJREF_HANDLER: u32 = 0x2;
    pub const OBJREF_CUSTOM: u32 = 0x4;
    pub const OBJREF_EXTENDED: u32 = 0x8;
}

/// STDOBJREF flags (SORF_*)
pub mod sorf {
    pub const SORF_NULL: u32 = 0x0000;
    /// The object does not need to be pinged
    pub const SORF_NOPING: u32 = 0x1000;
}

/// Standard Object Reference (MS-DCOM 2.2.18.2), 40 bytes
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct StdObjRef {
    /// SORF_* flags
    pub flags: u32,
    pub public_refs: u32,
    pub oxid: Oxid,
    pub oid: Oid,
    pub ipid: Ipid,
}

impl StdObjRef {
    pub const SIZE: usize = 40;

    pub fn new(oxid: Oxid, oid: Oid, ipid: Ipid, public_refs: u32) -> Self {
        Self {
            flags: sorf::SORF_NULL,
            public_refs,
            oxid,
            oid,
            ipid,
        }
    }

    pub fn new_noping(oxid: Oxid, oid: Oid, ipid: Ipid, public_refs: u32) -> Self {
        Self {
            flags: sorf::SORF_NOPING,
            ..Self::new(oxid, oid, ipid, public_refs)
        }
    }

    pub fn requires_pinging(&self) -> bool {
        self.flags & sorf::SORF_NOPING == 0
    }
}

impl NdrLayout for StdObjRef {
    const NDR_ALIGN: usize = 8;
    const NDR_MIN_SIZE: usize = Self::SIZE;
}

impl NdrEncode for StdObjRef {
    fn ndr_encode<'a>(&'a self, w: &mut NdrWriter<'a>) -> midl_ndr::Result<()> {
        w.align(Self::NDR_ALIGN);
        w.write_u32(self.flags);
        w.write_u32(self.public_refs);
        self.oxid.ndr_encode(w)?;
        self.oid.ndr_encode(w)?;
        self.ipid.ndr_encode(w)
    }
}

impl NdrDecode for StdObjRef {
    fn ndr_decode(r: &mut NdrReader) -> midl_ndr::Result<Self> {
        r.align(Self::NDR_ALIGN)?;
        Ok(Self {
            flags: r.read_u32()?,
            public_refs: r.read_u32()?,
            oxid: Oxid::ndr_decode(r)?,
            oid: Oid::ndr_decode(r)?,
            ipid: Ipid::ndr_decode(r)?,
        })
    }
}

/// OBJREF (MS-DCOM 2.2.18.1)
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ObjRef {
    /// OBJREF_STANDARD
    Standard {
        iid: Iid,
        std: StdObjRef,
        resolver_addr: DualStringArray,
    },
    /// OBJREF_HANDLER
    Handler {
        iid: Iid,
        std: StdObjRef,
        handler_clsid: Guid,
        resolver_addr: DualStringArray,
    },
    /// OBJREF_CUSTOM, payload left to the unmarshaler named by `clsid`
    Custom { iid: Iid, clsid: Guid, data: Vec<u8> },
}

impl ObjRef {
    pub fn standard(iid: Iid, std: StdObjRef, resolver_addr: DualStringArray) -> Self {
        Self::Standard {
            iid,
            std,
            resolver_addr,
        }
    }

    pub fn flags(&self) -> u32 {
        match self {
            Self::Standard { .. } => objref_flags::OBJREF_STANDARD,
            Self::Handler { .. } => objref_flags::OBJREF_HANDLER,
            Self::Custom { .. } => objref_flags::OBJREF_CUSTOM,
        }
    }

    pub fn iid(&self) -> &Iid {
        match self {
            Self::Standard { iid, .. } | Self::Handler { iid, .. } | Self::Custom { iid, .. } => {
                iid
            }
        }
    }

    pub fn std_obj_ref(&self) -> Option<&StdObjRef> {
        match self {
            Self::Standard { std, .. } | Self::Handler { std, .. } => Some(std),
            Self::Custom { .. } => None,
        }
    }

    pub fn write<'a>(&'a self, w: &mut NdrWriter<'a>) -> Result<()> {
        w.write_u32(OBJREF_SIGNATURE);
        w.write_u32(self.flags());
        self.iid().0.ndr_encode(w)?;
        match self {
            Self::Standard {
                std, resolver_addr, ..
            } => {
                std.ndr_encode(w)?;
                resolver_addr.write_raw(w)
            }
            Self::Handler {
                std,
                handler_clsid,
                resolver_addr,
                ..
            } => {
                std.ndr_encode(w)?;
                handler_clsid.ndr_encode(w)?;
                resolver_addr.write_raw(w)
            }
            Self::Custom { clsid, data, .. } => {
                clsid.ndr_encode(w)?;
                // cbExtension, reserved
                w.write_u32(0);
                w.write_u32(0);
                w.write_bytes(data);
                Ok(())
            }
        }
    }

    pub fn read(r: &mut NdrReader) -> Result<Self> {
        let signature = r.read_u32()?;
        if signature != OBJREF_SIGNATURE {
            return Err(DcomError::InvalidObjRef(format!(
                "invalid signature 0x{:08x}",
                signature
            )));
        }
        let flags = r.read_u32()?;
        let iid = Iid::ndr_decode(r)?;
        match flags {
            objref_flags::OBJREF_STANDARD => Ok(Self::Standard {
                iid,
                std: StdObjRef::ndr_decode(r)?,
                resolver_addr: DualStringArray::read_raw(r)?,
            }),
            objref_flags::OBJREF_HANDLER => Ok(Self::Handler {
                iid,
                std: StdObjRef::ndr_decode(r)?,
                handler_clsid: Guid::ndr_decode(r)?,
                resolver_addr: DualStringArray::read_raw(r)?,
            }),
            objref_flags::OBJREF_CUSTOM => {
                let clsid = Guid::ndr_decode(r)?;
                let _extension_len = r.read_u32()?;
                let _reserved = r.read_u32()?;
                let data = r.read_bytes(r.remaining())?.to_vec();
                Ok(Self::Custom { iid, clsid, data })
            }
            other => Err(DcomError::InvalidObjRef(format!(
                "unsupported flags 0x{:08x}",
                other
            ))),
        }
    }
}

/// MInterfacePointer (MS-DCOM 2.2.14): `ulCntData` followed by that many
/// bytes of marshaled OBJREF.
///
/// The count is taken from `data` when encoding.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct InterfacePointer {
    pub data: Vec<u8>,
}

impl InterfacePointer {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    pub fn from_objref(objref: &ObjRef) -> Result<Self> {
        let mut w = NdrWriter::new();
        objref.write(&mut w)?;
        Ok(Self {
            data: w.finish()?.to_vec(),
        })
    }

    pub fn objref(&self) -> Result<ObjRef> {
        let mut r = NdrReader::new(self.data.clone().into());
        ObjRef::read(&mut r)
    }
}

impl NdrLayout for InterfacePointer {
    const NDR_ALIGN: usize = 4;
    const NDR_MIN_SIZE: usize = 8;
}

impl NdrEncode for InterfacePointer {
    fn ndr_encode<'a>(&'a self, w: &mut NdrWriter<'a>) -> midl_ndr::Result<()> {
        w.write_conformance(self.data.len())?;
        w.write_u32(self.data.len() as u32);
        w.write_bytes(&self.data);
        Ok(())
    }
}

impl NdrDecode for InterfacePointer {
    fn ndr_decode(r: &mut NdrReader) -> midl_ndr::Result<Self> {
        let max_count = r.read_conformance()?;
        let cnt = r.read_u32()?;
        if cnt != max_count {
            return Err(NdrError::ConformanceMismatch {
                max_count,
                actual_count: cnt,
            });
        }
        let len = r.check_count(u64::from(cnt), 1)?;
        Ok(Self {
            data: r.read_bytes(len)?.to_vec(),
        })
    }
}

/// REMQIRESULT (MS-DCOM 2.2.22.1)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct RemQiResult {
    pub hresult: i32,
    pub std: StdObjRef,
}

impl NdrLayout for RemQiResult {
    const NDR_ALIGN: usize = 8;
    const NDR_MIN_SIZE: usize = 48;
}

impl NdrEncode for RemQiResult {
    fn ndr_encode<'a>(&'a self, w: &mut NdrWriter<'a>) -> midl_ndr::Result<()> {
        w.align(Self::NDR_ALIGN);
        w.write_i32(self.hresult);
        self.std.ndr_encode(w)
    }
}

impl NdrDecode for RemQiResult {
    fn ndr_decode(r: &mut NdrReader) -> midl_ndr::Result<Self> {
        r.align(Self::NDR_ALIGN)?;
        Ok(Self {
            hresult: r.read_i32()?,
            std: StdObjRef::ndr_decode(r)?,
        })
    }
}

/// REMINTERFACEREF (MS-DCOM 2.2.22.2)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct RemInterfaceRef {
    pub ipid: Ipid,
    pub public_refs: u32,
    pub private_refs: u32,
}

impl RemInterfaceRef {
    pub fn new(ipid: Ipid, public_refs: u32) -> Self {
        Self {
            ipid,
            public_refs,
            private_refs: 0,
        }
    }
}

impl NdrLayout for RemInterfaceRef {
    const NDR_ALIGN: usize = 4;
    const NDR_MIN_SIZE: usize = 24;
}

impl NdrEncode for RemInterfaceRef {
    fn ndr_encode<'a>(&'a self, w: &mut NdrWriter<'a>) -> midl_ndr::Result<()> {
        self.ipid.ndr_encode(w)?;
        w.write_u32(self.public_refs);
        w.write_u32(self.private_refs);
        Ok(())
    }
}

impl NdrDecode for RemInterfaceRef {
    fn ndr_decode(r: &mut NdrReader) -> midl_ndr::Result<Self> {
        Ok(Self {
            ipid: Ipid::ndr_decode(r)?,
            public_refs: r.read_u32()?,
            private_refs: r.read_u32()?,
        })
    }
}
