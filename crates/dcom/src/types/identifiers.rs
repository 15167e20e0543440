//! DCOM identifier types (MS-DCOM 2.2.18)
//!
//! - OXID: Object Exporter Identifier
//! - OID: Object Identifier
//! - IPID: Interface Pointer Identifier
//! - IID / CLSID: interface and class identifiers
//! - CID: causality identifier carried in every ORPCTHIS

use midl_ndr::{Guid, NdrDecode, NdrEncode, NdrLayout, NdrReader, NdrWriter};
use std::fmt;

macro_rules! u64_identifier {
    ($(#[$doc:meta])* $name:ident, $label:literal) => {
        $(#[$doc])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
        pub struct $name(pub u64);

        impl $name {
            pub const SIZE: usize = 8;

            pub const fn new(value: u64) -> Self {
                Self(value)
            }

            /// Random, nonzero identifier.
            pub fn generate() -> Self {
                let v = uuid::Uuid::new_v4().as_u128();
                Self(((v >> 64) as u64 ^ v as u64) | 1)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($label, "({:016x})"), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{:016x}", self.0)
            }
        }

        impl NdrLayout for $name {
            const NDR_ALIGN: usize = 8;
            const NDR_MIN_SIZE: usize = 8;
        }

        impl NdrEncode for $name {
            fn ndr_encode<'a>(&'a self, w: &mut NdrWriter<'a>) -> midl_ndr::Result<()> {
                w.write_u64(self.0);
                Ok(())
            }
        }

        impl NdrDecode for $name {
            fn ndr_decode(r: &mut NdrReader) -> midl_ndr::Result<Self> {
                r.read_u64().map(Self)
            }
        }
    };
}

macro_rules! guid_identifier {
    ($(#[$doc:meta])* $name:ident, $label:literal) => {
        $(#[$doc])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
        pub struct $name(pub Guid);

        impl $name {
            pub const SIZE: usize = 16;

            pub const NIL: Self = Self(Guid::NIL);

            pub const fn new(guid: Guid) -> Self {
                Self(guid)
            }

            pub const fn from_u128(value: u128) -> Self {
                Self(Guid::from_u128(value))
            }

            /// Random (version 4) identifier.
            pub fn generate() -> Self {
                Self(Guid::new_v4())
            }

            pub fn is_nil(&self) -> bool {
                self.0.is_nil()
            }

            pub fn guid(&self) -> &Guid {
                &self.0
            }
        }

        impl From<Guid> for $name {
            fn from(guid: Guid) -> Self {
                Self(guid)
            }
        }

        impl From<$name> for Guid {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($label, "({})"), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }

        impl NdrLayout for $name {
            const NDR_ALIGN: usize = Guid::NDR_ALIGN;
            const NDR_MIN_SIZE: usize = Guid::NDR_MIN_SIZE;
        }

        impl NdrEncode for $name {
            fn ndr_encode<'a>(&'a self, w: &mut NdrWriter<'a>) -> midl_ndr::Result<()> {
                self.0.ndr_encode(w)
            }
        }

        impl NdrDecode for $name {
            fn ndr_decode(r: &mut NdrReader) -> midl_ndr::Result<Self> {
                Guid::ndr_decode(r).map(Self)
            }
        }
    };
}

u64_identifier!(
    /// Object Exporter Identifier.
    ///
    /// Locates the RPC binding information of the exporter hosting an object.
    Oxid,
    "OXID"
);

u64_identifier!(
    /// Object Identifier, unique within its exporter.
    Oid,
    "OID"
);

guid_identifier!(
    /// Interface Pointer Identifier.
    ///
    /// Names one interface on one object; sent as the object uuid of every
    /// call made through that interface pointer.
    Ipid,
    "IPID"
);

guid_identifier!(
    /// Interface identifier.
    Iid,
    "IID"
);

guid_identifier!(
    /// Class identifier.
    Clsid,
    "CLSID"
);

guid_identifier!(
    /// Causality identifier shared by all calls of one logical call chain.
    Cid,
    "CID"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_oxid_wire_layout() {
        let oxid = Oxid::new(0x1234_5678_9ABC_DEF0);
        let mut w = NdrWriter::new();
        w.write_u8(1);
        w.encode(&oxid).unwrap();
        let bytes = w.finish().unwrap();
        assert_eq!(bytes.len(), 16);
        assert_eq!(&bytes[8..], &0x1234_5678_9ABC_DEF0u64.to_le_bytes());

        let mut r = NdrReader::new(bytes);
        r.read_u8().unwrap();
        assert_eq!(Oxid::ndr_decode(&mut r).unwrap(), oxid);
    }

    #[test]
    fn test_generated_identifiers_are_distinct() {
        assert_ne!(Ipid::generate(), Ipid::generate());
        assert!(!Ipid::generate().is_nil());
        assert_ne!(Oid::generate(), Oid(0));
    }

    #[test]
    fn test_ipid_display_matches_guid() {
        let ipid = Ipid::from_u128(0x00000131_0000_0000_c000_000000000046);
        assert_eq!(ipid.to_string(), ipid.guid().to_string());
        assert!(format!("{:?}", ipid).starts_with("IPID("));
        assert!(Ipid::NIL.is_nil());
        assert_eq!(Ipid::default(), Ipid::NIL);
    }
}
