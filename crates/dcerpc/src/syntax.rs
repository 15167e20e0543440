//! Abstract syntaxes and static interface descriptors

use crate::{Result, RpcError};
use midl_ndr::{NdrDecode, NdrEncode, NdrLayout, NdrReader, NdrWriter};
use std::fmt;

pub use midl_ndr::Guid as Uuid;

/// Syntax ID - interface UUID with version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SyntaxId {
    pub uuid: Uuid,
    pub version: u32, // major in lower 16 bits, minor in upper 16 bits
}

impl SyntaxId {
    pub const fn new(uuid: Uuid, major: u16, minor: u16) -> Self {
        Self {
            uuid,
            version: (major as u32) | ((minor as u32) << 16),
        }
    }

    pub const fn major_version(&self) -> u16 {
        self.version as u16
    }

    pub const fn minor_version(&self) -> u16 {
        (self.version >> 16) as u16
    }
}

impl fmt::Display for SyntaxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} v{}.{}",
            self.uuid,
            self.major_version(),
            self.minor_version()
        )
    }
}

impl NdrLayout for SyntaxId {
    const NDR_ALIGN: usize = 4;
    const NDR_MIN_SIZE: usize = 20;
}

impl NdrEncode for SyntaxId {
    fn ndr_encode<'a>(&'a self, w: &mut NdrWriter<'a>) -> midl_ndr::Result<()> {
        self.uuid.ndr_encode(w)?;
        w.write_u32(self.version);
        Ok(())
    }
}

impl NdrDecode for SyntaxId {
    fn ndr_decode(r: &mut NdrReader) -> midl_ndr::Result<Self> {
        let uuid = Uuid::ndr_decode(r)?;
        let version = r.read_u32()?;
        Ok(Self { uuid, version })
    }
}

/// NDR20 transfer syntax
pub const NDR_SYNTAX: SyntaxId = SyntaxId::new(
    Uuid::from_u128(0x8a885d04_1ceb_11c9_9fe8_08002b104860),
    2,
    0,
);

/// Base chains longer than this are treated as cyclic.
const MAX_INTERFACE_DEPTH: usize = 64;

/// Static description of one RPC or COM interface.
///
/// Derived interfaces name their base; the base owns every opnum below
/// `first_opnum`.
#[derive(Debug)]
pub struct InterfaceDescriptor {
    pub name: &'static str,
    pub syntax: SyntaxId,
    /// First opnum handled by this interface itself.
    pub first_opnum: u16,
    /// Number of opnums declared locally.
    pub opnum_count: u16,
    pub base: Option<&'static InterfaceDescriptor>,
}

impl InterfaceDescriptor {
    /// One past the last declared opnum.
    pub const fn end_opnum(&self) -> u16 {
        self.first_opnum.saturating_add(self.opnum_count)
    }

    pub const fn is_local(&self, opnum: u16) -> bool {
        opnum >= self.first_opnum && opnum < self.end_opnum()
    }

    /// Interface in the base chain declaring `opnum`, if any.
    pub fn owner_of(&'static self, opnum: u16) -> Option<&'static InterfaceDescriptor> {
        self.chain()
            .take(MAX_INTERFACE_DEPTH)
            .find(|iface| iface.is_local(opnum))
    }

    /// This interface followed by its bases, most derived first.
    pub fn chain(&'static self) -> impl Iterator<Item = &'static InterfaceDescriptor> {
        std::iter::successors(Some(self), |iface| iface.base)
    }

    /// True if `syntax` names this interface or one of its bases.
    pub fn derives_from(&'static self, syntax: &SyntaxId) -> bool {
        self.chain()
            .take(MAX_INTERFACE_DEPTH)
            .any(|iface| iface.syntax == *syntax)
    }

    /// Check that every base range is disjoint from and lower than the
    /// range of the interface deriving from it.
    pub fn validate(&'static self) -> Result<()> {
        let mut derived = self;
        for _ in 0..MAX_INTERFACE_DEPTH {
            let Some(base) = derived.base else {
                return Ok(());
            };
            if base.end_opnum() > derived.first_opnum {
                return Err(RpcError::InvalidInterface(format!(
                    "{}: base {} declares opnums up to {} but local range starts at {}",
                    derived.name,
                    base.name,
                    base.end_opnum(),
                    derived.first_opnum
                )));
            }
            derived = base;
        }
        Err(RpcError::InvalidInterface(format!(
            "{}: base chain is cyclic or deeper than {}",
            self.name, MAX_INTERFACE_DEPTH
        )))
    }

    /// Prefix of operation names, e.g. `/IRemUnknown/v0`.
    pub fn path(&self) -> String {
        format!("/{}/v{}", self.name, self.syntax.major_version())
    }
}

impl fmt::Display for InterfaceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.syntax)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static ROOT: InterfaceDescriptor = InterfaceDescriptor {
        name: "IRoot",
        syntax: SyntaxId::new(Uuid::from_u128(1), 0, 0),
        first_opnum: 0,
        opnum_count: 3,
        base: None,
    };

    static CHILD: InterfaceDescriptor = InterfaceDescriptor {
        name: "IChild",
        syntax: SyntaxId::new(Uuid::from_u128(2), 1, 2),
        first_opnum: 3,
        opnum_count: 2,
        base: Some(&ROOT),
    };

    static OVERLAP: InterfaceDescriptor = InterfaceDescriptor {
        name: "IOverlap",
        syntax: SyntaxId::new(Uuid::from_u128(3), 0, 0),
        first_opnum: 2,
        opnum_count: 1,
        base: Some(&ROOT),
    };

    #[test]
    fn test_syntax_version_packing() {
        let syntax = SyntaxId::new(Uuid::NIL, 3, 1);
        assert_eq!(syntax.version, 0x0001_0003);
        assert_eq!(syntax.major_version(), 3);
        assert_eq!(syntax.minor_version(), 1);
        assert_eq!(NDR_SYNTAX.major_version(), 2);
        assert_eq!(
            NDR_SYNTAX.uuid.to_string(),
            "8a885d04-1ceb-11c9-9fe8-08002b104860"
        );
    }

    #[test]
    fn test_syntax_wire_form() {
        let mut w = NdrWriter::new();
        w.encode(&NDR_SYNTAX).unwrap();
        let bytes = w.finish().unwrap();
        assert_eq!(bytes.len(), 20);
        assert_eq!(&bytes[16..], &[2, 0, 0, 0]);
        let decoded: SyntaxId = NdrReader::new(bytes).decode().unwrap();
        assert_eq!(decoded, NDR_SYNTAX);
    }

    #[test]
    fn test_owner_walks_base_chain() {
        assert!(CHILD.is_local(3));
        assert!(!CHILD.is_local(1));
        assert_eq!(CHILD.owner_of(1).map(|i| i.name), Some("IRoot"));
        assert_eq!(CHILD.owner_of(4).map(|i| i.name), Some("IChild"));
        assert!(CHILD.owner_of(5).is_none());
        assert!(CHILD.derives_from(&ROOT.syntax));
        assert!(!ROOT.derives_from(&CHILD.syntax));
        assert_eq!(CHILD.path(), "/IChild/v1");
    }

    #[test]
    fn test_validate_rejects_overlapping_ranges() {
        assert!(CHILD.validate().is_ok());
        assert!(matches!(
            OVERLAP.validate(),
            Err(RpcError::InvalidInterface(_))
        ));
    }
}
