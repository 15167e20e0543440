//! Core DCOM types (MS-DCOM 2.2)
//!
//! - Identifiers: OXID, OID, IPID, IID, CLSID, CID
//! - ORPC headers: ORPCTHIS, ORPCTHAT and their extensions
//! - Object references: STDOBJREF, OBJREF, MInterfacePointer
//! - IRemUnknown payloads: REMQIRESULT, REMINTERFACEREF
//! - String bindings: DUALSTRINGARRAY

mod error;
mod identifiers;
mod objref;
mod orpc;
mod stringbinding;

pub use error::{DcomError, Result};
pub use identifiers::{Cid, Clsid, Iid, Ipid, Oid, Oxid};
pub use objref::{
    objref_flags, sorf, InterfacePointer, ObjRef, RemInterfaceRef, RemQiResult, StdObjRef,
    OBJREF_SIGNATURE,
};
pub use orpc::{ComVersion, OrpcExtent, OrpcExtentArray, OrpcThat, OrpcThis, EXTENT_ERROR_INFO};
pub use stringbinding::{
    authn_svc, protocol_id, DualStringArray, SecurityBinding, StringBinding,
};

/// Well-known interface identifiers
pub mod iid {
    use super::Iid;

    pub const IUNKNOWN: Iid = Iid::from_u128(0x00000000_0000_0000_c000_000000000046);
    pub const ICLASSFACTORY: Iid = Iid::from_u128(0x00000001_0000_0000_c000_000000000046);
    pub const IREMUNKNOWN: Iid = Iid::from_u128(0x00000131_0000_0000_c000_000000000046);
    pub const IREMUNKNOWN2: Iid = Iid::from_u128(0x00000143_0000_0000_c000_000000000046);
}
