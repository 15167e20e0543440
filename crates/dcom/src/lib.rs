//! DCOM object identity and interface inheritance over DCE RPC
//!
//! Every DCOM method is an ORPC call: the request starts with an
//! [`OrpcThis`], the response with an [`OrpcThat`], and the call is
//! addressed to an interface pointer through the object UUID carried in the
//! request PDU (its [`Ipid`]).
//!
//! ```text
//! IUnknown        opnums 0-2   (iunknown)
//!   └ IRemUnknown opnums 3-5   (remunknown)
//!       └ ...     derived interfaces continue the opnum range
//! ```
//!
//! A derived client embeds its base client and hands it its own binding, so
//! inherited methods travel on the derived presentation context. A derived
//! server trait extends its base trait and its dispatch function forwards
//! opnums below its range to the base dispatcher.
//!
//! # Modules
//!
//! - [`types`]: identifiers, ORPC headers, OBJREF and string bindings
//! - [`iunknown`]: IUnknown protocol, client and server
//! - [`remunknown`]: IRemUnknown protocol, client and server
//! - [`hresult`]: well-known status codes
//! - [`options`]: client and server construction options

pub mod hresult;
pub mod iunknown;
pub mod options;
pub mod remunknown;
pub mod types;

pub use iunknown::{UnknownClient, UnknownServer};
pub use options::{ClientOptions, ServerOptions};
pub use remunknown::{RemUnknownClient, RemUnknownServer};
pub use types::{
    Cid, Clsid, ComVersion, DcomError, DualStringArray, Iid, InterfacePointer, Ipid, ObjRef,
    Oid, OrpcThat, OrpcThis, Oxid, StdObjRef, StringBinding,
};

/// Result of a typed DCOM call; on failure the error may still carry the
/// decoded response.
pub type CallResult<T> = std::result::Result<T, dcerpc::CallError<T>>;

/// COM version sent in every ORPCTHIS
pub const DCOM_VERSION: ComVersion = ComVersion::DCOM_5_7;
