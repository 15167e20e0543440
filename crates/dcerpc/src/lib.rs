//! MSRPC operation framework
//!
//! This crate ties the NDR codec in `midl-ndr` to remote procedure calls:
//!
//! - [`Operation`]: one method, its opnum, name and request/response codecs
//! - [`Conn`] / [`Binding`]: client pipeline (bind, invoke, status mapping)
//! - [`Server`] / [`ServerHandle`]: dispatch of incoming calls
//! - [`Transport`]: boundary to whatever moves stub bytes between peers
//!
//! # Example
//!
//! ```
//! use dcerpc::{InterfaceDescriptor, SyntaxId, Uuid};
//!
//! static IEXAMPLE: InterfaceDescriptor = InterfaceDescriptor {
//!     name: "IExample",
//!     syntax: SyntaxId::new(Uuid::from_u128(0x12345678_1234_1234_1234_123456789012), 1, 0),
//!     first_opnum: 0,
//!     opnum_count: 4,
//!     base: None,
//! };
//!
//! assert!(IEXAMPLE.validate().is_ok());
//! assert!(IEXAMPLE.is_local(3));
//! assert_eq!(IEXAMPLE.path(), "/IExample/v1");
//! ```

pub mod client;
pub mod error;
pub mod operation;
pub mod security;
pub mod server;
pub mod syntax;
pub mod transport;

pub use client::{call, Binding, CallError, CallOptions, Conn, ConnBuilder, ConnConfig};
pub use error::{fault, ErrorKind, Result, RpcError};
pub use operation::{
    marshal_request, marshal_response, run_hook, unmarshal_request, unmarshal_response, Direction,
    Operation, OperationRequest, OperationResponse, PrepareHook,
};
pub use security::{AuthLevel, AuthType, Credential, Secret, SecurityConfig, StaticCredential};
pub use server::{Server, ServerConfig, ServerHandle, ServerStats, ServerStatsSnapshot};
pub use syntax::{InterfaceDescriptor, SyntaxId, Uuid, NDR_SYNTAX};
pub use transport::{CallRequest, LoopbackTransport, Transport};
