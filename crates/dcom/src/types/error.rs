//! DCOM error types

use dcerpc::RpcError;
use midl_ndr::NdrError;
use thiserror::Error;

/// Result type for object reference and binding decoding
pub type Result<T> = std::result::Result<T, DcomError>;

/// Errors in DCOM-specific encodings that live inside opaque byte blobs
/// (OBJREF, DUALSTRINGARRAY).
#[derive(Error, Debug)]
pub enum DcomError {
    #[error("NDR error: {0}")]
    Ndr(#[from] NdrError),

    #[error("invalid OBJREF: {0}")]
    InvalidObjRef(String),

    #[error("invalid string binding: {0}")]
    InvalidStringBinding(String),
}

impl From<DcomError> for RpcError {
    fn from(e: DcomError) -> Self {
        match e {
            DcomError::Ndr(e) => RpcError::Ndr(e),
            other => RpcError::Ndr(NdrError::InvalidString(other.to_string())),
        }
    }
}
