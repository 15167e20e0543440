//! Error types for DCE RPC

use midl_ndr::NdrError;
use thiserror::Error;

/// Well-known fault status codes reported by a server instead of a response.
pub mod fault {
    /// Opnum out of range or not implemented (nca_s_op_rng_error)
    pub const NCA_S_OP_RNG_ERROR: u32 = 0x1C01_0002;
    /// Unknown interface (nca_s_unk_if)
    pub const NCA_S_UNK_IF: u32 = 0x1C01_0003;
    /// Stub data could not be decoded (RPC_X_BAD_STUB_DATA)
    pub const NCA_S_FAULT_NDR: u32 = 0x0000_06F7;
    /// Server-side failure with no more specific code (nca_s_fault_unspec)
    pub const NCA_S_FAULT_UNSPEC: u32 = 0x1C00_0012;
    /// Call cancelled or timed out (nca_s_fault_cancel)
    pub const NCA_S_FAULT_CANCEL: u32 = 0x1C00_000D;
}

/// Coarse classification of RPC errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Buffer exhausted before a declared field could be read
    Truncated,
    /// Declared size/selector is inconsistent or over a protocol limit
    Malformed,
    /// DCOM call attempted without an object identity
    MissingIdentity,
    /// The peer returned a nonzero status word
    RemoteFailure,
    /// No handler registered for a recognised opnum
    NotImplemented,
    /// Binding, fault, timeout or I/O failure below the core
    Transport,
}

/// RPC error types
#[derive(Debug, Error)]
pub enum RpcError {
    #[error(transparent)]
    Ndr(#[from] NdrError),

    #[error("{op}: ipid is missing")]
    MissingIdentity { op: &'static str },

    #[error("{op}: remote failure 0x{code:08x}")]
    RemoteFailure { code: i32, op: &'static str },

    #[error("{op}: not implemented")]
    NotImplemented { op: &'static str },

    #[error("opnum {opnum} out of range for {interface}")]
    OperationUnavailable { interface: &'static str, opnum: u16 },

    #[error("interface not found: {0}")]
    InterfaceNotFound(String),

    #[error("invalid interface descriptor: {0}")]
    InvalidInterface(String),

    #[error("not bound to an interface")]
    NotBound,

    #[error("bind failed: {0}")]
    BindFailed(String),

    #[error("fault: status 0x{0:08x}")]
    Fault(u32),

    #[error("timeout")]
    Timeout,

    #[error("stub data too large: {size} bytes exceeds maximum {max}")]
    StubTooLarge { size: usize, max: usize },

    #[error("connection closed")]
    ConnectionClosed,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RpcError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RpcError::Ndr(e) => match e.kind() {
                midl_ndr::ErrorKind::Truncated => ErrorKind::Truncated,
                midl_ndr::ErrorKind::Malformed => ErrorKind::Malformed,
            },
            RpcError::MissingIdentity { .. } => ErrorKind::MissingIdentity,
            RpcError::RemoteFailure { .. } => ErrorKind::RemoteFailure,
            RpcError::NotImplemented { .. } => ErrorKind::NotImplemented,
            _ => ErrorKind::Transport,
        }
    }

    /// Status word of a `RemoteFailure`.
    pub fn remote_code(&self) -> Option<i32> {
        match self {
            RpcError::RemoteFailure { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Fault status a server reports to the caller for this error.
    pub fn fault_status(&self) -> u32 {
        match self {
            RpcError::Fault(status) => *status,
            RpcError::NotImplemented { .. } | RpcError::OperationUnavailable { .. } => {
                fault::NCA_S_OP_RNG_ERROR
            }
            RpcError::InterfaceNotFound(_) => fault::NCA_S_UNK_IF,
            RpcError::Ndr(_) => fault::NCA_S_FAULT_NDR,
            RpcError::Timeout => fault::NCA_S_FAULT_CANCEL,
            _ => fault::NCA_S_FAULT_UNSPEC,
        }
    }
}

pub type Result<T> = std::result::Result<T, RpcError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        let truncated = RpcError::from(NdrError::Truncated { needed: 4, have: 0 });
        assert_eq!(truncated.kind(), ErrorKind::Truncated);
        let malformed = RpcError::from(NdrError::CountExceedsBuffer {
            count: 10,
            remaining: 0,
        });
        assert_eq!(malformed.kind(), ErrorKind::Malformed);
        assert_eq!(
            RpcError::MissingIdentity { op: "x" }.kind(),
            ErrorKind::MissingIdentity
        );
        assert_eq!(RpcError::Timeout.kind(), ErrorKind::Transport);
    }

    #[test]
    fn test_remote_failure_display() {
        let err = RpcError::RemoteFailure {
            code: 0x80070057u32 as i32,
            op: "/IEcho/v0/EchoGuid",
        };
        assert_eq!(err.to_string(), "/IEcho/v0/EchoGuid: remote failure 0x80070057");
        assert_eq!(err.remote_code(), Some(0x80070057u32 as i32));
    }

    #[test]
    fn test_fault_status_mapping() {
        assert_eq!(
            RpcError::NotImplemented { op: "x" }.fault_status(),
            fault::NCA_S_OP_RNG_ERROR
        );
        assert_eq!(
            RpcError::from(NdrError::InvalidPointer(1)).fault_status(),
            fault::NCA_S_FAULT_NDR
        );
        assert_eq!(RpcError::Fault(5).fault_status(), 5);
    }
}
