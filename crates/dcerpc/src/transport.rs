//! Transport boundary
//!
//! The core hands a transport one defragmented request stub per call and
//! expects one response stub back. PDU framing, fragmentation, security
//! verifiers and endpoint resolution live behind this trait.

use crate::security::SecurityConfig;
use crate::server::Server;
use crate::syntax::{SyntaxId, Uuid};
use crate::{Result, RpcError};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::{debug, trace, warn};

/// One outgoing call.
#[derive(Debug, Clone)]
pub struct CallRequest {
    pub call_id: u32,
    /// Presentation context negotiated by `bind`/`alter_context`.
    pub context_id: u16,
    pub opnum: u16,
    /// Object uuid (DCOM IPID), if any.
    pub object: Option<Uuid>,
    pub stub: Bytes,
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Negotiate a presentation context for `syntax`.
    async fn bind(
        &self,
        context_id: u16,
        syntax: &SyntaxId,
        security: &SecurityConfig,
    ) -> Result<()>;

    /// Add or replace a presentation context on the existing association.
    async fn alter_context(&self, context_id: u16, syntax: &SyntaxId) -> Result<()>;

    /// Send a request stub and wait for the response stub.
    async fn call(&self, request: CallRequest) -> Result<Bytes>;
}

/// In-process transport delivering calls straight to a [`Server`].
///
/// Server-side errors come back as [`RpcError::Fault`] with the status a
/// remote server would have put in its fault PDU.
#[derive(Debug)]
pub struct LoopbackTransport {
    server: Server,
    contexts: RwLock<HashMap<u16, SyntaxId>>,
}

impl LoopbackTransport {
    pub fn new(server: Server) -> Self {
        Self {
            server,
            contexts: RwLock::new(HashMap::new()),
        }
    }

    pub fn server(&self) -> &Server {
        &self.server
    }

    async fn accept(&self, context_id: u16, syntax: &SyntaxId) -> Result<()> {
        if !self.server.supports(syntax).await {
            return Err(RpcError::BindFailed(format!(
                "abstract syntax not supported: {}",
                syntax
            )));
        }
        self.contexts.write().insert(context_id, *syntax);
        Ok(())
    }
}

#[async_trait]
impl Transport for LoopbackTransport {
    async fn bind(
        &self,
        context_id: u16,
        syntax: &SyntaxId,
        security: &SecurityConfig,
    ) -> Result<()> {
        debug!(
            context_id,
            auth_type = ?security.auth_type,
            auth_level = ?security.auth_level,
            "bind {}",
            syntax
        );
        self.accept(context_id, syntax).await
    }

    async fn alter_context(&self, context_id: u16, syntax: &SyntaxId) -> Result<()> {
        debug!(context_id, "alter context {}", syntax);
        self.accept(context_id, syntax).await
    }

    async fn call(&self, request: CallRequest) -> Result<Bytes> {
        let syntax = self
            .contexts
            .read()
            .get(&request.context_id)
            .copied()
            .ok_or(RpcError::NotBound)?;
        trace!(
            call_id = request.call_id,
            opnum = request.opnum,
            len = request.stub.len(),
            "loopback call"
        );
        self.server
            .dispatch(&syntax, request.object.as_ref(), request.opnum, request.stub)
            .await
            .map_err(|e| {
                let status = e.fault_status();
                warn!(call_id = request.call_id, status, "call faulted: {}", e);
                RpcError::Fault(status)
            })
    }
}
