//! Server dispatch
//!
//! A [`Server`] routes an incoming call to the [`ServerHandle`] registered
//! for its interface (or for the object it targets). The handle decodes the
//! request, runs user code and hands the operation back for response
//! marshaling. Derived interfaces forward opnums below their first local
//! opnum to the base interface's handle.

use crate::operation::{marshal_response, Operation};
use crate::syntax::{InterfaceDescriptor, SyntaxId, Uuid};
use crate::{Result, RpcError};
use async_trait::async_trait;
use bytes::Bytes;
use midl_ndr::{NdrContext, NdrReader};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, trace, warn};

/// Per-interface request handler.
///
/// Returns the completed operation to marshal as the response, or `None`
/// for opnums that produce no response data.
#[async_trait]
pub trait ServerHandle: Send + Sync {
    async fn handle(&self, opnum: u16, r: &mut NdrReader) -> Result<Option<Box<dyn Operation>>>;
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Largest request stub accepted.
    pub max_stub_size: usize,
    /// Codec settings for request decoding and response encoding.
    pub ndr: NdrContext,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_stub_size: 4 * 1024 * 1024,
            ndr: NdrContext::default(),
        }
    }
}

/// Server statistics
#[derive(Debug, Default)]
pub struct ServerStats {
    pub requests_received: AtomicU64,
    pub requests_processed: AtomicU64,
    pub requests_failed: AtomicU64,
    pub requests_empty: AtomicU64,
    pub bytes_received: AtomicU64,
    pub bytes_sent: AtomicU64,
}

impl ServerStats {
    pub fn snapshot(&self) -> ServerStatsSnapshot {
        ServerStatsSnapshot {
            requests_received: self.requests_received.load(Ordering::Relaxed),
            requests_processed: self.requests_processed.load(Ordering::Relaxed),
            requests_failed: self.requests_failed.load(Ordering::Relaxed),
            requests_empty: self.requests_empty.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of server statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerStatsSnapshot {
    pub requests_received: u64,
    pub requests_processed: u64,
    pub requests_failed: u64,
    /// Calls answered with no response data
    pub requests_empty: u64,
    pub bytes_received: u64,
    pub bytes_sent: u64,
}

#[derive(Clone)]
struct Registration {
    descriptor: &'static InterfaceDescriptor,
    handle: Arc<dyn ServerHandle>,
}

/// RPC server: interface and object registry plus dispatch.
///
/// Cloning yields another handle to the same registry. Handlers run
/// concurrently; the registry lock is released before a handler runs.
#[derive(Clone)]
pub struct Server {
    interfaces: Arc<RwLock<HashMap<Uuid, Registration>>>,
    objects: Arc<RwLock<HashMap<Uuid, Registration>>>,
    config: Arc<ServerConfig>,
    stats: Arc<ServerStats>,
}

impl Server {
    pub fn new() -> Self {
        Self::with_config(ServerConfig::default())
    }

    pub fn with_config(config: ServerConfig) -> Self {
        Self {
            interfaces: Arc::new(RwLock::new(HashMap::new())),
            objects: Arc::new(RwLock::new(HashMap::new())),
            config: Arc::new(config),
            stats: Arc::new(ServerStats::default()),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn stats(&self) -> &Arc<ServerStats> {
        &self.stats
    }

    /// Register a handle for every call on `descriptor`'s abstract syntax.
    pub async fn register(
        &self,
        descriptor: &'static InterfaceDescriptor,
        handle: Arc<dyn ServerHandle>,
    ) -> Result<()> {
        descriptor.validate()?;
        debug!("Registering interface: {}", descriptor);
        self.interfaces
            .write()
            .await
            .insert(descriptor.syntax.uuid, Registration { descriptor, handle });
        Ok(())
    }

    /// Register a handle for calls addressed to one object (DCOM IPID).
    pub async fn register_object(
        &self,
        object: Uuid,
        descriptor: &'static InterfaceDescriptor,
        handle: Arc<dyn ServerHandle>,
    ) -> Result<()> {
        descriptor.validate()?;
        debug!("Registering object {} as {}", object, descriptor);
        self.objects
            .write()
            .await
            .insert(object, Registration { descriptor, handle });
        Ok(())
    }

    pub async fn unregister_object(&self, object: &Uuid) -> bool {
        self.objects.write().await.remove(object).is_some()
    }

    /// True if some registration accepts `syntax` for binding.
    pub async fn supports(&self, syntax: &SyntaxId) -> bool {
        let accepts = |reg: &Registration| reg.descriptor.derives_from(syntax);
        self.interfaces.read().await.values().any(accepts)
            || self.objects.read().await.values().any(accepts)
    }

    async fn resolve(&self, syntax: &SyntaxId, object: Option<&Uuid>) -> Result<Registration> {
        if let Some(object) = object {
            if let Some(reg) = self.objects.read().await.get(object) {
                if !reg.descriptor.derives_from(syntax) {
                    return Err(RpcError::InterfaceNotFound(format!(
                        "{} on object {}",
                        syntax, object
                    )));
                }
                return Ok(reg.clone());
            }
        }
        match self.interfaces.read().await.get(&syntax.uuid) {
            Some(reg) if reg.descriptor.derives_from(syntax) => Ok(reg.clone()),
            _ => Err(RpcError::InterfaceNotFound(syntax.to_string())),
        }
    }

    /// Dispatch one call and return the response stub.
    ///
    /// An empty stub is returned for opnums the handle answers with no
    /// operation (reserved or beyond the declared range).
    pub async fn dispatch(
        &self,
        syntax: &SyntaxId,
        object: Option<&Uuid>,
        opnum: u16,
        stub: Bytes,
    ) -> Result<Bytes> {
        self.stats.requests_received.fetch_add(1, Ordering::Relaxed);
        self.stats
            .bytes_received
            .fetch_add(stub.len() as u64, Ordering::Relaxed);

        let result = self.dispatch_inner(syntax, object, opnum, stub).await;
        match &result {
            Ok(response) => {
                self.stats.requests_processed.fetch_add(1, Ordering::Relaxed);
                self.stats
                    .bytes_sent
                    .fetch_add(response.len() as u64, Ordering::Relaxed);
            }
            Err(e) => {
                self.stats.requests_failed.fetch_add(1, Ordering::Relaxed);
                warn!(opnum, error = %e, "call rejected");
            }
        }
        result
    }

    async fn dispatch_inner(
        &self,
        syntax: &SyntaxId,
        object: Option<&Uuid>,
        opnum: u16,
        stub: Bytes,
    ) -> Result<Bytes> {
        if stub.len() > self.config.max_stub_size {
            return Err(RpcError::StubTooLarge {
                size: stub.len(),
                max: self.config.max_stub_size,
            });
        }

        let reg = self.resolve(syntax, object).await?;
        debug!(
            interface = reg.descriptor.name,
            opnum,
            owner = reg.descriptor.owner_of(opnum).map(|i| i.name),
            "dispatching call"
        );

        let mut r = NdrReader::with_context(stub, self.config.ndr);
        let Some(mut op) = reg.handle.handle(opnum, &mut r).await? else {
            self.stats.requests_empty.fetch_add(1, Ordering::Relaxed);
            debug!(interface = reg.descriptor.name, opnum, "no response data");
            return Ok(Bytes::new());
        };

        let response = marshal_response(op.as_mut(), self.config.ndr)?;
        trace!(
            op = op.op_name(),
            status = op.status(),
            len = response.len(),
            "call completed"
        );
        Ok(response)
    }
}

impl Default for Server {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("config", &self.config)
            .field("stats", &self.stats.snapshot())
            .finish()
    }
}
