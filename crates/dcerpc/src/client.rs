//! Client invocation pipeline
//!
//! [`Conn`] wraps a transport and owns the presentation-context table of
//! one association. Binding an interface yields a [`Binding`] which can be
//! cloned freely and shared by every client layered on the same syntax.
//! [`Binding::invoke`] runs one operation: prepare, marshal, send, wait,
//! unmarshal, then translate a nonzero status word into
//! [`RpcError::RemoteFailure`].

use crate::operation::{
    marshal_request, unmarshal_response, Operation, OperationRequest, OperationResponse,
};
use crate::security::SecurityConfig;
use crate::syntax::{InterfaceDescriptor, SyntaxId, Uuid};
use crate::transport::{CallRequest, Transport};
use crate::{Result, RpcError};
use midl_ndr::NdrContext;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU16, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

/// Connection configuration
#[derive(Debug, Clone)]
pub struct ConnConfig {
    /// Per-call timeout; `None` waits for the transport.
    pub timeout: Option<Duration>,
    pub ndr: NdrContext,
    /// Largest request stub the client will send.
    pub max_stub_size: usize,
    pub security: SecurityConfig,
}

impl Default for ConnConfig {
    fn default() -> Self {
        Self {
            timeout: None,
            ndr: NdrContext::default(),
            max_stub_size: 4 * 1024 * 1024,
            security: SecurityConfig::default(),
        }
    }
}

/// Builder for connections
pub struct ConnBuilder {
    transport: Arc<dyn Transport>,
    config: ConnConfig,
}

impl ConnBuilder {
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = Some(timeout);
        self
    }

    pub fn ndr_context(mut self, ndr: NdrContext) -> Self {
        self.config.ndr = ndr;
        self
    }

    pub fn max_stub_size(mut self, size: usize) -> Self {
        self.config.max_stub_size = size;
        self
    }

    pub fn security(mut self, security: SecurityConfig) -> Self {
        self.config.security = security;
        self
    }

    pub fn build(self) -> Conn {
        Conn::with_config(self.transport, self.config)
    }
}

struct ConnInner {
    transport: Arc<dyn Transport>,
    config: ConnConfig,
    contexts: Mutex<HashMap<SyntaxId, u16>>,
    next_context_id: AtomicU16,
    next_call_id: AtomicU32,
}

/// Connection to one RPC server.
///
/// Cheap to clone; clones share the association, its contexts and the
/// call-id counter. Independent calls may run concurrently.
#[derive(Clone)]
pub struct Conn {
    inner: Arc<ConnInner>,
}

impl Conn {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self::with_config(transport, ConnConfig::default())
    }

    pub fn with_config(transport: Arc<dyn Transport>, config: ConnConfig) -> Self {
        Self {
            inner: Arc::new(ConnInner {
                transport,
                config,
                contexts: Mutex::new(HashMap::new()),
                next_context_id: AtomicU16::new(0),
                next_call_id: AtomicU32::new(1),
            }),
        }
    }

    pub fn builder(transport: Arc<dyn Transport>) -> ConnBuilder {
        ConnBuilder {
            transport,
            config: ConnConfig::default(),
        }
    }

    pub fn config(&self) -> &ConnConfig {
        &self.inner.config
    }

    /// Context id already negotiated for `syntax`.
    pub fn context_for(&self, syntax: &SyntaxId) -> Option<u16> {
        self.inner.contexts.lock().get(syntax).copied()
    }

    /// Bind `interface`, reusing the presentation context if its syntax
    /// was negotiated before on this connection.
    pub async fn bind(&self, interface: &'static InterfaceDescriptor) -> Result<Binding> {
        let syntax = interface.syntax;
        if let Some(context_id) = self.context_for(&syntax) {
            debug!(context_id, "reusing context for {}", interface);
            return Ok(Binding::new(self.clone(), context_id, interface));
        }

        let context_id = self.inner.next_context_id.fetch_add(1, Ordering::SeqCst);
        debug!(context_id, "binding {}", interface);
        self.inner
            .transport
            .bind(context_id, &syntax, &self.inner.config.security)
            .await?;
        // A concurrent bind of the same syntax may have finished first.
        let context_id = *self.inner.contexts.lock().entry(syntax).or_insert(context_id);
        Ok(Binding::new(self.clone(), context_id, interface))
    }

    fn next_call_id(&self) -> u32 {
        self.inner.next_call_id.fetch_add(1, Ordering::Relaxed)
    }
}

impl fmt::Debug for Conn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Conn")
            .field("config", &self.inner.config)
            .field("contexts", &self.inner.contexts.lock().len())
            .finish()
    }
}

/// Per-call options.
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    /// Object the call is addressed to (DCOM IPID).
    pub object: Option<Uuid>,
    /// Overrides the connection timeout for this call.
    pub timeout: Option<Duration>,
}

impl CallOptions {
    pub fn object(object: Uuid) -> Self {
        Self {
            object: Some(object),
            ..Default::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// An interface bound on a connection.
#[derive(Clone)]
pub struct Binding {
    conn: Conn,
    context_id: u16,
    interface: &'static InterfaceDescriptor,
}

impl Binding {
    fn new(conn: Conn, context_id: u16, interface: &'static InterfaceDescriptor) -> Self {
        Self {
            conn,
            context_id,
            interface,
        }
    }

    pub fn conn(&self) -> &Conn {
        &self.conn
    }

    pub fn context_id(&self) -> u16 {
        self.context_id
    }

    pub fn interface(&self) -> &'static InterfaceDescriptor {
        self.interface
    }

    pub fn syntax(&self) -> &SyntaxId {
        &self.interface.syntax
    }

    /// Move this binding to `interface` without a new bind.
    ///
    /// Other bindings on the connection keep their contexts. A context
    /// already negotiated for `interface` is reused; otherwise a fresh one
    /// is added with an alter-context exchange.
    pub async fn alter_context(&mut self, interface: &'static InterfaceDescriptor) -> Result<()> {
        let inner = &self.conn.inner;
        if let Some(context_id) = self.conn.context_for(&interface.syntax) {
            debug!(context_id, "reusing context for {}", interface);
            self.context_id = context_id;
            self.interface = interface;
            return Ok(());
        }

        let context_id = inner.next_context_id.fetch_add(1, Ordering::SeqCst);
        debug!(
            from = self.context_id,
            context_id, "altering context {} -> {}", self.interface, interface
        );
        inner
            .transport
            .alter_context(context_id, &interface.syntax)
            .await?;
        self.context_id = *inner
            .contexts
            .lock()
            .entry(interface.syntax)
            .or_insert(context_id);
        self.interface = interface;
        Ok(())
    }

    /// Invoke `op` and wait for its response.
    ///
    /// On a nonzero status word the decoded out-parameters stay in `op` and
    /// [`RpcError::RemoteFailure`] is returned.
    pub async fn invoke(&self, op: &mut dyn Operation, options: &CallOptions) -> Result<()> {
        let config = &self.conn.inner.config;
        let stub = marshal_request(op, config.ndr)?;
        if stub.len() > config.max_stub_size {
            return Err(RpcError::StubTooLarge {
                size: stub.len(),
                max: config.max_stub_size,
            });
        }

        let request = CallRequest {
            call_id: self.conn.next_call_id(),
            context_id: self.context_id,
            opnum: op.opnum(),
            object: options.object,
            stub,
        };
        debug!(
            call_id = request.call_id,
            context_id = request.context_id,
            opnum = request.opnum,
            "invoking {}",
            op.op_name()
        );

        let call = self.conn.inner.transport.call(request);
        let response = match options.timeout.or(config.timeout) {
            Some(timeout) => tokio::time::timeout(timeout, call)
                .await
                .map_err(|_| RpcError::Timeout)??,
            None => call.await?,
        };
        trace!(len = response.len(), "response received for {}", op.op_name());

        unmarshal_response(op, response, config.ndr)?;
        match op.status() {
            0 => Ok(()),
            code => Err(RpcError::RemoteFailure {
                code,
                op: op.op_name(),
            }),
        }
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("context_id", &self.context_id)
            .field("interface", &self.interface.name)
            .finish()
    }
}

/// Failed call, with the decoded response when the server answered with a
/// nonzero status.
pub struct CallError<R> {
    pub error: RpcError,
    pub response: Option<R>,
}

impl<R> CallError<R> {
    pub fn into_parts(self) -> (RpcError, Option<R>) {
        (self.error, self.response)
    }
}

impl<R> fmt::Debug for CallError<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallError")
            .field("error", &self.error)
            .field("has_response", &self.response.is_some())
            .finish()
    }
}

impl<R> fmt::Display for CallError<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.error, f)
    }
}

impl<R> std::error::Error for CallError<R> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

impl<R> From<RpcError> for CallError<R> {
    fn from(error: RpcError) -> Self {
        Self {
            error,
            response: None,
        }
    }
}

impl<R> From<CallError<R>> for RpcError {
    fn from(e: CallError<R>) -> Self {
        e.error
    }
}

/// Run a request through `binding` and project the response.
pub async fn call<Req, Resp>(
    binding: &Binding,
    request: Req,
    options: &CallOptions,
) -> std::result::Result<Resp, CallError<Resp>>
where
    Req: OperationRequest,
    Resp: OperationResponse<Op = Req::Op>,
{
    let mut op = request.into_op();
    match binding.invoke(&mut op, options).await {
        Ok(()) => Ok(Resp::from_op(op)),
        Err(error @ RpcError::RemoteFailure { .. }) => Err(CallError {
            error,
            response: Some(Resp::from_op(op)),
        }),
        Err(error) => Err(CallError {
            error,
            response: None,
        }),
    }
}
