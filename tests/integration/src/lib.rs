//! Shared fixtures for the integration tests
//!
//! `IEcho` is a small DCOM interface deriving from IUnknown. Its one method
//! sits at opnum 3 right after the inherited slots:
//!
//! ```text
//! HRESULT EchoGuid([in] GUID input, [out] GUID* output)
//! ```
//!
//! Run a single suite with increased logging:
//! ```text
//! RUST_LOG=debug cargo test -p integration-tests --test echo_tests
//! ```

use async_trait::async_trait;
use dcerpc::{
    call, run_hook, Binding, CallOptions, Conn, Direction, InterfaceDescriptor, LoopbackTransport,
    Operation, OperationRequest, OperationResponse, PrepareHook, Result, RpcError, Server,
    ServerHandle, SyntaxId, Uuid,
};
use dcom::iunknown::{unknown_server_handle, AddRefRequest, AddRefResponse, IUNKNOWN};
use dcom::types::{Ipid, OrpcThat, OrpcThis};
use dcom::{CallResult, ClientOptions, ServerOptions, UnknownClient, UnknownServer};
use midl_ndr::{Guid, NdrReader, NdrWriter};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Once};
use tracing::debug;

pub const IECHO_UUID: Uuid = Uuid::from_u128(0x5f3c_7a10_2b44_4e8d_9a61_0c2d_7e4b_1a90);

pub static IECHO: InterfaceDescriptor = InterfaceDescriptor {
    name: "IEcho",
    syntax: SyntaxId::new(IECHO_UUID, 0, 0),
    first_opnum: 3,
    opnum_count: 1,
    base: Some(&IUNKNOWN),
};

pub mod echo_opnum {
    pub const ECHO_GUID: u16 = 3;
}

#[derive(Debug, Default)]
pub struct EchoGuidOperation {
    pub this: OrpcThis,
    pub that: OrpcThat,
    pub input: Guid,
    pub output: Guid,
    pub return_value: i32,
    pub hook: Option<PrepareHook<Self>>,
}

impl EchoGuidOperation {
    pub const NAME: &'static str = "/IEcho/v0/EchoGuid";
}

impl Operation for EchoGuidOperation {
    fn opnum(&self) -> u16 {
        echo_opnum::ECHO_GUID
    }

    fn op_name(&self) -> &'static str {
        Self::NAME
    }

    fn prepare_request(&mut self) -> Result<()> {
        run_hook(self.hook.clone(), self, Direction::Request)
    }

    fn prepare_response(&mut self) -> Result<()> {
        run_hook(self.hook.clone(), self, Direction::Response)
    }

    fn marshal_request<'a>(&'a self, w: &mut NdrWriter<'a>) -> Result<()> {
        w.encode(&self.this)?;
        w.encode(&self.input)?;
        Ok(())
    }

    fn unmarshal_request(&mut self, r: &mut NdrReader) -> Result<()> {
        self.this = r.decode()?;
        self.input = r.decode()?;
        Ok(())
    }

    fn marshal_response<'a>(&'a self, w: &mut NdrWriter<'a>) -> Result<()> {
        w.encode(&self.that)?;
        w.encode(&self.output)?;
        w.write_i32(self.return_value);
        Ok(())
    }

    fn unmarshal_response(&mut self, r: &mut NdrReader) -> Result<()> {
        self.that = r.decode()?;
        self.output = r.decode()?;
        self.return_value = r.read_i32()?;
        Ok(())
    }

    fn status(&self) -> i32 {
        self.return_value
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EchoGuidRequest {
    pub this: OrpcThis,
    pub input: Guid,
}

impl OperationRequest for EchoGuidRequest {
    type Op = EchoGuidOperation;

    fn into_op(self) -> EchoGuidOperation {
        EchoGuidOperation {
            this: self.this,
            input: self.input,
            ..Default::default()
        }
    }

    fn from_op(op: &EchoGuidOperation) -> Self {
        Self {
            this: op.this.clone(),
            input: op.input,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EchoGuidResponse {
    pub that: OrpcThat,
    pub output: Guid,
    pub return_value: i32,
}

impl OperationResponse for EchoGuidResponse {
    type Op = EchoGuidOperation;

    fn into_op(self, op: &mut EchoGuidOperation) {
        op.that = self.that;
        op.output = self.output;
        op.return_value = self.return_value;
    }

    fn from_op(op: EchoGuidOperation) -> Self {
        Self {
            that: op.that,
            output: op.output,
            return_value: op.return_value,
        }
    }
}

/// IEcho client; IUnknown calls travel on the IEcho binding.
#[derive(Clone, Debug)]
pub struct EchoClient {
    unknown: UnknownClient,
    binding: Binding,
    ipid: Option<Ipid>,
}

impl EchoClient {
    pub async fn new(conn: &Conn, options: ClientOptions) -> Result<Self> {
        let binding = match options.superclass {
            Some(binding) => binding,
            None => conn.bind(&IECHO).await?,
        };
        let unknown =
            UnknownClient::new(conn, ClientOptions::superclass(binding.clone())).await?;
        let unknown = match options.ipid {
            Some(ipid) => unknown.with_ipid(ipid),
            None => unknown,
        };
        Ok(Self {
            unknown,
            binding,
            ipid: options.ipid,
        })
    }

    pub fn unknown(&self) -> &UnknownClient {
        &self.unknown
    }

    pub fn binding(&self) -> &Binding {
        &self.binding
    }

    pub async fn echo_guid(&self, request: EchoGuidRequest) -> CallResult<EchoGuidResponse> {
        let options = self
            .ipid
            .map(|ipid| CallOptions::object(ipid.into()))
            .ok_or(RpcError::MissingIdentity {
                op: EchoGuidOperation::NAME,
            })?;
        call(&self.binding, request, &options).await
    }
}

#[async_trait]
pub trait EchoServer: UnknownServer {
    async fn echo_guid(&self, _request: EchoGuidRequest) -> Result<EchoGuidResponse> {
        Err(RpcError::NotImplemented {
            op: EchoGuidOperation::NAME,
        })
    }
}

pub async fn echo_server_handle<S>(
    server: &S,
    opnum: u16,
    r: &mut NdrReader,
) -> Result<Option<Box<dyn Operation>>>
where
    S: EchoServer + ?Sized,
{
    if opnum < IECHO.first_opnum {
        return unknown_server_handle(server, opnum, r).await;
    }
    match opnum {
        echo_opnum::ECHO_GUID => {
            let mut op = EchoGuidOperation::default();
            op.unmarshal_request(r)?;
            let response = server.echo_guid(EchoGuidRequest::from_op(&op)).await?;
            response.into_op(&mut op);
            Ok(Some(Box::new(op)))
        }
        _ => Ok(None),
    }
}

pub struct EchoServerHandle<S: ?Sized>(pub Arc<S>);

#[async_trait]
impl<S> ServerHandle for EchoServerHandle<S>
where
    S: EchoServer + ?Sized + 'static,
{
    async fn handle(&self, opnum: u16, r: &mut NdrReader) -> Result<Option<Box<dyn Operation>>> {
        echo_server_handle(self.0.as_ref(), opnum, r).await
    }
}

pub async fn register_echo_server<S>(
    rpc: &Server,
    server: Arc<S>,
    options: ServerOptions,
) -> Result<()>
where
    S: EchoServer + ?Sized + 'static,
{
    let handle: Arc<dyn ServerHandle> = Arc::new(EchoServerHandle(server));
    rpc.register(&IECHO, Arc::clone(&handle)).await?;
    if let Some(ipid) = options.ipid {
        rpc.register_object(ipid.into(), &IECHO, handle).await?;
    }
    Ok(())
}

/// IEcho object that echoes its input, or answers with `status` and a zeroed
/// output when `status` is nonzero.
#[derive(Debug, Default)]
pub struct EchoObject {
    status: i32,
    refs: AtomicU32,
    calls: AtomicU64,
}

impl EchoObject {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(status: i32) -> Self {
        Self {
            status,
            ..Default::default()
        }
    }

    pub fn refs(&self) -> u32 {
        self.refs.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UnknownServer for EchoObject {
    async fn add_ref(&self, _request: AddRefRequest) -> Result<AddRefResponse> {
        Ok(AddRefResponse {
            that: OrpcThat::new(),
            return_value: self.refs.fetch_add(1, Ordering::SeqCst) + 1,
        })
    }
}

#[async_trait]
impl EchoServer for EchoObject {
    async fn echo_guid(&self, request: EchoGuidRequest) -> Result<EchoGuidResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        debug!(input = %request.input, status = self.status, "EchoGuid");
        if self.status != 0 {
            return Ok(EchoGuidResponse {
                that: OrpcThat::new(),
                output: Guid::NIL,
                return_value: self.status,
            });
        }
        Ok(EchoGuidResponse {
            that: OrpcThat::new(),
            output: request.input,
            return_value: 0,
        })
    }
}

/// Connection to `server` through the in-process transport.
pub fn loopback(server: &Server) -> Conn {
    Conn::new(Arc::new(LoopbackTransport::new(server.clone())))
}

/// Register `object` as IEcho under a fresh IPID and return a client bound
/// to it.
pub async fn echo_fixture(object: Arc<EchoObject>) -> Result<(Server, EchoClient)> {
    let server = Server::new();
    let ipid = Ipid::generate();
    register_echo_server(&server, object, ServerOptions::new().with_ipid(ipid)).await?;
    let conn = loopback(&server);
    let client = EchoClient::new(&conn, ClientOptions::new().with_ipid(ipid)).await?;
    Ok((server, client))
}

static INIT: Once = Once::new();

/// Install a fmt subscriber honouring `RUST_LOG`, once per test binary.
pub fn init_logging() {
    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}
