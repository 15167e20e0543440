//! IRemUnknown server

use super::protocol::*;
use crate::iunknown::{unknown_server_handle, UnknownServer};
use crate::options::ServerOptions;
use async_trait::async_trait;
use dcerpc::{
    Operation, OperationRequest, OperationResponse, Result, RpcError, Server, ServerHandle,
};
use midl_ndr::NdrReader;
use std::sync::Arc;
use tracing::debug;

/// IRemUnknown methods on top of the inherited IUnknown slots.
#[async_trait]
pub trait RemUnknownServer: UnknownServer {
    async fn rem_query_interface(
        &self,
        _request: RemQueryInterfaceRequest,
    ) -> Result<RemQueryInterfaceResponse> {
        Err(RpcError::NotImplemented {
            op: RemQueryInterfaceOperation::NAME,
        })
    }

    async fn rem_add_ref(&self, _request: RemAddRefRequest) -> Result<RemAddRefResponse> {
        Err(RpcError::NotImplemented {
            op: RemAddRefOperation::NAME,
        })
    }

    async fn rem_release(&self, _request: RemReleaseRequest) -> Result<RemReleaseResponse> {
        Err(RpcError::NotImplemented {
            op: RemReleaseOperation::NAME,
        })
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct UnimplementedRemUnknownServer;

impl UnknownServer for UnimplementedRemUnknownServer {}
impl RemUnknownServer for UnimplementedRemUnknownServer {}

/// Decode, run and return one IRemUnknown call.
///
/// Opnums below 3 are routed to the IUnknown handler.
pub async fn rem_unknown_server_handle<S>(
    server: &S,
    opnum: u16,
    r: &mut NdrReader,
) -> Result<Option<Box<dyn Operation>>>
where
    S: RemUnknownServer + ?Sized,
{
    if opnum < IREMUNKNOWN.first_opnum {
        return unknown_server_handle(server, opnum, r).await;
    }
    match opnum {
        opnum::REM_QUERY_INTERFACE => {
            let mut op = RemQueryInterfaceOperation::default();
            op.unmarshal_request(r)?;
            let response = server
                .rem_query_interface(RemQueryInterfaceRequest::from_op(&op))
                .await?;
            response.into_op(&mut op);
            Ok(Some(Box::new(op)))
        }
        opnum::REM_ADD_REF => {
            let mut op = RemAddRefOperation::default();
            op.unmarshal_request(r)?;
            let response = server.rem_add_ref(RemAddRefRequest::from_op(&op)).await?;
            response.into_op(&mut op);
            Ok(Some(Box::new(op)))
        }
        opnum::REM_RELEASE => {
            let mut op = RemReleaseOperation::default();
            op.unmarshal_request(r)?;
            let response = server.rem_release(RemReleaseRequest::from_op(&op)).await?;
            response.into_op(&mut op);
            Ok(Some(Box::new(op)))
        }
        _ => Ok(None),
    }
}

pub struct RemUnknownServerHandle<S: ?Sized>(pub Arc<S>);

#[async_trait]
impl<S> ServerHandle for RemUnknownServerHandle<S>
where
    S: RemUnknownServer + ?Sized + 'static,
{
    async fn handle(&self, opnum: u16, r: &mut NdrReader) -> Result<Option<Box<dyn Operation>>> {
        rem_unknown_server_handle(self.0.as_ref(), opnum, r).await
    }
}

/// Register `server` for IRemUnknown calls, including opnums 0-2.
pub async fn register_rem_unknown_server<S>(
    rpc: &Server,
    server: Arc<S>,
    options: ServerOptions,
) -> Result<()>
where
    S: RemUnknownServer + ?Sized + 'static,
{
    let handle: Arc<dyn ServerHandle> = Arc::new(RemUnknownServerHandle(server));
    rpc.register(&IREMUNKNOWN, Arc::clone(&handle)).await?;
    if let Some(ipid) = options.ipid {
        debug!(%ipid, "IRemUnknown object registered");
        rpc.register_object(ipid.0, &IREMUNKNOWN, handle).await?;
    }
    Ok(())
}
