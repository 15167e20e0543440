//! IUnknown server

use super::protocol::*;
use crate::options::ServerOptions;
use async_trait::async_trait;
use dcerpc::{
    Operation, OperationRequest, OperationResponse, Result, RpcError, Server, ServerHandle,
};
use midl_ndr::NdrReader;
use std::sync::Arc;

/// IUnknown methods. Every method defaults to `NotImplemented`.
#[async_trait]
pub trait UnknownServer: Send + Sync {
    async fn query_interface(
        &self,
        _request: QueryInterfaceRequest,
    ) -> Result<QueryInterfaceResponse> {
        Err(RpcError::NotImplemented {
            op: QueryInterfaceOperation::NAME,
        })
    }

    async fn add_ref(&self, _request: AddRefRequest) -> Result<AddRefResponse> {
        Err(RpcError::NotImplemented {
            op: AddRefOperation::NAME,
        })
    }

    async fn release(&self, _request: ReleaseRequest) -> Result<ReleaseResponse> {
        Err(RpcError::NotImplemented {
            op: ReleaseOperation::NAME,
        })
    }
}

/// Server with no IUnknown methods.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnimplementedUnknownServer;

impl UnknownServer for UnimplementedUnknownServer {}

/// Decode, run and return one IUnknown call.
///
/// Opnums outside 0-2 produce no operation.
pub async fn unknown_server_handle<S>(
    server: &S,
    opnum: u16,
    r: &mut NdrReader,
) -> Result<Option<Box<dyn Operation>>>
where
    S: UnknownServer + ?Sized,
{
    match opnum {
        opnum::QUERY_INTERFACE => {
            let mut op = QueryInterfaceOperation::default();
            op.unmarshal_request(r)?;
            let response = server
                .query_interface(QueryInterfaceRequest::from_op(&op))
                .await?;
            response.into_op(&mut op);
            Ok(Some(Box::new(op)))
        }
        opnum::ADD_REF => {
            let mut op = AddRefOperation::default();
            op.unmarshal_request(r)?;
            let response = server.add_ref(AddRefRequest::from_op(&op)).await?;
            response.into_op(&mut op);
            Ok(Some(Box::new(op)))
        }
        opnum::RELEASE => {
            let mut op = ReleaseOperation::default();
            op.unmarshal_request(r)?;
            let response = server.release(ReleaseRequest::from_op(&op)).await?;
            response.into_op(&mut op);
            Ok(Some(Box::new(op)))
        }
        _ => Ok(None),
    }
}

/// [`ServerHandle`] serving IUnknown from an [`UnknownServer`].
pub struct UnknownServerHandle<S: ?Sized>(pub Arc<S>);

#[async_trait]
impl<S> ServerHandle for UnknownServerHandle<S>
where
    S: UnknownServer + ?Sized + 'static,
{
    async fn handle(&self, opnum: u16, r: &mut NdrReader) -> Result<Option<Box<dyn Operation>>> {
        unknown_server_handle(self.0.as_ref(), opnum, r).await
    }
}

/// Register `server` for IUnknown calls.
pub async fn register_unknown_server<S>(
    rpc: &Server,
    server: Arc<S>,
    options: ServerOptions,
) -> Result<()>
where
    S: UnknownServer + ?Sized + 'static,
{
    let handle: Arc<dyn ServerHandle> = Arc::new(UnknownServerHandle(server));
    rpc.register(&IUNKNOWN, Arc::clone(&handle)).await?;
    if let Some(ipid) = options.ipid {
        rpc.register_object(ipid.0, &IUNKNOWN, handle).await?;
    }
    Ok(())
}
