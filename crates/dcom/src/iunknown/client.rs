//! IUnknown client

use super::protocol::*;
use crate::options::ClientOptions;
use crate::types::Ipid;
use crate::CallResult;
use dcerpc::{call, Binding, CallOptions, Conn, Result, RpcError};

/// Client for the IUnknown slots of an object.
///
/// Cloning is cheap; all clones share the binding.
#[derive(Clone, Debug)]
pub struct UnknownClient {
    binding: Binding,
    ipid: Option<Ipid>,
}

impl UnknownClient {
    /// Bind IUnknown on `conn`, or reuse the superclass binding.
    pub async fn new(conn: &Conn, options: ClientOptions) -> Result<Self> {
        let binding = match options.superclass {
            Some(binding) => binding,
            None => conn.bind(&IUNKNOWN).await?,
        };
        Ok(Self {
            binding,
            ipid: options.ipid,
        })
    }

    pub fn binding(&self) -> &Binding {
        &self.binding
    }

    pub fn ipid(&self) -> Option<&Ipid> {
        self.ipid.as_ref()
    }

    /// Copy of this client addressed to another object.
    pub fn with_ipid(&self, ipid: Ipid) -> Self {
        Self {
            binding: self.binding.clone(),
            ipid: Some(ipid),
        }
    }

    fn call_options(&self, op: &'static str) -> Result<CallOptions> {
        self.ipid
            .map(|ipid| CallOptions::object(ipid.0))
            .ok_or(RpcError::MissingIdentity { op })
    }

    pub async fn query_interface(
        &self,
        request: QueryInterfaceRequest,
    ) -> CallResult<QueryInterfaceResponse> {
        let options = self.call_options(QueryInterfaceOperation::NAME)?;
        call(&self.binding, request, &options).await
    }

    pub async fn add_ref(&self, request: AddRefRequest) -> CallResult<AddRefResponse> {
        let options = self.call_options(AddRefOperation::NAME)?;
        call(&self.binding, request, &options).await
    }

    pub async fn release(&self, request: ReleaseRequest) -> CallResult<ReleaseResponse> {
        let options = self.call_options(ReleaseOperation::NAME)?;
        call(&self.binding, request, &options).await
    }
}
