//! IRemUnknown client

use super::protocol::*;
use crate::iunknown::UnknownClient;
use crate::options::ClientOptions;
use crate::types::Ipid;
use crate::CallResult;
use dcerpc::{call, Binding, CallOptions, Conn, Result, RpcError};
use tracing::debug;

/// Client for IRemUnknown and its inherited IUnknown slots.
///
/// Both halves share one presentation context.
#[derive(Clone, Debug)]
pub struct RemUnknownClient {
    unknown: UnknownClient,
    binding: Binding,
    ipid: Option<Ipid>,
}

impl RemUnknownClient {
    /// Bind IRemUnknown on `conn`, or reuse the superclass binding.
    pub async fn new(conn: &Conn, options: ClientOptions) -> Result<Self> {
        let binding = match options.superclass {
            Some(binding) => binding,
            None => conn.bind(&IREMUNKNOWN).await?,
        };
        debug!(
            interface = binding.interface().name,
            context_id = binding.context_id(),
            "IRemUnknown client ready"
        );
        let unknown = UnknownClient::new(
            conn,
            ClientOptions {
                superclass: Some(binding.clone()),
                ipid: options.ipid,
            },
        )
        .await?;
        Ok(Self {
            unknown,
            binding,
            ipid: options.ipid,
        })
    }

    /// The inherited IUnknown client.
    pub fn unknown(&self) -> &UnknownClient {
        &self.unknown
    }

    pub fn binding(&self) -> &Binding {
        &self.binding
    }

    pub fn ipid(&self) -> Option<&Ipid> {
        self.ipid.as_ref()
    }

    pub fn with_ipid(&self, ipid: Ipid) -> Self {
        Self {
            unknown: self.unknown.with_ipid(ipid),
            binding: self.binding.clone(),
            ipid: Some(ipid),
        }
    }

    fn call_options(&self, op: &'static str) -> Result<CallOptions> {
        self.ipid
            .map(|ipid| CallOptions::object(ipid.0))
            .ok_or(RpcError::MissingIdentity { op })
    }

    pub async fn rem_query_interface(
        &self,
        request: RemQueryInterfaceRequest,
    ) -> CallResult<RemQueryInterfaceResponse> {
        let options = self.call_options(RemQueryInterfaceOperation::NAME)?;
        call(&self.binding, request, &options).await
    }

    pub async fn rem_add_ref(&self, request: RemAddRefRequest) -> CallResult<RemAddRefResponse> {
        let options = self.call_options(RemAddRefOperation::NAME)?;
        call(&self.binding, request, &options).await
    }

    pub async fn rem_release(&self, request: RemReleaseRequest) -> CallResult<RemReleaseResponse> {
        let options = self.call_options(RemReleaseOperation::NAME)?;
        call(&self.binding, request, &options).await
    }
}
