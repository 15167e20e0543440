//! IRemUnknown over the loopback transport
//!
//! - RemQueryInterface with mixed known and unknown IIDs
//! - Remote reference counting through RemAddRef/RemRelease
//! - IUnknown slots reached through an IRemUnknown binding
//! - Object ids registered for another interface

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use dcerpc::{fault, Result, RpcError, Server};
use dcom::hresult;
use dcom::iunknown::QueryInterfaceRequest;
use dcom::remunknown::*;
use dcom::types::{Iid, Ipid, Oid, OrpcThat, OrpcThis, Oxid, RemInterfaceRef, RemQiResult, StdObjRef};
use dcom::{ClientOptions, ServerOptions, UnknownServer};
use integration_tests::*;
use tokio::sync::Mutex;

const ECHO_IID: Iid = Iid(IECHO_UUID);

/// Exporter-side IRemUnknown for a single object exposing IEcho.
struct Exporter {
    oxid: Oxid,
    oid: Oid,
    echo_ipid: Ipid,
    refs: Mutex<HashMap<Ipid, u32>>,
}

impl Exporter {
    fn new() -> Self {
        Self {
            oxid: Oxid::generate(),
            oid: Oid::generate(),
            echo_ipid: Ipid::generate(),
            refs: Mutex::new(HashMap::new()),
        }
    }

    async fn refs_on(&self, ipid: &Ipid) -> u32 {
        self.refs.lock().await.get(ipid).copied().unwrap_or(0)
    }
}

impl UnknownServer for Exporter {}

#[async_trait]
impl RemUnknownServer for Exporter {
    async fn rem_query_interface(
        &self,
        request: RemQueryInterfaceRequest,
    ) -> Result<RemQueryInterfaceResponse> {
        let mut refs = self.refs.lock().await;
        let qi_results = request
            .iids
            .iter()
            .map(|iid| {
                if *iid == ECHO_IID {
                    *refs.entry(self.echo_ipid).or_default() += request.refs;
                    RemQiResult {
                        hresult: hresult::S_OK,
                        std: StdObjRef::new(self.oxid, self.oid, self.echo_ipid, request.refs),
                    }
                } else {
                    RemQiResult {
                        hresult: hresult::E_NOINTERFACE,
                        std: StdObjRef::default(),
                    }
                }
            })
            .collect();
        Ok(RemQueryInterfaceResponse {
            that: OrpcThat::new(),
            qi_results,
            return_value: hresult::S_OK,
        })
    }

    async fn rem_add_ref(&self, request: RemAddRefRequest) -> Result<RemAddRefResponse> {
        let mut refs = self.refs.lock().await;
        let results = request
            .interface_refs
            .iter()
            .map(|r| match refs.get_mut(&r.ipid) {
                Some(count) => {
                    *count += r.public_refs;
                    hresult::S_OK
                }
                None => hresult::E_INVALIDARG,
            })
            .collect();
        Ok(RemAddRefResponse {
            that: OrpcThat::new(),
            results,
            return_value: hresult::S_OK,
        })
    }

    async fn rem_release(&self, request: RemReleaseRequest) -> Result<RemReleaseResponse> {
        let mut refs = self.refs.lock().await;
        let mut return_value = hresult::S_OK;
        for r in &request.interface_refs {
            match refs.get_mut(&r.ipid) {
                Some(count) if *count >= r.public_refs => *count -= r.public_refs,
                _ => return_value = hresult::E_INVALIDARG,
            }
        }
        Ok(RemReleaseResponse {
            that: OrpcThat::new(),
            return_value,
        })
    }
}

async fn fixture() -> (Arc<Exporter>, RemUnknownClient) {
    let exporter = Arc::new(Exporter::new());
    let rem_unknown_ipid = Ipid::generate();
    let server = Server::new();
    register_rem_unknown_server(
        &server,
        Arc::clone(&exporter),
        ServerOptions::new().with_ipid(rem_unknown_ipid),
    )
    .await
    .unwrap();
    let client = RemUnknownClient::new(
        &loopback(&server),
        ClientOptions::new().with_ipid(rem_unknown_ipid),
    )
    .await
    .unwrap();
    (exporter, client)
}

#[tokio::test]
async fn test_rem_query_interface_mixed_iids() {
    init_logging();

    let (exporter, client) = fixture().await;
    let response = client
        .rem_query_interface(RemQueryInterfaceRequest {
            this: OrpcThis::new(),
            ipid: Ipid::generate(),
            refs: 5,
            iids_count: 0,
            iids: vec![ECHO_IID, Iid::generate()],
        })
        .await
        .unwrap();

    assert_eq!(response.qi_results.len(), 2);
    let echo = &response.qi_results[0];
    assert!(hresult::succeeded(echo.hresult));
    assert_eq!(echo.std.ipid, exporter.echo_ipid);
    assert_eq!(echo.std.oxid, exporter.oxid);
    assert_eq!(echo.std.public_refs, 5);
    assert_eq!(response.qi_results[1].hresult, hresult::E_NOINTERFACE);
    assert_eq!(exporter.refs_on(&exporter.echo_ipid).await, 5);
}

#[tokio::test]
async fn test_remote_reference_counting() {
    init_logging();

    let (exporter, client) = fixture().await;
    client
        .rem_query_interface(RemQueryInterfaceRequest {
            this: OrpcThis::new(),
            refs: 1,
            iids: vec![ECHO_IID],
            ..Default::default()
        })
        .await
        .unwrap();

    let unknown_ipid = Ipid::generate();
    let response = client
        .rem_add_ref(RemAddRefRequest {
            this: OrpcThis::new(),
            interface_refs_count: 0,
            interface_refs: vec![
                RemInterfaceRef::new(exporter.echo_ipid, 4),
                RemInterfaceRef::new(unknown_ipid, 1),
            ],
        })
        .await
        .unwrap();
    assert_eq!(response.results, vec![hresult::S_OK, hresult::E_INVALIDARG]);
    assert_eq!(exporter.refs_on(&exporter.echo_ipid).await, 5);

    client
        .rem_release(RemReleaseRequest {
            this: OrpcThis::new(),
            interface_refs_count: 0,
            interface_refs: vec![RemInterfaceRef::new(exporter.echo_ipid, 5)],
        })
        .await
        .unwrap();
    assert_eq!(exporter.refs_on(&exporter.echo_ipid).await, 0);

    let err = client
        .rem_release(RemReleaseRequest {
            this: OrpcThis::new(),
            interface_refs_count: 0,
            interface_refs: vec![RemInterfaceRef::new(exporter.echo_ipid, 1)],
        })
        .await
        .unwrap_err();
    assert_eq!(err.error.remote_code(), Some(hresult::E_INVALIDARG));
    assert_eq!(err.error.to_string(), "/IRemUnknown/v0/RemRelease: remote failure 0x80070057");
}

#[tokio::test]
async fn test_inherited_query_interface_not_served() {
    init_logging();

    let (_exporter, client) = fixture().await;
    assert_eq!(client.unknown().binding().interface().name, "IRemUnknown");

    let err = client
        .unknown()
        .query_interface(QueryInterfaceRequest {
            this: OrpcThis::new(),
            iid: ECHO_IID,
        })
        .await
        .unwrap_err();
    assert!(matches!(err.error, RpcError::Fault(fault::NCA_S_OP_RNG_ERROR)));
    assert!(err.response.is_none());
}

#[tokio::test]
async fn test_unregistered_ipid_falls_back_to_interface() {
    init_logging();

    let (_exporter, client) = fixture().await;
    let other = client.with_ipid(Ipid::generate());
    assert_ne!(other.ipid(), client.ipid());

    let response = other
        .rem_query_interface(RemQueryInterfaceRequest {
            this: OrpcThis::new(),
            iids: vec![Iid::generate()],
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(response.qi_results[0].hresult, hresult::E_NOINTERFACE);
}

#[tokio::test]
async fn test_ipid_of_other_interface_rejected() {
    init_logging();

    let exporter = Arc::new(Exporter::new());
    let server = Server::new();
    register_rem_unknown_server(&server, Arc::clone(&exporter), ServerOptions::new())
        .await
        .unwrap();
    register_echo_server(
        &server,
        Arc::new(EchoObject::new()),
        ServerOptions::new().with_ipid(exporter.echo_ipid),
    )
    .await
    .unwrap();

    // An IRemUnknown call aimed at the IEcho object must not reach it.
    let client = RemUnknownClient::new(
        &loopback(&server),
        ClientOptions::new().with_ipid(exporter.echo_ipid),
    )
    .await
    .unwrap();
    let err = client
        .rem_query_interface(RemQueryInterfaceRequest {
            this: OrpcThis::new(),
            iids: vec![ECHO_IID],
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert!(matches!(err.error, RpcError::Fault(fault::NCA_S_UNK_IF)));
    assert_eq!(exporter.refs_on(&exporter.echo_ipid).await, 0);
}
