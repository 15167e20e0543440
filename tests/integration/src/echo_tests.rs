//! IEcho over the loopback transport
//!
//! - Request/response round trip addressed by IPID
//! - Nonzero status words surfaced with the decoded response
//! - Inherited IUnknown slots dispatched through the derived interface
//! - Reserved and unimplemented opnums

use std::sync::Arc;

use bytes::Bytes;
use dcerpc::{fault, ErrorKind, RpcError};
use dcom::iunknown::{AddRefRequest, ReleaseRequest};
use dcom::types::OrpcThis;
use dcom::ClientOptions;
use integration_tests::*;
use midl_ndr::{Guid, NdrWriter};

#[tokio::test]
async fn test_echo_guid_round_trip() {
    init_logging();

    let object = Arc::new(EchoObject::new());
    let (server, client) = echo_fixture(Arc::clone(&object)).await.unwrap();

    let input = Guid::new_v4();
    let response = client
        .echo_guid(EchoGuidRequest {
            this: OrpcThis::new(),
            input,
        })
        .await
        .unwrap();

    assert_eq!(response.output, input);
    assert_eq!(response.return_value, 0);
    assert_eq!(object.calls(), 1);
    assert_eq!(server.stats().snapshot().requests_processed, 1);
}

#[tokio::test]
async fn test_failure_status_keeps_response() {
    init_logging();

    let object = Arc::new(EchoObject::failing(0x8007_0057_u32 as i32));
    let (_server, client) = echo_fixture(object).await.unwrap();

    let err = client
        .echo_guid(EchoGuidRequest {
            this: OrpcThis::new(),
            input: Guid::new_v4(),
        })
        .await
        .unwrap_err();

    let (error, response) = err.into_parts();
    assert_eq!(error.kind(), ErrorKind::RemoteFailure);
    assert_eq!(error.remote_code(), Some(0x8007_0057_u32 as i32));
    assert!(matches!(
        error,
        RpcError::RemoteFailure {
            op: "/IEcho/v0/EchoGuid",
            ..
        }
    ));
    assert_eq!(
        error.to_string(),
        "/IEcho/v0/EchoGuid: remote failure 0x80070057"
    );

    let response = response.expect("response decoded alongside the failure");
    assert!(response.output.is_nil());
    assert_eq!(response.return_value, 0x8007_0057_u32 as i32);
}

#[tokio::test]
async fn test_missing_ipid_fails_before_sending() {
    init_logging();

    let object = Arc::new(EchoObject::new());
    let (server, _) = echo_fixture(Arc::clone(&object)).await.unwrap();
    let client = EchoClient::new(&loopback(&server), ClientOptions::new())
        .await
        .unwrap();

    let err = client
        .echo_guid(EchoGuidRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(
        err.error,
        RpcError::MissingIdentity {
            op: "/IEcho/v0/EchoGuid"
        }
    ));
    assert!(err.response.is_none());

    let err = client
        .unknown()
        .add_ref(AddRefRequest::default())
        .await
        .unwrap_err();
    assert_eq!(err.error.kind(), ErrorKind::MissingIdentity);
    assert_eq!(object.calls(), 0);
    assert_eq!(server.stats().snapshot().requests_received, 0);
}

#[tokio::test]
async fn test_inherited_add_ref_uses_derived_binding() {
    init_logging();

    let object = Arc::new(EchoObject::new());
    let (_server, client) = echo_fixture(Arc::clone(&object)).await.unwrap();

    assert_eq!(
        client.unknown().binding().context_id(),
        client.binding().context_id()
    );
    assert_eq!(client.unknown().binding().interface().name, "IEcho");

    for expected in 1..=3 {
        let response = client
            .unknown()
            .add_ref(AddRefRequest {
                this: OrpcThis::new(),
            })
            .await
            .unwrap();
        assert_eq!(response.return_value, expected);
    }
    assert_eq!(object.refs(), 3);
}

#[tokio::test]
async fn test_unimplemented_inherited_method_faults() {
    init_logging();

    let (_server, client) = echo_fixture(Arc::new(EchoObject::new())).await.unwrap();
    let err = client
        .unknown()
        .release(ReleaseRequest {
            this: OrpcThis::new(),
        })
        .await
        .unwrap_err();
    assert!(matches!(
        err.error,
        RpcError::Fault(fault::NCA_S_OP_RNG_ERROR)
    ));
}

#[tokio::test]
async fn test_direct_dispatch_reports_not_implemented() {
    init_logging();

    let (server, _) = echo_fixture(Arc::new(EchoObject::new())).await.unwrap();
    let this = OrpcThis::new();
    let mut w = NdrWriter::new();
    w.encode(&this).unwrap();
    let stub = w.finish().unwrap();

    let err = server
        .dispatch(&IECHO.syntax, None, 2, stub)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        RpcError::NotImplemented {
            op: "/IUnknown/v0/Release"
        }
    ));
}

#[tokio::test]
async fn test_opnum_past_interface_gets_empty_response() {
    init_logging();

    let (server, _) = echo_fixture(Arc::new(EchoObject::new())).await.unwrap();
    let response = server
        .dispatch(&IECHO.syntax, None, 4, Bytes::new())
        .await
        .unwrap();
    assert!(response.is_empty());
    assert_eq!(server.stats().snapshot().requests_empty, 1);
}
