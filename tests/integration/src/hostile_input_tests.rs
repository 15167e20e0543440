//! Malformed and adversarial input
//!
//! - Declared lengths larger than the buffer or the configured limit
//! - Truncated stubs and alignment padding
//! - Aliased full pointers
//! - Hostile stubs delivered to server dispatch

use std::sync::Arc;

use dcerpc::{ErrorKind, RpcError};
use dcom::remunknown::{opnum, IREMUNKNOWN};
use dcom::types::{DualStringArray, InterfacePointer, OrpcThis, RemInterfaceRef};
use integration_tests::*;
use midl_ndr::{ConformantArray, FullPtr, NdrContext, NdrError, NdrReader, NdrWriter};

#[test]
fn test_huge_declared_count_rejected_without_allocating() {
    let mut w = NdrWriter::new();
    w.write_u32(0xFFFF_FFFF);
    w.write_u32(1);
    let mut r = NdrReader::new(w.finish().unwrap());

    let err = r.decode::<ConformantArray<u32>>().unwrap_err();
    assert!(matches!(err, NdrError::CountExceedsLimit { count: 0xFFFF_FFFF, .. }));
    assert!(err.is_malformed());
}

#[test]
fn test_count_beyond_buffer_rejected() {
    let mut w = NdrWriter::new();
    w.write_u32(1000);
    w.write_u32(7);
    let mut r = NdrReader::new(w.finish().unwrap());

    let err = r.decode::<ConformantArray<u32>>().unwrap_err();
    assert!(matches!(err, NdrError::CountExceedsBuffer { count: 1000, .. }));
}

#[test]
fn test_configured_limit_applies() {
    let items = ConformantArray::new(vec![0u8; 16]);
    let mut w = NdrWriter::new();
    w.encode(&items).unwrap();
    let bytes = w.finish().unwrap();

    let ctx = NdrContext::new().with_max_array_elements(8);
    let err = NdrReader::with_context(bytes.clone(), ctx)
        .decode::<ConformantArray<u8>>()
        .unwrap_err();
    assert!(matches!(err, NdrError::CountExceedsLimit { count: 16, limit: 8 }));

    let decoded: ConformantArray<u8> = NdrReader::new(bytes).decode().unwrap();
    assert_eq!(decoded.len(), 16);
}

#[test]
fn test_truncated_read() {
    let mut w = NdrWriter::new();
    w.write_u32(1);
    let mut r = NdrReader::new(w.finish().unwrap());
    let err = r.read_u64().unwrap_err();
    assert!(err.is_truncated());
}

#[test]
fn test_alignment_padding_is_zero_filled() {
    let mut w = NdrWriter::new();
    w.write_u8(0xAA);
    w.write_u32(0x0102_0304);
    w.write_u16(0xBBBB);
    w.write_u64(5);
    let bytes = w.finish().unwrap();

    assert_eq!(bytes.len(), 24);
    assert_eq!(&bytes[..8], &[0xAA, 0, 0, 0, 0x04, 0x03, 0x02, 0x01]);
    assert_eq!(&bytes[10..16], &[0; 6]);

    let mut r = NdrReader::new(bytes);
    assert_eq!(r.read_u8().unwrap(), 0xAA);
    assert_eq!(r.read_u32().unwrap(), 0x0102_0304);
    assert_eq!(r.read_u16().unwrap(), 0xBBBB);
    assert_eq!(r.read_u64().unwrap(), 5);
    assert!(r.is_empty());
}

#[test]
fn test_aliased_full_pointers_share_one_referent() {
    let first = FullPtr::new(0x4242u16);
    let second = first.alias();
    let mut w = NdrWriter::new();
    w.encode(&first).unwrap();
    w.encode(&second).unwrap();
    let bytes = w.finish().unwrap();
    // Same referent id twice, pointee sent once
    assert_eq!(&bytes[..4], &bytes[8..12]);
    assert_eq!(bytes.len(), 12);

    let mut r = NdrReader::new(bytes);
    let a: FullPtr<u16> = r.decode().unwrap();
    let b: FullPtr<u16> = r.decode().unwrap();
    assert!(a.ptr_eq(&b));
    assert_eq!(b.get(), Some(&0x4242));
}

#[test]
fn test_string_binding_count_mismatch() {
    let mut w = NdrWriter::new();
    w.write_u32(4);
    w.write_u16(0xFFFF);
    w.write_u16(2);
    let mut r = NdrReader::new(w.finish().unwrap());
    let err = r.decode::<DualStringArray>().unwrap_err();
    assert!(matches!(err, NdrError::ConformanceMismatch { max_count: 4, .. }));
}

#[test]
fn test_interface_pointer_with_bad_signature() {
    let ip = InterfacePointer::new(vec![0u8; 64]);
    assert!(ip.objref().is_err());
}

#[tokio::test]
async fn test_truncated_stub_rejected_by_server() {
    init_logging();

    let (server, _) = echo_fixture(Arc::new(EchoObject::new())).await.unwrap();
    let this = OrpcThis::new();
    let mut w = NdrWriter::new();
    w.encode(&this).unwrap();
    w.write_u32(0x1234_5678);
    let stub = w.finish().unwrap();

    let err = server
        .dispatch(&IECHO.syntax, None, echo_opnum::ECHO_GUID, stub)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Truncated);
    assert_eq!(server.stats().snapshot().requests_failed, 1);
}

#[tokio::test]
async fn test_size_field_disagreeing_with_array_rejected_by_server() {
    init_logging();

    let server = dcerpc::Server::new();
    dcom::remunknown::register_rem_unknown_server(
        &server,
        Arc::new(dcom::remunknown::UnimplementedRemUnknownServer),
        dcom::ServerOptions::new(),
    )
    .await
    .unwrap();

    let this = OrpcThis::new();
    let refs = ConformantArray::new(vec![RemInterfaceRef::default(); 2]);
    let mut w = NdrWriter::new();
    w.encode(&this).unwrap();
    w.write_u16(9);
    w.encode(&refs).unwrap();
    let stub = w.finish().unwrap();

    let err = server
        .dispatch(&IREMUNKNOWN.syntax, None, opnum::REM_ADD_REF, stub)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        RpcError::Ndr(NdrError::ConformanceMismatch {
            max_count: 2,
            actual_count: 9
        })
    ));
}
