//! Concurrent calls over one connection
//!
//! - Many in-flight calls sharing a binding, each getting its own answer
//! - Reference counts stay exact under contention
//! - Clients bound from several tasks share one presentation context

use std::sync::Arc;

use dcom::iunknown::AddRefRequest;
use dcom::types::OrpcThis;
use dcom::ClientOptions;
use futures::future::join_all;
use integration_tests::*;
use midl_ndr::Guid;

const CALLS: usize = 64;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_echo_calls_get_their_own_answers() {
    init_logging();

    let object = Arc::new(EchoObject::new());
    let (server, client) = echo_fixture(Arc::clone(&object)).await.unwrap();

    let inputs: Vec<Guid> = (0..CALLS).map(|_| Guid::new_v4()).collect();
    let calls = inputs.iter().map(|&input| {
        let client = client.clone();
        async move {
            client
                .echo_guid(EchoGuidRequest {
                    this: OrpcThis::new(),
                    input,
                })
                .await
        }
    });

    let results = join_all(calls).await;
    for (input, result) in inputs.iter().zip(results) {
        assert_eq!(&result.unwrap().output, input);
    }
    assert_eq!(object.calls(), CALLS as u64);
    assert_eq!(
        server.stats().snapshot().requests_processed,
        CALLS as u64
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_add_ref_from_spawned_tasks() {
    init_logging();

    let object = Arc::new(EchoObject::new());
    let (_server, client) = echo_fixture(Arc::clone(&object)).await.unwrap();

    let handles: Vec<_> = (0..CALLS)
        .map(|_| {
            let client = client.clone();
            tokio::spawn(async move {
                client
                    .unknown()
                    .add_ref(AddRefRequest {
                        this: OrpcThis::new(),
                    })
                    .await
                    .map(|response| response.return_value)
            })
        })
        .collect();

    let mut counts: Vec<u32> = join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.unwrap().unwrap())
        .collect();
    counts.sort_unstable();

    let expected: Vec<u32> = (1..=CALLS as u32).collect();
    assert_eq!(counts, expected);
    assert_eq!(object.refs(), CALLS as u32);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_binds_share_context() {
    init_logging();

    let (server, _) = echo_fixture(Arc::new(EchoObject::new())).await.unwrap();
    let conn = loopback(&server);

    let binds = (0..8).map(|_| {
        let conn = conn.clone();
        async move { EchoClient::new(&conn, ClientOptions::new()).await }
    });
    let clients: Vec<EchoClient> = join_all(binds)
        .await
        .into_iter()
        .map(|client| client.unwrap())
        .collect();

    let context_id = clients[0].binding().context_id();
    assert!(clients
        .iter()
        .all(|client| client.binding().context_id() == context_id));
}
