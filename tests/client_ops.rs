//! End-to-end client operations against the in-process agent.

mod common;

use common::MockAgent;
use edgesnmp::{oid, Client, Error, ErrorStatus, Value, VarBind, Version};
use tokio_util::sync::CancellationToken;

async fn connect(agent: &MockAgent, version: Version) -> Client {
    Client::builder(agent.addr().to_string())
        .version(version)
        .community("public")
        .auto_reconnect(false)
        .connect(&CancellationToken::new())
        .await
        .expect("connect failed")
}

#[tokio::test]
async fn get_sys_descr() {
    let agent = MockAgent::start().await;
    let client = connect(&agent, Version::V2c).await;
    let cancel = CancellationToken::new();

    let results = client
        .get(&cancel, &[oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)])
        .await
        .unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].oid, oid!(1, 3, 6, 1, 2, 1, 1, 1, 0));
    assert_eq!(results[0].value.as_str(), Some("Router"));

    client.disconnect().await.unwrap();
}

#[tokio::test]
async fn get_multiple_oids_preserves_order() {
    let agent = MockAgent::start().await;
    let client = connect(&agent, Version::V2c).await;
    let cancel = CancellationToken::new();

    let oids = [
        oid!(1, 3, 6, 1, 2, 1, 1, 5, 0),
        oid!(1, 3, 6, 1, 2, 1, 1, 1, 0),
        oid!(1, 3, 6, 1, 2, 1, 1, 3, 0),
    ];
    let results = client.get(&cancel, &oids).await.unwrap();

    assert_eq!(results.len(), 3);
    assert_eq!(results[0].value.as_str(), Some("router1"));
    assert_eq!(results[1].value.as_str(), Some("Router"));
    assert_eq!(results[2].value, Value::TimeTicks(123456));
}

#[tokio::test]
async fn get_batches_when_over_max_oids() {
    let agent = MockAgent::start().await;
    for i in 0..10u32 {
        agent.set(oid!(1, 3, 6, 1, 99, 1, i), Value::Integer(i as i32));
    }

    let client = Client::builder(agent.addr().to_string())
        .max_oids(3)
        .auto_reconnect(false)
        .connect(&CancellationToken::new())
        .await
        .unwrap();
    let cancel = CancellationToken::new();

    let oids: Vec<_> = (0..10u32).map(|i| oid!(1, 3, 6, 1, 99, 1, i)).collect();
    let results = client.get(&cancel, &oids).await.unwrap();

    assert_eq!(results.len(), 10);
    for (i, vb) in results.iter().enumerate() {
        assert_eq!(vb.value, Value::Integer(i as i32));
    }
    // 10 OIDs in batches of 3 -> 4 requests
    assert_eq!(agent.received(), 4);
}

#[tokio::test]
async fn get_missing_oid_v2c_yields_exception() {
    let agent = MockAgent::start().await;
    let client = connect(&agent, Version::V2c).await;
    let cancel = CancellationToken::new();

    let results = client
        .get(&cancel, &[oid!(1, 3, 6, 1, 99, 99, 0)])
        .await
        .unwrap();

    assert_eq!(results[0].value, Value::NoSuchObject);
    assert!(results[0].value.is_exception());
}

#[tokio::test]
async fn get_missing_oid_v1_yields_snmp_error_with_oid() {
    let agent = MockAgent::start().await;
    let client = connect(&agent, Version::V1).await;
    let cancel = CancellationToken::new();

    let missing = oid!(1, 3, 6, 1, 99, 99, 0);
    let result = client.get(&cancel, &[missing.clone()]).await;

    match result {
        Err(Error::Snmp { status, index, oid, .. }) => {
            assert_eq!(status, ErrorStatus::NoSuchName);
            assert_eq!(index, 1);
            assert_eq!(oid, Some(missing));
        }
        other => panic!("expected Snmp error, got {:?}", other),
    }
}

#[tokio::test]
async fn get_next_advances() {
    let agent = MockAgent::start().await;
    let client = connect(&agent, Version::V2c).await;
    let cancel = CancellationToken::new();

    let results = client
        .get_next(&cancel, &[oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)])
        .await
        .unwrap();

    assert_eq!(results[0].oid, oid!(1, 3, 6, 1, 2, 1, 1, 2, 0));
}

#[tokio::test]
async fn get_bulk_repeats() {
    let agent = MockAgent::with_data(common::if_table_mib()).await;
    let client = connect(&agent, Version::V2c).await;
    let cancel = CancellationToken::new();

    let results = client
        .get_bulk(&cancel, 0, 3, &[oid!(1, 3, 6, 1, 2, 1, 2, 2, 1, 1)])
        .await
        .unwrap();

    assert_eq!(results.len(), 3);
    assert_eq!(results[0].value, Value::Integer(1));
    assert_eq!(results[1].value, Value::Integer(2));
    assert_eq!(results[2].value, Value::Integer(3));
}

#[tokio::test]
async fn get_bulk_partial_final_batch_carries_end_of_view() {
    let agent = MockAgent::with_data(common::if_table_mib()).await;
    let client = connect(&agent, Version::V2c).await;
    let cancel = CancellationToken::new();

    // Only one entry follows ifDescr.1; the agent pads with endOfMibView
    let results = client
        .get_bulk(&cancel, 0, 5, &[oid!(1, 3, 6, 1, 2, 1, 4, 1)])
        .await
        .unwrap();

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].value, Value::Integer(1));
    assert_eq!(results[1].value, Value::EndOfMibView);
}

#[tokio::test]
async fn set_round_trips_through_agent() {
    let agent = MockAgent::start().await;
    let client = connect(&agent, Version::V2c).await;
    let cancel = CancellationToken::new();

    let target = oid!(1, 3, 6, 1, 2, 1, 1, 5, 0);
    let results = client
        .set(&cancel, &[VarBind::new(target.clone(), "core-sw-1")])
        .await
        .unwrap();

    assert_eq!(results[0].value.as_str(), Some("core-sw-1"));
    assert_eq!(agent.get(&target).unwrap().as_str(), Some("core-sw-1"));
}

#[tokio::test]
async fn concurrent_get_fan_out() {
    let agent = MockAgent::start().await;
    for i in 0..100u32 {
        agent.set(oid!(1, 3, 6, 1, 99, 2, i), Value::Integer(i as i32));
    }

    let client = connect(&agent, Version::V2c).await;
    let cancel = CancellationToken::new();

    let mut handles = Vec::new();
    for i in 0..100u32 {
        let client = client.clone();
        let cancel = cancel.clone();
        handles.push(tokio::spawn(async move {
            let results = client
                .get(&cancel, &[oid!(1, 3, 6, 1, 99, 2, i)])
                .await
                .unwrap();
            (i, results)
        }));
    }

    for handle in handles {
        let (i, results) = handle.await.unwrap();
        // Every response matched its own request
        assert_eq!(results[0].oid, oid!(1, 3, 6, 1, 99, 2, i));
        assert_eq!(results[0].value, Value::Integer(i as i32));
    }

    // Pending table drained back to empty
    assert_eq!(client.inflight(), 0);
    assert_eq!(client.metrics().spurious_responses.value(), 0);
    assert_eq!(client.metrics().responses_received.value(), 100);
}

#[tokio::test]
async fn connect_twice_is_rejected() {
    let agent = MockAgent::start().await;
    let client = connect(&agent, Version::V2c).await;

    let result = client.connect(&CancellationToken::new()).await;
    assert!(matches!(result, Err(Error::AlreadyConnected)));

    client.disconnect().await.unwrap();
    // Reconnecting after a clean disconnect works
    client.connect(&CancellationToken::new()).await.unwrap();
}

#[tokio::test]
async fn too_many_inflight_fails_fast() {
    // An agent that never answers keeps slots occupied
    let agent = MockAgent::with_behavior(
        common::system_mib(),
        common::AgentBehavior {
            drop_first: usize::MAX,
            ..Default::default()
        },
    )
    .await;

    let client = Client::builder(agent.addr().to_string())
        .max_inflight(2)
        .retries(0)
        .timeout(std::time::Duration::from_secs(5))
        .auto_reconnect(false)
        .connect(&CancellationToken::new())
        .await
        .unwrap();
    let cancel = CancellationToken::new();

    let c1 = client.clone();
    let cancel1 = cancel.clone();
    let h1 = tokio::spawn(async move { c1.get(&cancel1, &[oid!(1, 3, 6, 1)]).await });
    let c2 = client.clone();
    let cancel2 = cancel.clone();
    let h2 = tokio::spawn(async move { c2.get(&cancel2, &[oid!(1, 3, 6, 2)]).await });

    // Wait until both slots are registered
    tokio::time::timeout(std::time::Duration::from_secs(1), async {
        while client.inflight() < 2 {
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    let result = client.get(&cancel, &[oid!(1, 3, 6, 3)]).await;
    assert!(matches!(result, Err(Error::TooManyInflight { limit: 2 })));

    cancel.cancel();
    let _ = h1.await;
    let _ = h2.await;
}
