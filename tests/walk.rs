//! Walk engine behavior: termination, ordering, and misbehaving agents.

mod common;

use common::{AgentBehavior, MockAgent};
use edgesnmp::{oid, Client, Error, Value, Version};
use tokio_util::sync::CancellationToken;

async fn connect(agent: &MockAgent, version: Version) -> Client {
    Client::builder(agent.addr().to_string())
        .version(version)
        .auto_reconnect(false)
        .connect(&CancellationToken::new())
        .await
        .unwrap()
}

#[tokio::test]
async fn walk_if_index_column_v2c() {
    let agent = MockAgent::with_data(common::if_table_mib()).await;
    let client = connect(&agent, Version::V2c).await;
    let cancel = CancellationToken::new();

    let results = client
        .walk(&cancel, &oid!(1, 3, 6, 1, 2, 1, 2, 2, 1, 1))
        .await
        .unwrap();

    // Exactly the three ifIndex rows, in index order
    assert_eq!(results.len(), 3);
    for (i, vb) in results.iter().enumerate() {
        assert_eq!(vb.oid, oid!(1, 3, 6, 1, 2, 1, 2, 2, 1, 1, (i as u32) + 1));
        assert_eq!(vb.value, Value::Integer(i as i32 + 1));
    }
}

#[tokio::test]
async fn walk_if_index_column_v1() {
    let agent = MockAgent::with_data(common::if_table_mib()).await;
    let client = connect(&agent, Version::V1).await;
    let cancel = CancellationToken::new();

    let results = client
        .walk(&cancel, &oid!(1, 3, 6, 1, 2, 1, 2, 2, 1, 1))
        .await
        .unwrap();

    assert_eq!(results.len(), 3);
    // v1 walks one GETNEXT at a time
    assert!(agent.received() >= 4);
}

#[tokio::test]
async fn walk_whole_table_stops_at_next_subtree() {
    let agent = MockAgent::with_data(common::if_table_mib()).await;
    let client = connect(&agent, Version::V2c).await;
    let cancel = CancellationToken::new();

    let results = client
        .walk(&cancel, &oid!(1, 3, 6, 1, 2, 1, 2, 2))
        .await
        .unwrap();

    // Three ifIndex rows plus ifDescr.1; the 1.3.6.1.2.1.4 entry is
    // outside the root and unreported
    assert_eq!(results.len(), 4);
    assert_eq!(results[3].value.as_str(), Some("eth0"));
    let root = oid!(1, 3, 6, 1, 2, 1, 2, 2);
    assert!(results.iter().all(|vb| vb.oid.starts_with(&root)));
}

#[tokio::test]
async fn walk_empty_subtree_yields_nothing() {
    let agent = MockAgent::with_data(common::if_table_mib()).await;
    let client = connect(&agent, Version::V2c).await;
    let cancel = CancellationToken::new();

    let results = client
        .walk(&cancel, &oid!(1, 3, 6, 1, 2, 1, 9, 9))
        .await
        .unwrap();
    assert!(results.is_empty());
}

#[tokio::test]
async fn walk_past_end_of_mib_terminates_v1() {
    // Root sorts after every MIB entry: v1 answers noSuchName at once
    let agent = MockAgent::with_data(common::if_table_mib()).await;
    let client = connect(&agent, Version::V1).await;
    let cancel = CancellationToken::new();

    let results = client.walk(&cancel, &oid!(1, 3, 9)).await.unwrap();
    assert!(results.is_empty());
}

#[tokio::test]
async fn walk_func_callback_error_halts() {
    let agent = MockAgent::with_data(common::if_table_mib()).await;
    let client = connect(&agent, Version::V2c).await;
    let cancel = CancellationToken::new();

    let mut seen = 0;
    let result = client
        .walk_func(&cancel, &oid!(1, 3, 6, 1, 2, 1, 2, 2), |_vb| {
            seen += 1;
            if seen == 2 {
                Err(Error::Config("stop here".into()))
            } else {
                Ok(())
            }
        })
        .await;

    assert!(matches!(result, Err(Error::Config(_))));
    assert_eq!(seen, 2);
}

#[tokio::test]
async fn walk_func_visits_in_order() {
    let agent = MockAgent::with_data(common::if_table_mib()).await;
    let client = connect(&agent, Version::V2c).await;
    let cancel = CancellationToken::new();

    let mut oids = Vec::new();
    client
        .walk_func(&cancel, &oid!(1, 3, 6, 1, 2, 1, 2, 2, 1, 1), |vb| {
            oids.push(vb.oid);
            Ok(())
        })
        .await
        .unwrap();

    let mut sorted = oids.clone();
    sorted.sort();
    assert_eq!(oids, sorted);
    assert_eq!(oids.len(), 3);
}

#[tokio::test]
async fn non_advancing_agent_aborts_walk() {
    // The stuck agent echoes the requested OID back forever
    let agent = MockAgent::with_behavior(
        common::if_table_mib(),
        AgentBehavior {
            stuck: true,
            ..Default::default()
        },
    )
    .await;
    let client = connect(&agent, Version::V2c).await;
    let cancel = CancellationToken::new();

    let result = client.walk(&cancel, &oid!(1, 3, 6, 1, 2, 1, 2, 2)).await;
    assert!(matches!(result, Err(Error::NonMonotonicWalk { .. })));
}

#[tokio::test]
async fn walk_respects_max_repetitions() {
    let agent = MockAgent::with_data(common::if_table_mib()).await;
    let client = Client::builder(agent.addr().to_string())
        .max_repetitions(2)
        .auto_reconnect(false)
        .connect(&CancellationToken::new())
        .await
        .unwrap();
    let cancel = CancellationToken::new();

    let results = client
        .walk(&cancel, &oid!(1, 3, 6, 1, 2, 1, 2, 2, 1, 1))
        .await
        .unwrap();

    assert_eq!(results.len(), 3);
    // 3 rows at 2 repetitions per request needs at least 2 requests
    assert!(agent.received() >= 2);
}
