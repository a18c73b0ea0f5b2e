#[path = "../common/mod.rs"]
mod common;

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rowgraph::graph::TypeGraph;
use rowgraph::live::broker::encode;
use rowgraph::live::{
    BrokerMessage, ChangeEvent, ChangeOp, FeedResult, LiveConfig, LiveQueries, LiveQuery,
    LiveUpdate, RetryPolicy, TableId, TopicConsumer,
};
use rowgraph::query::assemble::Row;
use rowgraph::query::{
    compile, Executable, OutputColumn, QueryError, QueryResult, RowSource, Selection,
};
use rowgraph::sql::Dialect;
use serde_json::json;
use tokio::sync::mpsc;
use tokio::time::timeout;

/// Wraps the shop database, failing the first `failures` fetches.
struct Flaky {
    inner: rowgraph::query::SqliteSource,
    failures: usize,
    error: fn() -> QueryError,
    calls: AtomicUsize,
}

#[async_trait]
impl RowSource for Flaky {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    async fn fetch(&self, sql: &str, columns: &[OutputColumn]) -> QueryResult<Vec<Row>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            return Err((self.error)());
        }
        self.inner.fetch(sql, columns).await
    }
}

async fn flaky(failures: usize, error: fn() -> QueryError) -> Arc<Flaky> {
    Arc::new(Flaky {
        inner: common::shop().await,
        failures,
        error,
        calls: AtomicUsize::new(0),
    })
}

fn prepare(source: Arc<dyn RowSource>, text: &str) -> Executable {
    let graph = TypeGraph::from_schema(&common::shop_schema()).unwrap();
    let compiled = compile(
        &graph,
        &Selection::parse(text).unwrap(),
        Some(common::NAMESPACE),
    )
    .unwrap();
    Executable::new(compiled, source)
}

fn changed(schema: &str, table: &str) -> ChangeEvent {
    ChangeEvent::new("shop", schema, table, ChangeOp::Update)
}

fn shop_feed() -> LiveConfig {
    LiveConfig {
        source_name: "shop".into(),
        ..LiveConfig::default()
    }
}

fn fast_retry(max_retries: u32) -> LiveConfig {
    LiveConfig {
        retry: RetryPolicy {
            max_retries,
            backoff: Duration::from_millis(1),
        },
        ..LiveConfig::default()
    }
}

async fn next(live: &mut LiveQuery) -> LiveUpdate {
    timeout(Duration::from_secs(5), live.next())
        .await
        .expect("timed out waiting for a delivery")
        .expect("live query stopped")
}

async fn assert_quiet(live: &mut LiveQuery) {
    assert!(
        timeout(Duration::from_millis(100), live.next()).await.is_err(),
        "unexpected delivery"
    );
}

fn rows(update: LiveUpdate) -> Vec<serde_json::Value> {
    match update {
        LiveUpdate::Data(rows) => rows,
        LiveUpdate::Error(err) => panic!("unexpected error delivery: {:?}", err),
    }
}

#[tokio::test]
async fn test_redelivers_only_for_touched_tables() {
    let source = flaky(0, || QueryError::PoolTimeout).await;
    let live = LiveQueries::new(LiveConfig::default());
    let mut query = live.subscribe(prepare(source.clone(), "{ customers { id } }"), "main");

    assert_eq!(rows(next(&mut query).await).len(), 4);

    common::execute(
        &source.inner,
        "INSERT INTO customers (id, name, address) VALUES (5, 'Ed', NULL)",
    )
    .await;
    live.feed().publish(changed("main", "customers"));
    assert_eq!(rows(next(&mut query).await).len(), 5);

    live.feed().publish(changed("main", "addresses"));
    live.feed().publish(changed("other", "customers"));
    assert_quiet(&mut query).await;
    assert_eq!(source.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_joined_table_counts_as_touched() {
    let source = flaky(0, || QueryError::PoolTimeout).await;
    let live = LiveQueries::new(LiveConfig::default());
    let mut query = live.subscribe(
        prepare(source.clone(), "{ customers { id address { street } } }"),
        "main",
    );
    assert_eq!(
        live.tables(query.id()).unwrap(),
        [TableId::new("main", "addresses"), TableId::new("main", "customers")]
            .into_iter()
            .collect::<HashSet<_>>()
    );

    let first = rows(next(&mut query).await);
    assert_eq!(first[0], json!({"id": 1, "address": {"street": "Main St"}}));

    common::execute(&source.inner, "UPDATE addresses SET street = 'High St' WHERE id = 1").await;
    live.feed().publish(changed("main", "addresses"));

    let second = rows(next(&mut query).await);
    assert_eq!(second[0], json!({"id": 1, "address": {"street": "High St"}}));
}

#[tokio::test]
async fn test_queued_events_coalesce() {
    let source = flaky(0, || QueryError::PoolTimeout).await;
    let live = LiveQueries::new(LiveConfig::default());
    let mut query = live.subscribe(prepare(source.clone(), "{ customers { id } }"), "main");
    next(&mut query).await;

    for _ in 0..3 {
        live.feed().publish(changed("main", "customers"));
    }
    next(&mut query).await;
    assert_quiet(&mut query).await;
    assert_eq!(source.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_refetch_error_keeps_subscription_open() {
    let source = flaky(1, || QueryError::Decode {
        column: "t0_id".into(),
        message: "bad value".into(),
    })
    .await;
    let live = LiveQueries::new(fast_retry(3));
    let mut query = live.subscribe(prepare(source.clone(), "{ customers { id } }"), "main");

    match next(&mut query).await {
        LiveUpdate::Error(err) => assert_eq!(err.kind, "decode"),
        other => panic!("expected an error delivery, got {:?}", other),
    }
    // Decode errors are not retried.
    assert_eq!(source.calls.load(Ordering::SeqCst), 1);

    live.feed().publish(changed("main", "customers"));
    assert_eq!(rows(next(&mut query).await).len(), 4);
    assert!(live.is_active(query.id()));
}

#[tokio::test]
async fn test_resource_exhaustion_backs_off() {
    let source = flaky(2, || QueryError::PoolTimeout).await;
    let live = LiveQueries::new(fast_retry(3));
    let mut query = live.subscribe(prepare(source.clone(), "{ customers { id } }"), "main");

    assert_eq!(rows(next(&mut query).await).len(), 4);
    assert_eq!(source.calls.load(Ordering::SeqCst), 3);

    let source = flaky(5, || QueryError::PoolTimeout).await;
    let live = LiveQueries::new(fast_retry(1));
    let mut query = live.subscribe(prepare(source.clone(), "{ customers { id } }"), "main");

    match next(&mut query).await {
        LiveUpdate::Error(err) => assert_eq!(err.kind, "pool_timeout"),
        other => panic!("expected an error delivery, got {:?}", other),
    }
    assert_eq!(source.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_teardown_releases_only_that_query() {
    let source = flaky(0, || QueryError::PoolTimeout).await;
    let live = LiveQueries::new(LiveConfig::default());

    let mut kept = live.subscribe(prepare(source.clone(), "{ customers { id } }"), "main");
    let mut dropped = live.subscribe(prepare(source.clone(), "{ addresses { id } }"), "main");
    let mut cancelled = live.subscribe(prepare(source.clone(), "{ customers { name } }"), "main");
    next(&mut kept).await;
    next(&mut dropped).await;
    next(&mut cancelled).await;
    assert_eq!(live.len(), 3);

    let dropped_id = dropped.id();
    drop(dropped);
    assert!(live.cancel(cancelled.id()));
    assert!(!live.cancel(cancelled.id()));
    assert!(
        timeout(Duration::from_secs(5), cancelled.next())
            .await
            .unwrap()
            .is_none()
    );

    // The dropped query's task notices its closed channel on its own.
    timeout(Duration::from_secs(5), async {
        while live.is_active(dropped_id) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    live.feed().publish(changed("main", "customers"));
    assert_eq!(rows(next(&mut kept).await).len(), 4);
    assert_eq!(live.len(), 1);
}

#[tokio::test]
async fn test_embedded_feed_drives_live_queries() {
    let source = flaky(0, || QueryError::PoolTimeout).await;
    let live = LiveQueries::new(shop_feed());
    let (emitter, _reader) = live.attach_embedded(8);
    let mut query = live.subscribe(prepare(source.clone(), "{ customers { id } }"), "main");
    next(&mut query).await;

    common::execute(&source.inner, "DELETE FROM customers WHERE id = 4").await;
    emitter.emit("main", "customers", ChangeOp::Delete).await.unwrap();
    assert_eq!(rows(next(&mut query).await).len(), 3);
}

struct ChannelConsumer {
    topics: Vec<String>,
    rx: mpsc::Receiver<BrokerMessage>,
}

#[async_trait]
impl TopicConsumer for ChannelConsumer {
    async fn subscribe(&mut self, topics: &[String]) -> FeedResult<()> {
        self.topics = topics.to_vec();
        Ok(())
    }

    async fn poll(&mut self) -> FeedResult<Option<BrokerMessage>> {
        Ok(self.rx.recv().await)
    }
}

#[tokio::test]
async fn test_broker_feed_drives_live_queries() {
    let source = flaky(0, || QueryError::PoolTimeout).await;
    let (tx, rx) = mpsc::channel(8);
    let consumer = ChannelConsumer { topics: vec![], rx };
    let tables = [TableId::new("main", "addresses"), TableId::new("main", "customers")];

    let live = LiveQueries::new(shop_feed());
    let _reader = live.attach_broker(consumer, &tables);
    let mut query = live.subscribe(prepare(source.clone(), "{ addresses { id } }"), "main");
    next(&mut query).await;

    // An undecodable message is skipped without stopping the reader.
    tx.send(BrokerMessage {
        topic: "shop.main.addresses".into(),
        payload: b"{broken".to_vec(),
    })
    .await
    .unwrap();

    common::execute(&source.inner, "INSERT INTO addresses (id, street) VALUES (4, 'New Rd')").await;
    tx.send(encode(&ChangeEvent::new("shop", "main", "addresses", ChangeOp::Create)))
        .await
        .unwrap();

    assert_eq!(rows(next(&mut query).await).len(), 4);
}

#[tokio::test]
async fn test_attached_sources_use_configured_name() {
    let live = LiveQueries::new(LiveConfig {
        channel_capacity: 2,
        ..shop_feed()
    });
    let mut events = live.feed().subscribe();

    let (emitter, _reader) = live.attach_embedded(4);
    emitter.emit("main", "customers", ChangeOp::Create).await.unwrap();

    let event = timeout(Duration::from_secs(5), events.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(event.source, "shop");
    assert_eq!(event.topic(), "shop.main.customers");

    // The feed is sized by the configured capacity: a third unread event
    // makes this receiver lag.
    for _ in 0..3 {
        live.feed().publish(changed("main", "addresses"));
    }
    assert!(matches!(
        events.recv().await,
        Err(tokio::sync::broadcast::error::RecvError::Lagged(1))
    ));
}
