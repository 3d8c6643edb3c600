//! End-to-end test: a real gRPC client streaming heartbeats to a bound
//! server, with a recording HTTP endpoint standing in for the webhook
//! receiver.
//!
//! Runs on real time, so the engine tunables are shrunk but kept generous
//! enough for a loaded CI machine.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::post;
use axum::Router;
use tokio::sync::{mpsc, watch};
use tokio_stream::wrappers::ReceiverStream;
use uuid::Uuid;
use vakeel_engine::EngineConfig;
use vakeel_proto::way::state_service_client::StateServiceClient;
use vakeel_proto::way::UpdateRequest;
use vakeel_server::{AppBuilder, Config};

#[derive(Clone, Default)]
struct RecordedPosts {
    posts: Arc<Mutex<Vec<(String, String)>>>,
}

impl RecordedPosts {
    fn push(&self, headers: &HeaderMap, body: String) {
        let content_type = headers
            .get("content-type")
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();
        self.posts.lock().unwrap().push((content_type, body));
    }

    fn bodies(&self) -> Vec<String> {
        self.posts
            .lock()
            .unwrap()
            .iter()
            .map(|(_, body)| body.clone())
            .collect()
    }

    fn all(&self) -> Vec<(String, String)> {
        self.posts.lock().unwrap().clone()
    }
}

async fn record(State(state): State<RecordedPosts>, headers: HeaderMap, body: String) {
    state.push(&headers, body);
}

/// Records like [`record`], but holds the response for a second first.
/// Keeps the drainer parked inside a delivery so the ingress channel can
/// fill up behind it.
async fn slow_record(State(state): State<RecordedPosts>, headers: HeaderMap, body: String) {
    tokio::time::sleep(Duration::from_secs(1)).await;
    state.push(&headers, body);
}

/// Binds a recording webhook endpoint on an ephemeral port.
async fn start_sink(router: Router<RecordedPosts>) -> (String, RecordedPosts) {
    let recorded = RecordedPosts::default();
    let router = router.with_state(recorded.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let target = format!("http://{}/hook", listener.local_addr().unwrap());

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    (target, recorded)
}

async fn start_webhook_sink() -> (String, RecordedPosts) {
    start_sink(Router::new().route("/hook", post(record))).await
}

async fn wait_for(condition: impl Fn() -> bool) {
    for _ in 0..1000 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not met in time");
}

fn service_id() -> Uuid {
    Uuid::parse_str("11111111-1111-1111-1111-111111111111").unwrap()
}

#[tokio::test]
async fn heartbeat_lifecycle_over_grpc() {
    let (target, recorded) = start_webhook_sink().await;

    let config: Config = serde_yaml::from_str(&format!(
        r#"
grpc:
  host: 127.0.0.1
  port: 0
webhooks:
  - id: {}
    target: {}
"#,
        service_id(),
        target
    ))
    .unwrap();

    let app = AppBuilder::new(config)
        .engine_config(EngineConfig {
            up_ttl: Duration::from_secs(2),
            retry_ttl: Duration::from_millis(500),
            notify_timeout: Duration::from_secs(2),
            max_attempts: 5,
            sweep_interval: Duration::from_millis(100),
        })
        .build()
        .await
        .unwrap();
    let addr = app.local_addr();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let server = tokio::spawn(app.serve_with_shutdown(shutdown_rx));

    let mut client = StateServiceClient::connect(format!("http://{}", addr))
        .await
        .unwrap();

    // Three heartbeats on one stream, each acknowledged, produce exactly
    // one up notification.
    {
        let (tx, rx) = mpsc::channel(4);
        let mut acks = client
            .update(ReceiverStream::new(rx))
            .await
            .unwrap()
            .into_inner();

        for _ in 0..3 {
            tx.send(UpdateRequest {
                ids: vec![service_id().into()],
            })
            .await
            .unwrap();
            assert!(acks.message().await.unwrap().is_some());
        }

        wait_for(|| !recorded.bodies().is_empty()).await;
        let posts = recorded.all();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].0, "application/json");
        assert_eq!(posts[0].1, r#"{"trigger":"up"}"#);
    }

    // A heartbeat for an unconfigured id is acknowledged but never
    // notified.
    {
        let (tx, rx) = mpsc::channel(4);
        let mut acks = client
            .update(ReceiverStream::new(rx))
            .await
            .unwrap()
            .into_inner();

        tx.send(UpdateRequest {
            ids: vec![Uuid::new_v4().into()],
        })
        .await
        .unwrap();
        assert!(acks.message().await.unwrap().is_some());

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(recorded.bodies().len(), 1);
    }

    // All streams are closed now; once the entry expires the webhook
    // receives the down edge.
    wait_for(|| recorded.bodies().len() == 2).await;
    assert_eq!(recorded.bodies()[1], r#"{"trigger":"down"}"#);

    // A fresh heartbeat raises the service again.
    {
        let (tx, rx) = mpsc::channel(4);
        let mut acks = client
            .update(ReceiverStream::new(rx))
            .await
            .unwrap()
            .into_inner();

        tx.send(UpdateRequest {
            ids: vec![service_id().into()],
        })
        .await
        .unwrap();
        assert!(acks.message().await.unwrap().is_some());

        wait_for(|| recorded.bodies().len() == 3).await;
        assert_eq!(recorded.bodies()[2], r#"{"trigger":"up"}"#);
    }

    shutdown_tx.send(true).unwrap();
    server.await.unwrap().unwrap();
}

#[tokio::test]
async fn small_ingress_buffer_stalls_acks_behind_slow_delivery() {
    let (target, recorded) = start_sink(Router::new().route("/hook", post(slow_record))).await;

    let config: Config = serde_yaml::from_str(&format!(
        r#"
grpc:
  host: 127.0.0.1
  port: 0
webhooks:
  - id: {}
    target: {}
"#,
        service_id(),
        target
    ))
    .unwrap();

    let app = AppBuilder::new(config)
        .ingress_buffer(1)
        .build()
        .await
        .unwrap();
    let addr = app.local_addr();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let server = tokio::spawn(app.serve_with_shutdown(shutdown_rx));

    let mut client = StateServiceClient::connect(format!("http://{}", addr))
        .await
        .unwrap();

    let (tx, rx) = mpsc::channel(4);
    let mut acks = client
        .update(ReceiverStream::new(rx))
        .await
        .unwrap()
        .into_inner();

    // Four heartbeats in one batch. The first delivery parks the drainer
    // inside the slow webhook, the single buffer slot takes the second,
    // and the receive loop stalls on the third. The acknowledgement can
    // only arrive after the webhook responds and the channel drains.
    tx.send(UpdateRequest {
        ids: vec![service_id().into(); 4],
    })
    .await
    .unwrap();

    let early = tokio::time::timeout(Duration::from_millis(300), acks.message()).await;
    assert!(
        early.is_err(),
        "acknowledgement arrived while the ingress channel was full"
    );

    let ack = tokio::time::timeout(Duration::from_secs(5), acks.message())
        .await
        .expect("acknowledgement after the channel drained")
        .unwrap();
    assert!(ack.is_some());

    // One delivery for the whole batch; the repeats were refreshes.
    assert_eq!(recorded.bodies(), vec![r#"{"trigger":"up"}"#.to_string()]);

    shutdown_tx.send(true).unwrap();
    server.await.unwrap().unwrap();
}

#[tokio::test]
async fn build_fails_on_occupied_port() {
    let occupied = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = occupied.local_addr().unwrap().port();

    let config: Config = serde_yaml::from_str(&format!(
        r#"
grpc:
  host: 127.0.0.1
  port: {}
"#,
        port
    ))
    .unwrap();

    let result = AppBuilder::new(config).build().await;
    assert!(matches!(result, Err(vakeel_server::Error::Bind { .. })));
}

#[tokio::test]
async fn build_rejects_unsupported_network() {
    let config: Config = serde_yaml::from_str("grpc: {network: udp, host: 127.0.0.1, port: 0}")
        .unwrap();

    let result = AppBuilder::new(config).build().await;
    assert!(matches!(result, Err(vakeel_server::Error::Config(_))));
}
