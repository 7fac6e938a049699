use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use kismet_bridge::config::KismetConfig;
use kismet_bridge::infra::kismet_client::KismetClient;
use kismet_bridge::BridgeError;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone, Default)]
struct FakeKismet {
    hits: Arc<tokio::sync::Mutex<Vec<String>>>,
    auth: Arc<tokio::sync::Mutex<Vec<String>>>,
    bodies: Arc<tokio::sync::Mutex<Vec<Value>>>,
}

impl FakeKismet {
    async fn hit(&self, path: String, headers: &HeaderMap) {
        self.hits.lock().await.push(path);
        if let Some(value) = headers.get("authorization").and_then(|v| v.to_str().ok()) {
            self.auth.lock().await.push(value.to_string());
        }
    }

    async fn hit_count(&self) -> usize {
        self.hits.lock().await.len()
    }
}

async fn system_status(State(fake): State<FakeKismet>, headers: HeaderMap) -> Json<Value> {
    fake.hit("/system/status.json".into(), &headers).await;
    Json(json!({"kismet.system.version": "2023-07-R1"}))
}

async fn recent_devices(
    State(fake): State<FakeKismet>,
    Path(ts): Path<String>,
    headers: HeaderMap,
) -> Json<Value> {
    fake.hit(format!("GET /devices/last-time/{}", ts), &headers).await;
    Json(json!([
        {"kismet.device.base.macaddr": "AA:BB:CC:DD:EE:FF"},
        {"kismet.device.base.macaddr": "11:22:33:44:55:66"}
    ]))
}

async fn recent_devices_with_fields(
    State(fake): State<FakeKismet>,
    Path(ts): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Json<Value> {
    fake.hit(format!("POST /devices/last-time/{}", ts), &headers).await;
    fake.bodies.lock().await.push(body);
    Json(json!([{"kismet.device.base.macaddr": "AA:BB:CC:DD:EE:FF"}]))
}

async fn device_by_key(
    State(fake): State<FakeKismet>,
    Path(key): Path<String>,
    headers: HeaderMap,
) -> Json<Value> {
    fake.hit(format!("key {}", key), &headers).await;
    Json(json!({"kismet.device.base.key": key}))
}

async fn devices_by_mac(
    State(fake): State<FakeKismet>,
    Path(mac): Path<String>,
    headers: HeaderMap,
) -> Json<Value> {
    fake.hit(format!("mac {}", mac), &headers).await;
    Json(json!([{"kismet.device.base.macaddr": mac}]))
}

fn healthy_api(fake: FakeKismet) -> Router {
    Router::new()
        .route("/system/status.json", get(system_status))
        .route(
            "/devices/last-time/:ts/devices.json",
            get(recent_devices).post(recent_devices_with_fields),
        )
        .route("/devices/by-key/:key/device.json", get(device_by_key))
        .route("/devices/by-mac/:mac/devices.json", get(devices_by_mac))
        .with_state(fake)
}

fn api_with_devices_handler<H, T>(fake: FakeKismet, handler: H) -> Router
where
    H: axum::handler::Handler<T, FakeKismet>,
    T: 'static,
{
    Router::new()
        .route("/system/status.json", get(system_status))
        .route("/devices/last-time/:ts/devices.json", get(handler))
        .with_state(fake)
}

async fn serve(router: Router) -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let server = axum::Server::from_tcp(listener)
        .unwrap()
        .serve(router.into_make_service());
    tokio::spawn(server);
    port
}

fn config(port: u16) -> KismetConfig {
    KismetConfig {
        port,
        timeout_secs: 1,
        ..KismetConfig::default()
    }
}

#[tokio::test]
async fn connect_probes_status_then_fetches_recent_devices() {
    let fake = FakeKismet::default();
    let port = serve(healthy_api(fake.clone())).await;

    let mut client = KismetClient::connect(&config(port), None).await.unwrap();
    assert_eq!(fake.hits.lock().await.as_slice(), ["/system/status.json"]);

    let devices = client.get_recent_devices(-60).await.unwrap();
    assert_eq!(devices.len(), 2);
    assert_eq!(fake.hits.lock().await[1], "GET /devices/last-time/-60");
    assert!(fake.auth.lock().await.is_empty());
}

#[tokio::test]
async fn basic_auth_is_sent_when_credentials_exist() {
    let fake = FakeKismet::default();
    let port = serve(healthy_api(fake.clone())).await;

    let credentials = Some(("admin".to_string(), "hunter2".to_string()));
    let mut client = KismetClient::connect(&config(port), credentials).await.unwrap();
    client.get_recent_devices(-60).await.unwrap();

    let auth = fake.auth.lock().await;
    assert_eq!(auth.len(), 2);
    assert!(auth.iter().all(|a| a == "Basic YWRtaW46aHVudGVyMg=="));
}

#[tokio::test]
async fn field_selection_posts_field_list() {
    let fake = FakeKismet::default();
    let port = serve(healthy_api(fake.clone())).await;
    let mut client = KismetClient::connect(&config(port), None).await.unwrap();

    let fields = vec![
        "kismet.device.base.macaddr".to_string(),
        "kismet.device.base.location".to_string(),
    ];
    let devices = client
        .get_recent_devices_with_fields(-30, &fields)
        .await
        .unwrap();
    assert_eq!(devices.len(), 1);
    assert_eq!(fake.hits.lock().await[1], "POST /devices/last-time/-30");
    assert_eq!(
        fake.bodies.lock().await[0],
        json!({"fields": ["kismet.device.base.macaddr", "kismet.device.base.location"]})
    );
}

#[tokio::test]
async fn device_key_cannot_traverse_routes() {
    let fake = FakeKismet::default();
    let port = serve(healthy_api(fake.clone())).await;
    let mut client = KismetClient::connect(&config(port), None).await.unwrap();

    let device = client.get_device_by_key("../..\\admin").await.unwrap();
    assert_eq!(device["kismet.device.base.key"], "....admin");
    assert_eq!(fake.hits.lock().await[1], "key ....admin");
}

#[tokio::test]
async fn devices_by_mac_round_trip() {
    let fake = FakeKismet::default();
    let port = serve(healthy_api(fake.clone())).await;
    let mut client = KismetClient::connect(&config(port), None).await.unwrap();

    let devices = client.get_devices_by_mac("AA:BB:CC:DD:EE:FF").await.unwrap();
    assert_eq!(devices[0]["kismet.device.base.macaddr"], "AA:BB:CC:DD:EE:FF");

    let before = fake.hit_count().await;
    assert!(matches!(
        client.get_devices_by_mac("not-a-mac").await,
        Err(BridgeError::Validation(_))
    ));
    assert_eq!(fake.hit_count().await, before);
}

#[tokio::test]
async fn tracked_fields_are_fetched() {
    let fake = FakeKismet::default();
    let router = healthy_api(fake.clone()).route(
        "/system/tracked_fields.json",
        get(|| async { Json(json!({"kismet.device.base.macaddr": "MAC address"})) }),
    );
    let port = serve(router).await;
    let mut client = KismetClient::connect(&config(port), None).await.unwrap();

    let fields = client.get_tracked_fields().await.unwrap();
    assert_eq!(fields["kismet.device.base.macaddr"], "MAC address");
}

#[tokio::test]
async fn unreachable_source_fails_construction() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let err = KismetClient::connect(&config(port), None).await.unwrap_err();
    assert!(matches!(err, BridgeError::Connectivity(_)), "got {:?}", err);
}

#[tokio::test]
async fn rejected_probe_fails_construction() {
    let router = Router::new().route(
        "/system/status.json",
        get(|| async { StatusCode::UNAUTHORIZED }),
    );
    let port = serve(router).await;

    let err = KismetClient::connect(&config(port), None).await.unwrap_err();
    assert!(matches!(err, BridgeError::Protocol { status: 401 }));
}

#[tokio::test]
async fn server_errors_map_to_protocol_errors() {
    async fn failing() -> impl IntoResponse {
        (StatusCode::INTERNAL_SERVER_ERROR, "boom")
    }
    let port = serve(api_with_devices_handler(FakeKismet::default(), failing)).await;
    let mut client = KismetClient::connect(&config(port), None).await.unwrap();

    let err = client.get_recent_devices(-60).await.unwrap_err();
    assert!(matches!(err, BridgeError::Protocol { status: 500 }));
    assert_eq!(err.to_string(), "HTTP error: 500");
}

#[tokio::test]
async fn non_json_body_is_malformed() {
    async fn garbage() -> impl IntoResponse {
        "<html>not json</html>"
    }
    let port = serve(api_with_devices_handler(FakeKismet::default(), garbage)).await;
    let mut client = KismetClient::connect(&config(port), None).await.unwrap();

    let err = client.get_recent_devices(-60).await.unwrap_err();
    assert!(matches!(err, BridgeError::MalformedResponse(_)));
}

#[tokio::test]
async fn non_array_device_list_is_malformed() {
    async fn object() -> Json<Value> {
        Json(json!({"error": "not a list"}))
    }
    let port = serve(api_with_devices_handler(FakeKismet::default(), object)).await;
    let mut client = KismetClient::connect(&config(port), None).await.unwrap();

    let err = client.get_recent_devices(-60).await.unwrap_err();
    assert!(matches!(err, BridgeError::MalformedResponse(_)));
}

#[tokio::test]
async fn slow_responses_time_out() {
    async fn slow() -> Json<Value> {
        tokio::time::sleep(Duration::from_secs(3)).await;
        Json(json!([]))
    }
    let port = serve(api_with_devices_handler(FakeKismet::default(), slow)).await;
    let mut client = KismetClient::connect(&config(port), None).await.unwrap();
    assert_eq!(client.timeout(), Duration::from_secs(1));

    let err = client.get_recent_devices(-60).await.unwrap_err();
    assert!(matches!(err, BridgeError::Timeout(1)), "got {:?}", err);
}

#[tokio::test]
async fn rate_limited_requests_never_reach_the_server() {
    let fake = FakeKismet::default();
    let port = serve(healthy_api(fake.clone())).await;
    let cfg = KismetConfig {
        max_requests_per_minute: 2,
        ..config(port)
    };
    let mut client = KismetClient::connect(&cfg, None).await.unwrap();

    client.get_recent_devices(-60).await.unwrap();
    let err = client.get_recent_devices(-60).await.unwrap_err();
    assert!(matches!(err, BridgeError::RateLimitExceeded { limit: 2 }));
    assert_eq!(fake.hit_count().await, 2);
}

#[tokio::test]
async fn future_timestamps_are_rejected_before_io() {
    let fake = FakeKismet::default();
    let port = serve(healthy_api(fake.clone())).await;
    let mut client = KismetClient::connect(&config(port), None).await.unwrap();

    let future = chrono::Utc::now().timestamp() + 3600;
    let err = client.get_recent_devices(future).await.unwrap_err();
    assert!(matches!(err, BridgeError::Validation(_)));
    assert_eq!(fake.hit_count().await, 1);
}

#[tokio::test]
async fn remote_hosts_are_rejected_at_construction() {
    for host in ["192.168.1.100", "evil.com", "10.0.0.1"] {
        let cfg = KismetConfig {
            host: host.to_string(),
            ..KismetConfig::default()
        };
        let err = KismetClient::connect(&cfg, None).await.unwrap_err();
        assert!(matches!(err, BridgeError::Configuration(_)));
    }
}
