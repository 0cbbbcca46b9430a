//! End-to-end tests of the transport client against an in-process mock of the
//! ingestion API.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::{
    Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, Method as HttpMethod, StatusCode, Uri, header},
    response::{IntoResponse, Response},
};
use clap::Parser;
use serde_json::{Value, json};

use jirafe_cli::cli::{self, Cli};
use jirafe_cli::event::{build_batch, build_order_event, build_page_view};
use jirafe_cli::ui::{RecordingReporter, Reported};
use jirafe_cli::{
    ClientConfig, Credentials, Error, EventData, JirafeClient, MemorySettings, Method, Params,
    ProductData,
};

/// A request as seen by the mock server
#[derive(Debug, Clone)]
struct Recorded {
    method: String,
    path: String,
    query: Option<String>,
    authorization: Option<String>,
    content_type: Option<String>,
    body: Value,
}

#[derive(Clone)]
struct MockState {
    hits: Arc<Mutex<Vec<Recorded>>>,
    status: StatusCode,
    content_type: &'static str,
    body: String,
}

struct MockServer {
    addr: SocketAddr,
    hits: Arc<Mutex<Vec<Recorded>>>,
}

impl MockServer {
    async fn start(status: StatusCode, content_type: &'static str, body: &str) -> Self {
        let hits = Arc::new(Mutex::new(Vec::new()));
        let state = MockState {
            hits: hits.clone(),
            status,
            content_type,
            body: body.to_string(),
        };
        let app = Router::new().fallback(record).with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, hits }
    }

    async fn json(status: StatusCode, body: Value) -> Self {
        Self::start(status, "application/json", &body.to_string()).await
    }

    fn config(&self) -> ClientConfig {
        ClientConfig::with_base_url(format!("http://{}/v2", self.addr))
    }

    fn client(&self) -> JirafeClient {
        JirafeClient::with_config(&credentials(), self.config()).unwrap()
    }

    fn hits(&self) -> Vec<Recorded> {
        self.hits.lock().unwrap().clone()
    }

    fn only_hit(&self) -> Recorded {
        let hits = self.hits();
        assert_eq!(hits.len(), 1, "expected exactly one request: {:?}", hits);
        hits.into_iter().next().unwrap()
    }
}

async fn record(
    State(state): State<MockState>,
    method: HttpMethod,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let header_str = |name: header::HeaderName| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    let body = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&body).into_owned()))
    };

    state.hits.lock().unwrap().push(Recorded {
        method: method.to_string(),
        path: uri.path().to_string(),
        query: uri.query().map(str::to_string),
        authorization: header_str(header::AUTHORIZATION),
        content_type: header_str(header::CONTENT_TYPE),
        body,
    });

    (
        state.status,
        [(header::CONTENT_TYPE, state.content_type)],
        state.body.clone(),
    )
        .into_response()
}

fn credentials() -> Credentials {
    Credentials::new("s1", "tok_test_123456")
}

#[tokio::test]
async fn missing_credentials_issue_no_request() {
    let server = MockServer::json(StatusCode::OK, json!({ "ok": true })).await;

    for creds in [Credentials::new("", "tok"), Credentials::new("s1", "")] {
        let result = JirafeClient::with_config(&creds, server.config());
        assert!(matches!(result, Err(Error::NotConfigured)));
    }

    let mut store = MemorySettings::new();
    let mut reporter = RecordingReporter::default();
    let cli = Cli::try_parse_from(["jirafe", "track", "pageview", "/home"]).unwrap();
    assert!(!cli::run(cli.command, server.config(), &mut store, &mut reporter).await);

    assert!(server.hits().is_empty());
}

#[tokio::test]
async fn post_returns_server_json_exactly() {
    let server = MockServer::json(StatusCode::OK, json!({ "ok": true })).await;
    let client = server.client();

    let body = json!({ "type": "pageview", "url": "/home" });
    let response = client
        .request(Method::Post, "/s1/events", Some(&body))
        .await
        .unwrap();
    assert_eq!(response, json!({ "ok": true }));

    let hit = server.only_hit();
    assert_eq!(hit.method, "POST");
    assert_eq!(hit.path, "/v2/s1/events");
    assert_eq!(hit.authorization.as_deref(), Some("Bearer tok_test_123456"));
    assert_eq!(hit.content_type.as_deref(), Some("application/json"));
    assert_eq!(hit.body, body);
}

#[tokio::test]
async fn track_product_sends_envelope_under_site() {
    let server = MockServer::json(StatusCode::OK, json!({ "id": "evt_1" })).await;
    let client = server.client();

    client
        .track_product(
            "view",
            ProductData {
                product_id: "sku-1".into(),
                name: None,
                price: Some(9.5),
            },
        )
        .await
        .unwrap();

    let hit = server.only_hit();
    assert_eq!(hit.path, "/v2/s1/events");
    assert_eq!(
        hit.body,
        json!({ "type": "product_view", "product_id": "sku-1", "price": 9.5 })
    );
}

#[tokio::test]
async fn batch_is_one_call_in_order() {
    let server = MockServer::json(StatusCode::OK, json!({ "accepted": 3 })).await;
    let client = server.client();

    let batch = build_batch(vec![
        build_page_view(EventData::new().with("url", "/a")),
        build_order_event(EventData::new().with("order_id", "o-1")),
        build_page_view(EventData::new().with("url", "/a")),
    ]);
    let response = client.track_batch(&batch).await.unwrap();
    assert_eq!(response, json!({ "accepted": 3 }));

    let hit = server.only_hit();
    assert_eq!(hit.method, "POST");
    assert_eq!(hit.path, "/v2/s1/batch");
    assert_eq!(
        hit.body,
        json!({ "events": [
            { "type": "pageview", "url": "/a" },
            { "type": "order", "order_id": "o-1" },
            { "type": "pageview", "url": "/a" }
        ]})
    );
}

#[tokio::test]
async fn server_message_is_the_error_message() {
    let server =
        MockServer::json(StatusCode::BAD_REQUEST, json!({ "message": "invalid field" })).await;

    let err = server
        .client()
        .track_order(EventData::new().with("order_id", "o-1"))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Request(_)));
    assert_eq!(err.to_string(), "invalid field");
}

#[tokio::test]
async fn non_json_error_body_gets_generic_message() {
    let server = MockServer::start(
        StatusCode::INTERNAL_SERVER_ERROR,
        "text/plain",
        "upstream exploded",
    )
    .await;

    let err = server
        .client()
        .request(Method::Post, "/s1/events", Some(&json!({ "type": "order" })))
        .await
        .unwrap_err();

    let message = err.to_string();
    assert!(message.starts_with("Request failed: "), "{}", message);
    assert!(message.contains("500"), "{}", message);
}

#[tokio::test]
async fn error_body_without_message_gets_generic_message() {
    let server = MockServer::json(StatusCode::UNAUTHORIZED, json!({ "error": "bad token" })).await;

    let err = server.client().get_stats(&Params::new()).await.unwrap_err();
    let message = err.to_string();
    assert!(message.starts_with("Request failed: "), "{}", message);
    assert!(message.contains("401"), "{}", message);
}

#[tokio::test]
async fn connection_failure_is_a_request_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = JirafeClient::with_config(
        &credentials(),
        ClientConfig::with_base_url(format!("http://{}/v2", addr)),
    )
    .unwrap();

    let err = client.get_analytics(&Params::new()).await.unwrap_err();
    assert!(matches!(err, Error::Request(_)));
    assert!(err.to_string().starts_with("Request failed: "));
}

#[tokio::test]
async fn analytics_without_params_has_no_query() {
    let server = MockServer::json(StatusCode::OK, json!({ "visits": 10 })).await;

    let response = server.client().get_analytics(&Params::new()).await.unwrap();
    assert_eq!(response, json!({ "visits": 10 }));

    let hit = server.only_hit();
    assert_eq!(hit.method, "GET");
    assert_eq!(hit.path, "/v2/s1/analytics");
    assert_eq!(hit.query, None);
    assert_eq!(hit.body, Value::Null);
    assert_eq!(hit.authorization.as_deref(), Some("Bearer tok_test_123456"));
    assert_eq!(hit.content_type.as_deref(), Some("application/json"));
}

#[tokio::test]
async fn analytics_forwards_params_as_query() {
    let server = MockServer::json(StatusCode::OK, json!({ "visits": 3 })).await;

    let mut params = Params::new();
    params.insert("from".into(), json!("2024-01-01"));
    server.client().get_analytics(&params).await.unwrap();

    let hit = server.only_hit();
    assert_eq!(hit.query.as_deref(), Some("from=2024-01-01"));
}

#[tokio::test]
async fn stats_path_and_numeric_params() {
    let server = MockServer::json(StatusCode::OK, json!({ "orders": 1 })).await;

    let mut params = Params::new();
    params.insert("limit".into(), json!(5));
    server.client().get_stats(&params).await.unwrap();

    let hit = server.only_hit();
    assert_eq!(hit.path, "/v2/s1/stats");
    assert_eq!(hit.query.as_deref(), Some("limit=5"));
}

#[tokio::test]
async fn empty_success_body_is_null() {
    let server = MockServer::start(StatusCode::ACCEPTED, "application/json", "").await;

    let response = server
        .client()
        .track_page_view(EventData::new().with("url", "/"))
        .await
        .unwrap();
    assert_eq!(response, Value::Null);
}

#[tokio::test]
async fn malformed_success_body_is_a_request_error() {
    let server = MockServer::start(StatusCode::OK, "text/html", "<html>ok</html>").await;

    let err = server
        .client()
        .track_custom("ping", EventData::new())
        .await
        .unwrap_err();
    assert!(err.to_string().starts_with("Request failed: invalid JSON in response"));
}

#[tokio::test]
async fn cli_reports_success_and_json() {
    let server = MockServer::json(StatusCode::OK, json!({ "ok": true })).await;
    let mut store = MemorySettings::with_credentials(&credentials());

    let mut reporter = RecordingReporter::default();
    let cli = Cli::try_parse_from(["jirafe", "track", "user", "login", "u-1"]).unwrap();
    assert!(cli::run(cli.command, server.config(), &mut store, &mut reporter).await);
    assert_eq!(
        reporter.events,
        vec![
            Reported::Start("Tracking user login...".into()),
            Reported::Finish,
            Reported::Success("User login tracked".into()),
        ]
    );

    let mut reporter = RecordingReporter::default();
    let cli = Cli::try_parse_from(["jirafe", "track", "order", "o-1", "--json"]).unwrap();
    assert!(cli::run(cli.command, server.config(), &mut store, &mut reporter).await);
    assert_eq!(reporter.events.last(), Some(&Reported::Json(json!({ "ok": true }))));

    let hits = server.hits();
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].body, json!({ "type": "user_login", "user_id": "u-1" }));
    assert_eq!(hits[1].body, json!({ "type": "order", "order_id": "o-1" }));
}

#[tokio::test]
async fn cli_reports_server_failure() {
    let server =
        MockServer::json(StatusCode::UNPROCESSABLE_ENTITY, json!({ "message": "unknown site" }))
            .await;
    let mut store = MemorySettings::with_credentials(&credentials());
    let mut reporter = RecordingReporter::default();

    let cli = Cli::try_parse_from(["jirafe", "stats", "--param", "period=week"]).unwrap();
    assert!(!cli::run(cli.command, server.config(), &mut store, &mut reporter).await);
    assert_eq!(
        reporter.events.last(),
        Some(&Reported::Failure("unknown site".into()))
    );
    assert_eq!(server.only_hit().query.as_deref(), Some("period=week"));
}
