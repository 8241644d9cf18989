//! Integration tests using wiremock and in-memory transports.

use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode};
use netpoint::codec::{DateRule, KeyDecoding, KeyEncoding};
use netpoint::{
    ApiError, Client, Endpoint, Error, Interceptor, JsonMapper, ProgressHandler, ServiceError,
    Task, Timestamp, Transport, TransportRequest, TransportResponse, UploadProgress,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use url::Url;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct TestData {
    id: u32,
    name: String,
}

fn test_data() -> TestData {
    TestData {
        id: 1,
        name: "Test".to_string(),
    }
}

fn endpoint(base: &str, method: Method, path: &str) -> Endpoint {
    Endpoint::new(Url::parse(base).unwrap(), method, path)
}

fn fast_client() -> netpoint::ClientBuilder<ServiceError> {
    Client::<ServiceError>::builder().initial_backoff(Duration::from_millis(5))
}

/// Fails the first `failures` dispatches, then answers 200 with `body`.
struct Flaky {
    failures: usize,
    body: &'static str,
    calls: AtomicUsize,
}

impl Flaky {
    fn new(failures: usize, body: &'static str) -> Self {
        Self {
            failures,
            body,
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Transport for Flaky {
    async fn dispatch(&self, _request: TransportRequest) -> netpoint::Result<TransportResponse> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            return Err(Error::Transport("connection reset".to_string()));
        }
        Ok(TransportResponse {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Bytes::from_static(self.body.as_bytes()),
        })
    }

    async fn dispatch_upload(
        &self,
        request: TransportRequest,
        _file: PathBuf,
        _on_progress: ProgressHandler,
    ) -> netpoint::Result<TransportResponse> {
        self.dispatch(request).await
    }
}

/// Records hook invocations into a shared event log.
struct Recorder {
    events: Arc<Mutex<Vec<String>>>,
}

impl Interceptor<ServiceError> for Recorder {
    fn before_send(&self, request: &mut TransportRequest) {
        self.events.lock().unwrap().push("before_send".to_string());
        request
            .headers
            .insert("x-intercepted", "yes".parse().unwrap());
    }

    fn after_receive(&self, _payload: &mut Bytes) {
        self.events.lock().unwrap().push("after_receive".to_string());
    }

    fn on_error(&self, error: &mut ServiceError) {
        self.events.lock().unwrap().push("on_error".to_string());
        error.code.get_or_insert_with(|| "intercepted".to_string());
    }
}

/// A transport that logs each dispatch into the same event log as [`Recorder`].
struct Logged<T> {
    inner: T,
    events: Arc<Mutex<Vec<String>>>,
}

impl<T: Transport> Transport for Logged<T> {
    async fn dispatch(&self, request: TransportRequest) -> netpoint::Result<TransportResponse> {
        self.events.lock().unwrap().push("dispatch".to_string());
        self.inner.dispatch(request).await
    }

    async fn dispatch_upload(
        &self,
        request: TransportRequest,
        file: PathBuf,
        on_progress: ProgressHandler,
    ) -> netpoint::Result<TransportResponse> {
        self.events.lock().unwrap().push("dispatch_upload".to_string());
        self.inner.dispatch_upload(request, file, on_progress).await
    }
}

#[derive(Clone, Default)]
struct Captured(Arc<Mutex<Vec<u8>>>);

impl std::io::Write for Captured {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn test_successful_get_request() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(test_data()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = Client::<ServiceError>::builder().build().unwrap();
    let data: TestData = client
        .execute(&endpoint(&mock_server.uri(), Method::GET, "test"))
        .await
        .unwrap();

    assert_eq!(data, test_data());
}

#[tokio::test]
async fn test_query_parameters_and_headers_reach_server() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("q", "cats"))
        .and(query_param("page", "2"))
        .and(header("x-api-key", "secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(test_data()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = Client::<ServiceError>::builder().build().unwrap();
    let endpoint = endpoint(&format!("{}/", mock_server.uri()), Method::GET, "search")
        .with_header("X-Api-Key", "secret")
        .unwrap()
        .with_task(Task::query([("q", json!("cats")), ("page", json!(2))]));

    let data: TestData = client.execute(&endpoint).await.unwrap();
    assert_eq!(data.id, 1);
}

#[tokio::test]
async fn test_encodable_body_with_key_rules() {
    #[derive(Serialize)]
    struct NewPost {
        post_title: String,
        user_id: u32,
    }

    #[derive(Debug, Deserialize)]
    struct Post {
        post_id: u32,
        post_title: String,
    }

    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/posts"))
        .and(header("content-type", "application/json"))
        .and(body_json(json!({ "postTitle": "Hello", "userId": 9 })))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(json!({ "postId": 3, "postTitle": "Hello" })),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = Client::<ServiceError>::builder().build().unwrap();
    let endpoint = endpoint(&mock_server.uri(), Method::POST, "/posts")
        .with_task(Task::encodable(NewPost {
            post_title: "Hello".to_string(),
            user_id: 9,
        }))
        .with_key_encoding(KeyEncoding::ConvertToCamelCase)
        .with_key_decoding(KeyDecoding::ConvertFromCamelCase);

    let post: Post = client.execute(&endpoint).await.unwrap();
    assert_eq!(post.post_id, 3);
    assert_eq!(post.post_title, "Hello");
}

#[tokio::test]
async fn test_dates_follow_endpoint_rules() {
    #[derive(Debug, Serialize, Deserialize)]
    struct Event {
        name: String,
        starts_at: Timestamp,
    }

    let mock_server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/events/1"))
        .and(body_json(json!({ "name": "launch", "starts_at": 1_700_000_000.0 })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "name": "launch", "starts_at": "2023-11-14T22:13:20Z" })),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let starts_at = Timestamp(chrono::DateTime::from_timestamp(1_700_000_000, 0).unwrap());
    let client = Client::<ServiceError>::builder().build().unwrap();
    let endpoint = endpoint(&mock_server.uri(), Method::PUT, "events/1")
        .with_task(Task::encodable(Event {
            name: "launch".to_string(),
            starts_at,
        }))
        .with_date_encoding(DateRule::SecondsSince1970)
        .with_date_decoding(DateRule::Iso8601);

    let event: Event = client.execute(&endpoint).await.unwrap();
    assert_eq!(event.starts_at, starts_at);
}

#[tokio::test]
async fn test_server_error_payload_is_decoded() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/test"))
        .respond_with(
            ResponseTemplate::new(404)
                .set_body_json(json!({ "code": "not_found", "message": "No such item" })),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = Client::<ServiceError>::builder().build().unwrap();
    let err = client
        .execute::<TestData>(&endpoint(&mock_server.uri(), Method::GET, "test"))
        .await
        .unwrap_err();

    assert_eq!(err.code.as_deref(), Some("not_found"));
    assert_eq!(err.message.as_deref(), Some("No such item"));
    assert!(!err.is_unknown());
}

#[tokio::test]
async fn test_undecodable_server_error_is_unknown() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/test"))
        .respond_with(ResponseTemplate::new(502).set_body_string("Bad gateway"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = Client::<ServiceError>::builder().build().unwrap();
    let err = client
        .execute::<TestData>(&endpoint(&mock_server.uri(), Method::GET, "test"))
        .await
        .unwrap_err();

    assert!(err.is_unknown());
    assert_eq!(err.to_string(), "Unknown error");
}

#[tokio::test]
async fn test_retry_on_5xx_then_success() {
    let mock_server = MockServer::start().await;
    let attempt_count = Arc::new(AtomicUsize::new(0));
    let attempt_count_clone = attempt_count.clone();

    // First two requests fail with 500, third succeeds
    Mock::given(method("GET"))
        .and(path("/test"))
        .respond_with(move |_req: &wiremock::Request| {
            let count = attempt_count_clone.fetch_add(1, Ordering::SeqCst);
            if count < 2 {
                ResponseTemplate::new(500).set_body_string("Server error")
            } else {
                ResponseTemplate::new(200).set_body_json(test_data())
            }
        })
        .mount(&mock_server)
        .await;

    let client = fast_client().build().unwrap();
    let endpoint = endpoint(&mock_server.uri(), Method::GET, "test").with_retry_count(3);

    let data: TestData = client.execute(&endpoint).await.unwrap();

    assert_eq!(data.id, 1);
    assert_eq!(attempt_count.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_always_failing_transport_makes_retry_count_plus_one_attempts() {
    for retries in [0u32, 1, 3] {
        let client = fast_client().build_with_transport(Flaky::new(usize::MAX, ""));
        let err = client
            .execute::<TestData>(
                &endpoint("https://api.example.com", Method::GET, "test").with_retry_count(retries),
            )
            .await
            .unwrap_err();

        assert_eq!(client.transport().calls(), retries as usize + 1);
        assert_eq!(
            err.underlying.as_deref(),
            Some("Transport failure: connection reset")
        );
    }
}

#[tokio::test]
async fn test_transport_fails_twice_then_succeeds() {
    let logs = Captured::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_ansi(false)
        .with_max_level(tracing::Level::INFO)
        .with_writer(move || writer.clone())
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let client = fast_client().build_with_transport(Flaky::new(2, r#"{"id":7,"name":"ok"}"#));
    let endpoint = endpoint("https://api.example.com", Method::GET, "").with_retry_count(2);

    let data: TestData = client.execute(&endpoint).await.unwrap();

    assert_eq!(data.id, 7);
    assert_eq!(client.transport().calls(), 3);

    let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
    for attempt in 0..3 {
        assert!(
            output.contains(&format!("attempt={attempt}")),
            "missing attempt {attempt} in logs:\n{output}"
        );
    }
    assert!(!output.contains("attempt=3"));
}

#[tokio::test]
async fn test_backoff_waits_between_attempts() {
    let client = Client::<ServiceError>::builder()
        .initial_backoff(Duration::from_millis(20))
        .build_with_transport(Flaky::new(usize::MAX, ""));
    let endpoint = endpoint("https://api.example.com", Method::GET, "").with_retry_count(2);

    let started = Instant::now();
    let _ = client.execute::<TestData>(&endpoint).await.unwrap_err();

    // 20ms + 40ms
    assert!(started.elapsed() >= Duration::from_millis(60));
    assert_eq!(client.transport().calls(), 3);
}

#[tokio::test]
async fn test_decode_failure_is_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/test"))
        .respond_with(ResponseTemplate::new(200).set_body_string("invalid json"))
        .expect(3)
        .mount(&mock_server)
        .await;

    let client = fast_client().build().unwrap();
    let err = client
        .execute::<TestData>(&endpoint(&mock_server.uri(), Method::GET, "test").with_retry_count(2))
        .await
        .unwrap_err();

    let description = err.underlying.unwrap();
    assert!(description.contains("Failed to decode response (status 200 OK)"));
}

#[tokio::test]
async fn test_encoding_failure_is_not_dispatched_or_retried() {
    struct Unencodable;

    impl Serialize for Unencodable {
        fn serialize<S: serde::Serializer>(&self, _: S) -> Result<S::Ok, S::Error> {
            Err(serde::ser::Error::custom("cannot encode"))
        }
    }

    let events = Arc::new(Mutex::new(Vec::new()));
    let client = fast_client()
        .interceptor(Recorder {
            events: events.clone(),
        })
        .build_with_transport(Flaky::new(0, "{}"));
    let endpoint = endpoint("https://api.example.com", Method::POST, "items")
        .with_task(Task::encodable(Unencodable))
        .with_retry_count(3);

    let err = client.execute::<TestData>(&endpoint).await.unwrap_err();

    assert_eq!(client.transport().calls(), 0);
    assert!(err
        .underlying
        .as_deref()
        .unwrap()
        .starts_with("Failed to encode request"));
    assert_eq!(err.code.as_deref(), Some("intercepted"));
    assert_eq!(*events.lock().unwrap(), vec!["on_error".to_string()]);
}

#[tokio::test]
async fn test_interceptor_hook_order() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let client = fast_client()
        .interceptor(Recorder {
            events: events.clone(),
        })
        .build_with_transport(Logged {
            inner: Flaky::new(1, r#"{"id":1,"name":"Test"}"#),
            events: events.clone(),
        });
    let endpoint = endpoint("https://api.example.com", Method::GET, "test").with_retry_count(1);

    let data: TestData = client.execute(&endpoint).await.unwrap();
    assert_eq!(data, test_data());

    // The failed dispatch never produced a payload.
    assert_eq!(
        *events.lock().unwrap(),
        vec!["before_send", "dispatch", "before_send", "dispatch", "after_receive"]
    );
}

#[tokio::test]
async fn test_on_error_runs_once_after_retries() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/test"))
        .and(header("x-intercepted", "yes"))
        .respond_with(ResponseTemplate::new(503).set_body_json(json!({ "message": "busy" })))
        .expect(2)
        .mount(&mock_server)
        .await;

    let events = Arc::new(Mutex::new(Vec::new()));
    let client = fast_client()
        .interceptor(Recorder {
            events: events.clone(),
        })
        .build()
        .unwrap();

    let err = client
        .execute::<TestData>(&endpoint(&mock_server.uri(), Method::GET, "test").with_retry_count(1))
        .await
        .unwrap_err();

    assert_eq!(err.message.as_deref(), Some("busy"));
    assert_eq!(err.code.as_deref(), Some("intercepted"));
    assert_eq!(
        *events.lock().unwrap(),
        vec!["before_send", "after_receive", "before_send", "after_receive", "on_error"]
    );
}

#[tokio::test]
async fn test_after_receive_can_rewrite_payload() {
    struct Unwrap;

    impl Interceptor<ServiceError> for Unwrap {
        fn after_receive(&self, payload: &mut Bytes) {
            let value: serde_json::Value = serde_json::from_slice(payload).unwrap();
            *payload = Bytes::from(serde_json::to_vec(&value["result"]).unwrap());
        }
    }

    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": test_data() })))
        .mount(&mock_server)
        .await;

    let client = Client::<ServiceError>::builder()
        .interceptor(Unwrap)
        .build()
        .unwrap();
    let data: TestData = client
        .execute(&endpoint(&mock_server.uri(), Method::GET, "test"))
        .await
        .unwrap();

    assert_eq!(data, test_data());
}

#[derive(Debug, Deserialize, PartialEq)]
struct Enveloped {
    id: u32,
    name: String,
}

impl JsonMapper for Enveloped {
    fn map(payload: Bytes) -> netpoint::Result<Bytes> {
        let mut envelope: serde_json::Value =
            serde_json::from_slice(&payload).map_err(|e| Error::Mapping(e.to_string()))?;
        let data = envelope
            .get_mut("data")
            .map(serde_json::Value::take)
            .ok_or_else(|| Error::Mapping("missing data".to_string()))?;
        serde_json::to_vec(&data)
            .map(Bytes::from)
            .map_err(|e| Error::Mapping(e.to_string()))
    }
}

#[tokio::test]
async fn test_mapped_decode_unwraps_envelope() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/wrapped"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "data": { "id": 5, "name": "five" } })),
        )
        .mount(&mock_server)
        .await;

    let client = Client::<ServiceError>::builder().build().unwrap();
    let endpoint = endpoint(&mock_server.uri(), Method::GET, "wrapped");

    let value: Enveloped = client.execute_mapped(&endpoint).await.unwrap();
    assert_eq!(
        value,
        Enveloped {
            id: 5,
            name: "five".to_string()
        }
    );

    // Structured mode sees the envelope itself.
    let err = client.execute::<Enveloped>(&endpoint).await.unwrap_err();
    assert!(err.underlying.unwrap().starts_with("Failed to decode response"));
}

#[tokio::test]
async fn test_mapping_failure_is_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/wrapped"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": 5 })))
        .expect(2)
        .mount(&mock_server)
        .await;

    let client = fast_client().build().unwrap();
    let err = client
        .execute_mapped::<Enveloped>(
            &endpoint(&mock_server.uri(), Method::GET, "wrapped").with_retry_count(1),
        )
        .await
        .unwrap_err();

    assert_eq!(
        err.underlying.as_deref(),
        Some("Failed to map response payload: missing data")
    );
}

#[tokio::test]
async fn test_upload_skips_before_send_and_reports_progress() {
    let mock_server = MockServer::start().await;
    let contents = vec![7u8; 150_000];

    Mock::given(method("POST"))
        .and(path("/videos"))
        .and(wiremock::matchers::body_bytes(contents.clone()))
        .respond_with(ResponseTemplate::new(201).set_body_json(test_data()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("clip.mp4");
    std::fs::write(&file, &contents).unwrap();

    let progress = Arc::new(Mutex::new(Vec::<UploadProgress>::new()));
    let sink = progress.clone();
    let events = Arc::new(Mutex::new(Vec::new()));
    let client = Client::<ServiceError>::builder()
        .interceptor(Recorder {
            events: events.clone(),
        })
        .build()
        .unwrap();
    let endpoint = endpoint(&mock_server.uri(), Method::POST, "videos")
        .with_task(Task::upload(&file, move |p| sink.lock().unwrap().push(p)));

    let data: TestData = client.execute(&endpoint).await.unwrap();
    assert_eq!(data, test_data());

    assert_eq!(*events.lock().unwrap(), vec!["after_receive".to_string()]);

    let progress = progress.lock().unwrap();
    let last = progress.last().copied().unwrap();
    assert_eq!(last, UploadProgress::new(150_000, 150_000));
    assert_eq!(last.percentage(), 100.0);
}

#[tokio::test]
async fn test_concurrent_calls_share_one_client() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(test_data()))
        .expect(8)
        .mount(&mock_server)
        .await;

    let client = Client::<ServiceError>::builder().build().unwrap();
    let endpoint = Arc::new(endpoint(&mock_server.uri(), Method::GET, "test"));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let client = client.clone();
            let endpoint = endpoint.clone();
            tokio::spawn(async move { client.execute::<TestData>(&endpoint).await })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap(), test_data());
    }
}

#[tokio::test]
async fn test_custom_api_error_type() {
    #[derive(Debug, Deserialize)]
    struct GithubError {
        message: String,
        #[serde(skip)]
        transport: bool,
    }

    impl ApiError for GithubError {
        fn unknown(description: Option<String>) -> Self {
            GithubError {
                message: description.unwrap_or_else(|| "unknown".to_string()),
                transport: false,
            }
        }

        fn from_error(error: Error) -> Self {
            GithubError {
                message: error.to_string(),
                transport: true,
            }
        }
    }

    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/repos/x"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({ "message": "rate limited" })))
        .mount(&mock_server)
        .await;

    let client = Client::<GithubError>::builder().build().unwrap();
    let err = client
        .execute::<TestData>(&endpoint(&mock_server.uri(), Method::GET, "repos/x"))
        .await
        .unwrap_err();
    assert_eq!(err.message, "rate limited");
    assert!(!err.transport);

    let client = Client::<GithubError>::builder().build_with_transport(Flaky::new(1, "{}"));
    let err = client
        .execute::<TestData>(&endpoint("https://api.example.com", Method::GET, ""))
        .await
        .unwrap_err();
    assert!(err.transport);
    assert_eq!(err.message, "Transport failure: connection reset");
}
