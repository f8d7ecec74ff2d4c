use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::{Multipart, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use bytes::Bytes;
use openai_sdk::api::chat::{ChatCompletionRequest, ChatMessage};
use openai_sdk::{ApiErrorKind, Client, ClientOptions, Error, RetryPolicy};
use secrecy::SecretString;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

const TEST_API_KEY: &str = "test-api-key";

fn fast_retry(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        max_backoff: Duration::from_millis(1),
        jitter: Duration::ZERO,
    }
}

fn test_client(addr: SocketAddr, retry: RetryPolicy) -> Client {
    Client::with_options(
        SecretString::new(TEST_API_KEY.to_string()),
        ClientOptions::default()
            .with_base_url(format!("http://{addr}/v1"))
            .with_retry(retry),
    )
    .expect("build client")
}

fn chat_request() -> ChatCompletionRequest {
    ChatCompletionRequest::new("gpt-4o-mini", vec![ChatMessage::user("hi")])
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value == format!("Bearer {TEST_API_KEY}"))
}

fn sse_response(chunks: Vec<&'static [u8]>) -> impl IntoResponse {
    let stream = futures_util::stream::iter(
        chunks
            .into_iter()
            .map(|chunk| Ok::<_, Infallible>(Bytes::from_static(chunk))),
    );
    (
        StatusCode::OK,
        [("content-type", "text/event-stream")],
        Body::from_stream(stream),
    )
}

async fn spawn_server(
    app: Router,
) -> (SocketAddr, oneshot::Sender<()>, tokio::task::JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind mock server listener");
    let addr = listener
        .local_addr()
        .expect("read mock server listener address");
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let task = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            })
            .await
            .expect("mock server should run");
    });
    (addr, shutdown_tx, task)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn streamed_chat_reassembles_split_events_and_filters_done() {
    let app = Router::new().route(
        "/v1/chat/completions",
        post(|headers: HeaderMap| async move {
            if !authorized(&headers) {
                return (
                    StatusCode::UNAUTHORIZED,
                    Json(json!({"error":{"message":"unauthorized"}})),
                )
                    .into_response();
            }
            // The second event is split across body chunks.
            sse_response(vec![
                b"data: {\"i\":0}\n\ndata: {\"i\"",
                b":1}\n\ndata: [DONE]\n\n",
            ])
            .into_response()
        }),
    );
    let (addr, shutdown_tx, server_task) = spawn_server(app).await;

    let client = test_client(addr, RetryPolicy::none());
    let mut seen = Vec::new();
    client
        .create_chat_completion_stream(&chat_request(), |event| seen.push(event))
        .await
        .expect("stream should complete");

    assert_eq!(seen, vec![json!({"i": 0}), json!({"i": 1})]);

    let _ = shutdown_tx.send(());
    server_task.await.expect("mock server task should join");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn streamed_chat_skips_malformed_chunks() {
    let app = Router::new().route(
        "/v1/chat/completions",
        post(|| async {
            sse_response(vec![
                b"data: {\"i\":0}\n\ndata: not json\n\ndata: {\"i\":1}\n\ndata: [DONE]\n\n",
            ])
        }),
    );
    let (addr, shutdown_tx, server_task) = spawn_server(app).await;

    let client = test_client(addr, RetryPolicy::none());
    let mut seen = Vec::new();
    client
        .create_chat_completion_stream(&chat_request(), |event| seen.push(event))
        .await
        .expect("malformed chunk must not abort the stream");

    assert_eq!(seen, vec![json!({"i": 0}), json!({"i": 1})]);

    let _ = shutdown_tx.send(());
    server_task.await.expect("mock server task should join");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn streamed_chat_raises_on_error_status_without_events() {
    let app = Router::new().route(
        "/v1/chat/completions",
        post(|| async {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error":{"message":"boom"}})),
            )
        }),
    );
    let (addr, shutdown_tx, server_task) = spawn_server(app).await;

    let client = test_client(addr, RetryPolicy::none());
    let mut events = 0usize;
    let error = client
        .create_chat_completion_stream(&chat_request(), |_| events += 1)
        .await
        .expect_err("500 must raise");

    match error {
        Error::Api(api) => {
            assert_eq!(api.kind, ApiErrorKind::ServerError);
            assert_eq!(api.message, "boom");
            assert_eq!(api.status, Some(500));
        }
        other => panic!("unexpected error variant: {other:?}"),
    }
    assert_eq!(events, 0);

    let _ = shutdown_tx.send(());
    server_task.await.expect("mock server task should join");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn streamed_chat_raises_on_mid_stream_error_object() {
    let app = Router::new().route(
        "/v1/chat/completions",
        post(|| async {
            sse_response(vec![
                b"data: {\"i\":0}\n\ndata: {\"error\":{\"message\":\"stream blew up\"}}\n\n",
            ])
        }),
    );
    let (addr, shutdown_tx, server_task) = spawn_server(app).await;

    let client = test_client(addr, RetryPolicy::none());
    let mut seen = Vec::new();
    let error = client
        .create_chat_completion_stream(&chat_request(), |event| seen.push(event))
        .await
        .expect_err("error event must raise");

    match error {
        Error::Api(api) => {
            assert_eq!(api.message, "stream blew up");
            assert_eq!(api.status, None);
        }
        other => panic!("unexpected error variant: {other:?}"),
    }
    assert_eq!(seen, vec![json!({"i": 0})]);

    let _ = shutdown_tx.send(());
    server_task.await.expect("mock server task should join");
}

#[derive(Clone)]
struct CountedState {
    requests: Arc<AtomicUsize>,
    failures_before_success: usize,
}

async fn rate_limited_then_ok(State(state): State<CountedState>) -> impl IntoResponse {
    let n = state.requests.fetch_add(1, Ordering::SeqCst);
    if n < state.failures_before_success {
        (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({"error":{"message":"Rate limit reached for requests"}})),
        )
    } else {
        (StatusCode::OK, Json(json!({"id":"chatcmpl-1"})))
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn rate_limited_request_is_retried_until_success() {
    let requests = Arc::new(AtomicUsize::new(0));
    let app = Router::new()
        .route("/v1/chat/completions", post(rate_limited_then_ok))
        .with_state(CountedState {
            requests: Arc::clone(&requests),
            failures_before_success: 1,
        });
    let (addr, shutdown_tx, server_task) = spawn_server(app).await;

    let client = test_client(addr, fast_retry(2));
    let response = client
        .create_chat_completion(&chat_request())
        .await
        .expect("second attempt should succeed");

    assert_eq!(response, json!({"id":"chatcmpl-1"}));
    assert_eq!(requests.load(Ordering::SeqCst), 2);

    let _ = shutdown_tx.send(());
    server_task.await.expect("mock server task should join");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn quota_exceeded_is_not_retried_even_with_budget() {
    let requests = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&requests);
    let app = Router::new().route(
        "/v1/chat/completions",
        post(move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                (
                    StatusCode::TOO_MANY_REQUESTS,
                    Json(json!({"error":{
                        "message":"You exceeded your current quota, please check your plan.",
                        "code":"insufficient_quota"
                    }})),
                )
            }
        }),
    );
    let (addr, shutdown_tx, server_task) = spawn_server(app).await;

    let client = test_client(addr, fast_retry(3));
    let error = client
        .create_chat_completion(&chat_request())
        .await
        .expect_err("quota errors are terminal");

    match error {
        Error::Api(api) => assert_eq!(api.kind, ApiErrorKind::QuotaExceeded),
        other => panic!("unexpected error variant: {other:?}"),
    }
    assert_eq!(requests.load(Ordering::SeqCst), 1);

    let _ = shutdown_tx.send(());
    server_task.await.expect("mock server task should join");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn incorrect_api_key_is_classified_end_to_end() {
    let app = Router::new().route(
        "/v1/models/:id",
        get(|| async {
            (
                StatusCode::UNAUTHORIZED,
                Json(json!({"error":{
                    "message":"Incorrect API key provided: sk-abc. You can find your API key."
                }})),
            )
        }),
    );
    let (addr, shutdown_tx, server_task) = spawn_server(app).await;

    let client = test_client(addr, RetryPolicy::none());
    let error = client
        .retrieve_model("gpt-4o-mini")
        .await
        .expect_err("401 must raise");

    match error {
        Error::Api(api) => assert_eq!(api.kind, ApiErrorKind::InvalidApiKey),
        other => panic!("unexpected error variant: {other:?}"),
    }

    let _ = shutdown_tx.send(());
    server_task.await.expect("mock server task should join");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn file_content_streams_raw_bytes_to_the_sink() {
    let payload: &[u8] = &[0x00, 0xFF, 0x10, 0x80, 0x7F, 0xC3];
    let app = Router::new().route(
        "/v1/files/:id/content",
        get(move || async move { (StatusCode::OK, Bytes::from_static(payload)) }),
    );
    let (addr, shutdown_tx, server_task) = spawn_server(app).await;

    let client = test_client(addr, RetryPolicy::none());
    let mut sink = Vec::new();
    client
        .file_content("file-1", |chunk| sink.extend_from_slice(&chunk))
        .await
        .expect("download should complete");

    assert_eq!(sink, payload);

    let _ = shutdown_tx.send(());
    server_task.await.expect("mock server task should join");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn upload_file_posts_multipart_purpose_and_file() {
    async fn upload_handler(mut multipart: Multipart) -> impl IntoResponse {
        let mut purpose = None;
        let mut file_name = None;
        let mut file_bytes = None;
        while let Some(field) = multipart.next_field().await.expect("read multipart field") {
            match field.name() {
                Some("purpose") => purpose = Some(field.text().await.expect("purpose text")),
                Some("file") => {
                    file_name = field.file_name().map(str::to_string);
                    file_bytes = Some(field.bytes().await.expect("file bytes"));
                }
                _ => {}
            }
        }
        (
            StatusCode::OK,
            Json(json!({
                "id": "file-1",
                "purpose": purpose,
                "filename": file_name,
                "bytes": file_bytes.map(|bytes| bytes.len()),
            })),
        )
    }

    let app = Router::new().route("/v1/files", post(upload_handler));
    let (addr, shutdown_tx, server_task) = spawn_server(app).await;

    let dir = std::env::temp_dir();
    let path = dir.join("openai-sdk-upload-test.jsonl");
    std::fs::write(&path, b"{\"prompt\":\"a\",\"completion\":\"b\"}\n").expect("write temp file");

    let client = test_client(addr, RetryPolicy::none());
    let response = client
        .upload_file(&path, "fine-tune")
        .await
        .expect("upload should succeed");

    assert_eq!(
        response.get("purpose").and_then(Value::as_str),
        Some("fine-tune")
    );
    assert_eq!(
        response.get("filename").and_then(Value::as_str),
        Some("openai-sdk-upload-test.jsonl")
    );
    assert_eq!(response.get("bytes").and_then(Value::as_u64), Some(32));

    std::fs::remove_file(&path).ok();
    let _ = shutdown_tx.send(());
    server_task.await.expect("mock server task should join");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn invalid_jsonl_upload_fails_before_any_request() {
    let requests = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&requests);
    let app = Router::new().route(
        "/v1/files",
        post(move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Json(json!({"id":"file-1"}))
            }
        }),
    );
    let (addr, shutdown_tx, server_task) = spawn_server(app).await;

    let dir = std::env::temp_dir();
    let path = dir.join("openai-sdk-invalid-test.jsonl");
    std::fs::write(&path, b"{\"ok\":1}\nnot json\n").expect("write temp file");

    let client = test_client(addr, RetryPolicy::none());
    let error = client
        .upload_file(&path, "fine-tune")
        .await
        .expect_err("local validation must fail");

    assert!(matches!(
        error,
        Error::JsonlFileCannotBeParsed { line: 2, .. }
    ));
    assert_eq!(requests.load(Ordering::SeqCst), 0);

    std::fs::remove_file(&path).ok();
    let _ = shutdown_tx.send(());
    server_task.await.expect("mock server task should join");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn missing_upload_file_is_a_local_error() {
    let client = Client::with_options(
        SecretString::new(TEST_API_KEY.to_string()),
        ClientOptions::default().with_base_url("http://127.0.0.1:9/v1"),
    )
    .expect("build client");

    let error = client
        .upload_file(std::path::Path::new("/definitely/not/here.jsonl"), "fine-tune")
        .await
        .expect_err("missing file must fail locally");

    assert!(matches!(error, Error::FileCannotBeOpened { .. }));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn connection_failure_surfaces_as_network_error() {
    // Bind a port, then drop the listener so nothing is accepting.
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let client = test_client(addr, RetryPolicy::none());
    let error = client.list_models().await.expect_err("nothing is listening");
    assert!(matches!(error, Error::Network(_)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn delete_model_returns_the_deletion_receipt() {
    let app = Router::new().route(
        "/v1/models/:id",
        delete(|| async { Json(json!({"id":"ft:gpt-4o-mini:org:custom","deleted":true})) }),
    );
    let (addr, shutdown_tx, server_task) = spawn_server(app).await;

    let client = test_client(addr, RetryPolicy::none());
    let response = client
        .delete_model("ft:gpt-4o-mini:org:custom")
        .await
        .expect("delete should succeed");

    assert_eq!(response.get("deleted").and_then(Value::as_bool), Some(true));

    let _ = shutdown_tx.send(());
    server_task.await.expect("mock server task should join");
}
