use crate::error::ApiError;
use crate::state::AppState;
use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use bold::models::{event::StreamEvent, message::Message};
use bytes::Bytes;
use futures::{
    stream::{BoxStream, StreamExt},
    Stream,
};
use serde::{Deserialize, Deserializer};
use std::{convert::Infallible, fmt::Display};
use tracing::{error, info, warn};

// Types matching the incoming JSON structure
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AskRequest {
    question: String,
    video_id: String,
    subdomain: String,
    #[serde(default, deserialize_with = "present_array")]
    conversation: Option<Vec<Message>>,
}

// An absent `conversation` is fine, an explicit `null` is not an array
fn present_array<'de, D>(deserializer: D) -> Result<Option<Vec<Message>>, D::Error>
where
    D: Deserializer<'de>,
{
    Vec::<Message>::deserialize(deserializer).map(Some)
}

// Event stream response; the body is whatever the relay stream yields, unframed
pub struct SseResponse {
    stream: BoxStream<'static, Result<Bytes, Infallible>>,
}

impl SseResponse {
    fn new<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<Bytes, Infallible>> + Send + 'static,
    {
        Self {
            stream: stream.boxed(),
        }
    }
}

impl IntoResponse for SseResponse {
    fn into_response(self) -> Response {
        let mut response = Body::from_stream(self.stream).into_response();

        let headers = response.headers_mut();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/event-stream"),
        );
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));

        response
    }
}

/// Pass an upstream answer through chunk by chunk.
///
/// Each upstream chunk is yielded as soon as it arrives, and upstream is only
/// polled when the client side asks for more. A read failure after the first
/// byte ends the stream with one synthesized `error` event.
pub fn relay<S, E>(upstream: S) -> impl Stream<Item = Result<Bytes, Infallible>> + Send + 'static
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Display + Send + 'static,
{
    async_stream::stream! {
        futures::pin_mut!(upstream);
        while let Some(next) = upstream.next().await {
            match next {
                Ok(bytes) => yield Ok(bytes),
                Err(e) => {
                    error!("Error relaying answer stream: {}", e);
                    yield Ok(Bytes::from(StreamEvent::error(e.to_string()).to_frame()));
                    break;
                }
            }
        }
    }
}

async fn handler(State(state): State<AppState>, body: Bytes) -> Result<SseResponse, ApiError> {
    let request: AskRequest = serde_json::from_slice(&body).map_err(|e| {
        warn!("Rejecting ask request: {}", e);
        ApiError::Validation
    })?;

    info!(
        video_id = %request.video_id,
        subdomain = %request.subdomain,
        history = request.conversation.as_ref().map_or(0, Vec::len),
        "relaying question"
    );

    let upstream = state
        .backend
        .ask(
            &request.video_id,
            &request.subdomain,
            &request.question,
            request.conversation.as_deref(),
        )
        .await
        .map_err(|e| {
            error!("Failed to open answer stream: {}", e);
            ApiError::from(e)
        })?;

    Ok(SseResponse::new(relay(upstream)))
}

// Configure routes for this module
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/api/ask", post(handler))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{Request, StatusCode};
    use bold::backend::BackendConfig;
    use bold::consumer::{consume, AskHandle, AskState};
    use futures::stream;
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tokio::sync::mpsc;
    use tokio_stream::wrappers::ReceiverStream;
    use tower::ServiceExt;
    use wiremock::matchers::{body_json, header as header_matcher, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const API_KEY: &str = "test_api_key_0123456789";

    const SCENARIO: &str = "data: {\"type\":\"chunk\",\"content\":\"This \"}\n\ndata: {\"type\":\"chunk\",\"content\":\"video is...\"}\n\ndata: {\"type\":\"done\"}\n\n";

    fn app(url: Option<String>, api_key: Option<&str>) -> Router {
        let state = AppState::new(BackendConfig {
            url,
            api_key: api_key.map(str::to_string),
        })
        .unwrap();
        routes(state)
    }

    fn ask(body: impl Into<Body>) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/ask")
            .header("content-type", "application/json")
            .body(body.into())
            .unwrap()
    }

    async fn body_string(response: Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    async fn body_json_value(response: Response) -> Value {
        serde_json::from_str(&body_string(response).await).unwrap()
    }

    #[tokio::test]
    async fn test_relays_scenario() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/videos/v1/ask"))
            .and(header_matcher("authorization", API_KEY))
            .and(body_json(json!({
                "q": "What is this about?",
                "vid": "v1",
                "subd": "demo"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_raw(SCENARIO, "text/event-stream"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let response = app(Some(mock_server.uri()), Some(API_KEY))
            .oneshot(ask(
                json!({"question": "What is this about?", "videoId": "v1", "subdomain": "demo"})
                    .to_string(),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(headers[header::CONTENT_TYPE], "text/event-stream");
        assert_eq!(headers[header::CACHE_CONTROL], "no-cache");
        assert_eq!(headers[header::CONNECTION], "keep-alive");

        let handle = AskHandle::new();
        let mut text = String::new();
        let mut sink = |chunk: &str| text.push_str(chunk);
        let state = consume(response.into_body().into_data_stream(), &handle, &mut sink)
            .await
            .unwrap();
        assert_eq!(state, AskState::Completed);
        assert_eq!(text, "This video is...");
    }

    #[tokio::test]
    async fn test_forwards_conversation() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/videos/v1/ask"))
            .and(body_json(json!({
                "q": "And then?",
                "vid": "v1",
                "subd": "demo",
                "c": [
                    {"role": "user", "content": "What is this about?"},
                    {"role": "assistant", "content": "Chapters."},
                    {"role": "user", "content": "And then?"}
                ]
            })))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw("data: {\"type\":\"done\"}\n\n", "text/event-stream"),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let response = app(Some(mock_server.uri()), Some(API_KEY))
            .oneshot(ask(
                json!({
                    "question": "And then?",
                    "videoId": "v1",
                    "subdomain": "demo",
                    "conversation": [
                        {"role": "user", "content": "What is this about?"},
                        {"role": "assistant", "content": "Chapters."},
                        {"role": "user", "content": "And then?"}
                    ]
                })
                .to_string(),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "data: {\"type\":\"done\"}\n\n");
    }

    #[tokio::test]
    async fn test_malformed_requests_are_rejected_without_upstream_call() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&mock_server)
            .await;

        let bodies = [
            json!({"videoId": "v1", "subdomain": "demo"}).to_string(),
            json!({"question": "q", "subdomain": "demo"}).to_string(),
            json!({"question": "q", "videoId": "v1"}).to_string(),
            json!({"question": "q", "videoId": "v1", "subdomain": "demo", "conversation": "nope"})
                .to_string(),
            json!({"question": "q", "videoId": "v1", "subdomain": "demo", "conversation": null})
                .to_string(),
            json!({"question": 7, "videoId": "v1", "subdomain": "demo"}).to_string(),
            "not json".to_string(),
        ];

        for body in bodies {
            let response = app(Some(mock_server.uri()), Some(API_KEY))
                .oneshot(ask(body.clone()))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body: {}", body);
            assert_eq!(
                body_json_value(response).await,
                json!({"type": "error", "content": "Invalid request format"})
            );
        }
    }

    #[tokio::test]
    async fn test_upstream_failure_status_is_surfaced() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .mount(&mock_server)
            .await;

        let response = app(Some(mock_server.uri()), Some(API_KEY))
            .oneshot(ask(
                json!({"question": "q", "videoId": "v1", "subdomain": "demo"}).to_string(),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = body_json_value(response).await;
        assert_eq!(body["type"], "error");
        assert_eq!(
            body["content"],
            "Failed to fetch AI response: 503 Service Unavailable\noverloaded"
        );
    }

    #[tokio::test]
    async fn test_missing_configuration_fails_fast() {
        let response = app(None, None)
            .oneshot(ask(
                json!({"question": "q", "videoId": "v1", "subdomain": "demo"}).to_string(),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body_json_value(response).await,
            json!({"type": "error", "content": "Missing API configuration"})
        );
    }

    #[tokio::test]
    async fn test_relay_forwards_before_upstream_finishes() {
        let (tx, rx) = mpsc::channel::<Result<Bytes, std::io::Error>>(4);
        let relayed = relay(ReceiverStream::new(rx));
        futures::pin_mut!(relayed);

        tx.send(Ok(Bytes::from_static(b"data: {\"type\":\"chunk\",\"content\":\"This \"}\n\n")))
            .await
            .unwrap();
        let first = relayed.next().await.unwrap().unwrap();
        assert_eq!(&first[..], b"data: {\"type\":\"chunk\",\"content\":\"This \"}\n\n");
        assert!(!tx.is_closed());

        tx.send(Ok(Bytes::from_static(b"data: {\"type\":\"done\"}\n\n")))
            .await
            .unwrap();
        drop(tx);
        let second = relayed.next().await.unwrap().unwrap();
        assert_eq!(&second[..], b"data: {\"type\":\"done\"}\n\n");
        assert!(relayed.next().await.is_none());
    }

    #[tokio::test]
    async fn test_relay_preserves_chunk_boundaries() {
        let upstream = stream::iter(vec![
            Ok::<_, std::io::Error>(Bytes::from_static(b"data: {\"type\":\"chu")),
            Ok(Bytes::from_static(b"nk\",\"content\":\"x\"}\n\n")),
        ]);
        let chunks: Vec<Bytes> = relay(upstream).map(|chunk| chunk.unwrap()).collect().await;
        assert_eq!(chunks.len(), 2);
        assert_eq!(&chunks[0][..], b"data: {\"type\":\"chu");
    }

    #[tokio::test]
    async fn test_relay_ends_with_error_event_on_transport_failure() {
        let upstream = stream::iter(vec![
            Ok(Bytes::from_static(b"data: {\"type\":\"chunk\",\"content\":\"a\"}\n\n")),
            Err(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "connection reset",
            )),
            Ok(Bytes::from_static(b"data: {\"type\":\"done\"}\n\n")),
        ]);
        let chunks: Vec<Bytes> = relay(upstream).map(|chunk| chunk.unwrap()).collect().await;

        assert_eq!(chunks.len(), 2);
        let last = std::str::from_utf8(&chunks[1]).unwrap();
        let payload = last
            .strip_prefix("data: ")
            .and_then(|rest| rest.strip_suffix("\n\n"))
            .unwrap();
        assert_eq!(
            StreamEvent::decode(payload).unwrap(),
            StreamEvent::error("connection reset")
        );
    }
}
