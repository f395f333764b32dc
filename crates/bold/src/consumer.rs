//! Client side of the chat relay.
//!
//! One call drives one question through the relay: it posts the question with its
//! history, decodes the event stream as bytes arrive and hands every text fragment
//! to a [`ChunkSink`]. Each call gets its own [`AskHandle`] so the caller can abort
//! it and watch its progress.

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::fmt::Display;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::errors::{AskError, AskResult};
use crate::framing::FrameDecoder;
use crate::models::event::StreamEvent;
use crate::models::message::Message;

pub const DEFAULT_ENDPOINT: &str = "/api/ask";

const INIT_FAILURE: &str = "Failed to initialize stream";

/// Lifecycle of a single ask call.
///
/// `Idle -> Sending -> Streaming -> {Completed | Failed | Cancelled}`. A call that
/// fails or is aborted before the first byte goes straight from `Sending` to the
/// terminal state. Once terminal, the state never changes again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AskState {
    Idle,
    Sending,
    Streaming,
    Completed,
    Failed,
    Cancelled,
}

impl AskState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            AskState::Completed | AskState::Failed | AskState::Cancelled
        )
    }
}

/// Abort switch and progress for one ask call.
///
/// Clones share the same call, so one clone can be handed to whatever wants to
/// cancel (a key binding, a shutdown signal) while the call runs on another.
#[derive(Debug, Clone)]
pub struct AskHandle {
    token: CancellationToken,
    aborted: Arc<AtomicBool>,
    state: Arc<Mutex<AskState>>,
}

impl Default for AskHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl AskHandle {
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            aborted: Arc::new(AtomicBool::new(false)),
            state: Arc::new(Mutex::new(AskState::Idle)),
        }
    }

    /// Abort the call. Safe to call any number of times, from any clone; only the
    /// first call tears anything down, and it returns `true`.
    pub fn abort(&self) -> bool {
        if self.aborted.swap(true, Ordering::SeqCst) {
            return false;
        }
        debug!(state = ?self.state(), "aborting ask");
        self.token.cancel();
        true
    }

    pub fn is_aborted(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn state(&self) -> AskState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Move to `next` unless the call already reached a terminal state
    fn transition(&self, next: AskState) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.is_terminal() {
            return false;
        }
        if *state != next {
            debug!(from = ?*state, to = ?next, "ask state");
            *state = next;
        }
        true
    }

    fn cancel(&self) -> AskState {
        self.transition(AskState::Cancelled);
        AskState::Cancelled
    }

    fn fail(&self, err: AskError) -> AskError {
        self.transition(AskState::Failed);
        self.abort();
        err
    }
}

/// Receiver of streamed assistant text
#[async_trait]
pub trait ChunkSink: Send {
    async fn append(&mut self, chunk: &str);
}

#[async_trait]
impl<F> ChunkSink for F
where
    F: FnMut(&str) + Send,
{
    async fn append(&mut self, chunk: &str) {
        (*self)(chunk)
    }
}

/// Pushes chunks into a bounded channel, waiting for room when the reader lags
pub struct ChannelSink {
    tx: mpsc::Sender<String>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::Sender<String>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl ChunkSink for ChannelSink {
    async fn append(&mut self, chunk: &str) {
        if self.tx.send(chunk.to_owned()).await.is_err() {
            debug!("chunk receiver dropped");
        }
    }
}

/// Drive a relay response body to its terminal event.
///
/// Returns `Completed` on `done` and `Cancelled` when the handle was aborted
/// first. On any error the handle is aborted before the error is returned. The
/// body is read one chunk at a time, and nothing more is read once a terminal
/// event has been seen.
pub async fn consume<S, E, K>(body: S, handle: &AskHandle, sink: &mut K) -> AskResult<AskState>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: Display,
    K: ChunkSink + ?Sized,
{
    futures::pin_mut!(body);
    let mut decoder = FrameDecoder::new();
    let mut chunks = 0usize;

    let outcome = 'read: loop {
        let next = tokio::select! {
            biased;
            _ = handle.token.cancelled() => return Ok(handle.cancel()),
            next = body.next() => next,
        };

        let bytes = match next {
            Some(Ok(bytes)) => bytes,
            Some(Err(e)) => break Err(AskError::Transport(e.to_string())),
            None => {
                if decoder.pending() > 0 {
                    debug!(bytes = decoder.pending(), "discarding unterminated line");
                }
                if chunks > 0 {
                    warn!(chunks, "stream ended without a terminal event");
                    break Ok(());
                }
                break Err(AskError::Transport(
                    "stream ended before a terminal event".to_string(),
                ));
            }
        };
        handle.transition(AskState::Streaming);

        for payload in decoder.push(&bytes) {
            if handle.is_aborted() {
                return Ok(handle.cancel());
            }
            match StreamEvent::decode(&payload) {
                Ok(StreamEvent::Chunk(content)) => {
                    chunks += 1;
                    if let Some(text) = content.filter(|text| !text.is_empty()) {
                        // a full channel sink must not outlive an abort
                        tokio::select! {
                            biased;
                            _ = handle.token.cancelled() => return Ok(handle.cancel()),
                            _ = sink.append(&text) => {}
                        }
                    }
                }
                Ok(StreamEvent::Error(message)) => break 'read Err(AskError::Stream(message)),
                Ok(StreamEvent::Done) => break 'read Ok(()),
                Ok(StreamEvent::Unknown(kind)) => {
                    warn!(kind = %kind, "unexpected stream event type");
                }
                Err(e) => {
                    debug!(payload = %payload, "undecodable frame");
                    break 'read Err(AskError::Parse(e));
                }
            }
        }
    };

    match outcome {
        Ok(()) => {
            handle.transition(AskState::Completed);
            Ok(AskState::Completed)
        }
        Err(e) => Err(handle.fail(e)),
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AskRequest<'a> {
    question: &'a str,
    video_id: &'a str,
    subdomain: &'a str,
    conversation: &'a [Message],
}

/// Talks to the relay endpoint on behalf of one video
pub struct AskClient {
    client: Client,
    endpoint: String,
    video_id: String,
    subdomain: String,
    headers: Vec<(String, String)>,
}

impl AskClient {
    /// `endpoint` is the full URL of the relay, e.g. `http://localhost:3000/api/ask`
    pub fn new<E, V, S>(endpoint: E, video_id: V, subdomain: S) -> AskResult<Self>
    where
        E: Into<String>,
        V: Into<String>,
        S: Into<String>,
    {
        // No request timeout: an answer streams until `done`, `error` or abort
        let client = Client::builder().build()?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            video_id: video_id.into(),
            subdomain: subdomain.into(),
            headers: Vec::new(),
        })
    }

    /// Extra header sent with every request
    pub fn with_header<N: Into<String>, V: Into<String>>(mut self, name: N, value: V) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn video_id(&self) -> &str {
        &self.video_id
    }

    /// Ask one question.
    ///
    /// `conversation` is the history to send as context and must not contain the
    /// placeholder the answer is being streamed into.
    pub async fn ask<K>(
        &self,
        question: &str,
        conversation: &[Message],
        handle: &AskHandle,
        sink: &mut K,
    ) -> AskResult<AskState>
    where
        K: ChunkSink + ?Sized,
    {
        if !handle.transition(AskState::Sending) {
            return Ok(handle.state());
        }

        let mut request = self.client.post(&self.endpoint).json(&AskRequest {
            question,
            video_id: &self.video_id,
            subdomain: &self.subdomain,
            conversation,
        });
        for (name, value) in &self.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = tokio::select! {
            biased;
            _ = handle.token.cancelled() => return Ok(handle.cancel()),
            response = request.send() => response,
        };
        let response = response.map_err(|e| handle.fail(e.into()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<Value>()
                .await
                .ok()
                .and_then(|body| {
                    ["content", "message"]
                        .iter()
                        .find_map(|key| body.get(*key).and_then(Value::as_str).map(str::to_owned))
                })
                .unwrap_or_else(|| INIT_FAILURE.to_string());
            return Err(handle.fail(AskError::Rejected {
                status: status.as_u16(),
                message,
            }));
        }

        consume(response.bytes_stream(), handle, sink).await
    }
}
