use serde_json::{json, Value};

/// Every frame on the event stream starts with this prefix
pub const DATA_PREFIX: &str = "data: ";

/// Message used when an error event or a failure carries no text of its own
pub const UNKNOWN_ERROR: &str = "Unknown error occurred";

/// One decoded frame of the chat event stream.
///
/// A stream carries zero or more `Chunk` events followed by exactly one terminal
/// event, either `Error` or `Done`. Types this client does not know about decode
/// to `Unknown` so newer backends do not break older consumers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// A fragment of assistant text, absent when the backend sends an empty chunk
    Chunk(Option<String>),
    Error(String),
    Done,
    Unknown(String),
}

impl StreamEvent {
    pub fn chunk<S: Into<String>>(text: S) -> Self {
        StreamEvent::Chunk(Some(text.into()))
    }

    pub fn error<S: Into<String>>(message: S) -> Self {
        StreamEvent::Error(message.into())
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Error(_) | StreamEvent::Done)
    }

    /// Decode the JSON payload of a frame, without its `data: ` prefix.
    ///
    /// Only payloads that are not JSON at all are errors. A JSON value without a
    /// string `type` field is an `Unknown` event with an empty type.
    pub fn decode(payload: &str) -> Result<Self, serde_json::Error> {
        let value: Value = serde_json::from_str(payload)?;
        let content = value.get("content").and_then(Value::as_str);

        Ok(match value.get("type").and_then(Value::as_str) {
            Some("chunk") => StreamEvent::Chunk(content.map(str::to_owned)),
            Some("error") => StreamEvent::Error(content.unwrap_or(UNKNOWN_ERROR).to_owned()),
            Some("done") => StreamEvent::Done,
            other => StreamEvent::Unknown(other.unwrap_or_default().to_owned()),
        })
    }

    /// Encode as a complete frame, including the blank separator line
    pub fn to_frame(&self) -> String {
        let payload = match self {
            StreamEvent::Chunk(Some(text)) => json!({"type": "chunk", "content": text}),
            StreamEvent::Chunk(None) => json!({"type": "chunk"}),
            StreamEvent::Error(message) => json!({"type": "error", "content": message}),
            StreamEvent::Done => json!({"type": "done"}),
            StreamEvent::Unknown(kind) => json!({ "type": kind }),
        };
        format!("{}{}\n\n", DATA_PREFIX, payload)
    }
}
