use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptWord {
    pub confidence: f64,
    pub end: f64,
    pub speaker: String,
    pub start: f64,
    pub word: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Utterance {
    pub confidence: f64,
    pub end: f64,
    pub speaker: String,
    pub start: f64,
    pub text: String,
    #[serde(default)]
    pub words: Vec<TranscriptWord>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptMetadata {
    pub duration: f64,
    pub language: String,
    pub source_model: String,
    pub source_url: String,
    pub source_vendor: String,
    pub source_version: String,
    pub speakers: HashMap<String, Value>,
    pub transcription_date: String,
    pub version: String,
}

/// Machine generated transcript of a video, as served by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    #[serde(default)]
    pub metadata: TranscriptMetadata,
    pub utterances: Vec<Utterance>,
}

impl Transcript {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Index of the utterance being spoken at `position` seconds
    pub fn active_utterance(&self, position: f64) -> Option<usize> {
        self.utterances
            .iter()
            .position(|u| position >= u.start && position <= u.end)
    }
}

/// Cue label in `M:SS` form
pub fn format_cue_time(seconds: f64) -> String {
    let seconds = if seconds.is_finite() { seconds.max(0.0) } else { 0.0 };
    let minutes = (seconds / 60.0).floor() as u64;
    let rest = (seconds % 60.0).floor() as u64;
    format!("{}:{:02}", minutes, rest)
}
