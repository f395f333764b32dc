use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;

use crate::time::{seconds_to_readable, timestamp_to_seconds};

lazy_static! {
    // cue start timestamp, then the title on the following line
    static ref CHAPTER_CUE: Regex =
        Regex::new(r"(\d{2}:\d{2}:\d{2}\.\d{3}|\d{2}:\d{2}\.\d{3}) --> .*\n(.+)")
            .expect("chapter cue pattern");
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Chapter {
    /// Start as `MM:SS`
    pub start_time: String,
    pub start_seconds: f64,
    pub title: String,
}

/// Extract chapters from a WEBVTT chapter track.
///
/// Text that does not carry the `WEBVTT` marker has no chapters.
pub fn parse_chapters(webvtt: &str) -> Vec<Chapter> {
    if !webvtt.contains("WEBVTT") {
        return Vec::new();
    }

    CHAPTER_CUE
        .captures_iter(webvtt)
        .map(|captures| {
            let start_seconds = timestamp_to_seconds(&captures[1]);
            Chapter {
                start_time: seconds_to_readable(start_seconds),
                start_seconds,
                title: captures[2].trim().to_string(),
            }
        })
        .collect()
}

/// Index of the chapter playing at `position` seconds
pub fn active_chapter(chapters: &[Chapter], position: f64) -> Option<usize> {
    chapters
        .iter()
        .rposition(|chapter| chapter.start_seconds <= position)
}
