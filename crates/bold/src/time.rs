//! Conversions between cue timestamps and seconds

/// Convert `HH:MM:SS.mmm`, `MM:SS.mmm` or `SS.mmm` to seconds.
///
/// Parts that are not numbers make the result NaN, an empty part counts as zero.
/// With more than three parts only the last one is used.
pub fn timestamp_to_seconds(timestamp: &str) -> f64 {
    let parts: Vec<f64> = timestamp.split(':').map(parse_part).collect();

    match parts.as_slice() {
        [hours, minutes, seconds] => hours * 3600.0 + minutes * 60.0 + seconds,
        [minutes, seconds] => minutes * 60.0 + seconds,
        [seconds] => *seconds,
        _ => parts.last().copied().unwrap_or(0.0),
    }
}

fn parse_part(part: &str) -> f64 {
    let part = part.trim();
    if part.is_empty() {
        return 0.0;
    }
    part.parse().unwrap_or(f64::NAN)
}

/// Render seconds as `MM:SS`. Minutes keep counting past an hour; anything that
/// is not a finite number renders as `00:00`.
pub fn seconds_to_readable(total_seconds: f64) -> String {
    if !total_seconds.is_finite() {
        return "00:00".to_string();
    }
    let minutes = (total_seconds / 60.0).floor() as i64;
    let seconds = (total_seconds % 60.0).floor() as i64;
    format!("{:02}:{:02}", minutes, seconds)
}
