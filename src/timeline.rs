use chrono::{DateTime, NaiveDateTime, Utc};
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

use crate::config::FeedConfig;
use crate::error::{PredictError, Result};
use crate::feed::{Frame, WindowSource};

const START_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S.%3fZ";
const START_TIME_LEN: usize = "YYYY-MM-DDTHH:MM:SS.sssZ".len();

/// Parses the `startingTime` of a request. Only `YYYY-MM-DDTHH:MM:SS.sssZ` is
/// accepted, with exactly three fractional digits and nothing around it.
pub fn parse_start_time(raw: &str) -> Result<DateTime<Utc>> {
    // chrono skips blanks before numeric fields and accepts short ones.
    if raw.len() != START_TIME_LEN || raw.contains(char::is_whitespace) {
        return Err(PredictError::InvalidStartTime(raw.to_string()));
    }

    NaiveDateTime::parse_from_str(raw, START_TIME_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|_| PredictError::InvalidStartTime(raw.to_string()))
}

/// Minutes between the match start and a frame, rounded half to even.
pub fn elapsed_minutes(start: DateTime<Utc>, frame_time: DateTime<Utc>) -> i64 {
    let seconds = (frame_time - start).num_seconds() as f64;
    (seconds / 60.0).round_ties_even() as i64
}

/// Polls `poll_count` windows, one every `poll_step`, and returns the frames
/// in timestamp order with duplicates removed.
///
/// A failed poll contributes no frames; the next windows overlap it.
pub fn fetch_timeline(
    source: &dyn WindowSource,
    config: &FeedConfig,
    game_id: &str,
    start: DateTime<Utc>,
) -> Vec<Frame> {
    let mut frames: Vec<Frame> = Vec::new();

    for poll in 0..config.poll_count {
        let anchor = start + config.poll_step * poll as i32;

        match source.fetch_window(game_id, anchor) {
            Ok(window) => {
                debug!(game_id, poll, frames = window.frames.len(), "window received");
                frames.extend(window.frames);
            }
            Err(err) => {
                warn!(game_id, poll, error = %err, "window poll failed, skipping");
            }
        }
    }

    order_frames(frames)
}

/// Sorts frames by timestamp (stable, so the first arrival wins on ties) and
/// drops repeated timestamps.
pub fn order_frames(mut frames: Vec<Frame>) -> Vec<Frame> {
    frames.sort_by_key(|frame| frame.timestamp);
    frames.dedup_by_key(|frame| frame.timestamp);
    frames
}

pub fn save_timeline(path: &Path, frames: &[Frame]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let serialized = serde_json::to_vec_pretty(frames)?;
    fs::write(path, serialized)?;
    Ok(())
}

pub fn load_timeline(path: &Path) -> Result<Vec<Frame>> {
    let contents = fs::read_to_string(path)?;
    let frames: Vec<Frame> = serde_json::from_str(&contents)?;
    Ok(order_frames(frames))
}
