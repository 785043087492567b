use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, RETRY_AFTER};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::thread::sleep;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::config::FeedConfig;
use crate::error::{PredictError, Result};

/// Wire format used by the feed for `startingTime` and frame timestamps.
pub const FEED_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// One response of the live-stats `window` endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Window {
    #[serde(default)]
    pub esports_game_id: Option<String>,
    #[serde(default)]
    pub frames: Vec<Frame>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Frame {
    #[serde(rename = "rfc460Timestamp")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub game_state: Option<String>,
    #[serde(default)]
    pub blue_team: Option<TeamFrame>,
    #[serde(default)]
    pub red_team: Option<TeamFrame>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamFrame {
    #[serde(default)]
    pub total_gold: u32,
    #[serde(default)]
    pub total_kills: u32,
    #[serde(default)]
    pub inhibitors: ObjectiveCount,
    #[serde(default)]
    pub towers: ObjectiveCount,
    #[serde(default)]
    pub barons: ObjectiveCount,
    #[serde(default)]
    pub dragons: ObjectiveCount,
    #[serde(default)]
    pub participants: Vec<ParticipantFrame>,
}

impl TeamFrame {
    pub fn creep_score(&self) -> u32 {
        self.participants.iter().map(|p| p.creep_score).sum()
    }

    pub fn assists(&self) -> u32 {
        self.participants.iter().map(|p| p.assists).sum()
    }

    pub fn deaths(&self) -> u32 {
        self.participants.iter().map(|p| p.deaths).sum()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantFrame {
    #[serde(default)]
    pub participant_id: u32,
    #[serde(default)]
    pub total_gold: u32,
    #[serde(default)]
    pub level: u32,
    #[serde(default)]
    pub kills: u32,
    #[serde(default)]
    pub deaths: u32,
    #[serde(default)]
    pub assists: u32,
    #[serde(default)]
    pub creep_score: u32,
}

/// Objective tally. The feed sends towers and barons as numbers and dragons as
/// the list of slain dragon types; both decode to a count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ObjectiveCount(pub u32);

impl<'de> Deserialize<'de> for ObjectiveCount {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawCount {
            Count(u32),
            List(Vec<Value>),
        }

        let count = match Option::<RawCount>::deserialize(deserializer)? {
            Some(RawCount::Count(n)) => n,
            Some(RawCount::List(items)) => items.len() as u32,
            None => 0,
        };

        Ok(ObjectiveCount(count))
    }
}

/// Anything able to return the feed window anchored at a timestamp.
pub trait WindowSource: Send + Sync {
    fn fetch_window(&self, game_id: &str, starting_time: DateTime<Utc>) -> Result<Window>;
}

pub struct LiveStatsClient {
    client: Client,
    headers: HeaderMap,
    base_url: String,
    limiter: Mutex<RateLimiter>,
}

fn build_headers(config: &FeedConfig) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    for (name, value) in &config.headers {
        let header_name =
            HeaderName::from_bytes(name.as_bytes()).map_err(|err| PredictError::InvalidHeader {
                name: name.clone(),
                reason: err.to_string(),
            })?;
        let header_value =
            HeaderValue::from_str(value).map_err(|err| PredictError::InvalidHeader {
                name: name.clone(),
                reason: err.to_string(),
            })?;
        headers.insert(header_name, header_value);
    }

    Ok(headers)
}

impl LiveStatsClient {
    pub fn new(config: &FeedConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.request_timeout).build()?;

        Ok(Self {
            client,
            headers: build_headers(config)?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            limiter: Mutex::new(RateLimiter::new(config.max_reqs_per_sec)),
        })
    }

    fn window_url(&self, game_id: &str) -> String {
        format!("{}/window/{}", self.base_url, game_id)
    }

    fn request_with_retry(
        &self,
        url: &str,
        starting_time: &str,
    ) -> Result<reqwest::blocking::Response> {
        const MAX_ATTEMPTS: usize = 2;
        let mut attempt = 0;

        loop {
            attempt += 1;

            self.limiter
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .wait();

            let response = self
                .client
                .get(url)
                .headers(self.headers.clone())
                .query(&[("startingTime", starting_time)])
                .send()?;

            if response.status() == StatusCode::TOO_MANY_REQUESTS {
                if attempt >= MAX_ATTEMPTS {
                    return Err(PredictError::RateLimited(url.to_string()));
                }

                sleep(parse_retry_after(&response).unwrap_or(Duration::from_secs(2)));
                continue;
            }

            if !response.status().is_success() {
                return Err(PredictError::Status {
                    url: url.to_string(),
                    status: response.status().as_u16(),
                });
            }

            return Ok(response);
        }
    }
}

impl WindowSource for LiveStatsClient {
    fn fetch_window(&self, game_id: &str, starting_time: DateTime<Utc>) -> Result<Window> {
        let url = self.window_url(game_id);
        let stamp = starting_time.format(FEED_TIME_FORMAT).to_string();
        debug!(game_id, starting_time = %stamp, "polling live-stats window");

        let response = self.request_with_retry(&url, &stamp)?;

        // The feed answers 204 for windows before the game starts.
        if response.status() == StatusCode::NO_CONTENT {
            return Ok(Window::default());
        }

        let body = response.bytes()?;
        if body.is_empty() {
            return Ok(Window::default());
        }

        Ok(serde_json::from_slice(&body)?)
    }
}

/// Sliding one-second request budget shared by all polls of a client.
pub struct RateLimiter {
    max_reqs_per_sec: usize,
    timestamps: VecDeque<Instant>,
}

impl RateLimiter {
    pub fn new(max_reqs_per_sec: usize) -> Self {
        Self {
            max_reqs_per_sec: max_reqs_per_sec.max(1),
            timestamps: VecDeque::new(),
        }
    }

    pub fn wait(&mut self) {
        loop {
            let now = Instant::now();
            self.prune(now);

            if self.timestamps.len() >= self.max_reqs_per_sec {
                if let Some(oldest) = self.timestamps.front() {
                    let elapsed = now.duration_since(*oldest);
                    if elapsed < Duration::from_secs(1) {
                        sleep(Duration::from_secs(1) - elapsed);
                        continue;
                    }
                }
            }

            self.timestamps.push_back(Instant::now());
            break;
        }
    }

    fn prune(&mut self, now: Instant) {
        while let Some(front) = self.timestamps.front() {
            if now.duration_since(*front) > Duration::from_secs(1) {
                self.timestamps.pop_front();
            } else {
                break;
            }
        }
    }
}

fn parse_retry_after(response: &reqwest::blocking::Response) -> Option<Duration> {
    response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_feed_window_with_dragon_list() {
        let body = json!({
            "esportsGameId": "110853020184706766",
            "frames": [{
                "rfc460Timestamp": "2024-03-01T17:10:00.123Z",
                "gameState": "in_game",
                "blueTeam": {
                    "totalGold": 16012,
                    "inhibitors": 0,
                    "towers": 1,
                    "barons": 0,
                    "totalKills": 2,
                    "dragons": ["ocean", "mountain"],
                    "participants": [
                        {"participantId": 1, "kills": 1, "deaths": 0, "assists": 1, "creepScore": 80},
                        {"participantId": 2, "kills": 1, "deaths": 1, "assists": 0, "creepScore": 60}
                    ]
                }
            }]
        });

        let window: Window = serde_json::from_value(body).unwrap();
        assert_eq!(window.frames.len(), 1);

        let frame = &window.frames[0];
        assert!(frame.red_team.is_none());

        let blue = frame.blue_team.as_ref().unwrap();
        assert_eq!(blue.dragons, ObjectiveCount(2));
        assert_eq!(blue.towers, ObjectiveCount(1));
        assert_eq!(blue.creep_score(), 140);
        assert_eq!(blue.assists(), 1);
        assert_eq!(blue.deaths(), 1);
    }

    #[test]
    fn accepts_second_precision_timestamps_and_null_objectives() {
        let body = json!({
            "frames": [{
                "rfc460Timestamp": "2024-03-01T17:10:00Z",
                "redTeam": {"totalGold": 2500, "totalKills": 0, "dragons": null, "participants": []}
            }]
        });

        let window: Window = serde_json::from_value(body).unwrap();
        let red = window.frames[0].red_team.as_ref().unwrap();
        assert_eq!(red.dragons, ObjectiveCount(0));
        assert_eq!(red.barons, ObjectiveCount(0));
    }

    #[test]
    fn empty_window_has_no_frames() {
        let window: Window = serde_json::from_str("{}").unwrap();
        assert!(window.frames.is_empty());
    }

    #[test]
    fn rate_limiter_admits_budget_without_sleeping() {
        let mut limiter = RateLimiter::new(3);
        let start = Instant::now();
        for _ in 0..3 {
            limiter.wait();
        }
        assert!(start.elapsed() < Duration::from_millis(500));
        assert_eq!(limiter.timestamps.len(), 3);
    }
}
