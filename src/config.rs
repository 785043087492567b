use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_FEED_URL: &str = "https://feed.lolesports.com/livestats/v1";
pub const DEFAULT_POLL_COUNT: u32 = 26;
pub const DEFAULT_MAX_REQS_PER_SEC: usize = 20;
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Everything the live-stats client needs to talk to the feed.
///
/// The feed rejects requests that do not look like they come from the
/// lolesports site, so the browser headers are part of the config.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub base_url: String,
    pub headers: Vec<(String, String)>,
    pub poll_count: u32,
    pub poll_step: chrono::Duration,
    pub request_timeout: Duration,
    pub max_reqs_per_sec: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        let headers = [
            ("accept", "application/json"),
            ("accept-language", "en-US,en;q=0.9"),
            ("origin", "https://lolesports.com"),
            ("referer", "https://lolesports.com/"),
            ("sec-fetch-dest", "empty"),
            ("sec-fetch-mode", "cors"),
            ("sec-fetch-site", "same-site"),
            (
                "user-agent",
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/134.0.0.0 Safari/537.36",
            ),
        ]
        .into_iter()
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .collect();

        Self {
            base_url: DEFAULT_FEED_URL.to_string(),
            headers,
            poll_count: DEFAULT_POLL_COUNT,
            poll_step: chrono::Duration::minutes(1),
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_reqs_per_sec: DEFAULT_MAX_REQS_PER_SEC,
        }
    }
}

impl FeedConfig {
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_poll_count(mut self, poll_count: u32) -> Self {
        self.poll_count = poll_count;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub model_path: PathBuf,
    /// Replace nulls with 0 right before scoring. Off by default: the booster
    /// routes missing values itself.
    pub fill_missing_zero: bool,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: SocketAddr,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_feed_config_polls_twenty_six_windows() {
        let config = FeedConfig::default();
        assert_eq!(config.poll_count, 26);
        assert_eq!(config.poll_step, chrono::Duration::minutes(1));
        assert!(config.headers.iter().any(|(name, _)| name == "origin"));
    }

    #[test]
    fn base_url_override_drops_trailing_slash() {
        let config = FeedConfig::default().with_base_url("http://localhost:9000/livestats/");
        assert_eq!(config.base_url, "http://localhost:9000/livestats");
    }
}
