use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct CoreConfig {
    pub api_addr: String,
    pub models_dir: PathBuf,
    pub feed_url: Option<String>,
    pub feed_timeout: Duration,
    pub history_limit: usize,
}

impl CoreConfig {
    pub fn from_env() -> Self {
        let api_addr = std::env::var("CARDIO_API_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:8080".to_string());

        let models_dir = std::env::var("CARDIO_MODELS_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_models_dir());

        let feed_url = std::env::var("CARDIO_FEED_URL")
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());

        let feed_timeout_secs = std::env::var("CARDIO_FEED_TIMEOUT_SECS")
            .ok()
            .and_then(|value| value.parse::<u64>().ok())
            .map(clamp_feed_timeout)
            .unwrap_or(10);

        let history_limit = std::env::var("CARDIO_HISTORY_LIMIT")
            .ok()
            .and_then(|value| value.parse::<usize>().ok())
            .map(clamp_history_limit)
            .unwrap_or(50);

        CoreConfig {
            api_addr,
            models_dir,
            feed_url,
            feed_timeout: Duration::from_secs(feed_timeout_secs),
            history_limit,
        }
    }
}

fn default_models_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("models")
}

fn clamp_feed_timeout(value: u64) -> u64 {
    let normalized = if value == 0 { 1 } else { value };
    normalized.min(60)
}

fn clamp_history_limit(value: usize) -> usize {
    let normalized = if value < 10 { 10 } else { value };
    normalized.min(500)
}
