use reqwest::Client;
use serde::Deserialize;

use crate::config::CoreConfig;
use crate::types::SensorReading;

/// Third-party channel feed for the optional wearable reading. Every
/// failure is returned as `Err`; the caller degrades to the form-supplied
/// values, never the other way round.
pub struct SensorFeed {
    config: Option<FeedConfig>,
}

struct FeedConfig {
    client: Client,
    url: String,
}

#[derive(Debug, Deserialize)]
struct ChannelPayload {
    #[serde(default)]
    feeds: Vec<FeedEntry>,
}

#[derive(Debug, Deserialize)]
struct FeedEntry {
    field1: Option<String>,
    field2: Option<String>,
}

impl SensorFeed {
    pub fn new(config: &CoreConfig) -> Self {
        let Some(url) = config.feed_url.clone() else {
            return Self { config: None };
        };

        let client = Client::builder().timeout(config.feed_timeout).build().ok();

        let client = match client {
            Some(client) => client,
            None => return Self { config: None },
        };

        Self {
            config: Some(FeedConfig { client, url }),
        }
    }

    pub async fn latest_reading(&self) -> Result<SensorReading, String> {
        let Some(config) = &self.config else {
            return Err("feed not configured".to_string());
        };

        let response = config
            .client
            .get(&config.url)
            .send()
            .await
            .map_err(|error| error.to_string())?;
        if !response.status().is_success() {
            return Err(format!("feed response {}", response.status()));
        }

        let payload = response
            .json::<ChannelPayload>()
            .await
            .map_err(|error| error.to_string())?;

        latest_from_channel(&payload)
    }
}

fn latest_from_channel(payload: &ChannelPayload) -> Result<SensorReading, String> {
    let entry = payload
        .feeds
        .last()
        .ok_or_else(|| "feed returned no entries".to_string())?;

    Ok(SensorReading {
        heart_rate: field_value(entry.field1.as_deref()),
        spo2: field_value(entry.field2.as_deref()),
    })
}

// Absent or empty fields read as 0.0 rather than failing the fetch.
fn field_value(field: Option<&str>) -> f64 {
    field
        .and_then(|value| value.trim().parse::<f64>().ok())
        .unwrap_or(0.0)
}
