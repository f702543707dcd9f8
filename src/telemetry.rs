use std::collections::VecDeque;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::Serialize;
use sysinfo::System;
use tokio::sync::Mutex;

use crate::types::{Prediction, RiskLabel};

#[derive(Debug, Clone, Serialize)]
pub struct RecentPrediction {
    pub timestamp: u64,
    pub result: String,
    pub probability: f64,
    pub substituted: Vec<String>,
    pub bp_defaulted: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub predictions: u64,
    pub high_risk: u64,
    pub low_risk: u64,
    pub errors: u64,
    pub uptime: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SystemHealth {
    pub cpu_percent: f32,
    pub memory_mb: u64,
    pub memory_percent: f32,
}

#[derive(Debug, Default)]
struct StatsCounters {
    predictions: u64,
    high_risk: u64,
    low_risk: u64,
    errors: u64,
}

pub struct TelemetryStore {
    start_time: SystemTime,
    history_limit: usize,
    stats: Mutex<StatsCounters>,
    recent: Mutex<VecDeque<RecentPrediction>>,
    system: Mutex<System>,
}

impl TelemetryStore {
    pub fn new(history_limit: usize) -> Self {
        let mut system = System::new_all();
        system.refresh_all();

        TelemetryStore {
            start_time: SystemTime::now(),
            history_limit,
            stats: Mutex::new(StatsCounters::default()),
            recent: Mutex::new(VecDeque::with_capacity(64)),
            system: Mutex::new(system),
        }
    }

    pub async fn record_prediction(&self, prediction: &Prediction) {
        {
            let mut stats = self.stats.lock().await;
            stats.predictions = stats.predictions.saturating_add(1);
            match prediction.label {
                RiskLabel::High => stats.high_risk = stats.high_risk.saturating_add(1),
                RiskLabel::Low => stats.low_risk = stats.low_risk.saturating_add(1),
            }
        }

        let mut recent = self.recent.lock().await;
        recent.push_front(RecentPrediction {
            timestamp: now_epoch(),
            result: prediction.label.as_str().to_string(),
            probability: prediction.probability,
            substituted: prediction.substituted.clone(),
            bp_defaulted: prediction.bp_defaulted,
        });
        while recent.len() > self.history_limit {
            recent.pop_back();
        }
    }

    pub async fn record_error(&self) {
        let mut stats = self.stats.lock().await;
        stats.errors = stats.errors.saturating_add(1);
    }

    pub async fn snapshot_stats(&self) -> StatsSnapshot {
        let stats = self.stats.lock().await;
        StatsSnapshot {
            predictions: stats.predictions,
            high_risk: stats.high_risk,
            low_risk: stats.low_risk,
            errors: stats.errors,
            uptime: format_uptime(
                SystemTime::now()
                    .duration_since(self.start_time)
                    .unwrap_or(Duration::from_secs(0)),
            ),
        }
    }

    pub async fn snapshot_recent(&self) -> Vec<RecentPrediction> {
        let recent = self.recent.lock().await;
        recent.iter().cloned().collect()
    }

    pub async fn health_snapshot(&self) -> SystemHealth {
        let mut system = self.system.lock().await;
        system.refresh_cpu();
        system.refresh_memory();

        let cpu_percent = system.global_cpu_info().cpu_usage();
        let total_mem = system.total_memory();
        let used_mem = system.used_memory();
        let memory_percent = if total_mem > 0 {
            (used_mem as f32 / total_mem as f32) * 100.0
        } else {
            0.0
        };

        SystemHealth {
            cpu_percent,
            memory_mb: used_mem / (1024 * 1024),
            memory_percent,
        }
    }
}

fn now_epoch() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_secs()
}

fn format_uptime(duration: Duration) -> String {
    let total_minutes = duration.as_secs() / 60;
    let days = total_minutes / (24 * 60);
    let hours = (total_minutes / 60) % 24;
    let minutes = total_minutes % 60;
    format!("{}d {}h {}m", days, hours, minutes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prediction(label: RiskLabel) -> Prediction {
        Prediction {
            label,
            probability: 82.0,
            substituted: Vec::new(),
            bp_defaulted: false,
        }
    }

    #[tokio::test]
    async fn counters_track_labels_and_errors() {
        let store = TelemetryStore::new(50);
        store.record_prediction(&prediction(RiskLabel::High)).await;
        store.record_prediction(&prediction(RiskLabel::Low)).await;
        store.record_error().await;

        let stats = store.snapshot_stats().await;
        assert_eq!(stats.predictions, 2);
        assert_eq!(stats.high_risk, 1);
        assert_eq!(stats.low_risk, 1);
        assert_eq!(stats.errors, 1);
    }

    #[tokio::test]
    async fn recent_history_is_bounded_and_newest_first() {
        let store = TelemetryStore::new(10);
        for _ in 0..15 {
            store.record_prediction(&prediction(RiskLabel::Low)).await;
        }
        store.record_prediction(&prediction(RiskLabel::High)).await;

        let recent = store.snapshot_recent().await;
        assert_eq!(recent.len(), 10);
        assert_eq!(recent[0].result, "High Risk");
    }

    #[test]
    fn uptime_formats_days_hours_minutes() {
        assert_eq!(format_uptime(Duration::from_secs(0)), "0d 0h 0m");
        assert_eq!(
            format_uptime(Duration::from_secs(26 * 3600 + 5 * 60)),
            "1d 2h 5m"
        );
    }
}
