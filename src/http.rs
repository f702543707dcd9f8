use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::feed::SensorFeed;
use crate::predict::PredictionEngine;
use crate::telemetry::{RecentPrediction, StatsSnapshot, SystemHealth, TelemetryStore};
use crate::types::RawInputRecord;

#[derive(Clone)]
pub struct ApiState {
    pub engine: Arc<PredictionEngine>,
    pub feed: Arc<SensorFeed>,
    pub telemetry: Arc<TelemetryStore>,
}

#[derive(Debug, Serialize)]
struct PredictResponse {
    result: String,
    probability: ProbabilityValue,
}

// The probability field carries the rounded percentage on success and the
// error message on failure.
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum ProbabilityValue {
    Percent(f64),
    Message(String),
}

#[derive(Debug, Serialize)]
struct ApiStatus {
    status: String,
    stats: StatsSnapshot,
    recent: Vec<RecentPrediction>,
    health: SystemHealth,
    model: ModelSummary,
}

#[derive(Debug, Serialize)]
struct ModelSummary {
    features: usize,
    encoded_columns: usize,
    threshold: f64,
}

pub async fn serve(addr: String, state: ApiState) -> Result<(), Box<dyn std::error::Error>> {
    let app = Router::new()
        .route("/api/predict", post(predict))
        .route("/api/status", get(status))
        .with_state(state)
        .layer(cors_layer());

    let addr: SocketAddr = addr.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn predict(
    State(state): State<ApiState>,
    Json(record): Json<RawInputRecord>,
) -> Json<PredictResponse> {
    let reading = if record.use_iot {
        match state.feed.latest_reading().await {
            Ok(reading) => Some(reading),
            Err(error) => {
                eprintln!("[FEED] Falling back to form SpO2: {}", error);
                None
            }
        }
    } else {
        None
    };

    match state.engine.evaluate(&record, reading) {
        Ok(prediction) => {
            state.telemetry.record_prediction(&prediction).await;
            Json(PredictResponse {
                result: prediction.label.as_str().to_string(),
                probability: ProbabilityValue::Percent(prediction.probability),
            })
        }
        Err(error) => {
            state.telemetry.record_error().await;
            Json(PredictResponse {
                result: "Error".to_string(),
                probability: ProbabilityValue::Message(error.to_string()),
            })
        }
    }
}

async fn status(State(state): State<ApiState>) -> Json<ApiStatus> {
    let stats = state.telemetry.snapshot_stats().await;
    let recent = state.telemetry.snapshot_recent().await;
    let health = state.telemetry.health_snapshot().await;
    let artifacts = state.engine.artifacts();

    Json(ApiStatus {
        status: "serving".to_string(),
        stats,
        recent,
        health,
        model: ModelSummary {
            features: artifacts.model_features().len(),
            encoded_columns: artifacts.encoders.len(),
            threshold: artifacts.threshold,
        },
    })
}

fn cors_layer() -> CorsLayer {
    let allowed = std::env::var("CARDIO_CORS_ORIGIN").unwrap_or_else(|_| {
        "http://localhost:5173,http://127.0.0.1:5173".to_string()
    });

    let mut cors = if allowed.trim() == "*" {
        CorsLayer::new().allow_origin(Any)
    } else {
        let origins = allowed
            .split(',')
            .filter_map(|origin| origin.trim().parse::<HeaderValue>().ok())
            .collect::<Vec<_>>();
        CorsLayer::new().allow_origin(AllowOrigin::list(origins))
    };

    cors = cors.allow_methods([Method::GET, Method::POST]);
    cors.allow_headers([header::CONTENT_TYPE, header::ACCEPT])
}
