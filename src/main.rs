// CARDIOGUARD - Core Service
// Heart-risk inference pipeline and serving surface

mod artifacts;
mod config;
mod feed;
mod http;
mod predict;
mod telemetry;
mod types;

use std::sync::Arc;

use tokio::sync::oneshot;

use crate::artifacts::ArtifactStore;
use crate::config::CoreConfig;
use crate::feed::SensorFeed;
use crate::http::ApiState;
use crate::predict::PredictionEngine;
use crate::telemetry::TelemetryStore;

fn main() {
    let _ = env_logger::try_init();

    if let Err(error) = run_console() {
        eprintln!("[CARDIO] {}", error);
        std::process::exit(1);
    }
}

fn run_console() -> Result<(), Box<dyn std::error::Error>> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        tokio::spawn(async move {
            if let Err(error) = tokio::signal::ctrl_c().await {
                eprintln!("[CARDIO] Failed to listen for shutdown: {}", error);
            }
            let _ = shutdown_tx.send(());
        });

        run_until_shutdown(shutdown_rx).await;
    });

    Ok(())
}

async fn run_until_shutdown(shutdown_rx: oneshot::Receiver<()>) {
    println!("==========================================");
    println!("=      CARDIOGUARD - INITIALIZING        =");
    println!("=    Heart Risk Prediction Service       =");
    println!("==========================================\n");

    let config = Arc::new(CoreConfig::from_env());

    // A missing or corrupt artifact means the feature schema cannot be
    // trusted; the process must not serve in that state.
    let artifacts = match ArtifactStore::load(&config.models_dir) {
        Ok(artifacts) => Arc::new(artifacts),
        Err(error) => {
            eprintln!("[CARDIO] Failed to load model artifacts: {}", error);
            std::process::exit(1);
        }
    };

    println!("[OK] Classifier: {} features", artifacts.model_features().len());
    println!("[OK] Encoders: {} columns", artifacts.encoders.len());
    println!("[OK] Threshold: {}", artifacts.threshold);
    if config.feed_url.is_some() {
        println!("[OK] Sensor Feed: CONFIGURED");
    } else {
        println!("[--] Sensor Feed: NOT CONFIGURED");
    }
    println!("\n===========================================\n");

    let telemetry = Arc::new(TelemetryStore::new(config.history_limit));
    let engine = Arc::new(PredictionEngine::new(Arc::clone(&artifacts)));
    let feed = Arc::new(SensorFeed::new(&config));

    let api_state = ApiState {
        engine,
        feed,
        telemetry,
    };
    let api_addr = config.api_addr.clone();
    let api_handle = tokio::spawn(async move {
        if let Err(error) = crate::http::serve(api_addr, api_state).await {
            eprintln!("[API] Server error: {}", error);
        }
    });

    println!("[CARDIO] Serving on {}", config.api_addr);

    let _ = shutdown_rx.await;

    println!("\n[CARDIO] Shutting down gracefully...");
    api_handle.abort();
}
