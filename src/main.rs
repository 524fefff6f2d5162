// src/main.rs

mod alert_tracker;
mod composite_detector;
mod config;
mod dispatcher;
mod error;
mod frame_loop;
mod lane_detection;
mod object_detection;
mod proximity;
mod registry;
mod rewriter;
mod server;
mod speech;
mod types;

use anyhow::Result;
use composite_detector::CompositeDetector;
use dispatcher::AlertDispatcher;
use frame_loop::FrameLoop;
use object_detection::YoloDetector;
use registry::SubscriberRegistry;
use rewriter::GeminiRewriter;
use speech::{EspeakVoice, VoiceSink};
use std::sync::Arc;
use tracing::{error, info, warn};
use types::Config;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load("config.yaml")?;

    tracing_subscriber::fmt()
        .with_env_filter(config.logging.level.as_str())
        .init();

    info!("🚗 BeetleGuard Alert System Starting");

    let registry = Arc::new(SubscriberRegistry::new());

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("🌐 Alert server listening on {}", addr);

    let app = server::router(registry.clone());
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("Alert server error: {}", e);
        }
    });

    let api_key = std::env::var(&config.rewrite.api_key_env).unwrap_or_default();
    if api_key.is_empty() {
        warn!(
            "{} is not set; alert rewrites will fail and be dropped",
            config.rewrite.api_key_env
        );
    }
    let rewriter = GeminiRewriter::new(
        &config.rewrite.model,
        &api_key,
        config.rewrite.request_timeout_secs,
    );

    let voice: Option<Box<dyn VoiceSink>> = if config.speech.enabled {
        Some(Box::new(EspeakVoice::new(config.speech.rate_wpm)))
    } else {
        None
    };

    let dispatcher = AlertDispatcher::new(Box::new(rewriter), voice, registry);

    let detector = YoloDetector::new(
        &config.detection.model_path,
        config.detection.confidence_threshold,
        config.detection.num_threads,
    )?;
    info!("✓ Object detector ready");

    let mut frame_loop = FrameLoop::new(
        config.clone(),
        Box::new(detector),
        CompositeDetector::new(),
        dispatcher,
    );

    match frame_loop.run().await {
        Ok(()) => {
            info!("✓ Shutdown complete");
            Ok(())
        }
        Err(e) => {
            error!("Fatal: {}", e);
            std::process::exit(1);
        }
    }
}
