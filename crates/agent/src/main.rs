//! Battery twin agent
//!
//! Consumes battery telemetry, aggregates discharge cycles, scores each
//! completed cycle with the capacity model, and raises maintenance alerts
//! when state of health degrades below threshold.

use anyhow::Result;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use twin_lib::health::{components, HealthRegistry};
use twin_lib::observability::{AgentMetrics, StructuredLogger};
use twin_lib::pipeline::{CyclePipeline, PipelineEvent};
use twin_lib::predictor::{HeuristicSohModel, OnnxSohModel, SohModel};
use twin_lib::AlertSeverity;

mod api;
mod config;
mod source;

const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting battery-agent");

    let config = config::AgentConfig::load()?;
    info!(
        telemetry_addr = %config.telemetry_addr,
        alert_threshold = config.alert_threshold,
        "Agent configured"
    );

    let health_registry = HealthRegistry::new();
    health_registry.register(components::SOURCE).await;
    health_registry.register(components::PIPELINE).await;
    health_registry.register(components::PREDICTOR).await;

    let metrics = AgentMetrics::new();
    let logger = StructuredLogger::new();

    // Load the capacity model; fall back to the heuristic so the agent
    // still produces (degraded) estimates with a broken artifact.
    let model: Arc<dyn SohModel> = match &config.model_path {
        Some(path) => match OnnxSohModel::from_path(std::path::Path::new(path)) {
            Ok(model) => Arc::new(model),
            Err(e) => {
                warn!(error = %e, path = %path, "Model load failed, using heuristic model");
                health_registry
                    .set_degraded(components::PREDICTOR, format!("Model load failed: {e}"))
                    .await;
                Arc::new(HeuristicSohModel::new(config.reference_capacity_ah))
            }
        },
        None => {
            info!("No model artifact configured, using heuristic model");
            Arc::new(HeuristicSohModel::new(config.reference_capacity_ah))
        }
    };
    let model_version = model.version();
    metrics.set_model_version(&model_version);
    logger.log_startup(AGENT_VERSION, &model_version);

    let (shutdown_tx, _) = broadcast::channel(1);
    let (samples_tx, samples_rx) = mpsc::channel(config.channel_capacity);

    let (pipeline, events_rx) = CyclePipeline::new(model, config.pipeline_config());
    let pipeline_handle = tokio::spawn(pipeline.run(samples_rx, shutdown_tx.subscribe()));

    let events_handle = tokio::spawn(consume_events(events_rx, logger.clone()));

    // Health and metrics server
    let app_state = Arc::new(api::AppState::new(health_registry.clone(), metrics.clone()));
    tokio::spawn(api::serve(config.api_port, app_state));

    // Telemetry ingest listener
    let source_registry = health_registry.clone();
    let source_addr = config.telemetry_addr.clone();
    let source_shutdown = shutdown_tx.subscribe();
    tokio::spawn(async move {
        if let Err(e) = source::serve(&source_addr, samples_tx, source_shutdown).await {
            error!(error = %e, "Telemetry ingest failed");
            source_registry
                .set_unhealthy(components::SOURCE, e.to_string())
                .await;
        }
    });

    health_registry.set_ready(true).await;

    tokio::signal::ctrl_c().await?;
    logger.log_shutdown("SIGINT received");
    health_registry.set_ready(false).await;

    // Stop the ingest listener, flush every open cycle, and let the event
    // consumer drain before exiting.
    let _ = shutdown_tx.send(());
    pipeline_handle.await?;
    events_handle.await?;

    Ok(())
}

/// Forward pipeline events to the structured log.
async fn consume_events(mut events_rx: mpsc::Receiver<PipelineEvent>, logger: StructuredLogger) {
    while let Some(event) = events_rx.recv().await {
        match event {
            PipelineEvent::CycleCompleted(cycle) => {
                logger.log_cycle_completed(
                    &cycle.device_id,
                    cycle.cycle_id,
                    cycle.features.avg_resistance,
                    cycle.features.avg_voltage,
                    cycle.features.duration_s,
                    cycle.features.sample_count,
                );
            }
            PipelineEvent::SohEstimated { estimate, decision } => {
                logger.log_soh_estimate(
                    &estimate.device_id,
                    estimate.cycle_id,
                    estimate.soh,
                    estimate.capacity_ah,
                    &estimate.model_version,
                );
                if decision.severity != AlertSeverity::None {
                    logger.log_alert(
                        &decision.device_id,
                        decision.cycle_id,
                        &decision.severity.to_string(),
                        &decision.reason,
                    );
                }
            }
            PipelineEvent::PredictorUnavailable {
                device_id,
                cycle_id,
                reason,
                ..
            } => {
                logger.log_predictor_unavailable(&device_id, cycle_id, &reason);
            }
        }
    }
}
