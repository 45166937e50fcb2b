//! Streaming cycle pipeline
//!
//! Orchestrates the full path from raw telemetry to alert decision. A
//! router task validates incoming records and forwards each sample to its
//! device's worker over a bounded queue; one worker per device is the
//! single writer of that device's cycle state, and devices run fully in
//! parallel with nothing shared between them. Only the capacity model call
//! may take real time, and it runs under a timeout so one slow prediction
//! never stalls ingestion for other devices.

use crate::alert::{AlertDecision, AlertEvaluator, AlertSeverity, DEFAULT_ALERT_THRESHOLD};
use crate::cycle::{ClosedCycle, CycleAggregator, DEFAULT_MAX_DEVICES};
use crate::error::{CycleError, PredictError};
use crate::ingest::{RawTelemetry, SampleIngestor};
use crate::models::{CompletedCycle, CycleFeatures, SoHEstimate, TelemetrySample};
use crate::observability::AgentMetrics;
use crate::predictor::{FeatureExtractor, SohCalculator, SohModel, DEFAULT_REFERENCE_CAPACITY_AH};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Default bound on a single capacity model call.
pub const DEFAULT_INFERENCE_TIMEOUT: Duration = Duration::from_millis(100);

/// Configuration for the cycle pipeline
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// SoH fraction below which an alert escalates to warning.
    pub alert_threshold: f32,
    /// Rated capacity of a new cell, in Ah.
    pub reference_capacity_ah: f32,
    /// Bound on a single model call; slower calls are abandoned.
    pub inference_timeout: Duration,
    /// Bound on concurrently tracked devices.
    pub max_devices: usize,
    /// Queue depth for per-device queues and the outbound event channel.
    pub channel_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            alert_threshold: DEFAULT_ALERT_THRESHOLD,
            reference_capacity_ah: DEFAULT_REFERENCE_CAPACITY_AH,
            inference_timeout: DEFAULT_INFERENCE_TIMEOUT,
            max_devices: DEFAULT_MAX_DEVICES,
            channel_capacity: 1024,
        }
    }
}

/// Events the pipeline produces for downstream collaborators.
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    /// A cycle closed and its features were derived. Emitted before any
    /// prediction outcome, so features survive a predictor outage.
    CycleCompleted(CompletedCycle),
    /// The model scored a completed cycle and the alert evaluator judged it.
    SohEstimated {
        estimate: SoHEstimate,
        decision: AlertDecision,
    },
    /// The model timed out or failed for a completed cycle. Reported once;
    /// the cycle is not retried.
    PredictorUnavailable {
        device_id: String,
        cycle_id: u64,
        features: CycleFeatures,
        reason: String,
    },
}

/// The stateful core: owns all per-device cycle state through its workers.
pub struct CyclePipeline {
    model: Arc<dyn SohModel>,
    config: PipelineConfig,
    events_tx: mpsc::Sender<PipelineEvent>,
}

impl CyclePipeline {
    pub fn new(
        model: Arc<dyn SohModel>,
        config: PipelineConfig,
    ) -> (Self, mpsc::Receiver<PipelineEvent>) {
        let (events_tx, events_rx) = mpsc::channel(config.channel_capacity);
        (
            Self {
                model,
                config,
                events_tx,
            },
            events_rx,
        )
    }

    /// Consume telemetry until the channel closes or shutdown is signaled,
    /// then flush every open cycle. Resolves only after all workers have
    /// drained their queues and emitted their final events.
    pub async fn run(
        self,
        mut samples: mpsc::Receiver<RawTelemetry>,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        info!(
            max_devices = self.config.max_devices,
            alert_threshold = self.config.alert_threshold,
            "Starting cycle pipeline"
        );

        let ingestor = SampleIngestor::new();
        let metrics = AgentMetrics::new();
        let mut workers: HashMap<String, DeviceWorker> = HashMap::new();

        loop {
            tokio::select! {
                received = samples.recv() => {
                    match received {
                        Some(raw) => {
                            let sample = match ingestor.ingest(raw) {
                                Ok(sample) => sample,
                                Err(e) => {
                                    metrics.inc_malformed_samples();
                                    debug!(error = %e, "Dropping sample");
                                    continue;
                                }
                            };
                            metrics.inc_samples_ingested();
                            self.dispatch(sample, &mut workers, &metrics).await;
                        }
                        None => {
                            info!("Telemetry channel closed, draining pipeline");
                            break;
                        }
                    }
                }
                _ = shutdown.recv() => {
                    info!("Shutdown signal received, flushing open cycles");
                    break;
                }
            }
        }

        // Dropping a worker's sender lets it drain its queue, flush its open
        // cycle, and emit the final events before run() resolves.
        for (device_id, worker) in workers.drain() {
            drop(worker.tx);
            if let Err(e) = worker.handle.await {
                error!(device_id = %device_id, error = %e, "Device worker failed");
            }
        }
        metrics.set_devices_tracked(0);
        info!("Cycle pipeline stopped");
    }

    async fn dispatch(
        &self,
        sample: TelemetrySample,
        workers: &mut HashMap<String, DeviceWorker>,
        metrics: &AgentMetrics,
    ) {
        let device_id = sample.device_id.clone();

        if !workers.contains_key(&device_id) {
            if workers.len() >= self.config.max_devices {
                metrics.inc_device_limit_rejections();
                let err = CycleError::DeviceLimitExceeded {
                    device_id,
                    limit: self.config.max_devices,
                };
                warn!(error = %err, "Dropping sample");
                return;
            }
            workers.insert(
                device_id.clone(),
                DeviceWorker::spawn(
                    device_id.clone(),
                    Arc::clone(&self.model),
                    self.config.clone(),
                    self.events_tx.clone(),
                ),
            );
            metrics.set_devices_tracked(workers.len() as i64);
        }

        if let Some(worker) = workers.get(&device_id) {
            if worker.tx.send(sample).await.is_err() {
                warn!(device_id = %device_id, "Device worker exited, dropping sample");
            }
        }
    }
}

struct DeviceWorker {
    tx: mpsc::Sender<TelemetrySample>,
    handle: JoinHandle<()>,
}

impl DeviceWorker {
    fn spawn(
        device_id: String,
        model: Arc<dyn SohModel>,
        config: PipelineConfig,
        events_tx: mpsc::Sender<PipelineEvent>,
    ) -> Self {
        let (tx, rx) = mpsc::channel(config.channel_capacity);
        let handle = tokio::spawn(device_worker_loop(device_id, rx, model, config, events_tx));
        Self { tx, handle }
    }
}

/// Serial consumer for one device's samples: the single writer of that
/// device's cycle state.
async fn device_worker_loop(
    device_id: String,
    mut rx: mpsc::Receiver<TelemetrySample>,
    model: Arc<dyn SohModel>,
    config: PipelineConfig,
    events_tx: mpsc::Sender<PipelineEvent>,
) {
    let metrics = AgentMetrics::new();
    let mut aggregator = CycleAggregator::new();
    let stages = CycleStages {
        extractor: FeatureExtractor::new(),
        calculator: SohCalculator::new(config.reference_capacity_ah),
        evaluator: AlertEvaluator::new(config.alert_threshold),
        model,
        inference_timeout: config.inference_timeout,
        events_tx,
        metrics: metrics.clone(),
    };

    debug!(device_id = %device_id, "Device worker started");

    while let Some(sample) = rx.recv().await {
        match aggregator.ingest(sample) {
            Ok(Some(closed)) => stages.process_cycle(closed).await,
            Ok(None) => {}
            Err(e @ CycleError::StaleCycle { .. }) => {
                metrics.inc_stale_samples();
                debug!(error = %e, "Dropping sample");
            }
            Err(e) => {
                warn!(device_id = %device_id, error = %e, "Dropping sample");
            }
        }
    }

    // Queue closed: emit whatever is still open before exiting.
    if let Some(closed) = aggregator.flush(&device_id) {
        stages.process_cycle(closed).await;
    }

    debug!(device_id = %device_id, "Device worker stopped");
}

/// The downstream stages a closed cycle flows through.
struct CycleStages {
    extractor: FeatureExtractor,
    calculator: SohCalculator,
    evaluator: AlertEvaluator,
    model: Arc<dyn SohModel>,
    inference_timeout: Duration,
    events_tx: mpsc::Sender<PipelineEvent>,
    metrics: AgentMetrics,
}

impl CycleStages {
    async fn process_cycle(&self, closed: ClosedCycle) {
        let cycle_id = closed.cycle_id();
        let features = match self.extractor.extract(&closed) {
            Ok(features) => features,
            Err(e) => {
                // The aggregator never closes an empty cycle; this firing
                // means the aggregator is broken.
                error!(
                    device_id = %closed.device_id,
                    cycle_id,
                    error = %e,
                    "Discarding unusable cycle"
                );
                return;
            }
        };

        self.metrics.inc_cycles_completed();
        self.emit(PipelineEvent::CycleCompleted(CompletedCycle {
            device_id: closed.device_id.clone(),
            cycle_id,
            features: features.clone(),
        }))
        .await;

        let start = Instant::now();
        let prediction = {
            let model = Arc::clone(&self.model);
            let features = features.clone();
            // spawn_blocking keeps a wedged model off this worker's executor
            // thread, so the timeout actually fires and the call is
            // abandoned rather than awaited.
            tokio::time::timeout(
                self.inference_timeout,
                tokio::task::spawn_blocking(move || model.predict(&features)),
            )
            .await
        };
        self.metrics
            .observe_inference_latency(start.elapsed().as_secs_f64());

        let capacity_ah = match prediction {
            Ok(Ok(Ok(capacity_ah))) => capacity_ah,
            Ok(Ok(Err(e))) => {
                return self
                    .predictor_unavailable(&closed.device_id, cycle_id, features, e.to_string())
                    .await;
            }
            Ok(Err(e)) => {
                return self
                    .predictor_unavailable(
                        &closed.device_id,
                        cycle_id,
                        features,
                        format!("inference task failed: {e}"),
                    )
                    .await;
            }
            Err(_) => {
                return self
                    .predictor_unavailable(
                        &closed.device_id,
                        cycle_id,
                        features,
                        format!("inference timed out after {:?}", self.inference_timeout),
                    )
                    .await;
            }
        };

        let estimate =
            self.calculator
                .estimate(&closed.device_id, cycle_id, capacity_ah, self.model.version());
        let decision = self.evaluator.evaluate(&estimate);

        self.metrics.inc_predictions_generated();
        if decision.severity != AlertSeverity::None {
            self.metrics.inc_alerts_raised();
        }

        self.emit(PipelineEvent::SohEstimated { estimate, decision })
            .await;
    }

    async fn predictor_unavailable(
        &self,
        device_id: &str,
        cycle_id: u64,
        features: CycleFeatures,
        reason: String,
    ) {
        self.metrics.inc_predictor_failures();
        let err = PredictError::PredictorUnavailable {
            reason: reason.clone(),
        };
        warn!(device_id = %device_id, cycle_id, error = %err, "No SoH estimate for cycle");
        self.emit(PipelineEvent::PredictorUnavailable {
            device_id: device_id.to_string(),
            cycle_id,
            features,
            reason,
        })
        .await;
    }

    async fn emit(&self, event: PipelineEvent) {
        if self.events_tx.send(event).await.is_err() {
            debug!("Event consumer gone, discarding pipeline event");
        }
    }
}
