use tokio::time::{interval, Duration};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::hub::BroadcastHub;
use crate::ingest::IngestionBridge;
use crate::spectral::SpectralAnalyzer;
use crate::types::{EnrichedFrame, RawSample, SpectralResult};
use crate::window::WindowBuffer;

/// Pipeline tuning knobs, normally derived from [`crate::config::ServerConfig`].
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub sample_rate_hz: f64,
    pub window_size: usize,
    pub drain_interval: Duration,
    pub drain_batch: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: 250.0,
            window_size: 256,
            drain_interval: Duration::from_millis(2),
            drain_batch: 64,
        }
    }
}

/// Single-owner stage of the stream: windowing, spectral analysis and frame
/// enrichment all run on one task and share no state with other threads.
///
/// Once the window has filled for the first time it stays full, so band
/// powers are recomputed on every incoming sample over the latest window.
/// That per-sample FFT is the shape subscribers expect and the dominant
/// per-tick cost.
pub struct Pipeline {
    bridge: IngestionBridge,
    hub: BroadcastHub,
    window: WindowBuffer,
    analyzer: SpectralAnalyzer,
    latest_bands: Option<SpectralResult>,
    sample_rate_hz: f64,
    drain_interval: Duration,
    drain_batch: usize,
}

impl Pipeline {
    pub fn new(config: PipelineConfig, bridge: IngestionBridge, hub: BroadcastHub) -> Self {
        Self {
            bridge,
            hub,
            window: WindowBuffer::new(config.window_size),
            analyzer: SpectralAnalyzer::new(config.window_size),
            latest_bands: None,
            sample_rate_hz: config.sample_rate_hz,
            drain_interval: config.drain_interval,
            drain_batch: config.drain_batch,
        }
    }

    /// Fold one sample into the window and produce the frame to broadcast.
    pub fn enrich(&mut self, sample: RawSample) -> EnrichedFrame {
        self.window.push(sample.analysis_value());
        if self.window.is_full() {
            self.latest_bands = Some(
                self.analyzer
                    .analyze(&self.window.snapshot(), self.sample_rate_hz),
            );
        }
        EnrichedFrame {
            sample,
            bands: self.latest_bands,
        }
    }

    /// Run until cancelled, draining the bridge and broadcasting each frame
    /// in submission order.
    pub async fn run(mut self, cancel: CancellationToken) {
        info!(
            window = self.window.capacity(),
            rate_hz = self.sample_rate_hz,
            "pipeline started"
        );
        let mut tick = interval(self.drain_interval);

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    break;
                }

                _ = tick.tick() => {
                    for sample in self.bridge.drain(self.drain_batch) {
                        let frame = self.enrich(sample);
                        self.hub.publish(&frame);
                    }
                }
            }
        }

        let discarded = self.bridge.discard_queued();
        if discarded > 0 {
            debug!(discarded, "discarded queued samples at shutdown");
        }
        info!("pipeline stopped");
    }
}
