use std::f64::consts::PI;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use rand::Rng;
use tracing::info;

use crate::error::{StreamError, StreamResult};
use crate::ingest::IngestionBridge;
use crate::types::{RawSample, CHANNEL_COUNT};

/// Boundary to the acquisition hardware.
///
/// Implementations own their delivery thread and push one [`RawSample`] per
/// device tick into the bridge. The pipeline never calls back into a source,
/// mirroring how a vendor driver invokes a data callback on a thread it owns.
pub trait SampleSource: Send {
    /// Begin delivering samples into the bridge from the source's own thread.
    fn start(&mut self, bridge: IngestionBridge) -> StreamResult<()>;

    /// Stop delivery and wait for the delivery thread to exit.
    fn stop(&mut self) -> StreamResult<()>;

    fn is_running(&self) -> bool;
}

/// Signal generator standing in for the acquisition device.
///
/// Emits a 10 Hz alpha-band sine on `e0`, progressively slower rhythms on
/// the remaining electrodes, a slow skin-conductance drift on `gsr` and a
/// near-constant skin temperature on `tmp`, all with a little measurement
/// noise, paced at the configured rate on a dedicated thread.
pub struct SyntheticSource {
    sample_rate_hz: f64,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl SyntheticSource {
    pub fn new(sample_rate_hz: f64) -> Self {
        Self {
            sample_rate_hz,
            stop: Arc::new(AtomicBool::new(false)),
            handle: None,
        }
    }

    fn generate(t: f64, rng: &mut impl Rng) -> [f64; CHANNEL_COUNT] {
        let mut values = [0.0; CHANNEL_COUNT];

        // Eight electrodes: decreasing dominant frequency across the strip.
        let electrode_hz = [10.0, 9.0, 8.5, 7.0, 6.0, 5.0, 4.0, 2.0];
        for (value, hz) in values[..8].iter_mut().zip(electrode_hz) {
            let rhythm = 20.0 * (2.0 * PI * hz * t).sin();
            let mains_bleed = 1.5 * (2.0 * PI * 50.0 * t).sin();
            *value = rhythm + mains_bleed + rng.random_range(-2.0..2.0);
        }

        // Skin conductance drifts on the order of tens of seconds.
        values[8] = 2.0 + 0.3 * (2.0 * PI * 0.05 * t).sin() + rng.random_range(-0.01..0.01);
        // Skin temperature is essentially flat.
        values[9] = 36.6 + 0.05 * (2.0 * PI * 0.01 * t).sin() + rng.random_range(-0.02..0.02);

        values
    }
}

impl SampleSource for SyntheticSource {
    fn start(&mut self, bridge: IngestionBridge) -> StreamResult<()> {
        if self.handle.is_some() {
            return Err(StreamError::AlreadyRunning);
        }

        self.stop.store(false, Ordering::Release);
        let stop = Arc::clone(&self.stop);
        let sample_rate_hz = self.sample_rate_hz;

        let handle = thread::Builder::new()
            .name("synthetic-source".to_string())
            .spawn(move || {
                info!(rate_hz = sample_rate_hz, "synthetic source started");
                let period = Duration::from_secs_f64(1.0 / sample_rate_hz);
                let started = Instant::now();
                let mut rng = rand::rng();
                let mut tick: u64 = 0;
                let mut next_tick = Instant::now() + period;

                while !stop.load(Ordering::Acquire) {
                    let t = tick as f64 / sample_rate_hz;
                    bridge.submit(RawSample::new(Self::generate(t, &mut rng)));
                    tick += 1;

                    let now = Instant::now();
                    if next_tick > now {
                        thread::sleep(next_tick - now);
                    }
                    next_tick += period;
                }
                info!(
                    samples = tick,
                    elapsed_seconds = started.elapsed().as_secs(),
                    "synthetic source stopped"
                );
            })?;

        self.handle = Some(handle);
        Ok(())
    }

    fn stop(&mut self) -> StreamResult<()> {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            handle.join().map_err(|_| StreamError::SourcePanicked)?;
        }
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.handle.is_some()
    }
}

impl Drop for SyntheticSource {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delivers_paced_samples_with_increasing_timestamps() {
        let bridge = IngestionBridge::with_capacity(8192);
        let mut source = SyntheticSource::new(2000.0);

        source.start(bridge.clone()).unwrap();
        thread::sleep(Duration::from_millis(200));
        source.stop().unwrap();

        let samples = bridge.drain(8192);
        // 200 ms at 2 kHz nominal; accept generous scheduling slack.
        assert!(samples.len() >= 100, "only {} samples", samples.len());

        for pair in samples.windows(2) {
            assert!(pair[0].ts_ns <= pair[1].ts_ns);
        }
    }

    #[test]
    fn double_start_is_rejected() {
        let bridge = IngestionBridge::with_capacity(64);
        let mut source = SyntheticSource::new(500.0);

        source.start(bridge.clone()).unwrap();
        assert!(matches!(
            source.start(bridge),
            Err(StreamError::AlreadyRunning)
        ));
        source.stop().unwrap();
        assert!(!source.is_running());
    }

    #[test]
    fn stop_without_start_is_ok() {
        let mut source = SyntheticSource::new(500.0);
        source.stop().unwrap();
    }

    #[test]
    fn electrode_values_stay_in_plausible_range() {
        let mut rng = rand::rng();
        for tick in 0..1000 {
            let values = SyntheticSource::generate(tick as f64 / 250.0, &mut rng);
            for value in &values[..8] {
                assert!(value.abs() < 30.0);
            }
            assert!(values[9] > 36.0 && values[9] < 37.0);
        }
    }
}
