use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};

use crate::types::{BandDefinition, SpectralResult, BANDS};

/// Computes per-band spectral power over a fixed-length sample window.
///
/// The FFT plan is created once for the configured window length and reused
/// for every `analyze` call.
pub struct SpectralAnalyzer {
    fft: Arc<dyn Fft<f64>>,
    window_size: usize,
}

impl SpectralAnalyzer {
    pub fn new(window_size: usize) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(window_size);
        Self { fft, window_size }
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// Compute band powers for one full window.
    ///
    /// A window of any other length is a contract violation upstream: the
    /// window buffer guarantees the invariant, so this panics rather than
    /// returning an error.
    pub fn analyze(&self, samples: &[f64], sample_rate_hz: f64) -> SpectralResult {
        assert_eq!(
            samples.len(),
            self.window_size,
            "analysis window length does not match FFT plan"
        );

        let n = self.window_size;
        let mut buffer: Vec<Complex<f64>> =
            samples.iter().map(|&v| Complex::new(v, 0.0)).collect();
        self.fft.process(&mut buffer);

        // Keep the non-negative frequencies, normalized by window length.
        let magnitudes: Vec<f64> = buffer[..n / 2].iter().map(|c| c.norm() / n as f64).collect();
        let freq_resolution = sample_rate_hz / n as f64;

        let mut powers = [0.0; BANDS.len()];
        for (power, band) in powers.iter_mut().zip(BANDS.iter()) {
            *power = band_power(&magnitudes, freq_resolution, band);
        }
        SpectralResult::from_powers(powers)
    }
}

/// Mean squared normalized magnitude over the bins whose frequency falls in
/// the band, inclusive on both ends. Exactly zero when no bin qualifies.
fn band_power(magnitudes: &[f64], freq_resolution: f64, band: &BandDefinition) -> f64 {
    let mut sum = 0.0;
    let mut count = 0usize;
    for (k, &magnitude) in magnitudes.iter().enumerate() {
        let freq = k as f64 * freq_resolution;
        if freq >= band.low_hz && freq <= band.high_hz {
            sum += magnitude * magnitude;
            count += 1;
        }
    }
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}
