use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};

/// Default lookback of the YIN estimator, in samples.
pub const DEFAULT_WINDOW_SIZE: usize = 4096;
/// Default stride between estimates, in samples.
pub const DEFAULT_HOP_SIZE: usize = 1024;
/// Default YIN dip threshold.
pub const DEFAULT_TOLERANCE: f32 = 0.5;
/// Smallest lookback the YIN estimator accepts.
pub const MIN_WINDOW_SIZE: usize = 8;

/// One estimator output: pitch in MIDI semitones (0.0 when unvoiced) and a
/// confidence in [0, 1].
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PitchEstimate {
    pub pitch_midi: f32,
    pub confidence: f32,
}

/// Pitch estimation seam. Implementations keep whatever lookback they need
/// internally and are fed one hop at a time; for a fixed input history the
/// output is deterministic.
pub trait PitchEstimator: Send {
    fn estimate(&mut self, hop: &[f32]) -> PitchEstimate;

    /// Forget any retained history.
    fn reset(&mut self) {}
}

/// MIDI pitch for a frequency in Hz (69.0 = A4 = 440 Hz). Frequencies outside
/// the audible band map to 0.0, the "no pitch" value.
pub fn hz_to_midi(freq: f32) -> f32 {
    if !(2.0..=100_000.0).contains(&freq) {
        return 0.0;
    }
    69.0 + 12.0 * (freq / 440.0).log2()
}

/// YIN fundamental-frequency estimator.
///
/// The squared-difference function is computed as
/// `d(tau) = e(0) + e(tau) - 2 r(tau)` with the cross term `r` obtained
/// through one forward/inverse FFT pair per hop.
pub struct YinEstimator {
    sample_rate: u32,
    tolerance: f32,
    history: Vec<f32>,
    forward: Arc<dyn Fft<f32>>,
    inverse: Arc<dyn Fft<f32>>,
    signal_spec: Vec<Complex<f32>>,
    kernel_spec: Vec<Complex<f32>>,
    cmnd: Vec<f32>,
}

impl YinEstimator {
    pub fn new(sample_rate: u32, window_size: usize, tolerance: f32) -> Self {
        assert!(
            window_size >= MIN_WINDOW_SIZE,
            "YIN window must hold at least {} samples",
            MIN_WINDOW_SIZE
        );
        let mut planner = FftPlanner::<f32>::new();
        let forward = planner.plan_fft_forward(window_size);
        let inverse = planner.plan_fft_inverse(window_size);

        log::debug!(
            "YIN estimator: sample_rate={}, window_size={}, tolerance={:.2}",
            sample_rate, window_size, tolerance
        );

        Self {
            sample_rate,
            tolerance,
            history: vec![0.0; window_size],
            forward,
            inverse,
            signal_spec: vec![Complex::new(0.0, 0.0); window_size],
            kernel_spec: vec![Complex::new(0.0, 0.0); window_size],
            cmnd: vec![1.0; window_size / 2],
        }
    }

    fn push_history(&mut self, hop: &[f32]) {
        let n = self.history.len();
        if hop.len() >= n {
            self.history.copy_from_slice(&hop[hop.len() - n..]);
        } else {
            self.history.copy_within(hop.len().., 0);
            self.history[n - hop.len()..].copy_from_slice(hop);
        }
    }

    /// Fill `self.cmnd` with the cumulative-mean-normalized difference.
    /// Returns false when the window carries no energy.
    fn compute_cmnd(&mut self) -> bool {
        let n = self.history.len();
        let half = n / 2;
        let x = &self.history;

        let e0: f32 = x[..half].iter().map(|s| s * s).sum();
        if e0 <= 1e-10 {
            return false;
        }

        for (i, slot) in self.signal_spec.iter_mut().enumerate() {
            *slot = Complex::new(x[i], 0.0);
        }
        for (i, slot) in self.kernel_spec.iter_mut().enumerate() {
            *slot = Complex::new(if i < half { x[i] } else { 0.0 }, 0.0);
        }
        self.forward.process(&mut self.signal_spec);
        self.forward.process(&mut self.kernel_spec);
        for (s, k) in self.signal_spec.iter_mut().zip(self.kernel_spec.iter()) {
            *s *= k.conj();
        }
        self.inverse.process(&mut self.signal_spec);
        let norm = 1.0 / n as f32;

        let mut energy_tau = e0;
        let mut running = 0.0f32;
        self.cmnd[0] = 1.0;
        for tau in 1..half {
            energy_tau += x[tau + half - 1] * x[tau + half - 1] - x[tau - 1] * x[tau - 1];
            let cross = self.signal_spec[tau].re * norm;
            let diff = (e0 + energy_tau - 2.0 * cross).max(0.0);
            running += diff;
            self.cmnd[tau] = if running > 0.0 {
                diff * tau as f32 / running
            } else {
                1.0
            };
        }
        true
    }

    /// First local minimum under the tolerance, else the global minimum.
    fn pick_period(&self) -> usize {
        let last = self.cmnd.len() - 1;
        for tau in 2..last {
            if self.cmnd[tau] < self.tolerance && self.cmnd[tau] < self.cmnd[tau + 1] {
                return tau;
            }
        }
        (2..=last)
            .min_by(|&a, &b| self.cmnd[a].total_cmp(&self.cmnd[b]))
            .unwrap_or(2)
    }

    fn refine(&self, tau: usize) -> f32 {
        if tau == 0 || tau + 1 >= self.cmnd.len() {
            return tau as f32;
        }
        let (y0, y1, y2) = (self.cmnd[tau - 1], self.cmnd[tau], self.cmnd[tau + 1]);
        let denom = y0 - 2.0 * y1 + y2;
        if denom.abs() < 1e-12 {
            tau as f32
        } else {
            tau as f32 + 0.5 * (y0 - y2) / denom
        }
    }
}

impl PitchEstimator for YinEstimator {
    fn estimate(&mut self, hop: &[f32]) -> PitchEstimate {
        self.push_history(hop);
        if !self.compute_cmnd() {
            return PitchEstimate::default();
        }

        let tau = self.pick_period();
        let confidence = (1.0 - self.cmnd[tau]).clamp(0.0, 1.0);
        let period = self.refine(tau);
        let pitch_midi = if period > 0.0 {
            hz_to_midi(self.sample_rate as f32 / period)
        } else {
            0.0
        };

        PitchEstimate {
            pitch_midi,
            confidence,
        }
    }

    fn reset(&mut self) {
        self.history.fill(0.0);
    }
}
