use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;
use serde::Serialize;

use super::buffer::WindowAccumulator;
use super::pitch::PitchEstimator;

/// Loudness multiplier applied to window RMS so sung input lands in the
/// tens-to-low-hundreds range.
pub const VOLUME_SCALE: f32 = 500.0;

/// The latest analysis result. Always replaced as a whole.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct PitchReading {
    pub pitch_midi: f32,
    pub confidence: f32,
    pub volume: f32,
}

/// Read side of the analyzer, safe to clone onto the game-logic thread.
#[derive(Clone)]
pub struct ReadingHandle {
    slot: Arc<ArcSwap<PitchReading>>,
    reset: Arc<AtomicBool>,
}

impl ReadingHandle {
    /// Snapshot of the most recently published reading. All three fields
    /// come from the same window.
    pub fn load(&self) -> PitchReading {
        **self.slot.load()
    }

    /// Publish silence now and have the analyzer drop its buffered audio and
    /// estimator history before it analyzes anything else.
    pub fn request_reset(&self) {
        self.reset.store(true, Ordering::Release);
        self.slot.store(Arc::new(PitchReading::default()));
    }
}

/// Turns captured audio into pitch/confidence/volume readings, one per
/// analysis window.
pub struct PitchAnalyzer {
    accumulator: WindowAccumulator,
    estimator: Box<dyn PitchEstimator>,
    volume_scale: f32,
    slot: Arc<ArcSwap<PitchReading>>,
    reset: Arc<AtomicBool>,
    windows: u64,
}

impl PitchAnalyzer {
    #[cfg(test)]
    pub fn new(hop_size: usize, estimator: Box<dyn PitchEstimator>) -> Self {
        Self::with_volume_scale(hop_size, estimator, VOLUME_SCALE)
    }

    pub fn with_volume_scale(
        hop_size: usize,
        estimator: Box<dyn PitchEstimator>,
        volume_scale: f32,
    ) -> Self {
        Self {
            accumulator: WindowAccumulator::new(hop_size),
            estimator,
            volume_scale,
            slot: Arc::new(ArcSwap::from_pointee(PitchReading::default())),
            reset: Arc::new(AtomicBool::new(false)),
            windows: 0,
        }
    }

    pub fn handle(&self) -> ReadingHandle {
        ReadingHandle {
            slot: Arc::clone(&self.slot),
            reset: Arc::clone(&self.reset),
        }
    }

    #[cfg(test)]
    pub fn reading(&self) -> PitchReading {
        **self.slot.load()
    }

    /// Number of windows analyzed so far.
    pub fn windows(&self) -> u64 {
        self.windows
    }

    /// Capture callback entry point. Only mono input is accepted; downmixing
    /// belongs to the caller.
    pub fn on_audio(&mut self, chunk: &[f32], num_channels: u16) {
        assert_eq!(
            num_channels, 1,
            "pitch analyzer requires mono capture, got {} channels",
            num_channels
        );
        self.insert(chunk);
    }

    pub fn insert(&mut self, chunk: &[f32]) {
        if self.reset.swap(false, Ordering::AcqRel) {
            self.reset();
        }
        let estimator = &mut self.estimator;
        let slot = &self.slot;
        let volume_scale = self.volume_scale;
        let emitted = self.accumulator.insert(chunk, |window| {
            let estimate = estimator.estimate(window);
            slot.store(Arc::new(PitchReading {
                pitch_midi: estimate.pitch_midi,
                confidence: estimate.confidence,
                volume: rms(window) * volume_scale,
            }));
        });
        self.windows += emitted as u64;
    }

    /// Clear buffered audio and estimator history and publish a zero reading.
    pub fn reset(&mut self) {
        log::debug!(
            "Resetting pitch analyzer, dropping {} buffered samples",
            self.accumulator.pending_len()
        );
        self.accumulator.clear();
        self.estimator.reset();
        self.slot.store(Arc::new(PitchReading::default()));
    }
}

fn rms(window: &[f32]) -> f32 {
    if window.is_empty() {
        return 0.0;
    }
    (window.iter().map(|s| s * s).sum::<f32>() / window.len() as f32).sqrt()
}
