use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use crossbeam_channel::{bounded, select, Receiver, Sender};

use super::analyzer::PitchAnalyzer;
use super::decode::AudioData;

/// Relative chunk sizes cycled through to mimic a capture callback whose
/// block size drifts between calls.
const CHUNK_PATTERN: [f32; 6] = [1.0, 0.5, 1.5, 0.75, 1.25, 1.0];

/// Endless sequence of irregular chunk lengths around `base`.
pub fn chunk_lengths(base: usize) -> impl Iterator<Item = usize> {
    let base = base.max(1);
    CHUNK_PATTERN
        .iter()
        .cycle()
        .enumerate()
        .map(move |(i, f)| ((base as f32 * f) as usize + i % 2).max(1))
}

/// Streams a recorded take into a `PitchAnalyzer` from a background thread
/// at real-time pace, standing in for a microphone callback.
///
/// The thread stops on its own at the end of the take, or as soon as the
/// stop channel disconnects, even while it is waiting for the next chunk.
pub struct CaptureFeeder {
    stop: Option<Sender<()>>,
    done: Receiver<()>,
    handle: Option<JoinHandle<PitchAnalyzer>>,
}

impl CaptureFeeder {
    pub fn spawn(mut analyzer: PitchAnalyzer, take: AudioData, chunk_size: usize) -> Self {
        let (stop_tx, stop_rx) = bounded::<()>(0);
        let (done_tx, done_rx) = bounded::<()>(1);

        let handle = std::thread::spawn(move || {
            let sample_rate = take.sample_rate.max(1) as f64;
            let started = Instant::now();
            let mut sent = 0usize;
            let mut lengths = chunk_lengths(chunk_size);

            while sent < take.samples.len() {
                let due = started + Duration::from_secs_f64(sent as f64 / sample_rate);
                let wait = due.saturating_duration_since(Instant::now());
                let cancelled = select! {
                    recv(stop_rx) -> _ => true,
                    default(wait) => false,
                };
                if cancelled {
                    log::debug!("Capture feeder cancelled after {} samples", sent);
                    break;
                }

                let len = lengths.next().unwrap_or(chunk_size).min(take.samples.len() - sent);
                analyzer.on_audio(&take.samples[sent..sent + len], 1);
                sent += len;
            }

            let _ = done_tx.send(());
            analyzer
        });

        Self {
            stop: Some(stop_tx),
            done: done_rx,
            handle: Some(handle),
        }
    }

    /// True once the whole take has been delivered (or the feeder was stopped).
    pub fn is_finished(&self) -> bool {
        !self.done.is_empty()
    }

    /// Signal shutdown, wait for the thread and hand the analyzer back.
    pub fn stop(mut self) -> Result<PitchAnalyzer> {
        drop(self.stop.take());
        self.handle
            .take()
            .ok_or_else(|| anyhow!("capture feeder already joined"))?
            .join()
            .map_err(|_| anyhow!("capture feeder thread panicked"))
    }
}

impl Drop for CaptureFeeder {
    fn drop(&mut self) {
        drop(self.stop.take());
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
