use crate::audio::decode::AudioData;
use crate::timeline::Playback;

/// Owns a decoded backing track and the transport state the timeline reads.
/// Mixing and output are left to whatever drives `advance`.
pub struct BackingTrack {
    audio: AudioData,
    cursor: u64,
    paused: bool,
}

impl BackingTrack {
    /// Starts paused at frame zero.
    pub fn new(audio: AudioData) -> Self {
        Self {
            audio,
            cursor: 0,
            paused: true,
        }
    }

    /// A silent track, for sessions run without backing audio.
    pub fn silent(sample_rate: u32, seconds: f64) -> Self {
        let frames = (seconds.max(0.0) * sample_rate as f64).ceil() as usize;
        Self::new(AudioData {
            samples: vec![0.0; frames],
            sample_rate,
        })
    }

    /// Move the cursor forward by up to `frames` while playing. Returns the
    /// frames actually played; nothing moves while paused or past the end.
    pub fn advance(&mut self, frames: usize) -> usize {
        if self.paused {
            return 0;
        }
        let remaining = self.total_frames().saturating_sub(self.cursor);
        let step = remaining.min(frames as u64);
        self.cursor += step;
        step as usize
    }

    pub fn total_frames(&self) -> u64 {
        self.audio.samples.len() as u64
    }

    pub fn duration(&self) -> f64 {
        self.audio.duration()
    }

    pub fn is_finished(&self) -> bool {
        self.cursor >= self.total_frames()
    }
}

impl Playback for BackingTrack {
    fn elapsed_frames(&self) -> u64 {
        self.cursor
    }

    fn sample_rate(&self) -> u32 {
        self.audio.sample_rate
    }

    fn is_paused(&self) -> bool {
        self.paused
    }

    fn toggle(&mut self) {
        self.paused = !self.paused;
    }

    fn rewind(&mut self) {
        self.cursor = 0;
        self.paused = true;
    }
}
