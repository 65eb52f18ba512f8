/// The backing-track player as seen by the game: a frame cursor plus
/// transport controls.
pub trait Playback {
    fn elapsed_frames(&self) -> u64;
    fn sample_rate(&self) -> u32;
    fn is_paused(&self) -> bool;
    fn toggle(&mut self);
    /// Seek back to frame zero, paused.
    fn rewind(&mut self);
}

/// Song clock. Reads through to the playback cursor and guarantees the
/// value it hands out never moves backward outside of `restart`.
pub struct Timeline<P: Playback> {
    playback: P,
    last_now: f64,
}

impl<P: Playback> Timeline<P> {
    pub fn new(playback: P) -> Self {
        Self {
            playback,
            last_now: 0.0,
        }
    }

    /// Seconds since song start.
    pub fn now(&mut self) -> f64 {
        let sample_rate = self.playback.sample_rate();
        if sample_rate == 0 {
            return self.last_now;
        }
        let raw = self.playback.elapsed_frames() as f64 / sample_rate as f64;
        if raw < self.last_now {
            log::warn!(
                "Playback cursor moved backward ({:.3}s -> {:.3}s); holding timeline",
                self.last_now, raw
            );
            return self.last_now;
        }
        self.last_now = raw;
        raw
    }

    pub fn is_paused(&self) -> bool {
        self.playback.is_paused()
    }

    pub fn toggle(&mut self) {
        self.playback.toggle();
        log::info!(
            "Playback {} at {:.2}s",
            if self.playback.is_paused() { "paused" } else { "resumed" },
            self.last_now
        );
    }

    /// Back to the top of the song. The only way time moves backward.
    pub fn restart(&mut self) {
        self.playback.rewind();
        self.last_now = 0.0;
    }

    pub fn playback(&self) -> &P {
        &self.playback
    }

    pub fn playback_mut(&mut self) -> &mut P {
        &mut self.playback
    }
}
