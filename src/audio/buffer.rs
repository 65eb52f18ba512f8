/// Rebuffers an irregular stream of capture chunks into fixed `hop_size`
/// analysis windows.
///
/// A window is only released once the buffered length strictly exceeds
/// `hop_size`, so a chunk that lands exactly on a window boundary stays
/// pending until at least one more sample arrives. Existing golden output
/// depends on that one-window delay; see DESIGN.md before changing it.
pub struct WindowAccumulator {
    hop_size: usize,
    pending: Vec<f32>,
}

impl WindowAccumulator {
    pub fn new(hop_size: usize) -> Self {
        assert!(hop_size > 0, "hop size must be non-zero");
        Self {
            hop_size,
            // Worst case between calls is one full hop plus whatever arrives next.
            pending: Vec::with_capacity(hop_size * 2),
        }
    }

    /// Samples retained since the last emitted window.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Append `chunk` and hand every complete window to `on_window`, oldest
    /// first. Returns the number of windows emitted.
    pub fn insert<F>(&mut self, chunk: &[f32], mut on_window: F) -> usize
    where
        F: FnMut(&[f32]),
    {
        self.pending.extend_from_slice(chunk);

        let mut ptr = 0;
        let mut emitted = 0;
        while ptr + self.hop_size < self.pending.len() {
            on_window(&self.pending[ptr..ptr + self.hop_size]);
            ptr += self.hop_size;
            emitted += 1;
        }

        self.pending.drain(..ptr);
        emitted
    }

    /// Drop any retained samples, e.g. when a session restarts.
    pub fn clear(&mut self) {
        self.pending.clear();
    }
}
