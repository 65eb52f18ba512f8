use std::collections::VecDeque;

use serde::Serialize;

use crate::chart::NoteChart;

/// Number of recent live pitches averaged into the smoothed candidate.
pub const SMOOTHING_WINDOW: usize = 30;
/// Volume at or below which the input is treated as not singing.
pub const VOLUME_GATE: f32 = 5.0;
/// Confidence the pitch indicator needs before it follows the voice.
pub const MIN_INDICATOR_CONFIDENCE: f32 = 0.7;

const PERFECT_POINTS: u32 = 100;
const PERFECT_WINDOW: f32 = 0.1;
const SLOP_WINDOW: f32 = 0.3;

/// Reward level, used both for the per-tick flash and for the cumulative
/// record display.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    #[default]
    None,
    Gold,
    Platinum,
}

impl Tier {
    /// Flash tier for the points earned on a single tick.
    pub fn from_points(points: u32) -> Self {
        match points {
            0 => Tier::None,
            p if p >= PERFECT_POINTS => Tier::Platinum,
            _ => Tier::Gold,
        }
    }

    /// Record display tier for a cumulative score.
    pub fn from_score(score: u64, chart: &NoteChart) -> Self {
        let score = score as f64;
        if score > chart.platinum_threshold() {
            Tier::Platinum
        } else if score > chart.gold_threshold() {
            Tier::Gold
        } else {
            Tier::None
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Tier::None => "none",
            Tier::Gold => "gold",
            Tier::Platinum => "platinum",
        };
        f.write_str(name)
    }
}

/// Points for singing `amount_off` semitones away from the reference at the
/// given loudness. Quiet input only scores inside the perfect window.
pub fn points_for(amount_off: f32, volume: f32, volume_gate: f32) -> u32 {
    if amount_off <= PERFECT_WINDOW {
        PERFECT_POINTS
    } else if amount_off <= SLOP_WINDOW && volume > volume_gate {
        let falloff = (amount_off - PERFECT_WINDOW) / (SLOP_WINDOW - PERFECT_WINDOW);
        (PERFECT_POINTS as f32 - falloff * PERFECT_POINTS as f32).round() as u32
    } else {
        0
    }
}

/// FIFO of the most recent live pitches.
#[derive(Clone, Debug)]
pub struct RollingPitchWindow {
    values: VecDeque<f32>,
    capacity: usize,
}

impl RollingPitchWindow {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "smoothing window must hold at least one pitch");
        Self {
            values: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, pitch: f32) {
        if self.values.len() == self.capacity {
            self.values.pop_front();
        }
        self.values.push_back(pitch);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Arithmetic mean of the current contents; 0.0 when empty.
    pub fn average(&self) -> f32 {
        if self.values.is_empty() {
            return 0.0;
        }
        self.values.iter().sum::<f32>() / self.values.len() as f32
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }
}

/// Which live pitch was compared against the reference this tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Candidate {
    Instant,
    Smoothed,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ScoreState {
    pub score: u64,
    pub current_tier: Tier,
}

/// Everything one update tick needs to know.
#[derive(Clone, Copy, Debug, Default)]
pub struct TickInput {
    pub live_pitch: f32,
    pub confidence: f32,
    pub volume: f32,
    pub now: f64,
    pub paused: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct TickOutcome {
    /// Index into the chart of the note under the now-bar.
    pub active_note: Option<usize>,
    pub candidate: Candidate,
    /// Pitch the indicator should show.
    pub indicator_pitch: f32,
    /// False when the reading is too quiet or uncertain to move the indicator.
    pub indicator_moves: bool,
    pub amount_off: Option<f32>,
    /// Points added to the score on this tick.
    pub points: u32,
    pub score: u64,
    pub tier: Tier,
    pub display_tier: Tier,
}

/// Converts live pitch readings into a running score against a chart.
pub struct ScoringEngine {
    recent: RollingPitchWindow,
    state: ScoreState,
    volume_gate: f32,
}

impl Default for ScoringEngine {
    fn default() -> Self {
        Self::new(SMOOTHING_WINDOW, VOLUME_GATE)
    }
}

impl ScoringEngine {
    pub fn new(smoothing_window: usize, volume_gate: f32) -> Self {
        Self {
            recent: RollingPitchWindow::new(smoothing_window),
            state: ScoreState::default(),
            volume_gate,
        }
    }

    pub fn state(&self) -> ScoreState {
        self.state
    }

    pub fn score(&self) -> u64 {
        self.state.score
    }

    pub fn tick(&mut self, chart: &NoteChart, input: &TickInput) -> TickOutcome {
        self.recent.push(input.live_pitch);
        let average = self.recent.average();

        let mut candidate = Candidate::Instant;
        let mut amount_off = None;
        let mut points = 0;
        let active = chart.active_note(input.now);

        match active {
            Some((index, note)) => {
                let current_off = (input.live_pitch - note.reference_pitch).abs();
                let average_off = (average - note.reference_pitch).abs();
                let off = if average_off < current_off {
                    candidate = Candidate::Smoothed;
                    average_off
                } else {
                    current_off
                };
                amount_off = Some(off);

                let earned = points_for(off, input.volume, self.volume_gate);
                if !input.paused {
                    self.state.score += earned as u64;
                    self.state.current_tier = Tier::from_points(earned);
                    points = earned;
                }
                log::trace!(
                    "note {} ref={:.2} off={:.3} ({:?} of {}) points={} paused={}",
                    index,
                    note.reference_pitch,
                    off,
                    candidate,
                    self.recent.len(),
                    earned,
                    input.paused
                );
            }
            None => {
                // Nothing to sing: feedback drops back to the miss state.
                self.state.current_tier = Tier::None;
            }
        }

        let indicator_pitch = match candidate {
            Candidate::Smoothed => average,
            Candidate::Instant => input.live_pitch,
        };

        TickOutcome {
            active_note: active.map(|(index, _)| index),
            candidate,
            indicator_pitch,
            indicator_moves: input.confidence >= MIN_INDICATOR_CONFIDENCE
                && input.volume > self.volume_gate,
            amount_off,
            points,
            score: self.state.score,
            tier: self.state.current_tier,
            display_tier: Tier::from_score(self.state.score, chart),
        }
    }

    /// Back to a fresh session: zero score, no tier, empty smoothing window.
    pub fn reset(&mut self) {
        self.recent.clear();
        self.state = ScoreState::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::{NoteChart, NoteEvent};

    fn chart(max_points: u64) -> NoteChart {
        NoteChart::from_notes(
            vec![
                NoteEvent { reference_pitch: 60.0, start_time: 1.0, duration: 2.0 },
                NoteEvent { reference_pitch: 64.0, start_time: 5.0, duration: 1.0 },
            ],
            max_points,
        )
        .unwrap()
    }

    fn input(live_pitch: f32, volume: f32, now: f64, paused: bool) -> TickInput {
        TickInput {
            live_pitch,
            confidence: 0.9,
            volume,
            now,
            paused,
        }
    }

    #[test]
    fn points_table() {
        assert_eq!(points_for(0.05, 10.0, VOLUME_GATE), 100);
        assert_eq!(points_for(0.2, 10.0, VOLUME_GATE), 50);
        assert_eq!(points_for(0.5, 10.0, VOLUME_GATE), 0);
        assert_eq!(points_for(0.05, 2.0, VOLUME_GATE), 100);
        assert_eq!(points_for(0.2, 2.0, VOLUME_GATE), 0);
        assert_eq!(points_for(0.1, 0.0, VOLUME_GATE), 100);
        assert_eq!(points_for(0.3, 10.0, VOLUME_GATE), 0);
        assert_eq!(points_for(0.2, VOLUME_GATE, VOLUME_GATE), 0);
    }

    #[test]
    fn tier_from_points() {
        assert_eq!(Tier::from_points(0), Tier::None);
        assert_eq!(Tier::from_points(1), Tier::Gold);
        assert_eq!(Tier::from_points(99), Tier::Gold);
        assert_eq!(Tier::from_points(100), Tier::Platinum);
    }

    #[test]
    fn display_tier_thresholds_are_strict() {
        let chart = chart(1000);
        assert_eq!(Tier::from_score(50, &chart), Tier::None);
        assert_eq!(Tier::from_score(51, &chart), Tier::Gold);
        assert_eq!(Tier::from_score(100, &chart), Tier::Gold);
        assert_eq!(Tier::from_score(101, &chart), Tier::Platinum);
    }

    #[test]
    fn rolling_window_evicts_oldest() {
        let mut window = RollingPitchWindow::new(SMOOTHING_WINDOW);
        for _ in 0..SMOOTHING_WINDOW {
            window.push(10.0);
        }
        assert_eq!(window.average(), 10.0);
        window.push(40.0);
        assert_eq!(window.len(), SMOOTHING_WINDOW);
        assert!((window.average() - 11.0).abs() < 1e-4);
    }

    #[test]
    fn prefers_smoothed_candidate_when_closer() {
        let chart = chart(1000);
        let mut engine = ScoringEngine::default();
        for _ in 0..4 {
            engine.tick(&chart, &input(60.0, 10.0, 0.0, false));
        }
        // Window is now [60, 60, 60, 60, 61]: average 60.2.
        let out = engine.tick(&chart, &input(61.0, 10.0, 2.0, false));
        assert_eq!(out.active_note, Some(0));
        assert_eq!(out.candidate, Candidate::Smoothed);
        assert!((out.indicator_pitch - 60.2).abs() < 1e-3);
        assert!((out.amount_off.unwrap() - 0.2).abs() < 1e-3);
        assert_eq!(out.points, 50);
        assert_eq!(out.tier, Tier::Gold);
    }

    #[test]
    fn instant_candidate_wins_ties() {
        let chart = chart(1000);
        let mut engine = ScoringEngine::default();
        let out = engine.tick(&chart, &input(60.05, 10.0, 1.5, false));
        // A single reading makes both candidates identical.
        assert_eq!(out.candidate, Candidate::Instant);
        assert_eq!(out.indicator_pitch, 60.05);
        assert_eq!(out.points, 100);
        assert_eq!(out.tier, Tier::Platinum);
    }

    #[test]
    fn no_active_note_forces_miss() {
        let chart = chart(1000);
        let mut engine = ScoringEngine::default();
        let out = engine.tick(&chart, &input(60.0, 10.0, 2.0, false));
        assert_eq!(out.tier, Tier::Platinum);

        let out = engine.tick(&chart, &input(60.0, 10.0, 4.0, false));
        assert_eq!(out.active_note, None);
        assert_eq!(out.amount_off, None);
        assert_eq!(out.points, 0);
        assert_eq!(out.tier, Tier::None);
        assert_eq!(out.score, 100);
    }

    #[test]
    fn pause_freezes_score_and_tier() {
        let chart = chart(1000);
        let mut engine = ScoringEngine::default();
        engine.tick(&chart, &input(64.0, 20.0, 5.5, false));
        assert_eq!(engine.score(), 100);

        for _ in 0..10 {
            let out = engine.tick(&chart, &input(64.0, 20.0, 5.5, true));
            assert_eq!(out.points, 0);
            assert_eq!(out.score, 100);
            assert_eq!(out.tier, Tier::Platinum);
        }
        let out = engine.tick(&chart, &input(70.0, 20.0, 5.5, true));
        assert_eq!(out.tier, Tier::Platinum);
        assert_eq!(engine.score(), 100);
    }

    #[test]
    fn score_never_decreases_while_unpaused() {
        let chart = chart(10_000);
        let mut engine = ScoringEngine::default();
        let mut last = 0;
        let pitches = [60.0, 59.8, 61.0, 60.1, 72.0, 0.0, 60.25, 63.9, 64.0, 64.3];
        for (i, &pitch) in pitches.iter().cycle().take(200).enumerate() {
            let now = (i as f64) * 0.05;
            let volume = if i % 7 == 0 { 2.0 } else { 30.0 };
            let out = engine.tick(&chart, &input(pitch, volume, now, false));
            assert!(out.score >= last);
            last = out.score;
        }
        assert!(last > 0);
    }

    #[test]
    fn display_tier_tracks_cumulative_score() {
        let chart = chart(1000);
        let mut engine = ScoringEngine::default();
        let out = engine.tick(&chart, &input(60.0, 10.0, 1.0, false));
        assert_eq!(out.score, 100);
        assert_eq!(out.display_tier, Tier::Gold);
        let out = engine.tick(&chart, &input(60.0, 10.0, 1.1, false));
        assert_eq!(out.display_tier, Tier::Platinum);
        // The display tier stays up while the flash tier drops to a miss.
        let out = engine.tick(&chart, &input(60.0, 10.0, 4.0, false));
        assert_eq!(out.tier, Tier::None);
        assert_eq!(out.display_tier, Tier::Platinum);
    }

    #[test]
    fn indicator_needs_confidence_and_volume() {
        let chart = chart(1000);
        let mut engine = ScoringEngine::default();
        let mut quiet = input(60.0, 3.0, 0.0, false);
        assert!(!engine.tick(&chart, &quiet).indicator_moves);
        quiet.volume = 8.0;
        quiet.confidence = 0.5;
        assert!(!engine.tick(&chart, &quiet).indicator_moves);
        quiet.confidence = 0.7;
        assert!(engine.tick(&chart, &quiet).indicator_moves);
    }

    #[test]
    fn reset_clears_everything() {
        let chart = chart(1000);
        let mut engine = ScoringEngine::default();
        engine.tick(&chart, &input(60.0, 10.0, 1.0, false));
        engine.reset();
        assert_eq!(engine.state(), ScoreState::default());
        let out = engine.tick(&chart, &input(61.0, 10.0, 1.0, false));
        assert_eq!(out.candidate, Candidate::Instant);
    }
}
