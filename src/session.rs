use serde::Serialize;

use crate::audio::analyzer::{PitchReading, ReadingHandle};
use crate::chart::NoteChart;
use crate::scoring::{ScoringEngine, TickInput, TickOutcome, Tier};
use crate::timeline::{Playback, Timeline};

/// What the renderer gets once per tick.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct TickReport {
    pub now: f64,
    pub paused: bool,
    pub reading: PitchReading,
    pub outcome: TickOutcome,
    /// Indicator height in the note lane, 0.0 (lowest chart pitch) to 1.0.
    pub lane_position: f32,
}

/// Seconds of chart shown behind and ahead of the now-bar.
pub const LANE_BEHIND: f64 = 2.0;
pub const LANE_AHEAD: f64 = 4.0;

/// A note as placed in the scrolling lane.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct LaneNote {
    pub reference_pitch: f32,
    /// Seconds from the now-bar; negative is behind it.
    pub start_offset: f64,
    pub end_offset: f64,
    pub height: f32,
    pub passed: bool,
}

#[derive(Clone, Copy, Debug, Default, Serialize)]
pub struct SessionStats {
    pub ticks: u64,
    pub paused_ticks: u64,
    pub ticks_on_note: u64,
    pub platinum_ticks: u64,
    pub gold_ticks: u64,
    pub missed_ticks: u64,
}

#[derive(Clone, Debug, Serialize)]
pub struct SessionSummary {
    pub score: u64,
    pub max_points: u64,
    pub display_tier: Tier,
    pub notes: usize,
    pub notes_hit: usize,
    pub stats: SessionStats,
}

/// One song being played: chart, clock, live readings and score.
pub struct GameSession<P: Playback> {
    chart: NoteChart,
    engine: ScoringEngine,
    timeline: Timeline<P>,
    reading: ReadingHandle,
    stats: SessionStats,
    notes_hit: Vec<bool>,
    last_note: Option<usize>,
}

impl<P: Playback> GameSession<P> {
    pub fn new(
        chart: NoteChart,
        engine: ScoringEngine,
        timeline: Timeline<P>,
        reading: ReadingHandle,
    ) -> Self {
        let notes_hit = vec![false; chart.len()];
        Self {
            chart,
            engine,
            timeline,
            reading,
            stats: SessionStats::default(),
            notes_hit,
            last_note: None,
        }
    }

    pub fn chart(&self) -> &NoteChart {
        &self.chart
    }

    pub fn timeline(&self) -> &Timeline<P> {
        &self.timeline
    }

    pub fn timeline_mut(&mut self) -> &mut Timeline<P> {
        &mut self.timeline
    }

    pub fn score(&self) -> u64 {
        self.engine.score()
    }

    /// Run one scoring pass against the latest reading and the current time.
    pub fn tick(&mut self) -> TickReport {
        let reading = self.reading.load();
        let now = self.timeline.now();
        let paused = self.timeline.is_paused();

        let outcome = self.engine.tick(
            &self.chart,
            &TickInput {
                live_pitch: reading.pitch_midi,
                confidence: reading.confidence,
                volume: reading.volume,
                now,
                paused,
            },
        );

        self.record(&outcome, paused);
        if outcome.active_note != self.last_note {
            if let Some(index) = outcome.active_note {
                let note = &self.chart.notes()[index];
                log::debug!(
                    "Note {} at {:.2}s: MIDI {:.2} for {:.2}s",
                    index, note.start_time, note.reference_pitch, note.duration
                );
            }
            self.last_note = outcome.active_note;
        }

        TickReport {
            now,
            paused,
            reading,
            outcome,
            lane_position: self.chart.lane_position(outcome.indicator_pitch),
        }
    }

    fn record(&mut self, outcome: &TickOutcome, paused: bool) {
        self.stats.ticks += 1;
        if paused {
            self.stats.paused_ticks += 1;
            return;
        }
        let Some(index) = outcome.active_note else {
            return;
        };
        self.stats.ticks_on_note += 1;
        match outcome.tier {
            Tier::Platinum => self.stats.platinum_ticks += 1,
            Tier::Gold => self.stats.gold_ticks += 1,
            Tier::None => self.stats.missed_ticks += 1,
        }
        if outcome.points > 0 {
            self.notes_hit[index] = true;
        }
    }

    /// Notes currently on screen for a lane spanning `LANE_BEHIND` to
    /// `LANE_AHEAD` seconds around `now`.
    pub fn lane(&self, now: f64) -> Vec<LaneNote> {
        self.chart
            .visible(now, LANE_BEHIND, LANE_AHEAD)
            .map(|note| {
                let (start_offset, end_offset) = note.offsets(now);
                LaneNote {
                    reference_pitch: note.reference_pitch,
                    start_offset,
                    end_offset,
                    height: self.chart.lane_position(note.reference_pitch),
                    passed: note.has_passed(now),
                }
            })
            .collect()
    }

    /// Leave the song and come back fresh: score, smoothing history, stats,
    /// the clock and the analyzer's buffered audio all go back to zero.
    pub fn restart(&mut self) {
        log::info!("Restarting session (score was {})", self.engine.score());
        self.engine.reset();
        self.reading.request_reset();
        self.timeline.restart();
        self.stats = SessionStats::default();
        self.notes_hit.fill(false);
        self.last_note = None;
    }

    pub fn summary(&self) -> SessionSummary {
        let score = self.engine.state().score;
        SessionSummary {
            score,
            max_points: self.chart.max_points(),
            display_tier: Tier::from_score(score, &self.chart),
            notes: self.chart.len(),
            notes_hit: self.notes_hit.iter().filter(|&&hit| hit).count(),
            stats: self.stats,
        }
    }
}
