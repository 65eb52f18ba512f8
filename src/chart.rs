use std::path::Path;

use serde::Serialize;

use crate::error::ChartError;

/// Cumulative score above this share of `max_points` shows the gold record.
pub const GOLD_FRACTION: f64 = 0.05;
/// Cumulative score above this share of `max_points` shows the platinum record.
pub const PLATINUM_FRACTION: f64 = 0.10;

/// A reference note the singer has to match.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct NoteEvent {
    pub reference_pitch: f32,
    /// Seconds from song start.
    pub start_time: f64,
    /// Seconds.
    pub duration: f64,
}

impl NoteEvent {
    pub fn end_time(&self) -> f64 {
        self.start_time + self.duration
    }

    /// True while the note straddles the now-bar. Both edges count.
    pub fn contains(&self, now: f64) -> bool {
        self.start_time <= now && now <= self.end_time()
    }

    /// Start and end of the note relative to the now-bar, in seconds.
    /// Negative values lie to the left of (behind) the bar.
    pub fn offsets(&self, now: f64) -> (f64, f64) {
        (self.start_time - now, self.end_time() - now)
    }

    /// The whole note has scrolled past the now-bar.
    pub fn has_passed(&self, now: f64) -> bool {
        self.end_time() < now
    }
}

/// Per-chart load parameters.
#[derive(Clone, Copy, Debug)]
pub struct ChartOptions {
    /// Semitones added to every converted pitch; charts transcribed an octave
    /// high use -12.
    pub octave_offset: i32,
    /// Song-specific normalizer for the cumulative display tier.
    pub max_points: u64,
}

impl Default for ChartOptions {
    fn default() -> Self {
        Self {
            octave_offset: 0,
            max_points: 1_000_000,
        }
    }
}

/// Immutable, ordered set of reference notes for one song.
#[derive(Clone, Debug)]
pub struct NoteChart {
    notes: Vec<NoteEvent>,
    min_pitch: f32,
    max_pitch: f32,
    max_points: u64,
}

impl NoteChart {
    pub fn load(path: &Path, options: ChartOptions) -> Result<Self, ChartError> {
        let text = std::fs::read_to_string(path).map_err(|source| ChartError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let chart = Self::parse(&text, options)?;
        log::info!(
            "Loaded chart {}: {} notes, MIDI {:.1}-{:.1}, {:.1}s",
            path.display(),
            chart.len(),
            chart.min_pitch(),
            chart.max_pitch(),
            chart.duration()
        );
        Ok(chart)
    }

    /// Parse `start \t frequency_hz \t duration` lines. Blank lines are skipped.
    pub fn parse(text: &str, options: ChartOptions) -> Result<Self, ChartError> {
        let mut notes = Vec::new();
        for (idx, raw) in text.lines().enumerate() {
            let line = raw.trim_end();
            if line.is_empty() {
                continue;
            }
            notes.push(parse_line(line, idx + 1, options.octave_offset)?);
        }
        Self::from_notes(notes, options.max_points)
    }

    pub fn from_notes(notes: Vec<NoteEvent>, max_points: u64) -> Result<Self, ChartError> {
        if notes.is_empty() {
            return Err(ChartError::Empty);
        }
        if max_points == 0 {
            return Err(ChartError::ZeroMaxPoints);
        }

        let min_pitch = notes
            .iter()
            .map(|n| n.reference_pitch)
            .fold(f32::INFINITY, f32::min);
        let max_pitch = notes
            .iter()
            .map(|n| n.reference_pitch)
            .fold(f32::NEG_INFINITY, f32::max);
        if max_pitch - min_pitch <= f32::EPSILON {
            return Err(ChartError::FlatPitchRange(min_pitch));
        }

        Ok(Self {
            notes,
            min_pitch,
            max_pitch,
            max_points,
        })
    }

    pub fn notes(&self) -> &[NoteEvent] {
        &self.notes
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn min_pitch(&self) -> f32 {
        self.min_pitch
    }

    pub fn max_pitch(&self) -> f32 {
        self.max_pitch
    }

    pub fn max_points(&self) -> u64 {
        self.max_points
    }

    pub fn gold_threshold(&self) -> f64 {
        self.max_points as f64 * GOLD_FRACTION
    }

    pub fn platinum_threshold(&self) -> f64 {
        self.max_points as f64 * PLATINUM_FRACTION
    }

    /// Time at which the last note ends.
    pub fn duration(&self) -> f64 {
        self.notes
            .iter()
            .map(NoteEvent::end_time)
            .fold(0.0, f64::max)
    }

    /// First note, in chart order, that straddles the now-bar.
    pub fn active_note(&self, now: f64) -> Option<(usize, &NoteEvent)> {
        self.notes.iter().enumerate().find(|(_, n)| n.contains(now))
    }

    /// Notes overlapping the window `[now - behind, now + ahead]`, i.e. the
    /// ones a scrolling lane of that span would show.
    pub fn visible(&self, now: f64, behind: f64, ahead: f64) -> impl Iterator<Item = &NoteEvent> {
        self.notes
            .iter()
            .filter(move |n| n.start_time - now <= ahead && n.end_time() - now >= -behind)
    }

    /// Vertical lane position of `pitch`: 0.0 at `min_pitch`, 1.0 at
    /// `max_pitch`, clamped.
    pub fn lane_position(&self, pitch: f32) -> f32 {
        ((pitch - self.min_pitch) / (self.max_pitch - self.min_pitch)).clamp(0.0, 1.0)
    }
}

fn parse_line(line: &str, line_no: usize, octave_offset: i32) -> Result<NoteEvent, ChartError> {
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() != 3 {
        return Err(ChartError::Parse {
            line: line_no,
            message: format!("expected 3 tab-separated fields, found {}", fields.len()),
        });
    }

    let number = |field: &str, name: &str| -> Result<f64, ChartError> {
        let value: f64 = field.trim().parse().map_err(|_| ChartError::Parse {
            line: line_no,
            message: format!("{} '{}' is not a number", name, field),
        })?;
        if !value.is_finite() {
            return Err(ChartError::Parse {
                line: line_no,
                message: format!("{} '{}' is not finite", name, field),
            });
        }
        Ok(value)
    };

    let start_time = number(fields[0], "start time")?;
    let frequency = number(fields[1], "frequency")?;
    let duration = number(fields[2], "duration")?;

    if frequency <= 0.0 {
        return Err(ChartError::Parse {
            line: line_no,
            message: format!("frequency {} Hz has no pitch", frequency),
        });
    }
    if duration < 0.0 {
        return Err(ChartError::Parse {
            line: line_no,
            message: format!("negative duration {}", duration),
        });
    }

    let midi = 69.0 + 12.0 * (frequency / 440.0).log2() + octave_offset as f64;

    Ok(NoteEvent {
        reference_pitch: midi as f32,
        start_time,
        duration,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts(octave_offset: i32) -> ChartOptions {
        ChartOptions {
            octave_offset,
            max_points: 1000,
        }
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let path = std::env::temp_dir().join(format!("crooner-missing-{}.txt", std::process::id()));
        let _ = std::fs::remove_file(&path);
        match NoteChart::load(&path, opts(0)) {
            Err(ChartError::Io { path: reported, .. }) => assert_eq!(reported, path),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn loads_chart_from_disk() {
        let path = std::env::temp_dir().join(format!("crooner-chart-{}.txt", std::process::id()));
        std::fs::write(&path, "0.0\t440.0\t1.0\n2.0\t880.0\t0.5\n").unwrap();
        let chart = NoteChart::load(&path, opts(0)).unwrap();
        assert_eq!(chart.len(), 2);
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn loads_two_notes() {
        let chart = NoteChart::parse("0.0\t440.0\t1.0\n2.0\t880.0\t0.5\n", opts(0)).unwrap();
        assert_eq!(chart.len(), 2);
        assert!((chart.notes()[0].reference_pitch - 69.0).abs() < 1e-4);
        assert!((chart.notes()[1].reference_pitch - 81.0).abs() < 1e-4);
        assert_eq!(chart.notes()[1].start_time, 2.0);
        assert_eq!(chart.notes()[1].duration, 0.5);
        assert!((chart.min_pitch() - 69.0).abs() < 1e-4);
        assert!((chart.max_pitch() - 81.0).abs() < 1e-4);
        assert!((chart.duration() - 2.5).abs() < 1e-9);
    }

    #[test]
    fn octave_offset_lowers_every_note() {
        let chart = NoteChart::parse("0.0\t440.0\t1.0\n2.0\t880.0\t0.5", opts(-12)).unwrap();
        assert!((chart.notes()[0].reference_pitch - 57.0).abs() < 1e-4);
        assert!((chart.min_pitch() - 57.0).abs() < 1e-4);
        assert!((chart.max_pitch() - 69.0).abs() < 1e-4);
    }

    #[test]
    fn trims_trailing_whitespace_and_skips_blank_lines() {
        let chart = NoteChart::parse("0.0\t440.0\t1.0  \r\n\n1.0\t220.0\t1.0\t\n", opts(0));
        // A trailing tab is whitespace, so the second line still has 3 fields.
        let chart = chart.unwrap();
        assert_eq!(chart.len(), 2);
    }

    #[test]
    fn rejects_wrong_field_count() {
        let err = NoteChart::parse("0.0\t440.0\t1.0\n1.0\t440.0\n", opts(0)).unwrap_err();
        match err {
            ChartError::Parse { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected error: {other}"),
        }
        assert!(matches!(
            NoteChart::parse("0.0\t440.0\t1.0\t9\n", opts(0)),
            Err(ChartError::Parse { line: 1, .. })
        ));
    }

    #[test]
    fn rejects_non_numeric_and_non_finite() {
        assert!(matches!(
            NoteChart::parse("zero\t440.0\t1.0", opts(0)),
            Err(ChartError::Parse { .. })
        ));
        assert!(matches!(
            NoteChart::parse("0.0\tinf\t1.0", opts(0)),
            Err(ChartError::Parse { .. })
        ));
        assert!(matches!(
            NoteChart::parse("0.0\t0.0\t1.0", opts(0)),
            Err(ChartError::Parse { .. })
        ));
    }

    #[test]
    fn rejects_degenerate_charts() {
        assert!(matches!(NoteChart::parse("", opts(0)), Err(ChartError::Empty)));
        assert!(matches!(NoteChart::parse("\n\n", opts(0)), Err(ChartError::Empty)));
        assert!(matches!(
            NoteChart::parse("0.0\t440.0\t1.0\n1.0\t440.0\t1.0", opts(0)),
            Err(ChartError::FlatPitchRange(_))
        ));
        assert!(matches!(
            NoteChart::parse(
                "0.0\t440.0\t1.0\n1.0\t880.0\t1.0",
                ChartOptions { octave_offset: 0, max_points: 0 }
            ),
            Err(ChartError::ZeroMaxPoints)
        ));
    }

    #[test]
    fn active_note_uses_containment_not_index() {
        let chart = NoteChart::parse(
            "0.0\t440.0\t1.0\n3.0\t880.0\t1.0\n1.5\t220.0\t0.5",
            opts(0),
        )
        .unwrap();
        assert_eq!(chart.active_note(0.5).map(|(i, _)| i), Some(0));
        assert_eq!(chart.active_note(1.0).map(|(i, _)| i), Some(0));
        assert!(chart.active_note(1.2).is_none());
        assert_eq!(chart.active_note(1.75).map(|(i, _)| i), Some(2));
        assert_eq!(chart.active_note(3.5).map(|(i, _)| i), Some(1));
        assert!(chart.active_note(10.0).is_none());
    }

    #[test]
    fn visible_window_and_offsets() {
        let chart = NoteChart::parse("0.0\t440.0\t1.0\n5.0\t880.0\t1.0", opts(0)).unwrap();
        let shown: Vec<_> = chart.visible(2.0, 0.5, 2.0).collect();
        assert!(shown.is_empty());
        let shown: Vec<_> = chart.visible(3.5, 0.5, 2.0).collect();
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].start_time, 5.0);

        let note = chart.notes()[1];
        assert_eq!(note.offsets(4.0), (1.0, 2.0));
        assert!(!note.has_passed(6.0));
        assert!(note.has_passed(6.5));
    }

    #[test]
    fn lane_position_is_clamped() {
        let chart = NoteChart::parse("0.0\t440.0\t1.0\n2.0\t880.0\t0.5", opts(0)).unwrap();
        assert_eq!(chart.lane_position(69.0), 0.0);
        assert_eq!(chart.lane_position(81.0), 1.0);
        assert!((chart.lane_position(75.0) - 0.5).abs() < 1e-4);
        assert_eq!(chart.lane_position(40.0), 0.0);
        assert_eq!(chart.lane_position(100.0), 1.0);
    }

    #[test]
    fn thresholds_follow_max_points() {
        let chart = NoteChart::parse(
            "0.0\t440.0\t1.0\n2.0\t880.0\t0.5",
            ChartOptions { octave_offset: 0, max_points: 902_500 },
        )
        .unwrap();
        assert!((chart.gold_threshold() - 45_125.0).abs() < 1e-6);
        assert!((chart.platinum_threshold() - 90_250.0).abs() < 1e-6);
    }
}
