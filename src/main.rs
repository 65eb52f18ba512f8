mod audio;
mod chart;
mod cli;
mod config;
mod error;
mod playback;
mod scoring;
mod session;
mod songs;
mod timeline;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::time::{Duration, Instant};

use audio::analyzer::PitchAnalyzer;
use audio::decode::{decode_audio, AudioData};
use audio::feeder::{chunk_lengths, CaptureFeeder};
use audio::pitch::YinEstimator;
use chart::NoteChart;
use cli::Cli;
use playback::BackingTrack;
use scoring::ScoringEngine;
use serde::Serialize;
use session::{GameSession, LaneNote, SessionSummary, TickReport};
use timeline::{Playback, Timeline};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let mut cli = Cli::parse();

    let mut settings = config::Config::default();
    if let Some(path) = config::find_config(cli.config.as_deref()) {
        if let Some(cfg) = config::load_config(&path) {
            log::info!("Loaded config from {}", path.display());
            // Merge: config values apply only when CLI is at its default
            if cli.hop_size == 1024 { cli.hop_size = cfg.analysis.hop_size; }
            if cli.window_size == 4096 { cli.window_size = cfg.analysis.window_size; }
            if cli.tolerance == 0.5 { cli.tolerance = cfg.analysis.tolerance; }
            if cli.tick_rate == 60 { cli.tick_rate = cfg.session.tick_rate; }
            if cli.chunk_size == 512 { cli.chunk_size = cfg.session.chunk_size; }
            if cli.songs_dir.is_none() {
                cli.songs_dir = cfg.session.songs_dir.clone();
            }
            settings = cfg;
        } else {
            log::warn!("Failed to load config from {}", path.display());
        }
    }

    if cli.list_songs {
        println!("Known songs:");
        for song in songs::KNOWN_SONGS {
            println!(
                "  {:<10} {:<28} max points {:>9}  octave offset {:>3}",
                song.name, song.title, song.max_points, song.octave_offset
            );
        }
        return Ok(());
    }

    if cli.attempts == 0 {
        anyhow::bail!("--attempts must be at least 1");
    }
    config::validate(
        cli.hop_size,
        cli.window_size,
        cli.tick_rate,
        settings.scoring.smoothing_window,
    )?;

    let song = cli.song.as_deref().context("A song name or chart file is required")?;
    let songs_dir = cli.songs_dir.clone().unwrap_or_else(songs::find_songs_dir);
    let assets = songs::resolve_song(song, &songs_dir, cli.octave_offset, cli.max_points)?;
    let chart = NoteChart::load(&assets.chart, assets.options)
        .with_context(|| format!("Failed to load chart for '{}'", assets.name))?;

    let vocals = cli.vocals.as_ref().context("A vocal take is required (--vocals)")?;
    if !vocals.exists() {
        anyhow::bail!("Vocal take not found: {}", vocals.display());
    }

    log::info!("crooner - pitch-matching karaoke scorer");
    log::info!("Song: {} ({} notes, max points {})", assets.name, chart.len(), chart.max_points());
    log::info!("Vocals: {}", vocals.display());
    log::info!(
        "Analysis: hop {} / window {} / tolerance {:.2}, {} ticks/s",
        cli.hop_size, cli.window_size, cli.tolerance, cli.tick_rate
    );

    // 1. Decode audio
    let take = decode_audio(vocals)?;
    let song_length = chart.duration().max(take.duration());
    let track = match cli.backing.clone().or_else(|| assets.backing.clone()) {
        Some(path) => {
            let track = BackingTrack::new(decode_audio(&path)?);
            log::info!("Backing: {} ({:.1}s)", path.display(), track.duration());
            track
        }
        None => {
            log::info!("No backing track, using a silent clock of {:.1}s", song_length);
            BackingTrack::silent(take.sample_rate, song_length)
        }
    };

    // 2. Wire analyzer, scoring and clock together
    let estimator = YinEstimator::new(take.sample_rate, cli.window_size, cli.tolerance);
    let mut analyzer = PitchAnalyzer::with_volume_scale(
        cli.hop_size,
        Box::new(estimator),
        settings.analysis.volume_scale,
    );
    let engine = ScoringEngine::new(settings.scoring.smoothing_window, settings.scoring.volume_gate);
    let mut session = GameSession::new(chart, engine, Timeline::new(track), analyzer.handle());

    let mut trace = match cli.trace {
        Some(ref path) => Some(BufWriter::new(
            File::create(path)
                .with_context(|| format!("Failed to create trace file: {}", path.display()))?,
        )),
        None => None,
    };

    // 3. Play, restarting between attempts
    let mut best: Option<SessionSummary> = None;
    for attempt in 1..=cli.attempts {
        if attempt > 1 {
            session.restart();
        }
        log::info!(
            "Attempt {}/{}: {} notes over {:.1}s",
            attempt,
            cli.attempts,
            session.chart().len(),
            song_length
        );
        session.timeline_mut().toggle();

        let summary = if cli.realtime {
            let (summary, returned) =
                run_realtime(&mut session, analyzer, take.clone(), &cli, song_length, trace.as_mut())?;
            analyzer = returned;
            summary
        } else {
            run_offline(&mut session, &mut analyzer, &take, &cli, song_length, trace.as_mut())?
        };

        if cli.attempts > 1 {
            println!(
                "Attempt {}: score {} ({} record)",
                attempt, summary.score, summary.display_tier
            );
        }
        if best.as_ref().map_or(true, |b| summary.score > b.score) {
            best = Some(summary);
        }
    }
    let summary = best.context("No attempts were played")?;

    if let Some(mut writer) = trace {
        writer.flush()?;
    }

    // 4. Report
    log::info!(
        "Ticks: {} on-note, {} platinum, {} gold, {} missed",
        summary.stats.ticks_on_note,
        summary.stats.platinum_ticks,
        summary.stats.gold_ticks,
        summary.stats.missed_ticks
    );
    println!(
        "{}: score {} ({} record), {}/{} notes hit",
        assets.name, summary.score, summary.display_tier, summary.notes_hit, summary.notes
    );

    if let Some(ref path) = cli.json {
        let file = File::create(path)
            .with_context(|| format!("Failed to create report file: {}", path.display()))?;
        serde_json::to_writer_pretty(BufWriter::new(file), &summary)?;
        log::info!("Report written to {}", path.display());
    }

    Ok(())
}

/// Drive capture, playback and scoring from one thread on a simulated clock.
/// Deterministic for a given take and settings.
fn run_offline(
    session: &mut GameSession<BackingTrack>,
    analyzer: &mut PitchAnalyzer,
    take: &AudioData,
    cli: &Cli,
    song_length: f64,
    mut trace: Option<&mut BufWriter<File>>,
) -> Result<SessionSummary> {
    let tick_rate = cli.tick_rate as f64;
    let backing_rate = session.timeline().playback().sample_rate() as f64;
    let vocal_rate = take.sample_rate as f64;
    let total_ticks = (song_length * tick_rate).ceil() as u64;

    let pb = ProgressBar::new(total_ticks);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} ticks ({msg})")?
            .progress_chars("=>-"),
    );

    let mut lengths = chunk_lengths(cli.chunk_size);
    let mut next_len = lengths.next().unwrap_or(cli.chunk_size);
    let mut sent = 0usize;

    for tick in 1..=total_ticks {
        let t = tick as f64 / tick_rate;

        // A capture block arrives once its last sample has been recorded.
        let captured = ((t * vocal_rate) as usize).min(take.samples.len());
        loop {
            let len = next_len.min(take.samples.len() - sent);
            if len == 0 || sent + len > captured {
                break;
            }
            analyzer.on_audio(&take.samples[sent..sent + len], 1);
            sent += len;
            next_len = lengths.next().unwrap_or(cli.chunk_size);
        }

        let target = (t * backing_rate) as u64;
        let elapsed = session.timeline().playback().elapsed_frames();
        session
            .timeline_mut()
            .playback_mut()
            .advance(target.saturating_sub(elapsed) as usize);

        let report = session.tick();
        if let Some(writer) = trace.as_deref_mut() {
            write_trace(writer, &report, session.lane(report.now))?;
        }
        pb.set_position(tick);
        pb.set_message(format!("score {}", report.outcome.score));
    }

    pb.finish_with_message(format!("score {}", session.score()));
    log::info!("Analyzed {} windows", analyzer.windows());
    Ok(session.summary())
}

/// Stream the take from a capture thread while this thread ticks at
/// `tick_rate` against the wall clock.
fn run_realtime(
    session: &mut GameSession<BackingTrack>,
    analyzer: PitchAnalyzer,
    take: AudioData,
    cli: &Cli,
    song_length: f64,
    mut trace: Option<&mut BufWriter<File>>,
) -> Result<(SessionSummary, PitchAnalyzer)> {
    let backing_rate = session.timeline().playback().sample_rate() as f64;
    let period = Duration::from_secs_f64(1.0 / cli.tick_rate as f64);

    let feeder = CaptureFeeder::spawn(analyzer, take, cli.chunk_size);
    let started = Instant::now();
    let mut next_tick = started;
    let mut last_logged = 0u64;

    loop {
        next_tick += period;
        let now = Instant::now();
        if next_tick > now {
            std::thread::sleep(next_tick - now);
        }

        let target = (started.elapsed().as_secs_f64() * backing_rate) as u64;
        let elapsed = session.timeline().playback().elapsed_frames();
        session
            .timeline_mut()
            .playback_mut()
            .advance(target.saturating_sub(elapsed) as usize);

        let report = session.tick();
        if let Some(writer) = trace.as_deref_mut() {
            write_trace(writer, &report, session.lane(report.now))?;
        }

        let second = report.now as u64;
        if second > last_logged {
            last_logged = second;
            log::info!(
                "{:>5.1}s  pitch {:>5.1}  vol {:>5.1}  score {:>7}  {}",
                report.now,
                report.reading.pitch_midi,
                report.reading.volume,
                report.outcome.score,
                report.outcome.tier
            );
        }

        if report.now >= song_length || session.timeline().playback().is_finished() {
            break;
        }
    }

    if !feeder.is_finished() {
        log::debug!("Song ended before the vocal take; stopping capture");
    }
    let analyzer = feeder.stop()?;
    log::info!("Analyzed {} windows", analyzer.windows());
    Ok((session.summary(), analyzer))
}

#[derive(Serialize)]
struct TraceLine<'a> {
    #[serde(flatten)]
    report: &'a TickReport,
    lane: Vec<LaneNote>,
}

fn write_trace(writer: &mut BufWriter<File>, report: &TickReport, lane: Vec<LaneNote>) -> Result<()> {
    serde_json::to_writer(&mut *writer, &TraceLine { report, lane })?;
    writeln!(writer)?;
    Ok(())
}
