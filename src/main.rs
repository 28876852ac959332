//! chordsmith CLI - render notes, chords and scales to WAV files

use std::path::PathBuf;
use std::process::ExitCode;

use chordsmith::batch::{BatchRunner, RenderJob};
use chordsmith::config::RenderConfig;
use chordsmith::dsp::renderer::{ChordRequest, NoteRequest, Renderer, ScaleRequest};
use chordsmith::pitch::parse_pitch;
use chordsmith::sink::{PlaybackSink, WavFileSink};
use clap::{Parser, Subcommand};
use tracing::info;

#[derive(Parser)]
#[command(name = "chordsmith")]
#[command(about = "Additive synthesis of notes, chords and scales", long_about = None)]
struct Cli {
    /// JSON render config (sample rate, bit depth, extra instruments)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Directory that receives notes/, chords/ and scales/
    #[arg(short, long, default_value = ".", global = true)]
    out_dir: PathBuf,

    /// Number of render threads (default: all cores)
    #[arg(short = 't', long, global = true)]
    threads: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a single note
    Note {
        /// Frequency in Hz or a note name (C4, F#3, Sol)
        pitch: String,

        #[arg(short, long, default_value = "piano")]
        instrument: String,

        /// Output name (defaults to the pitch as given)
        #[arg(short, long)]
        name: Option<String>,
    },
    /// Render a chord from several pitches
    Chord {
        #[arg(required = true)]
        pitches: Vec<String>,

        #[arg(short, long, default_value = "piano")]
        instrument: String,

        #[arg(short, long, default_value = "chord")]
        name: String,
    },
    /// Render pitches one after another
    Scale {
        #[arg(required = true)]
        pitches: Vec<String>,

        #[arg(short, long, default_value = "piano")]
        instrument: String,

        #[arg(short, long, default_value = "scale")]
        name: String,

        /// Play the scale after saving it
        #[arg(long)]
        play: bool,
    },
    /// Render a whole job: the natural scale per instrument, or a JSON job file
    Batch {
        /// Instruments to render the natural scale for (default: all)
        #[arg(short, long)]
        instrument: Vec<String>,

        /// JSON job file with notes, chords and scales
        #[arg(short, long)]
        job: Option<PathBuf>,

        /// Play each scale after saving it
        #[arg(long)]
        play: bool,
    },
    /// List the available instruments
    Instruments,
}

fn pitches(texts: &[String]) -> Result<Vec<f64>, String> {
    texts
        .iter()
        .map(|t| parse_pitch(t).ok_or_else(|| format!("not a frequency or note name: '{t}'")))
        .collect()
}

#[cfg(feature = "playback")]
fn playback() -> Result<Option<Box<dyn PlaybackSink>>, String> {
    Ok(Some(Box::new(chordsmith::playback::CpalPlayback)))
}

#[cfg(not(feature = "playback"))]
fn playback() -> Result<Option<Box<dyn PlaybackSink>>, String> {
    Err("built without playback support (enable the `playback` feature)".to_string())
}

fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    if let Some(threads) = cli.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()?;
    }

    let config = match &cli.config {
        Some(path) => RenderConfig::from_path(path)?,
        None => RenderConfig::default(),
    };
    let registry = config.registry()?;

    let mut play = false;
    let job = match cli.command {
        Commands::Instruments => {
            for t in registry.iter() {
                let partials: Vec<String> = t
                    .harmonics
                    .iter()
                    .map(|h| format!("x{} @ {} dB", h.multiplier, h.gain_db))
                    .collect();
                println!(
                    "{:<10} {:?}, attack {} ms, release {} ms, cutoff {} Hz, [{}]",
                    t.name,
                    t.waveform,
                    t.attack_ms,
                    t.release_ms,
                    t.filter_cutoff_hz,
                    partials.join(", ")
                );
            }
            return Ok(ExitCode::SUCCESS);
        }
        Commands::Note {
            pitch,
            instrument,
            name,
        } => {
            let frequency = pitches(std::slice::from_ref(&pitch))?[0];
            RenderJob {
                notes: vec![NoteRequest {
                    frequency,
                    name: name.unwrap_or(pitch),
                    instrument,
                }],
                ..RenderJob::default()
            }
        }
        Commands::Chord {
            pitches: texts,
            instrument,
            name,
        } => RenderJob {
            chords: vec![ChordRequest {
                name,
                frequencies: pitches(&texts)?,
                instrument,
            }],
            ..RenderJob::default()
        },
        Commands::Scale {
            pitches: texts,
            instrument,
            name,
            play: p,
        } => {
            play = p;
            RenderJob {
                scales: vec![ScaleRequest {
                    name,
                    frequencies: pitches(&texts)?,
                    instrument,
                }],
                ..RenderJob::default()
            }
        }
        Commands::Batch {
            instrument,
            job,
            play: p,
        } => {
            play = p;
            let mut render_job = RenderJob::default();
            if let Some(path) = job {
                render_job.extend(RenderJob::from_json(&std::fs::read_to_string(&path)?)?);
            }
            let instruments: Vec<String> = if instrument.is_empty() && render_job.is_empty() {
                registry.names().map(str::to_string).collect()
            } else {
                instrument
            };
            for name in &instruments {
                render_job.extend(RenderJob::natural_scale(name));
            }
            render_job
        }
    };

    let player = if play { playback()? } else { None };
    let sink = WavFileSink;
    let mut runner = BatchRunner::new(Renderer::new(&registry, &config), &sink, &cli.out_dir);
    runner.bit_depth = config.bit_depth;
    runner.clipping = config.clipping;
    if let Some(player) = player.as_deref() {
        runner = runner.with_playback(player);
    }

    info!(requests = job.len(), out_dir = %cli.out_dir.display(), "rendering");
    let report = runner.run(&job);
    for item in &report.items {
        match &item.result {
            Ok(()) => println!("Saved: {}", item.destination.display()),
            Err(e) => eprintln!("Failed: {}: {e}", item.key),
        }
    }

    Ok(if report.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
