// Diagnostic CLI for the detection core
//
// Loads a WAV file, runs per-segment detection and (optionally) the
// deduplication pass, and prints the resulting events as JSON. Useful for
// tuning thresholds against known recordings without the orchestration
// layer. This binary is a developer tool; the library itself exposes no
// CLI surface.

use anyhow::{Context, Result};
use clap::Parser;

use aed_core::{deduplicate, DetectorConfig, EventDetector};

#[derive(Parser, Debug)]
#[command(name = "aed-cli", about = "Run acoustic event detection on a WAV file")]
struct Args {
    /// Input WAV file (mono or multi-channel; channels are averaged)
    input: String,

    /// Optional JSON config file; defaults are used when absent
    #[arg(long)]
    config: Option<String>,

    /// Segment id to stamp onto the events
    #[arg(long, default_value_t = 1)]
    segment_id: u64,

    /// Recording-absolute offset of this segment in milliseconds;
    /// enables the deduplication pass over the result
    #[arg(long)]
    segment_offset_ms: Option<f64>,

    /// Pretty-print the JSON output
    #[arg(long)]
    pretty: bool,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => DetectorConfig::load_from_file(path),
        None => DetectorConfig::default(),
    };

    let (samples, sample_rate) = load_wav(&args.input)
        .with_context(|| format!("failed to load WAV file {}", args.input))?;
    log::info!(
        "[Cli] Loaded {} samples at {} Hz from {}",
        samples.len(),
        sample_rate,
        args.input
    );

    let detector = EventDetector::new(config).context("invalid detector configuration")?;
    let mut events = detector
        .detect(&samples, sample_rate, args.segment_id)
        .context("detection failed")?;

    if let Some(offset_ms) = args.segment_offset_ms {
        for event in events.iter_mut() {
            event.resolve_absolute(offset_ms);
        }
        events = deduplicate(events, &detector.config().dedup);
    }

    let json = if args.pretty {
        serde_json::to_string_pretty(&events)?
    } else {
        serde_json::to_string(&events)?
    };
    println!("{}", json);

    Ok(())
}

/// Load a WAV file as a mono f32 buffer, averaging channels
fn load_wav(path: &str) -> Result<(Vec<f32>, u32)> {
    let mut reader = hound::WavReader::open(path)?;
    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<_, _>>()?,
        hound::SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<std::result::Result<_, _>>()?
        }
    };

    let mono: Vec<f32> = interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect();

    Ok((mono, spec.sample_rate))
}
