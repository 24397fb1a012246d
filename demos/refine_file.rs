//! Example: Refine a single audio file
//!
//! Usage:
//!   cargo run --release --example refine_file -- [--config cfg.json] [--json] <input> <output.wav>
//!
//! The library does no file I/O; this program reads the input, hands the
//! bytes to `refine` and writes the result.

use speech_refine::{refine, Container, RefineConfig};
use std::env;
use std::path::Path;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let mut args: Vec<String> = env::args().skip(1).collect();
    let mut json = false;
    let mut config_path: Option<String> = None;
    let mut paths: Vec<String> = Vec::new();

    while let Some(a) = args.first().cloned() {
        args.remove(0);
        match a.as_str() {
            "--json" => json = true,
            "--config" => {
                let v = args.first().ok_or("--config requires a path")?.clone();
                args.remove(0);
                config_path = Some(v);
            }
            "--help" | "-h" => {
                eprintln!(
                    "Usage: refine_file [--config cfg.json] [--json] <input> <output.wav>\n\
                     \n\
                     --config PATH  JSON configuration (missing fields use defaults)\n\
                     --json         Print the report as JSON\n"
                );
                return Ok(());
            }
            _ => paths.push(a),
        }
    }

    if paths.len() != 2 {
        eprintln!("ERROR: Provide an input and an output path. Use --help for usage.");
        std::process::exit(2);
    }

    let config: RefineConfig = match config_path {
        Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
        None => RefineConfig::default(),
    };

    let input = Path::new(&paths[0]);
    let container = input
        .extension()
        .and_then(|e| e.to_str())
        .and_then(Container::from_extension);

    let raw = std::fs::read(input)?;
    let (bytes, report) = refine(&raw, container, &config)?;
    std::fs::write(&paths[1], &bytes)?;

    if json {
        println!("{}", report.to_json()?);
    } else {
        println!("Refinement Results:");
        println!(
            "  Duration: {:.3} s -> {:.3} s",
            report.original_duration_secs, report.final_duration_secs
        );
        println!(
            "  Format: {} Hz/{} ch -> {} Hz/{} ch/{}-bit",
            report.input_sample_rate,
            report.input_channels,
            report.output_sample_rate,
            report.output_channels,
            report.output_bit_depth
        );
        println!(
            "  Gain: {:.2} dB{}",
            report.applied_gain_db,
            if report.clip_limited { " (clip-limited)" } else { "" }
        );
        match report.noise_floor_dbfs {
            Some(floor) => println!("  Noise floor: {:.1} dBFS", floor),
            None => println!("  Noise floor: n/a"),
        }
        println!("  Max compression: {:.2} dB", report.max_gain_reduction_db);
        println!(
            "  Loudness: {:.2} dBFS RMS, {:.2} dBFS peak",
            report.final_loudness.rms_dbfs, report.final_loudness.peak_dbfs
        );
        println!("  Processing time: {:.2} ms", report.processing_time_ms);
    }

    Ok(())
}
