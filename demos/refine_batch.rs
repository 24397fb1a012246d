//! Example: Refine multiple audio files in parallel
//!
//! Usage:
//!   cargo run --release --example refine_batch -- [--jobs N] [--json] --out-dir DIR <file1> <file2> ...
//!
//! Notes:
//! - Parallelism is across files. Each refinement runs on one thread.
//! - Default workers: (available CPU threads - 1).

use serde_json::json;
use speech_refine::pipeline::{default_jobs, refine_batch, Clip};
use speech_refine::{Container, RefineConfig};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Instant;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let mut args: Vec<String> = env::args().skip(1).collect();
    let mut json_out = false;
    let mut jobs: Option<usize> = None;
    let mut out_dir: Option<PathBuf> = None;
    let mut paths: Vec<String> = Vec::new();

    while let Some(a) = args.first().cloned() {
        args.remove(0);
        match a.as_str() {
            "--json" => json_out = true,
            "--jobs" => {
                let v = args.first().ok_or("--jobs requires a value")?.parse::<usize>()?;
                args.remove(0);
                jobs = Some(std::cmp::max(1, v));
            }
            "--out-dir" => {
                let v = args.first().ok_or("--out-dir requires a path")?.clone();
                args.remove(0);
                out_dir = Some(PathBuf::from(v));
            }
            "--help" | "-h" => {
                eprintln!(
                    "Usage: refine_batch [--jobs N] [--json] --out-dir DIR <file1> <file2> ...\n\
                     \n\
                     --jobs N       Parallel workers (default: CPU-1)\n\
                     --json         Emit one JSON object per line (JSONL)\n\
                     --out-dir DIR  Where refined WAV files are written\n"
                );
                return Ok(());
            }
            _ => paths.push(a),
        }
    }

    let Some(out_dir) = out_dir else {
        eprintln!("ERROR: --out-dir is required. Use --help for usage.");
        std::process::exit(2);
    };
    if paths.is_empty() {
        eprintln!("ERROR: Provide at least one audio file path. Use --help for usage.");
        std::process::exit(2);
    }
    std::fs::create_dir_all(&out_dir)?;

    let jobs = jobs.unwrap_or_else(default_jobs);
    eprintln!("Batch: {} files, jobs={}", paths.len(), jobs);

    let mut inputs: Vec<(String, Vec<u8>, Option<Container>)> = Vec::new();
    for path in &paths {
        let container = Path::new(path)
            .extension()
            .and_then(|e| e.to_str())
            .and_then(Container::from_extension);
        inputs.push((path.clone(), std::fs::read(path)?, container));
    }
    let clips: Vec<Clip<'_>> = inputs
        .iter()
        .map(|(_, bytes, container)| Clip::new(bytes, *container))
        .collect();

    let t0 = Instant::now();
    let results = refine_batch(&clips, &RefineConfig::default(), jobs);
    let elapsed = t0.elapsed().as_secs_f32();

    let mut failures = 0usize;
    for ((path, _, _), result) in inputs.iter().zip(results) {
        match result {
            Ok((bytes, report)) => {
                let stem = Path::new(path)
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .unwrap_or("clip");
                let out_path = out_dir.join(format!("{}.wav", stem));
                std::fs::write(&out_path, &bytes)?;

                if json_out {
                    println!(
                        "{}",
                        json!({ "file": path, "output": out_path.display().to_string(), "report": report })
                    );
                } else {
                    println!(
                        "{}: {:.2} dB gain, {:.2} dBFS -> {}",
                        path,
                        report.applied_gain_db,
                        report.final_loudness.rms_dbfs,
                        out_path.display()
                    );
                }
            }
            Err(e) => {
                failures += 1;
                if json_out {
                    println!("{}", json!({ "file": path, "error": e.to_string() }));
                } else {
                    eprintln!("{}: FAILED: {}", path, e);
                }
            }
        }
    }

    eprintln!(
        "Done: {} ok, {} failed in {:.2}s",
        paths.len() - failures,
        failures,
        elapsed
    );
    Ok(())
}
