mod cli;

use vidtrim::{config, output::OutputNamer, probe, TrimRequest, TrimResult, TrimWorker};
use vidtrim_media::RemuxEngine;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use std::path::{Path, PathBuf};

struct TrimArgs {
    input: PathBuf,
    start_ms: i64,
    end_ms: i64,
    rotation: Option<i32>,
    output: Option<PathBuf>,
    json: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "vidtrim=trace,vidtrim_media=trace".to_string()
        } else {
            "vidtrim=info,vidtrim_media=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Trim {
            input,
            start_ms,
            end_ms,
            rotation,
            output,
            json,
        } => {
            let args = TrimArgs {
                input,
                start_ms,
                end_ms,
                rotation,
                output,
                json,
            };
            trim_file(args, cli.config.as_deref())
        }
        Commands::Probe { file, json } => probe_file(&file, json),
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("vidtrim {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn trim_file(args: TrimArgs, config_path: Option<&Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;

    let engine = RemuxEngine::new(config.remux.options());
    let namer = OutputNamer::from_config(&config.output);
    let (worker, handle) = TrimWorker::spawn(engine, namer, config.worker.queue_depth)?;

    let mut request = TrimRequest::new(args.input.to_string_lossy(), args.start_ms, args.end_ms);
    request.rotation = args.rotation;

    let output = args.output;
    let rt = tokio::runtime::Runtime::new()?;
    let result: TrimResult = rt.block_on(async move {
        let mut job = request.validate()?;
        if let Some(path) = output {
            job = job.with_output(path);
        }
        worker.submit(job).await
    });

    // Every handle is gone once the block above returns; the thread exits.
    if handle.join().is_err() {
        tracing::error!("Trim worker panicked");
    }

    match result {
        Ok(outcome) => {
            if args.json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                println!("{}", outcome.output.display());
                tracing::info!(
                    "Wrote {} samples ({} ms) with rotation {}",
                    outcome.summary.total_samples(),
                    outcome.summary.duration_us() / 1000,
                    outcome.summary.rotation
                );
            }
            Ok(())
        }
        Err(err) => {
            if args.json {
                let body = serde_json::json!({ "error": err });
                println!("{}", serde_json::to_string_pretty(&body)?);
                std::process::exit(1);
            }
            if let Some(detail) = err.detail.clone() {
                anyhow::bail!("{} ({})", err, detail);
            }
            Err(err.into())
        }
    }
}

fn probe_file(file: &Path, json: bool) -> Result<()> {
    if !file.exists() {
        anyhow::bail!("File does not exist: {:?}", file);
    }

    let report = probe::probe_file(file)?;

    if json {
        let json_str = serde_json::to_string_pretty(&report)?;
        println!("{}", json_str);
    } else {
        println!("File: {}", report.file_path.display());
        println!("Size: {} bytes", report.file_size);
        let secs = report.duration_ms / 1000;
        let mins = secs / 60;
        let hours = mins / 60;
        println!(
            "Duration: {:02}:{:02}:{:02}.{:03}",
            hours,
            mins % 60,
            secs % 60,
            report.duration_ms % 1000
        );
        println!("Faststart: {}", if report.faststart { "yes" } else { "no" });
        println!("Rotation: {}", report.rotation);
        if let Some(interval) = report.max_sync_interval_ms {
            println!("Max sync interval: {} ms", interval);
        }

        println!("\nTracks: {}", report.tracks.len());
        for track in &report.tracks {
            print!(
                "  [{}] {} {}",
                track.index,
                track.media_type,
                track.codec.as_deref().unwrap_or("unknown")
            );
            if let (Some(w), Some(h)) = (track.width, track.height) {
                print!(" {}x{}", w, h);
            }
            if let Some(rate) = track.sample_rate {
                print!(" {} Hz", rate);
            }
            if let Some(channels) = track.channels {
                print!(" {}ch", channels);
            }
            println!();
            println!(
                "      {} samples ({} sync), {} ms, largest sample {} bytes",
                track.samples, track.sync_samples, track.duration_ms, track.max_sample_size
            );
        }
    }

    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            config
        }
        None => {
            println!("No config file specified, using defaults");
            config::Config::default()
        }
    };

    println!("  Output dir: {}", config.output.dir.display());
    println!("  File names: {}<uuid>.{}", config.output.prefix, config.output.extension);
    println!(
        "  Buffer: {} bytes (max {})",
        config.remux.buffer_size, config.remux.max_buffer_size
    );
    println!("  End boundary: {}", config.remux.end_boundary);
    println!("  Faststart: {}", config.remux.faststart);
    println!("  Queue depth: {}", config.worker.queue_depth);

    Ok(())
}
