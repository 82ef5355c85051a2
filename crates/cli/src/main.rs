mod job;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use audiobinder_core::{
    load_settings, load_settings_from_env, metrics, probe_all, validate_settings, AbortOnFailure,
    AudioBinder, BindResult, ErrorPolicy, FfmpegCodec, FfprobeProber, LoggingConfig, Settings,
    SkipFailed, SourceFile, TracingReporter,
};

use job::Job;

/// Command-line arguments for audiobinder
#[derive(Parser, Debug)]
#[command(name = "audiobinder")]
#[command(about = "Binds ordered audio files into AAC audiobook volumes")]
#[command(version)]
struct Args {
    /// Settings file (TOML)
    #[arg(short, long, global = true, env = "AUDIOBINDER_SETTINGS")]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Bind the volumes described by a job file
    Bind {
        /// Job file (TOML)
        #[arg(short, long)]
        job: PathBuf,

        /// Keep going when a source file fails to convert
        #[arg(long)]
        skip_failed: bool,

        /// Print Prometheus metrics after the run
        #[arg(long)]
        metrics: bool,
    },
    /// Probe source files and print one JSON line per file
    Probe {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    match run(args).await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            error!("Fatal error: {:#}", e);
            eprintln!("audiobinder: {:#}", e);
            std::process::exit(1);
        }
    }
}

async fn run(args: Args) -> Result<bool> {
    let settings = match &args.settings {
        Some(path) => load_settings(path)
            .with_context(|| format!("Failed to load settings from {:?}", path))?,
        None => load_settings_from_env().context("Failed to load settings")?,
    };
    validate_settings(&settings).context("Settings validation failed")?;

    init_logging(&settings.logging);

    match args.command {
        Command::Bind {
            job,
            skip_failed,
            metrics,
        } => bind(&settings, &job, skip_failed, metrics).await,
        Command::Probe { files } => {
            probe(&settings, &files).await?;
            Ok(true)
        }
    }
}

fn init_logging(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let registry = tracing_subscriber::registry().with(filter);
    if logging.json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

async fn bind(
    settings: &Settings,
    job_path: &Path,
    skip_failed: bool,
    print_metrics: bool,
) -> Result<bool> {
    let job = Job::load(job_path)?;
    let requested = job.run_config(&settings.run);
    let config = requested.fixup_bitrate();
    if config.bitrate != requested.bitrate {
        warn!(
            "Bitrate {} is not valid for {} Hz {}, using {}",
            requested.bitrate, config.sample_rate, config.channels, config.bitrate
        );
    }

    let codec = FfmpegCodec::new(settings.ffmpeg.clone());
    codec.validate().context("FFmpeg is not usable")?;

    let prober = FfprobeProber::from_config(&settings.ffmpeg);
    let probed = probe_all(&prober, &job.input_paths()).await;
    for file in probed.iter().filter(|f| !f.valid) {
        warn!("{} could not be probed", file.path.display());
    }
    let plan = job.into_plan(probed).context("Invalid volume plan")?;

    let binder = AudioBinder::new(codec).with_buffer_size(settings.engine.buffer_size_bytes);
    let cancel = binder.cancel_handle();

    let mut task = tokio::task::spawn_blocking(move || {
        let mut policy: Box<dyn ErrorPolicy> = if skip_failed {
            Box::new(SkipFailed)
        } else {
            Box::new(AbortOnFailure)
        };
        let mut reporter = TracingReporter::new();
        binder.bind(&plan, &config, policy.as_mut(), &mut reporter)
    });

    let result = tokio::select! {
        joined = &mut task => joined,
        _ = signal::ctrl_c() => {
            info!("Interrupt received, cancelling");
            cancel.cancel();
            task.await
        }
    }
    .context("Bind task panicked")?;

    report(&result)?;

    if print_metrics {
        let text = metrics::gather_metrics().context("Failed to encode metrics")?;
        print!("{}", text);
    }

    Ok(result.is_success())
}

fn report(result: &BindResult) -> Result<()> {
    match result {
        BindResult::Success {
            total_duration_ms,
            volumes,
        } => info!(
            "Bound {} volumes, {} ms total",
            volumes.len(),
            total_duration_ms
        ),
        BindResult::Failure { reason } => error!("Bind failed: {}", reason),
    }
    println!("{}", serde_json::to_string(result)?);
    Ok(())
}

async fn probe(settings: &Settings, files: &[PathBuf]) -> Result<()> {
    let prober = FfprobeProber::from_config(&settings.ffmpeg);
    let probed: Vec<SourceFile> = probe_all(&prober, files).await;
    for file in &probed {
        println!("{}", serde_json::to_string(file)?);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_parse_bind() {
        let args = Args::try_parse_from([
            "audiobinder",
            "bind",
            "--job",
            "book.toml",
            "--skip-failed",
        ])
        .unwrap();

        match args.command {
            Command::Bind {
                job,
                skip_failed,
                metrics,
            } => {
                assert_eq!(job, PathBuf::from("book.toml"));
                assert!(skip_failed);
                assert!(!metrics);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_args_parse_probe_with_settings() {
        let args = Args::try_parse_from([
            "audiobinder",
            "probe",
            "--settings",
            "s.toml",
            "a.mp3",
            "b.mp3",
        ])
        .unwrap();

        assert_eq!(args.settings, Some(PathBuf::from("s.toml")));
        match args.command {
            Command::Probe { files } => assert_eq!(files.len(), 2),
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_args_probe_requires_files() {
        assert!(Args::try_parse_from(["audiobinder", "probe"]).is_err());
    }

    #[test]
    fn test_args_bind_requires_job() {
        assert!(Args::try_parse_from(["audiobinder", "bind"]).is_err());
    }
}
