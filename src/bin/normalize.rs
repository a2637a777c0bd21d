//! Normalize every clip in the input directory to whole-second, mono MP3s.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;

use audio_sprite::cli::{self, CommonArgs};
use audio_sprite::{FfmpegEngine, SpriteConfig, SpriteError};

#[derive(Parser, Debug)]
#[command(name = "normalize")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(flatten)]
    common: CommonArgs,

    /// Number of clips encoded at once
    #[arg(short, long)]
    jobs: Option<usize>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    if let Some(code) = args.common.write_default_config_if_requested() {
        return code;
    }

    let loaded = args.common.load_config().and_then(|mut config| {
        if let Some(jobs) = args.jobs {
            config.normalize.max_parallel_jobs = jobs;
            config.validate()?;
        }
        Ok(config)
    });
    let config = match loaded {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            return cli::exit_with(&e);
        }
    };

    match run(config).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "Error normalizing MP3 files");
            cli::exit_with(&e)
        }
    }
}

async fn run(config: SpriteConfig) -> Result<ExitCode, SpriteError> {
    cli::init_runtime(&config)?;

    let engine = Arc::new(FfmpegEngine::new(config.audio.clone())?);
    let report = audio_sprite::normalize(
        engine,
        &config.paths.input_dir,
        &config.paths.normalized_dir,
        config.normalize.max_parallel_jobs,
    )
    .await?;

    if report.is_empty() {
        println!("No MP3 files found in the folder.");
        return Ok(ExitCode::SUCCESS);
    }

    match report.first_failure() {
        None => {
            println!("All MP3 files have been normalized.");
            Ok(ExitCode::SUCCESS)
        }
        Some(first) => {
            println!(
                "Normalized {} of {} MP3 files; {} failed.",
                report.succeeded(),
                report.clips.len(),
                report.failed()
            );
            Ok(cli::exit_with(first))
        }
    }
}
