//! Concatenate the normalized clips into one MP3 and write its sprite map.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;

use audio_sprite::cli::{self, CommonArgs};
use audio_sprite::{FfmpegEngine, SpriteConfig, SpriteError};

#[derive(Parser, Debug)]
#[command(name = "build-sprite")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(flatten)]
    common: CommonArgs,

    /// Concatenated sprite audio file
    #[arg(short, long)]
    output_path: Option<PathBuf>,

    /// JSON sprite map
    #[arg(short, long)]
    sprite_map_path: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    if let Some(code) = args.common.write_default_config_if_requested() {
        return code;
    }

    let mut config = match args.common.load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            return cli::exit_with(&e);
        }
    };
    if let Some(path) = args.output_path {
        config.paths.output_path = path;
    }
    if let Some(path) = args.sprite_map_path {
        config.paths.sprite_map_path = path;
    }

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Error building sprite");
            cli::exit_with(&e)
        }
    }
}

async fn run(config: SpriteConfig) -> Result<(), SpriteError> {
    cli::init_runtime(&config)?;

    let engine = Arc::new(FfmpegEngine::new(config.audio.clone())?);
    match audio_sprite::build_sprite(engine, &config.paths).await? {
        Some(outcome) => {
            println!("✅ Joined MP3 saved to: {}", outcome.output_path.display());
            println!(
                "✅ Sprite map saved to: {}",
                outcome.sprite_map_path.display()
            );
        }
        None => println!("No MP3 files to join."),
    }
    Ok(())
}
