use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, Level};

use montage_compositor::{
    composition::CompositionEngine,
    config::Config,
    error::MontageError,
    video::FfmpegEngine,
};

#[derive(Parser)]
#[command(
    name = "montage-compositor",
    version,
    about = "Assemble a montage video from still holds and clips",
    long_about = "Montage-Compositor renders every entry of a project's timeline to one uniform format with ffmpeg and joins them without re-encoding. Stills can freeze on a frame of a neighbouring clip."
)]
struct Cli {
    /// Configuration file holding settings and projects
    #[arg(short, long, default_value = "montage.toml")]
    config: PathBuf,

    /// Project to render (defaults to `active` in the configuration)
    #[arg(short, long)]
    project: Option<String>,

    /// Print the resolved plan without running ffmpeg
    #[arg(long)]
    dry_run: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Progress and errors go to stderr
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let code = err
                .downcast_ref::<MontageError>()
                .map(MontageError::exit_code)
                .unwrap_or(1);
            let message = err
                .downcast_ref::<MontageError>()
                .map(MontageError::user_message)
                .unwrap_or_else(|| err.to_string());
            error!("❌ {:#}", err);
            eprintln!("error: {}", message);
            ExitCode::from(code)
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    info!("Starting Montage-Compositor v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::from_file(&cli.config)?;
    config
        .validate()
        .with_context(|| format!("invalid configuration in {:?}", cli.config))?;

    let name = cli.project.unwrap_or_else(|| config.active.clone());
    let project = config.project(&name)?.clone();
    info!("Project: {}", name);

    let base_dir = base_dir(&cli.config);
    let ffmpeg = FfmpegEngine::new(config.settings.ffmpeg.clone()).with_timeout(config.settings.timeout_secs);
    let engine = CompositionEngine::new(config.settings, project, base_dir, Box::new(ffmpeg));

    if cli.dry_run {
        for line in engine.plan()? {
            println!("{}", line);
        }
        return Ok(());
    }

    engine
        .compose()
        .await
        .with_context(|| format!("project '{}' failed", name))?;
    Ok(())
}

/// Media and output paths are relative to the configuration file
fn base_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}
