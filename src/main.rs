use anyhow::Result;
use clap::Parser;

use osmsieve::app::{self, Cli};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::INFO
    } else {
        tracing::Level::WARN
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(level.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .init();

    let start = std::time::Instant::now();
    let emitted = app::run(&cli)?;

    let elapsed = start.elapsed();
    tracing::info!(
        "Done! Emitted {} entities in {:.2}s ({} entities/s)",
        emitted,
        elapsed.as_secs_f64(),
        (emitted as f64 / elapsed.as_secs_f64()) as u64
    );

    Ok(())
}
