//! saavy - drive a timing context from the terminal
//!
//! Run with: cargo run -- offline --bpm 140
//!           cargo run -- live --seconds 3 --input 0

mod app;
mod cli;

use clap::Parser;
use cli::{Cli, Command};
use tracing::Level;

#[tokio::main(flavor = "current_thread")]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::INFO })
        .with_target(false)
        .init();

    match cli.command {
        Command::Offline {
            duration,
            sample_rate,
            channels,
            bpm,
        } => app::offline(duration, sample_rate, channels, bpm).await,
        Command::Live {
            seconds,
            sample_rate,
            input,
        } => app::live(seconds, sample_rate, input).await,
    }
}
