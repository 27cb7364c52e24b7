use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "saavy")]
#[command(about = "Realtime and offline timing contexts", long_about = None)]
pub struct Cli {
    /// Log every notification pass
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Render a metronome offline and report when each click fired
    Offline {
        /// Render length in seconds
        #[arg(short, long, default_value = "2.0")]
        duration: f64,

        /// Sample rate in Hz
        #[arg(short = 'r', long, default_value = "44100")]
        sample_rate: u32,

        /// Output channels
        #[arg(short, long, default_value = "2")]
        channels: u16,

        /// Metronome tempo
        #[arg(short, long, default_value = "120")]
        bpm: f64,
    },

    /// Run a realtime context against the system clock
    Live {
        /// How long to run
        #[arg(short, long, default_value = "2.0")]
        seconds: f64,

        /// Sample rate in Hz
        #[arg(short = 'r', long, default_value = "48000")]
        sample_rate: u32,

        /// Capture from an input: index, label or device id
        #[arg(short, long)]
        input: Option<String>,
    },
}
