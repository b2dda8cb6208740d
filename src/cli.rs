use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "vidtrim")]
#[command(author, version, about = "Trim MP4 videos without re-encoding")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Cut a time range out of a video into a new file
    Trim {
        /// Source video
        #[arg(required = true)]
        input: PathBuf,

        /// Window start in milliseconds
        #[arg(long, allow_hyphen_values = true)]
        start_ms: i64,

        /// Window end in milliseconds
        #[arg(long, allow_hyphen_values = true)]
        end_ms: i64,

        /// Output rotation in degrees (0, 90, 180 or 270); negative keeps the source's
        #[arg(long, allow_hyphen_values = true)]
        rotation: Option<i32>,

        /// Output file (a unique name in the output directory by default)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Probe a video and display its tracks
    Probe {
        /// File to probe
        #[arg(required = true)]
        file: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}
