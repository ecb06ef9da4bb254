use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "warp-pool")]
#[command(about = "Thread-safe pooled reader for warped rasters")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Use the built-in synthetic raster backend instead of the codec
    #[arg(long, global = true)]
    pub synthetic: bool,

    /// Dataset pool capacity (defaults to the environment or 256)
    #[arg(long, global = true)]
    pub pool_size: Option<usize>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print metadata for one dataset configuration
    Info {
        /// Dataset URI
        uri: String,

        /// Warp option, repeatable (e.g. -w -t_srs -w epsg:3857)
        #[arg(short = 'w', long = "warp-option", allow_hyphen_values = true)]
        warp_options: Vec<String>,
    },

    /// Hammer one dataset configuration from many threads
    Stress {
        /// Dataset URI
        uri: String,

        /// Warp option, repeatable
        #[arg(short = 'w', long = "warp-option", allow_hyphen_values = true)]
        warp_options: Vec<String>,

        /// Number of worker threads
        #[arg(long, default_value = "16")]
        threads: usize,

        /// Calls per worker thread
        #[arg(long, default_value = "100")]
        iterations: usize,

        /// Desired copies per call; negative asks softly
        #[arg(long, default_value = "-4", allow_hyphen_values = true)]
        copies: i32,

        /// Attempt budget per call; zero or negative means unbounded
        #[arg(long, default_value = "0", allow_hyphen_values = true)]
        attempts: i32,

        /// Time budget per call in nanoseconds; zero means unbounded
        #[arg(long, default_value = "0")]
        nanos: u64,

        /// Operation to run: noop, width-height, or pixels
        #[arg(long, default_value = "width-height")]
        op: String,
    },

    /// Run a JSON workload description
    Workload {
        /// Path to the workload configuration file
        #[arg(short = 'c', long)]
        config: PathBuf,
    },
}
