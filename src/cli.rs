use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "tonica", about = "Karaoke pitch tracking and reference analysis")]
pub struct Cli {
    /// Config file (defaults to ./tonica.toml or the user config dir)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory holding song audio files
    #[arg(long, global = true)]
    pub songs_dir: Option<PathBuf>,

    /// Directory where reference tracks are written
    #[arg(long, global = true)]
    pub references_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build (or rebuild) the reference pitch track for a song
    Analyze {
        /// Song file name inside the songs directory
        song: String,

        /// Analysis hop size in samples
        #[arg(long)]
        hop_size: Option<usize>,
    },

    /// Run the live detector over a recording and print the pitch trace
    Detect {
        /// Audio file (WAV, MP3, FLAC, OGG)
        input: PathBuf,

        /// Print every frame, including unvoiced ones
        #[arg(long)]
        all: bool,
    },

    /// Score a recorded performance against a song's reference track
    Compare {
        /// Recorded performance (WAV, MP3, FLAC, OGG)
        performance: PathBuf,

        /// Song whose reference track to compare against
        #[arg(short, long)]
        song: String,

        /// Tolerance in Hz for precision scoring
        #[arg(long)]
        tolerance: Option<f64>,

        /// Override the configured lead-in for this song, in seconds
        #[arg(long)]
        offset: Option<f64>,
    },

    /// Write a cleaned display guide from a song's reference track
    Clean {
        song: String,

        /// Largest accepted jump between consecutive points, in Hz
        #[arg(long, default_value_t = 200.0)]
        max_jump: f64,
    },
}
