//! CLI argument definitions

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "tracecap",
    about = "Record a profiling session for a spawned command",
    after_help = "\
EXAMPLES:
    tracecap -- my-server --port 8080        Record into capture.tcap
    tracecap run.tcap -- make -j8            Record into run.tcap
    tracecap -f -e RUST_LOG=debug -- my-app  Overwrite, set target env"
)]
pub struct Args {
    /// Capture file to write
    #[arg(value_name = "CAPTURE_FILE", default_value = "capture.tcap")]
    pub capture_file: PathBuf,

    /// Command to spawn and profile (everything after --)
    #[arg(last = true, required = true, value_name = "COMMAND")]
    pub command: Vec<String>,

    /// Set environment variable for spawned process. Can be used multiple times.
    #[arg(short = 'e', long = "env", value_name = "VAR=VALUE")]
    pub env: Vec<String>,

    /// Force overwrite the capture file
    #[arg(short, long)]
    pub force: bool,

    /// Working directory for the spawned process (default: current directory)
    #[arg(long, value_name = "DIR")]
    pub cwd: Option<PathBuf>,

    /// Capture writer buffer size in bytes
    #[arg(long, default_value_t = tracecap_capture::DEFAULT_BUFFER_SIZE, value_name = "BYTES")]
    pub buffer_size: usize,

    /// Stop recording after N seconds (0 = until the command exits or ^C)
    #[arg(long, default_value = "0")]
    pub duration: u64,

    /// Suppress non-essential output
    #[arg(short, long)]
    pub quiet: bool,
}
