use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::{Args, Subcommand};

use crate::exit::{CliError, CliResult, INTERNAL};
use crate::output::OutputFormat;

pub mod probe;
pub mod replay;
pub mod stream;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Connect to a bridge peer and print received frames.
    Stream(StreamArgs),
    /// Play back a recording and print its frames.
    Replay(ReplayArgs),
    /// Probe a bridge peer and print one frame's metadata.
    Probe(ProbeArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Stream(args) => stream::run(args, format),
        Command::Replay(args) => replay::run(args, format),
        Command::Probe(args) => probe::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct StreamArgs {
    /// Bridge host to connect to.
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,
    /// Bridge TCP port.
    #[arg(long, short = 'p', default_value = "12347")]
    pub port: u16,
    /// Exit after printing N frames.
    #[arg(long)]
    pub count: Option<u64>,
    /// Record every received frame into this directory.
    #[arg(long, value_name = "DIR")]
    pub record: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct ReplayArgs {
    /// Recording directory to play back.
    pub path: PathBuf,
    /// Number of frames in the recording.
    #[arg(long)]
    pub frames: u32,
    /// Playback rate in frames per second.
    #[arg(long, default_value = "30")]
    pub fps: f32,
    /// Wrap to frame 0 at the end instead of stopping.
    #[arg(long = "loop")]
    pub loop_replay: bool,
    /// Image names recorded per frame (comma-separated).
    #[arg(long, value_delimiter = ',', default_value = "color")]
    pub image_names: Vec<String>,
    /// Exit after printing N frames (useful with --loop).
    #[arg(long)]
    pub count: Option<u64>,
}

#[derive(Args, Debug)]
pub struct ProbeArgs {
    /// Bridge host to connect to.
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,
    /// Bridge TCP port.
    #[arg(long, short = 'p', default_value = "12347")]
    pub port: u16,
    /// Maximum time to wait for the first frame (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub(crate) fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| {
        CliError::new(
            INTERNAL,
            format!("signal handler setup failed: {err}"),
        )
    })
}

/// Parse a human duration like `5s`, `500ms`, or a bare seconds count.
pub(crate) fn parse_duration(text: &str) -> Option<std::time::Duration> {
    let text = text.trim();
    if let Some(ms) = text.strip_suffix("ms") {
        return ms.trim().parse::<u64>().ok().map(std::time::Duration::from_millis);
    }
    if let Some(secs) = text.strip_suffix('s') {
        return secs.trim().parse::<u64>().ok().map(std::time::Duration::from_secs);
    }
    text.parse::<u64>().ok().map(std::time::Duration::from_secs)
}
