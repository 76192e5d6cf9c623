mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "camlink", version, about = "Camera bridge client CLI")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = cmd::run(cli.command, format);

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_stream_subcommand() {
        let cli = Cli::try_parse_from([
            "camlink",
            "stream",
            "--host",
            "10.0.0.2",
            "--port",
            "9000",
            "--count",
            "5",
        ])
        .expect("stream args should parse");

        assert!(matches!(cli.command, Command::Stream(_)));
    }

    #[test]
    fn parses_replay_subcommand_with_image_names() {
        let cli = Cli::try_parse_from([
            "camlink",
            "replay",
            "/tmp/recording",
            "--frames",
            "120",
            "--fps",
            "15",
            "--image-names",
            "color,depth",
        ])
        .expect("replay args should parse");

        match cli.command {
            Command::Replay(args) => {
                assert_eq!(args.frames, 120);
                assert_eq!(args.image_names, vec!["color", "depth"]);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn replay_requires_frame_count() {
        Cli::try_parse_from(["camlink", "replay", "/tmp/recording"])
            .expect_err("--frames should be required");
    }

    #[test]
    fn parses_probe_with_timeout() {
        let cli = Cli::try_parse_from(["camlink", "probe", "--port", "9000", "--timeout", "3s"])
            .expect("probe args should parse");
        assert!(matches!(cli.command, Command::Probe(_)));
    }

    #[test]
    fn parse_duration_accepts_common_forms() {
        assert_eq!(
            cmd::parse_duration("500ms"),
            Some(std::time::Duration::from_millis(500))
        );
        assert_eq!(
            cmd::parse_duration("5s"),
            Some(std::time::Duration::from_secs(5))
        );
        assert_eq!(
            cmd::parse_duration("7"),
            Some(std::time::Duration::from_secs(7))
        );
        assert_eq!(cmd::parse_duration("fast"), None);
    }
}
