mod cmd;
mod config;
mod exit;
mod logging;
mod output;

use std::path::PathBuf;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "pixelroll", version, about = "Pixel dice roll monitor")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "warn", global = true)]
    log_level: LogLevel,

    /// TOML config file with session timing and lighting settings.
    #[arg(long, value_name = "PATH", env = "PIXELROLL_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = config::load(cli.config.as_deref())
        .and_then(|config| cmd::run(cli.command, format, &config));

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
    use crate::cmd::EncodeCommand;

    #[test]
    fn parses_replay_subcommand() {
        let cli = Cli::try_parse_from(["pixelroll", "replay", "/tmp/trace.jsonl", "--effects"])
            .expect("replay args should parse");

        match cli.command {
            Command::Replay(args) => {
                assert!(args.effects);
                assert_eq!(args.path, PathBuf::from("/tmp/trace.jsonl"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parses_blink_options() {
        let cli = Cli::try_parse_from([
            "pixelroll",
            "encode",
            "blink",
            "--count",
            "2",
            "--face-mask",
            "0x3",
            "--color",
            "00ff00",
        ])
        .expect("blink args should parse");

        let Command::Encode(args) = cli.command else {
            panic!("expected encode");
        };
        let EncodeCommand::Blink(blink) = args.command else {
            panic!("expected blink");
        };
        assert_eq!(blink.count, 2);
        assert_eq!(blink.face_mask, 3);
        assert_eq!(blink.duration_ms, 1000);
    }

    #[test]
    fn global_flags_follow_subcommand() {
        let cli = Cli::try_parse_from([
            "pixelroll",
            "classify",
            "20",
            "--format",
            "json",
            "--log-level",
            "debug",
        ])
        .expect("global flags should parse");
        assert!(matches!(cli.format, Some(OutputFormat::Json)));
        assert!(matches!(cli.log_level, LogLevel::Debug));
    }

    #[test]
    fn rejects_non_numeric_total() {
        let err = Cli::try_parse_from(["pixelroll", "classify", "twelve"])
            .expect_err("non-numeric total should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }
}
