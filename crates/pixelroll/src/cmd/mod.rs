use clap::{Args, Subcommand};
use std::path::PathBuf;

use crate::config::FileConfig;
use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod classify;
pub mod decode;
pub mod encode;
pub mod replay;
pub mod version;
pub mod watch;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Decode one die frame given as hex.
    Decode(DecodeArgs),
    /// Encode a command for a die.
    Encode(EncodeArgs),
    /// Classify a roll total into its result tier.
    Classify(ClassifyArgs),
    /// Replay a recorded frame trace through the session engine.
    Replay(ReplayArgs),
    /// Read `<link> <hex>` frames from stdin and print outcomes as they resolve.
    Watch(WatchArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat, config: &FileConfig) -> CliResult<i32> {
    match command {
        Command::Decode(args) => decode::run(args, format),
        Command::Encode(args) => encode::run(args, format),
        Command::Classify(args) => classify::run(args, format),
        Command::Replay(args) => replay::run(args, format, config),
        Command::Watch(args) => watch::run(args, format, config),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Frame bytes as hex, e.g. `030109`.
    pub hex: String,
}

#[derive(Args, Debug)]
pub struct EncodeArgs {
    #[command(subcommand)]
    pub command: EncodeCommand,
}

#[derive(Subcommand, Debug)]
pub enum EncodeCommand {
    /// Ask a die to identify itself.
    WhoAreYou,
    /// Ask a die for its roll state.
    RequestRollState,
    /// Ask a die for its battery level.
    RequestBattery,
    /// Blink the die LEDs.
    Blink(BlinkArgs),
}

#[derive(Args, Debug)]
pub struct BlinkArgs {
    /// Number of flashes.
    #[arg(long, default_value_t = 3)]
    pub count: u32,
    /// Total animation duration in milliseconds.
    #[arg(long, default_value_t = 1000)]
    pub duration_ms: u64,
    /// Color as RRGGBB or RRGGBBAA hex.
    #[arg(long, default_value = "ff00ff")]
    pub color: String,
    /// Faces to light, one bit per face.
    #[arg(long, value_parser = parse_mask, default_value = "0xfffff")]
    pub face_mask: u32,
    /// Fade amount, 0 (sharp) to 255 (smooth).
    #[arg(long, default_value_t = 128)]
    pub fade: u32,
    /// Extra repeats of the animation.
    #[arg(long, default_value_t = 0)]
    pub loop_count: u32,
}

#[derive(Args, Debug)]
pub struct ClassifyArgs {
    /// Sum of the face values.
    pub total: u32,
}

#[derive(Args, Debug)]
pub struct ReplayArgs {
    /// Trace file with one `{"at_ms", "link", "frame"}` object per line.
    pub path: PathBuf,
    /// Also print the light service calls for each outcome.
    #[arg(long)]
    pub effects: bool,
    #[command(flatten)]
    pub overrides: ConfigOverrides,
}

#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Also print the light service calls for each outcome.
    #[arg(long)]
    pub effects: bool,
    /// Exit after N outcomes.
    #[arg(long)]
    pub count: Option<usize>,
    #[command(flatten)]
    pub overrides: ConfigOverrides,
}

/// Command-line values that take precedence over the config file.
#[derive(Args, Debug, Default, Clone)]
pub struct ConfigOverrides {
    /// Window after the first roll in which other dice join the session.
    #[arg(long, value_name = "MS")]
    pub capture_window_ms: Option<u64>,
    /// Maximum wait for rolling dice to come to rest.
    #[arg(long, value_name = "MS")]
    pub settle_timeout_ms: Option<u64>,
    /// Session tick interval.
    #[arg(long, value_name = "MS")]
    pub poll_interval_ms: Option<u64>,
    /// Light entity that receives effects.
    #[arg(long, value_name = "ENTITY")]
    pub entity_id: Option<String>,
}

impl ConfigOverrides {
    pub fn apply(&self, config: &FileConfig) -> FileConfig {
        let mut config = config.clone();
        let session = &mut config.session;
        session.capture_window_ms = self.capture_window_ms.or(session.capture_window_ms);
        session.settle_timeout_ms = self.settle_timeout_ms.or(session.settle_timeout_ms);
        session.poll_interval_ms = self.poll_interval_ms.or(session.poll_interval_ms);
        if let Some(entity_id) = &self.entity_id {
            config.lighting.entity_id = Some(entity_id.clone());
        }
        config
    }
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build information.
    #[arg(long)]
    pub extended: bool,
}

fn parse_mask(value: &str) -> Result<u32, String> {
    let parsed = match value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
    {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => value.parse(),
    };
    parsed.map_err(|err| format!("invalid face mask '{value}': {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_take_precedence_over_file() {
        let file = FileConfig::parse(
            "[session]\ncapture_window_ms = 500\nsettle_timeout_ms = 2000\n",
        )
        .unwrap();
        let overrides = ConfigOverrides {
            capture_window_ms: Some(100),
            entity_id: Some("light.den".to_string()),
            ..ConfigOverrides::default()
        };

        let merged = overrides.apply(&file);
        assert_eq!(merged.session.capture_window_ms, Some(100));
        assert_eq!(merged.session.settle_timeout_ms, Some(2000));
        assert_eq!(merged.session.poll_interval_ms, None);
        assert_eq!(merged.entity_id(), "light.den");
    }

    #[test]
    fn face_mask_accepts_hex_and_decimal() {
        assert_eq!(parse_mask("0xfffff"), Ok(0xFFFFF));
        assert_eq!(parse_mask("0X10"), Ok(16));
        assert_eq!(parse_mask("7"), Ok(7));
        assert!(parse_mask("0xzz").is_err());
    }
}
