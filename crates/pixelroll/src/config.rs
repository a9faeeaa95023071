use std::fs;
use std::path::Path;
use std::time::Duration;

use pixelroll::effects::DEFAULT_RESTORE_COLOR_TEMP;
use pixelroll_session::SessionConfig;
use serde::Deserialize;

use crate::exit::{io_error, CliError, CliResult, CONFIG};

pub const DEFAULT_ENTITY_ID: &str = "light.dice_tray";

/// Optional TOML configuration file.
///
/// ```toml
/// [session]
/// capture_window_ms = 300
/// settle_timeout_ms = 5000
/// poll_interval_ms = 50
///
/// [lighting]
/// entity_id = "light.dice_tray"
/// restore_color_temp = 2500
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub session: SessionSection,
    pub lighting: LightingSection,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionSection {
    pub capture_window_ms: Option<u64>,
    pub settle_timeout_ms: Option<u64>,
    pub poll_interval_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LightingSection {
    pub entity_id: Option<String>,
    /// Color temperature restored after each effect; 0 disables restoring.
    pub restore_color_temp: Option<u16>,
}

impl FileConfig {
    pub fn parse(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    pub fn session_config(&self) -> SessionConfig {
        let defaults = SessionConfig::default();
        let ms = |value: Option<u64>, default: Duration| value.map_or(default, Duration::from_millis);
        SessionConfig {
            capture_window: ms(self.session.capture_window_ms, defaults.capture_window),
            settle_timeout: ms(self.session.settle_timeout_ms, defaults.settle_timeout),
            poll_interval: ms(self.session.poll_interval_ms, defaults.poll_interval),
        }
    }

    pub fn entity_id(&self) -> &str {
        self.lighting
            .entity_id
            .as_deref()
            .unwrap_or(DEFAULT_ENTITY_ID)
    }

    pub fn restore_color_temp(&self) -> Option<u16> {
        match self.lighting.restore_color_temp {
            Some(0) => None,
            Some(temp) => Some(temp),
            None => Some(DEFAULT_RESTORE_COLOR_TEMP),
        }
    }
}

/// Load the config file, or defaults when no path is given.
pub fn load(path: Option<&Path>) -> CliResult<FileConfig> {
    let Some(path) = path else {
        return Ok(FileConfig::default());
    };

    let contents = fs::read_to_string(path)
        .map_err(|err| io_error(&format!("failed to read {}", path.display()), err))?;
    let config = FileConfig::parse(&contents).map_err(|err| {
        CliError::new(
            CONFIG,
            format!("failed to parse {}: {err}", path.display()),
        )
    })?;
    tracing::debug!(path = %path.display(), "config loaded");
    Ok(config)
}
