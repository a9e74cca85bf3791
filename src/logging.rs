//! Logger setup for the demo and tools.
//!
//! The library only emits through the `log` facade; binaries call [`init_logging`] once.

use serde::{Deserialize, Serialize};
use std::sync::Once;

/// When to color log output.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogColor {
    #[default]
    Auto,
    Always,
    Never,
}

impl From<LogColor> for env_logger::WriteStyle {
    fn from(color: LogColor) -> Self {
        match color {
            LogColor::Auto => env_logger::WriteStyle::Auto,
            LogColor::Always => env_logger::WriteStyle::Always,
            LogColor::Never => env_logger::WriteStyle::Never,
        }
    }
}

/// Logger configuration, the `[logging]` table of `crosshatch.toml`.
///
/// `filter` uses `env_logger` syntax, e.g. `"info,wgpu_core=warn"`. Without one, `RUST_LOG`
/// applies, then `info`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub filter: Option<String>,
    pub color: LogColor,
}

static INIT: Once = Once::new();

/// Install the global logger. Later calls are ignored.
pub fn init_logging(config: LoggingConfig) {
    INIT.call_once(|| {
        let mut builder = env_logger::Builder::new();

        if let Some(filter) = config.filter {
            builder.parse_filters(&filter);
        } else if let Ok(filter) = std::env::var("RUST_LOG") {
            builder.parse_filters(&filter);
        } else {
            // wgpu is chatty at info
            builder
                .filter_level(log::LevelFilter::Info)
                .filter_module("wgpu_core", log::LevelFilter::Warn)
                .filter_module("wgpu_hal", log::LevelFilter::Warn);
        }

        builder.write_style(config.color.into());
        builder.init();

        log::debug!("logging initialized");
    });
}
