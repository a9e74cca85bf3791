//! `crosshatch.toml`: window, hatching look, asset locations and logging.
//!
//! Every table and key is optional; missing ones take their defaults.

use crate::hatch::HatchParams;
use crate::logging::LoggingConfig;
use crate::material::SurfaceParams;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_PATH: &str = "crosshatch.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CrosshatchConfig {
    pub window: WindowConfig,
    pub hatch: HatchParams,
    pub surface: SurfaceParams,
    pub assets: AssetsConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetsConfig {
    /// Directory holding `paper/`, `envmap/` and the noise image.
    pub root: PathBuf,
    /// Noise image relative to `root`. A generated texture is used when missing.
    pub noise: Option<PathBuf>,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "crosshatch".to_string(),
            width: 1280,
            height: 720,
        }
    }
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("assets"),
            noise: Some(PathBuf::from("noise1.png")),
        }
    }
}

impl AssetsConfig {
    pub fn paper_dir(&self) -> PathBuf {
        self.root.join("paper")
    }

    pub fn envmap_dir(&self) -> PathBuf {
        self.root.join("envmap")
    }

    pub fn noise_path(&self) -> Option<PathBuf> {
        self.noise.as_ref().map(|noise| self.root.join(noise))
    }
}

impl CrosshatchConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load `crosshatch.toml` from the working directory.
    ///
    /// A missing file yields the defaults silently; an unreadable or invalid one is reported
    /// and also yields the defaults.
    pub fn load_or_default() -> Self {
        match Self::load_from_file(DEFAULT_PATH) {
            Ok(config) => config,
            Err(ConfigError::Read { source, .. })
                if source.kind() == std::io::ErrorKind::NotFound =>
            {
                Self::default()
            }
            Err(err) => {
                log::warn!("{err}; using defaults");
                Self::default()
            }
        }
    }

    /// Let environment variables override file values.
    ///
    /// `CROSSHATCH_ASSETS` sets the asset root, `CROSSHATCH_PAPER` the initial paper.
    pub fn merge_with_env(&mut self) {
        if let Ok(root) = std::env::var("CROSSHATCH_ASSETS") {
            self.assets.root = PathBuf::from(root);
        }
        if let Ok(paper) = std::env::var("CROSSHATCH_PAPER") {
            self.hatch.paper = paper;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_is_all_defaults() {
        let config: CrosshatchConfig = toml::from_str("").unwrap();
        assert_eq!(config, CrosshatchConfig::default());
        assert_eq!(config.hatch, HatchParams::default());
    }

    #[test]
    fn partial_tables_keep_other_defaults() {
        let config: CrosshatchConfig = toml::from_str(
            r#"
            [window]
            width = 800

            [hatch]
            paper = "Parchment"
            ink_color = [0.0, 0.0, 0.0]
            edge_overlay = false

            [surface]
            environment = "pisa"

            [assets]
            root = "/opt/crosshatch"

            [logging]
            filter = "debug"
            color = "never"
            "#,
        )
        .unwrap();

        assert_eq!(config.window.width, 800);
        assert_eq!(config.window.height, 720);
        assert_eq!(config.hatch.paper, "Parchment");
        assert_eq!(config.hatch.ink_color, [0.0; 3]);
        assert!(!config.hatch.edge_overlay);
        assert_eq!(config.hatch.scale, 0.5);
        assert_eq!(config.surface.environment, "pisa");
        assert_eq!(config.surface.roughness, 0.2);
        assert_eq!(config.assets.paper_dir(), PathBuf::from("/opt/crosshatch/paper"));
        assert_eq!(
            config.assets.noise_path(),
            Some(PathBuf::from("/opt/crosshatch/noise1.png"))
        );
        assert_eq!(config.logging.filter.as_deref(), Some("debug"));
        assert_eq!(config.logging.color, crate::logging::LogColor::Never);
    }

    #[test]
    fn bad_values_are_parse_errors() {
        let dir = std::env::temp_dir().join(format!("crosshatch-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("bad.toml");
        std::fs::write(&path, "[hatch]\nscale = \"wide\"\n").unwrap();

        let err = CrosshatchConfig::load_from_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));

        let err = CrosshatchConfig::load_from_file(dir.join("missing.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
