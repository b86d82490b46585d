use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use rollcall_camera::Constraints;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::api::{AttendanceStats, DEFAULT_STATS};
use crate::workflow::WorkflowOptions;

pub static CONFIG_PATH: Lazy<&'static Path> = Lazy::new(|| {
    Path::new(option_env!("ROLLCALL_CONFIG_PATH").unwrap_or("/usr/local/etc/rollcall/config.toml"))
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Root of the attendance service, e.g. `http://localhost:5000`.
    pub base_url: String,
    pub camera: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    pub jpeg_quality: u8,
    /// Unset means verification calls may wait indefinitely.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,
    pub fallback_stats: AttendanceStats,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            camera: "/dev/video0".to_string(),
            width: Some(640),
            height: Some(480),
            jpeg_quality: rollcall_camera::capture::DEFAULT_JPEG_QUALITY,
            request_timeout_secs: None,
            fallback_stats: DEFAULT_STATS,
        }
    }
}

impl Config {
    pub fn constraints(&self) -> Constraints {
        Constraints {
            width: self.width,
            height: self.height,
        }
    }

    pub fn workflow_options(&self) -> WorkflowOptions {
        WorkflowOptions {
            constraints: self.constraints(),
            jpeg_quality: self.jpeg_quality,
            initial_stats: self.fallback_stats,
        }
    }
}

pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let path = path.unwrap_or(&CONFIG_PATH);
    if !path.exists() {
        return Ok(Config::default());
    }
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading config at {}", path.display()))?;
    toml::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))
}

pub fn save_config(cfg: &Config, path: Option<&Path>) -> Result<()> {
    let path = path.unwrap_or(&CONFIG_PATH);
    let data = toml::to_string_pretty(cfg)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, data).with_context(|| format!("writing config {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config(Some(&dir.path().join("absent.toml"))).unwrap();
        assert_eq!(cfg, Config::default());
        assert_eq!(cfg.request_timeout_secs, None);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "base_url = \"http://10.0.0.2:5000\"\ncamera = \"/dev/video2\"\n")
            .unwrap();

        let cfg = load_config(Some(&path)).unwrap();
        assert_eq!(cfg.base_url, "http://10.0.0.2:5000");
        assert_eq!(cfg.camera, "/dev/video2");
        assert_eq!(cfg.width, Some(640));
        assert_eq!(cfg.fallback_stats, DEFAULT_STATS);
    }

    #[test]
    fn saved_config_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let cfg = Config {
            request_timeout_secs: Some(30),
            jpeg_quality: 70,
            ..Config::default()
        };

        save_config(&cfg, Some(&path)).unwrap();
        assert_eq!(load_config(Some(&path)).unwrap(), cfg);
    }

    #[test]
    fn garbage_is_reported_with_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "jpeg_quality = \"high\"").unwrap();

        let err = load_config(Some(&path)).unwrap_err();
        assert!(format!("{err}").contains("parsing config"));
    }
}
