//! Engine configuration, loaded from an optional TOML file.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::EngineResult;

pub const DEFAULT_SAMPLE_RATE: u32 = 22_050;
pub const DEFAULT_BLOCK_SIZE: usize = 512;
pub const AUTOMATION_STRIDE: u32 = 32;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub sample_rate: u32,
    pub block_size: usize,
    pub automation_stride: u32,
    pub default_scene_path: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            block_size: DEFAULT_BLOCK_SIZE,
            automation_stride: AUTOMATION_STRIDE,
            default_scene_path: None,
        }
    }
}

impl EngineConfig {
    pub fn load(path: &Path) -> EngineResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&text)?)
    }

    /// `$XDG_CONFIG_HOME/pocketacid/config.toml`, falling back to defaults
    /// when no config directory is resolvable or the file is absent.
    pub fn load_from_default_location() -> Self {
        let Some(dir) = dirs::config_dir() else {
            return Self::default();
        };
        let path = dir.join("pocketacid").join("config.toml");
        if !path.exists() {
            return Self::default();
        }
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!("failed to load config at {}: {e}", path.display());
            Self::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.sample_rate, 22_050);
        assert_eq!(cfg.block_size, 512);
        assert_eq!(cfg.automation_stride, 32);
    }
}
