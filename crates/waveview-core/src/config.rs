//! Engine configuration
//!
//! Configuration is stored as YAML and loaded with defaults-on-missing so a
//! fresh install works without any file present. The values here used to be
//! ambient widget state in older viewers; they are passed explicitly to the
//! scheduler and cache at construction instead.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Tuning knobs for the reduction/render pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum output bucket count per rendered envelope
    ///
    /// The renderable point budget: no envelope ever carries more buckets
    /// than this, regardless of viewport width.
    pub max_buckets: usize,
    /// Full-range bucket counts precomputed by the resolution cache,
    /// coarsest first
    pub tier_buckets: Vec<usize>,
    /// How long the scheduler collects viewport events before dispatching
    /// one render for the latest state, in milliseconds
    pub coalesce_window_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_buckets: 4096,
            tier_buckets: vec![1024, 16384],
            coalesce_window_ms: 30,
        }
    }
}

/// Load configuration from a YAML file
///
/// Missing file or parse failure falls back to defaults with a warning;
/// a broken config never prevents the viewer from starting.
pub fn load_config(path: &Path) -> EngineConfig {
    if !path.exists() {
        log::info!("load_config: {:?} doesn't exist, using defaults", path);
        return EngineConfig::default();
    }

    match std::fs::read_to_string(path) {
        Ok(contents) => match serde_yaml::from_str(&contents) {
            Ok(config) => {
                log::info!("load_config: loaded {:?}", path);
                config
            }
            Err(e) => {
                log::warn!("load_config: failed to parse config: {}, using defaults", e);
                EngineConfig::default()
            }
        },
        Err(e) => {
            log::warn!("load_config: failed to read config file: {}, using defaults", e);
            EngineConfig::default()
        }
    }
}

/// Save configuration to a YAML file, creating parent directories as needed
pub fn save_config(config: &EngineConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create config directory: {:?}", parent))?;
    }

    let yaml = serde_yaml::to_string(config).context("failed to serialize config to YAML")?;
    std::fs::write(path, yaml).with_context(|| format!("failed to write config file: {:?}", path))?;

    log::info!("save_config: saved {:?}", path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_nonexistent_returns_default() {
        let config = load_config(Path::new("/nonexistent/path/waveview.yaml"));
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("waveview.yaml");

        let config = EngineConfig {
            max_buckets: 2000,
            tier_buckets: vec![512],
            coalesce_window_ms: 50,
        };

        save_config(&config, &path).unwrap();
        assert_eq!(load_config(&path), config);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("waveview.yaml");
        std::fs::write(&path, "max_buckets: 1234\n").unwrap();

        let config = load_config(&path);
        assert_eq!(config.max_buckets, 1234);
        assert_eq!(config.tier_buckets, EngineConfig::default().tier_buckets);
    }
}
