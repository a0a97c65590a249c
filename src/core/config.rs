//! Configuration for the VRAM probe CLI

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main probe configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Default log filter directive (overridden by RUST_LOG and -v)
    pub log_level: String,

    /// Extra driver library names or paths, tried after the built-in ones
    pub extra_library_paths: Vec<PathBuf>,

    /// System log forwarding
    pub syslog: SyslogConfig,
}

/// System log forwarding settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyslogConfig {
    /// Forward tracing events to the system log
    pub enabled: bool,

    /// Identity the entries are logged under
    pub ident: String,

    /// Lowest level that gets forwarded
    pub min_level: String,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
            extra_library_paths: Vec::new(),
            syslog: SyslogConfig::default(),
        }
    }
}

impl Default for SyslogConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            ident: "vram-probe".into(),
            min_level: "info".into(),
        }
    }
}

impl ProbeConfig {
    /// Default config location: `<config dir>/vram-probe/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("vram-probe").join("config.toml"))
    }

    /// Load config from TOML file
    pub fn load(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load config, falling back to defaults when the file does not exist
    pub fn load_or_default(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save config to TOML file, creating parent directories
    pub fn save(&self, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Extra library candidates as strings for the prober
    pub fn extra_candidates(&self) -> Vec<String> {
        self.extra_library_paths
            .iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect()
    }
}
