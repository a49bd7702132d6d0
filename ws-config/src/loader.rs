// Standard library imports
use std::fs;
use std::path::{Path, PathBuf};

// External crate imports
use anyhow::{bail, Context, Result};
use tracing::{debug, info};

// Internal imports
use crate::config::Config;

const LOCAL_CONFIG: &str = "ws.yaml";
const SYSTEM_CONFIG: &str = "/etc/ws/config.yaml";

/// Finds and loads the launcher configuration.
///
/// Priority chain:
/// 1. **Explicit path** given on the command line (must exist).
/// 2. **`WS_CONFIG`** environment variable (must exist).
/// 3. **`./ws.yaml`** in the working directory.
/// 4. **`/etc/ws/config.yaml`**.
///
/// With no file found the built-in defaults are used. Environment overrides
/// are applied and the result is validated in every case.
#[derive(Debug, Default)]
pub struct ConfigLoader {
    explicit: Option<PathBuf>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            explicit: Some(path.into()),
        }
    }

    pub fn load(&self) -> Result<Config> {
        let mut config = match self.locate()? {
            Some(path) => {
                info!("Loading config from: {}", path.display());
                self.load_file(&path)?
            }
            None => {
                info!("No configuration file found, using defaults");
                Config::default()
            }
        };

        config.apply_env_overrides();
        config.validate().context("Invalid configuration")?;
        Ok(config)
    }

    fn locate(&self) -> Result<Option<PathBuf>> {
        if let Some(path) = &self.explicit {
            if !path.exists() {
                bail!("Config file not found: {}", path.display());
            }
            return Ok(Some(path.clone()));
        }

        if let Ok(path) = std::env::var("WS_CONFIG") {
            let path = PathBuf::from(path);
            if !path.exists() {
                bail!("WS_CONFIG points to a missing file: {}", path.display());
            }
            return Ok(Some(path));
        }

        for candidate in [Path::new(LOCAL_CONFIG), Path::new(SYSTEM_CONFIG)] {
            debug!("Checking for config at {}", candidate.display());
            if candidate.exists() {
                return Ok(Some(candidate.to_path_buf()));
            }
        }

        Ok(None)
    }

    fn load_file(&self, path: &Path) -> Result<Config> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_yaml_ng::from_str(&contents)
            .with_context(|| format!("Failed to parse {}", path.display()))
    }
}
