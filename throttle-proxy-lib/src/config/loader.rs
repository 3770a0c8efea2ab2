use std::fs;
use std::path::Path;

use crate::config::{validate, Config};
use crate::error::{ProxyError, Result};

/// On-disk configuration format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Yaml,
}

impl ConfigFormat {
    /// `.yaml` and `.yml` files are YAML, everything else is TOML.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
                Self::Yaml
            }
            _ => Self::Toml,
        }
    }
}

pub fn load_from_path<P: AsRef<Path>>(p: P) -> Result<Config> {
    let path = p.as_ref();
    let txt = fs::read_to_string(path).map_err(|e| {
        ProxyError::Config(format!("Failed to read config file {}: {e}", path.display()))
    })?;
    load_from_str(&txt, ConfigFormat::from_path(path))
}

pub fn load_from_str(txt: &str, format: ConfigFormat) -> Result<Config> {
    let cfg: Config = match format {
        ConfigFormat::Toml => toml::from_str(txt)
            .map_err(|e| ProxyError::Config(format!("Failed to parse config: {e}")))?,
        ConfigFormat::Yaml => serde_norway::from_str(txt)
            .map_err(|e| ProxyError::Config(format!("Failed to parse config: {e}")))?,
    };

    validate(&cfg)?;

    Ok(cfg)
}
