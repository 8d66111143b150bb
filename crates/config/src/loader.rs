use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::{env_subst::substitute_env, schema::ChatlineConfig};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &["chatline.toml", "chatline.yaml", "chatline.yml", "chatline.json"];

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> Result<ChatlineConfig, LoadError> {
    let raw = std::fs::read_to_string(path).map_err(|source| LoadError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let raw = substitute_env(&raw);
    parse_config(&raw, path)
}

/// Discover and load config from standard locations.
///
/// Search order:
/// 1. `./chatline.{toml,yaml,yml,json}` (project-local)
/// 2. `~/.config/chatline/chatline.{toml,yaml,yml,json}` (user-global)
///
/// Returns `ChatlineConfig::default()` if no config file is found.
pub fn discover_and_load() -> ChatlineConfig {
    if let Some(path) = find_config_file() {
        debug!(path = %path.display(), "loading config");
        match load_config(&path) {
            Ok(cfg) => return cfg,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
            },
        }
    } else {
        debug!("no config file found, using defaults");
    }
    ChatlineConfig::default()
}

/// Find the first config file in standard locations.
fn find_config_file() -> Option<PathBuf> {
    // Project-local
    for name in CONFIG_FILENAMES {
        let p = PathBuf::from(name);
        if p.exists() {
            return Some(p);
        }
    }

    // User-global: ~/.config/chatline/
    if let Some(dirs) = directories::ProjectDirs::from("", "", "chatline") {
        let config_dir = dirs.config_dir();
        for name in CONFIG_FILENAMES {
            let p = config_dir.join(name);
            if p.exists() {
                return Some(p);
            }
        }
    }

    None
}

/// Returns the user-global config directory (`~/.config/chatline/`).
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "chatline").map(|d| d.config_dir().to_path_buf())
}

fn parse_config(raw: &str, path: &Path) -> Result<ChatlineConfig, LoadError> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => toml::from_str(raw).map_err(|e| LoadError::parse(path, e)),
        "yaml" | "yml" => serde_yaml::from_str(raw).map_err(|e| LoadError::parse(path, e)),
        "json" => serde_json::from_str(raw).map_err(|e| LoadError::parse(path, e)),
        _ => Err(LoadError::UnsupportedFormat {
            extension: ext.to_string(),
        }),
    }
}

/// Config loading failures.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error("unsupported config format: .{extension}")]
    UnsupportedFormat { extension: String },
}

impl LoadError {
    fn parse(path: &Path, source: impl std::fmt::Display) -> Self {
        Self::Parse {
            path: path.to_path_buf(),
            message: source.to_string(),
        }
    }
}
