//! Configuration loading and env substitution.
//!
//! Config files: `chatline.toml`, `chatline.yaml`, or `chatline.json`,
//! searched in `./` then `~/.config/chatline/`.
//!
//! Supports `${ENV_VAR}` substitution in all string values.

pub mod env_subst;
pub mod loader;
pub mod schema;

pub use {
    loader::{LoadError, config_dir, discover_and_load, load_config},
    schema::{
        ChatlineConfig, CompletionConfig, DatabaseConfig, ServerConfig, WhatsAppConfig,
    },
};
