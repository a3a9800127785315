//! # Configuration
//!
//! Configuration is managed by [`confique`], layered from:
//! 1. **Environment variables**: `MARGINALIA_HIGHLIGHT_COLOR`, `MARGINALIA_STORE_FILE`, etc.
//! 2. **Config file**: `marginalia.toml` in the directory passed to [`MarginaliaConfig::load`].
//! 3. **Compiled Defaults**: Built-in fallbacks via `#[config(default = ...)]`.
//!
//! ## Available Settings
//!
//! | Key | Default | Description |
//! |-----|---------|-------------|
//! | `highlight_color` | `yellow` | Background of an unresolved thread's highlight |
//! | `active_color` | `orange` | Background of the expanded thread's highlight |
//! | `pending_color` | `orange` | Underline of a thread being composed |
//! | `store_file` | `comments.json` | File name used by `FsGateway` |
//! | `context_limit` | `80` | Max characters kept as an indicator's context snippet |
//!
//! Colors are any CSS color; they are passed through to the document's marker styles.

use confique::Config;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{MarginaliaError, Result};

pub const CONFIG_FILENAME: &str = "marginalia.toml";

#[derive(Config, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct MarginaliaConfig {
    /// Background color of unresolved thread highlights.
    #[config(default = "yellow", env = "MARGINALIA_HIGHLIGHT_COLOR")]
    pub highlight_color: String,

    /// Background color of the expanded thread's highlight.
    #[config(default = "orange", env = "MARGINALIA_ACTIVE_COLOR")]
    pub active_color: String,

    /// Underline color of the range a new thread is being written for.
    #[config(default = "orange", env = "MARGINALIA_PENDING_COLOR")]
    pub pending_color: String,

    /// File name of the comment table written by the filesystem gateway.
    #[config(default = "comments.json", env = "MARGINALIA_STORE_FILE")]
    pub store_file: String,

    /// Maximum number of characters kept as an indicator's context snippet.
    #[config(default = 80, env = "MARGINALIA_CONTEXT_LIMIT")]
    pub context_limit: usize,
}

impl Default for MarginaliaConfig {
    fn default() -> Self {
        Self {
            highlight_color: "yellow".to_string(),
            active_color: "orange".to_string(),
            pending_color: "orange".to_string(),
            store_file: "comments.json".to_string(),
            context_limit: 80,
        }
    }
}

impl MarginaliaConfig {
    /// Load from `<dir>/marginalia.toml` with env overrides. A missing file
    /// yields the defaults.
    pub fn load<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let path = config_dir.as_ref().join(CONFIG_FILENAME);
        Self::builder()
            .env()
            .file(path)
            .load()
            .map_err(|e| MarginaliaError::Config(e.to_string()))
    }

    pub fn palette(&self) -> Palette {
        Palette {
            highlight: self.highlight_color.clone(),
            active: self.active_color.clone(),
            pending: self.pending_color.clone(),
        }
    }
}

/// Colors used by the indicator engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    pub highlight: String,
    pub active: String,
    pub pending: String,
}

impl Default for Palette {
    fn default() -> Self {
        MarginaliaConfig::default().palette()
    }
}
