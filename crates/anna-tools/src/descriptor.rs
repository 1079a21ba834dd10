//! Tool descriptor files
//!
//! Each subdirectory of the install dir carries a `tool.toml` naming a
//! builtin entry point. Discovery resolves the entry against the factory
//! table and constructs the tool.

use anna_core::{Error, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

pub const DESCRIPTOR_FILE: &str = "tool.toml";

#[derive(Clone, Debug, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    /// Builtin factory id. Defaults to `name`.
    #[serde(default)]
    pub entry: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Per-command cooldown overrides, in seconds.
    #[serde(default)]
    pub cooldowns: BTreeMap<String, u64>,
}

fn default_true() -> bool {
    true
}

impl ToolDescriptor {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let descriptor: ToolDescriptor = toml::from_str(&content)
            .map_err(|e| Error::config(format!("{}: {}", path.display(), e)))?;
        if descriptor.name.trim().is_empty() {
            return Err(Error::config(format!(
                "{}: descriptor has an empty name",
                path.display()
            )));
        }
        Ok(descriptor)
    }

    pub fn entry(&self) -> &str {
        self.entry.as_deref().unwrap_or(&self.name)
    }
}
