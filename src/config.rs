// ⚙️ Configuration - card-studio.toml
//
// [store]     path = "catalog.db"
// [import]    output_folder = "Cards", update_existing = true
// [validate]  folder = "Cards", database = "Main"

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub store: StoreConfig,
    #[serde(default)]
    pub import: ImportConfig,
    #[serde(default)]
    pub validate: ValidateConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ImportConfig {
    pub output_folder: Option<String>,
    #[serde(default = "default_update_existing")]
    pub update_existing: bool,
}

impl Default for ImportConfig {
    fn default() -> Self {
        ImportConfig {
            output_folder: None,
            update_existing: default_update_existing(),
        }
    }
}

fn default_update_existing() -> bool {
    true
}

/// Default sources for `validate` and `export` when no flag is given
#[derive(Debug, Deserialize, Clone, Default)]
pub struct ValidateConfig {
    pub folder: Option<String>,
    pub database: Option<String>,
}

/// Config written by `card-studio init` when none exists yet
pub const STARTER_CONFIG: &str = r#"[store]
path = "catalog.db"

[import]
output_folder = "Cards"
update_existing = true

[validate]
folder = "Cards"
"#;

/// Write `STARTER_CONFIG` to `path` unless a file is already there.
/// Returns `true` when a new file was written.
pub fn write_starter_config(path: &Path) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    std::fs::write(path, STARTER_CONFIG)
        .with_context(|| format!("Failed to write config file: {}", path.display()))?;
    Ok(true)
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_config(&content)
        .with_context(|| format!("Invalid config file: {}", path.display()))
}

pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;

    if config.store.path.as_os_str().is_empty() {
        anyhow::bail!("store.path must not be empty");
    }

    if let Some(folder) = &config.import.output_folder {
        if folder.trim().is_empty() {
            anyhow::bail!("import.output_folder must not be blank when set");
        }
    }

    Ok(config)
}
