pub mod config;
pub mod daemon;
pub mod sync;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_json::Value;

use skillsync_core::Config;

pub(crate) fn home_dir() -> Result<PathBuf> {
    dirs::home_dir().context("could not determine home directory")
}

/// `<home>/.skillsync/config.yaml` layered under the process environment.
pub(crate) fn load_config(home: &Path) -> Result<Config> {
    Config::load_at(home, |key| std::env::var(key).ok()).context("failed to load configuration")
}

/// Read a JSON document from `path`, or stdin when `path` is `-`.
pub(crate) fn read_json(path: &Path) -> Result<Value> {
    let text = if path == Path::new("-") {
        std::io::read_to_string(std::io::stdin()).context("read event from stdin")?
    } else {
        std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?
    };
    serde_json::from_str(&text).with_context(|| format!("{} is not valid JSON", path.display()))
}
