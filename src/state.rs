use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-article read state, keyed by article URL, persisted as flat
/// JSON alongside the config.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppState {
    #[serde(default)]
    pub read_articles: HashMap<String, bool>,
    #[serde(default = "Utc::now")]
    pub last_sync: DateTime<Utc>,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            read_articles: HashMap::new(),
            last_sync: Utc::now(),
        }
    }
}

impl AppState {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading state file at {}", path.display()))?;
        let state: AppState = serde_json::from_str(&data)
            .with_context(|| format!("parsing state file at {}", path.display()))?;
        Ok(state)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating state directory {}", parent.display()))?;
        }
        let contents = serde_json::to_string_pretty(self).context("serializing state")?;
        fs::write(path, contents)
            .with_context(|| format!("writing state file {}", path.display()))?;
        Ok(())
    }

    pub fn mark_read(&mut self, url: &str) {
        self.read_articles.insert(url.to_string(), true);
        self.last_sync = Utc::now();
    }

    pub fn is_read(&self, url: &str) -> bool {
        self.read_articles.get(url).copied().unwrap_or(false)
    }
}

pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("rss-tui").join("state.json"))
}
