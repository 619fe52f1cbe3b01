use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    #[serde(default)]
    pub feeds: Vec<FeedConfig>,
    #[serde(default = "default_true")]
    pub auto_save: bool,
    #[serde(default = "default_true")]
    pub mark_read_on_view: bool,
    #[serde(default = "default_category")]
    pub default_category: String,
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_min: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            feeds: Vec::new(),
            auto_save: true,
            mark_read_on_view: true,
            default_category: default_category(),
            refresh_interval_min: default_refresh_interval(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct FeedConfig {
    pub url: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

fn default_true() -> bool {
    true
}

fn default_category() -> String {
    "general".to_string()
}

fn default_refresh_interval() -> u32 {
    60
}

impl Config {
    /// Reads the config file at `path`, normalizing feed URLs. A
    /// missing or unreadable file yields the defaults; only a present
    /// but malformed file is an error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading config file at {}", path.display()))?;
        let mut config: Config = serde_json::from_str(&data)
            .with_context(|| format!("parsing config file at {}", path.display()))?;
        for feed in &mut config.feeds {
            feed.url = normalize_feed_url(&feed.url);
        }
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating config directory {}", parent.display()))?;
        }
        let contents = serde_json::to_string_pretty(self).context("serializing config")?;
        fs::write(path, contents)
            .with_context(|| format!("writing config file {}", path.display()))?;
        Ok(())
    }

    /// Adds a feed, normalizing the URL. Returns false when a feed
    /// with the same URL is already configured.
    pub fn add_feed(&mut self, url: &str, category: &str, tags: Vec<String>) -> bool {
        let url = normalize_feed_url(url);
        if self.feeds.iter().any(|feed| feed.url == url) {
            return false;
        }
        let category = if category.trim().is_empty() {
            self.default_category.clone()
        } else {
            category.trim().to_string()
        };
        self.feeds.push(FeedConfig {
            url,
            category,
            tags,
        });
        true
    }

    /// Removes the feed with the given URL; returns whether anything
    /// was removed.
    pub fn remove_feed(&mut self, url: &str) -> bool {
        let before = self.feeds.len();
        self.feeds.retain(|feed| feed.url != url);
        self.feeds.len() != before
    }
}

/// Schemeless URLs get `https://` prepended so config entries can be
/// written as bare hostnames.
pub fn normalize_feed_url(url: &str) -> String {
    let url = url.trim();
    if url.is_empty() || url.contains("://") {
        url.to_string()
    } else {
        format!("https://{url}")
    }
}

pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("rss-tui").join("config.json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_loads_defaults() {
        let dir = tempdir().unwrap();
        let cfg = Config::load(&dir.path().join("config.json")).unwrap();
        assert!(cfg.feeds.is_empty());
        assert!(cfg.auto_save);
        assert_eq!(cfg.default_category, "general");
    }

    #[test]
    fn round_trips_through_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut cfg = Config::default();
        cfg.add_feed("https://example.test/feed.xml", "news", vec!["rust".into()]);
        cfg.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn schemeless_urls_are_normalized_on_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"feeds":[{"url":"example.test/feed"}]}"#).unwrap();

        let cfg = Config::load(&path).unwrap();
        assert_eq!(cfg.feeds[0].url, "https://example.test/feed");
    }

    #[test]
    fn add_feed_rejects_duplicates_and_fills_category() {
        let mut cfg = Config::default();
        assert!(cfg.add_feed("example.test/feed", "", Vec::new()));
        assert!(!cfg.add_feed("https://example.test/feed", "news", Vec::new()));
        assert_eq!(cfg.feeds.len(), 1);
        assert_eq!(cfg.feeds[0].category, "general");
    }

    #[test]
    fn remove_feed_by_url() {
        let mut cfg = Config::default();
        cfg.add_feed("https://example.test/feed", "news", Vec::new());
        assert!(cfg.remove_feed("https://example.test/feed"));
        assert!(!cfg.remove_feed("https://example.test/feed"));
        assert!(cfg.feeds.is_empty());
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{not json").unwrap();
        assert!(Config::load(&path).is_err());
    }
}
