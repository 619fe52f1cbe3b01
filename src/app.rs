use std::sync::Arc;

use anyhow::{Context, Result};

use crate::article::Fetcher;
use crate::config::{self, Config};
use crate::feed::Reader;
use crate::state::{self, AppState};
use crate::ui;

pub fn run() -> Result<()> {
    let config_path = config::default_path();
    let state_path = state::default_path();

    let mut status = String::new();

    // A broken config or state file must not keep the app from
    // starting; fall back to defaults and say so in the status line.
    let config = match config_path.as_deref() {
        Some(path) => Config::load(path).unwrap_or_else(|err| {
            status = format!("Using default config: {err}");
            Config::default()
        }),
        None => Config::default(),
    };
    let app_state = match state_path.as_deref() {
        Some(path) => AppState::load(path).unwrap_or_else(|err| {
            status = format!("Starting with empty read state: {err}");
            AppState::default()
        }),
        None => AppState::default(),
    };

    if status.is_empty() {
        if config.feeds.is_empty() {
            status = format!(
                "No feeds configured yet. Add one here or edit {}.",
                friendly_path(config_path.as_ref())
            );
        } else {
            status = format!("{} feed(s) configured. Press enter to browse.", config.feeds.len());
        }
    }

    let user_agent = format!("rss-tui/{}", crate::VERSION);
    let reader = Arc::new(Reader::new(user_agent.clone()).context("building feed client")?);
    let fetcher = Arc::new(Fetcher::new(user_agent).context("building article client")?);

    let options = ui::Options {
        config,
        config_path,
        state: app_state,
        state_path: state_path.clone(),
        reader,
        fetcher,
        status_message: status,
    };

    let mut model = ui::Model::new(options);
    model.run()?;

    if let Some(path) = state_path {
        model.state().save(&path).context("saving read state")?;
    }

    Ok(())
}

fn friendly_path(path: Option<&std::path::PathBuf>) -> String {
    if let Some(path) = path {
        if let Some(home) = dirs::home_dir() {
            if let Ok(stripped) = path.strip_prefix(&home) {
                let mut display = String::from("~");
                if !stripped.as_os_str().is_empty() {
                    display.push_str(&format!("/{}", stripped.display()));
                }
                return display;
            }
        }
        path.display().to_string()
    } else {
        "~/.config/rss-tui/config.json".to_string()
    }
}
