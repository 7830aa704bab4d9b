//! Reload settings when the config file changes.

use agquota_core::config::Settings;
use anyhow::{Context, Result};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use super::Config;

/// Editors often write a file in several steps; wait for them to settle
const RELOAD_DEBOUNCE: Duration = Duration::from_millis(300);

/// Current settings, updated whenever the watched file changes
pub struct SettingsWatch {
    rx: watch::Receiver<Settings>,
    /// Kept alive when no file is watched so receivers never see a close
    _idle_tx: Option<watch::Sender<Settings>>,
    _watcher: Option<RecommendedWatcher>,
}

impl SettingsWatch {
    /// Fixed settings, nothing to watch
    pub fn fixed(settings: Settings) -> Self {
        let (tx, rx) = watch::channel(settings);
        Self {
            rx,
            _idle_tx: Some(tx),
            _watcher: None,
        }
    }

    /// Watch `path`; every change is re-read, merged with `cli` and validated.
    ///
    /// Must be called inside a tokio runtime.
    pub fn start(path: PathBuf, initial: Settings, cli: Config) -> Result<Self> {
        let path = std::fs::canonicalize(&path).unwrap_or(path);
        let (tx, rx) = watch::channel(initial);
        let (event_tx, mut event_rx) = mpsc::unbounded_channel::<()>();

        let file_name = path.file_name().map(|n| n.to_os_string());
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            match res {
                Ok(event) => {
                    let relevant = (event.kind.is_modify() || event.kind.is_create())
                        && event
                            .paths
                            .iter()
                            .any(|p| p.file_name().map(|n| n.to_os_string()) == file_name);
                    if relevant {
                        let _ = event_tx.send(());
                    }
                }
                Err(e) => warn!("Config watch error: {}", e),
            }
        })
        .context("Failed to create config file watcher")?;

        // Watch the directory: editors may replace the file instead of writing it
        let dir = path.parent().unwrap_or(Path::new("."));
        watcher
            .watch(dir, RecursiveMode::NonRecursive)
            .with_context(|| format!("Failed to watch {:?}", dir))?;
        info!(path = %path.display(), "Watching config file");

        tokio::spawn(async move {
            let mut pending = false;
            loop {
                tokio::select! {
                    event = event_rx.recv() => match event {
                        Some(()) => pending = true,
                        None => break,
                    },
                    _ = tokio::time::sleep(RELOAD_DEBOUNCE), if pending => {
                        pending = false;
                        reload(&path, &cli, &tx);
                    }
                    _ = tx.closed() => break,
                }
            }
            debug!("Config watcher stopped");
        });

        Ok(Self {
            rx,
            _idle_tx: None,
            _watcher: Some(watcher),
        })
    }

    /// Receiver for the current settings
    pub fn subscribe(&self) -> watch::Receiver<Settings> {
        self.rx.clone()
    }
}

/// Re-read the file and publish it if anything changed. Invalid files are ignored.
fn reload(path: &Path, cli: &Config, tx: &watch::Sender<Settings>) {
    let mut settings = match Settings::load_from(path) {
        Ok(settings) => settings,
        Err(e) => {
            warn!("Ignoring config change: {:#}", e);
            return;
        }
    };
    cli.merge_into(&mut settings);
    settings.validate();

    let changed = tx.send_if_modified(|current| {
        if *current == settings {
            return false;
        }
        *current = settings;
        true
    });
    if changed {
        info!("Settings reloaded");
    }
}
