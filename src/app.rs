//! Discovery → polling → reconnect loop.

use agquota_core::config::Settings;
use agquota_core::discovery::{
    CommandRunner, ConnectionParameters, HttpsProbe, PortProbe, ProcessResolver, ShellRunner,
};
use agquota_core::i18n::MessageKey;
use agquota_core::quota::{FetchOutcome, PollerEvent, QuotaPoller, QuotaSource};
use anyhow::{bail, Context, Result};
use std::io::BufRead;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{debug, info, warn};

use crate::config::{Command, Config, SettingsWatch};
use crate::display::{Display, OutputMode};

/// How a polling session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionEnd {
    /// Rediscover the language server and start a new session
    Reconnect,
    Shutdown,
}

/// Resolver reused across rediscoveries, so platform state such as the
/// Windows legacy-tool preference carries over. Rebuilt when the target
/// application changes.
struct ResolverSlot<R = ShellRunner, P = HttpsProbe> {
    cached: Option<(String, ProcessResolver<R, P>)>,
}

impl<R: CommandRunner, P: PortProbe> ResolverSlot<R, P> {
    fn new() -> Self {
        Self { cached: None }
    }

    fn get_or_build<E>(
        &mut self,
        app_name: &str,
        build: impl FnOnce(&str) -> Result<ProcessResolver<R, P>, E>,
    ) -> Result<&ProcessResolver<R, P>, E> {
        let entry = match self.cached.take() {
            Some((name, resolver)) if name == app_name => (name, resolver),
            _ => {
                debug!(app_name, "Building process resolver");
                (app_name.to_string(), build(app_name)?)
            }
        };
        Ok(&self.cached.insert(entry).1)
    }
}

/// Main application
pub struct App {
    settings: Settings,
    cli: Config,
    display: Display,
    resolver: ResolverSlot,
}

impl App {
    pub fn new(settings: Settings, cli: Config) -> Self {
        let mode = if cli.json {
            OutputMode::Json
        } else {
            OutputMode::Text
        };
        let display = Display::new(&settings, mode);
        Self {
            settings,
            cli,
            display,
            resolver: ResolverSlot::new(),
        }
    }

    /// Run the selected subcommand
    pub async fn run(self) -> Result<()> {
        match self.cli.command() {
            Command::Watch => self.watch().await,
            Command::Status => self.status().await,
            Command::Discover => self.discover().await,
        }
    }

    async fn resolve(&mut self, settings: &Settings) -> Result<Option<ConnectionParameters>> {
        let resolver = self
            .resolver
            .get_or_build(&settings.discovery.app_name, ProcessResolver::for_current_platform)
            .context("Failed to set up process discovery")?;
        match resolver.resolve_with_error(settings.discovery.max_attempts).await {
            Ok(params) => Ok(Some(params)),
            Err(e) => {
                let messages = resolver.strategy().error_messages();
                self.display
                    .emit(&self.display.render_not_found(&messages, e.is_command_failure()));
                Ok(None)
            }
        }
    }

    async fn discover(mut self) -> Result<()> {
        let settings = self.settings.clone();
        let Some(params) = self.resolve(&settings).await? else {
            bail!(self.display.translator().t(MessageKey::ProcessNotFound));
        };
        self.display.emit(&self.display.render_connection(&params));
        Ok(())
    }

    async fn status(mut self) -> Result<()> {
        let settings = self.settings.clone();
        let Some(params) = self.resolve(&settings).await? else {
            bail!(self.display.translator().t(MessageKey::ProcessNotFound));
        };
        let poller = QuotaPoller::connect(params, settings.language)?;

        match poller.fetch_once().await {
            FetchOutcome::Updated(snapshot) => {
                self.display.emit(&self.display.render_snapshot(&snapshot));
                Ok(())
            }
            FetchOutcome::Failed(e) => {
                self.display.emit(&self.display.render_error(&e));
                Err(e).context("Quota fetch failed")
            }
            FetchOutcome::Skipped => Ok(()),
        }
    }

    /// Keep polling until Ctrl-C, rediscovering whenever the poller asks
    async fn watch(mut self) -> Result<()> {
        let settings_watch = match Settings::resolve_path(self.cli.config.as_ref()) {
            Some(path) => SettingsWatch::start(path, self.settings.clone(), self.cli.clone())
                .unwrap_or_else(|e| {
                    warn!("Config reload disabled: {:#}", e);
                    SettingsWatch::fixed(self.settings.clone())
                }),
            None => SettingsWatch::fixed(self.settings.clone()),
        };
        let mut settings_rx = settings_watch.subscribe();
        let mut shutdown = shutdown_signal();
        let mut refresh_rx = stdin_lines();

        loop {
            let settings = settings_rx.borrow_and_update().clone();
            self.display.apply_settings(&settings);

            let params = tokio::select! {
                params = self.resolve(&settings) => params?,
                _ = shutdown.changed() => return Ok(()),
            };

            let Some(params) = params else {
                let delay = Duration::from_millis(settings.discovery.rediscover_delay_ms);
                debug!(delay_ms = settings.discovery.rediscover_delay_ms, "Retrying discovery later");
                tokio::select! {
                    _ = tokio::time::sleep(delay) => continue,
                    _ = shutdown.changed() => return Ok(()),
                }
            };

            let poller = QuotaPoller::connect(params, settings.language)?;
            let mut events = poller.subscribe();
            if settings.enabled {
                poller.start(settings.polling_interval());
            } else {
                info!("Polling disabled in settings; press Enter to refresh");
            }
            info!("{}", self.display.translator().t(MessageKey::InitializationSuccessful));

            let end = self
                .session(&poller, &mut events, &mut settings_rx, &mut refresh_rx, &mut shutdown)
                .await;
            poller.stop();
            drop(poller);

            match end {
                SessionEnd::Shutdown => return Ok(()),
                SessionEnd::Reconnect => {
                    info!("{}", self.display.translator().t(MessageKey::Reconnecting));
                }
            }
        }
    }

    /// Relay poller events until reconnect or shutdown
    async fn session<S: QuotaSource>(
        &mut self,
        poller: &QuotaPoller<S>,
        events: &mut broadcast::Receiver<PollerEvent>,
        settings_rx: &mut watch::Receiver<Settings>,
        refresh_rx: &mut mpsc::UnboundedReceiver<String>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> SessionEnd {
        let mut settings_open = true;
        let mut stdin_open = true;
        let mut current = settings_rx.borrow().clone();

        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Ok(PollerEvent::Snapshot(snapshot)) => {
                        self.display.emit(&self.display.render_snapshot(&snapshot));
                    }
                    Ok(PollerEvent::Error(e)) => {
                        self.display.emit(&self.display.render_error(&e));
                    }
                    Ok(PollerEvent::ReconnectNeeded) => {
                        warn!("{}", self.display.translator().t(MessageKey::ReconnectTriggered));
                        return SessionEnd::Reconnect;
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "Display fell behind poller events");
                    }
                    Err(broadcast::error::RecvError::Closed) => return SessionEnd::Reconnect,
                },
                changed = settings_rx.changed(), if settings_open => {
                    if changed.is_err() {
                        settings_open = false;
                        continue;
                    }
                    let updated = settings_rx.borrow_and_update().clone();
                    if updated.discovery.app_name != current.discovery.app_name
                        || updated.language != current.language
                    {
                        info!("Connection settings changed, reconnecting");
                        return SessionEnd::Reconnect;
                    }
                    self.apply_polling_change(poller, &current, &updated);
                    self.display.apply_settings(&updated);
                    current = updated;
                },
                line = refresh_rx.recv(), if stdin_open => {
                    if line.is_none() {
                        stdin_open = false;
                        continue;
                    }
                    info!("{}", self.display.translator().t(MessageKey::RefreshingQuota));
                    if let FetchOutcome::Skipped = poller.fetch_once().await {
                        debug!("Refresh skipped, a fetch is already running");
                    }
                },
                _ = shutdown.changed() => return SessionEnd::Shutdown,
            }
        }
    }

    fn apply_polling_change<S: QuotaSource>(
        &self,
        poller: &QuotaPoller<S>,
        old: &Settings,
        new: &Settings,
    ) {
        match (old.enabled, new.enabled) {
            (true, false) => {
                info!("Polling disabled");
                poller.stop();
            }
            (false, true) => poller.start(new.polling_interval()),
            (true, true) if old.polling_interval_ms != new.polling_interval_ms => {
                info!(
                    interval_ms = new.polling_interval_ms,
                    "Polling interval changed, restarting timer"
                );
                poller.start(new.polling_interval());
            }
            _ => {}
        }
    }
}

/// Lines typed on stdin, each one a manual refresh request.
///
/// Read on a plain thread: a blocking stdin read inside the runtime would
/// hold up shutdown until the next Enter.
fn stdin_lines() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            match line {
                Ok(line) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!("Failed to read stdin: {}", e);
                    break;
                }
            }
        }
        debug!("stdin closed, manual refresh disabled");
    });
    rx
}

/// Flips to `true` on Ctrl-C
fn shutdown_signal() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutting down");
                let _ = tx.send(true);
            }
            Err(e) => {
                warn!("Failed to listen for Ctrl-C: {}", e);
                // Keep the sender alive so receivers do not read this as shutdown
                std::future::pending::<()>().await;
            }
        }
    });
    rx
}
