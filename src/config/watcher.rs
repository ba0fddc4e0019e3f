//! Configuration file watcher for hot reload.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::load_config;
use crate::config::routes::build_route_table;
use crate::config::schema::AppConfig;
use crate::observability::metrics;
use crate::routing::RouteTable;

/// A validated configuration together with the table built from it.
#[derive(Debug, Clone)]
pub struct ConfigUpdate {
    pub config: AppConfig,
    pub table: Arc<RouteTable>,
}

impl ConfigUpdate {
    /// Settings that differ from `running` but only take effect on restart.
    ///
    /// A reload swaps the route table; the listener, the request timeout, the
    /// default locale and the store seed rows stay as they were at startup.
    pub fn restart_required(&self, running: &AppConfig) -> Vec<&'static str> {
        let next = &self.config;
        let mut fields = Vec::new();
        if next.server.bind_address != running.server.bind_address {
            fields.push("server.bind_address");
        }
        if next.server.request_timeout_secs != running.server.request_timeout_secs {
            fields.push("server.request_timeout_secs");
        }
        if next.routing.default_locale != running.routing.default_locale {
            fields.push("routing.default_locale");
        }
        if next.store.tables != running.store.tables {
            fields.push("store.tables");
        }
        if next.observability.metrics_enabled != running.observability.metrics_enabled
            || next.observability.metrics_address != running.observability.metrics_address
        {
            fields.push("observability.metrics");
        }
        fields
    }
}

/// A watcher that monitors the configuration file for changes.
pub struct ConfigWatcher {
    path: PathBuf,
    update_tx: mpsc::UnboundedSender<ConfigUpdate>,
}

impl ConfigWatcher {
    /// Create a new ConfigWatcher.
    ///
    /// Returns the watcher and a receiver for rebuilt route tables.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<ConfigUpdate>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();

        (
            Self {
                path: path.to_path_buf(),
                update_tx,
            },
            update_rx,
        )
    }

    /// Start watching the file in a background thread.
    ///
    /// The returned watcher must be kept alive for as long as reloads should
    /// happen.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.update_tx.clone();
        let path = self.path.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if event.kind.is_modify() || event.kind.is_create() => {
                    tracing::info!(path = ?path, "Config file change detected, reloading");
                    match reload(&path) {
                        Ok(update) => {
                            metrics::record_reload("ok");
                            if tx.send(update).is_err() {
                                tracing::debug!("Reload receiver closed");
                            }
                        }
                        Err(e) => {
                            metrics::record_reload("error");
                            tracing::error!(error = %e, "Failed to reload config, keeping current route table");
                        }
                    }
                }
                Ok(_) => {}
                Err(e) => tracing::error!(error = ?e, "Watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&self.path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, "Config watcher started");
        Ok(watcher)
    }
}

/// Load, validate and build in one step.
pub fn reload(path: &Path) -> Result<ConfigUpdate, Box<dyn std::error::Error + Send + Sync>> {
    let config = load_config(path)?;
    let table = build_route_table(&config)?;
    Ok(ConfigUpdate {
        config,
        table: Arc::new(table),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;

    const BASE: &str = r#"
        [server]
        bind_address = "127.0.0.1:8080"

        [[routing.routes]]
        pattern = "about"
        target = "pages/about"
    "#;

    fn update_from(toml: &str) -> ConfigUpdate {
        let config = parse_config(toml).unwrap();
        let table = Arc::new(build_route_table(&config).unwrap());
        ConfigUpdate { config, table }
    }

    #[test]
    fn test_route_only_change_needs_no_restart() {
        let running = parse_config(BASE).unwrap();
        let update = update_from(&format!("{BASE}\n[[routing.routes]]\npattern = \"help\"\ntarget = \"pages/help\"\n"));
        assert!(update.restart_required(&running).is_empty());
        assert_eq!(update.table.len(), 2);
    }

    #[test]
    fn test_listener_and_store_changes_flagged() {
        let running = parse_config(BASE).unwrap();
        let update = update_from(
            r#"
            [server]
            bind_address = "127.0.0.1:9000"

            [routing]
            default_locale = "tr"

            [store.tables]
            pages = [{ slug = "about" }]
            "#,
        );
        assert_eq!(
            update.restart_required(&running),
            vec!["server.bind_address", "routing.default_locale", "store.tables"]
        );
    }

    #[test]
    fn test_reload_rejects_invalid_file() {
        let path = std::env::temp_dir().join(format!("route-gate-reload-{}.toml", std::process::id()));
        std::fs::write(&path, "[[routing.routes]]\npattern = \"/\"\ntarget = \"home\"\n").unwrap();
        assert!(reload(&path).is_err());

        std::fs::write(&path, BASE).unwrap();
        let update = reload(&path).unwrap();
        assert_eq!(update.config.server.bind_address, "127.0.0.1:8080");
        std::fs::remove_file(&path).unwrap();
    }
}
