//! Configuration file watcher for hot reload.
//!
//! Editors often save by writing a temp file and renaming it over the
//! original, which drops a watch placed on the file itself. The watcher
//! therefore observes the parent directory and filters events by file name.
//!
//! A save is rarely one event: truncate-then-write and rename sequences arrive
//! as bursts. The file is read only once the burst has gone quiet.

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::reload_config;
use crate::config::schema::GatewayConfig;

/// Quiet period after the last change before the file is read.
const SETTLE: Duration = Duration::from_millis(250);

/// Watches the gateway configuration file and publishes validated snapshots.
pub struct ConfigWatcher {
    path: PathBuf,
    update_tx: mpsc::UnboundedSender<GatewayConfig>,
}

impl ConfigWatcher {
    /// Returns the watcher and the receiving end of the update channel.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<GatewayConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        let watcher = Self {
            path: path.to_path_buf(),
            update_tx,
        };
        (watcher, update_rx)
    }

    /// Start watching. Must be called inside a Tokio runtime.
    ///
    /// The returned handle must be kept alive for events to keep flowing;
    /// dropping it also stops the reload task.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let Self { path, update_tx } = self;
        let directory = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let file_name = path.file_name().map(OsString::from);
        let (change_tx, change_rx) = mpsc::unbounded_channel::<()>();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if is_relevant(&event, file_name.as_deref()) => {
                    let _ = change_tx.send(());
                }
                Ok(_) => {}
                Err(e) => tracing::error!(error = ?e, "Config watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&directory, RecursiveMode::NonRecursive)?;
        tokio::spawn(reload_on_change(path.clone(), change_rx, update_tx));

        tracing::info!(path = ?path, "Config watcher started");
        Ok(watcher)
    }
}

/// Reload once per burst of changes, after `SETTLE` without a new one.
async fn reload_on_change(
    path: PathBuf,
    mut changes: mpsc::UnboundedReceiver<()>,
    updates: mpsc::UnboundedSender<GatewayConfig>,
) {
    while changes.recv().await.is_some() {
        loop {
            match tokio::time::timeout(SETTLE, changes.recv()).await {
                Ok(Some(())) => continue,
                Ok(None) => return,
                Err(_) => break,
            }
        }

        tracing::info!(path = ?path, "Config file changed, reloading");
        match reload_config(&path) {
            Ok(config) => {
                if updates.send(config).is_err() {
                    tracing::warn!("Gateway no longer accepting config updates");
                    return;
                }
            }
            Err(e) => tracing::error!(
                error = %e,
                "Rejected config change, keeping current configuration"
            ),
        }
    }
}

/// Create, modify or rename-into events naming the watched file.
fn is_relevant(event: &Event, file_name: Option<&OsStr>) -> bool {
    if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
        return false;
    }
    match file_name {
        Some(name) => event.paths.iter().any(|p| p.file_name() == Some(name)),
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, ModifyKind, RemoveKind};

    fn event(kind: EventKind, path: &str) -> Event {
        Event::new(kind).add_path(PathBuf::from(path))
    }

    fn config_file() -> (PathBuf, PathBuf) {
        let dir = std::env::temp_dir().join(format!("gateway-watch-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("gateway.toml");
        std::fs::write(&path, "[upstream]\norigin = \"https://first.example\"\n").unwrap();
        (dir, path)
    }

    #[test]
    fn only_changes_to_the_watched_file_count() {
        let name = Some(OsStr::new("gateway.toml"));

        assert!(is_relevant(&event(EventKind::Modify(ModifyKind::Any), "/etc/gw/gateway.toml"), name));
        assert!(is_relevant(&event(EventKind::Create(CreateKind::File), "/etc/gw/gateway.toml"), name));
        assert!(!is_relevant(&event(EventKind::Modify(ModifyKind::Any), "/etc/gw/other.toml"), name));
        assert!(!is_relevant(&event(EventKind::Remove(RemoveKind::File), "/etc/gw/gateway.toml"), name));
    }

    #[tokio::test]
    async fn truncate_then_write_reloads_final_content() {
        let (dir, path) = config_file();
        let (watcher, mut updates) = ConfigWatcher::new(&path);
        let _handle = watcher.run().unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        std::fs::write(&path, "").unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        std::fs::write(&path, "[upstream]\norigin = \"https://second.example\"\n").unwrap();

        let update = tokio::time::timeout(Duration::from_secs(5), updates.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(update.upstream.origin, "https://second.example");

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn emptied_file_is_not_applied() {
        let (dir, path) = config_file();
        let (watcher, mut updates) = ConfigWatcher::new(&path);
        let _handle = watcher.run().unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        std::fs::write(&path, "").unwrap();

        let update = tokio::time::timeout(Duration::from_secs(1), updates.recv()).await;
        assert!(update.is_err(), "an empty file must not produce a config update");

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
