//! Directory-watch service: enumerates subscribed directories and forwards
//! live changes below them as [`WatchEvent`]s.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use notify::{RecommendedWatcher, RecursiveMode};
use notify_debouncer_mini::{new_debouncer, DebouncedEvent, DebouncedEventKind, Debouncer};
use tokio::sync::mpsc;

use crate::error::Result;
use crate::event::Event;
use crate::model::DirectoryHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchEventKind {
    Added,
    Removed,
    Changed,
    /// Initial enumeration finished.
    Done,
}

/// One event for a subscribed directory. `path` is the affected entry, or
/// the directory itself for [`WatchEventKind::Done`].
#[derive(Debug, Clone, PartialEq)]
pub struct WatchEvent {
    pub handle: DirectoryHandle,
    pub kind: WatchEventKind,
    pub path: PathBuf,
    pub at: SystemTime,
}

impl WatchEvent {
    fn new(handle: DirectoryHandle, kind: WatchEventKind, path: PathBuf) -> Self {
        Self {
            handle,
            kind,
            path,
            at: SystemTime::now(),
        }
    }
}

/// Which directory entries are never reported.
#[derive(Debug, Clone, Default)]
pub struct EntryFilter {
    pub show_hidden: bool,
    pub ignore_patterns: Vec<String>,
}

impl EntryFilter {
    pub fn skips(&self, path: &Path) -> bool {
        let Some(name) = path.file_name() else {
            return true;
        };
        if !self.show_hidden && name.to_string_lossy().starts_with('.') {
            return true;
        }
        should_ignore(Path::new(name), &self.ignore_patterns)
    }
}

type Subscriptions = Arc<Mutex<HashMap<DirectoryHandle, PathBuf>>>;

/// Watches subscribed directories non-recursively and sends their events to
/// the driver loop.
pub struct DirectoryWatcher {
    subscriptions: Subscriptions,
    filter: Arc<EntryFilter>,
    event_tx: mpsc::UnboundedSender<Event>,
    /// `None` when live watching is off: subscriptions only enumerate.
    debouncer: Option<Debouncer<RecommendedWatcher>>,
}

impl DirectoryWatcher {
    /// Create a watcher. With `live` unset no platform watcher is created and
    /// only the initial enumeration is reported.
    pub fn new(
        filter: EntryFilter,
        debounce_duration: Duration,
        live: bool,
        event_tx: mpsc::UnboundedSender<Event>,
    ) -> Result<Self> {
        let subscriptions: Subscriptions = Arc::new(Mutex::new(HashMap::new()));
        let filter = Arc::new(filter);

        let debouncer = if live {
            let subs = subscriptions.clone();
            let filter = filter.clone();
            let tx = event_tx.clone();
            Some(new_debouncer(
                debounce_duration,
                move |result: std::result::Result<Vec<DebouncedEvent>, notify::Error>| match result {
                    Ok(events) => forward_changes(&events, &subs, &filter, &tx),
                    Err(e) => log::warn!("watcher error: {}", e),
                },
            )?)
        } else {
            None
        };

        Ok(Self {
            subscriptions,
            filter,
            event_tx,
            debouncer,
        })
    }

    /// Start delivering events for `dir` under `handle`: one `Added` per
    /// entry, then `Done`, then live changes.
    pub fn subscribe(&mut self, dir: &Path, handle: DirectoryHandle) -> Result<()> {
        let dir = dir.to_path_buf();
        if let Ok(mut subs) = self.subscriptions.lock() {
            subs.insert(handle, dir.clone());
        }
        if let Some(debouncer) = self.debouncer.as_mut() {
            debouncer
                .watcher()
                .watch(&dir, RecursiveMode::NonRecursive)?;
        }
        log::debug!("subscribed {} to {}", handle, dir.display());

        let subs = self.subscriptions.clone();
        let filter = self.filter.clone();
        let tx = self.event_tx.clone();
        tokio::task::spawn_blocking(move || enumerate(&dir, handle, &subs, &filter, &tx));
        Ok(())
    }

    /// Stop delivery for `handle`. Idempotent; returns whether it was
    /// subscribed.
    pub fn unsubscribe(&mut self, handle: DirectoryHandle) -> bool {
        let (dir, still_watched) = match self.subscriptions.lock() {
            Ok(mut subs) => match subs.remove(&handle) {
                Some(dir) => {
                    let still_watched = subs.values().any(|other| *other == dir);
                    (dir, still_watched)
                }
                None => return false,
            },
            Err(_) => return false,
        };
        if !still_watched {
            if let Some(debouncer) = self.debouncer.as_mut() {
                if let Err(e) = debouncer.watcher().unwatch(&dir) {
                    log::debug!("unwatch {}: {}", dir.display(), e);
                }
            }
        }
        log::debug!("unsubscribed {}", handle);
        true
    }

    pub fn is_subscribed(&self, handle: DirectoryHandle) -> bool {
        self.subscriptions
            .lock()
            .map(|subs| subs.contains_key(&handle))
            .unwrap_or(false)
    }

    pub fn is_live(&self) -> bool {
        self.debouncer.is_some()
    }
}

fn is_subscribed(subs: &Subscriptions, handle: DirectoryHandle) -> bool {
    subs.lock()
        .map(|subs| subs.contains_key(&handle))
        .unwrap_or(false)
}

/// Initial listing of a directory. Stops as soon as the handle is
/// unsubscribed.
fn enumerate(
    dir: &Path,
    handle: DirectoryHandle,
    subs: &Subscriptions,
    filter: &EntryFilter,
    tx: &mpsc::UnboundedSender<Event>,
) {
    match std::fs::read_dir(dir) {
        Ok(entries) => {
            for entry in entries.flatten() {
                if !is_subscribed(subs, handle) {
                    return;
                }
                let path = entry.path();
                if filter.skips(&path) {
                    continue;
                }
                let event = WatchEvent::new(handle, WatchEventKind::Added, path);
                if tx.send(Event::Watch(event)).is_err() {
                    return;
                }
            }
        }
        Err(e) => log::warn!("cannot read {}: {}", dir.display(), e),
    }
    if is_subscribed(subs, handle) {
        let _ = tx.send(Event::Watch(WatchEvent::new(
            handle,
            WatchEventKind::Done,
            dir.to_path_buf(),
        )));
    }
}

/// Map debounced paths to the subscriptions of their parent directories.
/// A path that still exists is reported as `Changed` (the driver adds it if
/// it is new), otherwise as `Removed`.
fn forward_changes(
    events: &[DebouncedEvent],
    subs: &Subscriptions,
    filter: &EntryFilter,
    tx: &mpsc::UnboundedSender<Event>,
) {
    let Ok(subs) = subs.lock() else {
        return;
    };
    for event in events.iter().filter(|e| e.kind == DebouncedEventKind::Any) {
        if filter.skips(&event.path) {
            continue;
        }
        let Some(parent) = event.path.parent() else {
            continue;
        };
        let kind = if std::fs::symlink_metadata(&event.path).is_ok() {
            WatchEventKind::Changed
        } else {
            WatchEventKind::Removed
        };
        for (&handle, dir) in subs.iter() {
            if dir == parent {
                let _ = tx.send(Event::Watch(WatchEvent::new(
                    handle,
                    kind,
                    event.path.clone(),
                )));
            }
        }
    }
}

/// Check if a path should be ignored based on ignore patterns.
///
/// A path is ignored if any of its components match any ignore pattern exactly.
pub fn should_ignore(path: &Path, patterns: &[String]) -> bool {
    path.components().any(|component| match component {
        std::path::Component::Normal(name) => {
            let name = name.to_string_lossy();
            patterns.iter().any(|pattern| name == pattern.as_str())
        }
        _ => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::fs;

    fn patterns(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn ignore_matches_any_component() {
        let patterns = patterns(&[".git", "node_modules"]);
        assert!(should_ignore(Path::new("/home/user/project/.git/HEAD"), &patterns));
        assert!(should_ignore(Path::new("/p/node_modules/x"), &patterns));
        assert!(!should_ignore(Path::new("/home/user/project/src/main.rs"), &patterns));
    }

    #[test]
    fn partial_name_does_not_match() {
        let patterns = patterns(&["target"]);
        assert!(!should_ignore(Path::new("/project/target2/file.txt"), &patterns));
    }

    #[test]
    fn filter_checks_only_the_entry_name() {
        let filter = EntryFilter {
            show_hidden: false,
            ignore_patterns: patterns(&["target"]),
        };
        assert!(filter.skips(Path::new("/work/target")));
        assert!(filter.skips(Path::new("/work/.hidden")));
        // An ignored ancestor does not hide everything below the root.
        assert!(!filter.skips(Path::new("/target/work/main.rs")));
    }

    #[test]
    fn filter_shows_hidden_when_asked() {
        let filter = EntryFilter {
            show_hidden: true,
            ignore_patterns: Vec::new(),
        };
        assert!(!filter.skips(Path::new("/work/.env")));
    }

    async fn collect_until_done(rx: &mut mpsc::UnboundedReceiver<Event>) -> Vec<WatchEvent> {
        let mut events = Vec::new();
        while let Some(Event::Watch(event)) = rx.recv().await {
            let done = event.kind == WatchEventKind::Done;
            events.push(event);
            if done {
                break;
            }
        }
        events
    }

    #[tokio::test]
    async fn subscribe_enumerates_then_reports_done() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("a.txt"), "a").expect("write");
        fs::create_dir(dir.path().join("sub")).expect("mkdir");
        fs::write(dir.path().join(".hidden"), "").expect("write");

        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut watcher = DirectoryWatcher::new(
            EntryFilter::default(),
            Duration::from_millis(50),
            false,
            tx,
        )
        .expect("watcher");
        assert!(!watcher.is_live());
        watcher
            .subscribe(dir.path(), DirectoryHandle::ROOT)
            .expect("subscribe");

        let events = collect_until_done(&mut rx).await;
        let (done, added) = events.split_last().expect("events");
        assert_eq!(done.kind, WatchEventKind::Done);
        assert_eq!(done.path, dir.path());
        let mut names: Vec<String> = added
            .iter()
            .map(|e| {
                assert_eq!(e.kind, WatchEventKind::Added);
                assert_eq!(e.handle, DirectoryHandle::ROOT);
                e.path.file_name().unwrap().to_string_lossy().to_string()
            })
            .collect();
        names.sort();
        assert_eq!(names, vec!["a.txt", "sub"]);
    }

    #[tokio::test]
    async fn unsubscribe_is_idempotent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut watcher = DirectoryWatcher::new(
            EntryFilter::default(),
            Duration::from_millis(50),
            false,
            tx,
        )
        .expect("watcher");
        watcher
            .subscribe(dir.path(), DirectoryHandle::ROOT)
            .expect("subscribe");
        assert!(watcher.is_subscribed(DirectoryHandle::ROOT));
        assert!(watcher.unsubscribe(DirectoryHandle::ROOT));
        assert!(!watcher.unsubscribe(DirectoryHandle::ROOT));
        assert!(!watcher.is_subscribed(DirectoryHandle::ROOT));
    }

    #[tokio::test]
    async fn unreadable_directory_still_reports_done() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut watcher = DirectoryWatcher::new(
            EntryFilter::default(),
            Duration::from_millis(50),
            false,
            tx,
        )
        .expect("watcher");
        watcher
            .subscribe(Path::new("/nonexistent/fm-list"), DirectoryHandle::ROOT)
            .expect("subscribe");
        let events = collect_until_done(&mut rx).await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, WatchEventKind::Done);
    }
}
