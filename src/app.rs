use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tokio::sync::mpsc;

use crate::config::AppConfig;
use crate::error::Result;
use crate::event::Event;
use crate::format::tree_line;
use crate::fs::watcher::{DirectoryWatcher, EntryFilter, WatchEvent, WatchEventKind};
use crate::model::{
    DeferredUnload, DirectoryHandle, FileId, FileInfo, ListModel, Notification, RowChange,
    RowHandle,
};

/// Stable file ids for the paths this process has seen.
#[derive(Debug, Default)]
struct FileIds {
    ids: HashMap<PathBuf, FileId>,
    next: u64,
}

impl FileIds {
    fn id_for(&mut self, path: &Path) -> FileId {
        if let Some(&id) = self.ids.get(path) {
            return id;
        }
        self.next += 1;
        let id = FileId(self.next);
        self.ids.insert(path.to_path_buf(), id);
        id
    }

    fn get(&self, path: &Path) -> Option<FileId> {
        self.ids.get(path).copied()
    }

    /// Forget `path` and the paths below it whose ids `is_gone` reports as
    /// no longer shown.
    fn release(&mut self, path: &Path, is_gone: impl Fn(FileId) -> bool) {
        self.ids
            .retain(|known, id| !(known.starts_with(path) && is_gone(*id)));
    }
}

/// Drives one [`ListModel`] from a real directory tree.
pub struct App {
    pub model: ListModel,
    pub should_quit: bool,
    root: PathBuf,
    watcher: DirectoryWatcher,
    notifications: mpsc::UnboundedReceiver<Notification>,
    /// Notifications not yet taken by the caller.
    outbox: Vec<Notification>,
    ids: FileIds,
    /// Directories to open as soon as they are listed.
    pending_expands: HashSet<PathBuf>,
    /// Subscriptions whose enumeration has not finished.
    loading: HashSet<DirectoryHandle>,
    collapse: DeferredUnload,
}

impl App {
    /// Bind a model to `root` and start listing it. With `live` set, changes
    /// keep flowing in after the initial listing.
    pub fn new(
        root: &Path,
        config: &AppConfig,
        live: bool,
        event_tx: mpsc::UnboundedSender<Event>,
    ) -> Result<Self> {
        let (tx, notifications) = mpsc::unbounded_channel();
        let mut model = ListModel::with_sort(config.sort_spec());
        model.set_adapter(tx);

        let filter = EntryFilter {
            show_hidden: config.show_hidden(),
            ignore_patterns: config.ignore_patterns(),
        };
        let debounce = Duration::from_millis(config.debounce_ms());
        let mut watcher = DirectoryWatcher::new(filter, debounce, live, event_tx)?;
        watcher.subscribe(root, DirectoryHandle::ROOT)?;

        Ok(Self {
            model,
            should_quit: false,
            root: root.to_path_buf(),
            watcher,
            notifications,
            outbox: Vec::new(),
            ids: FileIds::default(),
            pending_expands: HashSet::new(),
            loading: HashSet::from([DirectoryHandle::ROOT]),
            collapse: DeferredUnload::new(Duration::from_millis(config.collapse_delay_ms())),
        })
    }

    /// Open `relative` (and every directory on the way to it) once listed.
    pub fn request_expand(&mut self, relative: &Path) {
        let mut path = self.root.clone();
        for component in relative.components() {
            path.push(component);
            self.pending_expands.insert(path.clone());
        }

        let mut ready: Vec<PathBuf> = self
            .pending_expands
            .iter()
            .filter(|p| self.ids.get(p).is_some())
            .cloned()
            .collect();
        ready.sort_by_key(|p| p.components().count());
        for path in ready {
            self.pending_expands.remove(&path);
            self.expand(&path);
        }
    }

    pub fn handle_event(&mut self, event: Event, now: Instant) {
        match event {
            Event::Watch(event) => self.handle_watch_event(event),
            Event::Tick => self.tick(now),
            Event::Interrupt => self.should_quit = true,
        }
    }

    /// Apply one directory-watch event to the model.
    pub fn handle_watch_event(&mut self, event: WatchEvent) {
        let WatchEvent {
            handle, kind, path, ..
        } = event;
        match kind {
            WatchEventKind::Added | WatchEventKind::Changed => {
                let id = self.ids.id_for(&path);
                let info = match FileInfo::from_path(&path, id) {
                    Ok(info) => info,
                    Err(e) => {
                        log::debug!("skipping {}: {}", path.display(), e);
                        return;
                    }
                };
                let is_directory = info.is_directory;
                if self.model.position_for_file(id, handle).is_some() {
                    self.model.file_changed(info, handle);
                } else {
                    self.model.add_file(info, handle);
                }
                if is_directory && self.pending_expands.remove(&path) {
                    if let Some(row) = self.model.position_for_file(id, handle) {
                        self.expand_row(row, &path);
                    }
                }
            }
            WatchEventKind::Removed => {
                if let Some(id) = self.ids.get(&path) {
                    self.model.remove_file(id, handle);
                    let model = &self.model;
                    self.ids
                        .release(&path, |id| model.positions_for_file(id).is_empty());
                }
            }
            WatchEventKind::Done => {
                self.model.done_loading(handle);
                self.loading.remove(&handle);
            }
        }
        self.pump();
    }

    /// Open the directory at `path`, or keep it open if a collapse is
    /// pending.
    pub fn expand(&mut self, path: &Path) -> Option<DirectoryHandle> {
        let id = self.ids.get(path)?;
        let row = self.model.first_position_for_file(id)?;
        self.expand_row(row, path)
    }

    fn expand_row(&mut self, row: RowHandle, path: &Path) -> Option<DirectoryHandle> {
        if let Some(handle) = self.model.directory_handle(row) {
            self.collapse.cancel(handle);
            return Some(handle);
        }
        let handle = self.model.load_subdirectory(row)?;
        if let Err(e) = self.watcher.subscribe(path, handle) {
            log::warn!("cannot watch {}: {}", path.display(), e);
            self.model.unload_directory(handle);
            self.pump();
            return None;
        }
        self.loading.insert(handle);
        self.pump();
        Some(handle)
    }

    /// Schedule the directory at `path` to be unloaded after the collapse
    /// delay.
    pub fn collapse(&mut self, path: &Path, now: Instant) -> bool {
        let handle = self
            .ids
            .get(path)
            .and_then(|id| self.model.first_position_for_file(id))
            .and_then(|row| self.model.directory_handle(row));
        match handle {
            Some(handle) => {
                self.collapse.schedule(handle, now);
                true
            }
            None => false,
        }
    }

    /// Run deferred unloads that are due.
    pub fn tick(&mut self, now: Instant) {
        for handle in self.collapse.due(now) {
            self.model.unload_directory(handle);
        }
        self.pump();
    }

    /// Every subscribed directory finished its initial listing.
    pub fn is_settled(&self) -> bool {
        self.loading.is_empty()
    }

    pub fn take_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.outbox)
    }

    /// The visible tree as indented text, one row per line.
    pub fn render_tree(&self) -> String {
        let mut out = String::new();
        for row in self.model.flatten() {
            let label = self.model.label(row.row).unwrap_or_default();
            out.push_str(&tree_line(row.depth, label, self.model.file(row.row)));
            out.push('\n');
        }
        out
    }

    /// Move model notifications to the outbox, unsubscribing unloaded
    /// directories on the way.
    fn pump(&mut self) {
        while let Ok(notification) = self.notifications.try_recv() {
            if let RowChange::SubdirectoryUnloaded { directory } = &notification.change {
                self.watcher.unsubscribe(*directory);
                self.loading.remove(directory);
                self.collapse.cancel(*directory);
            }
            self.outbox.push(notification);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::SystemTime;
    use tempfile::TempDir;

    fn setup_app() -> (TempDir, App, mpsc::UnboundedReceiver<Event>) {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("b.txt"), "hello").unwrap();
        fs::write(dir.path().join("a.txt"), "").unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub/inner.txt"), "").unwrap();
        fs::create_dir(dir.path().join("sub/deeper")).unwrap();
        fs::create_dir(dir.path().join("empty")).unwrap();

        let (tx, rx) = mpsc::unbounded_channel();
        let app = App::new(dir.path(), &AppConfig::default(), false, tx).unwrap();
        (dir, app, rx)
    }

    async fn settle(app: &mut App, rx: &mut mpsc::UnboundedReceiver<Event>) {
        while !app.is_settled() {
            match rx.recv().await {
                Some(event) => app.handle_event(event, Instant::now()),
                None => break,
            }
        }
    }

    fn handle_of(app: &App, path: &Path) -> Option<DirectoryHandle> {
        let id = app.ids.get(path)?;
        let row = app.model.first_position_for_file(id)?;
        app.model.directory_handle(row)
    }

    #[tokio::test]
    async fn lists_root_sorted() {
        let (_dir, mut app, mut rx) = setup_app();
        settle(&mut app, &mut rx).await;
        assert_eq!(
            app.render_tree(),
            "empty/\nsub/\na.txt  (0 B)\nb.txt  (5 B)\n"
        );
        app.model.check_invariants();
    }

    #[tokio::test]
    async fn expands_requested_directories() {
        let (_dir, mut app, mut rx) = setup_app();
        app.request_expand(Path::new("sub/deeper"));
        settle(&mut app, &mut rx).await;
        assert_eq!(
            app.render_tree(),
            "empty/\nsub/\n  deeper/\n    (Empty)\n  inner.txt  (0 B)\na.txt  (0 B)\nb.txt  (5 B)\n"
        );
        assert_eq!(app.model.open_directories().len(), 2);
    }

    #[tokio::test]
    async fn collapse_unloads_after_delay() {
        let (dir, mut app, mut rx) = setup_app();
        app.request_expand(Path::new("sub"));
        settle(&mut app, &mut rx).await;
        let sub = dir.path().join("sub");
        let handle = handle_of(&app, &sub).expect("sub open");
        app.take_notifications();

        let now = Instant::now();
        assert!(app.collapse(&sub, now));
        app.tick(now + Duration::from_secs(1));
        assert!(handle_of(&app, &sub).is_some());

        app.tick(now + Duration::from_secs(3));
        assert!(handle_of(&app, &sub).is_none());
        assert!(!app.watcher.is_subscribed(handle));
        assert!(app
            .take_notifications()
            .iter()
            .any(|n| n.change == RowChange::SubdirectoryUnloaded { directory: handle }));
    }

    #[tokio::test]
    async fn re_expand_cancels_pending_collapse() {
        let (dir, mut app, mut rx) = setup_app();
        app.request_expand(Path::new("sub"));
        settle(&mut app, &mut rx).await;
        let sub = dir.path().join("sub");
        let handle = handle_of(&app, &sub).expect("sub open");

        let now = Instant::now();
        app.collapse(&sub, now);
        assert_eq!(app.expand(&sub), Some(handle));
        app.tick(now + Duration::from_secs(10));
        assert_eq!(handle_of(&app, &sub), Some(handle));
    }

    #[tokio::test]
    async fn removed_and_changed_events_update_rows() {
        let (dir, mut app, mut rx) = setup_app();
        settle(&mut app, &mut rx).await;

        fs::remove_file(dir.path().join("a.txt")).unwrap();
        app.handle_watch_event(WatchEvent {
            handle: DirectoryHandle::ROOT,
            kind: WatchEventKind::Removed,
            path: dir.path().join("a.txt"),
            at: SystemTime::now(),
        });
        assert!(app.ids.get(&dir.path().join("a.txt")).is_none());
        fs::write(dir.path().join("c.txt"), "abc").unwrap();
        app.handle_watch_event(WatchEvent {
            handle: DirectoryHandle::ROOT,
            kind: WatchEventKind::Changed,
            path: dir.path().join("c.txt"),
            at: SystemTime::now(),
        });
        assert_eq!(
            app.render_tree(),
            "empty/\nsub/\nb.txt  (5 B)\nc.txt  (3 B)\n"
        );
        app.model.check_invariants();
    }

    #[tokio::test]
    async fn removed_paths_release_their_ids() {
        let (dir, mut app, mut rx) = setup_app();
        app.request_expand(Path::new("sub"));
        settle(&mut app, &mut rx).await;
        let sub = dir.path().join("sub");
        let inner = sub.join("inner.txt");
        assert!(app.ids.get(&inner).is_some());

        fs::remove_dir_all(&sub).unwrap();
        app.handle_watch_event(WatchEvent {
            handle: DirectoryHandle::ROOT,
            kind: WatchEventKind::Removed,
            path: sub.clone(),
            at: SystemTime::now(),
        });
        assert!(app.ids.get(&sub).is_none());
        assert!(app.ids.get(&inner).is_none());
        assert!(app.ids.get(&dir.path().join("a.txt")).is_some());
        app.model.check_invariants();
    }

    #[tokio::test]
    async fn late_events_for_collapsed_directory_are_dropped() {
        let (dir, mut app, mut rx) = setup_app();
        app.request_expand(Path::new("sub"));
        settle(&mut app, &mut rx).await;
        let sub = dir.path().join("sub");
        let handle = handle_of(&app, &sub).expect("sub open");
        let now = Instant::now();
        app.collapse(&sub, now);
        app.tick(now + Duration::from_secs(5));
        let before = app.render_tree();

        app.handle_watch_event(WatchEvent {
            handle,
            kind: WatchEventKind::Added,
            path: sub.join("inner.txt"),
            at: SystemTime::now(),
        });
        assert_eq!(app.render_tree(), before);
    }

    #[tokio::test]
    async fn notifications_serialize_as_json_lines() {
        let (_dir, mut app, mut rx) = setup_app();
        settle(&mut app, &mut rx).await;
        let lines: Vec<String> = app
            .take_notifications()
            .iter()
            .map(|n| serde_json::to_string(n).unwrap())
            .collect();
        assert!(!lines.is_empty());
        assert!(lines[0].contains(r#""kind":"row_inserted""#));
    }

    #[tokio::test]
    async fn interrupt_sets_quit_flag() {
        let (_dir, mut app, _rx) = setup_app();
        app.handle_event(Event::Interrupt, Instant::now());
        assert!(app.should_quit);
    }
}
