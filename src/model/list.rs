//! The hierarchical list model: top-level rows plus lazily loaded
//! subdirectories, kept sorted, indexed by file and mirrored to a view
//! through [`Notification`]s.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::PathBuf;

use indextree::Arena;

use super::entry::{Entry, EntryId, Level};
use super::file::{FileId, FileInfo};
use super::handle::{DirectoryHandle, RowHandle, TreePath};
use super::highlight::{DragView, HighlightState};
use super::notify::{Notification, RowChange, ViewAdapter};
use super::sort::{SortAttribute, SortDirection, SortSpec};

/// Placeholder label while a directory is being enumerated.
pub const LOADING_LABEL: &str = "Loading…";
/// Placeholder label for a directory that turned out empty.
pub const EMPTY_LABEL: &str = "(Empty)";

/// A row in display order, as produced by [`ListModel::flatten`].
#[derive(Debug, Clone, PartialEq)]
pub struct FlatRow {
    pub path: TreePath,
    pub depth: usize,
    pub row: RowHandle,
}

/// Sorted, lazily expanded file tree for one bound view.
pub struct ListModel {
    arena: Arena<Entry>,
    top: Level,
    /// Open subdirectories.
    directories: HashMap<DirectoryHandle, EntryId>,
    next_handle: u64,
    generation: u64,
    sort: SortSpec,
    highlight: HighlightState,
    adapter: Option<Box<dyn ViewAdapter>>,
}

impl Default for ListModel {
    fn default() -> Self {
        Self::new()
    }
}

impl ListModel {
    pub fn new() -> Self {
        Self::with_sort(SortSpec::default())
    }

    pub fn with_sort(sort: SortSpec) -> Self {
        Self {
            arena: Arena::new(),
            top: Level::open(DirectoryHandle::ROOT),
            directories: HashMap::new(),
            next_handle: 1,
            generation: 0,
            sort,
            highlight: HighlightState::default(),
            adapter: None,
        }
    }

    /// Route notifications to `adapter`, replacing any previous one.
    pub fn set_adapter(&mut self, adapter: impl ViewAdapter + 'static) {
        self.adapter = Some(Box::new(adapter));
    }

    // ── Mutation ────────────────────────────────────────────────────────────

    /// Add `file` to the level fed by `directory`.
    ///
    /// Returns `false` when the directory is unknown (the event is stale) or
    /// the file is already present.
    pub fn add_file(&mut self, file: FileInfo, directory: DirectoryHandle) -> bool {
        let Some(parent) = self.resolve_directory(directory) else {
            log::debug!("dropping add of {:?} for unknown {}", file.name, directory);
            return false;
        };
        let Some(level) = self.level(parent) else {
            return false;
        };
        if level.lookup(file.id).is_some() {
            log::warn!("{:?} ({:?}) is already in {}", file.name, file.id, directory);
            return false;
        }

        let file_id = file.id;
        let is_directory = file.is_directory;

        let id = match self.sole_placeholder(parent) {
            Some(placeholder) => {
                // Swap the real file into the placeholder row; same id, same position.
                if let Some(entry) = self.entry_mut(placeholder) {
                    entry.file = Some(file);
                }
                self.with_level(parent, |level, _, _| {
                    level.reverse.insert(file_id, placeholder);
                });
                self.emit_for(placeholder, |path| RowChange::RowChanged { path });
                placeholder
            }
            None => {
                let Some(id) = self.link_entry(parent, Entry::new(file)) else {
                    return false;
                };
                self.emit_for(id, |path| RowChange::RowInserted { path });
                id
            }
        };

        if is_directory {
            self.make_expandable(id);
        }
        true
    }

    /// Add several files to one level. Returns how many were added.
    pub fn add_files(&mut self, files: impl IntoIterator<Item = FileInfo>, directory: DirectoryHandle) -> usize {
        files
            .into_iter()
            .map(|file| self.add_file(file, directory))
            .filter(|added| *added)
            .count()
    }

    /// Remove a file and everything below it.
    pub fn remove_file(&mut self, file: FileId, directory: DirectoryHandle) -> bool {
        let Some(parent) = self.resolve_directory(directory) else {
            log::debug!("dropping removal of {:?} for unknown {}", file, directory);
            return false;
        };
        let Some(id) = self.level(parent).and_then(|level| level.lookup(file)) else {
            log::debug!("{:?} is not in {}", file, directory);
            return false;
        };
        self.remove_entry(id, true);
        true
    }

    /// Remove several files from one level. Returns how many were removed.
    pub fn remove_files(&mut self, files: &[FileId], directory: DirectoryHandle) -> usize {
        files
            .iter()
            .filter(|file| self.remove_file(**file, directory))
            .count()
    }

    /// Store new attributes for a file and move its row if its sort key
    /// changed.
    pub fn file_changed(&mut self, file: FileInfo, directory: DirectoryHandle) -> bool {
        let Some(parent) = self.resolve_directory(directory) else {
            log::debug!("dropping change of {:?} for unknown {}", file.name, directory);
            return false;
        };
        let Some(id) = self.level(parent).and_then(|level| level.lookup(file.id)) else {
            log::debug!("{:?} is not in {}", file.name, directory);
            return false;
        };
        let is_directory = file.is_directory;
        let Some(entry) = self.entry_mut(id) else {
            return false;
        };
        let was_directory = entry.is_directory();
        entry.file = Some(file);
        let cursor = entry.cursor;

        let moved = cursor.and_then(|cursor| {
            self.with_level(parent, |level, arena, sort| {
                let moved = level
                    .rows
                    .sort_changed(cursor, |a, b| compare_ids(arena, *a, *b, sort));
                moved.map(|(old, new)| (old, new, level.rows.len()))
            })
            .flatten()
        });
        if let Some((old, new, len)) = moved {
            if old != new {
                let parent_path = match parent {
                    Some(p) => self.entry_path(p),
                    None => Some(TreePath::new()),
                };
                if let Some(parent) = parent_path {
                    self.emit(RowChange::RowsReordered {
                        parent,
                        new_order: single_move_order(len, old, new),
                    });
                }
            }
        }
        self.emit_for(id, |path| RowChange::RowChanged { path });

        match (was_directory, is_directory) {
            (false, true) => self.make_expandable(id),
            (true, false) => self.drop_children(id),
            _ => {}
        }
        true
    }

    /// Open a directory row so its contents can be streamed in.
    ///
    /// Returns the handle to subscribe to the directory-watch service with,
    /// or `None` when the row is stale, not a directory, or already open.
    pub fn load_subdirectory(&mut self, row: RowHandle) -> Option<DirectoryHandle> {
        let id = self.resolve(row)?;
        let entry = self.entry(id)?;
        let Some(file) = entry.file.as_ref() else {
            log::warn!("cannot load a placeholder row");
            return None;
        };
        if !file.is_directory {
            log::warn!("{:?} is not a directory", file.name);
            return None;
        }
        if entry.children.as_ref().is_some_and(|level| level.handle.is_some()) {
            log::warn!("{:?} is already open", file.name);
            return None;
        }
        let file_id = file.id;
        if self
            .directories
            .values()
            .any(|&other| self.entry(other).and_then(Entry::file_id) == Some(file_id))
        {
            log::warn!("{:?} is already open elsewhere in the model", file_id);
            return None;
        }

        if self.entry(id)?.children.is_none() {
            self.make_expandable(id);
        }
        let handle = DirectoryHandle(self.next_handle);
        self.next_handle += 1;
        let entry = self.entry_mut(id)?;
        entry.loaded = false;
        let level = entry.children.as_mut()?;
        level.handle = Some(handle);
        level.reverse.clear();
        self.directories.insert(handle, id);
        Some(handle)
    }

    /// Collapse an open directory row, freeing its descendants.
    ///
    /// No-op (returns `false`) when the row is stale or not open.
    pub fn unload_subdirectory(&mut self, row: RowHandle) -> bool {
        match self.resolve(row) {
            Some(id) => self.unload_entry(id),
            None => false,
        }
    }

    /// Collapse the directory fed by `directory`, if it is still open.
    pub fn unload_directory(&mut self, directory: DirectoryHandle) -> bool {
        match self.directories.get(&directory) {
            Some(&id) => self.unload_entry(id),
            None => {
                log::debug!("{} is no longer open", directory);
                false
            }
        }
    }

    /// The directory-watch service finished enumerating `directory`.
    pub fn done_loading(&mut self, directory: DirectoryHandle) -> bool {
        if directory.is_root() {
            return true;
        }
        let Some(&id) = self.directories.get(&directory) else {
            log::debug!("dropping done-loading for unknown {}", directory);
            return false;
        };
        let Some(entry) = self.entry_mut(id) else {
            return false;
        };
        let was_loaded = std::mem::replace(&mut entry.loaded, true);
        if !was_loaded {
            if let Some(placeholder) = self.sole_placeholder(Some(id)) {
                self.emit_for(placeholder, |path| RowChange::RowChanged { path });
            }
        }
        true
    }

    /// Drop every row and invalidate all outstanding handles.
    pub fn clear(&mut self) {
        let mut handles: Vec<DirectoryHandle> =
            self.directories.drain().map(|(handle, _)| handle).collect();
        handles.sort();
        let count = self.top.rows.len();
        self.arena = Arena::new();
        self.top = Level::open(DirectoryHandle::ROOT);
        self.generation += 1;
        for directory in handles {
            self.emit(RowChange::SubdirectoryUnloaded { directory });
        }
        for index in (0..count).rev() {
            self.emit(RowChange::RowDeleted {
                path: TreePath::from(vec![index]),
            });
        }
    }

    /// Change the sort order and re-sort every level, children before their
    /// parents.
    pub fn set_sort(&mut self, attribute: SortAttribute, direction: SortDirection, directories_first: bool) {
        self.sort = SortSpec {
            attribute,
            direction,
            directories_first,
        };
        self.resort_level(None, TreePath::new());
    }

    pub fn set_sort_attribute(&mut self, attribute: SortAttribute) {
        self.set_sort(attribute, self.sort.direction, self.sort.directories_first);
    }

    pub fn set_sort_direction(&mut self, direction: SortDirection) {
        self.set_sort(self.sort.attribute, direction, self.sort.directories_first);
    }

    pub fn set_directories_first(&mut self, directories_first: bool) {
        self.set_sort(self.sort.attribute, self.sort.direction, directories_first);
    }

    // ── Highlight / drag ────────────────────────────────────────────────────

    /// Replace the set of highlighted files; rows whose state flips get a
    /// `RowChanged`.
    pub fn set_highlight_for_files(&mut self, files: &[FileId]) {
        for file in self.highlight.replace(files) {
            for row in self.positions_for_file(file) {
                self.emit_for(row.entry, |path| RowChange::RowChanged { path });
            }
        }
    }

    pub fn is_highlighted(&self, row: RowHandle) -> bool {
        self.file(row)
            .is_some_and(|file| self.highlight.contains(file.id))
    }

    pub fn highlighted_files(&self) -> Vec<FileId> {
        self.highlight.files()
    }

    /// Remember where a drag started.
    pub fn set_drag_view(&mut self, view: u64, x: f64, y: f64) {
        self.highlight.set_drag(Some(DragView { view, x, y }));
    }

    pub fn clear_drag_view(&mut self) {
        self.highlight.set_drag(None);
    }

    pub fn drag_view(&self) -> Option<DragView> {
        self.highlight.drag()
    }

    /// Paths of the dragged rows; stale rows and placeholders are skipped.
    pub fn drag_paths(&self, rows: &[RowHandle]) -> Vec<PathBuf> {
        rows.iter()
            .filter_map(|row| self.file(*row))
            .map(|file| file.path.clone())
            .collect()
    }

    // ── Queries ─────────────────────────────────────────────────────────────

    /// Current generation; handles from older generations are rejected.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn sort_spec(&self) -> SortSpec {
        self.sort
    }

    /// Number of top-level rows.
    pub fn len(&self) -> usize {
        self.top.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.top.rows.is_empty()
    }

    pub fn is_valid(&self, row: RowHandle) -> bool {
        self.resolve(row).is_some()
    }

    pub fn path(&self, row: RowHandle) -> Option<TreePath> {
        self.entry_path(self.resolve(row)?)
    }

    pub fn row_at(&self, path: &TreePath) -> Option<RowHandle> {
        let mut current = None;
        for &index in path.indices() {
            current = Some(*self.level(current)?.rows.at(index)?);
        }
        current.map(|id| self.handle(id))
    }

    /// The file shown by `row`, `None` for placeholders and stale handles.
    pub fn file(&self, row: RowHandle) -> Option<&FileInfo> {
        self.entry(self.resolve(row)?)?.file.as_ref()
    }

    pub fn is_placeholder(&self, row: RowHandle) -> bool {
        self.resolve(row)
            .and_then(|id| self.entry(id))
            .is_some_and(Entry::is_placeholder)
    }

    /// Display label: the file name, or the placeholder text.
    pub fn label(&self, row: RowHandle) -> Option<&str> {
        let id = self.resolve(row)?;
        match &self.entry(id)?.file {
            Some(file) => Some(file.name.as_str()),
            None => {
                let loaded = self
                    .parent_of(id)
                    .and_then(|parent| self.entry(parent))
                    .is_some_and(|parent| parent.loaded);
                Some(if loaded { EMPTY_LABEL } else { LOADING_LABEL })
            }
        }
    }

    pub fn parent(&self, row: RowHandle) -> Option<RowHandle> {
        let id = self.resolve(row)?;
        self.parent_of(id).map(|parent| self.handle(parent))
    }

    /// Number of children of `row`, or of the top level for `None`.
    pub fn children_count(&self, row: Option<RowHandle>) -> usize {
        self.row_level(row).map_or(0, |level| level.rows.len())
    }

    pub fn nth_child(&self, row: Option<RowHandle>, n: usize) -> Option<RowHandle> {
        let id = *self.row_level(row)?.rows.at(n)?;
        Some(self.handle(id))
    }

    pub fn has_child(&self, row: RowHandle) -> bool {
        self.children_count(Some(row)) > 0
    }

    pub fn is_directory_open(&self, row: RowHandle) -> bool {
        self.directory_handle(row).is_some()
    }

    /// Watch handle of an open directory row.
    pub fn directory_handle(&self, row: RowHandle) -> Option<DirectoryHandle> {
        self.entry(self.resolve(row)?)?.children.as_ref()?.handle
    }

    /// Row of the open directory fed by `directory`.
    pub fn directory_row(&self, directory: DirectoryHandle) -> Option<RowHandle> {
        self.directories
            .get(&directory)
            .map(|&id| self.handle(id))
    }

    /// Open directory handles, in ascending order.
    pub fn open_directories(&self) -> Vec<DirectoryHandle> {
        let mut handles: Vec<DirectoryHandle> = self.directories.keys().copied().collect();
        handles.sort();
        handles
    }

    /// O(1) lookup of `file` within one level.
    pub fn position_for_file(&self, file: FileId, directory: DirectoryHandle) -> Option<RowHandle> {
        let parent = self.resolve_directory(directory)?;
        let id = self.level(parent)?.lookup(file)?;
        Some(self.handle(id))
    }

    /// Every row showing `file`: the top level first, then open directories
    /// in handle order. Levels are independent, so one file can appear more
    /// than once.
    pub fn positions_for_file(&self, file: FileId) -> Vec<RowHandle> {
        std::iter::once(DirectoryHandle::ROOT)
            .chain(self.open_directories())
            .filter_map(|directory| self.position_for_file(file, directory))
            .collect()
    }

    pub fn first_position_for_file(&self, file: FileId) -> Option<RowHandle> {
        self.positions_for_file(file).into_iter().next()
    }

    /// Rows in display order, descending only into open directories.
    pub fn flatten(&self) -> Vec<FlatRow> {
        let mut rows = Vec::new();
        self.flatten_level(None, &TreePath::new(), &mut rows);
        rows
    }

    fn flatten_level(&self, parent: Option<EntryId>, path: &TreePath, out: &mut Vec<FlatRow>) {
        let Some(level) = self.level(parent) else {
            return;
        };
        for (index, (_, &id)) in level.rows.iter().enumerate() {
            let child_path = path.child(index);
            out.push(FlatRow {
                depth: path.depth(),
                path: child_path.clone(),
                row: self.handle(id),
            });
            let open = self
                .entry(id)
                .and_then(|entry| entry.children.as_ref())
                .is_some_and(|level| level.handle.is_some());
            if open {
                self.flatten_level(Some(id), &child_path, out);
            }
        }
    }

    // ── Internals ───────────────────────────────────────────────────────────

    fn emit(&mut self, change: RowChange) {
        log::trace!("gen {}: {:?}", self.generation, change);
        if let Some(adapter) = self.adapter.as_mut() {
            adapter.notify(&Notification {
                stamp: self.generation,
                change,
            });
        }
    }

    fn emit_for(&mut self, id: EntryId, change: impl FnOnce(TreePath) -> RowChange) {
        if let Some(path) = self.entry_path(id) {
            self.emit(change(path));
        }
    }

    fn handle(&self, id: EntryId) -> RowHandle {
        RowHandle {
            stamp: self.generation,
            entry: id,
        }
    }

    fn resolve(&self, row: RowHandle) -> Option<EntryId> {
        if row.stamp != self.generation {
            log::debug!(
                "rejecting stale row handle (stamp {}, generation {})",
                row.stamp,
                self.generation
            );
            return None;
        }
        self.entry(row.entry).map(|_| row.entry)
    }

    /// `Some(None)` is the top level, `Some(Some(id))` an open directory.
    fn resolve_directory(&self, directory: DirectoryHandle) -> Option<Option<EntryId>> {
        if directory.is_root() {
            return Some(None);
        }
        self.directories.get(&directory).map(|&id| Some(id))
    }

    fn entry(&self, id: EntryId) -> Option<&Entry> {
        self.arena
            .get(id)
            .filter(|node| !node.is_removed())
            .map(|node| node.get())
    }

    fn entry_mut(&mut self, id: EntryId) -> Option<&mut Entry> {
        self.arena
            .get_mut(id)
            .filter(|node| !node.is_removed())
            .map(|node| node.get_mut())
    }

    fn parent_of(&self, id: EntryId) -> Option<EntryId> {
        self.arena.get(id)?.parent()
    }

    fn level(&self, parent: Option<EntryId>) -> Option<&Level> {
        match parent {
            None => Some(&self.top),
            Some(id) => self.entry(id)?.children.as_ref(),
        }
    }

    fn row_level(&self, row: Option<RowHandle>) -> Option<&Level> {
        match row {
            None => Some(&self.top),
            Some(row) => self.level(Some(self.resolve(row)?)),
        }
    }

    /// Run `f` on a level while the rest of the arena stays readable for
    /// comparisons. A subdirectory's level is moved out of its entry for the
    /// duration of the call.
    fn with_level<R>(
        &mut self,
        parent: Option<EntryId>,
        f: impl FnOnce(&mut Level, &Arena<Entry>, &SortSpec) -> R,
    ) -> Option<R> {
        match parent {
            None => Some(f(&mut self.top, &self.arena, &self.sort)),
            Some(id) => {
                let mut level = self.entry_mut(id)?.children.take()?;
                let out = f(&mut level, &self.arena, &self.sort);
                if let Some(entry) = self.entry_mut(id) {
                    entry.children = Some(level);
                }
                Some(out)
            }
        }
    }

    fn entry_position(&self, id: EntryId) -> Option<usize> {
        let cursor = self.entry(id)?.cursor?;
        self.level(self.parent_of(id))?.rows.position_of(cursor)
    }

    fn entry_path(&self, id: EntryId) -> Option<TreePath> {
        let mut indices = Vec::new();
        let mut current = Some(id);
        while let Some(node) = current {
            indices.push(self.entry_position(node)?);
            current = self.parent_of(node);
        }
        indices.reverse();
        Some(TreePath::from(indices))
    }

    /// The placeholder of a level holding nothing else.
    fn sole_placeholder(&self, parent: Option<EntryId>) -> Option<EntryId> {
        let level = self.level(parent)?;
        if level.rows.len() != 1 {
            return None;
        }
        let first = level.first()?;
        self.entry(first)?.is_placeholder().then_some(first)
    }

    /// Allocate `entry` and insert it at its sorted position in `parent`'s
    /// level.
    fn link_entry(&mut self, parent: Option<EntryId>, entry: Entry) -> Option<EntryId> {
        let file_id = entry.file_id();
        let id = self.arena.new_node(entry);
        if let Some(parent) = parent {
            parent.append(id, &mut self.arena);
        }
        let cursor = self.with_level(parent, |level, arena, sort| {
            let cursor = level
                .rows
                .insert_sorted(id, |a, b| compare_ids(arena, *a, *b, sort));
            if let Some(file) = file_id {
                level.reverse.insert(file, id);
            }
            cursor
        });
        match cursor {
            Some(cursor) => {
                if let Some(entry) = self.entry_mut(id) {
                    entry.cursor = Some(cursor);
                }
                Some(id)
            }
            None => {
                id.remove(&mut self.arena);
                None
            }
        }
    }

    /// Give a directory row a placeholder child so it shows an expander.
    fn make_expandable(&mut self, id: EntryId) {
        let Some(entry) = self.entry_mut(id) else {
            return;
        };
        if entry.children.is_none() {
            entry.children = Some(Level::default());
        }
        if let Some(placeholder) = self.link_entry(Some(id), Entry::placeholder()) {
            self.emit_for(placeholder, |path| RowChange::RowInserted { path });
            self.emit_for(id, |path| RowChange::RowHasChildToggled { path });
        }
    }

    /// Close `id` if it is an open directory and tell the view to stop
    /// watching it.
    fn forget_directory(&mut self, id: EntryId) {
        let Some(level) = self.entry_mut(id).and_then(|entry| entry.children.as_mut()) else {
            return;
        };
        let Some(handle) = level.handle.take() else {
            return;
        };
        level.reverse.clear();
        self.directories.remove(&handle);
        self.emit(RowChange::SubdirectoryUnloaded { directory: handle });
    }

    /// Remove a row after its whole subtree, deepest rows first. With
    /// `refill_parent`, a directory losing its last real child gets its
    /// placeholder back.
    fn remove_entry(&mut self, id: EntryId, refill_parent: bool) {
        while let Some(child) = self.level(Some(id)).and_then(Level::first) {
            self.remove_entry(child, false);
        }
        self.forget_directory(id);

        let Some(entry) = self.entry(id) else {
            return;
        };
        let file_id = entry.file_id();
        let cursor = entry.cursor;
        let path = self.entry_path(id);
        let parent = self.parent_of(id);
        self.with_level(parent, |level, _, _| {
            if let Some(cursor) = cursor {
                level.rows.remove(cursor);
            }
            if let Some(file) = file_id {
                level.reverse.remove(&file);
            }
        });
        id.remove(&mut self.arena);
        self.generation += 1;
        if let Some(path) = path {
            self.emit(RowChange::RowDeleted { path });
        }

        if refill_parent && file_id.is_some() {
            if let Some(parent) = parent {
                if self.level(Some(parent)).is_some_and(|level| level.rows.is_empty()) {
                    self.make_expandable(parent);
                }
            }
        }
    }

    fn unload_entry(&mut self, id: EntryId) -> bool {
        if self
            .level(Some(id))
            .and_then(|level| level.handle)
            .is_none()
        {
            let name = self.entry(id).and_then(|e| e.file.as_ref()).map(|f| f.name.as_str());
            log::warn!("cannot unload {:?}: it was never opened", name);
            return false;
        }
        let Some(entry) = self.entry_mut(id) else {
            return false;
        };
        let was_loaded = std::mem::replace(&mut entry.loaded, false);
        let kept_placeholder = self.sole_placeholder(Some(id));

        while let Some(child) = self
            .level(Some(id))
            .and_then(Level::first)
            .filter(|&child| self.entry(child).is_some_and(|e| !e.is_placeholder()))
        {
            self.remove_entry(child, true);
        }
        if was_loaded {
            if let Some(placeholder) = kept_placeholder {
                // "(Empty)" reads "Loading…" again.
                self.emit_for(placeholder, |path| RowChange::RowChanged { path });
            }
        }
        self.forget_directory(id);
        true
    }

    /// A directory became a regular file: drop its child level entirely.
    fn drop_children(&mut self, id: EntryId) {
        self.forget_directory(id);
        while let Some(child) = self.level(Some(id)).and_then(Level::first) {
            self.remove_entry(child, false);
        }
        if let Some(entry) = self.entry_mut(id) {
            entry.children = None;
            entry.loaded = false;
        }
        self.emit_for(id, |path| RowChange::RowHasChildToggled { path });
    }

    fn resort_level(&mut self, parent: Option<EntryId>, path: TreePath) {
        let nested: Vec<(usize, EntryId)> = match self.level(parent) {
            Some(level) => level
                .rows
                .iter()
                .enumerate()
                .filter(|(_, (_, id))| self.entry(**id).is_some_and(|e| e.children.is_some()))
                .map(|(index, (_, id))| (index, *id))
                .collect(),
            None => return,
        };
        for (index, child) in nested {
            self.resort_level(Some(child), path.child(index));
        }
        let new_order = self
            .with_level(parent, |level, arena, sort| {
                (level.rows.len() > 1)
                    .then(|| level.rows.resort(|a, b| compare_ids(arena, *a, *b, sort)))
            })
            .flatten();
        if let Some(new_order) = new_order {
            self.emit(RowChange::RowsReordered {
                parent: path,
                new_order,
            });
        }
    }

    /// Assert every structural invariant. Test support only.
    #[cfg(test)]
    pub(crate) fn check_invariants(&self) {
        self.check_level(None, &TreePath::new());
        for (&handle, &id) in &self.directories {
            let level = self.level(Some(id)).expect("open directory has a level");
            assert_eq!(level.handle, Some(handle), "directory map out of sync");
        }
    }

    #[cfg(test)]
    fn check_level(&self, parent: Option<EntryId>, path: &TreePath) {
        let level = self.level(parent).expect("level exists");
        level.rows.check_structure();
        let mut real = 0;
        let mut previous: Option<EntryId> = None;
        for (index, (cursor, &id)) in level.rows.iter().enumerate() {
            let entry = self.entry(id).expect("live entry");
            assert_eq!(entry.cursor, Some(cursor), "entry cursor out of sync");
            assert_eq!(self.parent_of(id), parent, "parent link out of sync");
            let child_path = path.child(index);
            assert_eq!(self.entry_path(id).as_ref(), Some(&child_path));
            assert_eq!(self.row_at(&child_path), Some(self.handle(id)));
            match entry.file_id() {
                Some(file) => {
                    real += 1;
                    assert_eq!(level.lookup(file), Some(id), "reverse map out of sync");
                }
                None => {
                    assert!(parent.is_some(), "placeholder at top level");
                    assert_eq!(level.rows.len(), 1, "placeholder next to real rows");
                }
            }
            if let Some(prev) = previous {
                assert_ne!(
                    compare_ids(&self.arena, prev, id, &self.sort),
                    Ordering::Greater,
                    "siblings out of order"
                );
            }
            previous = Some(id);
            if entry.children.is_some() {
                self.check_level(Some(id), &child_path);
            }
        }
        assert_eq!(level.reverse.len(), real, "reverse map has extra entries");
    }
}

fn compare_ids(arena: &Arena<Entry>, a: EntryId, b: EntryId, sort: &SortSpec) -> Ordering {
    let file = |id: EntryId| arena.get(id).and_then(|node| node.get().file.as_ref());
    sort.compare(file(a), file(b))
}

/// Permutation for one row moving from `from` to `to`, in
/// `new_order[new_index] == old_index` form.
fn single_move_order(len: usize, from: usize, to: usize) -> Vec<usize> {
    let mut order = Vec::with_capacity(len);
    let mut old = 0;
    for index in 0..len {
        if index == to {
            order.push(from);
        } else {
            if old == from {
                old += 1;
            }
            order.push(old);
            old += 1;
        }
    }
    order
}

#[cfg(test)]
mod tests {
    use super::single_move_order;

    #[test]
    fn single_move_forward() {
        assert_eq!(single_move_order(3, 1, 2), vec![0, 2, 1]);
        assert_eq!(single_move_order(4, 0, 3), vec![1, 2, 3, 0]);
    }

    #[test]
    fn single_move_backward() {
        assert_eq!(single_move_order(3, 2, 0), vec![2, 0, 1]);
    }

    #[test]
    fn single_move_in_place_is_identity() {
        assert_eq!(single_move_order(3, 1, 1), vec![0, 1, 2]);
    }
}
