//! Deferred collapse: a collapsed directory stays loaded for a short grace
//! period so an immediate re-expand does not re-enumerate it.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use super::handle::DirectoryHandle;

/// Default grace period before a collapsed directory is unloaded.
pub const DEFAULT_COLLAPSE_DELAY_MS: u64 = 2000;

#[derive(Debug)]
pub struct DeferredUnload {
    delay: Duration,
    pending: HashMap<DirectoryHandle, Instant>,
}

impl Default for DeferredUnload {
    fn default() -> Self {
        Self::new(Duration::from_millis(DEFAULT_COLLAPSE_DELAY_MS))
    }
}

impl DeferredUnload {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: HashMap::new(),
        }
    }

    /// Schedule `directory` for unloading at `now + delay`. Rescheduling
    /// pushes the deadline back.
    pub fn schedule(&mut self, directory: DirectoryHandle, now: Instant) {
        self.pending.insert(directory, now + self.delay);
    }

    /// Drop a pending unload (the directory was expanded again).
    pub fn cancel(&mut self, directory: DirectoryHandle) -> bool {
        self.pending.remove(&directory).is_some()
    }

    pub fn is_pending(&self, directory: DirectoryHandle) -> bool {
        self.pending.contains_key(&directory)
    }

    /// Earliest deadline, for sleeping until the next unload is due.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().min().copied()
    }

    /// Remove and return every handle whose deadline passed. Callers must
    /// hand these to `ListModel::unload_directory`, which re-validates them.
    pub fn due(&mut self, now: Instant) -> Vec<DirectoryHandle> {
        let mut due: Vec<DirectoryHandle> = self
            .pending
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(handle, _)| *handle)
            .collect();
        due.sort();
        for handle in &due {
            self.pending.remove(handle);
        }
        due
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn due_only_after_delay() {
        let mut policy = DeferredUnload::new(Duration::from_secs(2));
        let start = Instant::now();
        policy.schedule(DirectoryHandle(1), start);
        assert!(policy.due(start + Duration::from_secs(1)).is_empty());
        assert_eq!(
            policy.due(start + Duration::from_secs(2)),
            vec![DirectoryHandle(1)]
        );
        assert!(!policy.is_pending(DirectoryHandle(1)));
    }

    #[test]
    fn cancel_prevents_unload() {
        let mut policy = DeferredUnload::default();
        let start = Instant::now();
        policy.schedule(DirectoryHandle(2), start);
        assert!(policy.cancel(DirectoryHandle(2)));
        assert!(!policy.cancel(DirectoryHandle(2)));
        assert!(policy.due(start + Duration::from_secs(10)).is_empty());
    }

    #[test]
    fn next_deadline_is_earliest() {
        let mut policy = DeferredUnload::new(Duration::from_millis(100));
        let start = Instant::now();
        policy.schedule(DirectoryHandle(1), start + Duration::from_millis(50));
        policy.schedule(DirectoryHandle(2), start);
        assert_eq!(
            policy.next_deadline(),
            Some(start + Duration::from_millis(100))
        );
        assert_eq!(policy.due(start + Duration::from_millis(120)), vec![DirectoryHandle(2)]);
    }
}
