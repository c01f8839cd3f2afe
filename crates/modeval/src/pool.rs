//! The mode pool: driver- and monitor-feasible candidates that requests are resolved against.

use crate::mode::DisplayMode;
use crate::status::ModeStatus;

/// Whether a pool entry has already been taken during the current run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    #[default]
    Unconsidered,
    /// Consumed by the request at this index of the run's request list.
    ConsideredBy(usize),
}

impl Marker {
    pub fn is_considered(self) -> bool {
        matches!(self, Marker::ConsideredBy(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PoolEntry {
    pub mode: DisplayMode,
    pub marker: Marker,
}

impl PoolEntry {
    /// Whether a request may still consume this entry.
    pub fn is_available(&self) -> bool {
        self.mode.status.is_ok() && !self.marker.is_considered()
    }
}

/// Arena of pool entries, in the order the available modes were given.
///
/// The pool is built once per [`crate::Screen`] and kept across runs; [`ModePool::reset`]
/// clears per-run state.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ModePool {
    entries: Vec<PoolEntry>,
}

impl ModePool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a copy of `mode` with status OK and no marker.
    pub fn push(&mut self, mut mode: DisplayMode) {
        mode.status = ModeStatus::Ok;
        self.entries.push(PoolEntry {
            mode,
            marker: Marker::Unconsidered,
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[PoolEntry] {
        &self.entries
    }

    pub fn entries_mut(&mut self) -> &mut [PoolEntry] {
        &mut self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &DisplayMode> {
        self.entries.iter().map(|entry| &entry.mode)
    }

    /// Marks entry `index` as consumed by request `request`.
    pub fn mark(&mut self, index: usize, request: usize) {
        if let Some(entry) = self.entries.get_mut(index) {
            entry.marker = Marker::ConsideredBy(request);
        }
    }

    /// Clears markers and statuses left over from a previous run.
    pub fn reset(&mut self) {
        for entry in &mut self.entries {
            entry.marker = Marker::Unconsidered;
            entry.mode.status = ModeStatus::Ok;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool() -> ModePool {
        let mut pool = ModePool::new();
        let mut rejected =
            DisplayMode::new("640x480", 25175, (640, 656, 752, 800), (480, 490, 492, 525));
        rejected.status = ModeStatus::HSync;
        pool.push(rejected);
        pool.push(DisplayMode::new(
            "800x600",
            40000,
            (800, 840, 968, 1056),
            (600, 601, 605, 628),
        ));
        pool
    }

    #[test]
    fn push_resets_status() {
        let pool = pool();
        assert_eq!(pool.len(), 2);
        assert!(pool.iter().all(|mode| mode.status.is_ok()));
    }

    #[test]
    fn marked_entries_are_unavailable() {
        let mut pool = pool();
        pool.mark(1, 0);
        assert_eq!(pool.entries()[1].marker, Marker::ConsideredBy(0));
        assert!(!pool.entries()[1].is_available());

        pool.entries_mut()[0].mode.status = ModeStatus::NoClock;
        assert!(!pool.entries()[0].is_available());

        pool.reset();
        assert!(pool.entries().iter().all(PoolEntry::is_available));
    }

    #[test]
    fn mark_out_of_range_is_ignored() {
        let mut pool = pool();
        pool.mark(7, 0);
        assert!(pool.entries().iter().all(PoolEntry::is_available));
    }
}
