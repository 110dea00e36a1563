//! Bounded history of applied state changes.
//!
//! Every successful add/set/remove on the current scope records the
//! resulting flags together with the parameter used, so the controller can
//! revert to an earlier composite state.

use chrono::{DateTime, Utc};
use std::collections::VecDeque;

/// Default capacity of the history stack.
pub const DEFAULT_MAX_STACK_SIZE: usize = 10;

/// Record of one applied change.
#[derive(Clone, Debug)]
pub struct HistoryEntry<P> {
    /// Active flags after the change
    pub flags: u32,
    /// Parameter the change was applied with
    pub parameter: Option<P>,
    /// When the change was recorded
    pub timestamp: DateTime<Utc>,
}

/// Bounded stack of applied changes, newest last.
///
/// When full, pushing evicts the oldest entry.
///
/// # Example
///
/// ```rust
/// use flagstate::core::StateHistory;
///
/// let mut history: StateHistory<()> = StateHistory::new(2);
/// history.push(1, None);
/// history.push(2, None);
/// history.push(4, None);
///
/// assert_eq!(history.len(), 2);
/// assert_eq!(history.pop_different(4).map(|e| e.flags), Some(2));
/// ```
#[derive(Clone, Debug)]
pub struct StateHistory<P> {
    entries: VecDeque<HistoryEntry<P>>,
    max_size: usize,
}

impl<P> Default for StateHistory<P> {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_STACK_SIZE)
    }
}

impl<P> StateHistory<P> {
    pub fn new(max_size: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            max_size,
        }
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Change the capacity, evicting the oldest entries that no longer fit.
    pub fn set_max_size(&mut self, max_size: usize) {
        self.max_size = max_size;
        while self.entries.len() > max_size {
            self.entries.pop_front();
        }
    }

    /// Record a change. A zero capacity records nothing.
    pub fn push(&mut self, flags: u32, parameter: Option<P>) {
        if self.max_size == 0 {
            return;
        }
        if self.entries.len() == self.max_size {
            self.entries.pop_front();
        }
        self.entries.push_back(HistoryEntry {
            flags,
            parameter,
            timestamp: Utc::now(),
        });
    }

    /// Pop entries until one whose flags differ from `current` is found.
    ///
    /// Entries equal to `current` are discarded on the way.
    pub fn pop_different(&mut self, current: u32) -> Option<HistoryEntry<P>> {
        while let Some(entry) = self.entries.pop_back() {
            if entry.flags != current {
                return Some(entry);
            }
        }
        None
    }

    /// Put a popped entry back on top, keeping its original timestamp.
    pub fn restore(&mut self, entry: HistoryEntry<P>) {
        if self.max_size == 0 {
            return;
        }
        if self.entries.len() == self.max_size {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    pub fn entries(&self) -> impl Iterator<Item = &HistoryEntry<P>> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_history_is_empty() {
        let history: StateHistory<String> = StateHistory::default();
        assert!(history.is_empty());
        assert_eq!(history.max_size(), DEFAULT_MAX_STACK_SIZE);
    }

    #[test]
    fn push_keeps_parameter() {
        let mut history = StateHistory::new(3);
        history.push(1, Some("eat".to_string()));

        let entry = history.entries().next().unwrap();
        assert_eq!(entry.flags, 1);
        assert_eq!(entry.parameter.as_deref(), Some("eat"));
    }

    #[test]
    fn full_history_evicts_oldest() {
        let mut history: StateHistory<()> = StateHistory::new(2);
        history.push(1, None);
        history.push(2, None);
        history.push(4, None);

        let flags: Vec<u32> = history.entries().map(|e| e.flags).collect();
        assert_eq!(flags, vec![2, 4]);
    }

    #[test]
    fn pop_different_skips_duplicates_of_current() {
        let mut history: StateHistory<()> = StateHistory::new(5);
        history.push(1, None);
        history.push(3, None);
        history.push(3, None);

        let entry = history.pop_different(3).unwrap();
        assert_eq!(entry.flags, 1);
        assert!(history.is_empty());
        assert!(history.pop_different(3).is_none());
    }

    #[test]
    fn restore_puts_entry_back_on_top() {
        let mut history = StateHistory::new(3);
        history.push(1, Some("eat".to_string()));
        history.push(2, None);

        let entry = history.pop_different(2).unwrap();
        let stamp = entry.timestamp;
        history.restore(entry);

        assert_eq!(history.len(), 1);
        let top = history.pop_different(0).unwrap();
        assert_eq!(top.flags, 1);
        assert_eq!(top.parameter.as_deref(), Some("eat"));
        assert_eq!(top.timestamp, stamp);
    }

    #[test]
    fn shrinking_capacity_trims_oldest() {
        let mut history: StateHistory<()> = StateHistory::new(4);
        for flags in [1, 2, 4, 8] {
            history.push(flags, None);
        }
        history.set_max_size(2);
        let flags: Vec<u32> = history.entries().map(|e| e.flags).collect();
        assert_eq!(flags, vec![4, 8]);
    }

    #[test]
    fn zero_capacity_records_nothing() {
        let mut history: StateHistory<()> = StateHistory::new(0);
        history.push(1, None);
        assert!(history.is_empty());
    }

    #[test]
    fn timestamps_are_ordered() {
        let mut history: StateHistory<()> = StateHistory::new(3);
        history.push(1, None);
        history.push(2, None);
        let stamps: Vec<_> = history.entries().map(|e| e.timestamp).collect();
        assert!(stamps[0] <= stamps[1]);
    }
}
