//! Bounded ring of system log lines.
//!
//! Every admitted line gets the next sequence number; the oldest line is
//! evicted once the ring is full. Lines are never edited after admission.
//!
//! A line is admitted at most once, whichever source delivers it first.
//! Lines are identified by their backend id, or by their full content when
//! they carry none. Identities are remembered a while past eviction so a
//! polled window overlapping evicted lines does not bring them back.

use std::collections::{HashSet, VecDeque};

use serde::Serialize;
use taskboard_core::log::LogEntry;
use taskboard_core::types::LogId;

pub const DEFAULT_LOG_CAPACITY: usize = 100;

/// Minimum number of line identities remembered. Covers the backend's
/// 50-line `/logs` window with room to spare.
const MIN_HISTORY: usize = 128;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SequencedLog {
    pub seq: u64,
    pub entry: LogEntry,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum LineKey {
    Id(LogId),
    Content(LogEntry),
}

impl LineKey {
    fn of(entry: &LogEntry) -> Self {
        match entry.id {
            Some(id) => LineKey::Id(id),
            None => LineKey::Content(entry.clone()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LogRing {
    capacity: usize,
    entries: VecDeque<SequencedLog>,
    next_seq: u64,
    history: usize,
    seen: HashSet<LineKey>,
    seen_order: VecDeque<LineKey>,
}

impl Default for LogRing {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_CAPACITY)
    }
}

impl LogRing {
    /// A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let history = capacity.saturating_mul(2).max(MIN_HISTORY);
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
            next_seq: 0,
            history,
            seen: HashSet::with_capacity(history),
            seen_order: VecDeque::with_capacity(history),
        }
    }

    /// Admit one line from the push channel. Returns its sequence number,
    /// or `None` when the line was already admitted.
    pub fn push(&mut self, entry: LogEntry) -> Option<u64> {
        if !self.remember(LineKey::of(&entry)) {
            return None;
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(SequencedLog { seq, entry });
        Some(seq)
    }

    /// Merge a polled window (oldest first). Only lines not admitted
    /// before are added, in window order. Lines older than the newest
    /// `capacity` of the window are ignored since they could not be held.
    /// Returns the number of lines admitted.
    pub fn sync_window(&mut self, window: Vec<LogEntry>) -> usize {
        let skip = window.len().saturating_sub(self.capacity);
        window
            .into_iter()
            .skip(skip)
            .filter_map(|entry| self.push(entry))
            .count()
    }

    /// Record `key`; `false` if it was already known.
    fn remember(&mut self, key: LineKey) -> bool {
        if self.seen.contains(&key) {
            return false;
        }
        if self.seen_order.len() == self.history {
            if let Some(oldest) = self.seen_order.pop_front() {
                self.seen.remove(&oldest);
            }
        }
        self.seen.insert(key.clone());
        self.seen_order.push_back(key);
        true
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &SequencedLog> {
        self.entries.iter()
    }

    pub fn to_vec(&self) -> Vec<SequencedLog> {
        self.entries.iter().cloned().collect()
    }
}
