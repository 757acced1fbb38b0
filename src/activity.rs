use crate::abi::TxHash;
use chrono::{
    DateTime,
    Utc,
};
use std::collections::VecDeque;

pub const ACTIVITY_LOG_CAPACITY: usize = 50;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogEntry {
    pub text: String,
    pub tx_hash: Option<TxHash>,
    pub at: DateTime<Utc>,
}

impl LogEntry {
    pub fn new(text: impl Into<String>, tx_hash: Option<TxHash>) -> Self {
        Self {
            text: text.into(),
            tx_hash,
            at: Utc::now(),
        }
    }

    pub fn explorer_link(&self, explorer_base: &str) -> Option<String> {
        self.tx_hash
            .map(|hash| crate::format::explorer_tx_url(explorer_base, &hash))
    }
}

/// Newest-first record of user actions. Overflow silently evicts the oldest.
#[derive(Clone, Debug)]
pub struct ActivityLog {
    entries: VecDeque<LogEntry>,
    capacity: usize,
}

impl Default for ActivityLog {
    fn default() -> Self {
        Self::with_capacity(ACTIVITY_LOG_CAPACITY)
    }
}

impl ActivityLog {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, entry: LogEntry) {
        if self.capacity == 0 {
            return;
        }
        self.entries.push_front(entry);
        self.entries.truncate(self.capacity);
    }

    pub fn record(&mut self, text: impl Into<String>, tx_hash: Option<TxHash>) {
        self.push(LogEntry::new(text, tx_hash));
    }

    pub fn iter(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    pub fn latest(&self) -> Option<&LogEntry> {
        self.entries.front()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
