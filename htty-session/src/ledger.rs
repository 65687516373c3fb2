//! Append-only record of output observed during a session.

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, PoisonError};

/// One `output` event as received from the controller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Position in the ledger (monotonically increasing from 0)
    pub seq: u64,
    /// Raw terminal output, escape sequences included
    pub text: String,
    pub received_at: DateTime<Utc>,
}

/// Output ledger shared between the stdout reader (sole writer) and readers.
#[derive(Debug, Default)]
pub struct OutputLedger {
    entries: Mutex<Vec<LedgerEntry>>,
}

impl OutputLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append output, returning its sequence number
    pub fn append(&self, text: impl Into<String>) -> u64 {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let seq = entries.len() as u64;
        entries.push(LedgerEntry {
            seq,
            text: text.into(),
            received_at: Utc::now(),
        });
        seq
    }

    /// Copy of every entry so far
    pub fn entries(&self) -> Vec<LedgerEntry> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// All output concatenated in arrival order
    pub fn text(&self) -> String {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|e| e.text.as_str())
            .collect()
    }

    /// Has `regex` ever matched the accumulated output?
    pub fn contains_match(&self, regex: &Regex) -> bool {
        regex.is_match(&self.text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_assigns_sequence_numbers() {
        let ledger = OutputLedger::new();
        assert!(ledger.entries().is_empty());

        assert_eq!(ledger.append("hel"), 0);
        assert_eq!(ledger.append("lo\r\n"), 1);

        let entries = ledger.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].seq, 1);
        assert!(entries[0].received_at <= entries[1].received_at);
    }

    #[test]
    fn test_retrospective_match_spans_entries() {
        let ledger = OutputLedger::new();
        ledger.append("hel");
        ledger.append("lo world");

        assert_eq!(ledger.text(), "hello world");
        assert!(ledger.contains_match(&Regex::new("hello").unwrap()));
        assert!(!ledger.contains_match(&Regex::new("goodbye").unwrap()));
    }
}
