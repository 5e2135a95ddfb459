use std::collections::VecDeque;

use chrono::Local;

pub const MAX_DIAGNOSTICS: usize = 20;

/// Bounded log of timestamped diagnostic messages, oldest dropped first.
#[derive(Debug, Default, Clone)]
pub struct DiagnosticLog {
    entries: VecDeque<String>,
}

impl DiagnosticLog {
    pub fn new() -> Self {
        DiagnosticLog {
            entries: VecDeque::with_capacity(MAX_DIAGNOSTICS),
        }
    }

    pub fn push(&mut self, message: &str) {
        if self.entries.len() == MAX_DIAGNOSTICS {
            self.entries.pop_front();
        }
        let stamp = Local::now().format("%Y-%m-%d %H:%M:%S");
        self.entries.push_back(format!("[{}] {}", stamp, message));
    }

    pub fn clear(&mut self) {
        self.entries.clear()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.entries.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_only_the_newest_entries() {
        let mut log = DiagnosticLog::new();
        for i in 0..(MAX_DIAGNOSTICS + 5) {
            log.push(&format!("message {}", i));
        }
        assert_eq!(log.len(), MAX_DIAGNOSTICS);
        let first = log.iter().next().unwrap();
        assert!(first.ends_with("message 5"), "{}", first);
        let last = log.iter().last().unwrap();
        assert!(last.ends_with(&format!("message {}", MAX_DIAGNOSTICS + 4)));
    }

    #[test]
    fn entries_are_timestamped() {
        let mut log = DiagnosticLog::new();
        log.push("hello");
        let entry = log.iter().next().unwrap();
        assert!(entry.starts_with('['));
        assert!(entry.ends_with("] hello"));
    }

    #[test]
    fn clear_empties_the_log() {
        let mut log = DiagnosticLog::new();
        log.push("a");
        log.clear();
        assert!(log.is_empty());
    }
}
