//! Driver-level diagnostics
//!
//! Resource creation never aborts a frame. Failures are pushed here (and to
//! the `log` facade) and the caller receives [`INVALID_HANDLE`]. Entries are
//! retrieved newest first.
//!
//! [`INVALID_HANDLE`]: crate::render::backend::INVALID_HANDLE

use std::fmt;

/// One recorded failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorEntry {
    /// What went wrong, usually the driver info log
    pub message: String,
    /// Operation that failed
    pub function: String,
    /// Source line of the failing call site
    pub line: u32,
}

impl fmt::Display for ErrorEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (in {} at line {})", self.message, self.function, self.line)
    }
}

/// Stack of driver diagnostics
#[derive(Debug, Default)]
pub struct ErrorLog {
    entries: Vec<ErrorEntry>,
}

impl ErrorLog {
    /// Create an empty log
    pub const fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// Record a failure
    pub fn add_error(&mut self, message: impl Into<String>, function: impl Into<String>, line: u32) {
        let entry = ErrorEntry {
            message: message.into(),
            function: function.into(),
            line,
        };
        log::error!("{entry}");
        self.entries.push(entry);
    }

    /// Remove and return the most recent failure
    pub fn get_error(&mut self) -> Option<ErrorEntry> {
        self.entries.pop()
    }

    /// Most recent failure, left in the log
    pub fn peek(&self) -> Option<&ErrorEntry> {
        self.entries.last()
    }

    /// Number of pending entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no entries are pending
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_newest_error_first() {
        let mut log = ErrorLog::new();
        log.add_error("first", "create_program", 10);
        log.add_error("second", "compile_shader", 20);

        assert_eq!(log.len(), 2);
        assert_eq!(log.get_error().map(|e| e.message), Some("second".to_owned()));
        assert_eq!(log.get_error().map(|e| e.function), Some("create_program".to_owned()));
        assert_eq!(log.get_error(), None);
        assert!(log.is_empty());
    }

    #[test]
    fn test_peek_keeps_entry() {
        let mut log = ErrorLog::new();
        assert!(log.peek().is_none());
        log.add_error("link failed", "create_program", 42);

        assert_eq!(log.peek().map(|e| e.line), Some(42));
        assert_eq!(log.len(), 1);
        assert_eq!(log.get_error().map(|e| e.message), Some("link failed".to_owned()));
    }
}
