//! Error types for uservars
//!
//! Provides a unified error type for all store operations.

use thiserror::Error;

/// Result type alias using UserVarError
pub type Result<T> = std::result::Result<T, UserVarError>;

/// Unified error type for uservars operations
#[derive(Debug, Error)]
pub enum UserVarError {
    // -------------------------------------------------------------------------
    // Resource Errors
    // -------------------------------------------------------------------------
    /// An allocation for a key copy, value copy, or the index failed. The
    /// operation that hit it left the store exactly as it was.
    #[error("out of memory while allocating {what}")]
    OutOfMemory { what: &'static str },

    // -------------------------------------------------------------------------
    // Lookup Errors
    // -------------------------------------------------------------------------
    /// Raised by `delete` only when the store uses `MissingKeyPolicy::Error`.
    #[error("key not found")]
    KeyNotFound,

    // -------------------------------------------------------------------------
    // Session / Configuration Errors
    // -------------------------------------------------------------------------
    #[error("store is already initialized; configuration must precede the first set")]
    AlreadyInitialized,

    /// A mutating session entry point was called from inside
    /// `session::with_store`.
    #[error("session store is busy; it cannot be modified inside with_store")]
    SessionBusy,

    // -------------------------------------------------------------------------
    // Protocol Errors (shell)
    // -------------------------------------------------------------------------
    /// A shell line that does not parse: unknown verb, wrong argument count
    /// or a malformed escape.
    #[error("parse error: {0}")]
    Parse(String),

    // -------------------------------------------------------------------------
    // I/O Errors (shell)
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl UserVarError {
    pub(crate) fn oom(what: &'static str) -> Self {
        UserVarError::OutOfMemory { what }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_failed_allocation() {
        let e = UserVarError::oom("value copy");
        assert_eq!(e.to_string(), "out of memory while allocating value copy");
        assert_eq!(UserVarError::KeyNotFound.to_string(), "key not found");
    }

    #[test]
    fn shell_errors_read_as_parse_errors() {
        let parse = UserVarError::Parse("unknown command \"frob\"".into());
        assert_eq!(parse.to_string(), "parse error: unknown command \"frob\"");
        assert!(UserVarError::AlreadyInitialized.to_string().contains("configuration"));
    }

    #[test]
    fn io_errors_convert() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "gone");
        let e: UserVarError = io.into();
        assert!(matches!(e, UserVarError::Io(_)));
    }
}
