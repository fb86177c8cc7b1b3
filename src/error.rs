//! Error types for RecipeGate.
//!
//! Only infrastructure and programmer errors live here. A rejected admission
//! is *not* an error — it is carried as data in
//! [`crate::governor::Decision::Blocked`] so the hot path stays predictable
//! and allocation-free. Infrastructure errors are caught exactly once, at the
//! middleware boundary, where the fail-open policy applies.

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, GateError>;

/// All error conditions RecipeGate can surface.
#[derive(Debug, Error)]
pub enum GateError {
    /// The counter store is unreachable or refused the write.
    ///
    /// Triggers fail-open at the middleware boundary: the request proceeds
    /// unmetered rather than failing the whole request path.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Unrecognized call type or scope — a programmer error. Should not
    /// occur in production; if it does, the middleware fails open with a
    /// loud log.
    #[error("invalid call type or scope: {0}")]
    InvalidCallType(String),

    /// Configuration file could not be read or parsed.
    #[error("config error: {0}")]
    Config(String),
}

impl From<std::io::Error> for GateError {
    fn from(e: std::io::Error) -> Self {
        GateError::Persistence(e.to_string())
    }
}

impl From<serde_json::Error> for GateError {
    fn from(e: serde_json::Error) -> Self {
        GateError::Persistence(format!("serialization: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_persistence_error_display() {
        let err = GateError::Persistence("disk full".into());
        assert_eq!(err.to_string(), "persistence error: disk full");
    }

    #[test]
    fn test_io_error_converts_to_persistence() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: GateError = io.into();
        assert!(matches!(err, GateError::Persistence(_)));
    }

    #[test]
    fn test_invalid_call_type_display() {
        let err = GateError::InvalidCallType("webhook".into());
        assert!(err.to_string().contains("webhook"));
    }
}
