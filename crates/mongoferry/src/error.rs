//! Error types for mongoferry.
//!
//! Fatal errors (`Connection`, `Analysis`) abort a run before any data is
//! copied. `CreateIndex` and `Insert` are recorded into the migration stats and
//! the run continues.

use thiserror::Error;

/// Result type alias for mongoferry operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while analyzing or migrating deployments.
///
/// Error codes follow the pattern `MF-XXX`.
#[derive(Error, Debug)]
pub enum Error {
    /// A deployment could not be reached or did not answer a ping (MF-001).
    #[error("[MF-001] Connection error ({side}): {message}")]
    Connection {
        /// Which leg failed (`source` or `target`).
        side: String,
        /// Driver message.
        message: String,
    },

    /// Listing databases/collections or reading stats failed (MF-002).
    #[error("[MF-002] Analysis error: {0}")]
    Analysis(String),

    /// An index could not be created on the target (MF-003).
    #[error("[MF-003] Failed to create index '{index}' on {namespace}: {message}")]
    CreateIndex {
        /// Target namespace.
        namespace: String,
        /// Index name.
        index: String,
        /// Driver message.
        message: String,
    },

    /// A batch write failed, fully or partially (MF-004).
    #[error("[MF-004] Insert into {namespace} failed: {message}")]
    Insert {
        /// Target namespace.
        namespace: String,
        /// Documents the server reports as persisted, when known.
        inserted: Option<u64>,
        /// Driver message.
        message: String,
    },

    /// Unexpected failure while copying (MF-005).
    #[error("[MF-005] Migration error: {0}")]
    Migration(String),

    /// Configuration error (MF-006).
    #[error("[MF-006] Configuration error: {0}")]
    Config(String),

    /// Invalid configuration value (MF-007).
    #[error("[MF-007] Invalid value for '{key}': {message}")]
    InvalidValue {
        /// Configuration key that failed validation.
        key: String,
        /// Validation error message.
        message: String,
    },

    /// Error reported by the MongoDB driver (MF-008).
    #[error("[MF-008] Database error: {0}")]
    Driver(#[from] mongodb::error::Error),

    /// IO error (MF-009).
    #[error("[MF-009] IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error (MF-010).
    #[error("[MF-010] Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Returns the error code (e.g., "MF-001").
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Connection { .. } => "MF-001",
            Self::Analysis(_) => "MF-002",
            Self::CreateIndex { .. } => "MF-003",
            Self::Insert { .. } => "MF-004",
            Self::Migration(_) => "MF-005",
            Self::Config(_) => "MF-006",
            Self::InvalidValue { .. } => "MF-007",
            Self::Driver(_) => "MF-008",
            Self::Io(_) => "MF-009",
            Self::Serialization(_) => "MF-010",
        }
    }

    /// Returns true for errors that end a run before any data is copied.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. } | Self::Analysis(_) | Self::Config(_) | Self::InvalidValue { .. }
        )
    }

    pub(crate) fn connection(side: &str, message: impl Into<String>) -> Self {
        Self::Connection {
            side: side.to_string(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_are_unique() {
        let errors = [
            Error::connection("source", "x"),
            Error::Analysis("x".into()),
            Error::CreateIndex {
                namespace: "a.b".into(),
                index: "i".into(),
                message: "x".into(),
            },
            Error::Insert {
                namespace: "a.b".into(),
                inserted: None,
                message: "x".into(),
            },
            Error::Migration("x".into()),
            Error::Config("x".into()),
            Error::InvalidValue {
                key: "k".into(),
                message: "x".into(),
            },
            Error::Io(std::io::Error::other("x")),
        ];
        let mut codes: Vec<_> = errors.iter().map(Error::code).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn test_connection_error_names_side() {
        let err = Error::connection("target", "ping failed");
        assert_eq!(
            err.to_string(),
            "[MF-001] Connection error (target): ping failed"
        );
        assert!(err.is_fatal());
    }

    #[test]
    fn test_insert_error_is_not_fatal() {
        let err = Error::Insert {
            namespace: "shop.orders".into(),
            inserted: Some(97),
            message: "E11000 duplicate key".into(),
        };
        assert!(!err.is_fatal());
        assert!(err.to_string().contains("shop.orders"));
    }
}
