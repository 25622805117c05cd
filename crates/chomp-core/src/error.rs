//! Error types for persisted-data parsing.
//!
//! Malformed save data fails loudly at load time with a [`FormatError`];
//! the caller decides whether to fall back to a fresh game state or abort.
//! Programming errors (missing speed-table entries, dead-end steering) are
//! not represented here -- they panic, because they indicate an incomplete
//! state-machine or table definition rather than bad user data.

/// A malformed field in persisted data.
#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    #[error("unknown event name: {0:?}")]
    UnknownEvent(String),
    #[error("unparsable delay: {0:?}")]
    InvalidDelay(String),
    #[error("unknown {field} name: {value:?}")]
    UnknownName {
        field: &'static str,
        value: String,
    },
    #[error("malformed point: {0:?}")]
    InvalidPoint(String),
    #[error("malformed {field}: {value:?}")]
    InvalidNumber {
        field: &'static str,
        value: String,
    },
    #[error("missing field: {0}")]
    MissingField(&'static str),
}
