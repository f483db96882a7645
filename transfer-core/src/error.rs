//! Re-export of the shared error vocabulary, plus the crate-local `Result` alias.

pub use transfer_types::Error;

/// Convenience alias used throughout `transfer-core`.
pub type Result<T> = std::result::Result<T, Error>;
