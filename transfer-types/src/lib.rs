//! Identifiers, paths and value types shared across the transfer-access device I/O stack.
//!
//! This crate holds no I/O logic; it is the common vocabulary that `transfer-core`'s accessors,
//! decorators and backends are built from.

mod access_mode;
mod data_type;
mod error;
mod id;
mod path;
mod version;

pub use access_mode::AccessModeFlags;
pub use data_type::{DataType, UserType};
pub use error::Error;
pub use id::TransferElementId;
pub use path::RegisterPath;
pub use version::VersionNumber;

/// Convenience alias used throughout the transfer-access stack.
pub type Result<T> = std::result::Result<T, Error>;
