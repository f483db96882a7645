//! Backend-agnostic transfer subsystem for register-oriented device access.
//!
//! A [`Backend`](backend::Backend) exposes raw addressable registers; [`NDRegisterAccessor`]
//! wraps one (or several, merged) raw registers behind a typed, buffered, two-dimensional
//! accessor; decorators in [`decorators`] recombine accessors into logical views; [`TransferGroup`]
//! coordinates several accessors into one ordered, merged transfer; and the futures in
//! [`future`] let a caller wait on whichever of several pending reads completes first.

pub mod accessor;
pub mod backend;
pub mod converter;
pub mod decorators;
pub mod device;
pub mod element;
pub mod error;
pub mod future;
pub mod group;
pub mod map;
pub mod raw;
pub mod value;

pub use accessor::{NDRegisterAccessor, OneDRegisterAccessor, ScalarRegisterAccessor};
pub use converter::FixedPointConverter;
pub use device::Device;
pub use element::{TransferElement, TransferElementCore, TransferState};
pub use error::{Error, Result};
pub use future::{read_any, TransferFuture};
pub use group::TransferGroup;
pub use value::UserValue;

pub use transfer_types::{AccessModeFlags, DataType, RegisterPath, TransferElementId, UserType, VersionNumber};
