//! Decorators: accessors that wrap another accessor (or several) to add a capability — windowed
//! copying, asynchronous completion, write-then-poll handshaking, or logical-name redirection —
//! without the wrapped accessor knowing about it.

pub mod async_decorator;
pub mod copy;
pub mod handshaking;
pub mod logical_name;

pub use async_decorator::AsyncDecorator;
pub use copy::CopyRegisterDecorator;
pub use handshaking::HandshakingAccessor;
pub use logical_name::{IntConstantAccessor, IntVariableAccessor};
