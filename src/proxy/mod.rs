//! Message protocol that lets a backend live in its own execution context.

pub mod channel;
pub mod client;
pub mod host;
pub mod pending;
pub mod wire;
