//! Payload patches and shard partitioning.

pub mod patch;
pub mod shard;
