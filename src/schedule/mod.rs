//! Render scheduling and frame-time statistics.

pub mod frame;
pub mod scheduler;
pub mod stats;
