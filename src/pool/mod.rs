//! Self-scaling pool of proxied backends and its sizing policy.

pub mod balancer;
pub mod orchestrated;
