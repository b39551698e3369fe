//! Fan-out of host calls to renderer controllers.

pub mod bounds;
pub mod dispatcher;
