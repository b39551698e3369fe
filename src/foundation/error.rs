/// Convenience result type used across renderfleet.
pub type FleetResult<T> = Result<T, FleetError>;

/// Top-level error type for dispatching, proxying and pooling renderers.
#[derive(thiserror::Error, Debug)]
pub enum FleetError {
    /// A drawing surface or backend could not be constructed.
    #[error("construction error: {0}")]
    Construction(String),

    /// A message or backend type tag was not recognized by the receiving side.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A correlated request was rejected by the backend.
    #[error("operation rejected: {0}")]
    Rejected(String),

    /// The caller asked for an execution setup the host cannot provide.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A payload patch could not be applied.
    #[error("patch error: {0}")]
    Patch(String),

    /// Encoding or decoding a payload or message failed.
    #[error("serialization error: {0}")]
    Serde(String),

    /// A correlated request did not receive its response in time.
    #[error("request timed out: {0}")]
    Timeout(String),

    /// The other end of an execution channel went away.
    #[error("channel disconnected: {0}")]
    Disconnected(String),

    /// Wrapped external error.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl FleetError {
    /// Build a [`FleetError::Construction`] value.
    pub fn construction(msg: impl Into<String>) -> Self {
        Self::Construction(msg.into())
    }

    /// Build a [`FleetError::Protocol`] value.
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// Build a [`FleetError::Rejected`] value.
    pub fn rejected(msg: impl Into<String>) -> Self {
        Self::Rejected(msg.into())
    }

    /// Build a [`FleetError::Configuration`] value.
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Build a [`FleetError::Patch`] value.
    pub fn patch(msg: impl Into<String>) -> Self {
        Self::Patch(msg.into())
    }

    /// Build a [`FleetError::Serde`] value.
    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }

    /// Build a [`FleetError::Timeout`] value.
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    /// Build a [`FleetError::Disconnected`] value.
    pub fn disconnected(msg: impl Into<String>) -> Self {
        Self::Disconnected(msg.into())
    }
}

impl From<serde_json::Error> for FleetError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serde(err.to_string())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
