use std::time::{Duration, Instant};

use crate::foundation::error::{FleetError, FleetResult};
use crate::proxy::pending::Correlated;
use crate::render::renderer::PickingResult;

/// Pending result of a `pick_objects` call.
///
/// Waiting is blocking; dropping an unsettled future cancels its outstanding request.
pub struct PickFuture {
    state: PickState,
}

enum PickState {
    Ready(FleetResult<Vec<PickingResult>>),
    Remote {
        request: Correlated,
        timeout: Option<Duration>,
    },
    All(Vec<PickFuture>),
}

impl PickFuture {
    /// Already-resolved future.
    pub fn ready(results: Vec<PickingResult>) -> Self {
        Self {
            state: PickState::Ready(Ok(results)),
        }
    }

    /// Already-rejected future.
    pub fn rejected(err: FleetError) -> Self {
        Self {
            state: PickState::Ready(Err(err)),
        }
    }

    /// Concatenate `parts` in order; the first rejection rejects the whole.
    pub fn all(parts: Vec<PickFuture>) -> Self {
        Self {
            state: PickState::All(parts),
        }
    }

    pub(crate) fn remote(request: Correlated, timeout: Option<Duration>) -> Self {
        Self {
            state: PickState::Remote { request, timeout },
        }
    }

    /// Block until the result is available.
    pub fn wait(self) -> FleetResult<Vec<PickingResult>> {
        self.wait_until(None)
    }

    /// Block for at most `timeout`.
    pub fn wait_timeout(self, timeout: Duration) -> FleetResult<Vec<PickingResult>> {
        self.wait_until(Some(Instant::now() + timeout))
    }

    pub(crate) fn wait_until(self, deadline: Option<Instant>) -> FleetResult<Vec<PickingResult>> {
        match self.state {
            PickState::Ready(result) => result,
            PickState::Remote { request, timeout } => {
                let deadline = deadline.or_else(|| timeout.map(|t| Instant::now() + t));
                match request.wait_until(deadline)? {
                    serde_json::Value::Array(items) => Ok(items),
                    other => Err(FleetError::protocol(format!(
                        "pick response is not an array: {other}"
                    ))),
                }
            }
            PickState::All(parts) => {
                let mut out = Vec::new();
                for part in parts {
                    out.extend(part.wait_until(deadline)?);
                }
                Ok(out)
            }
        }
    }
}

impl std::fmt::Debug for PickFuture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.state {
            PickState::Ready(r) => f.debug_tuple("Ready").field(r).finish(),
            PickState::Remote { request, .. } => {
                f.debug_tuple("Remote").field(&request.id()).finish()
            }
            PickState::All(parts) => f.debug_tuple("All").field(&parts.len()).finish(),
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/pick.rs"]
mod tests;
