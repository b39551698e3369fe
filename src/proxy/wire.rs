//! JSON frames exchanged between an [`ExecutionProxy`](crate::proxy::client::ExecutionProxy)
//! and a worker host.

use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::foundation::error::{FleetError, FleetResult};
use crate::foundation::geometry::{Size, Viewport};
use crate::payload::patch::Patch;
use crate::render::renderer::{PickingOptions, PickingResult};
use crate::schedule::scheduler::SchedulerOptions;
use crate::schedule::stats::RenderingStats;

/// Construction message body.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRenderer {
    pub renderer_type: String,
    #[serde(default)]
    pub params: Value,
    #[serde(default)]
    pub scheduler: SchedulerOptions,
}

/// Host → backend.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "messageType", rename_all = "camelCase")]
pub enum ProxyRequest {
    CreateRenderer { data: CreateRenderer },
    Render { data: Value },
    RenderPatches { data: Vec<Patch> },
    SetSize { data: Size },
    SetViewport { data: Viewport },
    SetVisibility { data: bool },
    PickObjects { id: u64, data: PickingOptions },
    Dispose { id: u64 },
}

impl ProxyRequest {
    pub fn message_type(&self) -> &'static str {
        match self {
            Self::CreateRenderer { .. } => "createRenderer",
            Self::Render { .. } => "render",
            Self::RenderPatches { .. } => "renderPatches",
            Self::SetSize { .. } => "setSize",
            Self::SetViewport { .. } => "setViewport",
            Self::SetVisibility { .. } => "setVisibility",
            Self::PickObjects { .. } => "pickObjects",
            Self::Dispose { .. } => "dispose",
        }
    }
}

/// Backend → host.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "messageType", rename_all = "camelCase")]
pub enum ProxyReply {
    RenderingStats {
        data: RenderingStats,
    },
    PickObjects {
        id: u64,
        result: Resolution<Vec<PickingResult>>,
    },
    Dispose {
        id: u64,
        result: Resolution<()>,
    },
}

/// Outcome of a correlated request as carried on the wire.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "resolution", rename_all = "camelCase")]
pub enum Resolution<T> {
    Fulfilled { value: T },
    Rejected { error: String },
}

impl<T> Resolution<T> {
    pub fn into_result(self) -> FleetResult<T> {
        match self {
            Self::Fulfilled { value } => Ok(value),
            Self::Rejected { error } => Err(FleetError::rejected(error)),
        }
    }
}

impl<T> From<FleetResult<T>> for Resolution<T> {
    fn from(result: FleetResult<T>) -> Self {
        match result {
            Ok(value) => Self::Fulfilled { value },
            Err(err) => Self::Rejected {
                error: err.to_string(),
            },
        }
    }
}

pub fn encode<T: Serialize>(message: &T) -> FleetResult<String> {
    Ok(serde_json::to_string(message)?)
}

/// Decode a frame; anything that does not match the schema is a protocol error.
pub fn decode<T: DeserializeOwned>(frame: &str) -> FleetResult<T> {
    serde_json::from_str(frame)
        .map_err(|err| FleetError::protocol(format!("unrecognized message: {err}")))
}

/// Abort the current execution context after a message it cannot handle.
pub fn unhandled_variant(side: &str, err: &FleetError) -> ! {
    tracing::error!(side, error = %err, "unhandled message variant");
    panic!("{side}: unhandled message variant: {err}");
}

#[cfg(test)]
#[path = "../../tests/unit/proxy/wire.rs"]
mod tests;
