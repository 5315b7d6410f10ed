//! Feed message types.

use serde::{Deserialize, Serialize};
use sigdash_core::SignalsUpdate;

use crate::error::{WsError, WsResult};

/// A frame pushed by the backend on `/ws/signals`.
///
/// Frames are tagged by `type`; unrecognised types map to `Unknown` so a
/// newer backend does not break older dashboards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeedMessage {
    SignalsUpdate(SignalsUpdate),
    #[serde(other)]
    Unknown,
}

impl FeedMessage {
    pub fn parse(text: &str) -> WsResult<Self> {
        serde_json::from_str(text).map_err(|e| WsError::ParseError(e.to_string()))
    }
}
