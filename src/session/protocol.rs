//! Wire protocol: line-delimited JSON messages with a `type` tag.
//!
//! Messages are parsed once at the boundary into closed tagged enums;
//! everything past this module works with typed values. Unknown message
//! types and malformed JSON both surface as INVALID_MESSAGE.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::env::{Observation, StepInfo};
use crate::types::{PROTOCOL_VERSION, SERVER_NAME};

fn default_speed() -> f64 {
    1.0
}

/// Client -> server messages.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Hello {
        version: String,
    },
    Reset {
        seed: Option<u64>,
    },
    Step {
        /// Kept as a string so unknown actions map to INVALID_ACTION
        /// rather than INVALID_MESSAGE.
        action: String,
    },
    /// Reserved for streaming observations.
    Subscribe {
        stream: String,
    },
    AiPlay {
        agent_type: String,
        #[serde(default = "default_speed")]
        speed: f64,
        seed: Option<u64>,
        max_pieces: Option<u32>,
    },
    AiStop,
    CompareStart {
        agent1: String,
        agent2: String,
        #[serde(default = "default_speed")]
        speed: f64,
        max_pieces: u32,
        seed: Option<u64>,
    },
    CompareStop,
    CompareSetSpeed {
        speed: f64,
    },
}

/// Parse one inbound line. Any failure is a protocol-level
/// INVALID_MESSAGE; the session stays usable afterward.
pub fn parse_client_message(line: &str) -> Result<ClientMessage, String> {
    serde_json::from_str(line).map_err(|e| e.to_string())
}

/// Protocol error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidMessage,
    InvalidAction,
    GameNotInitialized,
    GameOver,
    VersionMismatch,
}

/// Per-side running totals reported alongside paired observations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EfficiencyStats {
    pub score: u32,
    pub lines: u32,
    pub pieces: u32,
    /// Points per cleared line; 0 when nothing cleared yet.
    pub points_per_line: f64,
    /// Average lines per clearing lock; 0 when nothing cleared yet.
    pub avg_lines_per_clear: f64,
}

/// One side of a comparison update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompareSide {
    pub agent: String,
    pub pieces: u32,
    pub done: bool,
    pub data: Observation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    /// "agent1", "agent2", or "tie" for the current score leader.
    pub leader: String,
    pub game1: EfficiencyStats,
    pub game2: EfficiencyStats,
}

/// Terminal summary for one comparison side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompareSummary {
    pub agent: String,
    pub score: u32,
    pub lines: u32,
    pub pieces: u32,
    pub topped_out: bool,
}

/// Server -> client messages.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Hello {
        version: String,
        server: String,
    },
    Obs {
        data: Observation,
        reward: f64,
        done: bool,
        info: StepInfo,
    },
    CompareObs {
        game1: CompareSide,
        game2: CompareSide,
        comparison: Comparison,
    },
    CompareComplete {
        winner: String,
        game1: CompareSummary,
        game2: CompareSummary,
    },
    Error {
        code: ErrorCode,
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        details: Option<Value>,
    },
}

impl ServerMessage {
    pub fn hello() -> Self {
        ServerMessage::Hello {
            version: PROTOCOL_VERSION.to_string(),
            server: SERVER_NAME.to_string(),
        }
    }

    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        ServerMessage::Error {
            code,
            message: message.into(),
            details: None,
        }
    }
}

/// Major versions must match; minor/patch drift is tolerated.
pub fn version_compatible(client_version: &str) -> bool {
    let major = |v: &str| v.split('.').next().map(str::to_owned);
    major(client_version) == major(PROTOCOL_VERSION)
}
