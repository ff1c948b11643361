//! Duplex session wire protocol.
//!
//! Tagged JSON both ways; binary WebSocket frames carry raw audio and are
//! each announced by a preceding `audio` marker message so the client can
//! associate payload with sequence and encoding.

use crate::provider::tts::AudioEncoding;
use crate::store::Evaluation;
use serde::{Deserialize, Serialize};

/// Messages the client sends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// The candidate's utterance for one dialogue turn.
    Text { data: String },
    /// Finish the interview and request the evaluation.
    End,
    /// Liveness probe; answered with `status: "pong"`.
    Ping,
}

/// Why an incoming frame could not become a [`ClientMessage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    /// Not valid JSON at all.
    Invalid,
    /// Valid JSON, but not a known message type.
    UnknownType,
}

impl ParseError {
    /// The error text sent back to the client.
    pub fn as_reply(&self) -> &'static str {
        match self {
            ParseError::Invalid => "invalid message",
            ParseError::UnknownType => "unknown message type",
        }
    }
}

impl ClientMessage {
    /// Parse an incoming text frame.
    ///
    /// Distinguishes malformed JSON from well-formed JSON with an unknown
    /// `type`, because the two produce different error replies and neither
    /// closes the connection.
    pub fn parse(raw: &str) -> std::result::Result<Self, ParseError> {
        let value: serde_json::Value =
            serde_json::from_str(raw).map_err(|_| ParseError::Invalid)?;
        serde_json::from_value(value).map_err(|_| ParseError::UnknownType)
    }

    pub fn to_json(&self) -> crate::error::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// `status` payload: either a plain note or a structured ack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StatusPayload {
    Note(String),
    UserMessage { user_message_id: i64 },
}

/// Announces the binary frame that follows it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AudioMarker {
    pub seq: u64,
    pub encoding: AudioEncoding,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationPayload {
    pub overall_score: i32,
    pub summary: String,
}

/// Messages the server sends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Status { data: StatusPayload },
    TextStart,
    TextDelta { data: String },
    TextEnd { data: String },
    Audio { data: AudioMarker },
    Evaluation { data: EvaluationPayload },
    Error { data: String },
}

impl ServerMessage {
    pub fn status(note: impl Into<String>) -> Self {
        ServerMessage::Status {
            data: StatusPayload::Note(note.into()),
        }
    }

    pub fn user_message_ack(user_message_id: i64) -> Self {
        ServerMessage::Status {
            data: StatusPayload::UserMessage { user_message_id },
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error {
            data: message.into(),
        }
    }

    pub fn evaluation(evaluation: &Evaluation) -> Self {
        ServerMessage::Evaluation {
            data: EvaluationPayload {
                overall_score: evaluation.overall_score,
                summary: evaluation.summary.clone(),
            },
        }
    }

    pub fn to_json(&self) -> crate::error::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
