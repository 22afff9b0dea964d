use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProtocolError;

/// The protocol version this crate speaks. Carried on every `initialize`
/// exchange; a mismatch is reported there rather than at the frame layer.
pub const PROTOCOL_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvelopeType {
    Request,
    Response,
    Notification,
}

impl EnvelopeType {
    pub fn as_str(self) -> &'static str {
        match self {
            EnvelopeType::Request => "request",
            EnvelopeType::Response => "response",
            EnvelopeType::Notification => "notification",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Command {
    Initialize,
    Format,
    Ping,
    Shutdown,
    Log,
    Error,
}

impl Command {
    pub fn as_str(self) -> &'static str {
        match self {
            Command::Initialize => "initialize",
            Command::Format => "format",
            Command::Ping => "ping",
            Command::Shutdown => "shutdown",
            Command::Log => "log",
            Command::Error => "error",
        }
    }

    /// Whether this command may appear as a `notification` rather than a
    /// `request`/`response` pair.
    pub fn is_notification_only(self) -> bool {
        matches!(self, Command::Log | Command::Error)
    }

    pub fn parse(raw: &str) -> Option<Command> {
        match raw {
            "initialize" => Some(Command::Initialize),
            "format" => Some(Command::Format),
            "ping" => Some(Command::Ping),
            "shutdown" => Some(Command::Shutdown),
            "log" => Some(Command::Log),
            "error" => Some(Command::Error),
            _ => None,
        }
    }
}

/// The unit of transport: every frame body decodes to one `Envelope`.
///
/// `payload` is left as a raw `Value` here; callers downcast it with
/// [`crate::payload`] types keyed on `(envelope_type, command)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub version: u32,
    #[serde(rename = "type")]
    pub envelope_type: EnvelopeType,
    #[serde(rename = "requestId", skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub command: Command,
    pub payload: Value,
}

impl Envelope {
    pub fn request(request_id: impl Into<String>, command: Command, payload: Value) -> Self {
        Envelope {
            version: PROTOCOL_VERSION,
            envelope_type: EnvelopeType::Request,
            request_id: Some(request_id.into()),
            command,
            payload,
        }
    }

    pub fn response(request_id: impl Into<String>, command: Command, payload: Value) -> Self {
        Envelope {
            version: PROTOCOL_VERSION,
            envelope_type: EnvelopeType::Response,
            request_id: Some(request_id.into()),
            command,
            payload,
        }
    }

    pub fn notification(command: Command, payload: Value) -> Self {
        Envelope {
            version: PROTOCOL_VERSION,
            envelope_type: EnvelopeType::Notification,
            request_id: None,
            command,
            payload,
        }
    }

    /// Enforces the type/requestId/command shape invariants from the data
    /// model: requests and responses must carry a `requestId`, notifications
    /// must not. A request may never use a notification-only command
    /// (`log`/`error`); a response may, since the host reports a decode-level
    /// failure as an `error`-tagged response tied to the offending
    /// `requestId`.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        match self.envelope_type {
            EnvelopeType::Request | EnvelopeType::Response => {
                if self.request_id.is_none() {
                    return Err(ProtocolError::MissingField("requestId"));
                }
            }
            EnvelopeType::Notification => {
                if self.request_id.is_some() {
                    return Err(ProtocolError::InvalidMessage {
                        envelope_type: self.envelope_type.as_str(),
                        command: self.command.as_str().to_string(),
                    });
                }
            }
        }

        let notification_only = self.command.is_notification_only();
        match self.envelope_type {
            EnvelopeType::Notification if !notification_only => {
                return Err(ProtocolError::InvalidMessage {
                    envelope_type: self.envelope_type.as_str(),
                    command: self.command.as_str().to_string(),
                })
            }
            EnvelopeType::Request if notification_only => {
                return Err(ProtocolError::InvalidMessage {
                    envelope_type: self.envelope_type.as_str(),
                    command: self.command.as_str().to_string(),
                })
            }
            _ => {}
        }

        Ok(())
    }
}
