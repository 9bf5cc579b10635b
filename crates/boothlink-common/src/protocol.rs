//! Relay wire protocol shared by the Hub and every endpoint.
//!
//! Every frame is a JSON object with a string `type`. The Hub only ever
//! looks at `type`, `sessionId` and, for `register`, `role`; every other
//! field is opaque body that travels verbatim.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::ProtocolError;
use crate::id::SessionId;

/// Well-known envelope `type` values.
pub mod kinds {
    pub const REGISTER: &str = "register";
    pub const REGISTERED: &str = "registered";
    pub const PEER_JOINED: &str = "peer-joined";
    pub const PEER_LEFT: &str = "peer-left";

    // Application kinds used by the booth endpoints. The Hub relays these
    // without looking at them.
    pub const PHOTO: &str = "photo";
    pub const CONTROL_FULLSCREEN: &str = "control-fullscreen";
    pub const CONTROL_SESSION_DONE: &str = "control-session-done";
    pub const START_SESSION: &str = "start-session";
    pub const END_SESSION: &str = "end-session";
    pub const LOG: &str = "log";
}

/// Role an endpoint declares when it registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The capture device (phone with the camera).
    Control,
    /// The presentation device. Older pages announce themselves as `pc`.
    #[serde(alias = "pc")]
    Hub,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Control => "control",
            Role::Hub => "hub",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "control" => Ok(Role::Control),
            "hub" | "pc" => Ok(Role::Hub),
            other => Err(ProtocolError::InvalidRegistration(format!(
                "unknown role `{other}`"
            ))),
        }
    }
}

/// One relay message: a `type`, an optional routing `sessionId`, and an
/// opaque body holding every other field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: String,

    #[serde(rename = "sessionId", default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,

    #[serde(flatten)]
    pub body: Map<String, Value>,
}

impl Envelope {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            session_id: None,
            body: Map::new(),
        }
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let _ = self.body.insert(key.into(), value.into());
        self
    }

    /// The routing key, ignoring empty strings.
    pub fn session(&self) -> Option<&str> {
        self.session_id.as_deref().filter(|s| !s.is_empty())
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        self.body.get(key)
    }

    /// Parse a text frame, classifying why it is malformed if it is.
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| ProtocolError::InvalidJson(e.to_string()))?;
        let Value::Object(ref object) = value else {
            return Err(ProtocolError::NotAnObject);
        };
        if !matches!(object.get("type"), Some(Value::String(_))) {
            return Err(ProtocolError::MissingType);
        }
        serde_json::from_value(value).map_err(|e| ProtocolError::InvalidJson(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(|e| ProtocolError::Encode(e.to_string()))
    }
}

/// Body of a `register` envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterRequest {
    pub role: Role,
    /// `None` asks the Hub to generate a session identifier.
    pub session_id: Option<SessionId>,
}

impl RegisterRequest {
    pub fn new(role: Role, session_id: Option<SessionId>) -> Self {
        Self { role, session_id }
    }

    pub fn from_envelope(envelope: &Envelope) -> Result<Self, ProtocolError> {
        let role = envelope
            .field("role")
            .and_then(Value::as_str)
            .ok_or_else(|| ProtocolError::InvalidRegistration("missing role".into()))?
            .parse()?;
        Ok(Self {
            role,
            session_id: SessionId::from_client(envelope.session_id.as_deref()),
        })
    }

    pub fn to_envelope(&self) -> Envelope {
        let envelope = Envelope::new(kinds::REGISTER).with_field("role", self.role.as_str());
        match &self.session_id {
            Some(sid) => envelope.with_session(sid.as_str()),
            None => envelope,
        }
    }
}

/// Frames the Hub itself originates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum HubMessage {
    /// Registration confirmation, sent only to the registering connection.
    #[serde(rename_all = "camelCase")]
    Registered {
        connection_id: String,
        session_id: String,
    },

    #[serde(rename_all = "camelCase")]
    PeerJoined {
        connection_id: String,
        session_id: String,
        role: Role,
    },

    #[serde(rename_all = "camelCase")]
    PeerLeft {
        connection_id: String,
        session_id: String,
        role: Role,
    },
}

impl HubMessage {
    pub fn to_json(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(|e| ProtocolError::Encode(e.to_string()))
    }
}

/// A frame as seen by an endpoint.
#[derive(Debug, Clone, PartialEq)]
pub enum Incoming {
    Hub(HubMessage),
    App(Envelope),
}

impl Incoming {
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let envelope = Envelope::parse(text)?;
        match envelope.kind.as_str() {
            kinds::REGISTERED | kinds::PEER_JOINED | kinds::PEER_LEFT => {
                serde_json::from_str(text)
                    .map(Incoming::Hub)
                    .map_err(|e| ProtocolError::InvalidJson(e.to_string()))
            }
            _ => Ok(Incoming::App(envelope)),
        }
    }
}
