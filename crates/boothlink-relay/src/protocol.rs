//! Classification of inbound text frames.

use boothlink_common::protocol::kinds;
use boothlink_common::{Envelope, ProtocolError, RegisterRequest, SessionId};

/// What the Hub should do with one inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// Bind the sending connection to a session.
    Register(RegisterRequest),
    /// Forward the frame, unchanged, to the rest of `session`.
    Relay { kind: String, session: Option<SessionId> },
}

/// Parse a text frame. Anything that is not a JSON object with a string
/// `type`, or a `register` without a known role, is an error.
pub fn classify(text: &str) -> Result<Inbound, ProtocolError> {
    let envelope = Envelope::parse(text)?;
    if envelope.kind == kinds::REGISTER {
        return RegisterRequest::from_envelope(&envelope).map(Inbound::Register);
    }
    let session = envelope.session().map(SessionId::from);
    Ok(Inbound::Relay {
        kind: envelope.kind,
        session,
    })
}
