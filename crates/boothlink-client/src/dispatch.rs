//! Type-keyed envelope dispatch for endpoint applications.

use std::collections::HashMap;

use boothlink_common::Envelope;

/// Handler invoked with every envelope of one `type`.
pub type Handler = Box<dyn Fn(&Envelope) + Send + Sync>;

/// Registry mapping envelope types to handlers. Types with no handler are
/// ignored, so peers may send kinds this endpoint does not know yet.
pub struct Dispatcher {
    handlers: HashMap<String, Handler>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register a handler for `kind`, replacing any earlier one.
    pub fn register<F>(&mut self, kind: &str, handler: F) -> &mut Self
    where
        F: Fn(&Envelope) + Send + Sync + 'static,
    {
        let _ = self.handlers.insert(kind.to_owned(), Box::new(handler));
        self
    }

    /// Run the handler for `envelope.kind`. Returns whether one ran.
    pub fn dispatch(&self, envelope: &Envelope) -> bool {
        let Some(handler) = self.handlers.get(&envelope.kind) else {
            tracing::trace!(kind = %envelope.kind, "No handler for envelope type");
            return false;
        };
        handler(envelope);
        true
    }

    pub fn has_handler(&self, kind: &str) -> bool {
        self.handlers.contains_key(kind)
    }

    /// Registered types, sorted.
    pub fn kinds(&self) -> Vec<String> {
        let mut kinds: Vec<String> = self.handlers.keys().cloned().collect();
        kinds.sort();
        kinds
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}
