use std::collections::HashMap;
use std::sync::{Arc, Weak};

use serde_json::Value;

/// Callback invoked with the arguments of a push event.
pub type PushHandler = Arc<dyn Fn(Vec<Value>) + Send + Sync>;

/// Non-owning identity of a registered [`PushHandler`].
pub type WeakPushHandler = Weak<dyn Fn(Vec<Value>) + Send + Sync>;

/// Event name → callback map for unsolicited host notifications.
///
/// One handler per name: registering again replaces the previous handler.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, PushHandler>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `event`. Returns true if a previous handler was replaced.
    pub fn register(&mut self, event: impl Into<String>, handler: PushHandler) -> bool {
        self.handlers.insert(event.into(), handler).is_some()
    }

    /// Remove the handler for `event`. Idempotent; returns true if one was removed.
    pub fn unregister(&mut self, event: &str) -> bool {
        self.handlers.remove(event).is_some()
    }

    /// Remove the handler for `event` only if it is still `handler`.
    ///
    /// Lets the owner of an old registration give it up without disturbing a
    /// newer handler registered under the same name.
    pub fn unregister_if_current(&mut self, event: &str, handler: &WeakPushHandler) -> bool {
        match self.handlers.get(event) {
            Some(current) if std::ptr::addr_eq(Arc::as_ptr(current), handler.as_ptr()) => {
                self.handlers.remove(event).is_some()
            }
            _ => false,
        }
    }

    /// Look up the handler for `event` by exact name.
    pub fn get(&self, event: &str) -> Option<PushHandler> {
        self.handlers.get(event).cloned()
    }

    pub fn contains(&self, event: &str) -> bool {
        self.handlers.contains_key(event)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Registered event names, sorted.
    pub fn events(&self) -> Vec<String> {
        let mut events: Vec<_> = self.handlers.keys().cloned().collect();
        events.sort();
        events
    }

    /// Remove every handler. Returns how many were removed.
    pub fn clear(&mut self) -> usize {
        let count = self.handlers.len();
        self.handlers.clear();
        count
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("events", &self.events())
            .finish()
    }
}
