//! User-visible notifications.
//!
//! Some client operations report failures to the user instead of returning
//! them. The front end decides how a notification is shown by supplying a
//! [`Notifier`].

use std::sync::{Arc, Mutex};

use tracing::warn;

/// Sink for messages the user should see.
pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str);
}

/// Emits notifications as log events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, message: &str) {
        warn!(target: "notify", "{message}");
    }
}

/// Collects notifications in memory.
///
/// Clones share the same buffer, so one handle can be given to the client
/// while another reads the messages back.
#[derive(Debug, Default, Clone)]
pub struct MemoryNotifier {
    messages: Arc<Mutex<Vec<String>>>,
}

impl MemoryNotifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages received so far, oldest first.
    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        self.messages
            .lock()
            .map(|m| m.clone())
            .unwrap_or_default()
    }
}

impl Notifier for MemoryNotifier {
    fn notify(&self, message: &str) {
        if let Ok(mut messages) = self.messages.lock() {
            messages.push(message.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_notifier_shares_buffer() {
        let notifier = MemoryNotifier::new();
        let handle = notifier.clone();

        notifier.notify("first");
        handle.notify("second");

        assert_eq!(notifier.messages(), vec!["first", "second"]);
    }
}
