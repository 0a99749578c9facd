//! Output delivery
//!
//! The network layer is outside this crate; the dispatcher pushes text to
//! sessions through a [`MessageSink`] and never learns how it is sent.

use mudcore_types::SessionId;
use parking_lot::Mutex;

/// Where text for a session goes
pub trait MessageSink: Send + Sync {
    fn send(&self, session: SessionId, text: &str);
}

/// Keeps everything sent, for tests and the sandbox
#[derive(Debug, Default)]
pub struct BufferedSink {
    messages: Mutex<Vec<(SessionId, String)>>,
}

impl BufferedSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove and return everything sent so far
    pub fn drain(&self) -> Vec<(SessionId, String)> {
        std::mem::take(&mut *self.messages.lock())
    }

    /// Text sent to `session`, oldest first
    pub fn sent_to(&self, session: SessionId) -> Vec<String> {
        self.messages
            .lock()
            .iter()
            .filter(|(s, _)| *s == session)
            .map(|(_, text)| text.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.messages.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.lock().is_empty()
    }
}

impl MessageSink for BufferedSink {
    fn send(&self, session: SessionId, text: &str) {
        self.messages.lock().push((session, text.to_string()));
    }
}

/// Drops everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl MessageSink for NullSink {
    fn send(&self, _session: SessionId, _text: &str) {}
}
