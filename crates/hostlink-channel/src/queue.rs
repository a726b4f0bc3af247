use std::collections::VecDeque;

/// Holds outbound messages until the host handshake completes.
///
/// `NotReady -> Ready` is one-way. While not ready, [`submit`](Self::submit)
/// buffers; [`mark_ready`](Self::mark_ready) hands back the buffer in submission
/// order exactly once, after which every submission passes straight through.
#[derive(Debug)]
pub struct ReadinessQueue<T> {
    ready: bool,
    buffer: VecDeque<T>,
}

impl<T> ReadinessQueue<T> {
    pub fn new() -> Self {
        Self {
            ready: false,
            buffer: VecDeque::new(),
        }
    }

    /// Submit a message. Returns it back if it should be delivered now.
    pub fn submit(&mut self, message: T) -> Option<T> {
        if self.ready {
            return Some(message);
        }
        self.buffer.push_back(message);
        None
    }

    /// Transition to ready and drain the buffer in submission order.
    ///
    /// Calling this again is a no-op that returns nothing.
    pub fn mark_ready(&mut self) -> Vec<T> {
        self.ready = true;
        self.buffer.drain(..).collect()
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Number of buffered messages.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Discard buffered messages. Returns how many were dropped.
    pub fn clear(&mut self) -> usize {
        let dropped = self.buffer.len();
        self.buffer.clear();
        dropped
    }
}

impl<T> Default for ReadinessQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
