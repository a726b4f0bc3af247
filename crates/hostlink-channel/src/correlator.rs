use std::collections::hash_map::Entry;
use std::collections::HashMap;

use hostlink_wire::{InboundEnvelope, ReportedError, RequestId};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};

use crate::error::{ChannelError, Result};

const FIRST_REQUEST_ID: RequestId = 1;

/// Completion side of an outstanding request.
pub(crate) enum PendingCall {
    /// Settles on the first response.
    Single(oneshot::Sender<Result<Vec<Value>>>),
    /// Receives every partial response; settles on the final one.
    Streaming(mpsc::UnboundedSender<Result<Vec<Value>>>),
}

/// Assigns request ids and matches responses back to their callers.
///
/// Each pending call settles exactly once: it is removed from the map the
/// moment its final response (or error) is delivered, so a duplicate response
/// finds nothing to settle.
pub struct Correlator {
    next_id: RequestId,
    pending: HashMap<RequestId, PendingCall>,
}

impl Correlator {
    pub fn new() -> Self {
        Self {
            next_id: FIRST_REQUEST_ID,
            pending: HashMap::new(),
        }
    }

    /// Allocate the next request id. Ids strictly increase and are never reused.
    pub fn allocate(&mut self) -> RequestId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// The id the next call will receive.
    pub fn peek_next_id(&self) -> RequestId {
        self.next_id
    }

    pub(crate) fn insert(&mut self, id: RequestId, call: PendingCall) {
        if self.pending.insert(id, call).is_some() {
            tracing::error!(id, "pending call replaced; request ids must never be reused");
        }
    }

    /// True if `id` has an outstanding call.
    pub fn is_pending(&self, id: RequestId) -> bool {
        self.pending.contains_key(&id)
    }

    /// Number of outstanding calls.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Deliver an inbound response to its pending call.
    ///
    /// Returns false if no call is pending for the envelope's id.
    pub(crate) fn settle(&mut self, envelope: InboundEnvelope) -> bool {
        let Some(id) = envelope.id else {
            return false;
        };
        let Entry::Occupied(entry) = self.pending.entry(id) else {
            return false;
        };

        let partial = envelope.is_partial_response;
        let outcome = match envelope.reported_error() {
            Some(ReportedError::Host(err)) => Err(ChannelError::Host(err)),
            Some(ReportedError::Malformed(raw)) => {
                Err(ChannelError::Internal(format!("malformed host error: {raw}")))
            }
            None => Ok(envelope.args),
        };

        let keep_open = partial && outcome.is_ok() && matches!(entry.get(), PendingCall::Streaming(_));
        if keep_open {
            let delivered = match entry.get() {
                PendingCall::Streaming(tx) => tx.send(outcome).is_ok(),
                PendingCall::Single(_) => true,
            };
            if !delivered {
                tracing::debug!(id, "stream receiver gone; releasing pending call");
                entry.remove();
            }
            return true;
        }

        match entry.remove() {
            PendingCall::Single(tx) => {
                if tx.send(outcome).is_err() {
                    tracing::debug!(id, "caller no longer awaiting response");
                }
            }
            PendingCall::Streaming(tx) => {
                let _ = tx.send(outcome);
            }
        }
        true
    }

    /// Remove a pending call without settling it.
    pub(crate) fn release(&mut self, id: RequestId) -> bool {
        self.pending.remove(&id).is_some()
    }

    /// Reject every outstanding call with [`ChannelError::ChannelClosed`] and
    /// reset the id counter. Returns the number of rejected calls.
    pub(crate) fn close_all(&mut self) -> usize {
        let count = self.pending.len();
        for (_, call) in self.pending.drain() {
            match call {
                PendingCall::Single(tx) => {
                    let _ = tx.send(Err(ChannelError::ChannelClosed));
                }
                PendingCall::Streaming(tx) => {
                    let _ = tx.send(Err(ChannelError::ChannelClosed));
                }
            }
        }
        self.next_id = FIRST_REQUEST_ID;
        count
    }
}

impl Default for Correlator {
    fn default() -> Self {
        Self::new()
    }
}
