//! Delivery of completed messages: synchronous callback or queue push.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::input::{Diagnostic, Shared};
use crate::message::MidiMessage;
use crate::queue::QueueProducer;

/// Handler invoked on the transport thread with `(delta_seconds, bytes)`.
pub type MidiCallback = Box<dyn FnMut(f64, &[u8]) + Send>;

/// Registration point shared between the consumer-side handle (which sets
/// and clears the handler) and the producer-side sink (which invokes it).
/// The sink detaches the handler while it runs, so the lock is never held
/// across user code and a handler may register its own replacement.
#[derive(Default)]
pub(crate) struct CallbackSlot {
    handler: Mutex<Option<MidiCallback>>,
}

impl CallbackSlot {
    pub fn set(&self, callback: MidiCallback) -> bool {
        let mut slot = self.handler.lock();
        if slot.is_some() {
            return false;
        }
        *slot = Some(callback);
        true
    }

    pub fn clear(&self) -> bool {
        self.handler.lock().take().is_some()
    }

    pub fn is_set(&self) -> bool {
        self.handler.lock().is_some()
    }
}

/// Per-connection delivery mode, fixed when the connection opens.
///
/// Exactly one of callback or queue is ever active: a connection opened with
/// queue capacity 0 is callback-only, anything else is poll-only.
pub(crate) enum DispatchSink {
    /// Handler runs to completion on the transport thread before the next
    /// fragment is processed; a slow handler throttles input by design.
    Callback(Arc<CallbackSlot>),
    Queue(QueueProducer),
}

impl DispatchSink {
    pub fn deliver(&mut self, message: MidiMessage, shared: &Shared) {
        match self {
            DispatchSink::Callback(slot) => {
                // Take the handler out for the invocation; the slot stays
                // unlocked while user code runs. If the handler registered a
                // replacement meanwhile, the replacement wins.
                let taken = slot.handler.lock().take();
                match taken {
                    Some(mut callback) => {
                        callback(message.delta, &message.bytes);
                        let mut guard = slot.handler.lock();
                        if guard.is_none() {
                            *guard = Some(callback);
                        }
                    }
                    None => {
                        // Callback-only connection with nothing registered yet.
                        tracing::trace!("no callback registered, message dropped");
                        shared.record_drop();
                    }
                }
            }
            DispatchSink::Queue(producer) => {
                if !producer.push(message) {
                    let dropped = shared.record_drop();
                    tracing::warn!(dropped, "input queue full, message dropped");
                    shared.send_diagnostic(Diagnostic::QueueOverflow { dropped });
                }
            }
        }
    }
}
