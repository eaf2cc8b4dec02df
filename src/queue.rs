//! Fixed-capacity SPSC queue carrying completed messages from the transport
//! thread to the polling consumer.

use ringbuf::{traits::*, HeapCons, HeapProd, HeapRb};

use crate::message::MidiMessage;

/// Producer half -- owned by the dispatch sink on the transport thread.
pub(crate) struct QueueProducer {
    producer: HeapProd<MidiMessage>,
}

impl QueueProducer {
    /// Returns `false` when the queue is at capacity; the message is dropped,
    /// never overwritten over older entries. Non-blocking.
    #[inline]
    pub fn push(&mut self, message: MidiMessage) -> bool {
        self.producer.try_push(message).is_ok()
    }
}

/// Consumer half -- owned by the polling side of the connection.
pub(crate) struct QueueConsumer {
    consumer: HeapCons<MidiMessage>,
}

impl QueueConsumer {
    /// Non-blocking pop; `None` on empty, never waits.
    #[inline]
    pub fn pop(&mut self) -> Option<MidiMessage> {
        self.consumer.try_pop()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.consumer.occupied_len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.consumer.is_empty()
    }
}

/// Capacity must be non-zero; capacity 0 means "queuing disabled" and is
/// handled at connection-open by not constructing a queue at all.
pub(crate) fn input_queue(capacity: usize) -> (QueueProducer, QueueConsumer) {
    debug_assert!(capacity > 0, "capacity 0 disables queuing");
    let rb = HeapRb::new(capacity);
    let (producer, consumer) = rb.split();
    (QueueProducer { producer }, QueueConsumer { consumer })
}
