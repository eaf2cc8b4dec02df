//! Input connection wiring: configuration, the producer-side driver, and the
//! consumer-side handle.
//!
//! Opening a connection yields two halves. The [`InputDriver`] moves into the
//! transport's thread (a driver callback or a dedicated polling thread) and is
//! fed raw fragments. The [`InputHandle`] stays with the application and
//! polls the queue or registers a callback. Only atomics and the SPSC queue
//! are shared between the halves; the assembler and clock are driver-private,
//! so independent connections never contend.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

use crossbeam_channel::{bounded, Receiver, Sender};
use serde::{Deserialize, Serialize};

use crate::assembler::MessageAssembler;
use crate::clock::{ClockNormalizer, TickUnit};
use crate::dispatch::{CallbackSlot, DispatchSink, MidiCallback};
use crate::error::{Error, Result};
use crate::filter::IgnoreFlags;
use crate::fragment::{FragmentKind, RawFragment};
use crate::message::MidiMessage;
use crate::queue::{input_queue, QueueConsumer};

const DIAGNOSTIC_CHANNEL_CAPACITY: usize = 64;

/// Non-fatal conditions surfaced on the per-connection diagnostic channel.
///
/// Each connection owns its own channel; there is no process-wide error
/// callback or singleton error state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Diagnostic {
    /// The input queue was full; `dropped` is the running total of messages
    /// lost on this connection.
    QueueOverflow { dropped: u64 },
    /// The transport aborted a sysex mid-accumulation; the partial message
    /// was discarded.
    SysexAborted,
}

/// One-time configuration supplied at connection open.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct InputConfig {
    /// Queue capacity in messages. 0 disables queuing: the connection is
    /// callback-only and `poll` reports a usage error.
    pub queue_capacity: usize,
    /// Resolution of the transport's native timestamps.
    pub tick_unit: TickUnit,
    /// Initial filter; adjustable later via [`InputHandle::ignore_types`].
    pub ignore: IgnoreFlags,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1024,
            tick_unit: TickUnit::Microseconds,
            ignore: IgnoreFlags::NONE,
        }
    }
}

/// State shared between the driver and the handle. Scalar fields only; the
/// queue itself is split into owned producer/consumer halves.
pub(crate) struct Shared {
    active: AtomicBool,
    ignore: AtomicU8,
    dropped: AtomicU64,
    diag_tx: Sender<Diagnostic>,
    diag_rx: Receiver<Diagnostic>,
}

impl Shared {
    pub fn new(ignore: IgnoreFlags) -> Self {
        let (diag_tx, diag_rx) = bounded(DIAGNOSTIC_CHANNEL_CAPACITY);
        Self {
            active: AtomicBool::new(true),
            ignore: AtomicU8::new(ignore.bits()),
            dropped: AtomicU64::new(0),
            diag_tx,
            diag_rx,
        }
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub fn close(&self) {
        self.active.store(false, Ordering::Release);
    }

    #[inline]
    pub fn ignore_flags(&self) -> IgnoreFlags {
        IgnoreFlags::from_bits(self.ignore.load(Ordering::Acquire))
    }

    pub fn set_ignore_flags(&self, flags: IgnoreFlags) {
        self.ignore.store(flags.bits(), Ordering::Release);
    }

    /// Bump the drop counter; returns the new total.
    pub fn record_drop(&self) -> u64 {
        self.dropped.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Best-effort: a full diagnostic channel drops the diagnostic rather
    /// than block the transport thread.
    pub fn send_diagnostic(&self, diagnostic: Diagnostic) {
        let _ = self.diag_tx.try_send(diagnostic);
    }

    pub fn try_diagnostic(&self) -> Option<Diagnostic> {
        self.diag_rx.try_recv().ok()
    }
}

/// Producer half of a connection. Move this into the transport thread and
/// feed it one fragment per native event.
pub struct InputDriver {
    assembler: MessageAssembler,
    clock: ClockNormalizer,
    sink: DispatchSink,
    shared: Arc<Shared>,
}

impl InputDriver {
    /// Run one fragment through assembly, stamping, filtering, and dispatch.
    ///
    /// The clock baseline advances for every completed message, including
    /// ones the filter then drops, so filtered traffic never distorts later
    /// deltas. A closed connection ignores fragments entirely, which lets
    /// the consumer side tear down without racing a mid-flight delivery.
    pub fn feed(&mut self, fragment: RawFragment<'_>) {
        if !self.shared.is_active() {
            return;
        }

        if fragment.kind == FragmentKind::SysexError && self.assembler.in_sysex() {
            self.shared.send_diagnostic(Diagnostic::SysexAborted);
        }

        let timestamp = fragment.timestamp;
        let Some(bytes) = self.assembler.feed(fragment) else {
            return;
        };

        let delta = self.clock.stamp(timestamp);
        if !self.shared.ignore_flags().should_keep(&bytes) {
            return;
        }
        self.sink.deliver(MidiMessage::new(delta, bytes), &self.shared);
    }

    /// True until the handle closes the connection.
    pub fn is_active(&self) -> bool {
        self.shared.is_active()
    }
}

/// Consumer half of a connection.
pub struct InputHandle {
    shared: Arc<Shared>,
    consumer: Option<QueueConsumer>,
    callback_slot: Option<Arc<CallbackSlot>>,
}

impl InputHandle {
    /// Non-blocking single pop. `Ok(None)` means no message is waiting;
    /// calling this on a callback-mode connection is a usage error.
    pub fn poll(&mut self) -> Result<Option<MidiMessage>> {
        match self.consumer.as_mut() {
            Some(consumer) => Ok(consumer.pop()),
            None => Err(Error::CallbackModeActive),
        }
    }

    /// Register a handler invoked synchronously on the transport thread for
    /// every delivered message. Fails without state change if the connection
    /// is in queue mode or a callback is already registered.
    ///
    /// The handler runs detached from the registration slot, so it may
    /// register its own replacement; `cancel_callback` from inside the
    /// running handler reports [`Error::NoCallbackSet`].
    pub fn set_callback<F>(&self, handler: F) -> Result<()>
    where
        F: FnMut(f64, &[u8]) + Send + 'static,
    {
        let slot = self.callback_slot.as_ref().ok_or(Error::QueueModeActive)?;
        let boxed: MidiCallback = Box::new(handler);
        if !slot.set(boxed) {
            return Err(Error::CallbackAlreadySet);
        }
        Ok(())
    }

    /// Remove the registered callback. Fails if none is set.
    pub fn cancel_callback(&self) -> Result<()> {
        let cleared = self
            .callback_slot
            .as_ref()
            .map(|slot| slot.clear())
            .unwrap_or(false);
        if !cleared {
            return Err(Error::NoCallbackSet);
        }
        Ok(())
    }

    /// Drop the named message classes before delivery. Takes effect from the
    /// next completed message; already-queued messages are unaffected.
    pub fn ignore_types(&self, sysex: bool, timing: bool, sensing: bool) {
        self.shared
            .set_ignore_flags(IgnoreFlags::new(sysex, timing, sensing));
    }

    pub fn set_ignore_flags(&self, flags: IgnoreFlags) {
        self.shared.set_ignore_flags(flags);
    }

    pub fn ignore_flags(&self) -> IgnoreFlags {
        self.shared.ignore_flags()
    }

    /// Running total of messages dropped on this connection (queue overflow
    /// or callback-mode delivery with no handler registered).
    pub fn dropped_messages(&self) -> u64 {
        self.shared.dropped()
    }

    /// Drain one pending diagnostic, if any. Never blocks.
    pub fn try_diagnostic(&self) -> Option<Diagnostic> {
        self.shared.try_diagnostic()
    }

    /// Quiesce the producer: the driver ignores all fragments fed after this
    /// becomes visible. Queued-but-unconsumed messages remain poppable until
    /// the handle is dropped.
    pub fn close(&self) {
        self.shared.close();
        tracing::debug!("input connection closed");
    }

    pub fn is_open(&self) -> bool {
        self.shared.is_active()
    }
}

impl Drop for InputHandle {
    fn drop(&mut self) {
        self.shared.close();
    }
}

/// Open an input connection, splitting it into its producer and consumer
/// halves. Queue capacity > 0 selects queue (poll) mode; capacity 0 selects
/// callback-only mode.
pub fn open_input(config: InputConfig) -> (InputDriver, InputHandle) {
    let shared = Arc::new(Shared::new(config.ignore));

    let (sink, consumer, callback_slot) = if config.queue_capacity > 0 {
        let (producer, consumer) = input_queue(config.queue_capacity);
        (DispatchSink::Queue(producer), Some(consumer), None)
    } else {
        let slot = Arc::new(CallbackSlot::default());
        (DispatchSink::Callback(Arc::clone(&slot)), None, Some(slot))
    };

    tracing::debug!(
        queue_capacity = config.queue_capacity,
        tick_unit = ?config.tick_unit,
        "input connection opened"
    );

    let driver = InputDriver {
        assembler: MessageAssembler::new(),
        clock: ClockNormalizer::new(config.tick_unit),
        sink,
        shared: Arc::clone(&shared),
    };
    let handle = InputHandle {
        shared,
        consumer,
        callback_slot,
    };
    (driver, handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn queue_config(capacity: usize) -> InputConfig {
        InputConfig {
            queue_capacity: capacity,
            tick_unit: TickUnit::Microseconds,
            ignore: IgnoreFlags::NONE,
        }
    }

    fn callback_config() -> InputConfig {
        queue_config(0)
    }

    #[test]
    fn test_queue_mode_end_to_end() {
        let (mut driver, mut handle) = open_input(queue_config(16));

        driver.feed(RawFragment::short(&[0x90, 60, 100], 1_000_000));
        driver.feed(RawFragment::short(&[0x80, 60, 0], 1_250_000));

        let first = handle.poll().unwrap().expect("first message");
        assert_eq!(first.bytes.as_slice(), &[0x90, 60, 100]);
        assert_eq!(first.delta, 0.0);

        let second = handle.poll().unwrap().expect("second message");
        assert_eq!(second.bytes.as_slice(), &[0x80, 60, 0]);
        assert!((second.delta - 0.25).abs() < 1e-9);

        assert!(handle.poll().unwrap().is_none());
    }

    #[test]
    fn test_filtered_message_still_advances_baseline() {
        let config = InputConfig {
            ignore: IgnoreFlags::new(false, true, false),
            ..queue_config(16)
        };
        let (mut driver, mut handle) = open_input(config);

        driver.feed(RawFragment::short(&[0x90, 60, 100], 1_000_000));
        // Clock message is filtered but must still move the baseline.
        driver.feed(RawFragment::short(&[0xF8], 1_400_000));
        driver.feed(RawFragment::short(&[0x80, 60, 0], 1_500_000));

        let first = handle.poll().unwrap().unwrap();
        assert_eq!(first.delta, 0.0);
        let second = handle.poll().unwrap().unwrap();
        assert_eq!(second.bytes.as_slice(), &[0x80, 60, 0]);
        // 0.1 s since the filtered clock message, not 0.5 s since the note.
        assert!((second.delta - 0.1).abs() < 1e-9);
        assert!(handle.poll().unwrap().is_none());
    }

    #[test]
    fn test_first_message_consumed_even_when_filtered() {
        let config = InputConfig {
            ignore: IgnoreFlags::new(false, false, true),
            ..queue_config(16)
        };
        let (mut driver, mut handle) = open_input(config);

        // Active sensing is filtered, but it is still the "first message".
        driver.feed(RawFragment::short(&[0xFE], 2_000_000));
        driver.feed(RawFragment::short(&[0x90, 60, 100], 2_500_000));

        let msg = handle.poll().unwrap().unwrap();
        assert_eq!(msg.bytes.as_slice(), &[0x90, 60, 100]);
        assert!((msg.delta - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_ignore_flags_not_retroactive() {
        let (mut driver, mut handle) = open_input(queue_config(16));

        driver.feed(RawFragment::short(&[0xFE], 0));
        handle.ignore_types(false, false, true);
        driver.feed(RawFragment::short(&[0xFE], 100));

        // The first sensing message was queued before the flag changed.
        let queued = handle.poll().unwrap().expect("pre-flag message kept");
        assert_eq!(queued.bytes.as_slice(), &[0xFE]);
        assert!(handle.poll().unwrap().is_none());
    }

    #[test]
    fn test_queue_overflow_diagnostic() {
        let (mut driver, mut handle) = open_input(queue_config(2));

        for t in 0..4u64 {
            driver.feed(RawFragment::short(&[0x90, 60, 100], t * 1000));
        }

        assert_eq!(handle.dropped_messages(), 2);
        assert_eq!(
            handle.try_diagnostic(),
            Some(Diagnostic::QueueOverflow { dropped: 1 })
        );
        assert_eq!(
            handle.try_diagnostic(),
            Some(Diagnostic::QueueOverflow { dropped: 2 })
        );
        assert!(handle.try_diagnostic().is_none());

        // The two queued messages survive untouched.
        assert!(handle.poll().unwrap().is_some());
        assert!(handle.poll().unwrap().is_some());
        assert!(handle.poll().unwrap().is_none());
    }

    #[test]
    fn test_callback_mode_delivery() {
        let (mut driver, handle) = open_input(callback_config());
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_cb = Arc::clone(&seen);
        handle
            .set_callback(move |_delta, bytes| {
                assert_eq!(bytes[0] & 0xF0, 0x90);
                seen_cb.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        driver.feed(RawFragment::short(&[0x90, 60, 100], 0));
        driver.feed(RawFragment::short(&[0x91, 61, 90], 500));
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_mode_usage_errors() {
        let (_driver, mut queue_handle) = open_input(queue_config(4));
        assert!(matches!(
            queue_handle.set_callback(|_, _| {}),
            Err(Error::QueueModeActive)
        ));
        assert!(matches!(
            queue_handle.cancel_callback(),
            Err(Error::NoCallbackSet)
        ));
        assert!(queue_handle.poll().unwrap().is_none());

        let (_driver, mut cb_handle) = open_input(callback_config());
        assert!(matches!(cb_handle.poll(), Err(Error::CallbackModeActive)));
        cb_handle.set_callback(|_, _| {}).unwrap();
        assert!(matches!(
            cb_handle.set_callback(|_, _| {}),
            Err(Error::CallbackAlreadySet)
        ));
        cb_handle.cancel_callback().unwrap();
        assert!(matches!(
            cb_handle.cancel_callback(),
            Err(Error::NoCallbackSet)
        ));
    }

    #[test]
    fn test_close_quiesces_driver() {
        let (mut driver, mut handle) = open_input(queue_config(4));

        driver.feed(RawFragment::short(&[0x90, 60, 100], 0));
        handle.close();
        assert!(!driver.is_active());
        driver.feed(RawFragment::short(&[0x80, 60, 0], 1000));

        // Message queued before close is still poppable; the one fed after
        // close never entered the pipeline.
        assert!(handle.poll().unwrap().is_some());
        assert!(handle.poll().unwrap().is_none());
    }

    #[test]
    fn test_empty_final_fragment_emits_nothing() {
        let (mut driver, mut handle) = open_input(queue_config(8));

        driver.feed(RawFragment::short(&[0x90, 60, 100], 1_000_000));
        // Chunk carries the terminator but is non-final; the empty final
        // after it must not complete the message or touch the clock.
        driver.feed(RawFragment::sysex_chunk(&[0xF0, 0x41, 0xF7], 1_200_000));
        driver.feed(RawFragment::sysex_final(&[], 1_900_000));

        assert_eq!(handle.poll().unwrap().unwrap().delta, 0.0);
        assert!(handle.poll().unwrap().is_none());

        driver.feed(RawFragment::sysex_final(&[0xF7], 2_000_000));
        let sysex = handle.poll().unwrap().expect("completed sysex");
        assert_eq!(sysex.bytes.as_slice(), &[0xF0, 0x41, 0xF7, 0xF7]);
        // Delta measured from the note, not from the inert empty fragment.
        assert!((sysex.delta - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_sysex_abort_diagnostic() {
        let (mut driver, handle) = open_input(queue_config(4));

        driver.feed(RawFragment::sysex_chunk(&[0xF0, 0x41], 0));
        driver.feed(RawFragment::new(FragmentKind::SysexError, &[], 1));
        assert_eq!(handle.try_diagnostic(), Some(Diagnostic::SysexAborted));

        // A stray SysexError with no accumulation is not diagnostic-worthy.
        driver.feed(RawFragment::new(FragmentKind::SysexError, &[], 2));
        assert!(handle.try_diagnostic().is_none());
    }

    #[test]
    fn test_connections_are_independent() {
        let (mut driver_a, mut handle_a) = open_input(queue_config(4));
        let (mut driver_b, mut handle_b) = open_input(queue_config(4));

        driver_a.feed(RawFragment::short(&[0x90, 60, 100], 1_000_000));
        driver_b.feed(RawFragment::short(&[0x91, 72, 80], 9_000_000));
        driver_b.feed(RawFragment::short(&[0x81, 72, 0], 9_500_000));

        assert_eq!(
            handle_a.poll().unwrap().unwrap().bytes.as_slice(),
            &[0x90, 60, 100]
        );
        assert!(handle_a.poll().unwrap().is_none());

        let b1 = handle_b.poll().unwrap().unwrap();
        assert_eq!(b1.delta, 0.0);
        let b2 = handle_b.poll().unwrap().unwrap();
        assert!((b2.delta - 0.5).abs() < 1e-9);
    }
}
