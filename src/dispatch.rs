//! Deferred event delivery: the dispatcher construction API and its worker.
//!
//! # Architecture
//!
//! [`channel`] builds two queues and spawns exactly one worker thread that
//! bridges them:
//!
//! - **Intake**: bounded to the requested capacity; the producer blocks once
//!   it is full (backpressure). Capacity `0` makes every submission
//!   rendezvous directly with the worker.
//! - **Outtake**: always rendezvous; a delivery completes only once a
//!   consumer has accepted the event.
//!
//! The worker is the sole reader of the intake and sole writer of the
//! outtake. It takes events strictly in submission order, sleeps until each
//! event's due time, and offers it to the consumer. Processing is
//! intentionally sequential and non-reordering: an event due far in the
//! future delays everything submitted after it, even entries that are
//! already due. That head-of-line blocking is the price of the FIFO
//! contract and is part of the API, not a defect.
//!
//! # Shutdown
//!
//! [`Sender::close`] (or dropping the sender) signals that no more events
//! will be submitted. The worker drains and time-delays everything still
//! buffered, then closes the outtake; [`Receiver::recv`] returning `None`
//! is the sole termination signal for consumers.
//!
//! # Composition
//!
//! Application wiring passes [`channel`] (or a constructed pair) explicitly
//! to each feature that needs delayed actions; every feature gets an
//! independent dispatcher and the payload type stays fully opaque to this
//! module.

use std::thread;

use crate::clock::{Clock, Instant, SystemClock};
use crate::sync::queue;
use crate::trace::{debug, trace, warn};

pub use crate::sync::queue::Disconnected;

/// A payload scheduled for delivery no earlier than its due time.
///
/// The payload is owned by the producer until sent and by the consumer after
/// delivery; the dispatcher never inspects or mutates it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event<T> {
    /// Earliest instant at which the event may be delivered.
    pub due: Instant,
    /// Producer-owned value, handed to the consumer untouched.
    pub payload: T,
}

/// Producer endpoint of a dispatcher.
///
/// Single-writer by construction: `Send` but not `Sync` and not `Clone`, so
/// concurrent submission on one handle cannot compile. Hand the sender
/// between producer threads by move.
pub struct Sender<T> {
    intake: queue::Sender<Event<T>>,
}

/// Consumer endpoint of a dispatcher.
pub struct Receiver<T> {
    outtake: queue::Receiver<Event<T>>,
}

/// Creates a dispatcher with the given intake capacity, running against the
/// wall clock.
///
/// See [`channel_with_clock`] for the clock-injected variant.
#[must_use]
pub fn channel<T: Send + 'static>(capacity: usize) -> (Sender<T>, Receiver<T>) {
    channel_with_clock(capacity, SystemClock)
}

/// Creates a dispatcher with the given intake capacity and time source.
///
/// Spawns the worker thread immediately; it runs until the sending side is
/// closed and drained.
///
/// # Panics
///
/// Panics if the worker thread cannot be spawned.
#[must_use]
pub fn channel_with_clock<T, C>(capacity: usize, clock: C) -> (Sender<T>, Receiver<T>)
where
    T: Send + 'static,
    C: Clock,
{
    let (intake_tx, intake_rx) = queue::channel(capacity);
    let (outtake_tx, outtake_rx) = queue::channel(0);

    debug!(capacity, "dispatcher starting");
    thread::Builder::new()
        .name("chime-dispatch".into())
        .spawn(move || run(intake_rx, outtake_tx, clock))
        .expect("failed to spawn dispatch worker");

    (
        Sender { intake: intake_tx },
        Receiver {
            outtake: outtake_rx,
        },
    )
}

/// Worker loop: sole reader of the intake, sole writer of the outtake.
fn run<T, C>(intake: queue::Receiver<Event<T>>, outtake: queue::Sender<Event<T>>, clock: C)
where
    T: Send,
    C: Clock,
{
    while let Some(event) = intake.recv() {
        let now = clock.now();
        if event.due > now {
            trace!(
                defer_us = (event.due - now).as_micros() as u64,
                "event not yet due; sleeping"
            );
            clock.sleep_until(event.due);
        }
        if outtake.send(event).is_err() {
            warn!("consumer dropped; dispatch worker exiting");
            return;
        }
        trace!("event delivered");
    }
    debug!("intake closed and drained; dispatch worker exiting");
    // Dropping `outtake` closes it: end-of-stream for the consumer.
}

impl<T> Sender<T> {
    /// Submits an event for delivery at or after `due`.
    ///
    /// Blocks while the intake buffer is full; with capacity `0` it blocks
    /// until the worker itself accepts the event.
    ///
    /// # Errors
    ///
    /// Returns `Err(Disconnected(payload))` if the consumer side was dropped
    /// and the worker has exited.
    pub fn send(&self, due: Instant, payload: T) -> Result<(), Disconnected<T>> {
        self.intake
            .send(Event { due, payload })
            .map_err(|Disconnected(event)| Disconnected(event.payload))
    }

    /// Signals that no more events will be submitted.
    ///
    /// Consuming the handle makes send-after-close unrepresentable. Events
    /// already buffered still drain through the worker, due times respected,
    /// before the receiving side observes end-of-stream. Dropping the sender
    /// has the same effect.
    pub fn close(self) {
        self.intake.close();
    }
}

impl<T> Receiver<T> {
    /// Blocks for the next delivered event.
    ///
    /// Events arrive strictly in submission order, each no earlier than its
    /// due time. `None` means the sending side closed and every buffered
    /// event has been delivered (end-of-stream, not an error).
    #[must_use]
    pub fn recv(&self) -> Option<Event<T>> {
        self.outtake.recv()
    }

    /// Attempts to take a delivered event without blocking.
    ///
    /// Returns `None` if no event is ready right now; this does not
    /// distinguish "worker still sleeping" from end-of-stream.
    #[must_use]
    pub fn try_recv(&self) -> Option<Event<T>> {
        self.outtake.try_recv()
    }
}
