//! Deferred event delivery over a pair of queues.
//!
//! A dispatcher accepts timestamped events from a producer and re-emits each
//! one to a consumer no earlier than its due time, in exactly the order the
//! events were submitted. One worker thread bridges a bounded intake queue
//! and a rendezvous outtake queue:
//!
//! ```text
//! producer → intake queue → worker → outtake queue → consumer
//! ```
//!
//! # Guarantees
//!
//! - **FIFO**: the delivery order equals the submission order. No event
//!   overtakes another, regardless of relative due times. An event scheduled
//!   far in the future therefore delays everything submitted after it
//!   (head-of-line blocking); that trade-off buys a provably simple ordering
//!   contract and is part of the API.
//! - **No early delivery**: a consumer never observes an event before its
//!   due time.
//! - **Graceful shutdown**: closing the sending side drains every buffered
//!   event, due times respected, before the receiving side observes
//!   end-of-stream.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//!
//! use chime::clock::Instant;
//!
//! let (tx, rx) = chime::channel::<&str>(8);
//!
//! tx.send(Instant::now() + Duration::from_millis(10), "round over")
//!     .unwrap();
//! tx.close();
//!
//! while let Some(event) = rx.recv() {
//!     println!("{}", event.payload);
//! }
//! ```
//!
//! The worker's time source is injectable: production code uses the default
//! [`clock::SystemClock`], tests drive a [`clock::VirtualClock`] by hand to
//! make timing behavior deterministic. See [`dispatch::channel_with_clock`].

pub mod clock;
pub mod dispatch;
pub mod sync;

pub(crate) mod trace;

#[doc(inline)]
pub use dispatch::{Event, Receiver, Sender, channel, channel_with_clock};

pub use trace::init_tracing;
