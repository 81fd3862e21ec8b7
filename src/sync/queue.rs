//! Blocking SPSC queue with close semantics.
//!
//! A mutex-and-condvar queue for handing values between exactly two threads.
//!
//! # Overview
//!
//! - [`Sender`] - Write end (single sender per queue)
//! - [`Receiver`] - Read end (single receiver per queue)
//! - Capacity `>= 1`: bounded buffer, `send` blocks while full
//! - Capacity `0`: rendezvous, `send` blocks until the receiver takes the value
//!
//! # Close semantics
//!
//! Closing the sender marks the queue closed and wakes the receiver. Entries
//! buffered at the moment of closing still drain through [`Receiver::recv`];
//! only once the queue is both closed and empty does `recv` report `None`.
//! Sending on a closed queue is a contract violation and panics.
//!
//! # Example
//!
//! ```
//! use chime::sync::queue;
//!
//! let (tx, rx) = queue::channel::<u64>(16);
//!
//! tx.send(42).expect("receiver alive");
//! tx.close();
//!
//! assert_eq!(rx.recv(), Some(42));
//! assert_eq!(rx.recv(), None);
//! ```

use std::cell::Cell;
use std::collections::VecDeque;
use std::marker::PhantomData;
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};
use thiserror::Error;

/// Error returned from [`Sender::send`] when the receiver has been dropped.
///
/// Carries the rejected value so the caller can recover it.
#[derive(Debug, Error)]
#[error("queue receiver disconnected")]
pub struct Disconnected<T>(pub T);

struct State<T> {
    buffer: VecDeque<T>,
    closed: bool,
    receiver_gone: bool,
}

struct Shared<T> {
    capacity: usize,
    state: Mutex<State<T>>,
    /// Signaled when an entry is pushed or the queue closes.
    not_empty: Condvar,
    /// Signaled when an entry is popped or the receiver is dropped.
    not_full: Condvar,
}

/// Marker type to opt-out of `Sync` while remaining `Send`.
type PhantomUnsync = PhantomData<Cell<&'static ()>>;

/// Write end of the queue.
///
/// # Thread Safety
///
/// `Sender` is [`Send`] but **not** [`Sync`] and not [`Clone`]:
/// - Can transfer ownership to another thread
/// - Cannot share `&Sender` (no concurrent `send()`)
pub struct Sender<T> {
    shared: Arc<Shared<T>>,
    _unsync: PhantomUnsync,
}

/// Read end of the queue.
///
/// See [`Sender`] for thread safety details (same semantics apply).
pub struct Receiver<T> {
    shared: Arc<Shared<T>>,
    _unsync: PhantomUnsync,
}

/// Creates a new blocking queue with the given capacity.
///
/// A capacity of `0` makes the queue a rendezvous point: every `send`
/// completes only once the receiver has taken the value.
#[must_use]
pub fn channel<T>(capacity: usize) -> (Sender<T>, Receiver<T>) {
    let shared = Arc::new(Shared {
        capacity,
        state: Mutex::new(State {
            buffer: VecDeque::with_capacity(capacity),
            closed: false,
            receiver_gone: false,
        }),
        not_empty: Condvar::new(),
        not_full: Condvar::new(),
    });

    let sender = Sender {
        shared: Arc::clone(&shared),
        _unsync: PhantomData,
    };

    let receiver = Receiver {
        shared,
        _unsync: PhantomData,
    };

    (sender, receiver)
}

impl<T> Sender<T> {
    /// Sends a value, blocking per the queue's capacity rules.
    ///
    /// With capacity `>= 1` this blocks while the buffer is full. With
    /// capacity `0` it blocks until the receiver has taken the value
    /// (rendezvous).
    ///
    /// # Errors
    ///
    /// Returns `Err(Disconnected(value))` if the receiver was dropped before
    /// the value could be taken.
    ///
    /// # Panics
    ///
    /// Panics if the queue was already closed. Close discipline is the
    /// sender's responsibility; sending after close is a bug, not a
    /// recoverable condition.
    pub fn send(&self, value: T) -> Result<(), Disconnected<T>> {
        let shared = &self.shared;
        let mut state = shared.state.lock();
        assert!(!state.closed, "send on closed queue");

        if shared.capacity == 0 {
            // Single sender: the previous rendezvous completed before this
            // call, so the buffer is empty here.
            debug_assert!(state.buffer.is_empty());
            if state.receiver_gone {
                return Err(Disconnected(value));
            }
            state.buffer.push_back(value);
            shared.not_empty.notify_one();

            // Wait for the receiver to take the value.
            while !state.buffer.is_empty() {
                if state.receiver_gone {
                    if let Some(value) = state.buffer.pop_front() {
                        return Err(Disconnected(value));
                    }
                    break;
                }
                shared.not_full.wait(&mut state);
            }
            Ok(())
        } else {
            while state.buffer.len() == shared.capacity {
                if state.receiver_gone {
                    return Err(Disconnected(value));
                }
                shared.not_full.wait(&mut state);
            }
            if state.receiver_gone {
                return Err(Disconnected(value));
            }
            state.buffer.push_back(value);
            shared.not_empty.notify_one();
            Ok(())
        }
    }

    /// Closes the queue, signaling end-of-stream to the receiver.
    ///
    /// Idempotent. Entries already buffered still drain through `recv`;
    /// the receiver observes `None` only once the buffer is empty.
    pub fn close(&self) {
        let mut state = self.shared.state.lock();
        if !state.closed {
            state.closed = true;
            self.shared.not_empty.notify_one();
        }
    }
}

impl<T> Drop for Sender<T> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<T> Receiver<T> {
    /// Receives the next value, blocking while the queue is empty and open.
    ///
    /// Returns `None` once the queue is closed **and** every buffered entry
    /// has been taken (end-of-stream, not an error).
    #[must_use]
    pub fn recv(&self) -> Option<T> {
        let mut state = self.shared.state.lock();
        loop {
            if let Some(value) = state.buffer.pop_front() {
                self.shared.not_full.notify_one();
                return Some(value);
            }
            if state.closed {
                return None;
            }
            self.shared.not_empty.wait(&mut state);
        }
    }

    /// Attempts to receive without blocking.
    ///
    /// Returns `None` if nothing is buffered right now; this does not
    /// distinguish empty from closed.
    #[must_use]
    pub fn try_recv(&self) -> Option<T> {
        let mut state = self.shared.state.lock();
        let value = state.buffer.pop_front()?;
        self.shared.not_full.notify_one();
        Some(value)
    }
}

impl<T> Drop for Receiver<T> {
    fn drop(&mut self) {
        let mut state = self.shared.state.lock();
        state.receiver_gone = true;
        self.shared.not_full.notify_one();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn basic_send_recv() {
        let (tx, rx) = channel::<u64>(8);

        tx.send(42).unwrap();
        assert_eq!(rx.try_recv(), Some(42));
        assert_eq!(rx.try_recv(), None);
    }

    #[test]
    fn fifo_order() {
        let (tx, rx) = channel::<u64>(16);

        for i in 0..10 {
            tx.send(i).unwrap();
        }

        for i in 0..10 {
            assert_eq!(rx.recv(), Some(i));
        }
    }

    #[test]
    fn recv_blocks_until_send() {
        let (tx, rx) = channel::<u64>(4);

        let handle = thread::spawn(move || rx.recv());

        thread::sleep(Duration::from_millis(20));
        tx.send(7).unwrap();

        assert_eq!(handle.join().unwrap(), Some(7));
    }

    #[test]
    fn send_blocks_when_full() {
        let (tx, rx) = channel::<u64>(2);
        let blocked = Arc::new(AtomicBool::new(true));

        tx.send(0).unwrap();
        tx.send(1).unwrap();

        let sender = {
            let blocked = Arc::clone(&blocked);
            thread::spawn(move || {
                tx.send(2).unwrap();
                blocked.store(false, Ordering::Relaxed);
            })
        };

        thread::sleep(Duration::from_millis(50));
        assert!(blocked.load(Ordering::Relaxed), "send must block while full");

        assert_eq!(rx.recv(), Some(0));
        sender.join().unwrap();
        assert!(!blocked.load(Ordering::Relaxed));

        assert_eq!(rx.recv(), Some(1));
        assert_eq!(rx.recv(), Some(2));
    }

    #[test]
    fn rendezvous_send_completes_only_on_take() {
        let (tx, rx) = channel::<u64>(0);
        let handed_off = Arc::new(AtomicBool::new(false));

        let sender = {
            let handed_off = Arc::clone(&handed_off);
            thread::spawn(move || {
                tx.send(99).unwrap();
                handed_off.store(true, Ordering::Relaxed);
            })
        };

        thread::sleep(Duration::from_millis(50));
        assert!(
            !handed_off.load(Ordering::Relaxed),
            "rendezvous send must not complete before the receive"
        );

        assert_eq!(rx.recv(), Some(99));
        sender.join().unwrap();
        assert!(handed_off.load(Ordering::Relaxed));
    }

    #[test]
    fn close_drains_before_end_of_stream() {
        let (tx, rx) = channel::<u64>(8);

        for i in 0..3 {
            tx.send(i).unwrap();
        }
        tx.close();

        assert_eq!(rx.recv(), Some(0));
        assert_eq!(rx.recv(), Some(1));
        assert_eq!(rx.recv(), Some(2));
        assert_eq!(rx.recv(), None);
    }

    #[test]
    fn close_is_idempotent() {
        let (tx, rx) = channel::<u64>(4);

        tx.close();
        tx.close();
        drop(tx); // closes again

        assert_eq!(rx.recv(), None);
    }

    #[test]
    fn drop_sender_closes() {
        let (tx, rx) = channel::<u64>(4);

        tx.send(1).unwrap();
        drop(tx);

        assert_eq!(rx.recv(), Some(1));
        assert_eq!(rx.recv(), None);
    }

    #[test]
    fn recv_unblocks_on_close() {
        let (tx, rx) = channel::<u64>(4);

        let handle = thread::spawn(move || rx.recv());

        thread::sleep(Duration::from_millis(20));
        tx.close();

        assert_eq!(handle.join().unwrap(), None);
    }

    #[test]
    #[should_panic(expected = "send on closed queue")]
    fn send_after_close_panics() {
        let (tx, _rx) = channel::<u64>(4);

        tx.close();
        let _ = tx.send(1);
    }

    #[test]
    fn send_to_dropped_receiver_returns_value() {
        let (tx, rx) = channel::<u64>(0);
        drop(rx);

        let err = tx.send(5).unwrap_err();
        assert_eq!(err.0, 5);
    }

    #[test]
    fn blocked_send_unblocks_on_receiver_drop() {
        let (tx, rx) = channel::<u64>(1);

        tx.send(0).unwrap();
        let sender = thread::spawn(move || tx.send(1));

        thread::sleep(Duration::from_millis(20));
        drop(rx);

        let err = sender.join().unwrap().unwrap_err();
        assert_eq!(err.0, 1);
    }

    #[test]
    fn non_copy_type() {
        let (tx, rx) = channel::<String>(4);

        tx.send("hello".to_string()).unwrap();
        tx.send("world".to_string()).unwrap();

        assert_eq!(rx.recv(), Some("hello".to_string()));
        assert_eq!(rx.recv(), Some("world".to_string()));
    }

    #[test]
    fn error_display() {
        let err = Disconnected(17u64);
        assert_eq!(format!("{err}"), "queue receiver disconnected");
    }
}
