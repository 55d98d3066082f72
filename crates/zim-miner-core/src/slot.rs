//! First-writer-wins rendezvous between workers and the coordinator.

use std::sync::{Mutex, MutexGuard, PoisonError};

use crossbeam_channel::{bounded, Receiver, Sender};

#[derive(Debug)]
enum Slot<T> {
    Empty,
    Filled(T),
    /// The coordinator has collected the result. Nothing is stored again.
    Taken,
}

/// Single-slot result cell with a one-message completion channel.
///
/// The first `publish` stores its value and signals completion; every later
/// `publish` is dropped, including after the value has been taken. `close`
/// signals completion without a value when the search ends empty-handed.
#[derive(Debug)]
pub struct ResultChannel<T> {
    slot: Mutex<Slot<T>>,
    done_tx: Sender<()>,
    done_rx: Receiver<()>,
}

impl<T> ResultChannel<T> {
    pub fn new() -> Self {
        let (done_tx, done_rx) = bounded(1);
        ResultChannel {
            slot: Mutex::new(Slot::Empty),
            done_tx,
            done_rx,
        }
    }

    /// Offer a value. Returns true if it was the first and is now final.
    pub fn publish(&self, value: T) -> bool {
        {
            let mut slot = lock(&self.slot);
            if !matches!(*slot, Slot::Empty) {
                return false;
            }
            *slot = Slot::Filled(value);
        }
        // A full channel already carries a pending completion.
        let _ = self.done_tx.try_send(());
        true
    }

    /// Signal completion without publishing.
    pub fn close(&self) {
        let _ = self.done_tx.try_send(());
    }

    /// Block until a value is published or the channel is closed.
    pub fn wait(&self) {
        // The channel owns a sender, so it never disconnects.
        let _ = self.done_rx.recv();
    }

    /// Move the published value out, if any, and refuse all later values.
    pub fn take(&self) -> Option<T> {
        match std::mem::replace(&mut *lock(&self.slot), Slot::Taken) {
            Slot::Filled(value) => Some(value),
            Slot::Empty | Slot::Taken => None,
        }
    }
}

impl<T> Default for ResultChannel<T> {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Barrier};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_first_publish_wins() {
        let channel = ResultChannel::new();
        assert!(channel.publish(1));
        assert!(!channel.publish(2));
        channel.wait();
        assert_eq!(channel.take(), Some(1));
    }

    #[test]
    fn test_close_without_value() {
        let channel: ResultChannel<u64> = ResultChannel::new();
        channel.close();
        channel.close();
        channel.wait();
        assert_eq!(channel.take(), None);
    }

    #[test]
    fn test_publish_after_close_still_records() {
        let channel = ResultChannel::new();
        channel.close();
        assert!(channel.publish(9));
        assert_eq!(channel.take(), Some(9));
    }

    #[test]
    fn test_publish_after_take_is_dropped() {
        let channel = ResultChannel::new();
        assert!(channel.publish(1));
        assert_eq!(channel.take(), Some(1));

        // A worker still running after collection cannot refill the slot
        assert!(!channel.publish(2));
        assert_eq!(channel.take(), None);

        let empty: ResultChannel<u64> = ResultChannel::new();
        assert_eq!(empty.take(), None);
        assert!(!empty.publish(3));
    }

    #[test]
    fn test_racing_writers_leave_one_value() {
        const WRITERS: usize = 16;

        for _ in 0..20 {
            let channel = Arc::new(ResultChannel::new());
            let barrier = Arc::new(Barrier::new(WRITERS));
            let handles: Vec<_> = (0..WRITERS)
                .map(|id| {
                    let channel = Arc::clone(&channel);
                    let barrier = Arc::clone(&barrier);
                    thread::spawn(move || {
                        barrier.wait();
                        channel.publish(id)
                    })
                })
                .collect();

            let winners: Vec<bool> = handles.into_iter().map(|h| h.join().unwrap()).collect();
            assert_eq!(winners.iter().filter(|won| **won).count(), 1);

            let winner = winners.iter().position(|won| *won).unwrap();
            assert_eq!(channel.take(), Some(winner));
        }
    }

    #[test]
    fn test_publish_wakes_waiter() {
        let channel = Arc::new(ResultChannel::new());
        let waiter = {
            let channel = Arc::clone(&channel);
            thread::spawn(move || {
                channel.wait();
                channel.take()
            })
        };
        thread::sleep(Duration::from_millis(10));
        assert!(channel.publish(7u64));
        assert_eq!(waiter.join().unwrap(), Some(7));
    }
}
