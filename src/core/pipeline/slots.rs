//! Counting semaphore over a crossbeam channel.
//!
//! The channel holds one token per slot. Acquiring takes a token, and
//! dropping the returned permit puts it back, including during unwinding.

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;
use tracing::debug;

/// A fixed number of worker slots shared by producer and workers
#[derive(Clone)]
pub struct WorkerSlots {
    release: Sender<()>,
    acquire: Receiver<()>,
    capacity: usize,
}

/// Holds one slot until dropped
pub struct SlotPermit {
    release: Sender<()>,
}

impl Drop for SlotPermit {
    fn drop(&mut self) {
        // The channel has room for every token, so this never blocks
        let _ = self.release.try_send(());
    }
}

impl WorkerSlots {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (release, acquire) = bounded(capacity);
        for _ in 0..capacity {
            let _ = release.try_send(());
        }
        Self {
            release,
            acquire,
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slots currently free
    pub fn available(&self) -> usize {
        self.acquire.len()
    }

    /// Wait for a slot, giving up after `attempts` waits of `timeout` each.
    ///
    /// Returns the number of attempts made on failure.
    pub fn acquire(&self, timeout: Duration, attempts: u32) -> Result<SlotPermit, u32> {
        let attempts = attempts.max(1);
        for attempt in 1..=attempts {
            match self.acquire.recv_timeout(timeout) {
                Ok(()) => {
                    return Ok(SlotPermit {
                        release: self.release.clone(),
                    })
                }
                Err(RecvTimeoutError::Timeout) => {
                    debug!("No worker slot after {:?} (attempt {}/{})", timeout, attempt, attempts);
                }
                Err(RecvTimeoutError::Disconnected) => return Err(attempt),
            }
        }
        Err(attempts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn permits_return_their_slot_on_drop() {
        let slots = WorkerSlots::new(2);
        let first = slots.acquire(Duration::from_millis(10), 1).unwrap();
        let _second = slots.acquire(Duration::from_millis(10), 1).unwrap();
        assert_eq!(slots.available(), 0);

        drop(first);
        assert_eq!(slots.available(), 1);
    }

    #[test]
    fn acquire_gives_up_after_all_attempts() {
        let slots = WorkerSlots::new(1);
        let _held = slots.acquire(Duration::from_millis(10), 1).unwrap();

        assert_eq!(slots.acquire(Duration::from_millis(5), 3).err(), Some(3));
    }

    #[test]
    fn zero_capacity_is_treated_as_one() {
        assert_eq!(WorkerSlots::new(0).capacity(), 1);
    }

    #[test]
    fn permit_is_released_when_holder_panics() {
        let slots = WorkerSlots::new(1);
        let worker_slots = slots.clone();

        let result = thread::spawn(move || {
            let _permit = worker_slots.acquire(Duration::from_millis(10), 1).unwrap();
            panic!("decoder blew up");
        })
        .join();

        assert!(result.is_err());
        assert_eq!(slots.available(), 1);
    }

    #[test]
    fn never_more_holders_than_capacity() {
        let slots = WorkerSlots::new(3);
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..12)
            .map(|_| {
                let slots = slots.clone();
                let active = Arc::clone(&active);
                let peak = Arc::clone(&peak);
                thread::spawn(move || {
                    let _permit = slots.acquire(Duration::from_secs(5), 10).unwrap();
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(5));
                    active.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert!(peak.load(Ordering::SeqCst) <= 3);
    }
}
