//! Lock-free two-slot frame hand-off between one producer and one consumer.
//!
//! The capture callback thread is the sole writer; the consumer thread
//! (typically a render loop) is the sole reader. A single atomically
//! published front index is the only synchronization point: the producer
//! fills the back slot, then publishes it as the new front and raises the
//! new-frame flag. If the consumer does not poll between two publishes the
//! intermediate frame is silently dropped: last-writer-wins, no queuing,
//! and the producer never blocks on the consumer.
//!
//! The consumer reads through a [`SlotLease`] that pins its slot. A
//! publish that would land on a leased slot is dropped instead of written,
//! so the consumer can never observe a slot mid-write. Leases are meant to
//! be held for the duration of one read and released immediately.

use std::cell::UnsafeCell;
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

/// Sentinel for "no slot leased".
const NO_LEASE: usize = 2;

struct Shared<T> {
    slots: [UnsafeCell<T>; 2],
    /// Index of the slot holding the most recently published frame.
    front: AtomicUsize,
    /// Raised by the producer after a publish, cleared when the consumer
    /// takes a frame.
    has_new: AtomicBool,
    /// Slot currently leased to the consumer, or `NO_LEASE`.
    leased: AtomicUsize,
    /// Frames published so far; zero means nothing is readable yet.
    published: AtomicU64,
}

// SAFETY: slot access is partitioned by the front/leased protocol. The
// producer (unique `FrameWriter`, `&mut` methods) only writes the slot
// that is neither front nor leased; the consumer only reads a slot after
// leasing it, and a lease that raced a publish is released without any
// slot access. `front`, `leased` and `has_new` are sequentially-consistent
// atomics, so the publish of a completed write always becomes visible
// before the consumer can lease the written slot.
unsafe impl<T: Send> Send for Shared<T> {}
unsafe impl<T: Send> Sync for Shared<T> {}

/// Outcome of a producer publish attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The frame was written and is now the front slot.
    Published,
    /// The consumer holds a lease on the write slot; the frame was dropped.
    SkippedLeased,
    /// The fill callback reported failure; nothing was published.
    Abandoned,
}

/// Producer half of a frame double buffer. There is exactly one writer;
/// the capture backend owns it and calls it from its callback thread.
pub struct FrameWriter<T> {
    shared: Arc<Shared<T>>,
}

/// Consumer half of a frame double buffer.
pub struct FrameReader<T> {
    shared: Arc<Shared<T>>,
}

/// Build a double buffer over the two given slots. Slot 0 starts as the
/// front (read) slot and slot 1 as the back (write) slot.
pub fn double_buffer<T: Send>(slots: [T; 2]) -> (FrameWriter<T>, FrameReader<T>) {
    let shared = Arc::new(Shared {
        slots: slots.map(UnsafeCell::new),
        front: AtomicUsize::new(0),
        has_new: AtomicBool::new(false),
        leased: AtomicUsize::new(NO_LEASE),
        published: AtomicU64::new(0),
    });
    (
        FrameWriter {
            shared: Arc::clone(&shared),
        },
        FrameReader { shared },
    )
}

impl<T: Send> FrameWriter<T> {
    /// Fill the back slot via `fill`, then publish it as the new front and
    /// raise the new-frame flag. Returning `false` from `fill` abandons
    /// the frame without publishing.
    ///
    /// Never blocks: if the consumer currently leases the back slot the
    /// frame is dropped and `SkippedLeased` is returned.
    pub fn publish_with(&mut self, fill: impl FnOnce(&mut T) -> bool) -> WriteOutcome {
        let shared = &*self.shared;
        let write = 1 - shared.front.load(Ordering::SeqCst);
        if shared.leased.load(Ordering::SeqCst) == write {
            return WriteOutcome::SkippedLeased;
        }

        // SAFETY: `write` is not the front slot, and the lease check above
        // (together with the consumer's post-lease front re-check) ensures
        // the consumer is not reading it. This writer is the only producer,
        // and `&mut self` makes this call exclusive.
        let slot = unsafe { &mut *shared.slots[write].get() };
        if !fill(slot) {
            return WriteOutcome::Abandoned;
        }

        shared.front.store(write, Ordering::SeqCst);
        shared.published.fetch_add(1, Ordering::Relaxed);
        shared.has_new.store(true, Ordering::Release);
        WriteOutcome::Published
    }

    /// Frames published so far.
    pub fn published(&self) -> u64 {
        self.shared.published.load(Ordering::Relaxed)
    }
}

impl<T: Send> FrameReader<T> {
    /// Whether a frame has been published since the last `latest()` call.
    /// Does not clear the flag.
    pub fn has_new_frame(&self) -> bool {
        self.shared.has_new.load(Ordering::Acquire)
    }

    /// Frames published so far.
    pub fn published(&self) -> u64 {
        self.shared.published.load(Ordering::Relaxed)
    }

    /// Lease the most recent complete frame and clear the new-frame flag.
    ///
    /// Returns `None` when nothing has been published yet, when another
    /// lease is still outstanding, or (rarely) when a publish races the
    /// lease on every bounded retry; the caller simply polls again.
    pub fn latest(&self) -> Option<SlotLease<'_, T>> {
        let shared = &*self.shared;
        if shared.published.load(Ordering::Acquire) == 0 {
            return None;
        }

        // Two attempts: one retry absorbs a publish that lands between
        // reading `front` and pinning the lease.
        for _ in 0..2 {
            let front = shared.front.load(Ordering::SeqCst);
            if shared
                .leased
                .compare_exchange(NO_LEASE, front, Ordering::SeqCst, Ordering::SeqCst)
                .is_err()
            {
                return None;
            }
            if shared.front.load(Ordering::SeqCst) == front {
                shared.has_new.store(false, Ordering::Release);
                return Some(SlotLease {
                    shared,
                    slot: front,
                });
            }
            // The producer republished while we pinned a stale front;
            // release and try once more.
            shared.leased.store(NO_LEASE, Ordering::SeqCst);
        }
        None
    }
}

/// Scoped read access to one buffered frame. Releasing the lease (drop)
/// returns the slot to the producer's rotation.
pub struct SlotLease<'a, T> {
    shared: &'a Shared<T>,
    slot: usize,
}

impl<T> Deref for SlotLease<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: while `leased == self.slot` the producer skips writes to
        // this slot, and only one lease can exist at a time.
        unsafe { &*self.shared.slots[self.slot].get() }
    }
}

impl<T> Drop for SlotLease<'_, T> {
    fn drop(&mut self) {
        self.shared.leased.store(NO_LEASE, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn fill_bytes(value: u8) -> impl FnOnce(&mut Vec<u8>) -> bool {
        move |slot: &mut Vec<u8>| {
            slot.clear();
            slot.resize(256, value);
            true
        }
    }

    #[test]
    fn nothing_readable_before_first_publish() {
        let (_writer, reader) = double_buffer([0u32, 0u32]);
        assert!(!reader.has_new_frame());
        assert!(reader.latest().is_none());
    }

    #[test]
    fn publish_then_read_round_trip() {
        let (mut writer, reader) = double_buffer([Vec::new(), Vec::new()]);

        assert_eq!(writer.publish_with(fill_bytes(42)), WriteOutcome::Published);
        assert!(reader.has_new_frame());

        let lease = reader.latest().expect("frame available");
        assert!(lease.iter().all(|&b| b == 42));
        drop(lease);

        // Taking the frame cleared the flag; the frame stays readable.
        assert!(!reader.has_new_frame());
        assert!(reader.latest().is_some());
    }

    #[test]
    fn unpolled_frames_are_dropped_last_writer_wins() {
        let (mut writer, reader) = double_buffer([Vec::new(), Vec::new()]);

        for n in 1..=17u8 {
            assert_eq!(writer.publish_with(fill_bytes(n)), WriteOutcome::Published);
        }

        let lease = reader.latest().expect("frame available");
        assert!(lease.iter().all(|&b| b == 17));
        assert_eq!(reader.published(), 17);
    }

    #[test]
    fn abandoned_fill_publishes_nothing() {
        let (mut writer, reader) = double_buffer([0u32, 0u32]);
        assert_eq!(
            writer.publish_with(|_slot| false),
            WriteOutcome::Abandoned
        );
        assert!(!reader.has_new_frame());
        assert!(reader.latest().is_none());
    }

    #[test]
    fn second_lease_is_refused_while_first_is_held() {
        let (mut writer, reader) = double_buffer([0u32, 0u32]);
        writer.publish_with(|slot| {
            *slot = 1;
            true
        });

        let first = reader.latest().expect("frame available");
        assert!(reader.latest().is_none());
        drop(first);
        assert!(reader.latest().is_some());
    }

    #[test]
    fn producer_skips_slot_leased_by_consumer() {
        let (mut writer, reader) = double_buffer([0u32, 0u32]);
        writer.publish_with(|slot| {
            *slot = 1;
            true
        });

        let lease = reader.latest().expect("frame available");
        assert_eq!(*lease, 1);

        // Slot 1 is free: this publish succeeds.
        assert_eq!(
            writer.publish_with(|slot| {
                *slot = 2;
                true
            }),
            WriteOutcome::Published
        );
        // The next write slot is the leased one: dropped, never blocked.
        assert_eq!(
            writer.publish_with(|slot| {
                *slot = 3;
                true
            }),
            WriteOutcome::SkippedLeased
        );
        // The held lease still sees its original, untouched frame.
        assert_eq!(*lease, 1);
        drop(lease);

        let lease = reader.latest().expect("frame available");
        assert_eq!(*lease, 2);
    }

    #[test]
    fn concurrent_producer_never_yields_torn_frames() {
        let (mut writer, reader) = double_buffer([vec![0u8; 1024], vec![0u8; 1024]]);

        let producer = thread::spawn(move || {
            for n in 0..20_000u32 {
                let value = (n % 251) as u8;
                writer.publish_with(|slot: &mut Vec<u8>| {
                    slot.clear();
                    slot.resize(1024, value);
                    true
                });
            }
        });

        let mut observed = 0u32;
        while observed < 5_000 {
            if let Some(lease) = reader.latest() {
                let first = lease[0];
                assert!(
                    lease.iter().all(|&b| b == first),
                    "torn frame observed: first byte {first}, mixed content"
                );
                observed += 1;
            }
            if reader.published() >= 20_000 {
                break;
            }
        }

        producer.join().unwrap();

        // Drained after the producer finished: the last frame is intact.
        let lease = reader.latest().expect("final frame");
        let first = lease[0];
        assert!(lease.iter().all(|&b| b == first));
    }
}
