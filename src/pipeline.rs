use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// Queue bookkeeping shared across the producer/consumer boundary. Only
/// ever touched under the pipeline mutex.
struct Queues<R> {
    free_slots: VecDeque<usize>,
    in_use_slots: VecDeque<usize>,
    resources: VecDeque<R>,
}

/// Snapshot of the pipeline's observability counters, polled by the HUD.
#[derive(Clone, Copy, Debug, Default)]
pub struct PipelineStats {
    pub frames_produced: u64,
    pub consumer_timeouts: u64,
    pub mean_produce_micros: u64,
    pub in_use_slots: usize,
    pub free_slots: usize,
}

/// A fixed pool of frame slots between one producer thread and one
/// consumer context, with a bounded FIFO resource queue feeding the
/// producer.
///
/// A slot is exactly one of free or in-use; `|free| + |in-use|` equals the
/// pool size at all times. The per-frame computation and the consumer's
/// read both run outside the mutex, so slot bookkeeping never waits on
/// them.
pub struct SlotProducerConsumer<R> {
    max_in_use_slots: usize,
    max_resource_items: usize,
    queues: Mutex<Queues<R>>,
    producer_cv: Condvar,
    consumer_cv: Condvar,
    finished: AtomicBool,
    frames_produced: AtomicU64,
    produce_micros: AtomicU64,
    consumer_timeouts: AtomicU64,
}

impl<R> SlotProducerConsumer<R> {
    pub fn new(max_in_use_slots: usize, max_resource_items: usize) -> Self {
        assert!(max_in_use_slots > 0);
        assert!(max_resource_items > 0);
        let pipeline = Self {
            max_in_use_slots,
            max_resource_items,
            queues: Mutex::new(Queues {
                free_slots: VecDeque::new(),
                in_use_slots: VecDeque::new(),
                resources: VecDeque::new(),
            }),
            producer_cv: Condvar::new(),
            consumer_cv: Condvar::new(),
            finished: AtomicBool::new(false),
            frames_produced: AtomicU64::new(0),
            produce_micros: AtomicU64::new(0),
            consumer_timeouts: AtomicU64::new(0),
        };
        pipeline.start();
        pipeline
    }

    /// Reset every queue: all slots free, no resources queued.
    pub fn start(&self) {
        let mut q = self.queues.lock().unwrap();
        q.free_slots.clear();
        q.in_use_slots.clear();
        q.resources.clear();
        q.free_slots.extend(0..self.max_in_use_slots);
        self.finished.store(false, Ordering::Release);
        self.frames_produced.store(0, Ordering::Relaxed);
        self.produce_micros.store(0, Ordering::Relaxed);
        self.consumer_timeouts.store(0, Ordering::Relaxed);
        debug_assert_eq!(
            q.free_slots.len() + q.in_use_slots.len(),
            self.max_in_use_slots
        );
    }

    /// Wake every waiter and make all subsequent waits return promptly.
    pub fn stop(&self) {
        self.finished.store(true, Ordering::Release);
        let _guard = self.queues.lock().unwrap();
        self.producer_cv.notify_all();
        self.consumer_cv.notify_all();
    }

    pub fn has_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    /// Queue one resource for the producer. Returns false, without
    /// queueing, when the input queue is already at capacity; the caller
    /// counts that as a drop.
    pub fn add_resource(&self, resource: R) -> bool {
        let mut q = self.queues.lock().unwrap();
        if q.resources.len() >= self.max_resource_items {
            return false;
        }
        q.resources.push_back(resource);
        drop(q);
        self.producer_cv.notify_all();
        true
    }

    /// One producer step: block until a resource and a free slot are both
    /// available, compute the frame outside the lock, then publish the slot
    /// to the consumer. Returns false only on shutdown; the slot becomes
    /// in-use only after `produce_item` has returned, so the consumer never
    /// sees a partial frame.
    pub fn produce<F>(&self, produce_item: F) -> bool
    where
        F: FnOnce(usize, R),
    {
        let mut q = self.queues.lock().unwrap();
        loop {
            if self.has_finished() {
                return false;
            }
            if !q.resources.is_empty() && !q.free_slots.is_empty() {
                break;
            }
            q = self.producer_cv.wait(q).unwrap();
        }

        let resource = q.resources.pop_front().unwrap();
        let slot = *q.free_slots.front().unwrap();
        drop(q);

        let started = Instant::now();
        produce_item(slot, resource);
        self.produce_micros
            .fetch_add(started.elapsed().as_micros() as u64, Ordering::Relaxed);
        self.frames_produced.fetch_add(1, Ordering::Relaxed);

        let mut q = self.queues.lock().unwrap();
        let front = q.free_slots.pop_front();
        debug_assert_eq!(front, Some(slot));
        q.in_use_slots.push_back(slot);
        debug_assert_eq!(
            q.free_slots.len() + q.in_use_slots.len(),
            self.max_in_use_slots
        );
        drop(q);
        self.consumer_cv.notify_all();
        true
    }

    /// Consumer step: wait up to `wait` for an in-use slot, then hand the
    /// oldest one to `consume_item` without removing it from the queue (its
    /// memory stays valid while the render side reads it). Returns the slot
    /// consumed, or None on timeout or shutdown. The caller must follow a
    /// successful consume with `release_after_consume`.
    pub fn consume_without_release<F>(&self, wait: Duration, consume_item: F) -> Option<usize>
    where
        F: FnOnce(usize),
    {
        let mut q = self.queues.lock().unwrap();
        if q.in_use_slots.is_empty() {
            let (guard, timeout) = self
                .consumer_cv
                .wait_timeout_while(q, wait, |q| {
                    q.in_use_slots.is_empty() && !self.has_finished()
                })
                .unwrap();
            q = guard;
            if timeout.timed_out() {
                self.consumer_timeouts.fetch_add(1, Ordering::Relaxed);
                return None;
            }
        }
        if self.has_finished() {
            return None;
        }

        debug_assert_eq!(
            q.free_slots.len() + q.in_use_slots.len(),
            self.max_in_use_slots
        );
        let slot = *q.in_use_slots.front().unwrap();
        drop(q);

        consume_item(slot);
        Some(slot)
    }

    /// Return the oldest in-use slot to the free pool once the consumer has
    /// finished reading it, and wake the producer.
    pub fn release_after_consume(&self, slot: usize) {
        let mut q = self.queues.lock().unwrap();
        debug_assert_eq!(q.in_use_slots.front().copied(), Some(slot));
        q.in_use_slots.pop_front();
        q.free_slots.push_back(slot);
        debug_assert_eq!(
            q.free_slots.len() + q.in_use_slots.len(),
            self.max_in_use_slots
        );
        drop(q);
        self.producer_cv.notify_all();
    }

    pub fn stats(&self) -> PipelineStats {
        let (in_use, free) = {
            let q = self.queues.lock().unwrap();
            (q.in_use_slots.len(), q.free_slots.len())
        };
        let frames = self.frames_produced.load(Ordering::Relaxed);
        let micros = self.produce_micros.load(Ordering::Relaxed);
        PipelineStats {
            frames_produced: frames,
            consumer_timeouts: self.consumer_timeouts.load(Ordering::Relaxed),
            mean_produce_micros: if frames == 0 { 0 } else { micros / frames },
            in_use_slots: in_use,
            free_slots: free,
        }
    }
}
