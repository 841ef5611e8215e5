//! Shared work structures for the load threads
//!
//! `WorkQueue` is the unbounded FIFO of filesystem entries still to be
//! processed. It grows while it drains: a worker that dequeues a directory
//! pushes the directory's children back onto it. `PendingWrites` is the
//! bounded buffer of outstanding write acknowledgments that throttles
//! submission once the sink falls behind.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};
use std::time::Duration;

use anyhow::Result;
use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError, TrySendError};

use crate::sink::WriteHandle;

/// Upper bound on outstanding writes regardless of worker count.
const MAX_IN_FLIGHT: usize = 4096;

/// Sizes the in-flight write buffer from the worker budget.
pub fn in_flight_capacity(workers: usize) -> usize {
    (workers * 1000).clamp(1, MAX_IN_FLIGHT)
}

struct QueueState<T> {
    items: VecDeque<T>,
    /// Items taken but not yet completed. While this is non-zero an empty
    /// queue may still grow, so takers wait instead of giving up.
    in_flight: usize,
}

/// Thread-safe unbounded FIFO with producer-drain termination.
///
/// `take` returns `None` only once the queue is empty and no taken item is
/// still being processed; every successful `take` must be paired with a
/// `complete` call.
pub struct WorkQueue<T> {
    state: Mutex<QueueState<T>>,
    available: Condvar,
}

impl<T> WorkQueue<T> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                items: VecDeque::new(),
                in_flight: 0,
            }),
            available: Condvar::new(),
        }
    }

    pub fn put(&self, item: T) {
        let mut state = self.state.lock().unwrap();
        state.items.push_back(item);
        self.available.notify_one();
    }

    /// Blocks while the queue is momentarily empty but another worker may
    /// still expand a directory into it.
    pub fn take(&self) -> Option<T> {
        let mut state = self.state.lock().unwrap();
        loop {
            if let Some(item) = state.items.pop_front() {
                state.in_flight += 1;
                return Some(item);
            }
            if state.in_flight == 0 {
                self.available.notify_all();
                return None;
            }
            state = self.available.wait(state).unwrap();
        }
    }

    /// Marks the most recently taken item of the calling worker as done.
    pub fn complete(&self) {
        let mut state = self.state.lock().unwrap();
        state.in_flight = state.in_flight.saturating_sub(1);
        if state.in_flight == 0 && state.items.is_empty() {
            self.available.notify_all();
        }
    }

    pub fn len(&self) -> usize {
        self.state.lock().unwrap().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Default for WorkQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Bounded FIFO of outstanding write handles, shared by all workers.
///
/// Admission control: `offer` never blocks; once the buffer holds its
/// capacity of unresolved handles, `admit` resolves the oldest handle
/// before retrying, so at most `capacity` writes are ever in flight.
pub struct PendingWrites {
    tx: Sender<WriteHandle>,
    rx: Receiver<WriteHandle>,
}

impl PendingWrites {
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, rx) = bounded(capacity);
        Self { tx, rx }
    }

    /// Non-blocking enqueue; hands the handle back when the buffer is full.
    pub fn offer(&self, handle: WriteHandle) -> Result<(), WriteHandle> {
        self.tx.try_send(handle).map_err(|err| match err {
            TrySendError::Full(handle) | TrySendError::Disconnected(handle) => handle,
        })
    }

    /// Dequeues the oldest outstanding handle, if any.
    pub fn poll(&self) -> Option<WriteHandle> {
        match self.rx.try_recv() {
            Ok(handle) => Some(handle),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Enqueues `handle`, resolving older writes while the buffer is full.
    /// A failed or timed-out older write surfaces here as this worker's
    /// error.
    pub fn admit(&self, handle: WriteHandle, ack_timeout: Duration) -> Result<()> {
        let mut handle = handle;
        loop {
            match self.offer(handle) {
                Ok(()) => return Ok(()),
                Err(returned) => {
                    handle = returned;
                    if let Some(oldest) = self.poll() {
                        oldest.resolve(ack_timeout)?;
                    }
                }
            }
        }
    }
}
