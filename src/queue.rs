use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use crate::frame::EthernetFrame;

pub const DEFAULT_CAPACITY: usize = 2048;

#[derive(Debug, PartialEq, Eq)]
pub enum PushError {
    Full(EthernetFrame),
    Timeout(EthernetFrame),
    Closed(EthernetFrame),
}

#[derive(Debug, PartialEq, Eq)]
pub enum PopError {
    Empty,
    Timeout,
    Closed,
}

struct Inner {
    slots: Box<[EthernetFrame]>,
    head: usize,
    tail: usize,
    empty: bool,
    full: bool,
    closed: bool,
}

/// Fixed-capacity FIFO of Ethernet frames shared between one producer
/// stage and one consumer stage. All four ring fields live under a
/// single mutex; `head == tail` means exactly one of `empty`/`full`.
pub struct FrameQueue {
    inner: Mutex<Inner>,
    not_full: Condvar,
    not_empty: Condvar,
    capacity: usize,
}

impl FrameQueue {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "queue capacity must be nonzero");

        Self {
            inner: Mutex::new(Inner {
                slots: vec![EthernetFrame::empty(); capacity].into_boxed_slice(),
                head: 0,
                tail: 0,
                empty: true,
                full: false,
                closed: false,
            }),
            not_full: Condvar::new(),
            not_empty: Condvar::new(),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        let inner = self.inner.lock().unwrap();
        if inner.full {
            self.capacity
        } else {
            (inner.head + self.capacity - inner.tail) % self.capacity
        }
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().unwrap().empty
    }

    /// Non-blocking push; fails immediately when the queue is full.
    pub fn try_push(&self, frame: EthernetFrame) -> Result<(), PushError> {
        let mut inner = self.inner.lock().unwrap();

        if inner.closed {
            return Err(PushError::Closed(frame));
        }
        if inner.full {
            return Err(PushError::Full(frame));
        }

        self.store(&mut inner, frame);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Non-blocking pop; fails immediately when the queue is empty.
    pub fn try_pop(&self) -> Result<EthernetFrame, PopError> {
        let mut inner = self.inner.lock().unwrap();

        if inner.empty {
            return if inner.closed {
                Err(PopError::Closed)
            } else {
                Err(PopError::Empty)
            };
        }

        let frame = self.take(&mut inner);
        self.not_full.notify_one();
        Ok(frame)
    }

    /// Blocking push. `None` waits indefinitely; `close` wakes every
    /// waiter, which then observes `Closed`.
    pub fn push_timeout(
        &self,
        frame: EthernetFrame,
        timeout: Option<Duration>,
    ) -> Result<(), PushError> {
        let deadline = timeout.map(|timeout| Instant::now() + timeout);
        let mut inner = self.inner.lock().unwrap();

        while inner.full && !inner.closed {
            match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(PushError::Timeout(frame));
                    }
                    inner = self.not_full.wait_timeout(inner, deadline - now).unwrap().0;
                }
                None => inner = self.not_full.wait(inner).unwrap(),
            }
        }

        if inner.closed {
            return Err(PushError::Closed(frame));
        }

        self.store(&mut inner, frame);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Blocking pop, the counterpart of `push_timeout`.
    pub fn pop_timeout(&self, timeout: Option<Duration>) -> Result<EthernetFrame, PopError> {
        let deadline = timeout.map(|timeout| Instant::now() + timeout);
        let mut inner = self.inner.lock().unwrap();

        while inner.empty && !inner.closed {
            match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(PopError::Timeout);
                    }
                    inner = self.not_empty.wait_timeout(inner, deadline - now).unwrap().0;
                }
                None => inner = self.not_empty.wait(inner).unwrap(),
            }
        }

        if inner.empty {
            return Err(PopError::Closed);
        }

        let frame = self.take(&mut inner);
        self.not_full.notify_one();
        Ok(frame)
    }

    /// Marks the queue closed and wakes every waiter. Frames already
    /// queued remain poppable; new pushes are rejected.
    pub fn close(&self) {
        self.inner.lock().unwrap().closed = true;
        self.not_full.notify_all();
        self.not_empty.notify_all();
    }

    fn store(&self, inner: &mut Inner, frame: EthernetFrame) {
        let head = inner.head;
        inner.slots[head] = frame;
        inner.head = (inner.head + 1) % self.capacity;
        inner.empty = false;
        if inner.head == inner.tail {
            inner.full = true;
        }
    }

    fn take(&self, inner: &mut Inner) -> EthernetFrame {
        let frame = inner.slots[inner.tail].clone();
        inner.tail = (inner.tail + 1) % self.capacity;
        inner.full = false;
        if inner.tail == inner.head {
            inner.empty = true;
        }
        frame
    }

    #[cfg(test)]
    fn assert_invariant(&self) {
        let inner = self.inner.lock().unwrap();
        assert!(!(inner.empty && inner.full));
        if inner.head == inner.tail {
            assert!(inner.empty ^ inner.full);
        } else {
            assert!(!inner.empty && !inner.full);
        }
    }
}
