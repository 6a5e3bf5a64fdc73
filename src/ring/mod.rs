//! Fixed-capacity single-producer/single-consumer frame ring.
//!
//! `head` is the index of the last written slot and `tail` the index of the
//! last consumed one; both wrap modulo `N`. The ring is empty when
//! `head == tail` and full when advancing `head` would land on `tail`, so at
//! most `N - 1` frames are held at once. A push into a full ring drops the
//! new frame and leaves the stored ones untouched.
//!
//! Storage is a plain array: no allocation, and the whole ring can live in a
//! `static`. The indices are atomics so that [`FrameRing::split`] can hand a
//! [`Producer`] to an interrupt or receive task while the [`Consumer`] stays
//! in the polling loop.
use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicUsize, Ordering};

//==================================================================================RING
pub struct FrameRing<F, const N: usize> {
    slots: UnsafeCell<[F; N]>,
    head: AtomicUsize,
    tail: AtomicUsize,
}

// SAFETY: a slot is written only by the producer before `head` is published
// with Release, and read only by the consumer after observing `head` with
// Acquire; the reverse handshake on `tail` keeps the producer off slots the
// consumer has not released yet. `Producer`/`Consumer` are unique handles, so
// at most one context plays each role.
unsafe impl<F: Send, const N: usize> Sync for FrameRing<F, N> {}

impl<F: Copy, const N: usize> FrameRing<F, N> {
    const VALID_CAPACITY: () = assert!(N >= 2, "a frame ring needs at least two slots");

    /// Maximum number of frames held simultaneously.
    pub const CAPACITY: usize = N - 1;

    /// Create an empty ring whose slots are pre-filled with `fill`.
    pub const fn new(fill: F) -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::VALID_CAPACITY;
        Self {
            slots: UnsafeCell::new([fill; N]),
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
        }
    }

    #[inline]
    const fn bump(index: usize) -> usize {
        let next = index + 1;
        if next >= N {
            0
        } else {
            next
        }
    }

    /// Enqueue a frame, handing it back if the ring is full.
    pub fn push(&mut self, frame: F) -> Result<(), F> {
        // SAFETY: `&mut self` excludes any other producer or consumer.
        unsafe { self.push_shared(frame) }
    }

    /// Dequeue the oldest frame.
    pub fn pop(&mut self) -> Option<F> {
        // SAFETY: `&mut self` excludes any other producer or consumer.
        unsafe { self.pop_shared() }
    }

    /// Number of frames currently stored.
    pub fn len(&self) -> usize {
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Acquire);
        (head + N - tail) % N
    }

    pub fn is_empty(&self) -> bool {
        self.head.load(Ordering::Acquire) == self.tail.load(Ordering::Acquire)
    }

    pub fn is_full(&self) -> bool {
        self.len() == Self::CAPACITY
    }

    /// Current `(head, tail)` indices.
    pub fn indices(&self) -> (usize, usize) {
        (
            self.head.load(Ordering::Acquire),
            self.tail.load(Ordering::Acquire),
        )
    }

    /// Split into a producer and a consumer handle.
    pub fn split(&mut self) -> (Producer<'_, F, N>, Consumer<'_, F, N>) {
        let ring: &Self = self;
        (Producer { ring }, Consumer { ring })
    }

    /// # Safety
    ///
    /// Only one context may act as producer at a time.
    unsafe fn push_shared(&self, frame: F) -> Result<(), F> {
        let head = self.head.load(Ordering::Relaxed);
        let next = Self::bump(head);
        if next == self.tail.load(Ordering::Acquire) {
            return Err(frame);
        }
        // SAFETY: `next` is in bounds and not yet visible to the consumer,
        // which never reads past `head`.
        unsafe {
            self.slots.get().cast::<F>().add(next).write(frame);
        }
        self.head.store(next, Ordering::Release);
        Ok(())
    }

    /// # Safety
    ///
    /// Only one context may act as consumer at a time.
    unsafe fn pop_shared(&self) -> Option<F> {
        let tail = self.tail.load(Ordering::Relaxed);
        if tail == self.head.load(Ordering::Acquire) {
            return None;
        }
        let next = Self::bump(tail);
        // SAFETY: `next` was published by the producer through `head` and
        // will not be rewritten before `tail` moves past it.
        let frame = unsafe { self.slots.get().cast::<F>().add(next).read() };
        self.tail.store(next, Ordering::Release);
        Some(frame)
    }
}

//==================================================================================HANDLES
/// Push-only half of a split ring.
pub struct Producer<'a, F, const N: usize> {
    ring: &'a FrameRing<F, N>,
}

impl<F: Copy, const N: usize> Producer<'_, F, N> {
    pub fn push(&mut self, frame: F) -> Result<(), F> {
        // SAFETY: this handle is the only producer of the split ring.
        unsafe { self.ring.push_shared(frame) }
    }

    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.ring.is_full()
    }
}

/// Pop-only half of a split ring.
pub struct Consumer<'a, F, const N: usize> {
    ring: &'a FrameRing<F, N>,
}

impl<F: Copy, const N: usize> Consumer<'_, F, N> {
    pub fn pop(&mut self) -> Option<F> {
        // SAFETY: this handle is the only consumer of the split ring.
        unsafe { self.ring.pop_shared() }
    }

    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }
}
