//! Small value types shared by the RX and TX sides: instance identity, table
//! slots, bus state, and the per-instance push counters.
use core::sync::atomic::{AtomicU32, Ordering};

/// Application-defined index of a logical message, independent of its table position.
pub type Slot = u16;

/// Identity of one RX or TX instance, handed to every callback so that a
/// single handler can serve several buses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BusId(pub u8);

/// Answer of the bus-free predicate polled before every transmission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusState {
    Busy,
    Free,
}

impl From<bool> for BusState {
    fn from(free: bool) -> Self {
        if free {
            BusState::Free
        } else {
            BusState::Busy
        }
    }
}

/// Outcome of matching one received frame against the registration table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Dispatch {
    /// An entry with the same identifier, length and addressing mode consumed it.
    Registered(Slot),
    /// Routed to the unregistered-frame handler (if any).
    Unregistered,
}

/// Counters written by the single producer of an instance.
///
/// Increments are a plain load/store pair: the producer is the only writer,
/// and this keeps the counters usable on cores without atomic RMW.
#[derive(Debug, Default)]
pub struct PushStats {
    dropped: AtomicU32,
    rejected: AtomicU32,
}

impl PushStats {
    pub const fn new() -> Self {
        Self {
            dropped: AtomicU32::new(0),
            rejected: AtomicU32::new(0),
        }
    }

    /// Frames lost because the ring was full.
    pub fn dropped(&self) -> u32 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Frames refused because their fields were invalid.
    pub fn rejected(&self) -> u32 {
        self.rejected.load(Ordering::Relaxed)
    }

    pub(crate) fn record_dropped(&self) {
        bump(&self.dropped);
    }

    pub(crate) fn record_rejected(&self) {
        bump(&self.rejected);
    }
}

#[inline]
fn bump(counter: &AtomicU32) {
    let value = counter.load(Ordering::Relaxed);
    counter.store(value.wrapping_add(1), Ordering::Relaxed);
}
