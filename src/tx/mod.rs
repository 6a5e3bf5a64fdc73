//! Transmit side: egress ring, periodic generation from the TX table and
//! bus-gated flushing.
//!
//! Each poll runs two bounded phases. Generation walks the table and, for
//! every entry whose period has elapsed, copies the entry's payload into a
//! scratch buffer, lets the optional transform rewrite it (counters,
//! checksums, live values) and queues the result. Flush then hands queued
//! frames to the send function, oldest first, re-checking the bus-free
//! predicate before each one and stopping at the first busy answer.
//!
//! Generation is itself a producer of the egress ring, so ad hoc pushes must
//! come from the polling context; the TX instance is not split.
use core::cell::Cell;

use embedded_can::Id;

use crate::bus::{BusId, BusState, PushStats, Slot};
use crate::error::{EntryError, FrameError, PollError, PushError};
use crate::frame::{make_id, CanFrame, IdMode, Payload, TxFrame, MAX_DATA_LEN};
use crate::ring::FrameRing;
use crate::tick::{Tick, TickSource};

/// Default number of ring slots (31 frames in flight).
pub const DEFAULT_TX_CAPACITY: usize = 32;

/// Per-entry hook run on the scratch copy of the payload before it is queued.
pub type TxTransform<'a, T> = dyn FnMut(BusId, &mut Payload, &TxSchedule<T>) + 'a;
/// Hands one frame to the hardware. Failures are the driver's business.
pub type SendFunction<'a> = dyn FnMut(BusId, &TxFrame) + 'a;
/// Reports whether the controller can accept another frame right now.
pub type BusCheck<'a> = dyn FnMut(BusId) -> BusState + 'a;

//==================================================================================TX_ENTRY
/// Static description and send clock of one periodic message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxSchedule<T> {
    slot: Slot,
    id: Id,
    len: u8,
    period: T,
    last_sent: T,
}

impl<T: Tick> TxSchedule<T> {
    pub fn slot(&self) -> Slot {
        self.slot
    }

    pub fn id(&self) -> Id {
        self.id
    }

    pub fn mode(&self) -> IdMode {
        IdMode::of(&self.id)
    }

    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Send period; zero means "every poll".
    pub fn period(&self) -> T {
        self.period
    }

    pub fn last_sent(&self) -> T {
        self.last_sent
    }

    /// Tick at which the entry becomes due again.
    pub fn next_due(&self) -> T {
        self.last_sent.advanced_by(self.period)
    }
}

/// One row of the TX registration table.
///
/// The payload bytes stay owned by the application: they are read through
/// `Cell`s at generation time, so the application can keep updating them
/// while the table is bound to an instance.
pub struct TxEntry<'a, T: Tick> {
    schedule: TxSchedule<T>,
    data: &'a [Cell<u8>],
    transform: Option<&'a mut TxTransform<'a, T>>,
}

impl<'a, T: Tick> TxEntry<'a, T> {
    /// Periodic message sending the first `len` bytes of `data` every `period` ticks.
    pub fn new(
        slot: Slot,
        id: impl Into<Id>,
        data: &'a [Cell<u8>],
        len: usize,
        period: T,
    ) -> Result<Self, EntryError> {
        if len > MAX_DATA_LEN {
            return Err(EntryError::InvalidFrame {
                slot,
                cause: FrameError::InvalidLength { len },
            });
        }
        if data.len() < len {
            return Err(EntryError::PayloadTooSmall {
                slot,
                need: len,
                got: data.len(),
            });
        }
        Ok(Self {
            schedule: TxSchedule {
                slot,
                id: id.into(),
                len: len as u8,
                period,
                last_sent: T::ZERO,
            },
            data,
            transform: None,
        })
    }

    /// Same as [`TxEntry::new`] from a raw identifier and addressing mode.
    pub fn from_raw(
        slot: Slot,
        raw_id: u32,
        mode: IdMode,
        data: &'a [Cell<u8>],
        len: usize,
        period: T,
    ) -> Result<Self, EntryError> {
        let id = make_id(raw_id, mode).map_err(|cause| EntryError::InvalidFrame { slot, cause })?;
        Self::new(slot, id, data, len, period)
    }

    /// Attach a payload transform.
    pub fn with_transform(mut self, transform: &'a mut TxTransform<'a, T>) -> Self {
        self.transform = Some(transform);
        self
    }

    pub fn schedule(&self) -> &TxSchedule<T> {
        &self.schedule
    }

    /// Snapshot of the application-owned bytes.
    fn read_payload(&self) -> Payload {
        let mut bytes = [0u8; MAX_DATA_LEN];
        for (dst, src) in bytes[..self.schedule.len()].iter_mut().zip(self.data) {
            *dst = src.get();
        }
        Payload::from_validated(bytes, self.schedule.len)
    }
}

/// Work done by one [`TxInstance::poll`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TxPollReport {
    /// Table entries that came due and were queued.
    pub generated: usize,
    /// Frames handed to the send function.
    pub sent: usize,
}

//==================================================================================TX_INSTANCE
/// TX instance owning its egress ring and borrowing its table and driver hooks.
pub struct TxInstance<'a, K: TickSource, const N: usize = DEFAULT_TX_CAPACITY> {
    bus: BusId,
    ticks: K,
    ring: FrameRing<TxFrame, N>,
    stats: PushStats,
    table: &'a mut [TxEntry<'a, K::Tick>],
    send: Option<&'a mut SendFunction<'a>>,
    bus_free: &'a mut BusCheck<'a>,
}

impl<'a, K: TickSource, const N: usize> TxInstance<'a, K, N> {
    /// Bind the table and the mandatory bus-free predicate.
    ///
    /// The send function may be attached later, but must be present before a
    /// poll finds something to flush.
    pub fn new(
        bus: BusId,
        ticks: K,
        table: &'a mut [TxEntry<'a, K::Tick>],
        bus_free: &'a mut BusCheck<'a>,
    ) -> Self {
        Self {
            bus,
            ticks,
            ring: FrameRing::new(CanFrame::EMPTY),
            stats: PushStats::new(),
            table,
            send: None,
            bus_free,
        }
    }

    pub fn with_send_function(mut self, send: &'a mut SendFunction<'a>) -> Self {
        self.send = Some(send);
        self
    }

    pub fn set_send_function(&mut self, send: &'a mut SendFunction<'a>) {
        self.send = Some(send);
    }

    pub fn bus(&self) -> BusId {
        self.bus
    }

    pub fn table(&self) -> &[TxEntry<'a, K::Tick>] {
        self.table
    }

    /// Frames waiting for a free bus.
    pub fn pending(&self) -> usize {
        self.ring.len()
    }

    pub fn stats(&self) -> &PushStats {
        &self.stats
    }

    /// Ring `(head, tail)` indices.
    pub fn indices(&self) -> (usize, usize) {
        self.ring.indices()
    }

    /// Queue an ad hoc frame outside the table mechanism.
    ///
    /// On a full ring the frame is dropped and counted, and the queued ones
    /// are kept; `Err(PushError::BufferFull)` reports it.
    pub fn push(&mut self, id: impl Into<Id>, data: &[u8]) -> Result<(), PushError> {
        self.enqueue(CanFrame::new(id, data))
    }

    /// Queue an ad hoc frame from raw fields.
    pub fn push_raw(
        &mut self,
        raw_id: u32,
        mode: IdMode,
        data: &[u8],
        len: usize,
    ) -> Result<(), PushError> {
        self.enqueue(CanFrame::from_raw(raw_id, mode, data, len))
    }

    pub fn push_frame<F: embedded_can::Frame>(&mut self, frame: &F) -> Result<(), PushError> {
        self.enqueue(CanFrame::from_frame(frame))
    }

    /// Generate due table messages, then flush while the bus is free.
    pub fn poll(&mut self) -> Result<TxPollReport, PollError> {
        let generated = self.generate();
        let sent = self.flush()?;
        Ok(TxPollReport { generated, sent })
    }

    fn generate(&mut self) -> usize {
        let now = self.ticks.now();
        let mut generated = 0;
        for entry in self.table.iter_mut() {
            if !now.has_elapsed(entry.schedule.last_sent, entry.schedule.period) {
                continue;
            }
            entry.schedule.last_sent = now;

            let mut scratch = entry.read_payload();
            if let Some(transform) = entry.transform.as_mut() {
                transform(self.bus, &mut scratch, &entry.schedule);
            }

            let frame = CanFrame::from_payload(entry.schedule.id, scratch);
            if self.ring.push(frame).is_err() {
                self.stats.record_dropped();
                #[cfg(feature = "defmt")]
                defmt::trace!(
                    "TX bus {}: ring full, slot {} dropped",
                    self.bus,
                    entry.schedule.slot
                );
                continue;
            }
            generated += 1;
        }
        generated
    }

    fn flush(&mut self) -> Result<usize, PollError> {
        let mut sent = 0;
        while !self.ring.is_empty() && (self.bus_free)(self.bus) == BusState::Free {
            let Some(send) = self.send.as_mut() else {
                #[cfg(feature = "defmt")]
                defmt::warn!("TX bus {}: no send function attached", self.bus);
                return Err(PollError::MissingSendFunction);
            };
            let Some(frame) = self.ring.pop() else {
                break;
            };
            send(self.bus, &frame);
            sent += 1;
        }
        Ok(sent)
    }

    fn enqueue(&mut self, frame: Result<CanFrame, FrameError>) -> Result<(), PushError> {
        let frame = frame.inspect_err(|_err| {
            self.stats.record_rejected();
            #[cfg(feature = "defmt")]
            defmt::warn!("TX bus {}: frame rejected: {}", self.bus, _err);
        })?;

        self.ring.push(frame).map_err(|_| {
            self.stats.record_dropped();
            PushError::BufferFull
        })
    }
}

//==================================================================================TESTS
#[cfg(test)]
#[path = "tests.rs"]
mod tests;
