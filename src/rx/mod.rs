//! Receive side: ingestion ring, table-driven dispatch and timeout supervision.
//!
//! The driver pushes every received frame; the application polls. A poll
//! first scans the registration table for entries whose expected frame has
//! not been seen for `timeout` ticks, then drains the ring oldest-first and
//! hands each frame to the first entry matching its identifier, length and
//! addressing mode, or to the unregistered-frame handler.
//!
//! Pushing and polling can share one context through [`RxInstance`], or be
//! separated with [`RxInstance::split`]: the [`RxPusher`] moves to the
//! interrupt or receive task, the [`RxPoller`] stays in the main loop.
use embedded_can::Id;

#[cfg(feature = "embassy")]
use embassy_sync::{blocking_mutex::raw::CriticalSectionRawMutex, signal::Signal};

use crate::bus::{BusId, Dispatch, PushStats, Slot};
use crate::error::{EntryError, FrameError, PushError};
use crate::frame::{make_id, CanFrame, IdMode, RxFrame, MAX_DATA_LEN};
use crate::ring::{Consumer, FrameRing, Producer};
use crate::tick::{Tick, TickSource};

/// Default number of ring slots (31 frames in flight).
pub const DEFAULT_RX_CAPACITY: usize = 32;

/// Per-entry parser: decodes a matching frame into application state.
pub type RxParser<'a, T> = dyn FnMut(BusId, &RxFrame<T>, Slot) + 'a;
/// Receives every frame no table entry matched.
pub type UnregisteredHandler<'a, T> = dyn FnMut(BusId, &RxFrame<T>) + 'a;
/// Told which slot has gone silent; fires again every `timeout` ticks.
pub type TimeoutHandler<'a> = dyn FnMut(BusId, Slot) + 'a;

//==================================================================================RX_ENTRY
/// One row of the RX registration table.
pub struct RxEntry<'a, T: Tick> {
    slot: Slot,
    id: Id,
    len: u8,
    timeout: T,
    last_seen: T,
    parser: &'a mut RxParser<'a, T>,
}

impl<'a, T: Tick> RxEntry<'a, T> {
    /// Register frames with identifier `id` and exactly `len` payload bytes.
    ///
    /// A `timeout` of zero disables supervision for this entry.
    pub fn new(
        slot: Slot,
        id: impl Into<Id>,
        len: usize,
        timeout: T,
        parser: &'a mut RxParser<'a, T>,
    ) -> Result<Self, EntryError> {
        if len > MAX_DATA_LEN {
            return Err(EntryError::InvalidFrame {
                slot,
                cause: FrameError::InvalidLength { len },
            });
        }
        Ok(Self {
            slot,
            id: id.into(),
            len: len as u8,
            timeout,
            last_seen: T::ZERO,
            parser,
        })
    }

    /// Same as [`RxEntry::new`] from a raw identifier and addressing mode.
    pub fn from_raw(
        slot: Slot,
        raw_id: u32,
        mode: IdMode,
        len: usize,
        timeout: T,
        parser: &'a mut RxParser<'a, T>,
    ) -> Result<Self, EntryError> {
        let id = make_id(raw_id, mode).map_err(|cause| EntryError::InvalidFrame { slot, cause })?;
        Self::new(slot, id, len, timeout, parser)
    }

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

    pub fn timeout(&self) -> T {
        self.timeout
    }

    /// Tick of the last matching frame or of the last timeout notification.
    pub fn last_seen(&self) -> T {
        self.last_seen
    }

    /// Identifier, length and addressing mode must all agree.
    #[inline]
    fn matches(&self, frame: &CanFrame) -> bool {
        self.id == frame.id() && self.len() == frame.len()
    }
}

/// Work done by one [`RxPoller::poll`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RxPollReport {
    /// Timeout notifications raised during the supervision scan.
    pub timeouts: usize,
    /// Frames handed to a table parser.
    pub dispatched: usize,
    /// Frames routed to the unregistered path.
    pub unregistered: usize,
}

//==================================================================================RX_INSTANCE
/// RX instance owning its ring storage and borrowing its registration table.
pub struct RxInstance<'a, K: TickSource, const N: usize = DEFAULT_RX_CAPACITY> {
    bus: BusId,
    ticks: K,
    ring: FrameRing<RxFrame<K::Tick>, N>,
    stats: PushStats,
    table: &'a mut [RxEntry<'a, K::Tick>],
    unregistered: Option<&'a mut UnregisteredHandler<'a, K::Tick>>,
    on_timeout: Option<&'a mut TimeoutHandler<'a>>,
}

impl<'a, K: TickSource, const N: usize> RxInstance<'a, K, N> {
    /// Bind a tick source and a registration table. No allocation takes place.
    pub fn new(bus: BusId, ticks: K, table: &'a mut [RxEntry<'a, K::Tick>]) -> Self {
        Self {
            bus,
            ticks,
            ring: FrameRing::new(RxFrame::new(CanFrame::EMPTY, <K::Tick as Tick>::ZERO)),
            stats: PushStats::new(),
            table,
            unregistered: None,
            on_timeout: None,
        }
    }

    pub fn with_unregistered_handler(
        mut self,
        handler: &'a mut UnregisteredHandler<'a, K::Tick>,
    ) -> Self {
        self.unregistered = Some(handler);
        self
    }

    pub fn with_timeout_handler(mut self, handler: &'a mut TimeoutHandler<'a>) -> Self {
        self.on_timeout = Some(handler);
        self
    }

    pub fn bus(&self) -> BusId {
        self.bus
    }

    pub fn table(&self) -> &[RxEntry<'a, K::Tick>] {
        self.table
    }

    /// Frames waiting for the next poll.
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

    /// Queue a received frame, stamped with the current tick.
    pub fn push(&mut self, id: impl Into<Id>, data: &[u8]) -> Result<(), PushError> {
        self.split().0.push(id, data)
    }

    /// Queue a frame from raw driver fields.
    pub fn push_raw(
        &mut self,
        raw_id: u32,
        mode: IdMode,
        data: &[u8],
        len: usize,
    ) -> Result<(), PushError> {
        self.split().0.push_raw(raw_id, mode, data, len)
    }

    /// Queue any `embedded_can` frame.
    pub fn push_frame<F: embedded_can::Frame>(&mut self, frame: &F) -> Result<(), PushError> {
        self.split().0.push_frame(frame)
    }

    /// Run timeout supervision, then drain and dispatch every queued frame.
    pub fn poll(&mut self) -> RxPollReport {
        self.split().1.poll()
    }

    /// Separate the producer side from the consumer side.
    pub fn split(&mut self) -> (RxPusher<'_, K, N>, RxPoller<'_, 'a, K, N>) {
        let (producer, consumer) = self.ring.split();
        let pusher = RxPusher {
            bus: self.bus,
            producer,
            ticks: &self.ticks,
            stats: &self.stats,
            #[cfg(feature = "embassy")]
            doorbell: None,
        };
        let poller = RxPoller {
            bus: self.bus,
            consumer,
            ticks: &self.ticks,
            table: &mut *self.table,
            unregistered: &mut self.unregistered,
            on_timeout: &mut self.on_timeout,
        };
        (pusher, poller)
    }
}

//==================================================================================RX_PUSHER
/// Producer half: call from the context where frames arrive.
pub struct RxPusher<'r, K: TickSource, const N: usize> {
    bus: BusId,
    producer: Producer<'r, RxFrame<K::Tick>, N>,
    ticks: &'r K,
    stats: &'r PushStats,
    #[cfg(feature = "embassy")]
    doorbell: Option<&'r Signal<CriticalSectionRawMutex, ()>>,
}

impl<'r, K: TickSource, const N: usize> RxPusher<'r, K, N> {
    /// Raise `doorbell` after every queued frame, to wake an async poller.
    #[cfg(feature = "embassy")]
    pub fn with_doorbell(mut self, doorbell: &'r Signal<CriticalSectionRawMutex, ()>) -> Self {
        self.doorbell = Some(doorbell);
        self
    }

    /// Queue a received frame, stamped with the current tick.
    ///
    /// A full ring keeps its oldest frames and drops this one, counting it in
    /// [`PushStats::dropped`]. The `Err` is informational: an interrupt handler
    /// may ignore it.
    pub fn push(&mut self, id: impl Into<Id>, data: &[u8]) -> Result<(), PushError> {
        self.enqueue(CanFrame::new(id, data))
    }

    /// `data` must hold at least `len` bytes; `len` above eight is refused.
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

    pub fn bus(&self) -> BusId {
        self.bus
    }

    pub fn stats(&self) -> &PushStats {
        self.stats
    }

    fn enqueue(&mut self, frame: Result<CanFrame, FrameError>) -> Result<(), PushError> {
        let frame = frame.inspect_err(|_err| {
            self.stats.record_rejected();
            #[cfg(feature = "defmt")]
            defmt::warn!("RX bus {}: frame rejected: {}", self.bus, _err);
        })?;

        let stamped = RxFrame::new(frame, self.ticks.now());
        if self.producer.push(stamped).is_err() {
            self.stats.record_dropped();
            #[cfg(feature = "defmt")]
            defmt::trace!("RX bus {}: ring full, frame dropped", self.bus);
            return Err(PushError::BufferFull);
        }

        #[cfg(feature = "embassy")]
        if let Some(doorbell) = self.doorbell {
            doorbell.signal(());
        }
        Ok(())
    }
}

//==================================================================================RX_POLLER
/// Consumer half: owns dispatch and the per-entry timestamps.
pub struct RxPoller<'r, 'a, K: TickSource, const N: usize> {
    bus: BusId,
    consumer: Consumer<'r, RxFrame<K::Tick>, N>,
    ticks: &'r K,
    table: &'r mut [RxEntry<'a, K::Tick>],
    unregistered: &'r mut Option<&'a mut UnregisteredHandler<'a, K::Tick>>,
    on_timeout: &'r mut Option<&'a mut TimeoutHandler<'a>>,
}

impl<'a, K: TickSource, const N: usize> RxPoller<'_, 'a, K, N> {
    pub fn bus(&self) -> BusId {
        self.bus
    }

    pub fn pending(&self) -> usize {
        self.consumer.len()
    }

    pub fn table(&self) -> &[RxEntry<'a, K::Tick>] {
        self.table
    }

    /// Timeout scan followed by a full drain of the ring.
    pub fn poll(&mut self) -> RxPollReport {
        let mut report = RxPollReport {
            timeouts: self.check_timeouts(),
            ..RxPollReport::default()
        };

        while let Some(frame) = self.consumer.pop() {
            match self.dispatch(&frame) {
                Dispatch::Registered(_) => report.dispatched += 1,
                Dispatch::Unregistered => report.unregistered += 1,
            }
        }
        report
    }

    /// Notify every supervised entry that has been silent for its timeout,
    /// and restart its clock from now.
    fn check_timeouts(&mut self) -> usize {
        let now = self.ticks.now();
        let mut fired = 0;
        for entry in self.table.iter_mut() {
            let supervised = entry.timeout != <K::Tick as Tick>::ZERO;
            if !supervised || !now.has_elapsed(entry.last_seen, entry.timeout) {
                continue;
            }
            entry.last_seen = now;
            fired += 1;

            #[cfg(feature = "defmt")]
            defmt::debug!("RX bus {}: slot {} timed out", self.bus, entry.slot);

            if let Some(handler) = self.on_timeout.as_mut() {
                handler(self.bus, entry.slot);
            }
        }
        fired
    }

    fn dispatch(&mut self, frame: &RxFrame<K::Tick>) -> Dispatch {
        if let Some(entry) = self.table.iter_mut().find(|e| e.matches(&frame.frame)) {
            (entry.parser)(self.bus, frame, entry.slot);
            entry.last_seen = frame.timestamp;
            return Dispatch::Registered(entry.slot);
        }

        #[cfg(feature = "defmt")]
        defmt::trace!(
            "RX bus {}: unregistered id {=u32:#x} len {}",
            self.bus,
            frame.raw_id(),
            frame.len()
        );

        if let Some(handler) = self.unregistered.as_mut() {
            handler(self.bus, frame);
        }
        Dispatch::Unregistered
    }
}
