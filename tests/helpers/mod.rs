/// Test doubles standing in for a CAN peripheral and its timer during
/// integration tests.
use embedded_can::{ExtendedId, Frame, Id, StandardId};
use korri_can::{BusId, BusState, TxFrame};
use std::cell::{Cell, RefCell};
use std::sync::atomic::{AtomicU32, Ordering};

#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(dead_code)]
/// Frame type of an imaginary HAL, used to check the `embedded_can` entry points.
pub struct DriverFrame {
    id: Id,
    dlc: usize,
    data: [u8; 8],
}

impl Frame for DriverFrame {
    fn new(id: impl Into<Id>, data: &[u8]) -> Option<Self> {
        if data.len() > 8 {
            return None;
        }
        let mut buf = [0u8; 8];
        buf[..data.len()].copy_from_slice(data);
        Some(Self {
            id: id.into(),
            dlc: data.len(),
            data: buf,
        })
    }

    fn new_remote(_id: impl Into<Id>, _dlc: usize) -> Option<Self> {
        None
    }

    fn is_extended(&self) -> bool {
        matches!(self.id, Id::Extended(_))
    }

    fn is_remote_frame(&self) -> bool {
        false
    }

    fn id(&self) -> Id {
        self.id
    }

    fn dlc(&self) -> usize {
        self.dlc
    }

    fn data(&self) -> &[u8] {
        &self.data[..self.dlc]
    }
}

#[allow(dead_code)]
pub fn std_id(raw: u16) -> StandardId {
    StandardId::new(raw).expect("test ids fit in 11 bits")
}

#[allow(dead_code)]
pub fn ext_id(raw: u32) -> ExtendedId {
    ExtendedId::new(raw).expect("test ids fit in 29 bits")
}

#[derive(Default)]
#[allow(dead_code)]
/// Millisecond counter advanced by hand, like a SysTick the test controls.
pub struct MockClock {
    millis: AtomicU32,
}

#[allow(dead_code)]
impl MockClock {
    pub const fn new() -> Self {
        Self {
            millis: AtomicU32::new(0),
        }
    }

    pub fn counter(&self) -> &AtomicU32 {
        &self.millis
    }

    pub fn now(&self) -> u32 {
        self.millis.load(Ordering::Relaxed)
    }

    pub fn advance(&self, millis: u32) {
        self.millis.fetch_add(millis, Ordering::Relaxed);
    }
}

#[derive(Default)]
#[allow(dead_code)]
/// Controller stand-in: records transmitted frames and reports bus state.
pub struct MockController {
    pub sent: RefCell<Vec<(BusId, TxFrame)>>,
    pub busy: Cell<bool>,
}

#[allow(dead_code)]
impl MockController {
    pub fn transmit(&self, bus: BusId, frame: &TxFrame) {
        self.sent.borrow_mut().push((bus, *frame));
    }

    pub fn state(&self, _bus: BusId) -> BusState {
        BusState::from(!self.busy.get())
    }

    /// Raw identifiers of everything transmitted so far.
    pub fn sent_ids(&self) -> Vec<u32> {
        self.sent.borrow().iter().map(|(_, f)| f.raw_id()).collect()
    }
}
