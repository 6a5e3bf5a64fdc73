//! In-memory representation of classic CAN frames as they cross the RX and
//! TX rings.
//!
//! Identifiers reuse [`embedded_can::Id`], so the 11-bit/29-bit range is
//! enforced by construction. Raw `(id, mode)` pairs coming from a peripheral
//! register dump are validated through [`make_id`].
use embedded_can::{ExtendedId, Id, StandardId};

use crate::error::FrameError;

/// Classic CAN payload capacity.
pub const MAX_DATA_LEN: usize = 8;

//==================================================================================ID_MODE
/// Addressing mode of a CAN identifier (IDE flag).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IdMode {
    /// 11-bit base identifier.
    Standard,
    /// 29-bit extended identifier.
    Extended,
}

impl IdMode {
    /// Addressing mode of an existing identifier.
    pub const fn of(id: &Id) -> Self {
        match id {
            Id::Standard(_) => IdMode::Standard,
            Id::Extended(_) => IdMode::Extended,
        }
    }

    /// Largest raw identifier allowed in this mode.
    pub fn max_raw(self) -> u32 {
        match self {
            IdMode::Standard => StandardId::MAX.as_raw() as u32,
            IdMode::Extended => ExtendedId::MAX.as_raw(),
        }
    }
}

/// Build an identifier from its raw value and addressing mode.
pub fn make_id(raw: u32, mode: IdMode) -> Result<Id, FrameError> {
    let id = match mode {
        IdMode::Standard => u16::try_from(raw)
            .ok()
            .and_then(StandardId::new)
            .map(Id::Standard),
        IdMode::Extended => ExtendedId::new(raw).map(Id::Extended),
    };
    id.ok_or(FrameError::InvalidId { raw, mode })
}

/// Raw numeric value of an identifier, regardless of its mode.
pub fn raw_id(id: &Id) -> u32 {
    match id {
        Id::Standard(id) => id.as_raw() as u32,
        Id::Extended(id) => id.as_raw(),
    }
}

//==================================================================================PAYLOAD
/// Up to eight payload bytes plus the number of valid ones.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Payload {
    bytes: [u8; MAX_DATA_LEN],
    len: u8,
}

impl Default for Payload {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl Payload {
    pub const EMPTY: Self = Self {
        bytes: [0; MAX_DATA_LEN],
        len: 0,
    };

    /// Copy `data` into a payload; fails above eight bytes.
    pub fn new(data: &[u8]) -> Result<Self, FrameError> {
        Self::with_len(data, data.len())
    }

    /// Copy the first `len` bytes of `data`.
    ///
    /// Mirrors the peripheral view where the DLC and the data registers are
    /// read separately: `len` must be a classic CAN length and `data` must
    /// hold at least that many bytes.
    pub fn with_len(data: &[u8], len: usize) -> Result<Self, FrameError> {
        if len > MAX_DATA_LEN {
            return Err(FrameError::InvalidLength { len });
        }
        if data.len() < len {
            return Err(FrameError::ShortData {
                declared: len,
                available: data.len(),
            });
        }
        let mut bytes = [0u8; MAX_DATA_LEN];
        bytes[..len].copy_from_slice(&data[..len]);
        Ok(Self {
            bytes,
            len: len as u8,
        })
    }

    /// Wrap a full buffer whose first `len` bytes are valid.
    ///
    /// `len` must already be a classic CAN length.
    pub(crate) const fn from_validated(bytes: [u8; MAX_DATA_LEN], len: u8) -> Self {
        debug_assert!(len as usize <= MAX_DATA_LEN);
        Self { bytes, len }
    }

    /// Number of valid bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.len as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Immutable view over the valid bytes.
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes[..self.len as usize]
    }

    /// Mutable view over the valid bytes.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.bytes[..self.len as usize]
    }
}

//==================================================================================CAN_FRAME
/// Raw classic CAN data frame, as queued for transmission.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CanFrame {
    id: Id,
    payload: Payload,
}

/// Frames leaving through the TX ring carry no extra metadata.
pub type TxFrame = CanFrame;

impl CanFrame {
    /// Placeholder used to pre-fill ring storage.
    pub const EMPTY: Self = Self {
        id: Id::Standard(StandardId::ZERO),
        payload: Payload::EMPTY,
    };

    /// Build a frame from an identifier and up to eight bytes.
    pub fn new(id: impl Into<Id>, data: &[u8]) -> Result<Self, FrameError> {
        Ok(Self {
            id: id.into(),
            payload: Payload::new(data)?,
        })
    }

    /// Build a frame from the raw fields a CAN driver hands over.
    pub fn from_raw(raw: u32, mode: IdMode, data: &[u8], len: usize) -> Result<Self, FrameError> {
        Ok(Self {
            id: make_id(raw, mode)?,
            payload: Payload::with_len(data, len)?,
        })
    }

    /// Build a frame from an identifier and an already validated payload.
    pub const fn from_payload(id: Id, payload: Payload) -> Self {
        Self { id, payload }
    }

    /// Copy any `embedded_can` frame (e.g. one just read from a HAL driver).
    pub fn from_frame<F: embedded_can::Frame>(frame: &F) -> Result<Self, FrameError> {
        Self::new(frame.id(), frame.data())
    }

    #[inline]
    pub fn id(&self) -> Id {
        self.id
    }

    /// Raw identifier value.
    #[inline]
    pub fn raw_id(&self) -> u32 {
        raw_id(&self.id)
    }

    #[inline]
    pub fn mode(&self) -> IdMode {
        IdMode::of(&self.id)
    }

    /// Number of valid payload bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    #[inline]
    pub fn data(&self) -> &[u8] {
        self.payload.as_slice()
    }

    #[inline]
    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// Convert into a driver-specific frame type.
    pub fn to_frame<F: embedded_can::Frame>(&self) -> Option<F> {
        F::new(self.id, self.data())
    }
}

impl embedded_can::Frame for CanFrame {
    fn new(id: impl Into<Id>, data: &[u8]) -> Option<Self> {
        CanFrame::new(id, data).ok()
    }

    /// Remote frames are not part of the dispatch model.
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
        self.payload.len()
    }

    fn data(&self) -> &[u8] {
        self.payload.as_slice()
    }
}

//==================================================================================RX_FRAME
/// Received frame stamped with the tick at which it was pushed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RxFrame<T> {
    /// Frame as delivered by the driver.
    pub frame: CanFrame,
    /// Receipt timestamp.
    pub timestamp: T,
}

impl<T: Copy> RxFrame<T> {
    pub const fn new(frame: CanFrame, timestamp: T) -> Self {
        Self { frame, timestamp }
    }

    #[inline]
    pub fn id(&self) -> Id {
        self.frame.id()
    }

    #[inline]
    pub fn raw_id(&self) -> u32 {
        self.frame.raw_id()
    }

    #[inline]
    pub fn mode(&self) -> IdMode {
        self.frame.mode()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.frame.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.frame.is_empty()
    }

    #[inline]
    pub fn data(&self) -> &[u8] {
        self.frame.data()
    }
}
