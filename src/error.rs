//! Error definitions shared across library modules.
//! Each type models a specific failure scenario (frame validation, ring
//! capacity, table configuration, poll preconditions).
use crate::frame::IdMode;
use thiserror_no_std::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Errors that can occur while validating the fields of a classic CAN frame.
pub enum FrameError {
    /// Declared length is outside the classic CAN range (0 to 8 bytes).
    #[error("Invalid data length: {len}")]
    InvalidLength { len: usize },
    /// Raw identifier does not fit the selected addressing mode.
    #[error("Identifier {raw:#x} out of range for {mode:?} addressing")]
    InvalidId { raw: u32, mode: IdMode },
    /// Fewer payload bytes were provided than the declared length.
    #[error("Payload shorter than declared length: {declared} > {available}")]
    ShortData { declared: usize, available: usize },
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Reasons a push into an RX or TX ring did not enqueue the frame.
pub enum PushError {
    /// Ring already holds `capacity - 1` frames; the new frame was dropped.
    #[error("Ring buffer full: frame dropped")]
    BufferFull,
    /// The frame fields were rejected before reaching the ring.
    #[error(transparent)]
    Frame(#[from] FrameError),
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Errors raised while building a registration table row.
pub enum EntryError {
    /// Identifier or length of the row is not a valid CAN frame shape.
    #[error("Invalid table entry for slot {slot}: {cause}")]
    InvalidFrame { slot: u16, cause: FrameError },
    /// TX payload buffer is shorter than the declared length.
    #[error("Payload buffer too small for slot {slot}: need {need}, got {got}")]
    PayloadTooSmall { slot: u16, need: usize, got: usize },
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Setup problems detected while polling an instance.
pub enum PollError {
    /// A frame was ready to flush on a free bus but no send function is attached.
    #[error("No send function attached to TX instance")]
    MissingSendFunction,
}
