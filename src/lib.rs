//! `korri-can` library: a table-driven CAN dispatch core for `no_std`
//! firmware. An RX instance buffers received frames, routes them to
//! per-message parsers by identifier, length and addressing mode, and
//! supervises each registered message with a recurring timeout. A TX instance
//! generates periodic messages from a table, lets a hook rewrite each payload,
//! and flushes its queue only while the bus reports itself free.
//!
//! Nothing is allocated: rings live inside the instances, tables and
//! callbacks are borrowed from the application.
#![no_std]
//==================================================================================
/// Instance identity, table slots, bus state and push counters.
pub mod bus;
/// Frame validation, buffer and setup errors.
pub mod error;
/// Classic CAN frame representation and identifier helpers.
pub mod frame;
/// Fixed-capacity single-producer/single-consumer frame ring.
pub mod ring;
/// Receive side: ingestion, dispatch and timeout supervision.
pub mod rx;
/// Monotonic tick abstraction and the bundled tick sources.
pub mod tick;
/// Transmit side: scheduled generation and bus-gated flushing.
pub mod tx;
/// Async poll loops on top of embassy.
#[cfg(feature = "embassy")]
pub mod runner;
//==================================================================================
pub use bus::{BusId, BusState, Slot};
pub use error::{EntryError, FrameError, PollError, PushError};
pub use frame::{CanFrame, IdMode, Payload, RxFrame, TxFrame};
pub use rx::{RxEntry, RxInstance};
pub use tick::{Tick, TickSource};
pub use tx::{TxEntry, TxInstance};
