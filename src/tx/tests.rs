//! TX tests: schedule grid, payload transforms, bus gating and setup errors.
use super::*;
use crate::tick::FnTick;
use core::cell::RefCell;

extern crate std;
use std::vec::Vec;

fn std_id(raw: u16) -> embedded_can::StandardId {
    embedded_can::StandardId::new(raw).expect("test ids fit in 11 bits")
}

#[test]
/// Period 100 polled at 0, 50, 100, 150 queues exactly one frame, at 100.
fn test_schedule_grid() {
    let clock = Cell::new(0u32);
    let sent = RefCell::new(Vec::new());
    let data: [Cell<u8>; 8] = Default::default();
    let mut send = |_bus: BusId, frame: &TxFrame| sent.borrow_mut().push((frame.raw_id(), clock.get()));
    let mut bus_free = |_bus: BusId| BusState::Free;
    let mut table = [TxEntry::new(1, std_id(0x100), &data, 8, 100u32).unwrap()];
    let mut tx: TxInstance<_, 8> =
        TxInstance::new(BusId(0), FnTick::new(|| clock.get()), &mut table, &mut bus_free)
            .with_send_function(&mut send);

    let mut generated = 0;
    for now in [0u32, 50, 100, 150] {
        clock.set(now);
        generated += tx.poll().unwrap().generated;
    }
    assert_eq!(generated, 1);
    assert_eq!(sent.borrow().as_slice(), &[(0x100, 100)]);
    assert_eq!(tx.table()[0].schedule().last_sent(), 100);
    assert_eq!(tx.table()[0].schedule().next_due(), 200);

    for now in [199u32, 200, 250, 300] {
        clock.set(now);
        tx.poll().unwrap();
    }
    assert_eq!(sent.borrow().as_slice(), &[(0x100, 100), (0x100, 200), (0x100, 300)]);
}

#[test]
/// A zero period is due on every poll.
fn test_zero_period_every_poll() {
    let clock = Cell::new(0u16);
    let count = Cell::new(0usize);
    let data: [Cell<u8>; 2] = Default::default();
    let mut send = |_bus: BusId, _frame: &TxFrame| count.set(count.get() + 1);
    let mut bus_free = |_bus: BusId| BusState::Free;
    let mut table = [TxEntry::new(0, std_id(0x1), &data, 2, 0u16).unwrap()];
    let mut tx: TxInstance<_, 4> =
        TxInstance::new(BusId(0), FnTick::new(|| clock.get()), &mut table, &mut bus_free)
            .with_send_function(&mut send);

    for _ in 0..5 {
        assert_eq!(tx.poll().unwrap(), TxPollReport { generated: 1, sent: 1 });
    }
    assert_eq!(count.get(), 5);
}

#[test]
/// The transform edits a scratch copy; the application buffer is untouched.
fn test_transform_rewrites_scratch_copy() {
    let clock = Cell::new(0u32);
    let sent = RefCell::new(Vec::new());
    let data: [Cell<u8>; 4] = [Cell::new(0x10), Cell::new(0x20), Cell::new(0x30), Cell::new(0)];
    let rolling = Cell::new(0u8);
    let mut send = |_bus: BusId, frame: &TxFrame| sent.borrow_mut().push(*frame);
    let mut bus_free = |_bus: BusId| BusState::Free;
    let mut add_counter = |_bus: BusId, payload: &mut Payload, schedule: &TxSchedule<u32>| {
        assert_eq!(schedule.slot(), 9);
        let bytes = payload.as_mut_slice();
        bytes[3] = rolling.get();
        rolling.set(rolling.get().wrapping_add(1));
        bytes[0] ^= 0xFF;
    };
    let mut table = [TxEntry::new(9, std_id(0x321), &data, 4, 10u32)
        .unwrap()
        .with_transform(&mut add_counter)];
    let mut tx: TxInstance<_, 4> =
        TxInstance::new(BusId(0), FnTick::new(|| clock.get()), &mut table, &mut bus_free)
            .with_send_function(&mut send);

    for now in [10u32, 20] {
        clock.set(now);
        tx.poll().unwrap();
    }

    let sent = sent.borrow();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].data(), &[0xEF, 0x20, 0x30, 0]);
    assert_eq!(sent[1].data(), &[0xEF, 0x20, 0x30, 1]);
    assert_eq!(data[0].get(), 0x10);
    assert_eq!(data[3].get(), 0);
}

#[test]
/// Updates the application makes to its buffer show up in the next frame.
fn test_application_updates_payload() {
    let clock = Cell::new(0u32);
    let sent = RefCell::new(Vec::new());
    let data: [Cell<u8>; 2] = Default::default();
    let mut send = |_bus: BusId, frame: &TxFrame| sent.borrow_mut().push(*frame);
    let mut bus_free = |_bus: BusId| BusState::Free;
    let mut table = [TxEntry::new(0, std_id(0x55), &data, 2, 0u32).unwrap()];
    let mut tx: TxInstance<_, 4> =
        TxInstance::new(BusId(0), FnTick::new(|| clock.get()), &mut table, &mut bus_free)
            .with_send_function(&mut send);

    tx.poll().unwrap();
    data[0].set(0xAA);
    data[1].set(0x55);
    tx.poll().unwrap();

    let sent = sent.borrow();
    assert_eq!(sent[0].data(), &[0, 0]);
    assert_eq!(sent[1].data(), &[0xAA, 0x55]);
}

#[test]
/// Nothing reaches the driver while busy; flushing resumes at the same frame.
fn test_bus_gated_flush() {
    let clock = Cell::new(0u32);
    let sent = RefCell::new(Vec::new());
    let free_budget = Cell::new(0usize);
    let mut send = |_bus: BusId, frame: &TxFrame| sent.borrow_mut().push(frame.data()[0]);
    let mut bus_free = |_bus: BusId| {
        let budget = free_budget.get();
        if budget == 0 {
            BusState::Busy
        } else {
            free_budget.set(budget - 1);
            BusState::Free
        }
    };
    let mut table: [TxEntry<'_, u32>; 0] = [];
    let mut tx: TxInstance<_, 8> =
        TxInstance::new(BusId(0), FnTick::new(|| clock.get()), &mut table, &mut bus_free)
            .with_send_function(&mut send);

    for value in 1..=5u8 {
        tx.push(std_id(0x60), &[value]).unwrap();
    }

    assert_eq!(tx.poll().unwrap().sent, 0);
    assert!(sent.borrow().is_empty());
    assert_eq!(tx.pending(), 5);

    free_budget.set(2);
    assert_eq!(tx.poll().unwrap().sent, 2);
    assert_eq!(sent.borrow().as_slice(), &[1, 2]);
    assert_eq!(tx.pending(), 3);

    free_budget.set(usize::MAX);
    assert_eq!(tx.poll().unwrap().sent, 3);
    assert_eq!(sent.borrow().as_slice(), &[1, 2, 3, 4, 5]);
    assert_eq!(tx.pending(), 0);
}

#[test]
/// Flushing without a send function is a setup error and keeps the frame queued.
fn test_missing_send_function() {
    let clock = Cell::new(0u32);
    let count = Cell::new(0usize);
    let mut send = |_bus: BusId, _frame: &TxFrame| count.set(count.get() + 1);
    let mut bus_free = |_bus: BusId| BusState::Free;
    let mut table: [TxEntry<'_, u32>; 0] = [];
    let mut tx: TxInstance<_, 4> =
        TxInstance::new(BusId(0), FnTick::new(|| clock.get()), &mut table, &mut bus_free);

    assert_eq!(tx.poll(), Ok(TxPollReport::default()));

    tx.push(std_id(0x7), &[1]).unwrap();
    assert_eq!(tx.poll(), Err(PollError::MissingSendFunction));
    assert_eq!(tx.pending(), 1);

    tx.set_send_function(&mut send);
    assert_eq!(tx.poll().unwrap().sent, 1);
    assert_eq!(count.get(), 1);
}

#[test]
/// Generated frames that do not fit in the egress ring are counted as dropped.
fn test_generation_drops_when_ring_full() {
    let clock = Cell::new(5u32);
    let data: [Cell<u8>; 1] = Default::default();
    let mut bus_free = |_bus: BusId| BusState::Busy;
    let mut table = [
        TxEntry::new(0, std_id(0x1), &data, 1, 0u32).unwrap(),
        TxEntry::new(1, std_id(0x2), &data, 1, 0u32).unwrap(),
        TxEntry::new(2, std_id(0x3), &data, 1, 0u32).unwrap(),
    ];
    let mut tx: TxInstance<_, 3> =
        TxInstance::new(BusId(0), FnTick::new(|| clock.get()), &mut table, &mut bus_free);

    let report = tx.poll().unwrap();
    assert_eq!(report.generated, 2);
    assert_eq!(tx.pending(), 2);
    assert_eq!(tx.stats().dropped(), 1);
    // The dropped entry still consumed its period.
    assert_eq!(tx.table()[2].schedule().last_sent(), 5);
}

#[test]
/// Table rows validate length and buffer size.
fn test_entry_validation() {
    let data: [Cell<u8>; 2] = Default::default();
    assert!(matches!(
        TxEntry::new(1, std_id(0x1), &data, 4, 0u32),
        Err(EntryError::PayloadTooSmall {
            slot: 1,
            need: 4,
            got: 2
        })
    ));
    assert!(matches!(
        TxEntry::new(2, std_id(0x1), &data, 9, 0u32),
        Err(EntryError::InvalidFrame { slot: 2, .. })
    ));
    let entry = TxEntry::from_raw(3, 0x1ABC_DEF0, IdMode::Extended, &data, 2, 5u32).unwrap();
    assert_eq!(entry.schedule().mode(), IdMode::Extended);
    assert_eq!(entry.schedule().period(), 5);
}

#[test]
/// Ad hoc pushes validate frames like the RX side.
fn test_push_rejects_invalid_frame() {
    let clock = Cell::new(0u32);
    let mut bus_free = |_bus: BusId| BusState::Busy;
    let mut table: [TxEntry<'_, u32>; 0] = [];
    let mut tx: TxInstance<_, 4> =
        TxInstance::new(BusId(0), FnTick::new(|| clock.get()), &mut table, &mut bus_free);

    assert_eq!(
        tx.push_raw(0x10, IdMode::Standard, &[0; 4], 12),
        Err(PushError::Frame(FrameError::InvalidLength { len: 12 }))
    );
    assert_eq!(tx.stats().rejected(), 1);

    for _ in 0..3 {
        tx.push(std_id(0x10), &[]).unwrap();
    }
    let before = tx.indices();
    assert_eq!(tx.push(std_id(0x10), &[]), Err(PushError::BufferFull));
    assert_eq!(tx.indices(), before);
}

#[test]
/// Generated frames carry the entry's declared length, not the buffer's.
fn test_generated_frame_keeps_declared_length() {
    let clock = Cell::new(0u32);
    let sent = RefCell::new(Vec::new());
    let data: [Cell<u8>; 8] = core::array::from_fn(|i| Cell::new(i as u8 + 1));
    let mut send = |_bus: BusId, frame: &TxFrame| sent.borrow_mut().push(*frame);
    let mut bus_free = |_bus: BusId| BusState::Free;
    let mut table = [
        TxEntry::new(0, std_id(0x10), &data, 3, 0u32).unwrap(),
        TxEntry::new(1, std_id(0x11), &data, 8, 0u32).unwrap(),
        TxEntry::new(2, std_id(0x12), &data, 0, 0u32).unwrap(),
    ];
    let mut tx: TxInstance<_, 4> =
        TxInstance::new(BusId(0), FnTick::new(|| clock.get()), &mut table, &mut bus_free)
            .with_send_function(&mut send);

    assert_eq!(tx.poll().unwrap().sent, 3);
    let sent = sent.borrow();
    assert_eq!(sent[0].raw_id(), 0x10);
    assert_eq!(sent[0].data(), &[1, 2, 3]);
    assert_eq!(sent[1].data(), &[1, 2, 3, 4, 5, 6, 7, 8]);
    assert_eq!(sent[2].raw_id(), 0x12);
    assert!(sent[2].is_empty());
}
