//! Async poll loops for firmware built on embassy.
//!
//! The dispatch core never blocks and leaves the poll cadence to the
//! application. These helpers are that cadence for the common case: poll on
//! a fixed [`Ticker`] period, and on the RX side also as soon as the
//! [`RxPusher`](crate::rx::RxPusher) rings the doorbell.
//!
//! ```rust,ignore
//! static DOORBELL: Signal<CriticalSectionRawMutex, ()> = Signal::new();
//!
//! let (pusher, mut poller) = rx.split();
//! let pusher = pusher.with_doorbell(&DOORBELL);
//! // hand `pusher` to the CAN RX interrupt, then:
//! run_rx(&mut poller, Duration::from_millis(10), Some(&DOORBELL)).await;
//! ```
use embassy_sync::{blocking_mutex::raw::CriticalSectionRawMutex, signal::Signal};
use embassy_time::{Duration, Ticker};
use futures_util::{future::select, pin_mut};

use crate::error::PollError;
use crate::rx::RxPoller;
use crate::tick::TickSource;
use crate::tx::TxInstance;

/// Poll the RX side every `period`, and early whenever `doorbell` is raised.
///
/// Never returns.
pub async fn run_rx<K: TickSource, const N: usize>(
    poller: &mut RxPoller<'_, '_, K, N>,
    period: Duration,
    doorbell: Option<&Signal<CriticalSectionRawMutex, ()>>,
) {
    let mut ticker = Ticker::every(period);
    loop {
        let _report = poller.poll();
        #[cfg(feature = "defmt")]
        defmt::trace!("RX bus {}: {}", poller.bus(), _report);

        match doorbell {
            Some(doorbell) => {
                let tick = ticker.next();
                let ring = doorbell.wait();
                pin_mut!(tick);
                pin_mut!(ring);
                select(tick, ring).await;
            }
            None => ticker.next().await,
        }
    }
}

/// Poll the TX side every `period`.
///
/// Only returns when a poll reports a setup error.
pub async fn run_tx<K: TickSource, const N: usize>(
    tx: &mut TxInstance<'_, K, N>,
    period: Duration,
) -> PollError {
    let mut ticker = Ticker::every(period);
    loop {
        match tx.poll() {
            Ok(_report) => {
                #[cfg(feature = "defmt")]
                defmt::trace!("TX bus {}: {}", tx.bus(), _report);
            }
            Err(err) => return err,
        }
        ticker.next().await;
    }
}
