//! Monotonic time abstraction used by timeout supervision and scheduled
//! transmission.
//!
//! Every RX/TX instance owns its own [`TickSource`]; there is no process-wide
//! tick registration. The width of the tick counter is chosen through the
//! [`Tick`] implementation (`u8`, `u16`, `u32` or `u64`), and every comparison
//! the dispatch core performs is of the form `now - last >= span` evaluated
//! with wrapping subtraction, so counter rollover is harmless as long as a
//! span never exceeds [`Tick::MAX`].
use core::fmt::Debug;
use core::marker::PhantomData;
use core::sync::atomic::{AtomicU16, AtomicU32, AtomicU8, Ordering};

#[cfg(target_has_atomic = "64")]
use core::sync::atomic::AtomicU64;

//==================================================================================TICK
/// Unsigned counter width used for timestamps, timeouts and send periods.
pub trait Tick: Copy + Eq + Ord + Debug {
    /// Initial timestamp of every table entry.
    const ZERO: Self;
    /// Largest representable span (maximum usable timeout or period).
    const MAX: Self;

    /// Ticks elapsed from `earlier` to `self`, modulo the counter width.
    fn elapsed_since(self, earlier: Self) -> Self;

    /// Tick `span` ticks after `self`, modulo the counter width.
    fn advanced_by(self, span: Self) -> Self;

    /// `true` once at least `span` ticks have passed since `since`.
    #[inline]
    fn has_elapsed(self, since: Self, span: Self) -> bool {
        self.elapsed_since(since) >= span
    }
}

macro_rules! impl_tick {
    ($($ty:ty),*) => {
        $(
            impl Tick for $ty {
                const ZERO: Self = 0;
                const MAX: Self = <$ty>::MAX;

                #[inline]
                fn elapsed_since(self, earlier: Self) -> Self {
                    self.wrapping_sub(earlier)
                }

                #[inline]
                fn advanced_by(self, span: Self) -> Self {
                    self.wrapping_add(span)
                }
            }
        )*
    };
}

impl_tick!(u8, u16, u32, u64);

//==================================================================================TICK_SOURCE
/// Provider of the current tick value.
///
/// Implementations must be monotonic (modulo wraparound). `now` may be called
/// from both the producer context (RX receipt timestamps) and the consumer
/// context, so sources shared across contexts should be `Sync`.
pub trait TickSource {
    type Tick: Tick;
    /// Current tick value.
    fn now(&self) -> Self::Tick;
}

impl<S: TickSource + ?Sized> TickSource for &S {
    type Tick = S::Tick;

    #[inline]
    fn now(&self) -> Self::Tick {
        (**self).now()
    }
}

/// Tick source backed by a zero-argument function or closure.
///
/// ```
/// use korri_can::tick::{FnTick, TickSource};
///
/// fn hal_millis() -> u32 {
///     1234
/// }
///
/// let ticks = FnTick::new(hal_millis);
/// assert_eq!(ticks.now(), 1234);
/// ```
pub struct FnTick<F, T> {
    func: F,
    _tick: PhantomData<fn() -> T>,
}

impl<F, T> FnTick<F, T>
where
    F: Fn() -> T,
    T: Tick,
{
    pub const fn new(func: F) -> Self {
        Self {
            func,
            _tick: PhantomData,
        }
    }
}

impl<F, T> TickSource for FnTick<F, T>
where
    F: Fn() -> T,
    T: Tick,
{
    type Tick = T;

    #[inline]
    fn now(&self) -> T {
        (self.func)()
    }
}

//==================================================================================COUNTER
/// Atomic integer that can be read as a tick counter.
pub trait AtomicCounter {
    type Tick: Tick;
    fn read(&self) -> Self::Tick;
}

macro_rules! impl_atomic_counter {
    ($($atomic:ty => $ty:ty),*) => {
        $(
            impl AtomicCounter for $atomic {
                type Tick = $ty;

                #[inline]
                fn read(&self) -> $ty {
                    self.load(Ordering::Relaxed)
                }
            }
        )*
    };
}

impl_atomic_counter!(AtomicU8 => u8, AtomicU16 => u16, AtomicU32 => u32);

#[cfg(target_has_atomic = "64")]
impl_atomic_counter!(AtomicU64 => u64);

/// Tick source reading a counter that something else increments, typically a
/// SysTick or timer interrupt.
///
/// ```
/// use core::sync::atomic::{AtomicU32, Ordering};
/// use korri_can::tick::{CounterTick, TickSource};
///
/// static SYSTICK: AtomicU32 = AtomicU32::new(0);
///
/// let ticks = CounterTick::new(&SYSTICK);
/// SYSTICK.fetch_add(5, Ordering::Relaxed);
/// assert_eq!(ticks.now(), 5);
/// ```
pub struct CounterTick<'a, A: AtomicCounter> {
    counter: &'a A,
}

impl<'a, A: AtomicCounter> CounterTick<'a, A> {
    pub const fn new(counter: &'a A) -> Self {
        Self { counter }
    }
}

impl<A: AtomicCounter> TickSource for CounterTick<'_, A> {
    type Tick = A::Tick;

    #[inline]
    fn now(&self) -> Self::Tick {
        self.counter.read()
    }
}

//==================================================================================EMBASSY
/// Tick source reading the embassy time driver, in raw driver ticks.
///
/// Periods and timeouts are then expressed in driver ticks; use
/// [`EmbassyTick::ticks_from_millis`] to convert.
#[cfg(feature = "embassy")]
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbassyTick;

#[cfg(feature = "embassy")]
impl EmbassyTick {
    /// Convert a millisecond span into embassy driver ticks.
    pub fn ticks_from_millis(millis: u64) -> u64 {
        embassy_time::Duration::from_millis(millis).as_ticks()
    }
}

#[cfg(feature = "embassy")]
impl TickSource for EmbassyTick {
    type Tick = u64;

    #[inline]
    fn now(&self) -> u64 {
        embassy_time::Instant::now().as_ticks()
    }
}
