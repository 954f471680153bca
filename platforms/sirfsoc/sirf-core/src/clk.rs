//! Clock gating for SiRF peripherals.
//!
//! SiRF peripherals lose their register contents when their module clock is
//! gated, so drivers only gate the clock from their power-management hooks.
use core::fmt;

/// A gateable module clock.
///
/// Implemented by whatever owns the SoC's clock controller. The DMA driver
/// calls [`enable`](Self::enable) from its runtime-resume hook and
/// [`disable`](Self::disable) from its runtime-suspend hook.
pub trait Clock: Sync {
    /// Ungate the clock.
    fn enable(&self) -> Result<(), ClockError>;

    /// Gate the clock.
    fn disable(&self);
}

/// Errors returned by [`Clock::enable`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ClockError {
    /// The parent clock domain could not be powered up.
    ParentUnavailable,
    /// The clock did not report that it was running after being ungated.
    NotLocked,
}

impl<C: Clock + ?Sized> Clock for &'_ C {
    #[inline]
    fn enable(&self) -> Result<(), ClockError> {
        C::enable(self)
    }

    #[inline]
    fn disable(&self) {
        C::disable(self)
    }
}

impl fmt::Display for ClockError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ParentUnavailable => f.write_str("parent clock domain is unavailable"),
            Self::NotLocked => f.write_str("clock did not lock after being enabled"),
        }
    }
}
