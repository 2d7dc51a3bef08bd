// Capability interface between the bus engine and whatever owns the physical lines

use crate::lines::{Direction, LineGroupConfig, LineMask};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LineError {
    #[error("Invalid pin map: {0}")]
    InvalidPinMap(String),
    #[error("Line group '{group}' rejected: {reason}")]
    Rejected { group: &'static str, reason: String },
}

/// Raw access to the card's lines.
///
/// Implementations map these calls onto a register block (see `retrocard_mcu::gpio`) or a
/// simulated bus. Every method must complete in bounded time: the bus engine calls them
/// from inside the host's timing window.
///
/// `set_lines` and `clear_lines` have write-1-to-set / write-1-to-clear semantics: only
/// lines present in the mask change, all others keep their output level.
pub trait LineBackend {
    /// Snapshot of every line's level.
    fn read_lines(&mut self) -> LineMask;

    /// Drive every line in `mask` high.
    fn set_lines(&mut self, mask: LineMask);

    /// Drive every line in `mask` low.
    fn clear_lines(&mut self, mask: LineMask);

    /// Drive the lines in `mask` to `bits`. The one-bits are set first, then exactly the
    /// complementary bits within `mask` are cleared.
    #[inline(always)]
    fn drive_lines(&mut self, mask: LineMask, bits: LineMask) {
        self.set_lines(bits & mask);
        self.clear_lines(!bits & mask);
    }

    /// Enable or disable output drive on every line in `mask`.
    fn set_direction(&mut self, mask: LineMask, direction: Direction);

    /// Apply the startup electrical configuration for one line group.
    fn configure(&mut self, group: &LineGroupConfig) -> Result<(), LineError>;
}

impl<B: LineBackend + ?Sized> LineBackend for &mut B {
    #[inline(always)]
    fn read_lines(&mut self) -> LineMask {
        (**self).read_lines()
    }

    #[inline(always)]
    fn set_lines(&mut self, mask: LineMask) {
        (**self).set_lines(mask)
    }

    #[inline(always)]
    fn clear_lines(&mut self, mask: LineMask) {
        (**self).clear_lines(mask)
    }

    #[inline(always)]
    fn drive_lines(&mut self, mask: LineMask, bits: LineMask) {
        (**self).drive_lines(mask, bits)
    }

    #[inline(always)]
    fn set_direction(&mut self, mask: LineMask, direction: Direction) {
        (**self).set_direction(mask, direction)
    }

    fn configure(&mut self, group: &LineGroupConfig) -> Result<(), LineError> {
        (**self).configure(group)
    }
}
