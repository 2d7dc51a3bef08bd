//! Data lane direction switching.

use retrocard_shared::{Direction, LineBackend, LineMask, PinMap};

/// Owns the drive-enable state of the eight data lines.
///
/// The lane is always switched as a whole: a partially enabled lane would let the host
/// read a byte made of some card-driven and some floating bits.
#[derive(Debug, Clone)]
pub struct DirectionController {
    data_mask: LineMask,
    direction: Direction,
}

impl DirectionController {
    /// Lanes start as inputs, matching the line configurator.
    pub fn new(pins: &PinMap) -> Self {
        Self { data_mask: pins.data_mask(), direction: Direction::Input }
    }

    /// Enable drive on all data lines. Must happen before any data bit is written.
    #[inline(always)]
    pub fn set_output<B: LineBackend + ?Sized>(&mut self, lines: &mut B) {
        lines.set_direction(self.data_mask, Direction::Output);
        self.direction = Direction::Output;
    }

    /// Release drive on all data lines.
    #[inline(always)]
    pub fn set_input<B: LineBackend + ?Sized>(&mut self, lines: &mut B) {
        lines.set_direction(self.data_mask, Direction::Input);
        self.direction = Direction::Input;
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }
}
