//! Board pin mapping for the expansion-bus card (shared)
//!
//! Logical line roles map onto concrete line numbers here. The defaults match the
//! reference card: data lane on lines 12-19, select on 23, read direction on 36, wait on
//! 27, interrupt on 25 and the push button on 22.

use crate::hardware_traits::LineError;
use crate::lines::{Level, LineMask, line_bit};
use serde::{Deserialize, Serialize};

/// Lines addressable through a [`LineMask`].
pub const MAX_LINES: u8 = 64;

/// Width of the data lane in lines.
pub const DATA_WIDTH: u8 = 8;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PinMap {
    /// First of eight contiguous data lines; DATA[n] is line `data_base + n`.
    #[serde(default = "default_data_base")]
    pub data_base: u8,
    #[serde(default = "default_select")]
    pub select: u8,
    #[serde(default = "default_read_dir")]
    pub read_dir: u8,
    #[serde(default = "default_wait")]
    pub wait: u8,
    #[serde(default = "default_interrupt")]
    pub interrupt: u8,
    #[serde(default = "default_button")]
    pub button: u8,
    /// When set, a low READ_DIR level means the host reads. Boards wiring an active-low
    /// RD_N strobe need this.
    #[serde(default)]
    pub read_dir_active_low: bool,
    /// Idle level of the interrupt line. The reference card holds it low.
    #[serde(default)]
    pub interrupt_idle_high: bool,
}

impl Default for PinMap {
    fn default() -> Self {
        Self {
            data_base: default_data_base(),
            select: default_select(),
            read_dir: default_read_dir(),
            wait: default_wait(),
            interrupt: default_interrupt(),
            button: default_button(),
            read_dir_active_low: false,
            interrupt_idle_high: false,
        }
    }
}

impl PinMap {
    /// Checks that every line exists, the data lane fits and no two roles share a line.
    pub fn validate(&self) -> Result<(), LineError> {
        if self.data_base > MAX_LINES - DATA_WIDTH {
            return Err(LineError::InvalidPinMap(format!(
                "data lane starting at line {} does not fit in {} lines",
                self.data_base, MAX_LINES
            )));
        }
        let singles = [
            ("select", self.select),
            ("read_dir", self.read_dir),
            ("wait", self.wait),
            ("interrupt", self.interrupt),
            ("button", self.button),
        ];
        let mut used = self.data_mask();
        for (role, line) in singles {
            if line >= MAX_LINES {
                return Err(LineError::InvalidPinMap(format!(
                    "{} line {} is out of range",
                    role, line
                )));
            }
            if used & line_bit(line) != 0 {
                return Err(LineError::InvalidPinMap(format!(
                    "{} line {} is already assigned",
                    role, line
                )));
            }
            used |= line_bit(line);
        }
        Ok(())
    }

    #[inline(always)]
    pub const fn data_mask(&self) -> LineMask {
        0xff << self.data_base
    }

    #[inline(always)]
    pub const fn select_mask(&self) -> LineMask {
        line_bit(self.select)
    }

    #[inline(always)]
    pub const fn read_dir_mask(&self) -> LineMask {
        line_bit(self.read_dir)
    }

    #[inline(always)]
    pub const fn wait_mask(&self) -> LineMask {
        line_bit(self.wait)
    }

    #[inline(always)]
    pub const fn interrupt_mask(&self) -> LineMask {
        line_bit(self.interrupt)
    }

    #[inline(always)]
    pub const fn button_mask(&self) -> LineMask {
        line_bit(self.button)
    }

    /// Byte present on the data lane in `snapshot`.
    #[inline(always)]
    pub const fn data_byte(&self, snapshot: LineMask) -> u8 {
        (snapshot >> self.data_base) as u8
    }

    /// Line bits that put `byte` on the data lane.
    #[inline(always)]
    pub const fn data_bits(&self, byte: u8) -> LineMask {
        (byte as LineMask) << self.data_base
    }

    /// Select is active-low.
    #[inline(always)]
    pub const fn is_selected(&self, snapshot: LineMask) -> bool {
        snapshot & self.select_mask() == 0
    }

    /// Whether READ_DIR in `snapshot` says the host is reading from the card.
    #[inline(always)]
    pub const fn host_reads(&self, snapshot: LineMask) -> bool {
        let high = snapshot & self.read_dir_mask() != 0;
        high != self.read_dir_active_low
    }

    /// READ_DIR level a host drives for a read (`true`) or write (`false`) cycle.
    pub const fn read_dir_level(&self, host_reads: bool) -> Level {
        Level::from_bool(host_reads != self.read_dir_active_low)
    }

    pub const fn interrupt_idle_level(&self) -> Level {
        Level::from_bool(self.interrupt_idle_high)
    }
}

fn default_data_base() -> u8 { 12 }
fn default_select() -> u8 { 23 }
fn default_read_dir() -> u8 { 36 }
fn default_wait() -> u8 { 27 }
fn default_interrupt() -> u8 { 25 }
fn default_button() -> u8 { 22 }
