//! Register-mapped line backend for the reference microcontroller's GPIO block.
//!
//! The block exposes write-1-to-set / write-1-to-clear registers for both the output
//! latch and the output-enable mask, split into a low bank (lines 0-31) and a high bank
//! (lines 32-39). Input levels are read from two input registers. Lines 34-39 are
//! input-only and have no internal pulls.

use core::ptr::{self, NonNull};

use retrocard_shared::{Direction, LineBackend, LineError, LineGroupConfig, LineMask, LineMode, Pull};

/// Physical base address of the GPIO register block.
pub const GPIO_BASE: usize = 0x3ff4_4000;

/// Number of GPIO lines on the chip.
pub const LINE_COUNT: u8 = 40;

/// Lines that cannot drive and have no pull resistors.
pub const INPUT_ONLY_LINES: LineMask = 0x3f << 34;

const VALID_LINES: LineMask = (1 << LINE_COUNT) - 1;

/// Register layout starting at [`GPIO_BASE`].
#[repr(C)]
#[derive(Debug, Default)]
pub struct GpioRegisters {
    pub bt_select: u32,
    pub out: u32,
    pub out_w1ts: u32,
    pub out_w1tc: u32,
    pub out1: u32,
    pub out1_w1ts: u32,
    pub out1_w1tc: u32,
    pub sdio_select: u32,
    pub enable: u32,
    pub enable_w1ts: u32,
    pub enable_w1tc: u32,
    pub enable1: u32,
    pub enable1_w1ts: u32,
    pub enable1_w1tc: u32,
    pub strap: u32,
    pub input: u32,
    pub input1: u32,
}

/// Pad-level setup (pull resistors, edge interrupts, pin mux) that lives outside the GPIO
/// block. Board support code implements this for its pad controller.
pub trait PadConfigurator {
    fn configure_pad(&mut self, line: u8, group: &LineGroupConfig) -> Result<(), LineError>;
}

/// Pads already set up by the bootloader or board bootstrap.
impl PadConfigurator for () {
    fn configure_pad(&mut self, _line: u8, _group: &LineGroupConfig) -> Result<(), LineError> {
        Ok(())
    }
}

pub struct RegisterLines<P> {
    regs: NonNull<GpioRegisters>,
    pads: P,
}

#[inline(always)]
fn split(mask: LineMask) -> (u32, u32) {
    (mask as u32, (mask >> 32) as u32)
}

impl<P: PadConfigurator> RegisterLines<P> {
    /// # Safety
    ///
    /// `regs` must point to a GPIO register block (or memory laid out like one) that stays
    /// valid for the lifetime of the backend, and nothing else may write the block's
    /// output or enable registers while the backend exists.
    pub unsafe fn new(regs: *mut GpioRegisters, pads: P) -> Option<Self> {
        NonNull::new(regs).map(|regs| Self { regs, pads })
    }

    /// Backend over the on-chip block at [`GPIO_BASE`].
    ///
    /// # Safety
    ///
    /// Only valid when running on the reference microcontroller, and only one instance
    /// may exist.
    pub unsafe fn on_chip(pads: P) -> Self {
        // SAFETY: GPIO_BASE is a non-zero constant
        let regs = unsafe { NonNull::new_unchecked(GPIO_BASE as *mut GpioRegisters) };
        Self { regs, pads }
    }

    #[inline(always)]
    fn write(&mut self, field: impl FnOnce(*mut GpioRegisters) -> *mut u32, value: u32) {
        // SAFETY: `regs` is valid for the backend's lifetime (constructor contract)
        unsafe { field(self.regs.as_ptr()).write_volatile(value) }
    }

    #[inline(always)]
    fn read(&self, field: impl FnOnce(*mut GpioRegisters) -> *mut u32) -> u32 {
        // SAFETY: see `write`
        unsafe { field(self.regs.as_ptr()).read_volatile() }
    }
}

impl<P: PadConfigurator> LineBackend for RegisterLines<P> {
    #[inline(always)]
    fn read_lines(&mut self) -> LineMask {
        let low = self.read(|r| unsafe { ptr::addr_of_mut!((*r).input) });
        let high = self.read(|r| unsafe { ptr::addr_of_mut!((*r).input1) });
        (low as LineMask | (high as LineMask) << 32) & VALID_LINES
    }

    #[inline(always)]
    fn set_lines(&mut self, mask: LineMask) {
        let (low, high) = split(mask);
        if low != 0 {
            self.write(|r| unsafe { ptr::addr_of_mut!((*r).out_w1ts) }, low);
        }
        if high != 0 {
            self.write(|r| unsafe { ptr::addr_of_mut!((*r).out1_w1ts) }, high);
        }
    }

    #[inline(always)]
    fn clear_lines(&mut self, mask: LineMask) {
        let (low, high) = split(mask);
        if low != 0 {
            self.write(|r| unsafe { ptr::addr_of_mut!((*r).out_w1tc) }, low);
        }
        if high != 0 {
            self.write(|r| unsafe { ptr::addr_of_mut!((*r).out1_w1tc) }, high);
        }
    }

    #[inline(always)]
    fn set_direction(&mut self, mask: LineMask, direction: Direction) {
        let (low, high) = split(mask);
        match direction {
            Direction::Output => {
                if low != 0 {
                    self.write(|r| unsafe { ptr::addr_of_mut!((*r).enable_w1ts) }, low);
                }
                if high != 0 {
                    self.write(|r| unsafe { ptr::addr_of_mut!((*r).enable1_w1ts) }, high);
                }
            }
            Direction::Input => {
                if low != 0 {
                    self.write(|r| unsafe { ptr::addr_of_mut!((*r).enable_w1tc) }, low);
                }
                if high != 0 {
                    self.write(|r| unsafe { ptr::addr_of_mut!((*r).enable1_w1tc) }, high);
                }
            }
        }
    }

    fn configure(&mut self, group: &LineGroupConfig) -> Result<(), LineError> {
        let reject = |reason: String| LineError::Rejected { group: group.name, reason };
        if group.mask & !VALID_LINES != 0 {
            return Err(reject(format!("mask {:#x} names lines beyond {}", group.mask, LINE_COUNT - 1)));
        }
        let input_only = group.mask & INPUT_ONLY_LINES;
        if input_only != 0 && group.mode != LineMode::Input {
            return Err(reject(format!("lines {:#x} are input-only", input_only)));
        }
        if input_only != 0 && group.pull != Pull::Floating {
            return Err(reject(format!("lines {:#x} have no pull resistors", input_only)));
        }
        for line in group.lines() {
            self.pads.configure_pad(line, group)?;
        }
        self.set_direction(group.mask, group.mode.initial_direction());
        Ok(())
    }
}
