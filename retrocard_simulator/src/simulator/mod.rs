//! Simulated card lines with a scripted host on the other side of the bus.
//!
//! The host advances one step every time the card polls the lines, so every transition
//! the bus engine waits for is injected synchronously from inside `read_lines`. No threads
//! and no real time are involved: a run is fully determined by the host script and timing.

pub mod host;
pub mod trace;

use retrocard_shared::{Direction, LineBackend, LineError, LineGroupConfig, LineMask, LineMode, PinMap};

use self::host::{HostCycle, HostScript, HostState, HostTiming};
use self::trace::BusEvent;

/// Idle polls tolerated after the script ran out before the simulation gives up.
pub const DEFAULT_IDLE_POLL_LIMIT: u64 = 100_000;

#[derive(Debug)]
pub struct SimulatedLines {
    pins: PinMap,
    // card side
    enable: LineMask,
    latch: LineMask,
    configured: Vec<&'static str>,
    reject_group: Option<&'static str>,
    // host side
    script: HostScript,
    timing: HostTiming,
    state: HostState,
    selected: bool,
    host_reads: bool,
    driving: Option<u8>,
    cycle: usize,
    floating_byte: u8,
    button_pressed: bool,
    observed: Vec<u8>,
    // bookkeeping
    trace: Vec<BusEvent>,
    polls: u64,
    idle_polls_after_script: u64,
    idle_poll_limit: u64,
}

impl SimulatedLines {
    pub fn new(pins: PinMap, script: HostScript) -> Self {
        let timing = HostTiming::default();
        Self {
            pins,
            enable: 0,
            latch: 0,
            configured: Vec::new(),
            reject_group: None,
            script,
            timing,
            state: HostState::Idle { countdown: timing.idle_polls },
            selected: false,
            host_reads: false,
            driving: None,
            cycle: 0,
            floating_byte: 0xff,
            button_pressed: false,
            observed: Vec::new(),
            trace: Vec::new(),
            polls: 0,
            idle_polls_after_script: 0,
            idle_poll_limit: DEFAULT_IDLE_POLL_LIMIT,
        }
    }

    pub fn with_timing(mut self, timing: HostTiming) -> Self {
        self.timing = timing;
        self.state = HostState::Idle { countdown: timing.idle_polls };
        self
    }

    /// Level the undriven data lane reads as.
    pub fn with_floating_byte(mut self, byte: u8) -> Self {
        self.floating_byte = byte;
        self
    }

    pub fn with_idle_poll_limit(mut self, limit: u64) -> Self {
        self.idle_poll_limit = limit;
        self
    }

    /// Make `configure` fail for the named line group.
    pub fn with_rejected_group(mut self, group: &'static str) -> Self {
        self.reject_group = Some(group);
        self
    }

    pub fn press_button(&mut self, pressed: bool) {
        self.button_pressed = pressed;
    }

    pub fn pins(&self) -> &PinMap {
        &self.pins
    }

    pub fn trace(&self) -> &[BusEvent] {
        &self.trace
    }

    pub fn faults(&self) -> impl Iterator<Item = &BusEvent> {
        self.trace.iter().filter(|event| event.is_fault())
    }

    /// Bytes the host latched on its read cycles, in order.
    pub fn host_observed(&self) -> &[u8] {
        &self.observed
    }

    /// Host cycles finished (deselected).
    pub fn cycles_completed(&self) -> usize {
        self.cycle
    }

    pub fn polls(&self) -> u64 {
        self.polls
    }

    pub fn configured_groups(&self) -> &[&'static str] {
        &self.configured
    }

    /// Whether any data line currently has drive enabled on the card side.
    pub fn lane_driven(&self) -> bool {
        self.enable & self.pins.data_mask() != 0
    }

    pub fn wait_released(&self) -> bool {
        let wait = self.pins.wait_mask();
        self.enable & wait != 0 && self.latch & wait != 0
    }

    pub fn host_selected(&self) -> bool {
        self.selected
    }

    fn step_host(&mut self) {
        match self.state {
            HostState::Idle { countdown } if countdown > 0 => {
                self.state = HostState::Idle { countdown: countdown - 1 };
            }
            HostState::Idle { .. } => match self.script.pop() {
                Some(cycle) => self.start_cycle(cycle),
                None => {
                    self.idle_polls_after_script += 1;
                    if self.idle_polls_after_script == self.idle_poll_limit {
                        tracing::warn!("Host script exhausted after {} cycles; card is still polling", self.cycle);
                        self.trace.push(BusEvent::ScriptExhausted { cycle: self.cycle });
                    }
                    debug_assert!(
                        self.idle_polls_after_script <= self.idle_poll_limit,
                        "host script exhausted after {} cycles; card is still polling for select",
                        self.cycle
                    );
                }
            },
            HostState::AwaitingWait(cycle) => {
                if !self.wait_released() {
                    return;
                }
                if cycle == HostCycle::Read {
                    self.sample();
                }
                if self.timing.hold_polls == 0 {
                    self.finish_cycle();
                } else {
                    self.state = HostState::Holding { remaining: self.timing.hold_polls };
                }
            }
            HostState::Holding { remaining } if remaining > 1 => {
                self.state = HostState::Holding { remaining: remaining - 1 };
            }
            HostState::Holding { .. } => self.finish_cycle(),
        }
    }

    fn start_cycle(&mut self, cycle: HostCycle) {
        if self.lane_driven() {
            self.trace.push(BusEvent::StaleDrive { cycle: self.cycle });
        }
        self.host_reads = cycle == HostCycle::Read;
        if let HostCycle::Write(byte) = cycle {
            if self.lane_driven() {
                self.trace.push(BusEvent::Contention { cycle: self.cycle });
            }
            self.driving = Some(byte);
        }
        self.selected = true;
        self.trace.push(BusEvent::HostSelect { cycle: self.cycle, kind: cycle });
        self.state = HostState::AwaitingWait(cycle);
    }

    fn sample(&mut self) {
        let data = self.pins.data_mask();
        if self.enable & data != data {
            self.trace.push(BusEvent::FloatingSample { cycle: self.cycle });
        }
        let byte = self.pins.data_byte(self.snapshot());
        self.observed.push(byte);
        self.trace.push(BusEvent::HostSampled { cycle: self.cycle, byte });
    }

    fn finish_cycle(&mut self) {
        self.selected = false;
        self.driving = None;
        self.trace.push(BusEvent::HostDeselect { cycle: self.cycle });
        self.cycle += 1;
        self.state = HostState::Idle { countdown: self.timing.idle_polls };
    }

    fn snapshot(&self) -> LineMask {
        let pins = &self.pins;
        let mut snapshot = 0;
        if !self.selected {
            snapshot |= pins.select_mask();
        }
        if pins.read_dir_level(self.host_reads).is_high() {
            snapshot |= pins.read_dir_mask();
        }

        let data = pins.data_mask();
        let card_driven = self.enable & data;
        let host_value = pins.data_bits(self.driving.unwrap_or(self.floating_byte));
        snapshot |= (self.latch & card_driven) | (host_value & data & !card_driven);

        let outputs = pins.wait_mask() | pins.interrupt_mask();
        snapshot |= self.latch & self.enable & outputs;
        if !self.button_pressed {
            snapshot |= pins.button_mask();
        }
        snapshot
    }

    fn record_output(&mut self, mask: LineMask, high: bool) {
        let data = mask & self.pins.data_mask();
        if data != 0 {
            self.trace.push(if high {
                BusEvent::DataSet { bits: data }
            } else {
                BusEvent::DataClear { bits: data }
            });
        }
        if mask & self.pins.wait_mask() != 0 {
            self.trace.push(BusEvent::Wait { released: high });
        }
        if mask & self.pins.interrupt_mask() != 0 {
            self.trace.push(BusEvent::Interrupt { high });
        }
    }
}

impl LineBackend for SimulatedLines {
    fn read_lines(&mut self) -> LineMask {
        self.polls += 1;
        self.step_host();
        self.snapshot()
    }

    fn set_lines(&mut self, mask: LineMask) {
        self.latch |= mask;
        self.record_output(mask, true);
    }

    fn clear_lines(&mut self, mask: LineMask) {
        self.latch &= !mask;
        self.record_output(mask, false);
    }

    fn set_direction(&mut self, mask: LineMask, direction: Direction) {
        match direction {
            Direction::Output => {
                if self.driving.is_some() && mask & self.pins.data_mask() != 0 {
                    self.trace.push(BusEvent::Contention { cycle: self.cycle });
                }
                self.enable |= mask;
            }
            Direction::Input => self.enable &= !mask,
        }
        self.trace.push(BusEvent::Direction { mask, output: direction == Direction::Output });
    }

    fn configure(&mut self, group: &LineGroupConfig) -> Result<(), LineError> {
        if self.reject_group == Some(group.name) {
            return Err(LineError::Rejected {
                group: group.name,
                reason: "rejected by simulator".to_string(),
            });
        }
        match group.mode {
            LineMode::Output => self.enable |= group.mask,
            LineMode::Input | LineMode::Bidirectional => self.enable &= !group.mask,
        }
        self.configured.push(group.name);
        self.trace.push(BusEvent::Configured { group: group.name });
        Ok(())
    }
}
