//! Bus cycle engine: polling state machine answering one host bus cycle at a time.
//!
//! ```text
//! Idle -> Selected -> Reading | Writing -> Completing -> Idle
//! ```
//!
//! Ordering rules the engine never breaks:
//! - the data lane is switched to output before any data bit is driven
//! - wait is released only after the data action, once per cycle
//! - the lane returns to input only after the host has deselected the card
//!
//! There are no timeouts and no retries. A host that never asserts or never releases
//! select stalls the engine forever. If select re-asserts before the post-read direction
//! restore has run, the behavior is unspecified; the engine does not try to detect it.

use retrocard_shared::{Direction, Level, LineBackend, LineMask, PinMap};

use crate::configurator::ConfiguredLines;
use crate::direction::DirectionController;
use crate::source::DeviceDataSource;
use crate::wait::spin_until;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusPhase {
    /// Waiting for select to assert.
    Idle,
    /// Selected; read direction not yet resolved. Decoding it costs no further poll.
    Selected,
    /// Host reads: the card drives the lane.
    Reading,
    /// Host writes: the card samples the lane.
    Writing,
    /// Wait released; waiting for deselection before restoring idle line state.
    Completing,
}

/// In-flight transfer of the current cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferState {
    pub byte: u8,
    /// The lane was switched to output during this cycle and must go back to input
    /// before the next cycle starts.
    pub pending_restore: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleKind {
    HostRead,
    HostWrite,
}

/// Summary of one completed bus cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleRecord {
    pub kind: CycleKind,
    pub byte: u8,
}

/// Everything a cycle mutates. Owned by the caller and lent to the engine for each
/// cycle, so tests can inspect it between cycles.
#[derive(Debug, Clone, Default)]
pub struct EngineState<S> {
    pub transfer: TransferState,
    pub source: S,
}

impl<S> EngineState<S> {
    pub fn new(source: S) -> Self {
        Self { transfer: TransferState::default(), source }
    }
}

pub struct BusCycleEngine<B> {
    lines: B,
    pins: PinMap,
    select: LineMask,
    wait: LineMask,
    data: LineMask,
    direction: DirectionController,
    phase: BusPhase,
    /// Snapshot that showed select asserted; the cycle's direction is decoded from it.
    selected_at: LineMask,
}

impl<B: LineBackend> BusCycleEngine<B> {
    pub fn new(configured: ConfiguredLines<B>) -> Self {
        let (lines, pins) = configured.into_parts();
        Self {
            select: pins.select_mask(),
            wait: pins.wait_mask(),
            data: pins.data_mask(),
            direction: DirectionController::new(&pins),
            phase: BusPhase::Idle,
            selected_at: 0,
            lines,
            pins,
        }
    }

    /// Serve host bus cycles forever.
    pub fn run<S: DeviceDataSource>(mut self, mut state: EngineState<S>) -> ! {
        loop {
            self.run_cycle(&mut state);
        }
    }

    /// Advance until the current cycle completes. Called in `Idle`, this blocks until the
    /// host selects the card and then serves exactly one cycle.
    #[inline]
    pub fn run_cycle<S: DeviceDataSource>(&mut self, state: &mut EngineState<S>) -> CycleRecord {
        loop {
            if let Some(record) = self.step(state) {
                return record;
            }
        }
    }

    /// Perform the transition out of the current phase. Returns the cycle summary when
    /// the transition completes a cycle.
    #[inline]
    pub fn step<S: DeviceDataSource>(&mut self, state: &mut EngineState<S>) -> Option<CycleRecord> {
        match self.phase {
            BusPhase::Idle => {
                self.selected_at = spin_until(&mut self.lines, self.select, Level::Low);
                self.phase = BusPhase::Selected;
                None
            }
            BusPhase::Selected => {
                self.phase = if self.pins.host_reads(self.selected_at) {
                    BusPhase::Reading
                } else {
                    BusPhase::Writing
                };
                None
            }
            BusPhase::Reading => {
                self.direction.set_output(&mut self.lines);
                state.transfer.pending_restore = true;
                let byte = state.source.read_byte();
                state.transfer.byte = byte;
                self.lines.drive_lines(self.data, self.pins.data_bits(byte));
                self.phase = BusPhase::Completing;
                None
            }
            BusPhase::Writing => {
                let byte = self.pins.data_byte(self.lines.read_lines());
                state.transfer.byte = byte;
                state.source.write_byte(byte);
                self.phase = BusPhase::Completing;
                None
            }
            BusPhase::Completing => {
                let kind = if state.transfer.pending_restore {
                    CycleKind::HostRead
                } else {
                    CycleKind::HostWrite
                };
                // release wait: transfer complete
                self.lines.set_lines(self.wait);
                spin_until(&mut self.lines, self.select, Level::High);
                // not ready again for the next cycle
                self.lines.clear_lines(self.wait);
                if state.transfer.pending_restore {
                    self.direction.set_input(&mut self.lines);
                    state.transfer.pending_restore = false;
                }
                self.phase = BusPhase::Idle;
                Some(CycleRecord { kind, byte: state.transfer.byte })
            }
        }
    }

    pub fn phase(&self) -> BusPhase {
        self.phase
    }

    pub fn direction(&self) -> Direction {
        self.direction.direction()
    }

    pub fn pins(&self) -> &PinMap {
        &self.pins
    }

    pub fn lines(&self) -> &B {
        &self.lines
    }

    pub fn lines_mut(&mut self) -> &mut B {
        &mut self.lines
    }

    pub fn into_lines(self) -> B {
        self.lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configurator::configure_lines;
    use crate::source::CounterSource;
    use crate::testing::{Op, ScriptedLines};

    fn engine(snapshots: Vec<LineMask>) -> BusCycleEngine<ScriptedLines> {
        let configured = configure_lines(ScriptedLines::new(snapshots), PinMap::default()).unwrap();
        let mut engine = BusCycleEngine::new(configured);
        engine.lines_mut().ops.clear();
        engine
    }

    #[test]
    fn read_cycle_op_order() {
        let pins = PinMap::default();
        let idle = pins.select_mask();
        let selected_read = pins.read_dir_mask();
        let mut engine = engine(vec![idle, selected_read, 0, idle]);
        let mut state = EngineState::new(CounterSource::new(0x5a));

        let record = engine.run_cycle(&mut state);

        assert_eq!(record, CycleRecord { kind: CycleKind::HostRead, byte: 0x5a });
        let data = pins.data_mask();
        assert_eq!(
            engine.lines().writes(),
            vec![
                Op::Direction(data, Direction::Output),
                Op::Set(pins.data_bits(0x5a)),
                Op::Clear(pins.data_bits(!0x5a)),
                Op::Set(pins.wait_mask()),
                Op::Clear(pins.wait_mask()),
                Op::Direction(data, Direction::Input),
            ]
        );
        assert_eq!(state.source.counter(), 0x5b);
        assert!(!state.transfer.pending_restore);
        assert_eq!(engine.direction(), Direction::Input);
    }

    #[test]
    fn write_cycle_samples_without_direction_change() {
        let pins = PinMap::default();
        let on_bus = pins.data_bits(0x3c);
        let mut engine = engine(vec![0, on_bus, pins.select_mask()]);
        let mut state = EngineState::new(CounterSource::new(7));

        let record = engine.run_cycle(&mut state);

        assert_eq!(record, CycleRecord { kind: CycleKind::HostWrite, byte: 0x3c });
        assert_eq!(
            engine.lines().writes(),
            vec![Op::Set(pins.wait_mask()), Op::Clear(pins.wait_mask())]
        );
        assert_eq!(state.source.counter(), 7);
        assert_eq!(state.source.last_written(), Some(0x3c));
    }

    #[test]
    fn step_walks_phases() {
        let pins = PinMap::default();
        let selected_read = pins.read_dir_mask();
        let mut engine = engine(vec![selected_read, pins.select_mask()]);
        let mut state = EngineState::new(CounterSource::default());

        assert_eq!(engine.phase(), BusPhase::Idle);
        assert_eq!(engine.step(&mut state), None);
        assert_eq!(engine.phase(), BusPhase::Selected);
        assert_eq!(engine.step(&mut state), None);
        assert_eq!(engine.phase(), BusPhase::Reading);
        assert_eq!(engine.step(&mut state), None);
        assert_eq!(engine.phase(), BusPhase::Completing);
        assert_eq!(engine.direction(), Direction::Output);
        assert!(state.transfer.pending_restore);
        assert!(engine.step(&mut state).is_some());
        assert_eq!(engine.phase(), BusPhase::Idle);
        assert_eq!(engine.direction(), Direction::Input);
    }

    #[test]
    fn idle_spins_while_deselected() {
        let pins = PinMap::default();
        let idle = pins.select_mask();
        let mut engine = engine(vec![idle, idle, idle, 0, 0, idle]);
        let mut state = EngineState::new(CounterSource::default());
        engine.run_cycle(&mut state);
        assert_eq!(engine.lines().polls(), 6);
    }

    #[test]
    fn direction_comes_from_the_select_snapshot() {
        let pins = PinMap::default();
        let selected_read = pins.read_dir_mask();
        // read_dir drops while select is still asserted; the cycle stays a read
        let mut engine = engine(vec![selected_read, 0, pins.select_mask()]);
        let mut state = EngineState::new(CounterSource::new(9));

        assert_eq!(engine.step(&mut state), None);
        assert_eq!(engine.step(&mut state), None);
        assert_eq!(engine.phase(), BusPhase::Reading);
        assert_eq!(engine.lines().polls(), 1);

        let record = engine.run_cycle(&mut state);
        assert_eq!(record, CycleRecord { kind: CycleKind::HostRead, byte: 9 });
    }
}
