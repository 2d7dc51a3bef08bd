// retrocard_simulator: simulated expansion bus for exercising the card firmware without hardware

pub mod simulator;

use retrocard_mcu::{BusCycleEngine, CycleRecord, DeviceDataSource, EngineState, configure_lines};
use retrocard_shared::{LineError, PinMap};

pub use simulator::SimulatedLines;
pub use simulator::host::{HostCycle, HostScript, HostTiming};
pub use simulator::trace::BusEvent;

/// Result of a scripted simulation run.
#[derive(Debug)]
pub struct SimulationReport<S> {
    pub records: Vec<CycleRecord>,
    pub state: EngineState<S>,
    pub lines: SimulatedLines,
}

impl<S> SimulationReport<S> {
    pub fn faults(&self) -> Vec<&BusEvent> {
        self.lines.faults().collect()
    }
}

/// Configure simulated lines, then let the bus engine serve every cycle in `script`.
pub fn run_scripted<S: DeviceDataSource>(
    pins: PinMap,
    script: HostScript,
    timing: HostTiming,
    source: S,
) -> Result<SimulationReport<S>, LineError> {
    let cycles = script.len();
    let lines = SimulatedLines::new(pins.clone(), script).with_timing(timing);
    let configured = configure_lines(lines, pins)?;
    let mut engine = BusCycleEngine::new(configured);
    let mut state = EngineState::new(source);
    let mut records = Vec::with_capacity(cycles);
    for _ in 0..cycles {
        let record = engine.run_cycle(&mut state);
        tracing::debug!("cycle {}: {:?} {:#04x}", records.len(), record.kind, record.byte);
        records.push(record);
    }
    Ok(SimulationReport { records, state, lines: engine.into_lines() })
}
