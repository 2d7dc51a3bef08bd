// retrocard_mcu: firmware core of the expansion-bus card
//
// The bus engine answers one host bus cycle per call by polling the select line,
// switching the data lane direction around the transfer and handling the wait handshake.
// Everything hardware-specific sits behind `retrocard_shared::LineBackend`; `gpio` maps
// it onto the reference microcontroller's register block.

pub mod configurator;
pub mod direction;
pub mod engine;
pub mod gpio;
pub mod source;
pub mod wait;

#[cfg(test)]
mod testing;

pub use configurator::{ConfiguredLines, configure_lines, line_plan};
pub use direction::DirectionController;
pub use engine::{BusCycleEngine, BusPhase, CycleKind, CycleRecord, EngineState, TransferState};
pub use source::{CounterSource, DeviceDataSource, LatchSource};
