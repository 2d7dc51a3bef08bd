// retrocard_shared: shared traits and types for the card firmware, simulator, and host tooling

pub mod board_config;
pub mod hardware_traits;
pub mod lines;

pub use board_config::PinMap;
pub use hardware_traits::{LineBackend, LineError};
pub use lines::{Direction, EdgeInterrupt, Level, LineGroupConfig, LineMask, LineMode, Pull, line_bit};
