//! Ordered record of everything that happened on the simulated bus.

use serde::Serialize;

use super::host::HostCycle;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BusEvent {
    Configured { group: &'static str },
    /// Host asserted select to start cycle `cycle`.
    HostSelect { cycle: usize, kind: HostCycle },
    /// Host saw wait released and latched the data lane.
    HostSampled { cycle: usize, byte: u8 },
    HostDeselect { cycle: usize },
    /// Card changed drive-enable on `mask`.
    Direction { mask: u64, output: bool },
    /// Card wrote the set half of the data lane.
    DataSet { bits: u64 },
    /// Card wrote the clear half of the data lane.
    DataClear { bits: u64 },
    Wait { released: bool },
    Interrupt { high: bool },
    /// The card kept polling after the host ran out of cycles.
    ScriptExhausted { cycle: usize },

    // faults
    /// Card and host drove the data lane at the same time.
    Contention { cycle: usize },
    /// Host started a cycle while the card still drove the data lane.
    StaleDrive { cycle: usize },
    /// Host sampled a lane that was not fully driven by the card.
    FloatingSample { cycle: usize },
}

impl BusEvent {
    pub fn is_fault(&self) -> bool {
        matches!(
            self,
            BusEvent::Contention { .. } | BusEvent::StaleDrive { .. } | BusEvent::FloatingSample { .. }
        )
    }
}
