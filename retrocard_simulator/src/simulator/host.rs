//! Scripted host bus master.

use std::collections::VecDeque;

use rand::Rng;
use serde::Serialize;

/// One bus cycle the simulated host performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HostCycle {
    /// Host reads a byte from the card.
    Read,
    /// Host writes the byte to the card.
    Write(u8),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostScript {
    cycles: VecDeque<HostCycle>,
}

impl HostScript {
    pub fn new(cycles: impl IntoIterator<Item = HostCycle>) -> Self {
        Self { cycles: cycles.into_iter().collect() }
    }

    pub fn reads(count: usize) -> Self {
        Self::new(std::iter::repeat_n(HostCycle::Read, count))
    }

    /// `count` cycles, each a read with probability `read_ratio`, otherwise a write of a
    /// random byte.
    pub fn random<R: Rng + ?Sized>(rng: &mut R, count: usize, read_ratio: f64) -> Self {
        let read_ratio = read_ratio.clamp(0.0, 1.0);
        Self::new((0..count).map(|_| {
            if rng.random_bool(read_ratio) {
                HostCycle::Read
            } else {
                HostCycle::Write(rng.random())
            }
        }))
    }

    pub fn len(&self) -> usize {
        self.cycles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cycles.is_empty()
    }

    pub fn cycles(&self) -> impl Iterator<Item = &HostCycle> {
        self.cycles.iter()
    }

    pub(crate) fn pop(&mut self) -> Option<HostCycle> {
        self.cycles.pop_front()
    }
}

/// Host-side timing, counted in card polls of the line state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostTiming {
    /// Polls between deselect and the next select assertion.
    pub idle_polls: u32,
    /// Polls select stays asserted after the host has seen wait released.
    pub hold_polls: u32,
}

impl Default for HostTiming {
    fn default() -> Self {
        Self { idle_polls: 2, hold_polls: 1 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HostState {
    Idle { countdown: u32 },
    AwaitingWait(HostCycle),
    Holding { remaining: u32 },
}
