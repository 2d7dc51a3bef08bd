// Test backend: replays a fixed list of input snapshots and records every write

use std::collections::VecDeque;

use retrocard_shared::{Direction, LineBackend, LineError, LineGroupConfig, LineMask};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    Read(LineMask),
    Set(LineMask),
    Clear(LineMask),
    Direction(LineMask, Direction),
    Configure(&'static str),
}

#[derive(Debug, Default)]
pub struct ScriptedLines {
    snapshots: VecDeque<LineMask>,
    pub ops: Vec<Op>,
    pub reject: Option<&'static str>,
}

impl ScriptedLines {
    pub fn new(snapshots: Vec<LineMask>) -> Self {
        Self { snapshots: snapshots.into(), ..Default::default() }
    }

    /// Backend whose `configure` fails for `group`.
    pub fn rejecting(group: &'static str) -> Self {
        Self { reject: Some(group), ..Default::default() }
    }

    pub fn polls(&self) -> usize {
        self.ops.iter().filter(|op| matches!(op, Op::Read(_))).count()
    }

    /// Recorded ops without the reads.
    pub fn writes(&self) -> Vec<Op> {
        self.ops.iter().filter(|op| !matches!(op, Op::Read(_))).cloned().collect()
    }
}

impl LineBackend for ScriptedLines {
    fn read_lines(&mut self) -> LineMask {
        let snapshot = self.snapshots.pop_front().expect("scripted snapshots exhausted");
        self.ops.push(Op::Read(snapshot));
        snapshot
    }

    fn set_lines(&mut self, mask: LineMask) {
        self.ops.push(Op::Set(mask));
    }

    fn clear_lines(&mut self, mask: LineMask) {
        self.ops.push(Op::Clear(mask));
    }

    fn set_direction(&mut self, mask: LineMask, direction: Direction) {
        self.ops.push(Op::Direction(mask, direction));
    }

    fn configure(&mut self, group: &LineGroupConfig) -> Result<(), LineError> {
        if self.reject == Some(group.name) {
            return Err(LineError::Rejected { group: group.name, reason: "test rejection".to_string() });
        }
        self.ops.push(Op::Configure(group.name));
        Ok(())
    }
}
