//! Blocking busy-wait on a single line.

use retrocard_shared::{Level, LineBackend, LineMask};

/// Spins on `read_lines` until `line` reads `level` and returns the snapshot that
/// satisfied the condition.
///
/// There is no timeout and no cancellation: the only way out is the awaited electrical
/// transition. The loop never yields; a scheduler delay here would overrun the host's
/// bus timing. Simulated backends inject the transition from inside `read_lines`.
#[inline(always)]
pub fn spin_until<B: LineBackend + ?Sized>(lines: &mut B, line: LineMask, level: Level) -> LineMask {
    loop {
        let snapshot = lines.read_lines();
        if Level::of(snapshot, line) == level {
            return snapshot;
        }
        core::hint::spin_loop();
    }
}
