//! One-time line setup performed before the bus engine starts.

use retrocard_shared::{
    Direction, EdgeInterrupt, Level, LineBackend, LineError, LineGroupConfig, LineMode, PinMap, Pull,
};

/// Lines that went through [`configure_lines`]. The bus engine only accepts this type, so
/// it can never start on unconfigured lines.
#[derive(Debug)]
pub struct ConfiguredLines<B> {
    lines: B,
    pins: PinMap,
}

impl<B> ConfiguredLines<B> {
    pub fn pins(&self) -> &PinMap {
        &self.pins
    }

    pub fn lines(&self) -> &B {
        &self.lines
    }

    pub fn into_parts(self) -> (B, PinMap) {
        (self.lines, self.pins)
    }
}

/// Electrical setup for every line group on the card, in the order it is applied.
pub fn line_plan(pins: &PinMap) -> [LineGroupConfig; 6] {
    let input = |name, mask, pull| LineGroupConfig {
        name,
        mask,
        mode: LineMode::Input,
        pull,
        interrupt: EdgeInterrupt::Disabled,
        initial_level: None,
    };
    let output = |name, mask, level| LineGroupConfig {
        name,
        mask,
        mode: LineMode::Output,
        pull: Pull::Floating,
        interrupt: EdgeInterrupt::Disabled,
        initial_level: Some(level),
    };
    [
        LineGroupConfig {
            name: "data",
            mask: pins.data_mask(),
            mode: LineMode::Bidirectional,
            pull: Pull::Floating,
            interrupt: EdgeInterrupt::Disabled,
            initial_level: None,
        },
        input("read_dir", pins.read_dir_mask(), Pull::Floating),
        input("select", pins.select_mask(), Pull::Floating),
        // wait starts at "not ready" so the host stalls until the first cycle is served
        output("wait", pins.wait_mask(), Level::Low),
        output("interrupt", pins.interrupt_mask(), pins.interrupt_idle_level()),
        input("button", pins.button_mask(), Pull::Up),
    ]
}

/// Configures every line group exactly once.
///
/// Any error is fatal for startup: the caller must halt rather than retry.
pub fn configure_lines<B: LineBackend>(mut lines: B, pins: PinMap) -> Result<ConfiguredLines<B>, LineError> {
    pins.validate()?;
    for group in line_plan(&pins) {
        if let Err(e) = lines.configure(&group) {
            tracing::error!("Failed to configure line group '{}': {}", group.name, e);
            return Err(e);
        }
        match group.initial_level {
            Some(Level::High) => lines.set_lines(group.mask),
            Some(Level::Low) => lines.clear_lines(group.mask),
            None => {}
        }
        tracing::debug!("Configured line group '{}' (mask {:#018x})", group.name, group.mask);
    }
    lines.set_direction(pins.data_mask(), Direction::Input);
    tracing::info!(
        "Bus lines configured: data {}-{}, select {}, read_dir {}, wait {}, interrupt {}",
        pins.data_base,
        pins.data_base + 7,
        pins.select,
        pins.read_dir,
        pins.wait,
        pins.interrupt
    );
    Ok(ConfiguredLines { lines, pins })
}
