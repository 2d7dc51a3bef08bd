//! Line-level vocabulary shared by every backend: masks, levels, directions and the
//! per-group electrical configuration applied at startup.

/// One bit per physical line; bit `n` is line `n`.
pub type LineMask = u64;

/// Mask with only `line` set.
#[inline(always)]
pub const fn line_bit(line: u8) -> LineMask {
    1 << line
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Level {
    Low,
    High,
}

impl Level {
    #[inline(always)]
    pub const fn from_bool(high: bool) -> Self {
        if high { Level::High } else { Level::Low }
    }

    /// Level of `line` (a single-bit mask) in a snapshot taken with `read_lines`.
    #[inline(always)]
    pub const fn of(snapshot: LineMask, line: LineMask) -> Self {
        Self::from_bool(snapshot & line != 0)
    }

    pub const fn is_high(self) -> bool {
        matches!(self, Level::High)
    }
}

/// Electrical drive direction of a line, as seen from the card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Input,
    Output,
}

/// Role a line group is configured for at startup.
///
/// `Bidirectional` groups start as inputs with drive-enable off; the direction is switched
/// later through [`crate::LineBackend::set_direction`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineMode {
    Input,
    Output,
    Bidirectional,
}

impl LineMode {
    pub const fn initial_direction(self) -> Direction {
        match self {
            LineMode::Output => Direction::Output,
            LineMode::Input | LineMode::Bidirectional => Direction::Input,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pull {
    Floating,
    Up,
    Down,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeInterrupt {
    Disabled,
    Rising,
    Falling,
    AnyEdge,
}

/// Electrical setup for one group of lines sharing the same role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineGroupConfig {
    pub name: &'static str,
    pub mask: LineMask,
    pub mode: LineMode,
    pub pull: Pull,
    pub interrupt: EdgeInterrupt,
    /// Level driven right after configuration. Only meaningful for output groups.
    pub initial_level: Option<Level>,
}

impl LineGroupConfig {
    pub fn lines(&self) -> impl Iterator<Item = u8> + '_ {
        (0..64u8).filter(move |line| self.mask & line_bit(*line) != 0)
    }
}
