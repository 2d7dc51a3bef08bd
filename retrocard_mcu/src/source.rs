//! What the card answers with on read cycles and what it does with written bytes.

/// Source and sink of the byte moved in each bus cycle.
///
/// `read_byte` runs inside the host's timing window: it must not block and must not touch
/// any bus line. The engine calls `read_byte` once per host-read cycle and `write_byte`
/// once per host-write cycle.
pub trait DeviceDataSource {
    fn read_byte(&mut self) -> u8;
    fn write_byte(&mut self, byte: u8);
}

/// Free-running counter: every read returns the current value and then advances it,
/// wrapping at 256. Written bytes are captured but do not affect the counter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CounterSource {
    counter: u8,
    last_written: Option<u8>,
}

impl CounterSource {
    pub fn new(start: u8) -> Self {
        Self { counter: start, last_written: None }
    }

    /// Value the next read cycle will return.
    pub fn counter(&self) -> u8 {
        self.counter
    }

    pub fn last_written(&self) -> Option<u8> {
        self.last_written
    }
}

impl DeviceDataSource for CounterSource {
    #[inline(always)]
    fn read_byte(&mut self) -> u8 {
        let byte = self.counter;
        self.counter = self.counter.wrapping_add(1);
        byte
    }

    #[inline(always)]
    fn write_byte(&mut self, byte: u8) {
        self.last_written = Some(byte);
    }
}

/// Single-register device: reads return the last byte the host wrote.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LatchSource {
    value: u8,
}

impl LatchSource {
    pub fn new(value: u8) -> Self {
        Self { value }
    }

    pub fn value(&self) -> u8 {
        self.value
    }
}

impl DeviceDataSource for LatchSource {
    #[inline(always)]
    fn read_byte(&mut self) -> u8 {
        self.value
    }

    #[inline(always)]
    fn write_byte(&mut self, byte: u8) {
        self.value = byte;
    }
}
