//! Debug UART Output
//!
//! Polled transmit on the Cadence UART used for boot diagnostics, and a
//! [`log::Log`] implementation on top of it. The boot ROM leaves the UART
//! configured, so nothing here touches baud rate or mode registers.

#![warn(clippy::undocumented_unsafe_blocks)]

use core::fmt::Write;

use log::{LevelFilter, Log, Metadata, Record};

use super::{mmio_read, mmio_write};

/// Channel status register offset
pub const SR_OFFSET: u32 = 0x2C;
/// Transmit FIFO full
pub const SR_TXFULL: u32 = 0x10;
/// Transmit/receive FIFO offset
pub const FIFO_OFFSET: u32 = 0x30;

/// Feed `s` to `put` byte by byte, expanding LF to CRLF
pub fn for_each_output_byte(s: &str, mut put: impl FnMut(u8)) {
    for byte in s.bytes() {
        if byte == b'\n' {
            put(b'\r');
        }
        put(byte);
    }
}

/// Blocking writer on one UART
#[derive(Debug, Clone, Copy)]
pub struct DebugWriter {
    base: u32,
}

impl DebugWriter {
    /// Writer on the UART at `base`
    #[must_use]
    pub const fn new(base: u32) -> Self {
        Self { base }
    }

    fn write_byte(self, byte: u8) {
        // SAFETY: `base` is the UART block address fixed by the register map;
        // status and FIFO are valid 32-bit registers inside it.
        unsafe {
            while mmio_read(self.base + SR_OFFSET) & SR_TXFULL != 0 {
                core::hint::spin_loop();
            }
            mmio_write(self.base + FIFO_OFFSET, u32::from(byte));
        }
    }
}

impl Write for DebugWriter {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        let writer = *self;
        for_each_output_byte(s, |byte| writer.write_byte(byte));
        Ok(())
    }
}

/// `log` backend printing `[LEVEL] message` lines to the debug UART
#[derive(Debug)]
pub struct UartLogger {
    base: u32,
    level: LevelFilter,
}

impl UartLogger {
    /// Logger on the UART at `base`, dropping records above `level`
    #[must_use]
    pub const fn new(base: u32, level: LevelFilter) -> Self {
        Self { base, level }
    }

    /// Install as the global logger
    pub fn install(&'static self) -> Result<(), log::SetLoggerError> {
        log::set_logger(self)?;
        log::set_max_level(self.level);
        Ok(())
    }
}

impl Log for UartLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let mut writer = DebugWriter::new(self.base);
        let _ = writeln!(writer, "[{}] {}", record.level(), record.args());
    }

    fn flush(&self) {}
}
