//! A `log` backend that writes colored lines to a console.

use core::fmt::{self, Write};

use log::{LevelFilter, Log, Metadata, Record};
use spin::Once;

/// The device diagnostic output ends up on.
pub trait Console: Sync {
    fn write_str(&self, s: &str);
}

static CONSOLE: Once<&'static dyn Console> = Once::new();

pub struct ConsoleLogger;

impl Log for ConsoleLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        CONSOLE.is_completed()
    }

    fn log(&self, record: &Record) {
        let Some(console) = CONSOLE.get() else {
            return;
        };

        let level_color = match record.level() {
            log::Level::Error => "\x1b[31;101m",
            log::Level::Warn => "\x1b[33;103m",
            log::Level::Info => "\x1b[34;104m",
            log::Level::Debug => "\x1b[32;102m",
            log::Level::Trace => "\x1b[35;105m",
        };
        let reset_color = "\x1b[0m";

        let mut buffer = Buffer::new(*console);
        let _ = writeln!(
            buffer,
            "{level_color}[{:<5} {}:{}]{reset_color} {}",
            record.level(),
            record.file().unwrap_or("<unknown>"),
            record.line().unwrap_or(0),
            record.args(),
        );

        buffer.flush();
    }

    fn flush(&self) {}
}

/// Install the logger. Only the first call has an effect.
pub fn init(console: &'static dyn Console, level: LevelFilter) {
    CONSOLE.call_once(|| console);
    if log::set_logger(&ConsoleLogger).is_ok() {
        log::set_max_level(level);
    }
}

/// Collects a line on the stack so that the console sees few large writes.
struct Buffer {
    console: &'static dyn Console,
    buffer: [u8; 256],
    len: usize,
}

impl Buffer {
    fn new(console: &'static dyn Console) -> Self {
        Self {
            console,
            buffer: [0; 256],
            len: 0,
        }
    }

    fn flush(&mut self) {
        if self.len == 0 {
            return;
        }

        // Only whole characters are ever written to the buffer.
        if let Ok(s) = core::str::from_utf8(&self.buffer[..self.len]) {
            self.console.write_str(s);
        }

        self.len = 0;
    }
}

impl Write for Buffer {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        s.chars().try_for_each(|c| self.write_char(c))
    }

    fn write_char(&mut self, c: char) -> fmt::Result {
        if self.len + c.len_utf8() > self.buffer.len() {
            self.flush();
        }

        let encoded = c.encode_utf8(&mut self.buffer[self.len..]);
        self.len += encoded.len();

        Ok(())
    }
}

#[cfg(target_arch = "x86_64")]
pub use port::PortConsole;

#[cfg(target_arch = "x86_64")]
mod port {
    use x86_64::instructions::port::PortWriteOnly;

    use super::Console;

    /// A 16550 UART that has already been set up by the firmware.
    pub struct PortConsole {
        port: u16,
    }

    impl PortConsole {
        pub const COM1: Self = Self::new(0x3f8);

        pub const fn new(port: u16) -> Self {
            Self { port }
        }
    }

    impl Console for PortConsole {
        fn write_str(&self, s: &str) {
            let mut port = PortWriteOnly::<u8>::new(self.port);
            for b in s.bytes() {
                unsafe {
                    port.write(b);
                }
            }
        }
    }
}
