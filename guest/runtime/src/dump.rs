//! Formatting of register dumps.

use core::fmt;

/// A single register printed on its own line.
pub struct NamedRegister {
    pub name: &'static str,
    pub value: u64,
}

impl fmt::Display for NamedRegister {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\t {:<7}: 0x{:016x}", self.name, self.value)
    }
}

/// Consecutive general purpose registers printed on one line, e.g.
/// `x04 ~ x07: 0x... 0x... 0x... 0x...`.
pub struct RegisterGroup<'a> {
    pub first: usize,
    pub values: &'a [u64],
}

impl fmt::Display for RegisterGroup<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let last = self.first + self.values.len().saturating_sub(1);
        write!(f, "\t x{:02} ~ x{:02}:", self.first, last)?;
        for value in self.values {
            write!(f, " 0x{value:016x}")?;
        }
        Ok(())
    }
}

/// Split `gprs` into groups of `per_line` registers. The last group holds the
/// remainder.
pub fn register_groups(gprs: &[u64], per_line: usize) -> impl Iterator<Item = RegisterGroup<'_>> {
    gprs.chunks(per_line)
        .enumerate()
        .map(move |(i, values)| RegisterGroup {
            first: i * per_line,
            values,
        })
}
