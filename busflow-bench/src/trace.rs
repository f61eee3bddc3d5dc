//! Handshake trace.

use std::fmt;

use busflow::*;
use busflow_axi::{Bus, Transfers};
use itertools::Itertools;

/// Records the payloads that crossed the bus, one line per non-idle step.
///
/// Payloads are printed as the hex value of their wires, lowest field in the lowest bits, so a
/// line can be matched against [`WireTrace::header`].
#[derive(Debug, Clone, Default)]
pub struct WireTrace {
    lines: Vec<String>,
}

impl WireTrace {
    /// Creates an empty trace.
    pub fn new() -> Self { Self::default() }

    /// Wire names and widths of a `B`-byte bus, one per line.
    pub fn header<const B: usize>() -> Vec<String> {
        Bus::<B>::ports().into_iter().map(|(name, width)| format!("{} [{}]", name, width)).collect()
    }

    /// Records the handshakes of step `cycle`.
    pub fn record<const B: usize>(&mut self, cycle: u64, fired: &Transfers<B>) {
        if fired.is_idle() {
            return;
        }
        let fields = [
            ("aw", fired.aw.map(Signal::transl)),
            ("w", fired.w.clone().map(Signal::transl)),
            ("b", fired.b.map(Signal::transl)),
            ("ar", fired.ar.map(Signal::transl)),
            ("r", fired.r.clone().map(Signal::transl)),
        ];
        let line = fields
            .iter()
            .filter_map(|(name, bits)| bits.as_ref().map(|bits| format!("{}={}", name, bits_to_hex(bits))))
            .join(" ");
        self.lines.push(format!("{:>6} {}", cycle, line));
    }

    /// Recorded lines.
    pub fn lines(&self) -> &[String] { &self.lines }
}

impl fmt::Display for WireTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.lines.iter().join("\n")) }
}
