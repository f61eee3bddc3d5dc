//! Burst address generation.
//!
//! For a burst starting at `start` with transfer size `size` and `len` beats:
//!
//! ```text
//! fixed: start, start, start, ...
//! incr:  start, align(start, size) + 1 * size, align(start, size) + 2 * size, ...
//! wrap:  like incr, but the address wraps to the bottom of the `size * len` block
//!        that contains `start`, e.g. start=0x2008 size=8 len=4 gives
//!        0x2008, 0x2010, 0x2018, 0x2000
//! ```

use std::iter::FusedIterator;

use busflow::*;

use crate::error::Error;
use crate::types::{Burst, BurstLen, Size};

/// Incrementing bursts may not cross this boundary.
pub const BOUNDARY: u64 = 4096;

/// Validated burst parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BurstConfig {
    start: u32,
    size: Size,
    len: BurstLen,
    burst: Burst,
}

impl BurstConfig {
    /// Validates the burst parameters.
    ///
    /// Wrapping bursts need a start address aligned to `size` and a length of 2, 4, 8 or 16 beats.
    pub fn new(start: u32, size: Size, len: BurstLen, burst: Burst) -> Result<Self, Error> {
        if burst == Burst::Wrap {
            if !len.beats().is_power_of_two() || len.beats() < 2 {
                return Err(Error::InvalidBurstConfig { reason: "wrapping burst length must be 2, 4, 8 or 16" });
            }
            if start % size.bytes() != 0 {
                return Err(Error::InvalidBurstConfig { reason: "wrapping burst start must be aligned to the size" });
            }
        }
        Ok(Self { start, size, len, burst })
    }

    /// Start address.
    pub fn start(&self) -> u32 { self.start }

    /// Transfer size.
    pub fn size(&self) -> Size { self.size }

    /// Number of beats.
    pub fn beats(&self) -> usize { self.len.beats() }

    /// Burst type.
    pub fn burst(&self) -> Burst { self.burst }

    /// `(base, bytes)` of the block a wrapping burst stays in.
    pub fn wrap_block(&self) -> Option<(u32, u32)> {
        match self.burst {
            Burst::Wrap => {
                let bytes = self.size.bytes() * self.len.beats() as u32;
                Some((align_down(u64::from(self.start), u64::from(bytes)) as u32, bytes))
            }
            _ => None,
        }
    }

    /// Whether an incrementing burst runs over a 4 KiB boundary.
    pub fn crosses_boundary(&self) -> bool {
        match self.burst {
            Burst::Incr => {
                let first = u64::from(self.start);
                let last = self.addr_of_u64(self.beats() - 1) + u64::from(self.size.bytes()) - 1;
                first / BOUNDARY != last / BOUNDARY
            }
            _ => false,
        }
    }

    fn addr_of_u64(&self, beat: usize) -> u64 {
        let start = u64::from(self.start);
        let size = u64::from(self.size.bytes());
        let beat = beat as u64;
        match self.burst {
            Burst::Fixed => start,
            Burst::Incr if beat == 0 => start,
            Burst::Incr => align_down(start, size) + beat * size,
            Burst::Wrap => {
                let block = size * self.len.beats() as u64;
                let base = align_down(start, block);
                base + (start - base + beat * size) % block
            }
        }
    }

    /// Address of beat `beat`.
    ///
    /// # Panics
    ///
    /// Panics if `beat` is not below the burst length.
    pub fn addr_of(&self, beat: usize) -> u32 {
        assert!(beat < self.beats(), "beat {} out of range for a {}-beat burst", beat, self.beats());
        // Incrementing bursts that were not checked against the boundary wrap at 4 GiB.
        self.addr_of_u64(beat) as u32
    }

    /// Address sequence of the burst.
    pub fn addrs(&self) -> BurstAddrs { BurstAddrs { config: *self, beat: 0 } }
}

/// Lazy, restartable address sequence of a burst.
#[derive(Debug, Clone)]
pub struct BurstAddrs {
    config: BurstConfig,
    beat: usize,
}

impl BurstAddrs {
    /// Rewinds to the first beat.
    pub fn restart(&mut self) { self.beat = 0; }

    /// Index of the next beat.
    pub fn position(&self) -> usize { self.beat }
}

impl Iterator for BurstAddrs {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        if self.beat >= self.config.beats() {
            return None;
        }
        let addr = self.config.addr_of(self.beat);
        self.beat += 1;
        Some(addr)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.config.beats() - self.beat;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for BurstAddrs {}

impl FusedIterator for BurstAddrs {}

/// Byte lanes written by a beat at `addr` of transfer size `size` on a `B`-byte data bus.
///
/// The lanes run from `addr` up to the end of the `size`-aligned transfer, so the first beat of an
/// unaligned burst only strobes its upper lanes.
pub fn lane_strobe<const B: usize>(addr: u32, size: Size) -> Bits<B> {
    let bus = B as u64;
    let size = u64::from(size.bytes()).min(bus);
    let addr = u64::from(addr);
    let lower = addr % bus;
    let upper = align_down(addr, size) % bus + size;
    let mask = (lower..upper).fold(0u128, |mask, lane| mask | (1u128 << lane));
    Bits::truncate(mask)
}
