//! Fixed-width unsigned bit fields.

use std::fmt;

use thiserror::Error;

use crate::*;

#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BitsError {
    #[error("value {value:#x} does not fit in {width} bits")]
    Overflow { value: u128, width: usize },
}

/// Unsigned value of exactly `N` bits (`N <= 128`).
///
/// Construction is range-checked, so a `Bits<12>` can never hold a value that would not fit on a
/// 12-bit wire.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Bits<const N: usize>(u128);

impl<const N: usize> Bits<N> {
    const WIDTH_OK: () = assert!(N <= 128, "Bits<N> supports at most 128 bits");

    /// Largest representable value.
    pub const MAX: u128 = if N == 0 { 0 } else { u128::MAX >> (128 - N) };

    /// Creates a value, failing if it does not fit in `N` bits.
    pub fn new(value: u128) -> Result<Self, BitsError> {
        #[allow(clippy::let_unit_value)]
        let () = Self::WIDTH_OK;
        if value > Self::MAX {
            return Err(BitsError::Overflow { value, width: N });
        }
        Ok(Self(value))
    }

    /// Creates a value from the low `N` bits of `value`.
    pub fn truncate(value: u128) -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::WIDTH_OK;
        Self(value & Self::MAX)
    }

    /// All-zero value.
    pub const fn zero() -> Self { Self(0) }

    /// All-one value.
    pub const fn ones() -> Self { Self(Self::MAX) }

    /// Raw value.
    pub const fn value(self) -> u128 { self.0 }

    /// Returns bit `index`.
    pub fn bit(self, index: usize) -> bool { index < N && (self.0 >> index) & 1 == 1 }

    /// Number of set bits.
    pub fn count_ones(self) -> u32 { self.0.count_ones() }
}

impl<const N: usize> Signal for Bits<N> {
    const WIDTH: usize = N;

    fn transl(self) -> Vec<bool> { (0..N).map(|i| self.bit(i)).collect() }

    fn port_decls() -> PortDecls { PortDecls::Bits(N) }
}

impl<const N: usize> TryFrom<u128> for Bits<N> {
    type Error = BitsError;

    fn try_from(value: u128) -> Result<Self, Self::Error> { Self::new(value) }
}

impl<const N: usize> fmt::Display for Bits<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { fmt::Display::fmt(&self.0, f) }
}

impl<const N: usize> fmt::LowerHex for Bits<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { fmt::LowerHex::fmt(&self.0, f) }
}
