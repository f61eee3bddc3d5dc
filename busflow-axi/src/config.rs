//! Master adapter configuration.

use serde::Deserialize;

use crate::error::Error;
use crate::types::MAX_IDS;

/// Master adapter configuration.
///
/// Missing fields take their default values, so an empty TOML table is a valid configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MasterConfig {
    /// Maximum number of transactions in flight, reads and writes together.
    pub max_outstanding: usize,

    /// Reject incrementing bursts that cross a 4 KiB boundary.
    pub check_4k_boundary: bool,
}

impl Default for MasterConfig {
    fn default() -> Self { Self { max_outstanding: 16, check_4k_boundary: true } }
}

impl MasterConfig {
    /// Checks that the values are usable.
    pub fn validate(&self) -> Result<(), Error> {
        if !(1..=MAX_IDS).contains(&self.max_outstanding) {
            return Err(Error::InvalidConfig { reason: "max_outstanding must be in 1..=4096" });
        }
        Ok(())
    }
}
