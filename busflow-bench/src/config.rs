//! Bench configuration.
//!
//! # Config File Format
//!
//! ```toml
//! [master]
//! max_outstanding = 16
//! check_4k_boundary = true
//!
//! [responder]
//! latency = 2
//! ready_period = 1
//! memory_bytes = 65536
//!
//! [[scenario]]
//! name = "fill and read back"
//!
//! [[scenario.op]]
//! kind = "write"
//! id = 5
//! addr = 0x1000
//! len = 4
//! data = [0x03020100, 0x07060504, 0x0b0a0908, 0x0f0e0d0c]
//!
//! [[scenario.op]]
//! kind = "read"
//! addr = 0x1000
//! len = 4
//! wait = true
//! expect = [0x03020100, 0x07060504, 0x0b0a0908, 0x0f0e0d0c]
//! ```
//!
//! Data words are little-endian 32-bit values, one per beat.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use busflow_axi::{Burst, MasterConfig};
use serde::Deserialize;
use thiserror::Error;

use crate::memory::ResponderConfig;

#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },

    #[error("invalid bench configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Burst type as written in the config file.
#[allow(missing_docs)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BurstKind {
    Fixed,
    #[default]
    Incr,
    Wrap,
}

impl From<BurstKind> for Burst {
    fn from(kind: BurstKind) -> Self {
        match kind {
            BurstKind::Fixed => Burst::Fixed,
            BurstKind::Incr => Burst::Incr,
            BurstKind::Wrap => Burst::Wrap,
        }
    }
}

/// Transfer direction of an operation.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpKind {
    Read,
    Write,
}

/// One request of a scenario.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Op {
    /// Read or write.
    pub kind: OpKind,

    /// Transaction id. The lowest free id if absent.
    #[serde(default)]
    pub id: Option<u16>,

    /// Start address.
    pub addr: u32,

    /// Bytes per beat.
    #[serde(default = "default_size")]
    pub size: u32,

    /// Beats in the burst.
    #[serde(default = "default_len")]
    pub len: usize,

    /// Burst type.
    #[serde(default)]
    pub burst: BurstKind,

    /// Write data, one word per beat.
    #[serde(default)]
    pub data: Vec<u32>,

    /// User sideband of the request, below 16.
    #[serde(default)]
    pub user: u8,

    /// Expected read data, one word per beat. Not checked if empty.
    #[serde(default)]
    pub expect: Vec<u32>,

    /// Run until nothing is outstanding before submitting this request.
    #[serde(default)]
    pub wait: bool,
}

fn default_size() -> u32 { 4 }

fn default_len() -> usize { 1 }

/// Requests submitted together and run to completion.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    /// Name shown in reports.
    pub name: String,

    /// Requests in submission order.
    #[serde(default, rename = "op")]
    pub ops: Vec<Op>,
}

/// Bench configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BenchConfig {
    /// Master adapter settings.
    pub master: MasterConfig,

    /// Memory slave settings.
    pub responder: ResponderConfig,

    /// Steps a scenario may take before it is considered hung.
    pub max_steps: u64,

    /// Scenarios in run order.
    #[serde(rename = "scenario")]
    pub scenarios: Vec<Scenario>,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            master: MasterConfig::default(),
            responder: ResponderConfig::default(),
            max_steps: 10_000,
            scenarios: Vec::new(),
        }
    }
}

impl FromStr for BenchConfig {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> { Ok(toml::from_str(s)?) }
}

impl BenchConfig {
    /// Loads a configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents =
            std::fs::read_to_string(path).map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
        contents.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config = "".parse::<BenchConfig>().unwrap();
        assert_eq!(config.master, MasterConfig::default());
        assert_eq!(config.responder, ResponderConfig::default());
        assert!(config.scenarios.is_empty());
    }

    #[test]
    fn scenarios() {
        let config = r#"
            max_steps = 50

            [responder]
            latency = 0

            [[scenario]]
            name = "wrap"

            [[scenario.op]]
            kind = "read"
            id = 7
            addr = 0x2000
            size = 8
            len = 2
            burst = "wrap"
        "#
        .parse::<BenchConfig>()
        .unwrap();
        assert_eq!(config.max_steps, 50);
        assert_eq!(config.responder.latency, 0);
        assert_eq!(config.responder.ready_period, 1);
        let op = &config.scenarios[0].ops[0];
        assert_eq!((op.kind, op.id, op.addr, op.size, op.len), (OpKind::Read, Some(7), 0x2000, 8, 2));
        assert_eq!(Burst::from(op.burst), Burst::Wrap);
        assert!(op.data.is_empty());
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(matches!("[master]\nmax_outstandng = 3".parse::<BenchConfig>(), Err(ConfigError::Parse(_))));
        assert!(matches!(
            BenchConfig::load(Path::new("/nonexistent/bench.toml")),
            Err(ConfigError::Io { .. })
        ));
    }
}
