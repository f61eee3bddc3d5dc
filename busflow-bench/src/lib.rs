//! Testbench for the AXI4 master: slave models, a handshake tracer and a scenario runner.

#![deny(missing_debug_implementations)]
#![deny(rust_2018_idioms)]
#![deny(trivial_numeric_casts)]
#![deny(unused_extern_crates)]
#![deny(unused_import_braces)]
//
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(rustdoc::missing_crate_level_docs)]
//
#![allow(elided_lifetimes_in_paths)]

pub mod config;
pub mod harness;
pub mod memory;
pub mod script;
pub mod trace;

pub use config::{BenchConfig, BurstKind, ConfigError, Op, OpKind, Scenario};
pub use harness::{run_scenario, BenchError, ScenarioReport, Testbench};
pub use memory::{MemoryResponder, ResponderConfig};
pub use script::ScriptedResponder;
pub use trace::WireTrace;
