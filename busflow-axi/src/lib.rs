//! AXI4 master protocol engine.
//!
//! [`MasterAdapter`] turns read and write requests into handshakes on the five channels of a
//! [`Bus`] and reports the outcome of every transaction as an [`Event`]. The slave side is any
//! [`Responder`]; [`step`] advances both by one clock edge.

// # Tries to deny all lints (`rustc -W help`).
#![deny(absolute_paths_not_starting_with_crate)]
#![deny(anonymous_parameters)]
#![deny(deprecated_in_future)]
#![deny(explicit_outlives_requirements)]
#![deny(keyword_idents)]
#![deny(macro_use_extern_crate)]
#![deny(missing_debug_implementations)]
#![deny(non_ascii_idents)]
#![deny(rust_2018_idioms)]
#![deny(trivial_numeric_casts)]
#![deny(unsafe_op_in_unsafe_fn)]
#![deny(unused_extern_crates)]
#![deny(unused_import_braces)]
//
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(rustdoc::missing_crate_level_docs)]
#![deny(rustdoc::invalid_codeblock_attributes)]
#![deny(rustdoc::invalid_html_tags)]
#![deny(rustdoc::bare_urls)]
//
#![allow(elided_lifetimes_in_paths)]

pub mod burst;
pub mod bus;
pub mod config;
pub mod error;
pub mod event;
pub mod master;
pub mod read;
pub mod tracker;
pub mod types;
pub mod write;

pub use burst::{lane_strobe, BurstAddrs, BurstConfig};
pub use bus::{Bus, Responder, Transfers};
pub use config::MasterConfig;
pub use error::{Error, Violation};
pub use event::{Event, ReadBeat, ResponseChannel, Stats};
pub use master::{step, MasterAdapter, TxnState};
pub use read::ReadState;
pub use tracker::{Direction, Tracker};
pub use types::*;
pub use write::WriteState;
