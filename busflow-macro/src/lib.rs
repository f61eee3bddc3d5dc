//! `#[derive(Signal)]` for bus payload types.
//!
//! # Note
//!
//! The generated impl refers to `Signal` and `PortDecls` unqualified, so both must be in scope at
//! the derive site (`use busflow::*;`).
//!
//! Structs are packed field by field, the first field in the least significant bits. Each field
//! becomes a named port; `#[member(name = "...")]` renames it and an empty name splices the
//! field's own ports into the parent.
//!
//! ```ignore
//! #[derive(Debug, Clone, Signal)]
//! pub struct WriteResp {
//!     id: Id,
//!     resp: Resp,
//!     user: User,
//! }
//!
//! // expands to
//! impl Signal for WriteResp {
//!     const WIDTH: usize = 0 + <Id>::WIDTH + <Resp>::WIDTH + <User>::WIDTH;
//!     ...
//!     fn port_decls() -> PortDecls {
//!         PortDecls::Struct(vec![
//!             (Some("id".to_string()), <Id>::port_decls()),
//!             (Some("resp".to_string()), <Resp>::port_decls()),
//!             (Some("user".to_string()), <User>::port_decls()),
//!         ])
//!     }
//! }
//! ```
//!
//! Unit-only enums are encoded by declaration index, or by `#[encode(N)]` per variant, in
//! `clog2(variants)` bits unless `#[width(N)]` says otherwise.

mod signal;
mod utils;

use proc_macro::TokenStream;

#[proc_macro_derive(Signal, attributes(member, width, encode))]
pub fn signal(input: TokenStream) -> TokenStream { signal::derive(input) }
