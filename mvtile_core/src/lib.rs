//! Byte buffers and low-level protobuf plumbing for the mvtile encoder.
//!
//! This crate carries no tile semantics of its own. It provides [`Blob`], an
//! owned byte buffer, and the [`io`] module with the `ValueWriter`/`ValueReader`
//! pair used to emit and parse protobuf wire data (varints, zigzag integers,
//! length-delimited fields, packed repeated fields).

pub mod io;
pub mod types;
pub use types::*;
