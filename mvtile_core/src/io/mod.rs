//! Value readers and writers for the protobuf wire format.
//!
//! The [`ValueWriter`] and [`ValueReader`] traits provide a uniform interface for
//! emitting and parsing varints, zigzag-encoded integers, fixed-width floats,
//! length-delimited fields and packed repeated fields. [`ValueWriterBlob`] writes
//! into an in-memory buffer, [`ValueReaderSlice`] parses a borrowed byte slice.

mod value_reader;
mod value_reader_slice;
mod value_writer;
mod value_writer_blob;

pub use value_reader::*;
pub use value_reader_slice::*;
pub use value_writer::*;
pub use value_writer_blob::*;
