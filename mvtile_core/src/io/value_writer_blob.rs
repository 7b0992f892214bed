//! This module provides the `ValueWriterBlob` struct for writing values to an in-memory
//! buffer.
//!
//! # Overview
//!
//! `ValueWriterBlob` implements [`ValueWriter`] over a growable byte buffer. Beyond plain
//! appending it supports two buffer-level operations the builder pipeline relies on:
//! truncating back to an earlier mark (feature rollback) and inserting bytes at a marked
//! offset (splicing a field header in front of an already streamed message body).

use super::ValueWriter;
use crate::types::Blob;
use anyhow::Result;
use byteorder::{ByteOrder, LittleEndian};
use std::io::{Cursor, Write};
use std::marker::PhantomData;

/// A writer that appends values to an in-memory buffer using a specified byte order.
pub struct ValueWriterBlob<E: ByteOrder> {
	_phantom: PhantomData<E>,
	cursor: Cursor<Vec<u8>>,
}

impl<E: ByteOrder> ValueWriterBlob<E> {
	/// Creates a new, empty `ValueWriterBlob`.
	pub fn new() -> ValueWriterBlob<E> {
		ValueWriterBlob {
			_phantom: PhantomData,
			cursor: Cursor::new(Vec::new()),
		}
	}

	/// Creates a new `ValueWriterBlob` with the given buffer capacity pre-allocated.
	pub fn with_capacity(capacity: usize) -> ValueWriterBlob<E> {
		ValueWriterBlob {
			_phantom: PhantomData,
			cursor: Cursor::new(Vec::with_capacity(capacity)),
		}
	}

	/// Returns the written data as a byte slice.
	pub fn as_slice(&self) -> &[u8] {
		self.cursor.get_ref()
	}

	/// Returns the number of bytes written so far.
	pub fn len(&self) -> u64 {
		self.cursor.get_ref().len() as u64
	}

	/// Returns `true` if nothing has been written yet.
	pub fn is_empty(&self) -> bool {
		self.cursor.get_ref().is_empty()
	}

	/// Discards everything written after byte `length`, moving the write position back.
	pub fn truncate(&mut self, length: u64) {
		self.cursor.get_mut().truncate(length as usize);
		self.cursor.set_position(length);
	}

	/// Inserts `bytes` at `offset`, shifting everything after it towards the end.
	///
	/// The write position stays at the end of the buffer.
	pub fn insert_at(&mut self, offset: u64, bytes: &[u8]) {
		let buffer = self.cursor.get_mut();
		let offset = offset as usize;
		buffer.splice(offset..offset, bytes.iter().copied());
		let end = buffer.len() as u64;
		self.cursor.set_position(end);
	}

	/// Converts the written data into a [`Blob`].
	pub fn into_blob(self) -> Blob {
		Blob::from(self.cursor.into_inner())
	}
}

impl ValueWriterBlob<LittleEndian> {
	/// Creates a new `ValueWriterBlob` with little-endian byte order.
	pub fn new_le() -> ValueWriterBlob<LittleEndian> {
		ValueWriterBlob::new()
	}
}

impl<E: ByteOrder> ValueWriter<E> for ValueWriterBlob<E> {
	fn get_writer(&mut self) -> &mut dyn Write {
		&mut self.cursor
	}

	fn position(&mut self) -> Result<u64> {
		Ok(self.cursor.position())
	}
}

impl<E: ByteOrder> Default for ValueWriterBlob<E> {
	fn default() -> Self {
		Self::new()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_write_varint() -> Result<()> {
		let mut writer = ValueWriterBlob::new_le();
		writer.write_varint(300)?;
		assert_eq!(writer.into_blob().into_vec(), vec![0b10101100, 0b00000010]);
		Ok(())
	}

	#[test]
	fn test_truncate() -> Result<()> {
		let mut writer = ValueWriterBlob::new_le();
		writer.write_slice(&[1, 2, 3, 4, 5])?;
		writer.truncate(2);
		writer.write_slice(&[9])?;
		assert_eq!(writer.into_blob().into_vec(), vec![1, 2, 9]);
		Ok(())
	}

	#[test]
	fn test_insert_at() -> Result<()> {
		let mut writer = ValueWriterBlob::new_le();
		writer.write_slice(&[1, 2, 5])?;
		writer.insert_at(2, &[3, 4]);
		writer.write_slice(&[6])?;
		assert_eq!(writer.into_blob().into_vec(), vec![1, 2, 3, 4, 5, 6]);
		Ok(())
	}

	#[test]
	fn test_with_capacity_starts_empty() {
		let writer = ValueWriterBlob::<LittleEndian>::with_capacity(64);
		assert!(writer.is_empty());
		assert_eq!(writer.len(), 0);
	}

	#[test]
	fn test_write_pbf_string() -> Result<()> {
		let mut writer = ValueWriterBlob::new_le();
		writer.write_pbf_string("hello")?;
		assert_eq!(
			writer.into_blob().into_vec(),
			vec![0x05, b'h', b'e', b'l', b'l', b'o']
		);
		Ok(())
	}
}
