//! This module defines the `ValueWriter` trait for emitting protobuf wire data.
//!
//! # Overview
//!
//! The `ValueWriter` trait provides an interface for writing varints, zigzag-encoded
//! integers, fixed-width floats and Protocol Buffers field structures (keys,
//! length-delimited fields, packed repeated fields) to a destination. Implementations
//! choose the destination and byte order; all wire-level layout lives here.

use super::ValueWriterBlob;
use crate::Blob;
use anyhow::{Context, Result};
use byteorder::{ByteOrder, WriteBytesExt};
use std::io::Write;

/// A trait for writing protobuf wire values with a configurable byte order.
pub trait ValueWriter<E: ByteOrder> {
	/// Returns a mutable reference to the underlying writer.
	fn get_writer(&mut self) -> &mut dyn Write;

	/// Returns the current write position as an offset from the start.
	///
	/// # Errors
	///
	/// Returns an error if the position cannot be determined.
	fn position(&mut self) -> Result<u64>;

	/// Returns `true` if nothing has been written yet.
	fn is_empty(&mut self) -> Result<bool> {
		Ok(self.position()? == 0)
	}

	/// Writes an unsigned variable-length integer (varint).
	fn write_varint(&mut self, mut value: u64) -> Result<()> {
		while value >= 0x80 {
			self.get_writer().write_all(&[((value & 0x7F) as u8) | 0x80])?;
			value >>= 7;
		}
		self.get_writer().write_all(&[value as u8])?;
		Ok(())
	}

	/// Writes a signed variable-length integer (zigzag-encoded varint).
	fn write_svarint(&mut self, value: i64) -> Result<()> {
		self.write_varint(((value << 1) ^ (value >> 63)) as u64)
	}

	/// Writes an 8-bit unsigned integer.
	fn write_u8(&mut self, value: u8) -> Result<()> {
		Ok(self.get_writer().write_u8(value)?)
	}

	/// Writes a 32-bit floating-point value using the configured byte order.
	fn write_f32(&mut self, value: f32) -> Result<()> {
		Ok(self.get_writer().write_f32::<E>(value)?)
	}

	/// Writes a 64-bit floating-point value using the configured byte order.
	fn write_f64(&mut self, value: f64) -> Result<()> {
		Ok(self.get_writer().write_f64::<E>(value)?)
	}

	/// Writes the contents of a [`Blob`].
	fn write_blob(&mut self, blob: &Blob) -> Result<()> {
		self.get_writer().write_all(blob.as_slice())?;
		Ok(())
	}

	/// Writes a slice of bytes.
	fn write_slice(&mut self, buf: &[u8]) -> Result<()> {
		self.get_writer().write_all(buf)?;
		Ok(())
	}

	/// Writes a UTF-8 string as raw bytes.
	fn write_string(&mut self, text: &str) -> Result<()> {
		self.get_writer().write_all(text.as_bytes())?;
		Ok(())
	}

	/// Writes a Protocol Buffers field key (field number and wire type) as a varint.
	fn write_pbf_key(&mut self, field_number: u32, wire_type: u8) -> Result<()> {
		self
			.write_varint((u64::from(field_number) << 3) | u64::from(wire_type))
			.context("Failed to write PBF key")
	}

	/// Writes a length-delimited slice of bytes (varint length, then the bytes).
	fn write_pbf_slice(&mut self, buf: &[u8]) -> Result<()> {
		self
			.write_varint(buf.len() as u64)
			.context("Failed to write varint for slice length")?;
		self.write_slice(buf).context("Failed to write PBF slice")
	}

	/// Writes a length-delimited [`Blob`].
	fn write_pbf_blob(&mut self, blob: &Blob) -> Result<()> {
		self.write_pbf_slice(blob.as_slice())
	}

	/// Writes a length-delimited UTF-8 string.
	fn write_pbf_string(&mut self, text: &str) -> Result<()> {
		self.write_pbf_slice(text.as_bytes())
	}

	/// Writes several byte ranges as one length-delimited field.
	///
	/// The single length prefix covers the concatenation of all parts, so callers can
	/// splice independently encoded fragments into one message without an intermediate
	/// copy.
	fn write_pbf_concat(&mut self, parts: &[&[u8]]) -> Result<()> {
		let total: u64 = parts.iter().map(|p| p.len() as u64).sum();
		self
			.write_varint(total)
			.context("Failed to write varint for concatenated length")?;
		for part in parts {
			self.write_slice(part).context("Failed to write concatenated part")?;
		}
		Ok(())
	}

	/// Writes a packed repeated field of unsigned 32-bit integers.
	fn write_pbf_packed_uint32(&mut self, data: &[u32]) -> Result<()> {
		let mut writer = ValueWriterBlob::new_le();
		for &value in data {
			writer
				.write_varint(u64::from(value))
				.context("Failed to write varint for packed uint32")?;
		}
		self
			.write_pbf_blob(&writer.into_blob())
			.context("Failed to write packed uint32 blob")
	}

	/// Writes a packed repeated field of unsigned 64-bit integers.
	fn write_pbf_packed_uint64(&mut self, data: &[u64]) -> Result<()> {
		let mut writer = ValueWriterBlob::new_le();
		for &value in data {
			writer
				.write_varint(value)
				.context("Failed to write varint for packed uint64")?;
		}
		self
			.write_pbf_blob(&writer.into_blob())
			.context("Failed to write packed uint64 blob")
	}

	/// Writes a packed repeated field of zigzag-encoded signed 64-bit integers.
	fn write_pbf_packed_sint64(&mut self, data: &[i64]) -> Result<()> {
		let mut writer = ValueWriterBlob::new_le();
		for &value in data {
			writer
				.write_svarint(value)
				.context("Failed to write svarint for packed sint64")?;
		}
		self
			.write_pbf_blob(&writer.into_blob())
			.context("Failed to write packed sint64 blob")
	}

	/// Writes a packed repeated field of 32-bit floats (fixed width).
	fn write_pbf_packed_f32(&mut self, data: &[f32]) -> Result<()> {
		self
			.write_varint(data.len() as u64 * 4)
			.context("Failed to write varint for packed f32 length")?;
		for &value in data {
			self.write_f32(value).context("Failed to write packed f32 value")?;
		}
		Ok(())
	}

	/// Writes a packed repeated field of 64-bit floats (fixed width).
	fn write_pbf_packed_f64(&mut self, data: &[f64]) -> Result<()> {
		self
			.write_varint(data.len() as u64 * 8)
			.context("Failed to write varint for packed f64 length")?;
		for &value in data {
			self.write_f64(value).context("Failed to write packed f64 value")?;
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use byteorder::LittleEndian;
	use std::io::Cursor;

	pub struct MockValueWriter {
		cursor: Cursor<Vec<u8>>,
	}

	impl MockValueWriter {
		pub fn new() -> Self {
			Self {
				cursor: Cursor::new(Vec::new()),
			}
		}

		pub fn into_inner(self) -> Vec<u8> {
			self.cursor.into_inner()
		}
	}

	impl ValueWriter<LittleEndian> for MockValueWriter {
		fn get_writer(&mut self) -> &mut dyn Write {
			&mut self.cursor
		}

		fn position(&mut self) -> Result<u64> {
			Ok(self.cursor.position())
		}
	}

	#[test]
	fn test_write_varint() -> Result<()> {
		let mut writer = MockValueWriter::new();
		writer.write_varint(300)?;
		assert_eq!(writer.into_inner(), vec![0b10101100, 0b00000010]);
		Ok(())
	}

	#[test]
	fn test_write_svarint() -> Result<()> {
		let mut writer = MockValueWriter::new();
		writer.write_svarint(-75)?;
		assert_eq!(writer.into_inner(), vec![149, 1]);
		Ok(())
	}

	#[test]
	fn test_write_f32() -> Result<()> {
		let mut writer = MockValueWriter::new();
		writer.write_f32(1.0)?;
		assert_eq!(writer.into_inner(), vec![0x00, 0x00, 0x80, 0x3F]);
		Ok(())
	}

	#[test]
	fn test_write_f64() -> Result<()> {
		let mut writer = MockValueWriter::new();
		writer.write_f64(1.0)?;
		assert_eq!(
			writer.into_inner(),
			vec![0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xF0, 0x3F]
		);
		Ok(())
	}

	#[test]
	fn test_write_pbf_key() -> Result<()> {
		let mut writer = MockValueWriter::new();
		writer.write_pbf_key(1, 0)?;
		assert_eq!(writer.into_inner(), vec![0x08]);
		Ok(())
	}

	#[test]
	fn test_write_pbf_string() -> Result<()> {
		let mut writer = MockValueWriter::new();
		writer.write_pbf_string("hello")?;
		assert_eq!(writer.into_inner(), vec![0x05, b'h', b'e', b'l', b'l', b'o']);
		Ok(())
	}

	#[test]
	fn test_write_pbf_blob() -> Result<()> {
		let mut writer = MockValueWriter::new();
		writer.write_pbf_blob(&Blob::from(vec![0x01, 0x02, 0x03]))?;
		assert_eq!(writer.into_inner(), vec![0x03, 0x01, 0x02, 0x03]);
		Ok(())
	}

	#[test]
	fn test_write_pbf_concat() -> Result<()> {
		let mut writer = MockValueWriter::new();
		writer.write_pbf_concat(&[&[0x01, 0x02], &[], &[0x03]])?;
		assert_eq!(writer.into_inner(), vec![0x03, 0x01, 0x02, 0x03]);
		Ok(())
	}

	#[test]
	fn test_write_pbf_packed_uint32() -> Result<()> {
		let mut writer = MockValueWriter::new();
		writer.write_pbf_packed_uint32(&[100, 150, 300])?;
		assert_eq!(writer.into_inner(), vec![5, 100, 150, 1, 172, 2]);
		Ok(())
	}

	#[test]
	fn test_write_pbf_packed_sint64() -> Result<()> {
		let mut writer = MockValueWriter::new();
		writer.write_pbf_packed_sint64(&[1, -1])?;
		assert_eq!(writer.into_inner(), vec![2, 2, 1]);
		Ok(())
	}

	#[test]
	fn test_write_pbf_packed_f32() -> Result<()> {
		let mut writer = MockValueWriter::new();
		writer.write_pbf_packed_f32(&[1.0])?;
		assert_eq!(writer.into_inner(), vec![4, 0x00, 0x00, 0x80, 0x3F]);
		Ok(())
	}

	#[test]
	fn test_write_pbf_packed_f64() -> Result<()> {
		let mut writer = MockValueWriter::new();
		writer.write_pbf_packed_f64(&[1.0])?;
		assert_eq!(
			writer.into_inner(),
			vec![8, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xF0, 0x3F]
		);
		Ok(())
	}
}
