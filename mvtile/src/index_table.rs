//! Per-layer interning tables.
//!
//! `IndexTable` stores its entries already serialized as layer-level fields, so the
//! table bytes splice straight into the layer message at build time. Duplicate
//! detection starts as a linear scan over those bytes; once the table reaches
//! [`DEDUP_THRESHOLD`] entries a hash map is populated from them and used from then
//! on. `NumberTable` holds version 3 numeric values in a typed vector and always
//! scans linearly, comparing bit patterns.

use anyhow::{Context, Result};
use mvtile_core::io::*;
use std::collections::HashMap;

/// Table size at which duplicate detection switches from a linear scan to a hash map.
pub(crate) const DEDUP_THRESHOLD: u32 = 20;

pub(crate) struct IndexTable {
	field: u32,
	data: ValueWriterBlob<byteorder::LittleEndian>,
	count: u32,
	map: Option<HashMap<Vec<u8>, u32>>,
}

impl IndexTable {
	/// Creates a table whose entries serialize as length-delimited fields with the
	/// given layer-level field number.
	pub fn new(field: u32) -> IndexTable {
		IndexTable {
			field,
			data: ValueWriterBlob::new_le(),
			count: 0,
			map: None,
		}
	}

	/// Adds an entry, returning the index of an existing equal entry if there is one.
	pub fn add(&mut self, payload: &[u8]) -> Result<u32> {
		if let Some(index) = self.position_of(payload)? {
			return Ok(index);
		}
		self.add_without_dup_check(payload)
	}

	/// Adds an entry without duplicate detection. Always appends.
	pub fn add_without_dup_check(&mut self, payload: &[u8]) -> Result<u32> {
		let index = self.count;
		self
			.data
			.write_pbf_key(self.field, 2)
			.context("Failed to write PBF key for table entry")?;
		self
			.data
			.write_pbf_slice(payload)
			.context("Failed to write table entry")?;
		self.count += 1;

		if let Some(map) = &mut self.map {
			map.entry(payload.to_vec()).or_insert(index);
		} else if self.count == DEDUP_THRESHOLD {
			self.build_map().context("Failed to index table entries")?;
		}
		Ok(index)
	}

	/// Returns the serialized table bytes, ready to splice into the layer message.
	pub fn data(&self) -> &[u8] {
		self.data.as_slice()
	}

	pub fn len(&self) -> u32 {
		self.count
	}

	pub fn is_empty(&self) -> bool {
		self.count == 0
	}

	fn position_of(&self, payload: &[u8]) -> Result<Option<u32>> {
		if let Some(map) = &self.map {
			return Ok(map.get(payload).copied());
		}

		let mut reader = ValueReaderSlice::new_le(self.data.as_slice());
		let mut index = 0u32;
		while reader.has_remaining() {
			reader.read_pbf_key().context("Failed to read table entry key")?;
			let entry = reader.read_pbf_blob().context("Failed to read table entry")?;
			if entry.as_slice() == payload {
				return Ok(Some(index));
			}
			index += 1;
		}
		Ok(None)
	}

	fn build_map(&mut self) -> Result<()> {
		let mut map = HashMap::with_capacity(self.count as usize);
		let mut reader = ValueReaderSlice::new_le(self.data.as_slice());
		let mut index = 0u32;
		while reader.has_remaining() {
			reader.read_pbf_key().context("Failed to read table entry key")?;
			let entry = reader.read_pbf_blob().context("Failed to read table entry")?;
			map.entry(entry.into_vec()).or_insert(index);
			index += 1;
		}
		self.map = Some(map);
		Ok(())
	}
}

/// Bitwise equality for number table entries. Floats compare by bit pattern, so
/// `0.0` and `-0.0` are distinct and `NaN` equals itself.
pub(crate) trait TableValue: Copy {
	fn same_bits(self, other: Self) -> bool;
}

impl TableValue for f64 {
	fn same_bits(self, other: Self) -> bool {
		self.to_bits() == other.to_bits()
	}
}

impl TableValue for f32 {
	fn same_bits(self, other: Self) -> bool {
		self.to_bits() == other.to_bits()
	}
}

impl TableValue for i64 {
	fn same_bits(self, other: Self) -> bool {
		self == other
	}
}

#[derive(Default)]
pub(crate) struct NumberTable<T: TableValue> {
	values: Vec<T>,
}

impl<T: TableValue> NumberTable<T> {
	pub fn new() -> NumberTable<T> {
		NumberTable { values: Vec::new() }
	}

	pub fn add(&mut self, value: T) -> u32 {
		if let Some(index) = self.values.iter().position(|v| v.same_bits(value)) {
			return index as u32;
		}
		self.add_without_dup_check(value)
	}

	pub fn add_without_dup_check(&mut self, value: T) -> u32 {
		self.values.push(value);
		(self.values.len() - 1) as u32
	}

	pub fn values(&self) -> &[T] {
		&self.values
	}

	pub fn len(&self) -> u32 {
		self.values.len() as u32
	}

	pub fn is_empty(&self) -> bool {
		self.values.is_empty()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_add_dedups() -> Result<()> {
		let mut table = IndexTable::new(3);
		assert_eq!(table.add(b"key1")?, 0);
		assert_eq!(table.add(b"key2")?, 1);
		assert_eq!(table.add(b"key1")?, 0);
		assert_eq!(table.len(), 2);
		Ok(())
	}

	#[test]
	fn test_add_without_dup_check_appends() -> Result<()> {
		let mut table = IndexTable::new(3);
		assert_eq!(table.add_without_dup_check(b"key1")?, 0);
		assert_eq!(table.add_without_dup_check(b"key1")?, 1);
		// dedup lookups resolve to the first occurrence
		assert_eq!(table.add(b"key1")?, 0);
		Ok(())
	}

	#[test]
	fn test_data_is_serialized_fields() -> Result<()> {
		let mut table = IndexTable::new(3);
		table.add(b"key")?;
		assert_eq!(table.data(), &[0x1A, 0x03, b'k', b'e', b'y']);
		Ok(())
	}

	#[test]
	fn test_dedup_across_threshold() -> Result<()> {
		// behavior must not change when the table switches to the hash map at 20
		let mut table = IndexTable::new(3);
		for i in 0u32..25 {
			let key = format!("key{i}");
			assert_eq!(table.add(key.as_bytes())?, i);
		}
		for i in (0u32..25).rev() {
			let key = format!("key{i}");
			assert_eq!(table.add(key.as_bytes())?, i);
		}
		assert_eq!(table.len(), 25);
		Ok(())
	}

	#[test]
	fn test_map_promotion_keeps_first_duplicate() -> Result<()> {
		let mut table = IndexTable::new(3);
		table.add_without_dup_check(b"dup")?;
		table.add_without_dup_check(b"dup")?;
		for i in 0..30 {
			table.add(format!("key{i}").as_bytes())?;
		}
		assert_eq!(table.add(b"dup")?, 0);
		Ok(())
	}

	#[test]
	fn test_number_table_bit_pattern_equality() {
		let mut table = NumberTable::<f64>::new();
		assert_eq!(table.add(19.0), 0);
		assert_eq!(table.add(19.0), 0);
		assert_eq!(table.add(-0.0), 1);
		assert_eq!(table.add(0.0), 2);
		assert_eq!(table.add(f64::NAN), 3);
		assert_eq!(table.add(f64::NAN), 3);
		assert_eq!(table.values().len(), 4);
	}

	#[test]
	fn test_number_table_without_dup_check() {
		let mut table = NumberTable::<i64>::new();
		assert_eq!(table.add(7), 0);
		assert_eq!(table.add_without_dup_check(7), 1);
		assert_eq!(table.add(7), 0);
	}
}
