//! The fresh layer builder.
//!
//! A `LayerBuilder` owns the streaming byte buffer of one layer message. The header
//! fields (version, name, extent) are written at construction, committed features are
//! appended one after another, and the dictionary tables are spliced in at build time.

use crate::index_table::{IndexTable, NumberTable};
use crate::property_value::PropertyValue;
use crate::scaling::Scaling;
use anyhow::{Context, Result, ensure};
use byteorder::LittleEndian;
use log::debug;
use mvtile_core::io::*;

/// The tile address of a version 3 layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TileLocator {
	pub x: u32,
	pub y: u32,
	pub zoom: u32,
}

/// Builds one fresh layer: buffer, dictionaries and feature count.
///
/// Obtained from [`crate::TileBuilder::add_layer`]; features are added through the
/// feature builders, which borrow the layer exclusively for the life of one feature.
pub struct LayerBuilder {
	name: String,
	version: u32,
	extent: u32,
	buffer: ValueWriterBlob<LittleEndian>,
	keys: IndexTable,
	values: IndexTable,
	string_values: IndexTable,
	double_values: NumberTable<f64>,
	float_values: NumberTable<f32>,
	int_values: NumberTable<i64>,
	attribute_scalings: Vec<Scaling>,
	elevation_scaling: Option<Scaling>,
	locator: Option<TileLocator>,
	num_features: u64,
}

impl LayerBuilder {
	pub(crate) fn new(name: &str, version: u32, extent: u32) -> Result<LayerBuilder> {
		ensure!((1..=3).contains(&version), "layer version must be 1, 2 or 3");
		ensure!(!name.is_empty(), "layer name must not be empty");

		let mut buffer = ValueWriterBlob::new_le();
		buffer
			.write_pbf_key(15, 0)
			.context("Failed to write PBF key for layer version")?;
		buffer
			.write_varint(u64::from(version))
			.context("Failed to write layer version")?;
		buffer
			.write_pbf_key(1, 2)
			.context("Failed to write PBF key for layer name")?;
		buffer
			.write_pbf_string(name)
			.context("Failed to write layer name")?;
		buffer
			.write_pbf_key(5, 0)
			.context("Failed to write PBF key for extent")?;
		buffer
			.write_varint(u64::from(extent))
			.context("Failed to write extent")?;

		Ok(LayerBuilder {
			name: name.to_string(),
			version,
			extent,
			buffer,
			keys: IndexTable::new(3),
			values: IndexTable::new(4),
			string_values: IndexTable::new(6),
			double_values: NumberTable::new(),
			float_values: NumberTable::new(),
			int_values: NumberTable::new(),
			attribute_scalings: Vec::new(),
			elevation_scaling: None,
			locator: None,
			num_features: 0,
		})
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn version(&self) -> u32 {
		self.version
	}

	pub fn extent(&self) -> u32 {
		self.extent
	}

	/// Number of committed features.
	pub fn num_features(&self) -> u64 {
		self.num_features
	}

	/// Sets the tile address of this layer.
	///
	/// # Panics
	///
	/// Panics if the layer version is not 3.
	pub fn set_tile_locator(&mut self, locator: TileLocator) {
		assert_eq!(self.version, 3, "a tile locator needs layer version 3");
		self.locator = Some(locator);
	}

	pub fn tile_locator(&self) -> Option<TileLocator> {
		self.locator
	}

	/// Interns a key, returning its index in the `keys` table.
	pub fn add_key(&mut self, key: &str) -> Result<u32> {
		self.keys.add(key.as_bytes())
	}

	/// Appends a key without duplicate detection.
	pub fn add_key_without_dup_check(&mut self, key: &str) -> Result<u32> {
		self.keys.add_without_dup_check(key.as_bytes())
	}

	/// Interns a property value into the version 1/2 `values` table.
	///
	/// Deduplication is by encoded bytes, so distinct encodings of the same logical
	/// number stay distinct entries.
	///
	/// # Panics
	///
	/// Panics if the layer version is 3.
	pub fn add_value(&mut self, value: &PropertyValue) -> Result<u32> {
		let data = value.to_blob().context("Failed to encode property value")?;
		self.add_value_data(data.as_slice())
	}

	pub fn add_value_without_dup_check(&mut self, value: &PropertyValue) -> Result<u32> {
		let data = value.to_blob().context("Failed to encode property value")?;
		self.add_value_data_without_dup_check(data.as_slice())
	}

	/// Interns an already encoded value message into the `values` table.
	pub fn add_value_data(&mut self, data: &[u8]) -> Result<u32> {
		assert!(self.version < 3, "the values table needs layer version 1 or 2");
		self.values.add(data)
	}

	pub fn add_value_data_without_dup_check(&mut self, data: &[u8]) -> Result<u32> {
		assert!(self.version < 3, "the values table needs layer version 1 or 2");
		self.values.add_without_dup_check(data)
	}

	/// Interns a string into the version 3 `string_values` table.
	///
	/// # Panics
	///
	/// Panics if the layer version is not 3 (as do all version 3 table operations).
	pub fn add_string_value(&mut self, value: &str) -> Result<u32> {
		assert_eq!(self.version, 3, "string values need layer version 3");
		self.string_values.add(value.as_bytes())
	}

	pub fn add_string_value_without_dup_check(&mut self, value: &str) -> Result<u32> {
		assert_eq!(self.version, 3, "string values need layer version 3");
		self.string_values.add_without_dup_check(value.as_bytes())
	}

	pub fn add_double_value(&mut self, value: f64) -> u32 {
		assert_eq!(self.version, 3, "double values need layer version 3");
		self.double_values.add(value)
	}

	pub fn add_double_value_without_dup_check(&mut self, value: f64) -> u32 {
		assert_eq!(self.version, 3, "double values need layer version 3");
		self.double_values.add_without_dup_check(value)
	}

	pub fn add_float_value(&mut self, value: f32) -> u32 {
		assert_eq!(self.version, 3, "float values need layer version 3");
		self.float_values.add(value)
	}

	pub fn add_float_value_without_dup_check(&mut self, value: f32) -> u32 {
		assert_eq!(self.version, 3, "float values need layer version 3");
		self.float_values.add_without_dup_check(value)
	}

	pub fn add_int_value(&mut self, value: i64) -> u32 {
		assert_eq!(self.version, 3, "int values need layer version 3");
		self.int_values.add(value)
	}

	pub fn add_int_value_without_dup_check(&mut self, value: i64) -> u32 {
		assert_eq!(self.version, 3, "int values need layer version 3");
		self.int_values.add_without_dup_check(value)
	}

	/// Registers an attribute scaling, returning its index.
	pub fn add_attribute_scaling(&mut self, scaling: Scaling) -> u32 {
		assert_eq!(self.version, 3, "attribute scalings need layer version 3");
		self.attribute_scalings.push(scaling);
		(self.attribute_scalings.len() - 1) as u32
	}

	pub fn set_elevation_scaling(&mut self, scaling: Scaling) {
		assert_eq!(self.version, 3, "an elevation scaling needs layer version 3");
		self.elevation_scaling = Some(scaling);
	}

	pub fn elevation_scaling(&self) -> Scaling {
		self.elevation_scaling.unwrap_or_default()
	}

	pub(crate) fn key_count(&self) -> u32 {
		self.keys.len()
	}

	pub(crate) fn value_count(&self) -> u32 {
		self.values.len()
	}

	/// Estimated size of the built layer record, used to pre-reserve tile capacity.
	pub fn estimated_size(&self) -> usize {
		let mut size = self.buffer.len() as usize;
		size += self.keys.data().len() + self.values.data().len();
		size += self.string_values.data().len();
		size += self.double_values.values().len() * 9;
		size += self.float_values.values().len() * 5;
		size += self.int_values.values().len() * 10;
		size += self.attribute_scalings.len() * 22 + 22;
		size
	}

	// The remaining operations serve the feature builders and the tile builder.

	pub(crate) fn writer(&mut self) -> &mut ValueWriterBlob<LittleEndian> {
		&mut self.buffer
	}

	pub(crate) fn mark(&self) -> u64 {
		self.buffer.len()
	}

	pub(crate) fn truncate_to(&mut self, mark: u64) {
		self.buffer.truncate(mark);
	}

	/// Finishes the feature streamed since `mark`: splices the `features` field header
	/// in front of its body and counts it.
	pub(crate) fn commit_feature(&mut self, mark: u64) -> Result<()> {
		let body_length = self.buffer.len() - mark;
		let mut header = ValueWriterBlob::new_le();
		header
			.write_pbf_key(2, 2)
			.context("Failed to write PBF key for feature")?;
		header
			.write_varint(body_length)
			.context("Failed to write feature length")?;
		self.buffer.insert_at(mark, header.as_slice());
		self.num_features += 1;
		Ok(())
	}

	/// Emits this layer as one length-delimited record into `writer`.
	///
	/// The buffer, the dictionary tables and the version 3 tail are concatenated
	/// under a single length prefix without an intermediate copy.
	pub(crate) fn build(&self, writer: &mut ValueWriterBlob<LittleEndian>) -> Result<()> {
		debug!(
			"building layer '{}' with {} features, {} keys",
			self.name,
			self.num_features,
			self.keys.len()
		);
		let tail = self.build_tail().context("Failed to build layer tail")?;
		writer
			.write_pbf_concat(&[
				self.buffer.as_slice(),
				self.keys.data(),
				self.values.data(),
				tail.as_slice(),
			])
			.context("Failed to write layer record")
	}

	fn build_tail(&self) -> Result<ValueWriterBlob<LittleEndian>> {
		let mut tail = ValueWriterBlob::new_le();
		if self.version < 3 {
			return Ok(tail);
		}

		tail.write_slice(self.string_values.data())
			.context("Failed to write string values")?;

		if !self.double_values.is_empty() {
			tail.write_pbf_key(7, 2)
				.context("Failed to write PBF key for double values")?;
			tail.write_pbf_packed_f64(self.double_values.values())
				.context("Failed to write double values")?;
		}
		if !self.float_values.is_empty() {
			tail.write_pbf_key(8, 2)
				.context("Failed to write PBF key for float values")?;
			tail.write_pbf_packed_f32(self.float_values.values())
				.context("Failed to write float values")?;
		}
		if !self.int_values.is_empty() {
			tail.write_pbf_key(9, 2)
				.context("Failed to write PBF key for int values")?;
			tail.write_pbf_packed_sint64(self.int_values.values())
				.context("Failed to write int values")?;
		}

		if let Some(scaling) = &self.elevation_scaling {
			tail.write_pbf_key(10, 2)
				.context("Failed to write PBF key for elevation scaling")?;
			tail.write_pbf_blob(&scaling.to_blob()?)
				.context("Failed to write elevation scaling")?;
		}
		for scaling in &self.attribute_scalings {
			tail.write_pbf_key(11, 2)
				.context("Failed to write PBF key for attribute scaling")?;
			tail.write_pbf_blob(&scaling.to_blob()?)
				.context("Failed to write attribute scaling")?;
		}

		if let Some(locator) = &self.locator {
			tail.write_pbf_key(12, 0)
				.context("Failed to write PBF key for tile x")?;
			tail.write_varint(u64::from(locator.x)).context("Failed to write tile x")?;
			tail.write_pbf_key(13, 0)
				.context("Failed to write PBF key for tile y")?;
			tail.write_varint(u64::from(locator.y)).context("Failed to write tile y")?;
			tail.write_pbf_key(14, 0)
				.context("Failed to write PBF key for tile zoom")?;
			tail.write_varint(u64::from(locator.zoom))
				.context("Failed to write tile zoom")?;
		}

		Ok(tail)
	}
}
