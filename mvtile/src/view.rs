//! Decode views over encoded tiles.
//!
//! `TileView`, `LayerView` and `FeatureView` eagerly parse an encoded tile into plain
//! structs: enough to copy features into a fresh builder, verify round trips and
//! inspect dictionaries and scalings. Unexpected field/wire-type combinations are
//! rejected.

use crate::geometry_type::GeomType;
use crate::layer::TileLocator;
use crate::property_value::{
	ATTR_TYPE_BOOL_NULL, ATTR_TYPE_DOUBLE, ATTR_TYPE_FLOAT, ATTR_TYPE_INT, ATTR_TYPE_SINT,
	ATTR_TYPE_STRING, ATTR_TYPE_UINT, AttributeValue, PropertyValue,
};
use crate::scaling::Scaling;
use anyhow::{Context, Result, anyhow, bail, ensure};
use byteorder::LE;
use mvtile_core::{Blob, io::*};

/// A decoded tile: its layers in encoded order.
#[derive(Debug, Default, PartialEq)]
pub struct TileView {
	pub layers: Vec<LayerView>,
}

impl TileView {
	pub fn from_blob(blob: &Blob) -> Result<TileView> {
		let mut reader = ValueReaderSlice::new_le(blob.as_slice());

		let mut tile = TileView::default();
		while reader.has_remaining() {
			match reader.read_pbf_key().context("Failed to read PBF key")? {
				(3, 2) => {
					let data = reader.read_pbf_blob().context("Failed to read layer record")?;
					let mut sub = ValueReaderSlice::new_le(data.as_slice());
					let mut layer = LayerView::read(&mut sub).context("Failed to read LayerView")?;
					layer.data = data;
					tile.layers.push(layer);
				}
				(f, w) => bail!("Unexpected combination of field number ({f}) and wire type ({w})"),
			}
		}

		Ok(tile)
	}

	pub fn find_layer(&self, name: &str) -> Option<&LayerView> {
		self.layers.iter().find(|layer| layer.name == name)
	}
}

/// A decoded layer: header, dictionaries, scalings and features.
///
/// `data` keeps the raw encoded layer record, so a decoded layer can be spliced back
/// into a tile verbatim.
#[derive(Debug, Default, PartialEq)]
pub struct LayerView {
	pub name: String,
	pub version: u32,
	pub extent: u32,
	pub locator: Option<TileLocator>,
	pub keys: Vec<String>,
	pub values: Vec<Blob>,
	pub string_values: Vec<String>,
	pub double_values: Vec<f64>,
	pub float_values: Vec<f32>,
	pub int_values: Vec<i64>,
	pub elevation_scaling: Option<Scaling>,
	pub attribute_scalings: Vec<Scaling>,
	pub features: Vec<FeatureView>,
	pub data: Blob,
}

impl LayerView {
	pub fn read(reader: &mut dyn ValueReader<'_, LE>) -> Result<LayerView> {
		let mut layer = LayerView {
			extent: 4096,
			version: 1,
			..LayerView::default()
		};
		let mut name = None;
		let mut tile_x = None;
		let mut tile_y = None;
		let mut tile_zoom = None;

		while reader.has_remaining() {
			match reader.read_pbf_key().context("Failed to read PBF key")? {
				(1, 2) => name = Some(reader.read_pbf_string().context("Failed to read layer name")?),
				(2, 2) => layer.features.push(
					FeatureView::read(
						reader
							.get_pbf_sub_reader()
							.context("Failed to get PBF sub-reader for feature")?
							.as_mut(),
					)
					.context("Failed to read FeatureView")?,
				),
				(3, 2) => layer
					.keys
					.push(reader.read_pbf_string().context("Failed to read key")?),
				(4, 2) => layer
					.values
					.push(reader.read_pbf_blob().context("Failed to read value")?),
				(5, 0) => layer.extent = reader.read_varint().context("Failed to read extent")? as u32,
				(6, 2) => layer
					.string_values
					.push(reader.read_pbf_string().context("Failed to read string value")?),
				(7, 2) => layer.double_values.extend(
					reader
						.read_pbf_packed_f64()
						.context("Failed to read double values")?,
				),
				(8, 2) => layer.float_values.extend(
					reader
						.read_pbf_packed_f32()
						.context("Failed to read float values")?,
				),
				(9, 2) => layer.int_values.extend(
					reader
						.read_pbf_packed_sint64()
						.context("Failed to read int values")?,
				),
				(10, 2) => {
					layer.elevation_scaling = Some(
						Scaling::read(
							reader
								.get_pbf_sub_reader()
								.context("Failed to get PBF sub-reader for elevation scaling")?
								.as_mut(),
						)
						.context("Failed to read elevation scaling")?,
					)
				}
				(11, 2) => layer.attribute_scalings.push(
					Scaling::read(
						reader
							.get_pbf_sub_reader()
							.context("Failed to get PBF sub-reader for attribute scaling")?
							.as_mut(),
					)
					.context("Failed to read attribute scaling")?,
				),
				(12, 0) => tile_x = Some(reader.read_varint().context("Failed to read tile x")? as u32),
				(13, 0) => tile_y = Some(reader.read_varint().context("Failed to read tile y")? as u32),
				(14, 0) => tile_zoom = Some(reader.read_varint().context("Failed to read tile zoom")? as u32),
				(15, 0) => layer.version = reader.read_varint().context("Failed to read version")? as u32,
				(f, w) => bail!("Unexpected combination of field number ({f}) and wire type ({w})"),
			}
		}

		if tile_x.is_some() || tile_y.is_some() || tile_zoom.is_some() {
			layer.locator = Some(TileLocator {
				x: tile_x.unwrap_or(0),
				y: tile_y.unwrap_or(0),
				zoom: tile_zoom.unwrap_or(0),
			});
		}

		layer.name = name.ok_or_else(|| anyhow!("Layer name is required"))?;
		Ok(layer)
	}

	pub fn key(&self, index: u32) -> Result<&str> {
		self
			.keys
			.get(index as usize)
			.map(String::as_str)
			.ok_or_else(|| anyhow!("key index {index} out of range"))
	}

	/// Returns the raw encoded value message at `index` (version 1/2 table).
	pub fn value_data(&self, index: u32) -> Result<&[u8]> {
		self
			.values
			.get(index as usize)
			.map(Blob::as_slice)
			.ok_or_else(|| anyhow!("value index {index} out of range"))
	}

	/// Decodes the value message at `index` (version 1/2 table).
	pub fn value(&self, index: u32) -> Result<PropertyValue> {
		let mut reader = ValueReaderSlice::new_le(self.value_data(index)?);
		PropertyValue::read(&mut reader).context("Failed to decode property value")
	}

	pub fn string_value(&self, index: u32) -> Result<&str> {
		self
			.string_values
			.get(index as usize)
			.map(String::as_str)
			.ok_or_else(|| anyhow!("string value index {index} out of range"))
	}

	pub fn attribute_scaling(&self, index: u32) -> Result<Scaling> {
		self
			.attribute_scalings
			.get(index as usize)
			.copied()
			.ok_or_else(|| anyhow!("attribute scaling index {index} out of range"))
	}

	pub fn elevation_scaling(&self) -> Scaling {
		self.elevation_scaling.unwrap_or_default()
	}

	/// Decodes a feature's tag pairs into key/value properties (version 1/2).
	pub fn decode_tags(&self, tag_ids: &[u32]) -> Result<Vec<(String, PropertyValue)>> {
		ensure!(tag_ids.len() % 2 == 0, "tag ids must come in pairs");
		let mut properties = Vec::with_capacity(tag_ids.len() / 2);
		for pair in tag_ids.chunks(2) {
			properties.push((self.key(pair[0])?.to_string(), self.value(pair[1])?));
		}
		Ok(properties)
	}

	/// Decodes a structured attribute stream into key/value pairs (version 3).
	pub fn decode_attributes(&self, words: &[u64]) -> Result<Vec<(String, AttributeValue)>> {
		let mut attributes = Vec::new();
		let mut iter = words.iter();
		while let Some(&key_word) = iter.next() {
			let key = self.key(key_word as u32)?.to_string();
			let &word = iter
				.next()
				.ok_or_else(|| anyhow!("attribute stream ended after a key"))?;
			let param = word >> 3;
			let value = match word & 0x7 {
				ATTR_TYPE_STRING => AttributeValue::String(self.string_value(param as u32)?.to_string()),
				ATTR_TYPE_FLOAT => AttributeValue::Float(
					self
						.float_values
						.get(param as usize)
						.copied()
						.ok_or_else(|| anyhow!("float value index {param} out of range"))?,
				),
				ATTR_TYPE_DOUBLE => AttributeValue::Double(
					self
						.double_values
						.get(param as usize)
						.copied()
						.ok_or_else(|| anyhow!("double value index {param} out of range"))?,
				),
				ATTR_TYPE_INT => AttributeValue::Int(
					self
						.int_values
						.get(param as usize)
						.copied()
						.ok_or_else(|| anyhow!("int value index {param} out of range"))?,
				),
				ATTR_TYPE_UINT => AttributeValue::UInt(param),
				ATTR_TYPE_SINT => AttributeValue::SInt((param >> 1) as i64 ^ -((param & 1) as i64)),
				ATTR_TYPE_BOOL_NULL => match param {
					0 => AttributeValue::Bool(false),
					1 => AttributeValue::Bool(true),
					2 => AttributeValue::Null,
					_ => bail!("invalid bool/null parameter {param}"),
				},
				t => bail!("unknown attribute value type {t}"),
			};
			attributes.push((key, value));
		}
		Ok(attributes)
	}
}

/// A decoded feature: id, geometry and raw attribute references.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FeatureView {
	pub id: Option<u64>,
	pub string_id: Option<String>,
	pub tag_ids: Vec<u32>,
	pub geom_type: GeomType,
	pub geom_data: Blob,
	pub elevations: Vec<i64>,
	pub attributes: Vec<u64>,
	pub geometric_attributes: Vec<u64>,
}

impl FeatureView {
	pub fn read(reader: &mut dyn ValueReader<'_, LE>) -> Result<FeatureView> {
		let mut feature = FeatureView::default();

		while reader.has_remaining() {
			match reader.read_pbf_key().context("Failed to read PBF key")? {
				(1, 0) => feature.id = Some(reader.read_varint().context("Failed to read feature id")?),
				(2, 2) => {
					feature.tag_ids = reader
						.read_pbf_packed_uint32()
						.context("Failed to read tag ids")?
				}
				(3, 0) => {
					feature.geom_type = GeomType::from(
						reader
							.read_varint()
							.context("Failed to read geometry type")?,
					)
				}
				(4, 2) => {
					feature.geom_data = reader
						.read_pbf_blob()
						.context("Failed to read geometry data")?
				}
				(5, 2) => {
					feature.elevations = reader
						.read_pbf_packed_sint64()
						.context("Failed to read elevations")?
				}
				(6, 2) => {
					feature.attributes = reader
						.read_pbf_packed_uint64()
						.context("Failed to read attributes")?
				}
				(7, 2) => {
					feature.geometric_attributes = reader
						.read_pbf_packed_uint64()
						.context("Failed to read geometric attributes")?
				}
				(8, 2) => {
					feature.string_id = Some(
						reader
							.read_pbf_string()
							.context("Failed to read string id")?,
					)
				}
				(f, w) => bail!("Unexpected combination of field number ({f}) and wire type ({w})"),
			}
		}

		Ok(feature)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::feature::{FeatureBuilder, PointFeatureBuilder};
	use crate::tile::TileBuilder;

	#[test]
	fn test_decode_point_feature() -> Result<()> {
		let mut tile = TileBuilder::new();
		let id = tile.add_standard_layer("hello")?;
		let mut feature = PointFeatureBuilder::new(tile.layer_mut(id));
		feature.set_integer_id(1)?;
		feature.add_point((25, 17))?;
		feature.add_property("name", &PropertyValue::from("spot"))?;
		feature.commit()?;

		let view = TileView::from_blob(&tile.serialize()?)?;
		assert_eq!(view.layers.len(), 1);
		let layer = &view.layers[0];
		assert_eq!(layer.name, "hello");
		assert_eq!(layer.version, 2);
		assert_eq!(layer.extent, 4096);
		assert_eq!(layer.features.len(), 1);

		let feature = &layer.features[0];
		assert_eq!(feature.id, Some(1));
		assert_eq!(feature.string_id, None);
		assert_eq!(feature.geom_type, GeomType::Point);
		assert_eq!(feature.geom_data.as_slice(), &[0x09, 0x32, 0x22]);
		assert_eq!(
			layer.decode_tags(&feature.tag_ids)?,
			vec![(String::from("name"), PropertyValue::from("spot"))]
		);
		Ok(())
	}

	#[test]
	fn test_string_id_on_v3_layer() -> Result<()> {
		let mut tile = TileBuilder::new();
		let id = tile.add_layer("places", 3, 4096)?;
		let mut feature = PointFeatureBuilder::new(tile.layer_mut(id));
		feature.set_string_id("foo")?;
		feature.add_point((1, 2))?;
		feature.commit()?;

		let view = TileView::from_blob(&tile.serialize()?)?;
		let feature = &view.layers[0].features[0];
		assert_eq!(feature.string_id.as_deref(), Some("foo"));
		assert_eq!(feature.id, None);
		Ok(())
	}

	#[test]
	fn test_tile_locator_round_trips() -> Result<()> {
		let locator = TileLocator { x: 5, y: 3, zoom: 12 };
		let mut tile = TileBuilder::new();
		let id = tile.add_layer_with_locator("located", 8192, locator)?;
		let mut feature = PointFeatureBuilder::new(tile.layer_mut(id));
		feature.add_point((1, 1))?;
		feature.commit()?;

		let view = TileView::from_blob(&tile.serialize()?)?;
		let layer = view.find_layer("located").unwrap();
		assert_eq!(layer.extent, 8192);
		assert_eq!(layer.locator, Some(locator));
		Ok(())
	}

	#[test]
	fn test_scalings_round_trip() -> Result<()> {
		let mut tile = TileBuilder::new();
		let id = tile.add_layer("scaled", 3, 4096)?;
		let layer = tile.layer_mut(id);
		layer.set_elevation_scaling(Scaling::new(11, 2.2, 3.3));
		let scalings = [
			Scaling::new(1, 1.5, 0.0),
			Scaling::new(-2, 1.0, 4.5),
			Scaling::new(0, 0.25, -1.0),
		];
		for (index, scaling) in scalings.iter().enumerate() {
			assert_eq!(layer.add_attribute_scaling(*scaling), index as u32);
		}
		let mut feature = PointFeatureBuilder::new(layer);
		feature.add_point((1, 1))?;
		feature.commit()?;

		let view = TileView::from_blob(&tile.serialize()?)?;
		let layer = &view.layers[0];
		assert_eq!(layer.elevation_scaling(), Scaling::new(11, 2.2, 3.3));
		for (index, scaling) in scalings.iter().enumerate() {
			assert_eq!(layer.attribute_scaling(index as u32)?, *scaling);
		}
		assert!(layer.attribute_scaling(3).is_err());
		Ok(())
	}

	#[test]
	fn test_structured_attributes_round_trip() -> Result<()> {
		let mut tile = TileBuilder::new();
		let id = tile.add_layer("attrs", 3, 4096)?;
		let mut feature = PointFeatureBuilder::new(tile.layer_mut(id));
		feature.add_point((1, 1))?;
		let attributes = [
			("name", AttributeValue::String(String::from("spot"))),
			("height", AttributeValue::Double(12.5)),
			("lanes", AttributeValue::Int(-3)),
			("count", AttributeValue::UInt(7)),
			("delta", AttributeValue::SInt(-4)),
			("open", AttributeValue::Bool(true)),
			("note", AttributeValue::Null),
		];
		for (key, value) in &attributes {
			feature.add_attribute(key, value)?;
		}
		feature.add_elevations(&[3, -1, 4]);
		feature.commit()?;

		let view = TileView::from_blob(&tile.serialize()?)?;
		let layer = &view.layers[0];
		let feature = &layer.features[0];
		let decoded = layer.decode_attributes(&feature.attributes)?;
		for ((key, value), (decoded_key, decoded_value)) in attributes.iter().zip(&decoded) {
			assert_eq!(key, decoded_key);
			assert_eq!(value, decoded_value);
		}
		assert_eq!(feature.elevations, vec![3, -1, 4]);
		Ok(())
	}

	#[test]
	fn test_rollback_set_appears_in_commit_order() -> Result<()> {
		let mut tile = TileBuilder::new();
		let id = tile.add_standard_layer("sparse")?;
		for feature_id in 1u64..=8 {
			let mut feature = PointFeatureBuilder::new(tile.layer_mut(id));
			feature.set_integer_id(feature_id)?;
			feature.add_point((0, 0))?;
			if feature_id == 1 || feature_id == 8 {
				feature.commit()?;
			} else {
				feature.rollback();
			}
		}

		let view = TileView::from_blob(&tile.serialize()?)?;
		let ids: Vec<Option<u64>> = view.layers[0].features.iter().map(|f| f.id).collect();
		assert_eq!(ids, vec![Some(1), Some(8)]);
		Ok(())
	}

	#[test]
	fn test_byte_round_trip_through_existing_layers() -> Result<()> {
		// build a tile with two layers and assorted content
		let mut tile = TileBuilder::new();
		let id = tile.add_standard_layer("roads")?;
		let mut feature: FeatureBuilder = FeatureBuilder::new(tile.layer_mut(id));
		feature.set_integer_id(3)?;
		feature.set_raw_geometry(GeomType::Linestring, &[0x09, 0x02, 0x02, 0x0A, 0x04, 0x04]);
		feature.add_property("kind", &PropertyValue::from("path"))?;
		feature.commit()?;
		let id = tile.add_layer("houses", 1, 2048)?;
		let mut feature = PointFeatureBuilder::new(tile.layer_mut(id));
		feature.add_point((9, 9))?;
		feature.add_property("floors", &PropertyValue::Int(2))?;
		feature.commit()?;
		let original = tile.serialize()?;

		// decode and splice each layer back verbatim
		let view = TileView::from_blob(&original)?;
		let mut rebuilt = TileBuilder::new();
		for layer in view.layers {
			rebuilt.add_existing_layer(layer.data);
		}
		assert_eq!(rebuilt.serialize()?, original);
		Ok(())
	}

	#[test]
	fn test_rejects_unknown_field() {
		// field 16, wire type 0 is not part of the layer message
		let data = Blob::from(&[0x1A, 0x02, 0x80, 0x01]);
		assert!(TileView::from_blob(&data).is_err());
	}
}
