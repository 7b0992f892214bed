//! Property values for the classic (version 1/2) value table and typed attribute
//! values for version 3.

use crate::geometry::zigzag64;
use anyhow::{Context, Result, anyhow, bail};
use byteorder::LE;
use mvtile_core::{Blob, io::*};

/// A value message entry of the version 1/2 value table.
///
/// `Int` and `SInt` carry the same logical range but encode differently on the wire
/// (plain varint vs. zigzag); they intern as distinct table entries.
#[derive(Clone, Debug, PartialEq)]
pub enum PropertyValue {
	String(String),
	Float(f32),
	Double(f64),
	Int(i64),
	UInt(u64),
	SInt(i64),
	Bool(bool),
}

impl PropertyValue {
	pub fn read(reader: &mut dyn ValueReader<'_, LE>) -> Result<PropertyValue> {
		use PropertyValue::*;
		let mut value: Option<PropertyValue> = None;

		while reader.has_remaining() {
			value = Some(
				match reader.read_pbf_key().context("Failed to read PBF key")? {
					(1, 2) => String(
						reader
							.read_pbf_string()
							.context("Failed to read string value")?,
					),
					(2, 5) => Float(reader.read_f32().context("Failed to read float value")?),
					(3, 1) => Double(reader.read_f64().context("Failed to read double value")?),
					(4, 0) => Int(
						reader
							.read_varint()
							.context("Failed to read varint for int value")? as i64,
					),
					(5, 0) => UInt(
						reader
							.read_varint()
							.context("Failed to read varint for uint value")?,
					),
					(6, 0) => SInt(
						reader
							.read_svarint()
							.context("Failed to read svarint value")?,
					),
					(7, 0) => Bool(
						reader
							.read_varint()
							.context("Failed to read varint for bool value")?
							!= 0,
					),
					(f, w) => bail!("Unexpected combination of field number ({f}) and wire type ({w})"),
				},
			)
		}
		value.ok_or_else(|| anyhow!("Empty property value message"))
	}

	pub fn to_blob(&self) -> Result<Blob> {
		let mut writer = ValueWriterBlob::new_le();

		match self {
			PropertyValue::String(s) => {
				writer
					.write_pbf_key(1, 2)
					.context("Failed to write PBF key for string value")?;
				writer
					.write_pbf_string(s)
					.context("Failed to write string value")?;
			}
			PropertyValue::Float(f) => {
				writer
					.write_pbf_key(2, 5)
					.context("Failed to write PBF key for float value")?;
				writer.write_f32(*f).context("Failed to write float value")?;
			}
			PropertyValue::Double(f) => {
				writer
					.write_pbf_key(3, 1)
					.context("Failed to write PBF key for double value")?;
				writer.write_f64(*f).context("Failed to write double value")?;
			}
			PropertyValue::Int(i) => {
				writer
					.write_pbf_key(4, 0)
					.context("Failed to write PBF key for int value")?;
				writer
					.write_varint(*i as u64)
					.context("Failed to write int value")?;
			}
			PropertyValue::UInt(u) => {
				writer
					.write_pbf_key(5, 0)
					.context("Failed to write PBF key for uint value")?;
				writer.write_varint(*u).context("Failed to write uint value")?;
			}
			PropertyValue::SInt(i) => {
				writer
					.write_pbf_key(6, 0)
					.context("Failed to write PBF key for sint value")?;
				writer.write_svarint(*i).context("Failed to write sint value")?;
			}
			PropertyValue::Bool(b) => {
				writer
					.write_pbf_key(7, 0)
					.context("Failed to write PBF key for bool value")?;
				writer
					.write_varint(u64::from(*b))
					.context("Failed to write bool value")?;
			}
		}

		Ok(writer.into_blob())
	}
}

impl From<&str> for PropertyValue {
	fn from(value: &str) -> Self {
		PropertyValue::String(value.to_string())
	}
}

impl From<String> for PropertyValue {
	fn from(value: String) -> Self {
		PropertyValue::String(value)
	}
}

impl From<f32> for PropertyValue {
	fn from(value: f32) -> Self {
		PropertyValue::Float(value)
	}
}

impl From<f64> for PropertyValue {
	fn from(value: f64) -> Self {
		PropertyValue::Double(value)
	}
}

impl From<i64> for PropertyValue {
	fn from(value: i64) -> Self {
		PropertyValue::Int(value)
	}
}

impl From<u64> for PropertyValue {
	fn from(value: u64) -> Self {
		PropertyValue::UInt(value)
	}
}

impl From<bool> for PropertyValue {
	fn from(value: bool) -> Self {
		PropertyValue::Bool(value)
	}
}

/// A typed attribute value of the version 3 structured attribute stream.
///
/// Strings, floats, doubles and ints intern into the per-layer value tables; uints,
/// sints, bools and null encode inline.
#[derive(Clone, Debug, PartialEq)]
pub enum AttributeValue {
	String(String),
	Float(f32),
	Double(f64),
	Int(i64),
	UInt(u64),
	SInt(i64),
	Bool(bool),
	Null,
}

// Value word layout of the structured attribute stream: `(param << 3) | type`.
pub(crate) const ATTR_TYPE_STRING: u64 = 0;
pub(crate) const ATTR_TYPE_FLOAT: u64 = 1;
pub(crate) const ATTR_TYPE_DOUBLE: u64 = 2;
pub(crate) const ATTR_TYPE_INT: u64 = 3;
pub(crate) const ATTR_TYPE_UINT: u64 = 4;
pub(crate) const ATTR_TYPE_SINT: u64 = 5;
pub(crate) const ATTR_TYPE_BOOL_NULL: u64 = 6;

pub(crate) fn attribute_word(param: u64, word_type: u64) -> u64 {
	(param << 3) | word_type
}

impl AttributeValue {
	/// Returns the inline value word, or `None` if the value needs a table index.
	pub(crate) fn inline_word(&self) -> Option<u64> {
		match self {
			AttributeValue::UInt(u) => Some(attribute_word(*u, ATTR_TYPE_UINT)),
			AttributeValue::SInt(i) => Some(attribute_word(zigzag64(*i), ATTR_TYPE_SINT)),
			AttributeValue::Bool(b) => Some(attribute_word(u64::from(*b), ATTR_TYPE_BOOL_NULL)),
			AttributeValue::Null => Some(attribute_word(2, ATTR_TYPE_BOOL_NULL)),
			_ => None,
		}
	}
}
