//! Feature builders.
//!
//! A feature builder streams one feature into its parent layer buffer and must end in
//! exactly one of [`commit`](FeatureBuilder::commit) or
//! [`rollback`](FeatureBuilder::rollback); dropping an unfinished builder rolls back.
//! The builder follows the state machine
//! `INIT -> ID_SET? -> GEOM_SET -> ATTRS_SET? -> DONE`; calls that violate it are
//! programmer errors and panic. Geometry validation failures are recoverable and
//! surface as [`GeometryError`].
//!
//! The geometry shape is a type parameter: [`PointFeatureBuilder`],
//! [`LinestringFeatureBuilder`], [`PolygonFeatureBuilder`] and
//! [`SplineFeatureBuilder`] each expose only the matching operations, while the
//! generic [`FeatureBuilder`] accepts a raw pre-encoded geometry and is used for
//! copying decoded features.

use crate::geometry::{
	CommandStream, GEOM_CLOSE_PATH, GEOM_LINE_TO, GEOM_MOVE_TO, GeometryError,
	MAX_GEOMETRY_COMMAND_COUNT, Point, command_integer,
};
use crate::geometry_type::GeomType;
use crate::layer::LayerBuilder;
use crate::property_value::{
	ATTR_TYPE_DOUBLE, ATTR_TYPE_FLOAT, ATTR_TYPE_INT, ATTR_TYPE_STRING, AttributeValue, PropertyValue,
	attribute_word,
};
use anyhow::{Context, Result};
use mvtile_core::Blob;
use mvtile_core::io::ValueWriter;
use std::marker::PhantomData;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
enum State {
	Init,
	IdSet,
	GeomSet,
	AttrsSet,
	Done,
}

/// Marker trait for the geometry shape of a feature builder.
pub trait GeometryVariant {
	const GEOM_TYPE: GeomType;
}

pub struct Points;
pub struct Linestrings;
pub struct Polygons;
pub struct Splines;
pub struct AnyGeometry;

impl GeometryVariant for Points {
	const GEOM_TYPE: GeomType = GeomType::Point;
}
impl GeometryVariant for Linestrings {
	const GEOM_TYPE: GeomType = GeomType::Linestring;
}
impl GeometryVariant for Polygons {
	const GEOM_TYPE: GeomType = GeomType::Polygon;
}
impl GeometryVariant for Splines {
	const GEOM_TYPE: GeomType = GeomType::Spline;
}
impl GeometryVariant for AnyGeometry {
	const GEOM_TYPE: GeomType = GeomType::Unknown;
}

pub type PointFeatureBuilder<'l> = FeatureBuilder<'l, Points>;
pub type LinestringFeatureBuilder<'l> = FeatureBuilder<'l, Linestrings>;
pub type PolygonFeatureBuilder<'l> = FeatureBuilder<'l, Polygons>;
pub type SplineFeatureBuilder<'l> = FeatureBuilder<'l, Splines>;

/// Builds one feature of a layer.
///
/// Holds the layer exclusively for the life of the feature, so only one feature per
/// layer can be in flight at a time.
pub struct FeatureBuilder<'l, G: GeometryVariant = AnyGeometry> {
	layer: &'l mut LayerBuilder,
	mark: u64,
	features_at_mark: u64,
	state: State,
	geom_type: GeomType,
	commands: CommandStream,
	raw_geometry: Option<Blob>,
	point_count: u32,
	tags: Vec<u32>,
	attributes: Vec<u64>,
	geometric_attributes: Vec<u64>,
	elevations: Vec<i64>,
	_variant: PhantomData<G>,
}

impl<'l, G: GeometryVariant> FeatureBuilder<'l, G> {
	/// Starts a feature on `layer`, capturing the rollback point.
	///
	/// The concrete builder is usually named through one of the type aliases, e.g.
	/// `PointFeatureBuilder::new(&mut layer)`.
	pub fn new(layer: &'l mut LayerBuilder) -> FeatureBuilder<'l, G> {
		let mark = layer.mark();
		let features_at_mark = layer.num_features();
		FeatureBuilder {
			layer,
			mark,
			features_at_mark,
			state: State::Init,
			geom_type: G::GEOM_TYPE,
			commands: CommandStream::new(),
			raw_geometry: None,
			point_count: 0,
			tags: Vec::new(),
			attributes: Vec::new(),
			geometric_attributes: Vec::new(),
			elevations: Vec::new(),
			_variant: PhantomData,
		}
	}

	/// Sets the integer id of the feature.
	///
	/// # Panics
	///
	/// Panics if an id was already set or geometry was already added.
	pub fn set_integer_id(&mut self, id: u64) -> Result<()> {
		assert_eq!(
			self.state,
			State::Init,
			"the feature id must be set first, exactly once"
		);
		let writer = self.layer.writer();
		writer
			.write_pbf_key(1, 0)
			.context("Failed to write PBF key for feature id")?;
		writer.write_varint(id).context("Failed to write feature id")?;
		self.state = State::IdSet;
		Ok(())
	}

	/// Sets the string id of the feature (version 3 only).
	///
	/// # Panics
	///
	/// Panics on a version 1/2 layer, or if an id was already set.
	pub fn set_string_id(&mut self, id: &str) -> Result<()> {
		assert_eq!(self.layer.version(), 3, "string ids need layer version 3");
		assert_eq!(
			self.state,
			State::Init,
			"the feature id must be set first, exactly once"
		);
		let writer = self.layer.writer();
		writer
			.write_pbf_key(8, 2)
			.context("Failed to write PBF key for feature string id")?;
		writer
			.write_pbf_string(id)
			.context("Failed to write feature string id")?;
		self.state = State::IdSet;
		Ok(())
	}

	/// Adds a key/value property, interning both into the layer tables (version 1/2).
	pub fn add_property(&mut self, key: &str, value: &PropertyValue) -> Result<()> {
		let key_index = self.layer.add_key(key)?;
		let value_index = self.layer.add_value(value)?;
		self.add_tag(key_index, value_index);
		Ok(())
	}

	/// Adds a property whose value is already encoded as a value message (version 1/2).
	pub fn add_property_data(&mut self, key: &str, value_data: &[u8]) -> Result<()> {
		let key_index = self.layer.add_key(key)?;
		let value_index = self.layer.add_value_data(value_data)?;
		self.add_tag(key_index, value_index);
		Ok(())
	}

	/// Adds a property by table indices (version 1/2). The indices must already be
	/// interned in the layer.
	pub fn add_tag(&mut self, key_index: u32, value_index: u32) {
		assert!(
			self.layer.version() < 3,
			"tagged properties need layer version 1 or 2"
		);
		self.require_attribute_state();
		debug_assert!(key_index < self.layer.key_count());
		debug_assert!(value_index < self.layer.value_count());
		self.tags.push(key_index);
		self.tags.push(value_index);
		self.state = State::AttrsSet;
	}

	/// Adds a structured attribute (version 3).
	pub fn add_attribute(&mut self, key: &str, value: &AttributeValue) -> Result<()> {
		assert_eq!(
			self.layer.version(),
			3,
			"structured attributes need layer version 3"
		);
		self.require_attribute_state();
		attribute_words(self.layer, key, value, &mut self.attributes)?;
		self.state = State::AttrsSet;
		Ok(())
	}

	/// Adds a structured geometric attribute (version 3).
	pub fn add_geometric_attribute(&mut self, key: &str, value: &AttributeValue) -> Result<()> {
		assert_eq!(
			self.layer.version(),
			3,
			"structured attributes need layer version 3"
		);
		self.require_attribute_state();
		attribute_words(self.layer, key, value, &mut self.geometric_attributes)?;
		self.state = State::AttrsSet;
		Ok(())
	}

	/// Appends per-vertex elevation values (version 3).
	pub fn add_elevations(&mut self, elevations: &[i64]) {
		assert_eq!(self.layer.version(), 3, "elevations need layer version 3");
		self.require_attribute_state();
		self.elevations.extend_from_slice(elevations);
		self.state = State::AttrsSet;
	}

	/// Commits the feature: writes the trailing fields, splices the record header and
	/// increments the layer's feature count.
	///
	/// # Panics
	///
	/// Panics if no geometry was added.
	pub fn commit(mut self) -> Result<()> {
		self.do_commit()
	}

	/// Rolls the feature back, truncating the layer buffer to its state at
	/// construction. The feature count is unchanged. Entries interned into the layer
	/// tables during the feature's life stay interned.
	pub fn rollback(mut self) {
		self.do_rollback();
	}

	fn do_commit(&mut self) -> Result<()> {
		assert!(
			matches!(self.state, State::GeomSet | State::AttrsSet),
			"cannot commit a feature without geometry"
		);

		if self.point_count > 0 {
			self
				.commands
				.set(0, command_integer(GEOM_MOVE_TO, self.point_count));
		}

		let geom_type = self.geom_type;
		let writer = self.layer.writer();

		if !self.tags.is_empty() {
			writer
				.write_pbf_key(2, 2)
				.context("Failed to write PBF key for tags")?;
			writer
				.write_pbf_packed_uint32(&self.tags)
				.context("Failed to write tags")?;
		}

		writer
			.write_pbf_key(3, 0)
			.context("Failed to write PBF key for geometry type")?;
		writer
			.write_varint(geom_type.as_u64())
			.context("Failed to write geometry type")?;

		if let Some(raw) = &self.raw_geometry {
			if !raw.is_empty() {
				writer
					.write_pbf_key(4, 2)
					.context("Failed to write PBF key for geometry data")?;
				writer
					.write_pbf_slice(raw.as_slice())
					.context("Failed to write geometry data")?;
			}
		} else {
			writer
				.write_pbf_key(4, 2)
				.context("Failed to write PBF key for geometry data")?;
			writer
				.write_pbf_packed_uint32(self.commands.data())
				.context("Failed to write geometry data")?;
		}

		if !self.elevations.is_empty() {
			writer
				.write_pbf_key(5, 2)
				.context("Failed to write PBF key for elevations")?;
			writer
				.write_pbf_packed_sint64(&self.elevations)
				.context("Failed to write elevations")?;
		}
		if !self.attributes.is_empty() {
			writer
				.write_pbf_key(6, 2)
				.context("Failed to write PBF key for attributes")?;
			writer
				.write_pbf_packed_uint64(&self.attributes)
				.context("Failed to write attributes")?;
		}
		if !self.geometric_attributes.is_empty() {
			writer
				.write_pbf_key(7, 2)
				.context("Failed to write PBF key for geometric attributes")?;
			writer
				.write_pbf_packed_uint64(&self.geometric_attributes)
				.context("Failed to write geometric attributes")?;
		}

		self
			.layer
			.commit_feature(self.mark)
			.context("Failed to commit feature")?;
		self.state = State::Done;
		Ok(())
	}

	fn do_rollback(&mut self) {
		self.layer.truncate_to(self.mark);
		debug_assert_eq!(self.layer.num_features(), self.features_at_mark);
		self.state = State::Done;
	}

	fn require_attribute_state(&self) {
		assert!(
			matches!(self.state, State::GeomSet | State::AttrsSet),
			"attributes need a completed geometry"
		);
	}

	fn require_geometry_open(&self) {
		assert!(
			self.state <= State::GeomSet,
			"geometry must be complete before attributes are added"
		);
	}

	fn geometry_added(&mut self) {
		if self.state < State::GeomSet {
			self.state = State::GeomSet;
		}
	}
}

impl<G: GeometryVariant> Drop for FeatureBuilder<'_, G> {
	fn drop(&mut self) {
		if self.state != State::Done {
			self.do_rollback();
		}
	}
}

impl FeatureBuilder<'_, AnyGeometry> {
	/// Sets the geometry from an already encoded command stream, spliced verbatim.
	///
	/// # Panics
	///
	/// Panics if geometry was already set.
	pub fn set_raw_geometry(&mut self, geom_type: GeomType, data: &[u8]) {
		assert!(self.state < State::GeomSet, "geometry can only be set once");
		self.geom_type = geom_type;
		self.raw_geometry = Some(Blob::from(data));
		self.geometry_added();
	}
}

impl FeatureBuilder<'_, Points> {
	/// Adds one point. Repeated calls build a multipoint.
	pub fn add_point(&mut self, point: impl Into<Point>) -> Result<(), GeometryError> {
		self.require_geometry_open();
		if self.point_count >= MAX_GEOMETRY_COMMAND_COUNT {
			return Err(GeometryError::TooManyPoints(self.point_count as usize + 1));
		}
		if self.point_count == 0 {
			// header slot, patched with the final count at commit
			self.commands.push_raw(0);
		}
		self.commands.push_point(point.into());
		self.point_count += 1;
		self.geometry_added();
		Ok(())
	}

	/// Adds all points of a sized container.
	pub fn add_points<I>(&mut self, points: I) -> Result<(), GeometryError>
	where
		I: IntoIterator,
		I::Item: Into<Point>,
		I::IntoIter: ExactSizeIterator,
	{
		self.require_geometry_open();
		let iter = points.into_iter();
		let count = iter.len();
		if count == 0 {
			return Err(GeometryError::EmptyPointSet);
		}
		if count as u64 + u64::from(self.point_count) > u64::from(MAX_GEOMETRY_COMMAND_COUNT) {
			return Err(GeometryError::TooManyPoints(count));
		}
		for point in iter {
			self.add_point(point)?;
		}
		Ok(())
	}
}

impl FeatureBuilder<'_, Linestrings> {
	/// Adds one linestring part. Repeated calls build a multilinestring.
	pub fn add_linestring<I>(&mut self, points: I) -> Result<(), GeometryError>
	where
		I: IntoIterator,
		I::Item: Into<Point>,
		I::IntoIter: ExactSizeIterator,
	{
		self.require_geometry_open();
		add_line_part(&mut self.commands, points)?;
		self.geometry_added();
		Ok(())
	}
}

impl FeatureBuilder<'_, Polygons> {
	/// Adds one ring, given closed (first point == last point). Repeated calls build
	/// a multipolygon; ring winding is recorded, not validated.
	pub fn add_ring<I>(&mut self, points: I) -> Result<(), GeometryError>
	where
		I: IntoIterator,
		I::Item: Into<Point>,
	{
		self.require_geometry_open();
		let points: Vec<Point> = points.into_iter().map(Into::into).collect();
		let count = points.len();
		if count < 4 {
			return Err(GeometryError::ShortRing(count));
		}
		if points[0] != points[count - 1] {
			return Err(GeometryError::UnclosedRing);
		}
		if count - 2 > MAX_GEOMETRY_COMMAND_COUNT as usize {
			return Err(GeometryError::TooManyPoints(count));
		}
		self.commands.command(GEOM_MOVE_TO, 1);
		self.commands.push_point(points[0]);
		self.commands.command(GEOM_LINE_TO, (count - 2) as u32);
		for point in &points[1..count - 1] {
			self.commands.push_point(*point);
		}
		self.commands.command(GEOM_CLOSE_PATH, 1);
		self.geometry_added();
		Ok(())
	}
}

impl FeatureBuilder<'_, Splines> {
	/// Adds one spline part; the shape rules match linestrings.
	///
	/// # Panics
	///
	/// Panics on a version 1/2 layer; splines exist in version 3 only.
	pub fn add_spline<I>(&mut self, points: I) -> Result<(), GeometryError>
	where
		I: IntoIterator,
		I::Item: Into<Point>,
		I::IntoIter: ExactSizeIterator,
	{
		assert_eq!(self.layer.version(), 3, "spline features need layer version 3");
		self.require_geometry_open();
		add_line_part(&mut self.commands, points)?;
		self.geometry_added();
		Ok(())
	}
}

fn add_line_part<I>(commands: &mut CommandStream, points: I) -> Result<(), GeometryError>
where
	I: IntoIterator,
	I::Item: Into<Point>,
	I::IntoIter: ExactSizeIterator,
{
	let mut iter = points.into_iter();
	let count = iter.len();
	if count < 2 {
		return Err(GeometryError::ShortLinestring(count));
	}
	if count - 1 > MAX_GEOMETRY_COMMAND_COUNT as usize {
		return Err(GeometryError::TooManyPoints(count));
	}
	let Some(first) = iter.next() else {
		return Err(GeometryError::ShortLinestring(0));
	};
	commands.command(GEOM_MOVE_TO, 1);
	commands.push_point(first.into());
	commands.command(GEOM_LINE_TO, (count - 1) as u32);
	for point in iter {
		commands.push_point(point.into());
	}
	Ok(())
}

fn attribute_words(
	layer: &mut LayerBuilder,
	key: &str,
	value: &AttributeValue,
	words: &mut Vec<u64>,
) -> Result<()> {
	words.push(u64::from(layer.add_key(key)?));
	let word = if let Some(word) = value.inline_word() {
		word
	} else {
		match value {
			AttributeValue::String(s) => {
				attribute_word(u64::from(layer.add_string_value(s)?), ATTR_TYPE_STRING)
			}
			AttributeValue::Float(f) => attribute_word(u64::from(layer.add_float_value(*f)), ATTR_TYPE_FLOAT),
			AttributeValue::Double(d) => {
				attribute_word(u64::from(layer.add_double_value(*d)), ATTR_TYPE_DOUBLE)
			}
			AttributeValue::Int(i) => attribute_word(u64::from(layer.add_int_value(*i)), ATTR_TYPE_INT),
			_ => unreachable!("inline values are handled above"),
		}
	};
	words.push(word);
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	fn layer(version: u32) -> LayerBuilder {
		LayerBuilder::new("test", version, 4096).unwrap()
	}

	#[test]
	fn test_commit_point_feature() -> Result<()> {
		let mut layer = layer(2);
		let mark = layer.mark();
		let mut feature = PointFeatureBuilder::new(&mut layer);
		feature.set_integer_id(1)?;
		feature.add_point((25, 17))?;
		feature.commit()?;
		assert_eq!(layer.num_features(), 1);
		// feature record: header + id + type + geometry
		let buffer_end = layer.mark();
		assert!(buffer_end > mark);
		Ok(())
	}

	#[test]
	fn test_rollback_restores_buffer() -> Result<()> {
		let mut layer = layer(2);
		let mark = layer.mark();
		let mut feature = PointFeatureBuilder::new(&mut layer);
		feature.set_integer_id(7)?;
		feature.add_point((1, 1))?;
		feature.rollback();
		assert_eq!(layer.mark(), mark);
		assert_eq!(layer.num_features(), 0);
		Ok(())
	}

	#[test]
	fn test_drop_without_commit_rolls_back() -> Result<()> {
		let mut layer = layer(2);
		let mark = layer.mark();
		{
			let mut feature = PointFeatureBuilder::new(&mut layer);
			feature.set_integer_id(7)?;
			feature.add_point((1, 1))?;
		}
		assert_eq!(layer.mark(), mark);
		assert_eq!(layer.num_features(), 0);
		Ok(())
	}

	#[test]
	fn test_rollback_keeps_interned_entries() -> Result<()> {
		let mut layer = layer(2);
		{
			let mut feature = PointFeatureBuilder::new(&mut layer);
			feature.add_point((1, 1))?;
			feature.add_property("key", &PropertyValue::from("value"))?;
		}
		// the dictionary entries survive, the feature does not
		assert_eq!(layer.num_features(), 0);
		assert_eq!(layer.add_key("key")?, 0);
		Ok(())
	}

	#[test]
	#[should_panic(expected = "cannot commit a feature without geometry")]
	fn test_commit_without_geometry_panics() {
		let mut layer = layer(2);
		let mut feature = PointFeatureBuilder::new(&mut layer);
		feature.set_integer_id(1).unwrap();
		let _ = feature.commit();
	}

	#[test]
	#[should_panic(expected = "string ids need layer version 3")]
	fn test_string_id_panics_below_v3() {
		let mut layer = layer(2);
		let mut feature = PointFeatureBuilder::new(&mut layer);
		let _ = feature.set_string_id("foo");
	}

	#[test]
	#[should_panic(expected = "the feature id must be set first, exactly once")]
	fn test_id_after_geometry_panics() {
		let mut layer = layer(2);
		let mut feature = PointFeatureBuilder::new(&mut layer);
		feature.add_point((1, 1)).unwrap();
		let _ = feature.set_integer_id(1);
	}

	#[test]
	#[should_panic(expected = "attributes need a completed geometry")]
	fn test_property_before_geometry_panics() {
		let mut layer = layer(2);
		let mut feature = PointFeatureBuilder::new(&mut layer);
		let _ = feature.add_property("key", &PropertyValue::from("value"));
	}

	#[test]
	#[should_panic(expected = "geometry must be complete before attributes are added")]
	fn test_geometry_after_attributes_panics() {
		let mut layer = layer(2);
		let mut feature = PointFeatureBuilder::new(&mut layer);
		feature.add_point((1, 1)).unwrap();
		feature.add_property("key", &PropertyValue::from("value")).unwrap();
		let _ = feature.add_point((2, 2));
	}

	#[test]
	#[should_panic(expected = "spline features need layer version 3")]
	fn test_spline_builder_panics_below_v3() {
		let mut layer = layer(2);
		let mut feature = SplineFeatureBuilder::new(&mut layer);
		let _ = feature.add_spline([(0, 0), (1, 1)]);
	}

	#[test]
	fn test_short_linestring_is_recoverable() {
		let mut layer = layer(2);
		let mut feature = LinestringFeatureBuilder::new(&mut layer);
		assert_eq!(
			feature.add_linestring([(0, 0)]),
			Err(GeometryError::ShortLinestring(1))
		);
		// the builder is still usable
		assert!(feature.add_linestring([(0, 0), (1, 1)]).is_ok());
		assert!(feature.commit().is_ok());
	}

	#[test]
	fn test_ring_validation() {
		let mut layer = layer(2);
		let mut feature = PolygonFeatureBuilder::new(&mut layer);
		assert_eq!(
			feature.add_ring([(0, 0), (1, 0), (0, 0)]),
			Err(GeometryError::ShortRing(3))
		);
		assert_eq!(
			feature.add_ring([(0, 0), (1, 0), (1, 1), (0, 1)]),
			Err(GeometryError::UnclosedRing)
		);
		assert!(feature.add_ring([(0, 0), (1, 0), (1, 1), (0, 0)]).is_ok());
	}

	#[test]
	fn test_empty_point_set() {
		let mut layer = layer(2);
		let mut feature = PointFeatureBuilder::new(&mut layer);
		let points: Vec<Point> = vec![];
		assert_eq!(feature.add_points(points), Err(GeometryError::EmptyPointSet));
	}

	/// An iterator that claims a huge length without allocating it.
	struct RepeatPoint(usize);

	impl Iterator for RepeatPoint {
		type Item = Point;

		fn next(&mut self) -> Option<Point> {
			if self.0 == 0 {
				return None;
			}
			self.0 -= 1;
			Some(Point::new(0, 0))
		}

		fn size_hint(&self) -> (usize, Option<usize>) {
			(self.0, Some(self.0))
		}
	}

	impl ExactSizeIterator for RepeatPoint {}

	#[test]
	fn test_too_many_points_rolls_back() -> Result<()> {
		let mut layer = layer(2);
		let mark = layer.mark();
		{
			let mut feature = PointFeatureBuilder::new(&mut layer);
			feature.set_integer_id(1)?;
			assert_eq!(
				feature.add_points(RepeatPoint(1 << 29)),
				Err(GeometryError::TooManyPoints(1 << 29))
			);
		}
		assert_eq!(layer.mark(), mark);
		assert_eq!(layer.num_features(), 0);
		Ok(())
	}

	#[test]
	fn test_multipoint_header_patched() -> Result<()> {
		let mut layer = layer(2);
		let mut feature = PointFeatureBuilder::new(&mut layer);
		feature.add_point((5, 7))?;
		feature.add_point((3, 2))?;
		assert_eq!(feature.point_count, 2);
		feature.commit()?;
		Ok(())
	}

	#[test]
	fn test_commit_order_is_output_order() -> Result<()> {
		let mut layer = layer(2);
		for id in [1u64, 8] {
			let mut feature = PointFeatureBuilder::new(&mut layer);
			feature.set_integer_id(id)?;
			feature.add_point((0, 0))?;
			feature.commit()?;
		}
		for id in 2u64..8 {
			let mut feature = PointFeatureBuilder::new(&mut layer);
			feature.set_integer_id(id)?;
			feature.add_point((0, 0))?;
			feature.rollback();
		}
		assert_eq!(layer.num_features(), 2);
		Ok(())
	}
}
