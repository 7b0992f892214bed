//! Helpers for copying decoded features into fresh layers and for bulk point adds.

use crate::feature::{FeatureBuilder, PointFeatureBuilder};
use crate::geometry::{GeometryError, Point};
use crate::layer::LayerBuilder;
use crate::view::{FeatureView, LayerView};
use anyhow::{Context, Result, ensure};

/// Copies one decoded feature into `target`.
///
/// The id and the raw geometry stream are spliced verbatim; attributes are re-interned
/// through the target layer's tables, with version 1/2 value messages copied at the
/// byte level. `source` must be the layer the feature was decoded from, and the target
/// layer version must admit everything the feature carries.
pub fn copy_feature(feature: &FeatureView, source: &LayerView, target: &mut LayerBuilder) -> Result<()> {
	let version = target.version();
	let mut builder: FeatureBuilder = FeatureBuilder::new(target);

	if let Some(id) = feature.id {
		builder.set_integer_id(id).context("Failed to copy feature id")?;
	} else if let Some(string_id) = &feature.string_id {
		builder
			.set_string_id(string_id)
			.context("Failed to copy feature string id")?;
	}

	builder.set_raw_geometry(feature.geom_type, feature.geom_data.as_slice());

	if version < 3 {
		ensure!(feature.tag_ids.len() % 2 == 0, "tag ids must come in pairs");
		for pair in feature.tag_ids.chunks(2) {
			let key = source.key(pair[0]).context("Failed to resolve property key")?;
			let value_data = source
				.value_data(pair[1])
				.context("Failed to resolve property value")?;
			builder
				.add_property_data(key, value_data)
				.context("Failed to copy property")?;
		}
	} else {
		for (key, value) in source.decode_attributes(&feature.attributes)? {
			builder
				.add_attribute(&key, &value)
				.context("Failed to copy attribute")?;
		}
		for (key, value) in source.decode_attributes(&feature.geometric_attributes)? {
			builder
				.add_geometric_attribute(&key, &value)
				.context("Failed to copy geometric attribute")?;
		}
		if !feature.elevations.is_empty() {
			builder.add_elevations(&feature.elevations);
		}
	}

	builder.commit().context("Failed to commit copied feature")
}

/// Adds a point or multipoint geometry from any sized sequence of points.
///
/// Fails with [`GeometryError::TooManyPoints`] if the sequence does not fit one
/// geometry command.
pub fn add_points_from_container<I>(
	points: I,
	builder: &mut PointFeatureBuilder<'_>,
) -> Result<(), GeometryError>
where
	I: IntoIterator,
	I::Item: Into<Point>,
	I::IntoIter: ExactSizeIterator,
{
	builder.add_points(points)
}
