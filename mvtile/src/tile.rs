//! The tile builder.
//!
//! A `TileBuilder` owns its layer builders and serializes them in insertion order.
//! Layers come in two kinds: fresh layers built through [`LayerBuilder`], and
//! pre-encoded layers spliced in verbatim. A fresh layer that never received a
//! committed feature is suppressed from the output.

use crate::layer::{LayerBuilder, TileLocator};
use anyhow::{Context, Result};
use byteorder::LittleEndian;
use log::trace;
use mvtile_core::{Blob, io::*};

/// Stable handle to a fresh layer registered in a [`TileBuilder`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LayerId(usize);

enum LayerSlot {
	Fresh(LayerBuilder),
	Existing(Blob),
}

/// Assembles one vector tile from layers and serializes it into a byte buffer.
#[derive(Default)]
pub struct TileBuilder {
	layers: Vec<LayerSlot>,
}

impl TileBuilder {
	pub fn new() -> TileBuilder {
		TileBuilder::default()
	}

	/// Registers a fresh layer and returns its handle.
	pub fn add_layer(&mut self, name: &str, version: u32, extent: u32) -> Result<LayerId> {
		let layer = LayerBuilder::new(name, version, extent).context("Failed to create layer")?;
		self.layers.push(LayerSlot::Fresh(layer));
		Ok(LayerId(self.layers.len() - 1))
	}

	/// Registers a version 2 layer with the default extent of 4096.
	pub fn add_standard_layer(&mut self, name: &str) -> Result<LayerId> {
		self.add_layer(name, 2, 4096)
	}

	/// Registers a version 3 layer carrying a tile locator.
	pub fn add_layer_with_locator(
		&mut self,
		name: &str,
		extent: u32,
		locator: TileLocator,
	) -> Result<LayerId> {
		let id = self.add_layer(name, 3, extent)?;
		self.layer_mut(id).set_tile_locator(locator);
		Ok(id)
	}

	/// Appends an already encoded layer record, spliced verbatim at serialization.
	///
	/// The bytes must form a valid layer message; this is not checked.
	pub fn add_existing_layer(&mut self, data: Blob) {
		self.layers.push(LayerSlot::Existing(data));
	}

	/// Returns the fresh layer behind `id`.
	///
	/// # Panics
	///
	/// Panics if `id` refers to a pre-encoded layer.
	pub fn layer_mut(&mut self, id: LayerId) -> &mut LayerBuilder {
		match &mut self.layers[id.0] {
			LayerSlot::Fresh(layer) => layer,
			LayerSlot::Existing(_) => panic!("layer {id:?} is a pre-encoded layer"),
		}
	}

	/// Returns the fresh layer behind `id`, immutably.
	///
	/// # Panics
	///
	/// Panics if `id` refers to a pre-encoded layer.
	pub fn layer(&self, id: LayerId) -> &LayerBuilder {
		match &self.layers[id.0] {
			LayerSlot::Fresh(layer) => layer,
			LayerSlot::Existing(_) => panic!("layer {id:?} is a pre-encoded layer"),
		}
	}

	/// Estimated output size, including the per-layer record envelope.
	pub fn estimated_size(&self) -> usize {
		self
			.layers
			.iter()
			.map(|slot| {
				14 + match slot {
					LayerSlot::Fresh(layer) => layer.estimated_size(),
					LayerSlot::Existing(data) => data.len() as usize,
				}
			})
			.sum()
	}

	/// Serializes the tile. This is the terminal operation of a builder tree.
	///
	/// Layers are emitted in insertion order; fresh layers only if they hold at least
	/// one committed feature.
	pub fn serialize(self) -> Result<Blob> {
		trace!("serializing tile with {} layers", self.layers.len());
		let mut writer = ValueWriterBlob::<LittleEndian>::with_capacity(self.estimated_size());

		for slot in &self.layers {
			match slot {
				LayerSlot::Existing(data) => {
					writer
						.write_pbf_key(3, 2)
						.context("Failed to write PBF key for layer")?;
					writer.write_pbf_blob(data).context("Failed to write layer")?;
				}
				LayerSlot::Fresh(layer) => {
					if layer.num_features() > 0 {
						writer
							.write_pbf_key(3, 2)
							.context("Failed to write PBF key for layer")?;
						layer.build(&mut writer).context("Failed to build layer")?;
					}
				}
			}
		}

		Ok(writer.into_blob())
	}
}
