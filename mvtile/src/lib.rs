//! A library for building and encoding Mapbox Vector Tiles (MVT).
//!
//! The crate is organized around a three-level builder pipeline:
//!
//! - [`TileBuilder`] owns the layers of one tile and serializes them in insertion order.
//! - [`LayerBuilder`] owns a layer's streaming byte buffer, its key/value dictionaries
//!   and its feature counter.
//! - The feature builders ([`PointFeatureBuilder`], [`LinestringFeatureBuilder`],
//!   [`PolygonFeatureBuilder`], [`SplineFeatureBuilder`] and the generic
//!   [`FeatureBuilder`]) stream one feature at a time into the parent layer buffer and
//!   end in exactly one of commit or rollback.
//!
//! Layer versions 1 and 2 use the classic tagged key/value dictionaries; version 3
//! additionally supports string ids, typed value tables, structured attributes,
//! elevations, scalings and a tile locator.
//!
//! The [`TileView`], [`LayerView`] and [`FeatureView`] types provide the decode side
//! needed to copy features between tiles and to inspect encoded data.

mod copy;
mod feature;
mod geometry;
mod geometry_type;
mod index_table;
mod layer;
mod property_value;
mod scaling;
mod tile;
mod view;

pub use copy::*;
pub use feature::*;
pub use geometry::*;
pub use geometry_type::*;
pub use layer::{LayerBuilder, TileLocator};
pub use property_value::*;
pub use scaling::*;
pub use tile::*;
pub use view::*;

pub use mvtile_core::Blob;
