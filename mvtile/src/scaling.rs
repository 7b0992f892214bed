//! Scaling records for version 3 packed numeric attribute streams.

use anyhow::{Context, Result, bail};
use byteorder::LE;
use mvtile_core::{Blob, io::*};

/// An affine transform (offset, multiplier, base) applied to a packed numeric
/// attribute stream.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Scaling {
	pub offset: i64,
	pub multiplier: f64,
	pub base: f64,
}

impl Default for Scaling {
	fn default() -> Self {
		Scaling {
			offset: 0,
			multiplier: 1.0,
			base: 0.0,
		}
	}
}

impl Scaling {
	pub fn new(offset: i64, multiplier: f64, base: f64) -> Scaling {
		Scaling {
			offset,
			multiplier,
			base,
		}
	}

	pub fn read(reader: &mut dyn ValueReader<'_, LE>) -> Result<Scaling> {
		let mut scaling = Scaling::default();

		while reader.has_remaining() {
			match reader.read_pbf_key().context("Failed to read PBF key")? {
				(1, 0) => {
					scaling.offset = reader
						.read_svarint()
						.context("Failed to read scaling offset")?
				}
				(2, 1) => {
					scaling.multiplier = reader
						.read_f64()
						.context("Failed to read scaling multiplier")?
				}
				(3, 1) => scaling.base = reader.read_f64().context("Failed to read scaling base")?,
				(f, w) => bail!("Unexpected combination of field number ({f}) and wire type ({w})"),
			}
		}

		Ok(scaling)
	}

	/// Encodes the scaling message, eliding fields that carry their default value.
	pub fn to_blob(&self) -> Result<Blob> {
		let mut writer = ValueWriterBlob::new_le();

		if self.offset != 0 {
			writer
				.write_pbf_key(1, 0)
				.context("Failed to write PBF key for scaling offset")?;
			writer
				.write_svarint(self.offset)
				.context("Failed to write scaling offset")?;
		}

		if self.multiplier != 1.0 {
			writer
				.write_pbf_key(2, 1)
				.context("Failed to write PBF key for scaling multiplier")?;
			writer
				.write_f64(self.multiplier)
				.context("Failed to write scaling multiplier")?;
		}

		if self.base != 0.0 {
			writer
				.write_pbf_key(3, 1)
				.context("Failed to write PBF key for scaling base")?;
			writer
				.write_f64(self.base)
				.context("Failed to write scaling base")?;
		}

		Ok(writer.into_blob())
	}
}
