#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum GeomType {
	#[default]
	Unknown = 0,
	Point = 1,
	Linestring = 2,
	Polygon = 3,
	/// Spline geometries exist in layer version 3 only.
	Spline = 4,
}

impl GeomType {
	pub fn as_u64(&self) -> u64 {
		*self as u64
	}
}

impl From<u64> for GeomType {
	fn from(value: u64) -> Self {
		match value {
			1 => GeomType::Point,
			2 => GeomType::Linestring,
			3 => GeomType::Polygon,
			4 => GeomType::Spline,
			_ => GeomType::Unknown,
		}
	}
}
