//! This module provides the [`Blob`] struct, a wrapper around [`Vec<u8>`] used for all
//! encoded tile data.
//!
//! # Examples
//!
//! ```rust
//! use mvtile_core::Blob;
//!
//! let blob = Blob::from("Hello, world!");
//! assert_eq!(blob.len(), 13);
//! assert_eq!(blob.as_str(), "Hello, world!");
//! ```

use std::fmt::Debug;

/// A simple wrapper around [`Vec<u8>`] holding encoded byte data.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Blob(Vec<u8>);

impl Blob {
	/// Creates an empty `Blob`.
	#[must_use]
	pub fn new_empty() -> Blob {
		Blob(Vec::new())
	}

	/// Creates a `Blob` of the given size, filled with zeros.
	#[must_use]
	pub fn new_sized(length: usize) -> Blob {
		Blob(vec![0u8; length])
	}

	/// Returns the underlying data as a byte slice.
	#[must_use]
	pub fn as_slice(&self) -> &[u8] {
		&self.0
	}

	/// Returns the underlying data as a mutable byte slice.
	pub fn as_mut_slice(&mut self) -> &mut [u8] {
		&mut self.0
	}

	/// Interprets the underlying data as UTF-8 text.
	///
	/// # Panics
	///
	/// Panics if the data is not valid UTF-8.
	#[must_use]
	pub fn as_str(&self) -> &str {
		std::str::from_utf8(&self.0).expect("blob is not valid utf8")
	}

	/// Consumes the `Blob` and returns the underlying `Vec<u8>`.
	#[must_use]
	pub fn into_vec(self) -> Vec<u8> {
		self.0
	}

	/// Returns the length of the data in bytes.
	#[must_use]
	pub fn len(&self) -> u64 {
		self.0.len() as u64
	}

	/// Returns `true` if the blob holds no data.
	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}
}

impl From<Vec<u8>> for Blob {
	fn from(value: Vec<u8>) -> Self {
		Blob(value)
	}
}

impl From<&Vec<u8>> for Blob {
	fn from(value: &Vec<u8>) -> Self {
		Blob(value.clone())
	}
}

impl From<&[u8]> for Blob {
	fn from(value: &[u8]) -> Self {
		Blob(value.to_vec())
	}
}

impl<const N: usize> From<&[u8; N]> for Blob {
	fn from(value: &[u8; N]) -> Self {
		Blob(value.to_vec())
	}
}

impl From<&str> for Blob {
	fn from(value: &str) -> Self {
		Blob(value.as_bytes().to_vec())
	}
}

impl From<String> for Blob {
	fn from(value: String) -> Self {
		Blob(value.into_bytes())
	}
}

impl Debug for Blob {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Blob").field("len", &self.0.len()).finish()
	}
}
