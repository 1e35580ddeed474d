use crate::bytes::Cursor;
use crate::error::{PlistError, Result};
use crate::header::HEADER_LEN;

/// Fixed trailer length at the end of every document.
pub(crate) const TRAILER_LEN: usize = 32;

/// Decoded document trailer.
///
/// On the wire the trailer is 32 bytes: five unused bytes, a sort-version
/// byte (both ignored), `OffsetIntSize`, `ObjectRefSize`, then `NumObjects`,
/// `TopObject` and `OffsetTableOffset` as big-endian `u64`s.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Trailer {
	/// Bytes per offset-table entry.
	pub offset_int_size: u8,
	/// Bytes per object reference inside arrays and dictionaries.
	pub object_ref_size: u8,
	/// Number of objects in the document.
	pub num_objects: u64,
	/// Object index of the root value.
	pub top_object: u64,
	/// Byte position of the offset table.
	pub offset_table_offset: u64,
}

impl Trailer {
	/// Read the trailer from the last 32 bytes of `bytes`.
	///
	/// Returns the trailer and its byte position. The position doubles as
	/// the exclusive upper bound of the object and offset-table regions.
	pub(crate) fn read(bytes: &[u8]) -> Result<(Self, u64)> {
		if bytes.len() < HEADER_LEN + TRAILER_LEN {
			return Err(PlistError::TruncatedDocument { len: bytes.len() });
		}
		let trailer_at = bytes.len() - TRAILER_LEN;

		let mut cursor = Cursor::new(bytes);
		// Skip the five unused bytes and the sort-version byte.
		cursor.seek(trailer_at + 6)?;
		let trailer = Trailer {
			offset_int_size: cursor.read_u8()?,
			object_ref_size: cursor.read_u8()?,
			num_objects: cursor.read_u64_be()?,
			top_object: cursor.read_u64_be()?,
			offset_table_offset: cursor.read_u64_be()?,
		};
		Ok((trailer, trailer_at as u64))
	}

	/// Reject trailers whose geometry cannot describe a well-formed document.
	///
	/// After this passes, the offset table lies wholly between the header
	/// and the trailer, every object reference fits `object_ref_size`, the
	/// offset width can address the whole object region, and the top object
	/// index is in range.
	pub(crate) fn validate(&self, trailer_at: u64) -> Result<()> {
		if self.offset_table_offset >= trailer_at {
			return Err(PlistError::OffsetTableAfterTrailer {
				offset: self.offset_table_offset,
				trailer_at,
			});
		}

		// The smallest object record is one byte, directly after the header.
		if self.offset_table_offset < (HEADER_LEN + 1) as u64 {
			return Err(PlistError::OffsetTableInHeader {
				offset: self.offset_table_offset,
			});
		}

		let declared_end = self
			.num_objects
			.saturating_mul(u64::from(self.offset_int_size))
			.saturating_add(self.offset_table_offset);
		if trailer_at > declared_end {
			return Err(PlistError::UndeclaredBytesBeforeTrailer {
				declared_end,
				trailer_at,
			});
		}

		if self.num_objects > trailer_at {
			return Err(PlistError::TooManyObjects {
				objects: self.num_objects,
				available: trailer_at,
			});
		}

		if let Some(addressable) = 1u64.checked_shl(8 * u32::from(self.object_ref_size)) {
			if self.num_objects > addressable {
				return Err(PlistError::RefWidthTooNarrow {
					objects: self.num_objects,
					ref_size: self.object_ref_size,
				});
			}
		}

		if self.offset_int_size < 8 && 1u64 << (8 * u32::from(self.offset_int_size)) <= self.offset_table_offset {
			return Err(PlistError::OffsetWidthTooNarrow {
				offset_size: self.offset_int_size,
				table_at: self.offset_table_offset,
			});
		}

		if self.top_object >= self.num_objects {
			return Err(PlistError::TopObjectOutOfRange {
				index: self.top_object,
				objects: self.num_objects,
			});
		}

		Ok(())
	}
}
