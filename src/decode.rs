//! Binary property list decoder.
//!
//! The trailer is validated before any offset is trusted, every
//! variable-length payload is bounds-checked against the offset table,
//! object references are cycle-checked, and the amount of work a document
//! can demand is capped by [`DecodeOptions`].

use crate::bytes::Cursor;
use crate::error::{PlistError, Result};
use crate::header::parse_header;
use crate::trailer::Trailer;
use crate::value::{Date, Dictionary, Integer, Real, Uid, Value};

/// Resource limits applied to untrusted documents.
///
/// Cycle detection alone does not bound decode work: a non-cyclic chain of
/// nested containers can be arbitrarily deep, and a small document can fan
/// out into a huge tree by referencing the same subtree many times. Both
/// axes are capped here.
#[derive(Debug, Clone, Copy)]
pub struct DecodeOptions {
	/// Maximum container nesting depth.
	pub max_depth: u32,
	/// Maximum number of values produced, counting a shared subtree once
	/// per reference.
	pub max_nodes: u64,
}

impl Default for DecodeOptions {
	fn default() -> Self {
		Self {
			max_depth: 512,
			max_nodes: 16_777_216,
		}
	}
}

/// Decode a binary property list document with default limits.
pub fn decode_binary(bytes: &[u8]) -> Result<Value> {
	decode_binary_with(bytes, &DecodeOptions::default())
}

/// Decode a binary property list document with explicit limits.
pub fn decode_binary_with(bytes: &[u8], options: &DecodeOptions) -> Result<Value> {
	parse_header(bytes)?;
	let (trailer, trailer_at) = Trailer::read(bytes)?;
	trailer.validate(trailer_at)?;

	// Trailer validation caps num_objects at the document length.
	let object_count = trailer.num_objects as usize;
	let table_at = trailer.offset_table_offset;
	let max_offset = table_at - 1;

	let mut cursor = Cursor::new(bytes);
	cursor.seek(table_at as usize)?;
	let mut offsets = Vec::with_capacity(object_count);
	for index in 0..trailer.num_objects {
		let (offset, _) = read_sized_int(&mut cursor, usize::from(trailer.offset_int_size), false)?;
		if offset > max_offset {
			return Err(PlistError::ObjectOffsetOutOfRange { index, offset, table_at });
		}
		offsets.push(offset);
	}

	let mut parser = Parser {
		bytes,
		trailer,
		offsets,
		memo: vec![None; object_count],
		in_progress: vec![false; object_count],
		options: *options,
		depth: 0,
		produced: 0,
	};
	parser.object_at_index(trailer.top_object)
}

struct Parser<'a> {
	bytes: &'a [u8],
	trailer: Trailer,
	offsets: Vec<u64>,
	/// Decoded object plus the node count of its subtree, by object index.
	memo: Vec<Option<(Value, u64)>>,
	in_progress: Vec<bool>,
	options: DecodeOptions,
	depth: u32,
	produced: u64,
}

impl Parser<'_> {
	fn object_at_index(&mut self, index: u64) -> Result<Value> {
		if index >= self.trailer.num_objects {
			return Err(PlistError::RefOutOfRange {
				index,
				objects: self.trailer.num_objects,
			});
		}
		let slot = index as usize;
		if self.in_progress[slot] {
			return Err(PlistError::CyclicReference { index });
		}
		if let Some((value, nodes)) = &self.memo[slot] {
			// A memo hit clones the whole subtree; bill it again.
			let (value, nodes) = (value.clone(), *nodes);
			self.charge(nodes)?;
			return Ok(value);
		}

		let produced_before = self.produced;
		self.in_progress[slot] = true;
		let parsed = self.parse_at_offset(self.offsets[slot], index);
		self.in_progress[slot] = false;
		let value = parsed?;
		self.memo[slot] = Some((value.clone(), self.produced - produced_before));
		Ok(value)
	}

	fn parse_at_offset(&mut self, offset: u64, index: u64) -> Result<Value> {
		let mut cursor = Cursor::new(self.bytes);
		cursor.seek(offset as usize)?;
		let tag = cursor.read_u8()?;

		let value = match tag & 0xF0 {
			0x00 => match tag {
				0x08 => Value::Boolean(false),
				0x09 => Value::Boolean(true),
				// Null and fill markers have no Value representation.
				_ => return Err(PlistError::UnknownTag { tag, offset }),
			},
			0x10 => {
				let width = 1_usize << (tag & 0x0F);
				let (low, high) = read_sized_int(&mut cursor, width, true)?;
				// Negative numbers are 128-bit records with the top half all-ones.
				Value::Integer(Integer {
					signed: high == u64::MAX,
					value: low,
				})
			}
			0x20 => {
				let width = 1_usize << (tag & 0x0F);
				match width {
					4 => Value::Real(Real {
						wide: false,
						value: f64::from(cursor.read_f32_be()?),
					}),
					8 => Value::Real(Real {
						wide: true,
						value: cursor.read_f64_be()?,
					}),
					_ => return Err(PlistError::IllegalFloatWidth { width, offset }),
				}
			}
			0x30 => Value::Date(Date::from_seconds(cursor.read_f64_be()?)),
			0x40 => {
				let count = count_for_tag(&mut cursor, tag)?;
				self.check_payload(offset, count, 1, "data", index)?;
				Value::Data(cursor.read_exact(count as usize)?.to_vec())
			}
			0x50 => {
				let count = count_for_tag(&mut cursor, tag)?;
				self.check_payload(offset, count, 1, "string", index)?;
				let raw = cursor.read_exact(count as usize)?;
				// One byte per character; 0x80..=0xFF promote to Latin-1.
				Value::String(raw.iter().map(|&b| char::from(b)).collect())
			}
			0x60 => {
				let count = count_for_tag(&mut cursor, tag)?;
				self.check_payload(offset, count, 2, "string", index)?;
				let raw = cursor.read_exact(count as usize * 2)?;
				let units: Vec<u16> = raw
					.chunks_exact(2)
					.map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
					.collect();
				Value::String(String::from_utf16_lossy(&units))
			}
			// UID widths are nbytes - 1, not log2(nbytes).
			0x80 => {
				let width = usize::from(tag & 0x0F) + 1;
				let (value, _) = read_sized_int(&mut cursor, width, false)?;
				Value::Uid(Uid(value))
			}
			0xA0 => {
				let count = count_for_tag(&mut cursor, tag)?;
				self.check_payload(offset, count, u64::from(self.trailer.object_ref_size), "array", index)?;

				// Read every reference before resolving: resolution seeks away.
				// No preallocation; a zero-width ref size leaves count unbounded
				// by the payload check and must fail on the first read instead.
				let mut refs = Vec::new();
				for _ in 0..count {
					refs.push(self.read_ref(&mut cursor)?);
				}

				self.enter()?;
				let mut items = Vec::with_capacity(refs.len());
				for child in refs {
					items.push(self.object_at_index(child)?);
				}
				self.leave();
				Value::Array(items)
			}
			0xD0 => {
				let count = count_for_tag(&mut cursor, tag)?;
				let ref_size = u64::from(self.trailer.object_ref_size);
				self.check_payload(offset, count.saturating_mul(2), ref_size, "dictionary", index)?;

				let mut refs = Vec::new();
				for _ in 0..count.saturating_mul(2) {
					refs.push(self.read_ref(&mut cursor)?);
				}
				// All reads succeeded, so count pairs fit in the document.
				let count = count as usize;

				self.enter()?;
				let mut keys: Vec<String> = Vec::with_capacity(count);
				let mut values = Vec::with_capacity(count);
				for entry in 0..count {
					let key = self.object_at_index(refs[entry])?;
					let value = self.object_at_index(refs[entry + count])?;
					let Value::String(key) = key else {
						return Err(PlistError::NonStringKey {
							index,
							entry: entry as u64,
						});
					};
					if keys.contains(&key) {
						return Err(PlistError::DuplicateKey { key });
					}
					keys.push(key);
					values.push(value);
				}
				self.leave();
				Value::Dictionary(Dictionary::from_parts(keys, values))
			}
			_ => return Err(PlistError::UnknownTag { tag, offset }),
		};

		self.charge(1)?;
		Ok(value)
	}

	fn read_ref(&self, cursor: &mut Cursor<'_>) -> Result<u64> {
		let (index, _) = read_sized_int(cursor, usize::from(self.trailer.object_ref_size), false)?;
		Ok(index)
	}

	/// Variable-length payloads may not extend past the offset table.
	fn check_payload(&self, offset: u64, count: u64, width: u64, kind: &'static str, index: u64) -> Result<()> {
		let need = count.saturating_mul(width);
		if offset.saturating_add(need) > self.trailer.offset_table_offset {
			return Err(PlistError::LengthBeyondTable {
				kind,
				index,
				need,
				table_at: self.trailer.offset_table_offset,
			});
		}
		Ok(())
	}

	fn enter(&mut self) -> Result<()> {
		self.depth += 1;
		if self.depth > self.options.max_depth {
			return Err(PlistError::DecodeDepthExceeded {
				max_depth: self.options.max_depth,
			});
		}
		Ok(())
	}

	fn leave(&mut self) {
		self.depth -= 1;
	}

	fn charge(&mut self, nodes: u64) -> Result<()> {
		self.produced = self.produced.saturating_add(nodes);
		if self.produced > self.options.max_nodes {
			return Err(PlistError::DecodeNodeBudgetExceeded {
				max_nodes: self.options.max_nodes,
			});
		}
		Ok(())
	}
}

/// Read a big-endian integer of `width` bytes as (low, high) halves.
///
/// Legal widths are 1, 2, 4 and 8; 16 is additionally legal for tagged
/// integer payloads, which are the only records wide enough to carry a
/// sign. The high half is zero for every width below 16.
fn read_sized_int(cursor: &mut Cursor<'_>, width: usize, allow_wide: bool) -> Result<(u64, u64)> {
	match width {
		1 => Ok((u64::from(cursor.read_u8()?), 0)),
		2 => Ok((u64::from(cursor.read_u16_be()?), 0)),
		4 => Ok((u64::from(cursor.read_u32_be()?), 0)),
		8 => Ok((cursor.read_u64_be()?, 0)),
		16 if allow_wide => {
			let high = cursor.read_u64_be()?;
			let low = cursor.read_u64_be()?;
			Ok((low, high))
		}
		_ => Err(PlistError::IllegalIntWidth {
			width,
			offset: cursor.pos() as u64,
		}),
	}
}

/// Count from a counted tag: the low nibble inline, or `0xF` followed by a
/// nested integer object holding the real count.
fn count_for_tag(cursor: &mut Cursor<'_>, tag: u8) -> Result<u64> {
	let count = u64::from(tag & 0x0F);
	if count != 0x0F {
		return Ok(count);
	}

	let at = cursor.pos() as u64;
	let int_tag = cursor.read_u8()?;
	if int_tag & 0xF0 != 0x10 {
		return Err(PlistError::UnknownTag {
			tag: int_tag,
			offset: at,
		});
	}
	let width = 1_usize << (int_tag & 0x0F);
	let (low, high) = read_sized_int(cursor, width, true)?;
	if high != 0 {
		return Err(PlistError::OversizedCount { offset: at });
	}
	Ok(low)
}

#[cfg(test)]
mod tests {
	use super::{DecodeOptions, decode_binary, decode_binary_with};
	use crate::error::PlistError;
	use crate::value::Value;

	/// Assemble a document with one-byte offsets and refs from raw records.
	fn doc(objects: &[&[u8]], top: u64) -> Vec<u8> {
		let mut buf = b"bplist00".to_vec();
		let mut offsets = Vec::new();
		for object in objects {
			offsets.push(buf.len() as u8);
			buf.extend_from_slice(object);
		}
		let table_at = buf.len() as u64;
		buf.extend_from_slice(&offsets);
		buf.extend_from_slice(&[0; 6]);
		buf.push(1);
		buf.push(1);
		buf.extend_from_slice(&(objects.len() as u64).to_be_bytes());
		buf.extend_from_slice(&top.to_be_bytes());
		buf.extend_from_slice(&table_at.to_be_bytes());
		buf
	}

	#[test]
	fn decodes_shared_object_through_memo() {
		// Array holding the same string object twice.
		let bytes = doc(&[&[0xA2, 0x01, 0x01], &[0x53, b'h', b'i', b'!']], 0);
		let value = decode_binary(&bytes).expect("document decodes");
		let items = value.as_array().expect("root is an array");
		assert_eq!(items, [Value::from("hi!"), Value::from("hi!")]);
	}

	#[test]
	fn rejects_self_referential_array() {
		let bytes = doc(&[&[0xA1, 0x00]], 0);
		let err = decode_binary(&bytes).expect_err("self-reference must fail");
		assert!(matches!(err, PlistError::CyclicReference { index: 0 }));
	}

	#[test]
	fn rejects_null_marker() {
		let bytes = doc(&[&[0x00]], 0);
		let err = decode_binary(&bytes).expect_err("null has no value form");
		assert!(matches!(err, PlistError::UnknownTag { tag: 0x00, offset: 8 }));
	}

	#[test]
	fn reads_count_from_nested_integer() {
		let mut record = vec![0x5F, 0x10, 0x0F];
		record.extend_from_slice(b"fifteen chars!!");
		let bytes = doc(&[&record], 0);
		let value = decode_binary(&bytes).expect("extended count decodes");
		assert_eq!(value.as_string(), Some("fifteen chars!!"));
	}

	#[test]
	fn rejects_count_that_is_not_an_integer_object() {
		let bytes = doc(&[&[0x5F, 0x53, b'a', b'b', b'c']], 0);
		let err = decode_binary(&bytes).expect_err("count tag must be an integer");
		assert!(matches!(err, PlistError::UnknownTag { tag: 0x53, .. }));
	}

	#[test]
	fn sixteen_byte_integer_with_ones_is_signed() {
		let mut record = vec![0x14];
		record.extend_from_slice(&[0xFF; 8]);
		record.extend_from_slice(&(-42_i64).to_be_bytes());
		let bytes = doc(&[&record], 0);
		let value = decode_binary(&bytes).expect("wide integer decodes");
		assert_eq!(value.as_signed_integer(), Some(-42));
	}

	#[test]
	fn rejects_non_string_dictionary_key() {
		let bytes = doc(&[&[0xD1, 0x01, 0x01], &[0x10, 0x07]], 0);
		let err = decode_binary(&bytes).expect_err("integer keys are invalid");
		assert!(matches!(err, PlistError::NonStringKey { index: 0, entry: 0 }));
	}

	#[test]
	fn rejects_duplicate_dictionary_key() {
		// Both entries reference the same key object.
		let bytes = doc(
			&[&[0xD2, 0x01, 0x01, 0x02, 0x02], &[0x51, b'k'], &[0x09]],
			0,
		);
		let err = decode_binary(&bytes).expect_err("repeated key must fail");
		assert!(matches!(err, PlistError::DuplicateKey { ref key } if key == "k"));
	}

	#[test]
	fn depth_limit_stops_nested_containers() {
		let bytes = doc(&[&[0xA1, 0x01], &[0xA1, 0x02], &[0xA1, 0x03], &[0x09]], 0);
		let options = DecodeOptions {
			max_depth: 2,
			..DecodeOptions::default()
		};
		let err = decode_binary_with(&bytes, &options).expect_err("three levels exceed two");
		assert!(matches!(err, PlistError::DecodeDepthExceeded { max_depth: 2 }));
		assert!(decode_binary(&bytes).is_ok());
	}

	#[test]
	fn node_budget_stops_reference_amplification() {
		// Ten references to the same four-element array: 51 nodes total.
		let fanout: Vec<u8> = [0xAA].iter().copied().chain(std::iter::repeat_n(0x01, 10)).collect();
		let inner = [0xA4, 0x02, 0x02, 0x02, 0x02];
		let bytes = doc(&[&fanout, &inner, &[0x09]], 0);

		let options = DecodeOptions {
			max_nodes: 20,
			..DecodeOptions::default()
		};
		let err = decode_binary_with(&bytes, &options).expect_err("51 nodes exceed 20");
		assert!(matches!(err, PlistError::DecodeNodeBudgetExceeded { max_nodes: 20 }));
		assert!(decode_binary(&bytes).is_ok());
	}
}
