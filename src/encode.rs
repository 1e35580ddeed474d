//! Binary property list encoder.
//!
//! Encoding runs in two passes. The first flattens the value tree into an
//! arena of records, deduplicating scalars by value so that repeated
//! strings, numbers, reals, dates and data blobs occupy one table slot.
//! The second writes every record in table order, then the offset table,
//! then the trailer.

use std::collections::HashMap;
use std::io::Write;

use crate::bytes::CountingWriter;
use crate::error::Result;
use crate::header::HEADER_V0;
use crate::value::{Date, Real, Uid, Value};

/// Encode a value tree as a binary property list.
pub fn encode_binary_to_vec(root: &Value) -> Result<Vec<u8>> {
	let mut out = Vec::new();
	encode_binary(&mut out, root)?;
	Ok(out)
}

/// Encode a value tree as a binary property list into `writer`.
pub fn encode_binary<W: Write>(writer: W, root: &Value) -> Result<()> {
	let mut flattener = Flattener {
		table: Vec::new(),
		uniques: HashMap::new(),
	};
	let top = flattener.flatten(root);

	let num_objects = flattener.table.len() as u64;
	let ref_size = minimum_size_for_int(num_objects);

	let mut out = CountingWriter::new(writer);
	out.put(HEADER_V0)?;

	let mut offsets = Vec::with_capacity(flattener.table.len());
	for object in &flattener.table {
		offsets.push(out.written());
		write_object(&mut out, object, ref_size)?;
	}

	let table_offset = out.written();
	let offset_size = minimum_size_for_int(table_offset);
	for &offset in &offsets {
		write_sized_int(&mut out, offset, offset_size)?;
	}

	// Trailer: five unused bytes, sort version, widths, then the counts.
	out.put(&[0, 0, 0, 0, 0, 0])?;
	out.put(&[offset_size as u8, ref_size as u8])?;
	out.put(&num_objects.to_be_bytes())?;
	out.put(&top.to_be_bytes())?;
	out.put(&table_offset.to_be_bytes())?;
	Ok(())
}

/// Object-table record. Scalars borrow the source tree; containers hold the
/// slot indices assigned while flattening, never pointers into the tree.
enum FlatObj<'a> {
	Scalar(&'a Value),
	/// Dictionary key hoisted to a string record; shares slots with equal
	/// string scalars.
	Key(&'a str),
	Array(Vec<u64>),
	Dict { keys: Vec<u64>, values: Vec<u64> },
}

/// Identity of a uniquable scalar.
///
/// Reals and dates key on bit patterns, which both distinguishes the two
/// storage widths and keeps NaN payloads usable as keys.
#[derive(PartialEq, Eq, Hash)]
enum UniqueKey<'a> {
	String(&'a str),
	Integer { signed: bool, value: u64 },
	Real { wide: bool, bits: u64 },
	Date(u64),
	Data(&'a [u8]),
}

fn unique_key(value: &Value) -> Option<UniqueKey<'_>> {
	match value {
		Value::String(text) => Some(UniqueKey::String(text)),
		Value::Integer(num) => Some(UniqueKey::Integer {
			signed: num.signed,
			value: num.value,
		}),
		Value::Real(real) => Some(UniqueKey::Real {
			wide: real.wide,
			bits: if real.wide {
				real.value.to_bits()
			} else {
				u64::from((real.value as f32).to_bits())
			},
		}),
		Value::Date(date) => Some(UniqueKey::Date(date.seconds().to_bits())),
		Value::Data(bytes) => Some(UniqueKey::Data(bytes)),
		// Booleans and UIDs take a fresh slot per occurrence; containers
		// have reference identity and are never shared.
		_ => None,
	}
}

struct Flattener<'a> {
	table: Vec<FlatObj<'a>>,
	uniques: HashMap<UniqueKey<'a>, u64>,
}

impl<'a> Flattener<'a> {
	fn push(&mut self, object: FlatObj<'a>) -> u64 {
		let slot = self.table.len() as u64;
		self.table.push(object);
		slot
	}

	/// Assign `value` a table slot, reusing the slot of an equal scalar.
	fn flatten(&mut self, value: &'a Value) -> u64 {
		if let Some(unique) = unique_key(value) {
			if let Some(&slot) = self.uniques.get(&unique) {
				return slot;
			}
			let slot = self.push(FlatObj::Scalar(value));
			self.uniques.insert(unique, slot);
			return slot;
		}

		match value {
			Value::Dictionary(dict) => {
				// The container claims its slot before its children, then all
				// keys are flattened before any value, in sorted key order.
				let slot = self.push(FlatObj::Dict {
					keys: Vec::new(),
					values: Vec::new(),
				});
				let order = dict.sorted_order();
				let mut keys = Vec::with_capacity(order.len());
				let mut values = Vec::with_capacity(order.len());
				for &entry in &order {
					keys.push(self.flatten_key(dict.entry(entry).0));
				}
				for &entry in &order {
					values.push(self.flatten(dict.entry(entry).1));
				}
				self.table[slot as usize] = FlatObj::Dict { keys, values };
				slot
			}
			Value::Array(items) => {
				let slot = self.push(FlatObj::Array(Vec::new()));
				let refs = items.iter().map(|item| self.flatten(item)).collect();
				self.table[slot as usize] = FlatObj::Array(refs);
				slot
			}
			_ => self.push(FlatObj::Scalar(value)),
		}
	}

	fn flatten_key(&mut self, key: &'a str) -> u64 {
		if let Some(&slot) = self.uniques.get(&UniqueKey::String(key)) {
			return slot;
		}
		let slot = self.push(FlatObj::Key(key));
		self.uniques.insert(UniqueKey::String(key), slot);
		slot
	}
}

fn write_object<W: Write>(out: &mut CountingWriter<W>, object: &FlatObj<'_>, ref_size: usize) -> Result<()> {
	match object {
		FlatObj::Key(text) => write_string(out, text),
		FlatObj::Scalar(value) => match value {
			Value::String(text) => write_string(out, text),
			Value::Integer(num) => write_int_tag(out, num.value),
			Value::Real(real) => write_real(out, real),
			Value::Date(date) => write_date(out, date),
			Value::Data(bytes) => {
				write_counted_tag(out, 0x40, bytes.len() as u64)?;
				out.put(bytes)
			}
			Value::Boolean(flag) => out.put(&[if *flag { 0x09 } else { 0x08 }]),
			Value::Uid(Uid(value)) => write_uid(out, *value),
			Value::Dictionary(_) | Value::Array(_) => {
				unreachable!("containers always flatten to their own records")
			}
		},
		FlatObj::Array(refs) => {
			write_counted_tag(out, 0xA0, refs.len() as u64)?;
			for &slot in refs {
				write_sized_int(out, slot, ref_size)?;
			}
			Ok(())
		}
		FlatObj::Dict { keys, values } => {
			write_counted_tag(out, 0xD0, keys.len() as u64)?;
			for &slot in keys.iter().chain(values.iter()) {
				write_sized_int(out, slot, ref_size)?;
			}
			Ok(())
		}
	}
}

/// Smallest of the four legal widths that holds `n`.
fn minimum_size_for_int(n: u64) -> usize {
	match n {
		0..=0xFF => 1,
		0x100..=0xFFFF => 2,
		0x1_0000..=0xFFFF_FFFF => 4,
		_ => 8,
	}
}

fn write_sized_int<W: Write>(out: &mut CountingWriter<W>, n: u64, nbytes: usize) -> Result<()> {
	match nbytes {
		1 => out.put(&[n as u8]),
		2 => out.put(&(n as u16).to_be_bytes()),
		4 => out.put(&(n as u32).to_be_bytes()),
		8 => out.put(&n.to_be_bytes()),
		_ => unreachable!("widths come from minimum_size_for_int"),
	}
}

/// Integer record at the smallest power-of-two width holding the magnitude.
///
/// Negative numbers arrive as two's-complement bit patterns and land in the
/// 8-byte form; their sign is not recoverable from the wire.
fn write_int_tag<W: Write>(out: &mut CountingWriter<W>, n: u64) -> Result<()> {
	match n {
		0..=0xFF => out.put(&[0x10, n as u8]),
		0x100..=0xFFFF => {
			out.put(&[0x11])?;
			out.put(&(n as u16).to_be_bytes())
		}
		0x1_0000..=0xFFFF_FFFF => {
			out.put(&[0x12])?;
			out.put(&(n as u32).to_be_bytes())
		}
		_ => {
			out.put(&[0x13])?;
			out.put(&n.to_be_bytes())
		}
	}
}

fn write_real<W: Write>(out: &mut CountingWriter<W>, real: &Real) -> Result<()> {
	if real.wide {
		out.put(&[0x23])?;
		out.put(&real.value.to_be_bytes())
	} else {
		out.put(&[0x22])?;
		out.put(&(real.value as f32).to_be_bytes())
	}
}

fn write_date<W: Write>(out: &mut CountingWriter<W>, date: &Date) -> Result<()> {
	out.put(&[0x33])?;
	out.put(&date.seconds().to_be_bytes())
}

fn write_uid<W: Write>(out: &mut CountingWriter<W>, value: u64) -> Result<()> {
	let nbytes = minimum_size_for_int(value);
	out.put(&[0x80 | (nbytes as u8 - 1)])?;
	write_sized_int(out, value, nbytes)
}

/// Counted tag: the count rides in the low nibble when below 15, otherwise
/// the nibble is `0xF` and a full integer record follows.
fn write_counted_tag<W: Write>(out: &mut CountingWriter<W>, tag: u8, count: u64) -> Result<()> {
	if count < 0xF {
		out.put(&[tag | count as u8])
	} else {
		out.put(&[tag | 0x0F])?;
		write_int_tag(out, count)
	}
}

/// ASCII record, one byte per character, when every character fits a byte;
/// otherwise UTF-16BE with the count in code units.
fn write_string<W: Write>(out: &mut CountingWriter<W>, text: &str) -> Result<()> {
	let mut latin = Vec::with_capacity(text.len());
	for c in text.chars() {
		match u8::try_from(u32::from(c)) {
			Ok(byte) => latin.push(byte),
			Err(_) => {
				let units: Vec<u16> = text.encode_utf16().collect();
				write_counted_tag(out, 0x60, units.len() as u64)?;
				for unit in units {
					out.put(&unit.to_be_bytes())?;
				}
				return Ok(());
			}
		}
	}
	write_counted_tag(out, 0x50, latin.len() as u64)?;
	out.put(&latin)
}

#[cfg(test)]
mod tests {
	use super::encode_binary_to_vec;
	use crate::decode::decode_binary;
	use crate::value::{Dictionary, Value};

	fn num_objects(doc: &[u8]) -> u64 {
		let at = doc.len() - 24;
		u64::from_be_bytes(doc[at..at + 8].try_into().expect("eight bytes"))
	}

	#[test]
	fn equal_strings_share_one_slot() {
		let root = Value::Array(vec![Value::from("twin"), Value::from("twin")]);
		let doc = encode_binary_to_vec(&root).expect("array encodes");
		assert_eq!(num_objects(&doc), 2);
	}

	#[test]
	fn booleans_take_a_slot_per_occurrence() {
		let root = Value::Array(vec![Value::from(true), Value::from(true)]);
		let doc = encode_binary_to_vec(&root).expect("array encodes");
		assert_eq!(num_objects(&doc), 3);
	}

	#[test]
	fn dictionary_key_shares_slot_with_equal_string_value() {
		let mut dict = Dictionary::new();
		dict.insert("name", "name");
		let doc = encode_binary_to_vec(&Value::Dictionary(dict)).expect("dict encodes");
		assert_eq!(num_objects(&doc), 2);
	}

	#[test]
	fn negative_integer_uses_the_eight_byte_form() {
		let doc = encode_binary_to_vec(&Value::from(-1_i64)).expect("integer encodes");
		assert_eq!(&doc[8..17], &[0x13, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]);
	}

	#[test]
	fn count_of_fifteen_extends_to_an_integer_record() {
		let doc = encode_binary_to_vec(&Value::Data(vec![0xAB; 15])).expect("data encodes");
		assert_eq!(&doc[8..11], &[0x4F, 0x10, 0x0F]);
	}

	#[test]
	fn wide_and_narrow_reals_do_not_merge() {
		let narrow = Value::Real(crate::value::Real { wide: false, value: 1.5 });
		let wide = Value::Real(crate::value::Real { wide: true, value: 1.5 });
		let doc = encode_binary_to_vec(&Value::Array(vec![narrow, wide])).expect("array encodes");
		assert_eq!(num_objects(&doc), 3);
	}

	#[test]
	fn encoded_tree_decodes_back() {
		let mut dict = Dictionary::new();
		dict.insert("Name", "Dustin");
		dict.insert("Count", 42_u64);
		let root = Value::Dictionary(dict);
		let doc = encode_binary_to_vec(&root).expect("dict encodes");
		let back = decode_binary(&doc).expect("own output decodes");
		assert_eq!(back, root);
	}
}
