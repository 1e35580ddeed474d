//! Serde serializer producing [`Value`] trees.
//!
//! The property list data model has no null, so `None` and unit serialize to
//! nothing: they vanish from dictionaries and arrays, and a bare one at the
//! root is an error. Dates and UIDs travel through serde as newtype structs
//! with crate-private marker names so typed structs can embed them.

use serde::Serialize;
use serde::ser::{self, Error as _};

use crate::error::{PlistError, Result};
use crate::value::{DATE_MARKER, Date, Dictionary, Integer, Real, UID_MARKER, Uid, Value};

/// Serialize any `T: Serialize` into a [`Value`] tree.
pub fn to_value<T: Serialize + ?Sized>(value: &T) -> Result<Value> {
	value.serialize(ValueSerializer)?.ok_or(PlistError::NoRootValue)
}

/// `Ok` is `None` when the input has no property list representation.
struct ValueSerializer;

impl ser::Serializer for ValueSerializer {
	type Ok = Option<Value>;
	type Error = PlistError;
	type SerializeSeq = ArraySerializer;
	type SerializeTuple = ArraySerializer;
	type SerializeTupleStruct = ArraySerializer;
	type SerializeTupleVariant = TupleVariantSerializer;
	type SerializeMap = MapSerializer;
	type SerializeStruct = MapSerializer;
	type SerializeStructVariant = StructVariantSerializer;

	fn serialize_bool(self, v: bool) -> Result<Self::Ok> {
		Ok(Some(Value::Boolean(v)))
	}

	fn serialize_i8(self, v: i8) -> Result<Self::Ok> {
		self.serialize_i64(i64::from(v))
	}

	fn serialize_i16(self, v: i16) -> Result<Self::Ok> {
		self.serialize_i64(i64::from(v))
	}

	fn serialize_i32(self, v: i32) -> Result<Self::Ok> {
		self.serialize_i64(i64::from(v))
	}

	fn serialize_i64(self, v: i64) -> Result<Self::Ok> {
		Ok(Some(Value::Integer(Integer::signed(v))))
	}

	fn serialize_u8(self, v: u8) -> Result<Self::Ok> {
		self.serialize_u64(u64::from(v))
	}

	fn serialize_u16(self, v: u16) -> Result<Self::Ok> {
		self.serialize_u64(u64::from(v))
	}

	fn serialize_u32(self, v: u32) -> Result<Self::Ok> {
		self.serialize_u64(u64::from(v))
	}

	fn serialize_u64(self, v: u64) -> Result<Self::Ok> {
		Ok(Some(Value::Integer(Integer::unsigned(v))))
	}

	fn serialize_f32(self, v: f32) -> Result<Self::Ok> {
		Ok(Some(Value::Real(Real {
			wide: false,
			value: f64::from(v),
		})))
	}

	fn serialize_f64(self, v: f64) -> Result<Self::Ok> {
		Ok(Some(Value::Real(Real { wide: true, value: v })))
	}

	fn serialize_char(self, v: char) -> Result<Self::Ok> {
		Ok(Some(Value::String(v.to_string())))
	}

	fn serialize_str(self, v: &str) -> Result<Self::Ok> {
		Ok(Some(Value::String(v.to_owned())))
	}

	fn serialize_bytes(self, v: &[u8]) -> Result<Self::Ok> {
		Ok(Some(Value::Data(v.to_vec())))
	}

	fn serialize_none(self) -> Result<Self::Ok> {
		Ok(None)
	}

	fn serialize_some<T: Serialize + ?Sized>(self, value: &T) -> Result<Self::Ok> {
		value.serialize(self)
	}

	fn serialize_unit(self) -> Result<Self::Ok> {
		Ok(None)
	}

	fn serialize_unit_struct(self, _name: &'static str) -> Result<Self::Ok> {
		Ok(None)
	}

	fn serialize_unit_variant(
		self,
		_name: &'static str,
		_index: u32,
		variant: &'static str,
	) -> Result<Self::Ok> {
		Ok(Some(Value::String(variant.to_owned())))
	}

	fn serialize_newtype_struct<T: Serialize + ?Sized>(
		self,
		name: &'static str,
		value: &T,
	) -> Result<Self::Ok> {
		let inner = value.serialize(ValueSerializer)?;
		match name {
			DATE_MARKER => match inner {
				Some(Value::Real(real)) => Ok(Some(Value::Date(Date::from_seconds(real.value)))),
				_ => Err(PlistError::custom("date marker expects seconds")),
			},
			UID_MARKER => match inner {
				Some(Value::Integer(num)) => Ok(Some(Value::Uid(Uid(num.value)))),
				_ => Err(PlistError::custom("UID marker expects an integer")),
			},
			_ => Ok(inner),
		}
	}

	fn serialize_newtype_variant<T: Serialize + ?Sized>(
		self,
		_name: &'static str,
		_index: u32,
		variant: &'static str,
		value: &T,
	) -> Result<Self::Ok> {
		match value.serialize(ValueSerializer)? {
			Some(content) => {
				let mut dict = Dictionary::new();
				dict.insert(variant, content);
				Ok(Some(Value::Dictionary(dict)))
			}
			None => Ok(Some(Value::String(variant.to_owned()))),
		}
	}

	fn serialize_seq(self, len: Option<usize>) -> Result<Self::SerializeSeq> {
		Ok(ArraySerializer {
			items: Vec::with_capacity(len.unwrap_or(0)),
		})
	}

	fn serialize_tuple(self, len: usize) -> Result<Self::SerializeTuple> {
		self.serialize_seq(Some(len))
	}

	fn serialize_tuple_struct(
		self,
		_name: &'static str,
		len: usize,
	) -> Result<Self::SerializeTupleStruct> {
		self.serialize_seq(Some(len))
	}

	fn serialize_tuple_variant(
		self,
		_name: &'static str,
		_index: u32,
		variant: &'static str,
		len: usize,
	) -> Result<Self::SerializeTupleVariant> {
		Ok(TupleVariantSerializer {
			variant,
			items: Vec::with_capacity(len),
		})
	}

	fn serialize_map(self, _len: Option<usize>) -> Result<Self::SerializeMap> {
		Ok(MapSerializer {
			dict: Dictionary::new(),
			pending: None,
		})
	}

	fn serialize_struct(self, _name: &'static str, _len: usize) -> Result<Self::SerializeStruct> {
		Ok(MapSerializer {
			dict: Dictionary::new(),
			pending: None,
		})
	}

	fn serialize_struct_variant(
		self,
		_name: &'static str,
		_index: u32,
		variant: &'static str,
		_len: usize,
	) -> Result<Self::SerializeStructVariant> {
		Ok(StructVariantSerializer {
			variant,
			dict: Dictionary::new(),
		})
	}
}

struct ArraySerializer {
	items: Vec<Value>,
}

impl ser::SerializeSeq for ArraySerializer {
	type Ok = Option<Value>;
	type Error = PlistError;

	fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
		if let Some(item) = value.serialize(ValueSerializer)? {
			self.items.push(item);
		}
		Ok(())
	}

	fn end(self) -> Result<Self::Ok> {
		Ok(Some(Value::Array(self.items)))
	}
}

impl ser::SerializeTuple for ArraySerializer {
	type Ok = Option<Value>;
	type Error = PlistError;

	fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
		ser::SerializeSeq::serialize_element(self, value)
	}

	fn end(self) -> Result<Self::Ok> {
		ser::SerializeSeq::end(self)
	}
}

impl ser::SerializeTupleStruct for ArraySerializer {
	type Ok = Option<Value>;
	type Error = PlistError;

	fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
		ser::SerializeSeq::serialize_element(self, value)
	}

	fn end(self) -> Result<Self::Ok> {
		ser::SerializeSeq::end(self)
	}
}

struct TupleVariantSerializer {
	variant: &'static str,
	items: Vec<Value>,
}

impl ser::SerializeTupleVariant for TupleVariantSerializer {
	type Ok = Option<Value>;
	type Error = PlistError;

	fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
		if let Some(item) = value.serialize(ValueSerializer)? {
			self.items.push(item);
		}
		Ok(())
	}

	fn end(self) -> Result<Self::Ok> {
		let mut dict = Dictionary::new();
		dict.insert(self.variant, Value::Array(self.items));
		Ok(Some(Value::Dictionary(dict)))
	}
}

struct MapSerializer {
	dict: Dictionary,
	pending: Option<String>,
}

impl ser::SerializeMap for MapSerializer {
	type Ok = Option<Value>;
	type Error = PlistError;

	fn serialize_key<T: Serialize + ?Sized>(&mut self, key: &T) -> Result<()> {
		match key.serialize(ValueSerializer)? {
			Some(Value::String(text)) => {
				self.pending = Some(text);
				Ok(())
			}
			Some(other) => Err(PlistError::NonStringMapKey { kind: other.kind() }),
			None => Err(PlistError::NonStringMapKey { kind: "nothing" }),
		}
	}

	fn serialize_value<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
		let Some(key) = self.pending.take() else {
			return Err(PlistError::custom("map value serialized before its key"));
		};
		if let Some(item) = value.serialize(ValueSerializer)? {
			self.dict.insert(key, item);
		}
		Ok(())
	}

	fn end(self) -> Result<Self::Ok> {
		Ok(Some(Value::Dictionary(self.dict)))
	}
}

impl ser::SerializeStruct for MapSerializer {
	type Ok = Option<Value>;
	type Error = PlistError;

	fn serialize_field<T: Serialize + ?Sized>(&mut self, key: &'static str, value: &T) -> Result<()> {
		if let Some(item) = value.serialize(ValueSerializer)? {
			self.dict.insert(key, item);
		}
		Ok(())
	}

	fn end(self) -> Result<Self::Ok> {
		Ok(Some(Value::Dictionary(self.dict)))
	}
}

struct StructVariantSerializer {
	variant: &'static str,
	dict: Dictionary,
}

impl ser::SerializeStructVariant for StructVariantSerializer {
	type Ok = Option<Value>;
	type Error = PlistError;

	fn serialize_field<T: Serialize + ?Sized>(&mut self, key: &'static str, value: &T) -> Result<()> {
		if let Some(item) = value.serialize(ValueSerializer)? {
			self.dict.insert(key, item);
		}
		Ok(())
	}

	fn end(self) -> Result<Self::Ok> {
		let mut outer = Dictionary::new();
		outer.insert(self.variant, Value::Dictionary(self.dict));
		Ok(Some(Value::Dictionary(outer)))
	}
}

impl Serialize for Value {
	fn serialize<S: ser::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
		match self {
			Value::Dictionary(dict) => {
				use serde::ser::SerializeMap as _;
				let mut map = serializer.serialize_map(Some(dict.len()))?;
				for (key, value) in dict.iter() {
					map.serialize_entry(key, value)?;
				}
				map.end()
			}
			Value::Array(items) => items.serialize(serializer),
			Value::String(text) => serializer.serialize_str(text),
			Value::Integer(num) => {
				if num.signed {
					serializer.serialize_i64(num.value as i64)
				} else {
					serializer.serialize_u64(num.value)
				}
			}
			Value::Real(real) => {
				if real.wide {
					serializer.serialize_f64(real.value)
				} else {
					serializer.serialize_f32(real.value as f32)
				}
			}
			Value::Boolean(flag) => serializer.serialize_bool(*flag),
			Value::Data(bytes) => serializer.serialize_bytes(bytes),
			Value::Date(date) => date.serialize(serializer),
			Value::Uid(uid) => uid.serialize(serializer),
		}
	}
}

impl Serialize for Date {
	fn serialize<S: ser::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
		serializer.serialize_newtype_struct(DATE_MARKER, &self.seconds())
	}
}

impl Serialize for Uid {
	fn serialize<S: ser::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
		serializer.serialize_newtype_struct(UID_MARKER, &self.0)
	}
}

#[cfg(test)]
mod tests {
	use std::collections::BTreeMap;

	use serde::Serialize;

	use super::to_value;
	use crate::error::PlistError;
	use crate::value::{Date, Integer, Real, Uid, Value};

	#[derive(Serialize)]
	struct Track {
		title: String,
		plays: u32,
		rating: f32,
		hidden: bool,
		comment: Option<String>,
	}

	#[test]
	fn structs_become_dictionaries() {
		let track = Track {
			title: "Intro".to_owned(),
			plays: 42,
			rating: 4.5,
			hidden: false,
			comment: None,
		};
		let value = to_value(&track).expect("track serializes");
		let dict = value.as_dictionary().expect("a dictionary");
		assert_eq!(dict.get("title"), Some(&Value::from("Intro")));
		assert_eq!(dict.get("plays"), Some(&Value::Integer(Integer::unsigned(42))));
		assert_eq!(
			dict.get("rating"),
			Some(&Value::Real(Real { wide: false, value: 4.5 }))
		);
		assert_eq!(dict.get("hidden"), Some(&Value::Boolean(false)));
		assert_eq!(dict.get("comment"), None);
	}

	#[test]
	fn unit_has_no_representation_at_the_root() {
		let err = to_value(&()).expect_err("unit has no plist form");
		assert!(matches!(err, PlistError::NoRootValue));
	}

	#[test]
	fn none_elements_vanish_from_sequences() {
		let items: Vec<Option<u32>> = vec![Some(1), None, Some(3)];
		let value = to_value(&items).expect("sequence serializes");
		assert_eq!(value, Value::Array(vec![Value::from(1_u32), Value::from(3_u32)]));
	}

	#[test]
	fn non_string_keys_are_rejected() {
		let mut map = BTreeMap::new();
		map.insert(7_u32, "seven");
		let err = to_value(&map).expect_err("integer keys have no plist form");
		assert!(matches!(err, PlistError::NonStringMapKey { kind: "integer" }));
	}

	#[test]
	fn dates_and_uids_keep_their_variants() {
		#[derive(Serialize)]
		struct Archive {
			stamp: Date,
			target: Uid,
		}
		let value = to_value(&Archive {
			stamp: Date::from_seconds(123.5),
			target: Uid(9),
		})
		.expect("archive serializes");
		let dict = value.as_dictionary().expect("a dictionary");
		assert_eq!(dict.get("stamp"), Some(&Value::Date(Date::from_seconds(123.5))));
		assert_eq!(dict.get("target"), Some(&Value::Uid(Uid(9))));
	}

	#[test]
	fn enum_variants_spell_out() {
		#[derive(Serialize)]
		enum Shape {
			Point,
			Circle(u32),
			Rect { w: u32, h: u32 },
		}

		assert_eq!(to_value(&Shape::Point).expect("unit variant"), Value::from("Point"));

		let circle = to_value(&Shape::Circle(3)).expect("newtype variant");
		let dict = circle.as_dictionary().expect("a dictionary");
		assert_eq!(dict.get("Circle"), Some(&Value::from(3_u32)));

		let rect = to_value(&Shape::Rect { w: 2, h: 5 }).expect("struct variant");
		let dict = rect.as_dictionary().expect("a dictionary");
		let inner = dict.get("Rect").and_then(Value::as_dictionary).expect("inner dict");
		assert_eq!(inner.get("w"), Some(&Value::from(2_u32)));
	}

	#[test]
	fn value_trees_serialize_to_themselves() {
		let mut dict = crate::value::Dictionary::new();
		dict.insert("name", "core");
		dict.insert("count", Integer::signed(-3));
		dict.insert("ratio", Real { wide: false, value: 0.5 });
		dict.insert("blob", Value::Data(vec![1, 2, 3]));
		dict.insert("stamp", Date::from_seconds(400_000_000.0));
		dict.insert("link", Uid(2));
		dict.insert("tags", Value::Array(vec![Value::from("a"), Value::Boolean(true)]));
		let tree = Value::Dictionary(dict);

		assert_eq!(to_value(&tree).expect("tree serializes"), tree);
	}
}
