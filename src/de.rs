//! Serde deserializer over [`Value`] trees.
//!
//! The tree is self-describing, so `deserialize_any` drives most visits.
//! Dates and UIDs intercept their marker newtypes; under `deserialize_any`
//! they surface as seconds (f64) and u64 respectively.

use std::fmt;

use serde::Deserialize;
use serde::de::{self, value::BorrowedStrDeserializer};

use crate::error::{PlistError, Result};
use crate::value::{DATE_MARKER, Date, Dictionary, Integer, Real, UID_MARKER, Uid, Value};

/// Deserialize any `T: Deserialize` from a [`Value`] tree.
pub fn from_value<'de, T: Deserialize<'de>>(value: &'de Value) -> Result<T> {
	T::deserialize(ValueDeserializer { value })
}

#[derive(Clone, Copy)]
struct ValueDeserializer<'de> {
	value: &'de Value,
}

impl<'de> de::Deserializer<'de> for ValueDeserializer<'de> {
	type Error = PlistError;

	fn deserialize_any<V: de::Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
		match self.value {
			Value::Dictionary(dict) => visitor.visit_map(DictAccess { dict, slot: 0 }),
			Value::Array(items) => visitor.visit_seq(ArrayAccess { items: items.iter() }),
			Value::String(text) => visitor.visit_borrowed_str(text),
			Value::Integer(num) => {
				if num.signed {
					visitor.visit_i64(num.value as i64)
				} else {
					visitor.visit_u64(num.value)
				}
			}
			Value::Real(real) => visitor.visit_f64(real.value),
			Value::Boolean(flag) => visitor.visit_bool(*flag),
			Value::Data(bytes) => visitor.visit_borrowed_bytes(bytes),
			Value::Date(date) => visitor.visit_f64(date.seconds()),
			Value::Uid(uid) => visitor.visit_u64(uid.0),
		}
	}

	// Every value is present; absence is a missing dictionary entry, which
	// the map access never yields.
	fn deserialize_option<V: de::Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
		visitor.visit_some(self)
	}

	fn deserialize_newtype_struct<V: de::Visitor<'de>>(
		self,
		name: &'static str,
		visitor: V,
	) -> Result<V::Value> {
		match name {
			DATE_MARKER => match self.value {
				Value::Date(date) => visitor.visit_f64(date.seconds()),
				Value::Real(real) => visitor.visit_f64(real.value),
				other => Err(de::Error::invalid_type(
					de::Unexpected::Other(other.kind()),
					&"a date",
				)),
			},
			UID_MARKER => match self.value {
				Value::Uid(uid) => visitor.visit_u64(uid.0),
				Value::Integer(num) => visitor.visit_u64(num.value),
				other => Err(de::Error::invalid_type(
					de::Unexpected::Other(other.kind()),
					&"a UID",
				)),
			},
			_ => visitor.visit_newtype_struct(self),
		}
	}

	fn deserialize_enum<V: de::Visitor<'de>>(
		self,
		_name: &'static str,
		_variants: &'static [&'static str],
		visitor: V,
	) -> Result<V::Value> {
		match self.value {
			Value::String(variant) => visitor.visit_enum(EnumDeserializer {
				variant,
				content: None,
			}),
			Value::Dictionary(dict) if dict.len() == 1 => {
				let (variant, content) = dict.entry(0);
				visitor.visit_enum(EnumDeserializer {
					variant,
					content: Some(content),
				})
			}
			other => Err(de::Error::invalid_type(
				de::Unexpected::Other(other.kind()),
				&"a variant name or a single-entry dictionary",
			)),
		}
	}

	serde::forward_to_deserialize_any! {
		bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char str string
		bytes byte_buf unit unit_struct seq tuple tuple_struct map struct
		identifier ignored_any
	}
}

struct DictAccess<'de> {
	dict: &'de Dictionary,
	slot: usize,
}

impl<'de> de::MapAccess<'de> for DictAccess<'de> {
	type Error = PlistError;

	fn next_key_seed<K: de::DeserializeSeed<'de>>(&mut self, seed: K) -> Result<Option<K::Value>> {
		if self.slot >= self.dict.len() {
			return Ok(None);
		}
		let (key, _) = self.dict.entry(self.slot);
		seed.deserialize(BorrowedStrDeserializer::new(key)).map(Some)
	}

	fn next_value_seed<V: de::DeserializeSeed<'de>>(&mut self, seed: V) -> Result<V::Value> {
		let (_, value) = self.dict.entry(self.slot);
		self.slot += 1;
		seed.deserialize(ValueDeserializer { value })
	}

	fn size_hint(&self) -> Option<usize> {
		Some(self.dict.len() - self.slot)
	}
}

struct ArrayAccess<'de> {
	items: std::slice::Iter<'de, Value>,
}

impl<'de> de::SeqAccess<'de> for ArrayAccess<'de> {
	type Error = PlistError;

	fn next_element_seed<T: de::DeserializeSeed<'de>>(&mut self, seed: T) -> Result<Option<T::Value>> {
		match self.items.next() {
			Some(value) => seed.deserialize(ValueDeserializer { value }).map(Some),
			None => Ok(None),
		}
	}

	fn size_hint(&self) -> Option<usize> {
		Some(self.items.len())
	}
}

struct EnumDeserializer<'de> {
	variant: &'de str,
	content: Option<&'de Value>,
}

impl<'de> de::EnumAccess<'de> for EnumDeserializer<'de> {
	type Error = PlistError;
	type Variant = VariantDeserializer<'de>;

	fn variant_seed<V: de::DeserializeSeed<'de>>(self, seed: V) -> Result<(V::Value, Self::Variant)> {
		let variant = seed.deserialize(BorrowedStrDeserializer::<PlistError>::new(self.variant))?;
		Ok((variant, VariantDeserializer { content: self.content }))
	}
}

struct VariantDeserializer<'de> {
	content: Option<&'de Value>,
}

impl<'de> de::VariantAccess<'de> for VariantDeserializer<'de> {
	type Error = PlistError;

	fn unit_variant(self) -> Result<()> {
		match self.content {
			None => Ok(()),
			Some(value) => Err(de::Error::invalid_type(
				de::Unexpected::Other(value.kind()),
				&"a unit variant with no content",
			)),
		}
	}

	fn newtype_variant_seed<T: de::DeserializeSeed<'de>>(self, seed: T) -> Result<T::Value> {
		match self.content {
			Some(value) => seed.deserialize(ValueDeserializer { value }),
			None => Err(de::Error::invalid_type(
				de::Unexpected::UnitVariant,
				&"newtype variant content",
			)),
		}
	}

	fn tuple_variant<V: de::Visitor<'de>>(self, _len: usize, visitor: V) -> Result<V::Value> {
		match self.content {
			Some(Value::Array(items)) => visitor.visit_seq(ArrayAccess { items: items.iter() }),
			Some(other) => Err(de::Error::invalid_type(
				de::Unexpected::Other(other.kind()),
				&"an array of tuple fields",
			)),
			None => Err(de::Error::invalid_type(
				de::Unexpected::UnitVariant,
				&"an array of tuple fields",
			)),
		}
	}

	fn struct_variant<V: de::Visitor<'de>>(
		self,
		_fields: &'static [&'static str],
		visitor: V,
	) -> Result<V::Value> {
		match self.content {
			Some(Value::Dictionary(dict)) => visitor.visit_map(DictAccess { dict, slot: 0 }),
			Some(other) => Err(de::Error::invalid_type(
				de::Unexpected::Other(other.kind()),
				&"a dictionary of fields",
			)),
			None => Err(de::Error::invalid_type(
				de::Unexpected::UnitVariant,
				&"a dictionary of fields",
			)),
		}
	}
}

impl<'de> Deserialize<'de> for Value {
	fn deserialize<D: de::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
		deserializer.deserialize_any(ValueVisitor)
	}
}

struct ValueVisitor;

impl<'de> de::Visitor<'de> for ValueVisitor {
	type Value = Value;

	fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str("a property list value")
	}

	fn visit_bool<E: de::Error>(self, v: bool) -> std::result::Result<Value, E> {
		Ok(Value::Boolean(v))
	}

	fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<Value, E> {
		Ok(Value::Integer(Integer::signed(v)))
	}

	fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<Value, E> {
		Ok(Value::Integer(Integer::unsigned(v)))
	}

	fn visit_f32<E: de::Error>(self, v: f32) -> std::result::Result<Value, E> {
		Ok(Value::Real(Real {
			wide: false,
			value: f64::from(v),
		}))
	}

	fn visit_f64<E: de::Error>(self, v: f64) -> std::result::Result<Value, E> {
		Ok(Value::Real(Real { wide: true, value: v }))
	}

	fn visit_char<E: de::Error>(self, v: char) -> std::result::Result<Value, E> {
		Ok(Value::String(v.to_string()))
	}

	fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<Value, E> {
		Ok(Value::String(v.to_owned()))
	}

	fn visit_string<E: de::Error>(self, v: String) -> std::result::Result<Value, E> {
		Ok(Value::String(v))
	}

	fn visit_bytes<E: de::Error>(self, v: &[u8]) -> std::result::Result<Value, E> {
		Ok(Value::Data(v.to_vec()))
	}

	fn visit_byte_buf<E: de::Error>(self, v: Vec<u8>) -> std::result::Result<Value, E> {
		Ok(Value::Data(v))
	}

	fn visit_some<D: de::Deserializer<'de>>(self, deserializer: D) -> std::result::Result<Value, D::Error> {
		Deserialize::deserialize(deserializer)
	}

	fn visit_newtype_struct<D: de::Deserializer<'de>>(
		self,
		deserializer: D,
	) -> std::result::Result<Value, D::Error> {
		Deserialize::deserialize(deserializer)
	}

	fn visit_seq<A: de::SeqAccess<'de>>(self, mut seq: A) -> std::result::Result<Value, A::Error> {
		let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
		while let Some(item) = seq.next_element()? {
			items.push(item);
		}
		Ok(Value::Array(items))
	}

	fn visit_map<A: de::MapAccess<'de>>(self, mut map: A) -> std::result::Result<Value, A::Error> {
		let mut dict = Dictionary::new();
		while let Some((key, value)) = map.next_entry::<String, Value>()? {
			dict.insert(key, value);
		}
		Ok(Value::Dictionary(dict))
	}
}

impl<'de> Deserialize<'de> for Date {
	fn deserialize<D: de::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
		deserializer.deserialize_newtype_struct(DATE_MARKER, DateVisitor)
	}
}

struct DateVisitor;

impl<'de> de::Visitor<'de> for DateVisitor {
	type Value = Date;

	fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str("seconds since the Apple epoch")
	}

	fn visit_f64<E: de::Error>(self, v: f64) -> std::result::Result<Date, E> {
		Ok(Date::from_seconds(v))
	}

	fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<Date, E> {
		Ok(Date::from_seconds(v as f64))
	}

	fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<Date, E> {
		Ok(Date::from_seconds(v as f64))
	}

	fn visit_newtype_struct<D: de::Deserializer<'de>>(
		self,
		deserializer: D,
	) -> std::result::Result<Date, D::Error> {
		f64::deserialize(deserializer).map(Date::from_seconds)
	}
}

impl<'de> Deserialize<'de> for Uid {
	fn deserialize<D: de::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
		deserializer.deserialize_newtype_struct(UID_MARKER, UidVisitor)
	}
}

struct UidVisitor;

impl<'de> de::Visitor<'de> for UidVisitor {
	type Value = Uid;

	fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str("a UID ordinal")
	}

	fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<Uid, E> {
		Ok(Uid(v))
	}

	fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<Uid, E> {
		u64::try_from(v)
			.map(Uid)
			.map_err(|_| de::Error::invalid_value(de::Unexpected::Signed(v), &self))
	}

	fn visit_newtype_struct<D: de::Deserializer<'de>>(
		self,
		deserializer: D,
	) -> std::result::Result<Uid, D::Error> {
		u64::deserialize(deserializer).map(Uid)
	}
}
