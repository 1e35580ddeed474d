use chrono::{DateTime, Utc};

/// Seconds from the Unix epoch to the plist reference epoch (2001-01-01T00:00:00Z).
const EPOCH_UNIX_OFFSET: f64 = 978_307_200.0;

/// Serde newtype marker for [`Date`], shared by the ser and de sides.
pub(crate) const DATE_MARKER: &str = "proplist::date";
/// Serde newtype marker for [`Uid`], shared by the ser and de sides.
pub(crate) const UID_MARKER: &str = "proplist::uid";

/// A property list value tree.
///
/// One decode produces a whole tree; one encode consumes one. The variants
/// are the closed set of types every plist format can represent.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
	/// String-keyed mapping with parallel key and value lists.
	Dictionary(Dictionary),
	/// Ordered sequence of values.
	Array(Vec<Value>),
	/// Unicode text.
	String(String),
	/// 64-bit integer magnitude plus a sign flag.
	Integer(Integer),
	/// 64-bit float plus a storage width flag.
	Real(Real),
	/// Boolean.
	Boolean(bool),
	/// Opaque byte blob.
	Data(Vec<u8>),
	/// Point in time relative to the plist reference epoch.
	Date(Date),
	/// Keyed-archiver reference identifier.
	Uid(Uid),
}

impl Value {
	/// Human-readable kind name, used in error context.
	pub fn kind(&self) -> &'static str {
		match self {
			Value::Dictionary(_) => "dictionary",
			Value::Array(_) => "array",
			Value::String(_) => "string",
			Value::Integer(_) => "integer",
			Value::Real(_) => "real",
			Value::Boolean(_) => "boolean",
			Value::Data(_) => "data",
			Value::Date(_) => "date",
			Value::Uid(_) => "UID",
		}
	}

	/// Borrow the dictionary payload, if this is a dictionary.
	pub fn as_dictionary(&self) -> Option<&Dictionary> {
		match self {
			Value::Dictionary(dict) => Some(dict),
			_ => None,
		}
	}

	/// Borrow the array payload, if this is an array.
	pub fn as_array(&self) -> Option<&[Value]> {
		match self {
			Value::Array(values) => Some(values),
			_ => None,
		}
	}

	/// Borrow the text payload, if this is a string.
	pub fn as_string(&self) -> Option<&str> {
		match self {
			Value::String(text) => Some(text),
			_ => None,
		}
	}

	/// Return the integer as `u64`, if this is a non-negative integer.
	pub fn as_unsigned_integer(&self) -> Option<u64> {
		match self {
			Value::Integer(num) => num.as_unsigned(),
			_ => None,
		}
	}

	/// Return the integer as `i64`, if this is an integer in `i64` range.
	pub fn as_signed_integer(&self) -> Option<i64> {
		match self {
			Value::Integer(num) => num.as_signed(),
			_ => None,
		}
	}

	/// Return the float payload, if this is a real.
	pub fn as_real(&self) -> Option<f64> {
		match self {
			Value::Real(real) => Some(real.value),
			_ => None,
		}
	}

	/// Return the boolean payload, if this is a boolean.
	pub fn as_boolean(&self) -> Option<bool> {
		match self {
			Value::Boolean(flag) => Some(*flag),
			_ => None,
		}
	}

	/// Borrow the byte payload, if this is data.
	pub fn as_data(&self) -> Option<&[u8]> {
		match self {
			Value::Data(bytes) => Some(bytes),
			_ => None,
		}
	}

	/// Return the date payload, if this is a date.
	pub fn as_date(&self) -> Option<Date> {
		match self {
			Value::Date(date) => Some(*date),
			_ => None,
		}
	}

	/// Return the identifier payload, if this is a UID.
	pub fn as_uid(&self) -> Option<Uid> {
		match self {
			Value::Uid(uid) => Some(*uid),
			_ => None,
		}
	}
}

impl From<Dictionary> for Value {
	fn from(dict: Dictionary) -> Self {
		Value::Dictionary(dict)
	}
}

impl From<Vec<Value>> for Value {
	fn from(values: Vec<Value>) -> Self {
		Value::Array(values)
	}
}

impl From<String> for Value {
	fn from(text: String) -> Self {
		Value::String(text)
	}
}

impl From<&str> for Value {
	fn from(text: &str) -> Self {
		Value::String(text.to_owned())
	}
}

impl From<Integer> for Value {
	fn from(num: Integer) -> Self {
		Value::Integer(num)
	}
}

impl From<i64> for Value {
	fn from(value: i64) -> Self {
		Value::Integer(Integer::signed(value))
	}
}

impl From<i32> for Value {
	fn from(value: i32) -> Self {
		Value::Integer(Integer::signed(i64::from(value)))
	}
}

impl From<u64> for Value {
	fn from(value: u64) -> Self {
		Value::Integer(Integer::unsigned(value))
	}
}

impl From<u32> for Value {
	fn from(value: u32) -> Self {
		Value::Integer(Integer::unsigned(u64::from(value)))
	}
}

impl From<Real> for Value {
	fn from(real: Real) -> Self {
		Value::Real(real)
	}
}

impl From<f64> for Value {
	fn from(value: f64) -> Self {
		Value::Real(Real { wide: true, value })
	}
}

impl From<f32> for Value {
	fn from(value: f32) -> Self {
		Value::Real(Real {
			wide: false,
			value: f64::from(value),
		})
	}
}

impl From<bool> for Value {
	fn from(flag: bool) -> Self {
		Value::Boolean(flag)
	}
}

impl From<Vec<u8>> for Value {
	fn from(bytes: Vec<u8>) -> Self {
		Value::Data(bytes)
	}
}

impl From<&[u8]> for Value {
	fn from(bytes: &[u8]) -> Self {
		Value::Data(bytes.to_vec())
	}
}

impl From<Date> for Value {
	fn from(date: Date) -> Self {
		Value::Date(date)
	}
}

impl From<Uid> for Value {
	fn from(uid: Uid) -> Self {
		Value::Uid(uid)
	}
}

/// 64-bit integer with the wire format's sign convention.
///
/// The binary format stores magnitudes; negative numbers are recognized only
/// through a 128-bit record whose upper half is all-ones. The `signed` flag
/// records how `value` should be read, not how it was stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Integer {
	/// Interpret `value` as an `i64` bit pattern.
	pub signed: bool,
	/// Raw 64-bit magnitude or two's-complement bit pattern.
	pub value: u64,
}

impl Integer {
	/// Integer carrying an `i64`.
	pub fn signed(value: i64) -> Self {
		Self {
			signed: true,
			value: value as u64,
		}
	}

	/// Integer carrying a `u64`.
	pub fn unsigned(value: u64) -> Self {
		Self {
			signed: false,
			value,
		}
	}

	/// Value as `i64`, when it fits.
	pub fn as_signed(&self) -> Option<i64> {
		if self.signed {
			Some(self.value as i64)
		} else {
			i64::try_from(self.value).ok()
		}
	}

	/// Value as `u64`, when non-negative.
	pub fn as_unsigned(&self) -> Option<u64> {
		if self.signed && (self.value as i64) < 0 {
			None
		} else {
			Some(self.value)
		}
	}
}

/// 64-bit float with its original storage width.
///
/// `wide` is false for values read from a 4-byte record; re-encoding such a
/// value truncates it back to `f32`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Real {
	/// Whether the value was stored as 8 bytes.
	pub wide: bool,
	/// The float payload.
	pub value: f64,
}

/// Point in time, stored as seconds relative to 2001-01-01T00:00:00Z.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Date {
	seconds: f64,
}

impl Date {
	/// Date from seconds relative to the plist reference epoch.
	pub fn from_seconds(seconds: f64) -> Self {
		Self { seconds }
	}

	/// Date from a calendar time.
	pub fn from_datetime(datetime: DateTime<Utc>) -> Self {
		let unix = datetime.timestamp() as f64 + f64::from(datetime.timestamp_subsec_nanos()) * 1e-9;
		Self {
			seconds: unix - EPOCH_UNIX_OFFSET,
		}
	}

	/// Seconds relative to the plist reference epoch.
	pub fn seconds(&self) -> f64 {
		self.seconds
	}

	/// Calendar time, when the value is finite and within calendar range.
	pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
		let unix = self.seconds + EPOCH_UNIX_OFFSET;
		if !unix.is_finite() {
			return None;
		}

		let sec = unix.floor();
		if sec < i64::MIN as f64 || sec > i64::MAX as f64 {
			return None;
		}
		let nanos = ((unix - sec) * 1e9).round() as u32;
		let nanos = nanos.min(999_999_999);
		DateTime::from_timestamp(sec as i64, nanos)
	}
}

/// Keyed-archiver reference identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Uid(
	/// Raw 64-bit identifier.
	pub u64,
);

/// String-keyed mapping with insertion-ordered parallel key and value lists.
///
/// Keys are unique; [`Dictionary::insert`] replaces the value of an existing
/// key. Canonical (lexicographic) key order is applied by the encoders
/// without mutating the dictionary.
#[derive(Debug, Clone, Default)]
pub struct Dictionary {
	keys: Vec<String>,
	values: Vec<Value>,
}

impl Dictionary {
	/// Empty dictionary.
	pub fn new() -> Self {
		Self::default()
	}

	/// Number of entries.
	pub fn len(&self) -> usize {
		self.keys.len()
	}

	/// Whether the dictionary has no entries.
	pub fn is_empty(&self) -> bool {
		self.keys.is_empty()
	}

	/// Insert an entry, replacing the value if the key already exists.
	pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
		let key = key.into();
		let value = value.into();
		if let Some(slot) = self.keys.iter().position(|existing| *existing == key) {
			self.values[slot] = value;
		} else {
			self.keys.push(key);
			self.values.push(value);
		}
	}

	/// Look up a value by key.
	pub fn get(&self, key: &str) -> Option<&Value> {
		let slot = self.keys.iter().position(|existing| existing == key)?;
		Some(&self.values[slot])
	}

	/// Iterate entries in insertion order.
	pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
		self.keys.iter().map(String::as_str).zip(self.values.iter())
	}

	/// Iterate keys in insertion order.
	pub fn keys(&self) -> impl Iterator<Item = &str> {
		self.keys.iter().map(String::as_str)
	}

	/// Iterate values in insertion order.
	pub fn values(&self) -> impl Iterator<Item = &Value> {
		self.values.iter()
	}

	/// Build from parallel lists whose keys are already known to be unique.
	///
	/// Decoders reject duplicate keys before calling this.
	pub(crate) fn from_parts(keys: Vec<String>, values: Vec<Value>) -> Self {
		debug_assert_eq!(keys.len(), values.len());
		Self { keys, values }
	}

	/// Entry positions in lexicographic key order.
	pub(crate) fn sorted_order(&self) -> Vec<usize> {
		let mut order: Vec<usize> = (0..self.keys.len()).collect();
		order.sort_by(|a, b| self.keys[*a].cmp(&self.keys[*b]));
		order
	}

	/// Entry at a position, in insertion order.
	pub(crate) fn entry(&self, slot: usize) -> (&str, &Value) {
		(&self.keys[slot], &self.values[slot])
	}
}

impl PartialEq for Dictionary {
	fn eq(&self, other: &Self) -> bool {
		// Key order is not semantic; decode and canonical encode order differ.
		self.len() == other.len() && self.iter().all(|(key, value)| other.get(key) == Some(value))
	}
}

impl FromIterator<(String, Value)> for Dictionary {
	fn from_iter<I: IntoIterator<Item = (String, Value)>>(pairs: I) -> Self {
		let mut dict = Dictionary::new();
		for (key, value) in pairs {
			dict.insert(key, value);
		}
		dict
	}
}

#[cfg(test)]
mod tests {
	use super::{Date, Dictionary, Integer, Value};

	#[test]
	fn insert_replaces_existing_key() {
		let mut dict = Dictionary::new();
		dict.insert("a", 1_u64);
		dict.insert("b", 2_u64);
		dict.insert("a", 3_u64);
		assert_eq!(dict.len(), 2);
		assert_eq!(dict.get("a"), Some(&Value::from(3_u64)));
	}

	#[test]
	fn dictionary_equality_ignores_insertion_order() {
		let mut first = Dictionary::new();
		first.insert("x", "1");
		first.insert("y", "2");
		let mut second = Dictionary::new();
		second.insert("y", "2");
		second.insert("x", "1");
		assert_eq!(first, second);
	}

	#[test]
	fn sorted_order_is_lexicographic() {
		let mut dict = Dictionary::new();
		dict.insert("zebra", 0_u64);
		dict.insert("alpha", 1_u64);
		dict.insert("mid", 2_u64);
		let order = dict.sorted_order();
		let keys: Vec<&str> = order.iter().map(|slot| dict.entry(*slot).0).collect();
		assert_eq!(keys, ["alpha", "mid", "zebra"]);
	}

	#[test]
	fn integer_accessors_respect_sign() {
		let negative = Integer::signed(-5);
		assert_eq!(negative.as_signed(), Some(-5));
		assert_eq!(negative.as_unsigned(), None);

		let huge = Integer::unsigned(u64::MAX);
		assert_eq!(huge.as_signed(), None);
		assert_eq!(huge.as_unsigned(), Some(u64::MAX));
	}

	#[test]
	fn date_converts_to_calendar_time_and_back() {
		let date = Date::from_seconds(0.0);
		let datetime = date.to_datetime().expect("epoch is representable");
		assert_eq!(datetime.timestamp(), 978_307_200);
		let back = Date::from_datetime(datetime);
		assert_eq!(back.seconds(), 0.0);
	}

	#[test]
	fn date_out_of_calendar_range_is_none() {
		assert!(Date::from_seconds(f64::INFINITY).to_datetime().is_none());
		assert!(Date::from_seconds(1e30).to_datetime().is_none());
	}
}
