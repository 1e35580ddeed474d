use thiserror::Error;

/// Crate-local result type.
pub type Result<T> = std::result::Result<T, PlistError>;

/// Errors produced while decoding, encoding, and mapping property list data.
#[derive(Debug, Error)]
pub enum PlistError {
	/// Filesystem or stream IO failure.
	#[error("io: {0}")]
	Io(#[from] std::io::Error),
	/// Leading bytes are not the binary property list magic.
	#[error("not a binary property list (magic={magic:?})")]
	BadMagic {
		/// First 6 bytes of the document.
		magic: [u8; 6],
	},
	/// Header version bytes are not ASCII digits.
	#[error("malformed version digits {version:?}")]
	BadVersionDigits {
		/// Raw version bytes from the header.
		version: [u8; 2],
	},
	/// Parsed header version is newer than this decoder supports.
	#[error("unsupported binary plist version {version} (expected <= 1)")]
	UnsupportedVersion {
		/// Parsed version number.
		version: u8,
	},
	/// Document cannot hold an 8-byte header plus a 32-byte trailer.
	#[error("document too short for header and trailer ({len} bytes)")]
	TruncatedDocument {
		/// Total document length.
		len: usize,
	},
	/// Not enough bytes remained for a requested read.
	#[error("unexpected eof at offset {at}, need {need} bytes, remaining {rem}")]
	UnexpectedEof {
		/// Byte offset where the read was attempted.
		at: usize,
		/// Requested bytes.
		need: usize,
		/// Bytes still available.
		rem: usize,
	},
	/// Offset table does not begin before the trailer.
	#[error("offset table at 0x{offset:x} beyond beginning of trailer at 0x{trailer_at:x}")]
	OffsetTableAfterTrailer {
		/// Declared offset table position.
		offset: u64,
		/// Byte position of the trailer.
		trailer_at: u64,
	},
	/// Offset table begins inside the 8-byte header.
	#[error("offset table begins inside header (0x{offset:x})")]
	OffsetTableInHeader {
		/// Declared offset table position.
		offset: u64,
	},
	/// Bytes exist between the end of the offset table and the trailer.
	#[error("undeclared bytes between offset table end 0x{declared_end:x} and trailer at 0x{trailer_at:x}")]
	UndeclaredBytesBeforeTrailer {
		/// Byte position where the declared offset table ends.
		declared_end: u64,
		/// Byte position of the trailer.
		trailer_at: u64,
	},
	/// Object count exceeds the document's non-trailer byte count.
	#[error("more objects ({objects}) than non-trailer bytes ({available})")]
	TooManyObjects {
		/// Declared object count.
		objects: u64,
		/// Non-trailer bytes in the document.
		available: u64,
	},
	/// Object reference width cannot address every declared object.
	#[error("object ref size ({ref_size} bytes) cannot address {objects} objects")]
	RefWidthTooNarrow {
		/// Declared object count.
		objects: u64,
		/// Declared reference width in bytes.
		ref_size: u8,
	},
	/// Offset entry width cannot address the whole document.
	#[error("offset int size ({offset_size} bytes) cannot address offset table at 0x{table_at:x}")]
	OffsetWidthTooNarrow {
		/// Declared offset entry width in bytes.
		offset_size: u8,
		/// Declared offset table position.
		table_at: u64,
	},
	/// Root object index is not a valid object index.
	#[error("top object #{index} out of range (only {objects} objects exist)")]
	TopObjectOutOfRange {
		/// Declared root object index.
		index: u64,
		/// Declared object count.
		objects: u64,
	},
	/// Offset table entry points inside or past the offset table itself.
	#[error("object #{index} starts at 0x{offset:x}, inside or past the offset table at 0x{table_at:x}")]
	ObjectOffsetOutOfRange {
		/// Object index of the offending entry.
		index: u64,
		/// Declared object start offset.
		offset: u64,
		/// Offset table position.
		table_at: u64,
	},
	/// Tag byte does not match any known object kind.
	#[error("unexpected tag 0x{tag:02x} at offset {offset}")]
	UnknownTag {
		/// Offending tag byte.
		tag: u8,
		/// Byte offset of the tag.
		offset: u64,
	},
	/// Sized integer width is not one of the legal widths.
	#[error("illegal integer width {width} at offset {offset}")]
	IllegalIntWidth {
		/// Requested width in bytes.
		width: usize,
		/// Byte offset of the read.
		offset: u64,
	},
	/// Real width is not 4 or 8 bytes.
	#[error("illegal float width {width} at offset {offset}")]
	IllegalFloatWidth {
		/// Requested width in bytes.
		width: usize,
		/// Byte offset of the read.
		offset: u64,
	},
	/// Extended object count does not fit in 64 bits.
	#[error("object count at offset {offset} exceeds 64 bits")]
	OversizedCount {
		/// Byte offset of the count.
		offset: u64,
	},
	/// Variable-length payload would run past the offset table.
	#[error("{kind} #{index} payload of {need} bytes runs past the offset table at 0x{table_at:x}")]
	LengthBeyondTable {
		/// Object kind name.
		kind: &'static str,
		/// Object index of the offending record.
		index: u64,
		/// Declared payload length in bytes.
		need: u64,
		/// Offset table position.
		table_at: u64,
	},
	/// Container holds a reference to a nonexistent object.
	#[error("reference to object #{index} out of range (only {objects} objects exist)")]
	RefOutOfRange {
		/// Referenced object index.
		index: u64,
		/// Declared object count.
		objects: u64,
	},
	/// Container directly or indirectly contains itself.
	#[error("self-referential object #{index} cannot be decoded")]
	CyclicReference {
		/// Object index participating in the cycle.
		index: u64,
	},
	/// Dictionary key object is not a string.
	#[error("dictionary #{index} has a non-string key at entry {entry}")]
	NonStringKey {
		/// Object index of the dictionary.
		index: u64,
		/// Zero-based entry position of the offending key.
		entry: u64,
	},
	/// Dictionary declares the same key twice.
	#[error("duplicate dictionary key {key:?}")]
	DuplicateKey {
		/// Repeated key text.
		key: String,
	},
	/// Decoder recursion depth exceeded the configured limit.
	#[error("decode depth exceeded (max={max_depth})")]
	DecodeDepthExceeded {
		/// Configured depth ceiling.
		max_depth: u32,
	},
	/// Decoder produced more values than the configured budget.
	#[error("decode produced more than {max_nodes} values")]
	DecodeNodeBudgetExceeded {
		/// Configured node ceiling.
		max_nodes: u64,
	},
	/// Date value has no calendar representation.
	#[error("date {seconds} seconds from the reference epoch is outside the calendar range")]
	DateOutOfRange {
		/// Seconds relative to the Apple epoch.
		seconds: f64,
	},
	/// XML input ended before the document was complete.
	#[error("unexpected end of xml at byte {at}, expected {expected}")]
	XmlUnexpectedEof {
		/// Byte offset where input ended.
		at: usize,
		/// Description of what was expected next.
		expected: &'static str,
	},
	/// Closing tag does not match the open element.
	#[error("mismatched closing tag at byte {at}: expected </{expected}>, got </{got}>")]
	XmlMismatchedTag {
		/// Name of the element being closed.
		expected: String,
		/// Name found in the closing tag.
		got: String,
		/// Byte offset of the closing tag.
		at: usize,
	},
	/// Element name is not part of the plist vocabulary.
	#[error("unknown element <{name}> at byte {at}")]
	XmlUnknownElement {
		/// Offending element name.
		name: String,
		/// Byte offset of the element.
		at: usize,
	},
	/// Token that is not valid at the current position.
	#[error("unexpected {what} at byte {at}")]
	XmlUnexpectedContent {
		/// Description of the offending token.
		what: &'static str,
		/// Byte offset of the token.
		at: usize,
	},
	/// Malformed character or entity reference.
	#[error("malformed character entity at byte {at}")]
	XmlBadEntity {
		/// Byte offset of the entity.
		at: usize,
	},
	/// Dictionary value appeared without a preceding key.
	#[error("dictionary value without a preceding key at byte {at}")]
	XmlMissingKey {
		/// Byte offset of the value element.
		at: usize,
	},
	/// Dictionary key appeared without a following value.
	#[error("dictionary key {key:?} has no value")]
	XmlMissingValue {
		/// Key text missing its value.
		key: String,
	},
	/// Document contains no value.
	#[error("empty plist document")]
	XmlEmptyDocument,
	/// Integer element text does not parse.
	#[error("invalid integer text {text:?}")]
	InvalidIntegerText {
		/// Offending element text.
		text: String,
	},
	/// Real element text does not parse.
	#[error("invalid real text {text:?}")]
	InvalidRealText {
		/// Offending element text.
		text: String,
	},
	/// Date element text is not RFC 3339.
	#[error("invalid date text {text:?}")]
	InvalidDateText {
		/// Offending element text.
		text: String,
	},
	/// Data element text is not valid base64.
	#[error("invalid base64 in data element at byte {at}")]
	InvalidBase64 {
		/// Byte offset of the data element content.
		at: usize,
	},
	/// Map key type that the dictionary model cannot hold.
	#[error("cannot encode {kind} map key; plist dictionary keys are strings")]
	NonStringMapKey {
		/// Kind of the offending key.
		kind: &'static str,
	},
	/// Serialized root carries no plist representation.
	#[error("no root value to encode")]
	NoRootValue,
	/// Typed mapping failure reported through serde.
	#[error("{0}")]
	Serde(String),
}

impl serde::ser::Error for PlistError {
	fn custom<T: std::fmt::Display>(msg: T) -> Self {
		PlistError::Serde(msg.to_string())
	}
}

impl serde::de::Error for PlistError {
	fn custom<T: std::fmt::Display>(msg: T) -> Self {
		PlistError::Serde(msg.to_string())
	}
}
