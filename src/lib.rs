//! Apple property list codec.
//!
//! Reads and writes the binary `bplist00` format and the XML plist dialect
//! through a shared in-memory [`Value`] tree, with a serde layer for typed
//! structs. The binary decoder checks every offset, length and reference
//! against the document bounds and never panics on untrusted input.
//!
//! ```
//! use proplist::{Value, decode_binary, encode_binary_to_vec};
//!
//! let doc = encode_binary_to_vec(&Value::from("Hello"))?;
//! assert_eq!(decode_binary(&doc)?, Value::from("Hello"));
//! # Ok::<(), proplist::PlistError>(())
//! ```

mod bytes;
mod de;
mod decode;
mod encode;
mod error;
mod header;
mod ser;
mod trailer;
mod value;
mod xml_reader;
mod xml_writer;

/// Typed deserialization from value trees.
pub use de::from_value;
/// Binary document decoding entry points and resource limits.
pub use decode::{DecodeOptions, decode_binary, decode_binary_with};
/// Binary document encoding entry points.
pub use encode::{encode_binary, encode_binary_to_vec};
/// Error and result aliases.
pub use error::{PlistError, Result};
/// Typed serialization into value trees.
pub use ser::to_value;
/// In-memory document tree types.
pub use value::{Date, Dictionary, Integer, Real, Uid, Value};
/// XML document decoding entry point.
pub use xml_reader::decode_xml;
/// XML document encoding entry points.
pub use xml_writer::{encode_xml, encode_xml_to_string};
