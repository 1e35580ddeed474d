//! XML property list writer.
//!
//! Output is deliberately compact: the XML declaration and DOCTYPE preamble,
//! then the whole `<plist>` element on a single line. Dictionaries are
//! written in canonical (sorted) key order, like the binary encoder.

use std::io::Write;

use base64::Engine as _;
use base64::prelude::BASE64_STANDARD;

use crate::error::{PlistError, Result};
use crate::value::{Dictionary, Value};

const XML_HEADER: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n";
const XML_DOCTYPE: &str =
	"<!DOCTYPE plist PUBLIC \"-//Apple//DTD PLIST 1.0//EN\" \"http://www.apple.com/DTDs/PropertyList-1.0.dtd\">";

/// Encode a value tree as an XML property list document.
pub fn encode_xml_to_string(root: &Value) -> Result<String> {
	let mut out = String::new();
	out.push_str(XML_HEADER);
	out.push_str(XML_DOCTYPE);
	out.push_str("<plist version=\"1.0\">");
	write_value(&mut out, root)?;
	out.push_str("</plist>");
	Ok(out)
}

/// Encode a value tree as an XML property list into `writer`.
pub fn encode_xml<W: Write>(mut writer: W, root: &Value) -> Result<()> {
	let text = encode_xml_to_string(root)?;
	writer.write_all(text.as_bytes())?;
	Ok(())
}

fn write_value(out: &mut String, value: &Value) -> Result<()> {
	match value {
		Value::Dictionary(dict) => write_dictionary(out, dict),
		Value::Array(items) => {
			out.push_str("<array>");
			for item in items {
				write_value(out, item)?;
			}
			out.push_str("</array>");
			Ok(())
		}
		Value::String(text) => {
			element(out, "string", text);
			Ok(())
		}
		Value::Integer(num) => {
			let rendered = if num.signed {
				(num.value as i64).to_string()
			} else {
				num.value.to_string()
			};
			element(out, "integer", &rendered);
			Ok(())
		}
		Value::Real(real) => {
			element(out, "real", &format_real(real.value));
			Ok(())
		}
		Value::Boolean(true) => {
			out.push_str("<true/>");
			Ok(())
		}
		Value::Boolean(false) => {
			out.push_str("<false/>");
			Ok(())
		}
		Value::Data(bytes) => {
			element(out, "data", &BASE64_STANDARD.encode(bytes));
			Ok(())
		}
		Value::Date(date) => {
			let datetime = date.to_datetime().ok_or(PlistError::DateOutOfRange {
				seconds: date.seconds(),
			})?;
			element(out, "date", &datetime.format("%Y-%m-%dT%H:%M:%SZ").to_string());
			Ok(())
		}
		// UIDs have no XML form of their own; keyed archives spell them as
		// a single-entry dict.
		Value::Uid(uid) => {
			out.push_str("<dict><key>CF$UID</key>");
			element(out, "integer", &uid.0.to_string());
			out.push_str("</dict>");
			Ok(())
		}
	}
}

fn write_dictionary(out: &mut String, dict: &Dictionary) -> Result<()> {
	out.push_str("<dict>");
	for slot in dict.sorted_order() {
		let (key, value) = dict.entry(slot);
		element(out, "key", key);
		write_value(out, value)?;
	}
	out.push_str("</dict>");
	Ok(())
}

/// Text element; empty text self-closes.
fn element(out: &mut String, name: &str, text: &str) {
	if text.is_empty() {
		out.push('<');
		out.push_str(name);
		out.push_str("/>");
		return;
	}
	out.push('<');
	out.push_str(name);
	out.push('>');
	escape_text(out, text);
	out.push_str("</");
	out.push_str(name);
	out.push('>');
}

fn escape_text(out: &mut String, text: &str) {
	for c in text.chars() {
		match c {
			'&' => out.push_str("&amp;"),
			'<' => out.push_str("&lt;"),
			'>' => out.push_str("&gt;"),
			'"' => out.push_str("&#34;"),
			'\'' => out.push_str("&#39;"),
			'\t' => out.push_str("&#x9;"),
			'\n' => out.push_str("&#xA;"),
			'\r' => out.push_str("&#xD;"),
			_ => out.push(c),
		}
	}
}

fn format_real(value: f64) -> String {
	if value.is_nan() {
		return "nan".to_owned();
	}
	if value.is_infinite() {
		return if value > 0.0 { "inf" } else { "-inf" }.to_owned();
	}
	value.to_string()
}
