//! XML property list reader.
//!
//! A minimal pull tokenizer feeds a recursive element parser. The tokenizer
//! understands exactly what plist documents contain: tags with ignorable
//! attributes, character data with entity references, CDATA, comments, the
//! prolog and DOCTYPE. Anything else is a parse error at a byte position.

use base64::Engine as _;
use base64::prelude::BASE64_STANDARD;
use chrono::{DateTime, Utc};

use crate::error::{PlistError, Result};
use crate::value::{Date, Dictionary, Integer, Real, Uid, Value};

/// Decode an XML property list document.
///
/// The root may be a `<plist>` element wrapping exactly one value, or a
/// bare value element.
pub fn decode_xml(text: &str) -> Result<Value> {
	XmlParser {
		tokens: Tokenizer { src: text, pos: 0 },
	}
	.document()
}

enum Token<'a> {
	Start { name: &'a str, self_closing: bool },
	End { name: &'a str },
	Text(String),
	Directive,
	ProcInst,
}

fn is_xml_ws(c: char) -> bool {
	matches!(c, ' ' | '\t' | '\n' | '\r')
}

fn is_blank(text: &str) -> bool {
	text.chars().all(is_xml_ws)
}

struct Tokenizer<'a> {
	src: &'a str,
	pos: usize,
}

impl<'a> Tokenizer<'a> {
	/// Pull the next token, skipping comments. `None` means end of input.
	fn next(&mut self) -> Result<Option<(usize, Token<'a>)>> {
		loop {
			if self.pos >= self.src.len() {
				return Ok(None);
			}
			let at = self.pos;
			let rest = &self.src[at..];

			if let Some(body) = rest.strip_prefix("<!--") {
				let Some(end) = body.find("-->") else {
					return Err(PlistError::XmlUnexpectedEof {
						at: self.src.len(),
						expected: "end of comment",
					});
				};
				self.pos = at + 4 + end + 3;
				continue;
			}
			if let Some(body) = rest.strip_prefix("<![CDATA[") {
				let Some(end) = body.find("]]>") else {
					return Err(PlistError::XmlUnexpectedEof {
						at: self.src.len(),
						expected: "end of CDATA section",
					});
				};
				self.pos = at + 9 + end + 3;
				// CDATA content is literal; entities stay undecoded.
				return Ok(Some((at, Token::Text(body[..end].to_owned()))));
			}
			if rest.starts_with("<?") {
				let Some(end) = rest.find("?>") else {
					return Err(PlistError::XmlUnexpectedEof {
						at: self.src.len(),
						expected: "end of processing instruction",
					});
				};
				self.pos = at + end + 2;
				return Ok(Some((at, Token::ProcInst)));
			}
			if rest.starts_with("<!") {
				let Some(end) = rest.find('>') else {
					return Err(PlistError::XmlUnexpectedEof {
						at: self.src.len(),
						expected: "end of directive",
					});
				};
				self.pos = at + end + 1;
				return Ok(Some((at, Token::Directive)));
			}
			if let Some(body) = rest.strip_prefix("</") {
				let Some(end) = body.find('>') else {
					return Err(PlistError::XmlUnexpectedEof {
						at: self.src.len(),
						expected: "end of closing tag",
					});
				};
				let name = body[..end].trim_matches(is_xml_ws);
				self.pos = at + 2 + end + 1;
				return Ok(Some((at, Token::End { name })));
			}
			if rest.starts_with('<') {
				return Ok(Some((at, self.start_tag(at)?)));
			}

			let end = rest.find('<').unwrap_or(rest.len());
			self.pos = at + end;
			return Ok(Some((at, Token::Text(decode_entities(&rest[..end], at)?))));
		}
	}

	fn start_tag(&mut self, at: usize) -> Result<Token<'a>> {
		let bytes = self.src.as_bytes();
		let name_start = at + 1;
		let mut i = name_start;
		while i < bytes.len() && !matches!(bytes[i], b' ' | b'\t' | b'\n' | b'\r' | b'/' | b'>') {
			i += 1;
		}
		if i >= bytes.len() {
			return Err(PlistError::XmlUnexpectedEof {
				at: bytes.len(),
				expected: "end of tag",
			});
		}
		let name = &self.src[name_start..i];
		if name.is_empty() {
			return Err(PlistError::XmlUnexpectedContent {
				what: "tag without a name",
				at,
			});
		}

		// Attributes are tolerated and ignored; quoted values may hold '>'.
		let mut self_closing = false;
		let mut quote: Option<u8> = None;
		loop {
			if i >= bytes.len() {
				return Err(PlistError::XmlUnexpectedEof {
					at: bytes.len(),
					expected: "closing '>'",
				});
			}
			let byte = bytes[i];
			if let Some(q) = quote {
				if byte == q {
					quote = None;
				}
			} else {
				match byte {
					b'"' | b'\'' => quote = Some(byte),
					b'>' => {
						i += 1;
						break;
					}
					b'/' => self_closing = i + 1 < bytes.len() && bytes[i + 1] == b'>',
					_ => {}
				}
			}
			i += 1;
		}
		self.pos = i;
		Ok(Token::Start { name, self_closing })
	}
}

/// Decode the five named entities and numeric character references.
fn decode_entities(raw: &str, base: usize) -> Result<String> {
	if !raw.contains('&') {
		return Ok(raw.to_owned());
	}

	let mut out = String::with_capacity(raw.len());
	let mut rest = raw;
	let mut offset = 0;
	while let Some(amp) = rest.find('&') {
		out.push_str(&rest[..amp]);
		let at = base + offset + amp;
		let entity = &rest[amp..];
		let Some(semi) = entity.find(';') else {
			return Err(PlistError::XmlBadEntity { at });
		};
		let decoded = match &entity[1..semi] {
			"amp" => '&',
			"lt" => '<',
			"gt" => '>',
			"quot" => '"',
			"apos" => '\'',
			body => {
				let Some(code) = body.strip_prefix('#') else {
					return Err(PlistError::XmlBadEntity { at });
				};
				let parsed = match code.strip_prefix('x').or_else(|| code.strip_prefix('X')) {
					Some(hex) => u32::from_str_radix(hex, 16),
					None => code.parse::<u32>(),
				};
				parsed
					.ok()
					.and_then(char::from_u32)
					.ok_or(PlistError::XmlBadEntity { at })?
			}
		};
		out.push(decoded);
		offset += amp + semi + 1;
		rest = &entity[semi + 1..];
	}
	out.push_str(rest);
	Ok(out)
}

struct XmlParser<'a> {
	tokens: Tokenizer<'a>,
}

impl XmlParser<'_> {
	fn document(&mut self) -> Result<Value> {
		loop {
			match self.tokens.next()? {
				None => {
					return Err(PlistError::XmlUnexpectedEof {
						at: self.tokens.pos,
						expected: "a plist element",
					});
				}
				Some((_, Token::ProcInst | Token::Directive)) => continue,
				Some((at, Token::Text(text))) => {
					if is_blank(&text) {
						continue;
					}
					return Err(PlistError::XmlUnexpectedContent { what: "text", at });
				}
				Some((at, Token::End { .. })) => {
					return Err(PlistError::XmlUnexpectedContent {
						what: "closing tag",
						at,
					});
				}
				Some((_, Token::Start { name: "plist", self_closing })) => {
					if self_closing {
						return Err(PlistError::XmlEmptyDocument);
					}
					return self.plist_root();
				}
				Some((at, Token::Start { name, self_closing })) => {
					return self.parse_element(name, self_closing, at);
				}
			}
		}
	}

	/// Content of a non-empty `<plist>`: exactly one value element.
	fn plist_root(&mut self) -> Result<Value> {
		let mut root = None;
		loop {
			match self.tokens.next()? {
				None => {
					return Err(PlistError::XmlUnexpectedEof {
						at: self.tokens.pos,
						expected: "</plist>",
					});
				}
				Some((_, Token::ProcInst | Token::Directive)) => continue,
				Some((at, Token::Text(text))) => {
					if is_blank(&text) {
						continue;
					}
					return Err(PlistError::XmlUnexpectedContent { what: "text", at });
				}
				Some((at, Token::Start { name, self_closing })) => {
					if root.is_some() {
						return Err(PlistError::XmlUnexpectedContent {
							what: "second root element",
							at,
						});
					}
					root = Some(self.parse_element(name, self_closing, at)?);
				}
				Some((at, Token::End { name })) => {
					if name == "plist" {
						return root.ok_or(PlistError::XmlEmptyDocument);
					}
					return Err(PlistError::XmlMismatchedTag {
						expected: "plist".to_owned(),
						got: name.to_owned(),
						at,
					});
				}
			}
		}
	}

	fn parse_element(&mut self, name: &str, self_closing: bool, at: usize) -> Result<Value> {
		match name {
			"dict" => self.dictionary(self_closing),
			"array" => self.array(self_closing),
			"string" => Ok(Value::String(self.text_element("string", self_closing)?)),
			"integer" => {
				let text = self.text_element("integer", self_closing)?;
				Ok(Value::Integer(parse_integer(&text)?))
			}
			"real" => {
				let text = self.text_element("real", self_closing)?;
				let value = text
					.parse::<f64>()
					.map_err(|_| PlistError::InvalidRealText { text })?;
				Ok(Value::Real(Real { wide: true, value }))
			}
			"true" => {
				self.empty_element("true", self_closing, at)?;
				Ok(Value::Boolean(true))
			}
			"false" => {
				self.empty_element("false", self_closing, at)?;
				Ok(Value::Boolean(false))
			}
			"data" => {
				let text = self.text_element("data", self_closing)?;
				let packed: String = text.chars().filter(|c| !is_xml_ws(*c)).collect();
				let bytes = BASE64_STANDARD
					.decode(packed.as_bytes())
					.map_err(|_| PlistError::InvalidBase64 { at })?;
				Ok(Value::Data(bytes))
			}
			"date" => {
				let text = self.text_element("date", self_closing)?;
				let datetime = DateTime::parse_from_rfc3339(&text)
					.map_err(|_| PlistError::InvalidDateText { text })?;
				Ok(Value::Date(Date::from_datetime(datetime.with_timezone(&Utc))))
			}
			"key" => Err(PlistError::XmlUnexpectedContent {
				what: "key element outside a dictionary",
				at,
			}),
			_ => Err(PlistError::XmlUnknownElement {
				name: name.to_owned(),
				at,
			}),
		}
	}

	/// Accumulated character data up to the matching closing tag.
	fn text_element(&mut self, name: &str, self_closing: bool) -> Result<String> {
		if self_closing {
			return Ok(String::new());
		}
		let mut acc = String::new();
		loop {
			match self.tokens.next()? {
				None => {
					return Err(PlistError::XmlUnexpectedEof {
						at: self.tokens.pos,
						expected: "a closing tag",
					});
				}
				Some((_, Token::Text(text))) => acc.push_str(&text),
				Some((at, Token::Start { .. })) => {
					return Err(PlistError::XmlUnexpectedContent {
						what: "child element",
						at,
					});
				}
				Some((at, Token::Directive)) => {
					return Err(PlistError::XmlUnexpectedContent { what: "directive", at });
				}
				Some((at, Token::ProcInst)) => {
					return Err(PlistError::XmlUnexpectedContent {
						what: "processing instruction",
						at,
					});
				}
				Some((at, Token::End { name: got })) => {
					if got == name {
						return Ok(acc);
					}
					return Err(PlistError::XmlMismatchedTag {
						expected: name.to_owned(),
						got: got.to_owned(),
						at,
					});
				}
			}
		}
	}

	fn empty_element(&mut self, name: &str, self_closing: bool, at: usize) -> Result<()> {
		let text = self.text_element(name, self_closing)?;
		if is_blank(&text) {
			Ok(())
		} else {
			Err(PlistError::XmlUnexpectedContent {
				what: "text in an empty element",
				at,
			})
		}
	}

	fn dictionary(&mut self, self_closing: bool) -> Result<Value> {
		let mut keys: Vec<String> = Vec::new();
		let mut values: Vec<Value> = Vec::new();
		if !self_closing {
			loop {
				match self.tokens.next()? {
					None => {
						return Err(PlistError::XmlUnexpectedEof {
							at: self.tokens.pos,
							expected: "</dict>",
						});
					}
					Some((_, Token::ProcInst)) => continue,
					Some((at, Token::Directive)) => {
						return Err(PlistError::XmlUnexpectedContent { what: "directive", at });
					}
					Some((at, Token::Text(text))) => {
						if is_blank(&text) {
							continue;
						}
						return Err(PlistError::XmlUnexpectedContent { what: "text", at });
					}
					Some((_, Token::Start { name: "key", self_closing })) => {
						let key = self.text_element("key", self_closing)?;
						if keys.contains(&key) {
							return Err(PlistError::DuplicateKey { key });
						}
						let value = self.dict_value(&key)?;
						keys.push(key);
						values.push(value);
					}
					Some((at, Token::Start { .. })) => {
						return Err(PlistError::XmlMissingKey { at });
					}
					Some((at, Token::End { name })) => {
						if name == "dict" {
							break;
						}
						return Err(PlistError::XmlMismatchedTag {
							expected: "dict".to_owned(),
							got: name.to_owned(),
							at,
						});
					}
				}
			}
		}

		// Keyed archives spell UIDs as a single-entry CF$UID dict.
		if keys.len() == 1 && keys[0] == "CF$UID" {
			if let Value::Integer(num) = &values[0] {
				return Ok(Value::Uid(Uid(num.value)));
			}
		}
		Ok(Value::Dictionary(Dictionary::from_parts(keys, values)))
	}

	/// The value element paired with `key`.
	fn dict_value(&mut self, key: &str) -> Result<Value> {
		loop {
			match self.tokens.next()? {
				None => {
					return Err(PlistError::XmlUnexpectedEof {
						at: self.tokens.pos,
						expected: "a value element",
					});
				}
				Some((_, Token::ProcInst)) => continue,
				Some((at, Token::Directive)) => {
					return Err(PlistError::XmlUnexpectedContent { what: "directive", at });
				}
				Some((at, Token::Text(text))) => {
					if is_blank(&text) {
						continue;
					}
					return Err(PlistError::XmlUnexpectedContent { what: "text", at });
				}
				Some((_, Token::Start { name: "key", .. })) => {
					return Err(PlistError::XmlMissingValue { key: key.to_owned() });
				}
				Some((at, Token::Start { name, self_closing })) => {
					return self.parse_element(name, self_closing, at);
				}
				Some((at, Token::End { name })) => {
					if name == "dict" {
						return Err(PlistError::XmlMissingValue { key: key.to_owned() });
					}
					return Err(PlistError::XmlMismatchedTag {
						expected: "dict".to_owned(),
						got: name.to_owned(),
						at,
					});
				}
			}
		}
	}

	fn array(&mut self, self_closing: bool) -> Result<Value> {
		let mut items = Vec::new();
		if !self_closing {
			loop {
				match self.tokens.next()? {
					None => {
						return Err(PlistError::XmlUnexpectedEof {
							at: self.tokens.pos,
							expected: "</array>",
						});
					}
					Some((_, Token::ProcInst)) => continue,
					Some((at, Token::Directive)) => {
						return Err(PlistError::XmlUnexpectedContent { what: "directive", at });
					}
					Some((at, Token::Text(text))) => {
						if is_blank(&text) {
							continue;
						}
						return Err(PlistError::XmlUnexpectedContent { what: "text", at });
					}
					Some((at, Token::Start { name: "key", .. })) => {
						return Err(PlistError::XmlUnexpectedContent {
							what: "key element outside a dictionary",
							at,
						});
					}
					Some((at, Token::Start { name, self_closing })) => {
						items.push(self.parse_element(name, self_closing, at)?);
					}
					Some((at, Token::End { name })) => {
						if name == "array" {
							break;
						}
						return Err(PlistError::XmlMismatchedTag {
							expected: "array".to_owned(),
							got: name.to_owned(),
							at,
						});
					}
				}
			}
		}
		Ok(Value::Array(items))
	}
}

/// Integer text: optional leading minus, then decimal or `0x` hex digits.
fn parse_integer(text: &str) -> Result<Integer> {
	let (negative, magnitude) = match text.strip_prefix('-') {
		Some(rest) => (true, rest),
		None => (false, text),
	};
	let (digits, radix) = match magnitude.strip_prefix("0x") {
		Some(hex) => (hex, 16),
		None => (magnitude, 10),
	};

	if negative {
		let value = i64::from_str_radix(&format!("-{digits}"), radix).map_err(|_| PlistError::InvalidIntegerText {
			text: text.to_owned(),
		})?;
		Ok(Integer::signed(value))
	} else {
		let value = u64::from_str_radix(digits, radix).map_err(|_| PlistError::InvalidIntegerText {
			text: text.to_owned(),
		})?;
		Ok(Integer::unsigned(value))
	}
}

#[cfg(test)]
mod tests {
	use super::decode_xml;
	use crate::error::PlistError;
	use crate::value::{Uid, Value};

	#[test]
	fn reads_wrapped_and_bare_roots() {
		let wrapped = decode_xml(r#"<plist version="1.0"><string>Hello</string></plist>"#);
		assert_eq!(wrapped.expect("wrapped root decodes"), Value::from("Hello"));

		let bare = decode_xml("<string>Hello</string>");
		assert_eq!(bare.expect("bare root decodes"), Value::from("Hello"));
	}

	#[test]
	fn skips_prolog_doctype_and_comments() {
		let text = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<!DOCTYPE plist PUBLIC \"-//Apple//DTD PLIST 1.0//EN\" \"http://www.apple.com/DTDs/PropertyList-1.0.dtd\">\n<!-- comment --><plist><integer>26</integer></plist>";
		assert_eq!(decode_xml(text).expect("document decodes"), Value::from(26_u64));
	}

	#[test]
	fn decodes_entities_and_cdata() {
		let value = decode_xml("<string>a &lt;b&gt; &amp; &#34;c&#34; &#x41;<![CDATA[<raw&>]]></string>");
		assert_eq!(value.expect("entities decode"), Value::from("a <b> & \"c\" A<raw&>"));
	}

	#[test]
	fn integer_accepts_hex_and_sign() {
		assert_eq!(
			decode_xml("<integer>0xDEAD</integer>").expect("hex decodes"),
			Value::from(0xDEAD_u64)
		);
		assert_eq!(
			decode_xml("<integer>-0x20</integer>").expect("negative hex decodes"),
			Value::from(-32_i64)
		);
	}

	#[test]
	fn single_cf_uid_entry_becomes_a_uid() {
		let value = decode_xml("<dict><key>CF$UID</key><integer>7</integer></dict>");
		assert_eq!(value.expect("uid dict decodes"), Value::Uid(Uid(7)));
	}

	#[test]
	fn duplicate_keys_are_rejected() {
		let err = decode_xml("<dict><key>a</key><string/><key>a</key><string/></dict>")
			.expect_err("second a must fail");
		assert!(matches!(err, PlistError::DuplicateKey { ref key } if key == "a"));
	}

	#[test]
	fn whitespace_inside_data_is_ignored() {
		let value = decode_xml("<data>aGVs\n\tbG8=</data>").expect("split base64 decodes");
		assert_eq!(value, Value::Data(b"hello".to_vec()));
	}

	#[test]
	fn key_inside_array_is_rejected() {
		let err = decode_xml("<array><key>a</key></array>").expect_err("arrays hold values only");
		assert!(matches!(err, PlistError::XmlUnexpectedContent { .. }));
	}
}
