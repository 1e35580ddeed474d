use crate::error::{PlistError, Result};

/// Magic prefix of every binary property list document.
pub(crate) const MAGIC: &[u8; 6] = b"bplist";

/// Total header length: magic plus two ASCII version digits.
pub(crate) const HEADER_LEN: usize = 8;

/// Header written by the encoder.
pub(crate) const HEADER_V0: &[u8; 8] = b"bplist00";

/// Parse the 8-byte document header and return the format version.
///
/// Versions above 1 change record layouts this crate does not understand
/// and are rejected.
pub(crate) fn parse_header(bytes: &[u8]) -> Result<u8> {
	let Some(header) = bytes.first_chunk::<HEADER_LEN>() else {
		return Err(PlistError::TruncatedDocument { len: bytes.len() });
	};

	let magic: [u8; 6] = [header[0], header[1], header[2], header[3], header[4], header[5]];
	if &magic != MAGIC {
		return Err(PlistError::BadMagic { magic });
	}

	let version: [u8; 2] = [header[6], header[7]];
	if !version[0].is_ascii_digit() || !version[1].is_ascii_digit() {
		return Err(PlistError::BadVersionDigits { version });
	}

	let parsed = (version[0] - b'0') * 10 + (version[1] - b'0');
	if parsed > 1 {
		return Err(PlistError::UnsupportedVersion { version: parsed });
	}
	Ok(parsed)
}
