use std::io::Write;

use crate::error::{PlistError, Result};

/// Bounded cursor over an immutable byte slice, big-endian reads only.
///
/// Binary property lists are read back-to-front, so the cursor supports
/// absolute repositioning in addition to sequential reads.
pub(crate) struct Cursor<'a> {
	bytes: &'a [u8],
	pos: usize,
}

impl<'a> Cursor<'a> {
	/// Create a cursor at position 0.
	pub(crate) fn new(bytes: &'a [u8]) -> Self {
		Self { bytes, pos: 0 }
	}

	/// Return current byte offset.
	pub(crate) fn pos(&self) -> usize {
		self.pos
	}

	/// Reposition to an absolute byte offset.
	///
	/// Seeking to the end of the slice is allowed; any read from there
	/// reports eof.
	pub(crate) fn seek(&mut self, pos: usize) -> Result<()> {
		if pos > self.bytes.len() {
			return Err(PlistError::UnexpectedEof {
				at: pos,
				need: 0,
				rem: 0,
			});
		}
		self.pos = pos;
		Ok(())
	}

	/// Return remaining unread bytes.
	pub(crate) fn remaining(&self) -> usize {
		self.bytes.len().saturating_sub(self.pos)
	}

	/// Read exactly `n` bytes and advance the cursor.
	pub(crate) fn read_exact(&mut self, n: usize) -> Result<&'a [u8]> {
		if n > self.remaining() {
			return Err(PlistError::UnexpectedEof {
				at: self.pos,
				need: n,
				rem: self.remaining(),
			});
		}

		let start = self.pos;
		self.pos += n;
		Ok(&self.bytes[start..self.pos])
	}

	/// Read a single byte.
	pub(crate) fn read_u8(&mut self) -> Result<u8> {
		Ok(self.read_exact(1)?[0])
	}

	/// Read a big-endian `u16`.
	pub(crate) fn read_u16_be(&mut self) -> Result<u16> {
		let raw = self.read_exact(2)?;
		let mut buf = [0_u8; 2];
		buf.copy_from_slice(raw);
		Ok(u16::from_be_bytes(buf))
	}

	/// Read a big-endian `u32`.
	pub(crate) fn read_u32_be(&mut self) -> Result<u32> {
		let raw = self.read_exact(4)?;
		let mut buf = [0_u8; 4];
		buf.copy_from_slice(raw);
		Ok(u32::from_be_bytes(buf))
	}

	/// Read a big-endian `u64`.
	pub(crate) fn read_u64_be(&mut self) -> Result<u64> {
		let raw = self.read_exact(8)?;
		let mut buf = [0_u8; 8];
		buf.copy_from_slice(raw);
		Ok(u64::from_be_bytes(buf))
	}

	/// Read a big-endian IEEE-754 `f32`.
	pub(crate) fn read_f32_be(&mut self) -> Result<f32> {
		Ok(f32::from_bits(self.read_u32_be()?))
	}

	/// Read a big-endian IEEE-754 `f64`.
	pub(crate) fn read_f64_be(&mut self) -> Result<f64> {
		Ok(f64::from_bits(self.read_u64_be()?))
	}
}

/// Write adapter that tracks the running byte count.
///
/// The binary encoder records the offset at which every object begins and
/// later writes those offsets into the offset table.
pub(crate) struct CountingWriter<W> {
	inner: W,
	written: u64,
}

impl<W: Write> CountingWriter<W> {
	/// Wrap a sink with a zeroed byte counter.
	pub(crate) fn new(inner: W) -> Self {
		Self { inner, written: 0 }
	}

	/// Total bytes written so far.
	pub(crate) fn written(&self) -> u64 {
		self.written
	}

	/// Write all of `buf` to the sink and advance the counter.
	pub(crate) fn put(&mut self, buf: &[u8]) -> Result<()> {
		self.inner.write_all(buf)?;
		self.written += buf.len() as u64;
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::{CountingWriter, Cursor};
	use crate::error::PlistError;

	#[test]
	fn reads_big_endian_integers() {
		let mut cur = Cursor::new(&[0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08]);
		assert_eq!(cur.read_u16_be().expect("u16 reads"), 0x0102);
		assert_eq!(cur.read_u32_be().expect("u32 reads"), 0x0304_0506);
		assert_eq!(cur.pos(), 6);
		assert_eq!(cur.remaining(), 2);
	}

	#[test]
	fn seek_then_read_reports_position_in_eof() {
		let mut cur = Cursor::new(&[0xAA, 0xBB]);
		cur.seek(1).expect("seek in range");
		let err = cur.read_u32_be().expect_err("read past end should fail");
		assert!(matches!(err, PlistError::UnexpectedEof { at: 1, need: 4, rem: 1 }));
	}

	#[test]
	fn seek_past_end_is_rejected() {
		let mut cur = Cursor::new(&[0x00]);
		assert!(cur.seek(1).is_ok());
		assert!(cur.seek(2).is_err());
	}

	#[test]
	fn counting_writer_tracks_offsets() {
		let mut out = Vec::new();
		let mut w = CountingWriter::new(&mut out);
		w.put(b"bplist00").expect("write succeeds");
		assert_eq!(w.written(), 8);
		w.put(&[0x55]).expect("write succeeds");
		assert_eq!(w.written(), 9);
		assert_eq!(out.len(), 9);
	}
}
