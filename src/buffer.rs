use std::cmp;

use memchr::memchr;

use crate::FileError;

// same set as C's isspace()
#[inline]
fn is_space(c: u8) -> bool {
	matches!(c, b' ' | b'\t' | b'\n' | 0x0b | 0x0c | b'\r')
}

/*
|PPPPPxxxxxxx.....|
 |    |   | |    |buf.len() (capacity)
 |    |   | |len
 |    |   |pos
 |    |protect_end
 |0

Bytes past `len` are zeroed slack waiting to be written to.
*/
#[derive(Debug)]
pub(crate) struct Buffer {
	buf: Vec<u8>,
	incr: usize,
	max: usize,
	len: usize,
	pos: usize,
	protect_end: usize,
}

// only meaningful bytes are copied, slack is not
impl Clone for Buffer {
	fn clone(&self) -> Self {
		Buffer { buf: self.filled().to_vec(), ..*self }
	}
}

impl Buffer {
	/// Takes ownership of `contents` and makes room for at least `cap` bytes.
	pub(crate) fn new(mut contents: Vec<u8>, cap: usize, incr: usize, max: usize) -> Result<Self, FileError> {
		let len = contents.len();
		if len > max {
			return Err(FileError::TooLarge(len, max));
		}
		let cap = cmp::min(cmp::max(cap, len), max);
		contents.try_reserve_exact(cap - len)?;
		contents.resize(cap, 0);
		Ok(Buffer {
			buf: contents,
			incr, max,
			len,
			pos: 0, protect_end: 0,
		})
	}

	pub(crate) fn try_clone(&self) -> Result<Self, FileError> {
		let mut buf = Vec::new();
		buf.try_reserve_exact(self.len)?;
		buf.extend_from_slice(self.filled());
		Ok(Buffer { buf, ..*self })
	}

	pub(crate) fn len(&self) -> usize {
		self.len
	}
	pub(crate) fn capacity(&self) -> usize {
		self.buf.len()
	}
	pub(crate) fn pos(&self) -> usize {
		self.pos
	}
	pub(crate) fn protect_end(&self) -> usize {
		self.protect_end
	}
	pub(crate) fn filled(&self) -> &[u8] {
		&self.buf[ .. self.len ]
	}
	pub(crate) fn is_eof(&self) -> bool {
		self.pos == self.len
	}

	pub(crate) fn set_pos(&mut self, pos: usize) -> Result<(), FileError> {
		if pos > self.len {
			return Err(FileError::OutOfRange(pos, self.len));
		}
		self.pos = pos;
		Ok(())
	}

	/// Marks `[0, protect_end)` as write-protected.
	pub(crate) fn protect(&mut self, protect_end: usize) {
		self.protect_end = cmp::min(protect_end, self.len);
	}

	/// Grows capacity to exactly `size` bytes. Never shrinks.
	pub(crate) fn reserve(&mut self, size: usize) -> Result<(), FileError> {
		if size <= self.buf.len() {
			return Ok(());
		}
		if size > self.max {
			return Err(FileError::TooLarge(size, self.max));
		}
		self.buf.try_reserve_exact(size - self.buf.len())?;
		self.buf.resize(size, 0);
		Ok(())
	}

	// make room for at least `needed` bytes,
	// doubling the buffer like rust's vec/raw_vec do
	// (but never by less than `incr`) to keep appends amortized O(1)
	fn enlarge(&mut self, needed: usize) -> Result<(), FileError> {
		if needed <= self.buf.len() {
			return Ok(());
		}
		if needed > self.max {
			return Err(FileError::TooLarge(needed, self.max));
		}
		let cap = self.buf.len();
		let grown = cmp::max(cap.saturating_mul(2), cap.saturating_add(self.incr));
		self.reserve(cmp::min(cmp::max(grown, needed), self.max))
	}

	fn skip_whitespace(&mut self) {
		while self.pos < self.len && is_space(self.buf[self.pos]) {
			self.pos += 1;
		}
	}

	/// Returns the byte at the cursor and moves past it, or `None` at EOF.
	pub(crate) fn get(&mut self, skip_whitespace: bool) -> Option<u8> {
		if skip_whitespace {
			self.skip_whitespace();
		}
		if self.pos >= self.len {
			return None;
		}
		let c = self.buf[self.pos];
		self.pos += 1;
		Some(c)
	}

	/**
	Skips whitespace, then copies bytes into `out` until `terminator`, EOF,
	or `out.len() - 1` copied bytes, whichever comes first.
	A null byte always follows the copied bytes.

	Returns number of bytes written into `out`, null byte included.

	```text
	before:
	|  hello\nworld|
	 |pos

	after:
	|  hello\nworld|
	         |pos
	out: hello\0
	```
	*/
	pub(crate) fn get_string(&mut self, out: &mut [u8], terminator: u8) -> usize {
		if out.is_empty() {
			return 0;
		}
		self.skip_whitespace();

		let avail = cmp::min(out.len() - 1, self.len - self.pos);
		let start = self.pos;
		let (copied, consumed) = match memchr(terminator, &self.buf[ start .. start + avail ]) {
			// also silently consume terminator
			Some(n) => (n, n + 1),
			None => (avail, avail),
		};
		out[..copied].copy_from_slice(&self.buf[ start .. start + copied ]);
		out[copied] = 0;
		self.pos += consumed;
		copied + 1
	}

	fn check_writable(&self) -> Result<(), FileError> {
		if self.pos < self.protect_end {
			return Err(FileError::Protected(self.pos));
		}
		Ok(())
	}

	pub(crate) fn put(&mut self, c: u8) -> Result<(), FileError> {
		self.check_writable()?;
		if self.pos == self.buf.len() {
			self.enlarge(self.pos + 1)?;
		}
		self.buf[self.pos] = c;
		self.pos += 1;
		if self.pos > self.len {
			self.len = self.pos;
		}
		Ok(())
	}

	/// Same as a sequence of `put()`s, but either all bytes land or none do.
	pub(crate) fn put_slice(&mut self, bytes: &[u8]) -> Result<(), FileError> {
		if bytes.is_empty() {
			return Ok(());
		}
		// protected region is a prefix: if the first byte lands, so do the rest
		self.check_writable()?;
		let end = self.pos.checked_add(bytes.len())
			.ok_or(FileError::TooLarge(usize::MAX, self.max))?;
		self.enlarge(end)?;
		self.buf[ self.pos .. end ].copy_from_slice(bytes);
		self.pos = end;
		if self.pos > self.len {
			self.len = self.pos;
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn buffer(contents: &[u8]) -> Buffer {
		Buffer::new(contents.to_vec(), 0, 4, usize::MAX).unwrap()
	}

	#[test]
	fn new() {
		let b = Buffer::new(b"lorem".to_vec(), 16, 4, 64).unwrap();
		assert_eq!(b.len(), 5);
		assert_eq!(b.capacity(), 16);
		assert_eq!(b.filled(), b"lorem");
		assert_eq!(b.pos(), 0);
		assert_eq!(b.protect_end(), 0);

		// capacity never goes below content
		let b = Buffer::new(b"lorem".to_vec(), 2, 4, 64).unwrap();
		assert_eq!(b.capacity(), 5);

		// ...nor above the limit
		let b = Buffer::new(b"lorem".to_vec(), 100, 4, 8).unwrap();
		assert_eq!(b.capacity(), 8);

		assert!(matches!(Buffer::new(b"lorem".to_vec(), 0, 4, 4), Err(FileError::TooLarge(5, 4))));
	}

	#[test]
	fn put() {
		let mut b = buffer(b"");
		for &c in b"lorem ipsum" {
			b.put(c).unwrap();
		}
		assert_eq!(b.len(), 11);
		assert_eq!(b.pos(), 11);
		assert_eq!(b.filled(), b"lorem ipsum");
		assert!(b.capacity() >= 11);
	}

	#[test]
	fn put_overwrites_then_extends() {
		let mut b = buffer(b"lorem");
		b.set_pos(3).unwrap();
		for &c in b"ipsum" {
			b.put(c).unwrap();
		}
		assert_eq!(b.filled(), b"loripsum");
		assert_eq!(b.len(), 8);
		assert_eq!(b.pos(), 8);
	}

	#[test]
	fn growth_is_geometric() {
		let mut b = buffer(b"");
		let mut caps = vec![b.capacity()];
		for i in 0..100_000 {
			b.put(i as u8).unwrap();
			if *caps.last().unwrap() != b.capacity() {
				caps.push(b.capacity());
			}
		}
		assert_eq!(b.len(), 100_000);
		// 4, 8, 16, ... 131072
		assert!(caps.len() <= 20, "{} reallocations", caps.len());
		for w in caps.windows(2) {
			assert!(w[1] >= w[0] * 2);
		}
	}

	#[test]
	fn growth_respects_increment() {
		let mut b = Buffer::new(Vec::new(), 0, 1000, usize::MAX).unwrap();
		b.put(b'x').unwrap();
		assert_eq!(b.capacity(), 1000);
	}

	#[test]
	fn growth_capped() {
		let mut b = Buffer::new(Vec::new(), 0, 4, 6).unwrap();
		for &c in b"lorem " {
			b.put(c).unwrap();
		}
		assert_eq!(b.capacity(), 6);
		assert!(matches!(b.put(b'!'), Err(FileError::TooLarge(7, 6))));
		assert_eq!(b.filled(), b"lorem ");
		assert_eq!(b.pos(), 6);
	}

	#[test]
	fn protected() {
		let mut b = buffer(b"AB");
		b.protect(2);
		assert!(matches!(b.put(b'C'), Err(FileError::Protected(0))));
		b.set_pos(1).unwrap();
		assert!(matches!(b.put(b'C'), Err(FileError::Protected(1))));
		assert!(matches!(b.put_slice(b"CD"), Err(FileError::Protected(1))));
		assert_eq!(b.filled(), b"AB");
		assert_eq!(b.pos(), 1);

		b.set_pos(2).unwrap();
		b.put(b'C').unwrap();
		assert_eq!(b.filled(), b"ABC");
		// bytes written this session stay writable
		b.set_pos(2).unwrap();
		b.put(b'D').unwrap();
		assert_eq!(b.filled(), b"ABD");
	}

	#[test]
	fn protect_clamped_to_len() {
		let mut b = buffer(b"AB");
		b.protect(10);
		assert_eq!(b.protect_end(), 2);
	}

	#[test]
	fn reserve() {
		let mut b = buffer(b"lorem");
		b.reserve(100).unwrap();
		assert_eq!(b.capacity(), 100);
		assert_eq!(b.filled(), b"lorem");
		b.reserve(10).unwrap();
		assert_eq!(b.capacity(), 100);
		b.reserve(100).unwrap();
		assert_eq!(b.capacity(), 100);
	}

	#[test]
	fn reserve_past_max() {
		let mut b = Buffer::new(b"lorem".to_vec(), 0, 4, 8).unwrap();
		assert!(matches!(b.reserve(9), Err(FileError::TooLarge(9, 8))));
		assert_eq!(b.capacity(), 5);
		assert_eq!(b.filled(), b"lorem");
	}

	#[test]
	fn set_pos() {
		let mut b = buffer(b"lorem");
		b.set_pos(5).unwrap();
		assert!(b.is_eof());
		assert!(matches!(b.set_pos(6), Err(FileError::OutOfRange(6, 5))));
		assert_eq!(b.pos(), 5);
	}

	#[test]
	fn get() {
		let mut b = buffer(b"a \t\n b");
		assert_eq!(b.get(false), Some(b'a'));
		assert_eq!(b.get(false), Some(b' '));
		assert_eq!(b.get(true), Some(b'b'));
		assert!(b.is_eof());
		assert_eq!(b.get(false), None);
		assert_eq!(b.get(true), None);
		assert_eq!(b.pos(), 6);
	}

	#[test]
	fn get_skips_vertical_tab_and_form_feed() {
		let mut b = buffer(b"\x0b\x0c\rz");
		assert_eq!(b.get(true), Some(b'z'));
	}

	#[test]
	fn get_string() {
		let mut b = buffer(b"  hello\nworld");
		let mut out = [0xffu8; 10];
		assert_eq!(b.get_string(&mut out, b'\n'), 6);
		assert_eq!(&out[..6], b"hello\0");
		assert_eq!(out[6], 0xff);
		assert_eq!(b.pos(), 8);

		// EOF stops it too
		assert_eq!(b.get_string(&mut out, b'\n'), 6);
		assert_eq!(&out[..6], b"world\0");
		assert!(b.is_eof());

		assert_eq!(b.get_string(&mut out, b'\n'), 1);
		assert_eq!(out[0], 0);
	}

	#[test]
	fn get_string_truncated() {
		let mut b = buffer(b"lorem ipsum");
		let mut out = [0xffu8; 4];
		assert_eq!(b.get_string(&mut out, b' '), 4);
		assert_eq!(&out, b"lor\0");
		assert_eq!(b.pos(), 3);
		assert_eq!(b.get_string(&mut out, b' '), 3);
		assert_eq!(&out[..3], b"em\0");
		// terminator consumed
		assert_eq!(b.pos(), 6);
	}

	#[test]
	fn get_string_stops_before_unseen_terminator() {
		let mut b = buffer(b"abc,def");
		let mut out = [0u8; 4];
		assert_eq!(b.get_string(&mut out, b','), 4);
		assert_eq!(&out, b"abc\0");
		// terminator right past the window stays unread
		assert_eq!(b.pos(), 3);
		assert_eq!(b.get(false), Some(b','));
	}

	#[test]
	fn get_string_tiny_outputs() {
		let mut b = buffer(b"  lorem");
		assert_eq!(b.get_string(&mut [], b'\n'), 0);
		assert_eq!(b.pos(), 0);

		let mut out = [0xffu8; 1];
		assert_eq!(b.get_string(&mut out, b'\n'), 1);
		assert_eq!(out, [0]);
		assert_eq!(b.pos(), 2);
	}

	#[test]
	fn put_slice() {
		let mut b = buffer(b"lorem");
		b.set_pos(5).unwrap();
		b.put_slice(b" ipsum dolor").unwrap();
		assert_eq!(b.filled(), b"lorem ipsum dolor");
		assert_eq!(b.pos(), 17);
		b.put_slice(b"").unwrap();
		assert_eq!(b.pos(), 17);
	}

	#[test]
	fn put_slice_all_or_nothing() {
		let mut b = Buffer::new(b"lorem".to_vec(), 0, 4, 8).unwrap();
		b.set_pos(5).unwrap();
		assert!(matches!(b.put_slice(b"abcd"), Err(FileError::TooLarge(9, 8))));
		assert_eq!(b.filled(), b"lorem");
		assert_eq!(b.pos(), 5);
		assert_eq!(b.capacity(), 5);
	}

	#[test]
	fn try_clone() {
		let mut a = buffer(b"lorem");
		a.protect(2);
		a.set_pos(3).unwrap();
		let mut b = a.try_clone().unwrap();
		assert_eq!(b.filled(), b"lorem");
		assert_eq!(b.pos(), 3);
		assert_eq!(b.protect_end(), 2);

		b.put(b'X').unwrap();
		assert_eq!(a.filled(), b"lorem");
		assert_eq!(b.filled(), b"lorXm");
	}
}
