/*!
Whole-file in-memory buffer with cursor-based reads and writes.

A [`BufFile`] loads a file into memory on [`open()`](BufFile::open),
lets you walk through it with `get_*()`/`put_*()` calls,
optionally refuses writes to the content that was there before (see [`Mode::PROTECT`]),
and stores the buffer back on [`close()`](BufFile::close).

## Example usage

```no_run
use buf_file::{BufFile, Mode};

# fn foo() -> Result<(), buf_file::FileError> {
let mut file = BufFile::new("log.txt", Mode::WRITE | Mode::APPEND | Mode::PROTECT | Mode::CREATE)?;
let before = file.len();
file.put_string(b"another line\n", false)?;

// earlier content is protected
assert_eq!(file.protected_end(), before);
if before > 0 {
	file.set_pos(0)?;
	assert!(file.put_char(b'#', false).is_err());
}

file.close()?;
# Ok(())
# }
```
*/

use std::io;
use std::path::{Path, PathBuf};

use log::{debug, error, warn};

mod buffer;
mod error;
mod mode;
mod storage;

use buffer::Buffer;
pub use error::FileError;
pub use mode::{Existing, Mode, Privilege, ResolvedMode, Translation};
pub use storage::{FsStorage, MemStorage, Storage};

/// What [`BufFile::get_char()`] returns once there's nothing left to read.
pub const EOF: u8 = 0;

/// Default limit for the size of file content, in bytes.
pub const MAX_FILE_SIZE: usize = i32::MAX as usize;

#[derive(Debug, Clone)]
struct Session {
	path: PathBuf,
	buf: Buffer,
	mode: ResolvedMode,
}

/**
A file held entirely in memory.

Closed until opened. While closed, queries report an empty file at position 0,
and every other operation fails with [`FileError::NotOpen`].

Dropping an open file closes it; if storing its content fails at that point,
the error is logged and the content is lost.
*/
pub struct BufFile<S: Storage = FsStorage> {
	storage: S,
	session: Option<Session>,
	// survives close() so that Mode::SAME has something to refer to
	last_mode: Option<ResolvedMode>,
	bufsize: usize,
	incr: usize,
	max: usize,
}

pub struct BufFileBuilder<S> {
	storage: S,
	bufsize: usize,
	incr: usize,
	max: usize,
}
impl<S: Storage> BufFileBuilder<S> {
	pub fn new(storage: S) -> Self {
		BufFileBuilder {
			storage,
			bufsize: 8192,
			incr: 8192,
			max: MAX_FILE_SIZE,
		}
	}

	/// Smallest buffer allocated upon opening a file.
	pub fn capacity(mut self, bufsize: usize) -> Self {
		self.bufsize = bufsize;
		self
	}

	/// Smallest step the buffer grows by once it's full.
	pub fn increment(mut self, incr: usize) -> Self {
		if incr == 0 {
			panic!("non-positive buffer increments requested")
		}
		self.incr = incr;
		self
	}

	/// Largest content the file is allowed to hold.
	pub fn max_size(mut self, max: usize) -> Self {
		self.max = max;
		self
	}

	/// Creates a closed file.
	pub fn create(self) -> BufFile<S> {
		BufFile {
			storage: self.storage,
			session: None,
			last_mode: None,
			bufsize: self.bufsize,
			incr: self.incr,
			max: self.max,
		}
	}

	/// Creates a file and opens `path` with it. `Mode::SAME` is not accepted here.
	pub fn open<P: AsRef<Path>>(self, path: P, mode: Mode) -> Result<BufFile<S>, FileError> {
		if mode.contains(Mode::SAME) {
			return Err(FileError::Config("SAME cannot be used on a fresh file"));
		}
		let mut file = self.create();
		file.open(path, mode)?;
		Ok(file)
	}
}

impl BufFile<FsStorage> {
	/// Opens a file from the local file system.
	pub fn new<P: AsRef<Path>>(path: P, mode: Mode) -> Result<Self, FileError> {
		BufFileBuilder::new(FsStorage).open(path, mode)
	}
}

impl<S: Storage> BufFile<S> {
	/// Creates a closed file with default settings on top of `storage`.
	pub fn with_storage(storage: S) -> Self {
		BufFileBuilder::new(storage).create()
	}

	fn session(&self) -> Result<&Session, FileError> {
		self.session.as_ref().ok_or(FileError::NotOpen)
	}
	fn session_mut(&mut self) -> Result<&mut Session, FileError> {
		self.session.as_mut().ok_or(FileError::NotOpen)
	}

	/**
	Opens `path`, closing the currently open file first.

	On error, the file ends up closed. That includes failure to close
	the previous file, in which case its changes are lost.
	*/
	pub fn open<P: AsRef<Path>>(&mut self, path: P, mode: Mode) -> Result<(), FileError> {
		let path = path.as_ref();
		if self.session.is_some() {
			if let Err(err) = self.close() {
				self.discard();
				return Err(err);
			}
		}

		let mode = mode.resolve(self.last_mode.as_ref())?;
		let buf = self.load(path, &mode)?;
		debug!("opened {} ({} bytes, {:?})", path.display(), buf.len(), Mode::from(mode));

		self.last_mode = Some(mode);
		self.session = Some(Session {
			path: path.to_path_buf(),
			buf,
			mode,
		});
		Ok(())
	}

	fn load(&self, path: &Path, mode: &ResolvedMode) -> Result<Buffer, FileError> {
		let open_err = |err: io::Error| FileError::Open(path.to_path_buf(), err);

		let contents = if self.storage.exists(path) {
			if mode.loads_existing() {
				self.storage.fetch(path).map_err(open_err)?
			} else {
				Vec::new()
			}
		} else if mode.create {
			self.storage.store(path, &[]).map_err(open_err)?;
			Vec::new()
		} else {
			return Err(open_err(io::Error::from(io::ErrorKind::NotFound)));
		};

		let mut buf = Buffer::new(contents, self.bufsize, self.incr, self.max)?;
		let (pos, protect_end) = mode.initial_positions(buf.len());
		buf.protect(protect_end);
		buf.set_pos(pos)?;
		Ok(buf)
	}

	/**
	Stores the buffer back and closes the file.
	Files opened read-only are closed without storing anything.

	A file deleted since it was opened gets re-created.
	On error, nothing changes and the file stays open, so the call can be retried.
	*/
	pub fn close(&mut self) -> Result<(), FileError> {
		let session = self.session()?;
		if session.mode.writable() {
			self.storage.store(&session.path, session.buf.filled())
				.map_err(|err| FileError::Open(session.path.clone(), err))?;
		}
		debug!("closed {}", session.path.display());
		self.session = None;
		Ok(())
	}

	/// Closes the file without storing anything. Does nothing if already closed.
	pub fn discard(&mut self) {
		if let Some(session) = self.session.take() {
			if session.mode.writable() {
				warn!("discarding {} without storing it", session.path.display());
			}
		}
	}

	/// Stores current content under `path`. Doesn't change anything about the open file.
	pub fn write_file<P: AsRef<Path>>(&self, path: P) -> Result<(), FileError> {
		let path = path.as_ref();
		let session = self.session()?;
		self.storage.store(path, session.buf.filled())
			.map_err(|err| FileError::Open(path.to_path_buf(), err))?;
		debug!("wrote {} bytes of {} to {}", session.buf.len(), session.path.display(), path.display());
		Ok(())
	}

	/// Whether there's nothing left to read. You don't need to read past the end for this to be true.
	pub fn end_of_file(&self) -> bool {
		self.session.as_ref().map_or(true, |s| s.buf.is_eof())
	}

	/**
	Returns next byte, optionally skipping whitespace first.

	Returns [`EOF`] if there's nothing left to read.
	*/
	pub fn get_char(&mut self, skip_whitespace: bool) -> Result<u8, FileError> {
		Ok(self.session_mut()?.buf.get(skip_whitespace).unwrap_or(EOF))
	}

	pub fn pos(&self) -> usize {
		self.session.as_ref().map_or(0, |s| s.buf.pos())
	}

	/// Moves the cursor to `pos`, which must not exceed [`len()`](BufFile::len).
	pub fn set_pos(&mut self, pos: usize) -> Result<(), FileError> {
		self.session_mut()?.buf.set_pos(pos)
	}

	/**
	Reads next string into `out`, starting at next non-whitespace byte
	and up to `terminator` (which is consumed but not copied), EOF, or `out.len() - 1` bytes.
	Copied bytes are always followed by a null byte.

	Returns number of bytes written into `out`, null byte included.
	*/
	pub fn get_string(&mut self, out: &mut [u8], terminator: u8) -> Result<usize, FileError> {
		Ok(self.session_mut()?.buf.get_string(out, terminator))
	}

	/**
	Puts a byte at the cursor, growing the file if the cursor is at its end.

	Writing into protected content or into a read-only file fails,
	or, with `ignore_errors`, silently does nothing.
	On error, nothing changes.
	*/
	pub fn put_char(&mut self, c: u8, ignore_errors: bool) -> Result<(), FileError> {
		let session = self.session_mut()?;
		let res = if session.mode.writable() {
			session.buf.put(c)
		} else {
			Err(FileError::ReadOnly)
		};
		ignore_protection(res, ignore_errors)
	}

	/// Puts every byte of `s` as [`put_char()`](BufFile::put_char) would. On error, none of them are put.
	pub fn put_string(&mut self, s: &[u8], ignore_errors: bool) -> Result<(), FileError> {
		let session = self.session_mut()?;
		let res = if session.mode.writable() {
			session.buf.put_slice(s)
		} else {
			Err(FileError::ReadOnly)
		};
		ignore_protection(res, ignore_errors)
	}

	/**
	Grows the buffer to hold at least `size` bytes. Never shrinks it.

	Fails with [`FileError::TooLarge`] if `size` is past the configured
	[`max_size()`](BufFileBuilder::max_size), or with [`FileError::OutOfMemory`]
	if allocation fails. On error, nothing changes.
	*/
	pub fn resize(&mut self, size: usize) -> Result<(), FileError> {
		self.session_mut()?.buf.reserve(size)
	}

	pub fn is_open(&self) -> bool {
		self.session.is_some()
	}
	pub fn path(&self) -> Option<&Path> {
		self.session.as_ref().map(|s| s.path.as_path())
	}
	pub fn mode(&self) -> Option<ResolvedMode> {
		self.session.as_ref().map(|s| s.mode)
	}
	pub fn len(&self) -> usize {
		self.session.as_ref().map_or(0, |s| s.buf.len())
	}
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
	pub fn capacity(&self) -> usize {
		self.session.as_ref().map_or(0, |s| s.buf.capacity())
	}
	/// Bytes below this offset can't be written to.
	pub fn protected_end(&self) -> usize {
		self.session.as_ref().map_or(0, |s| s.buf.protect_end())
	}
	pub fn contents(&self) -> &[u8] {
		self.session.as_ref().map(|s| s.buf.filled()).unwrap_or(&[])
	}
	pub fn storage(&self) -> &S {
		&self.storage
	}
}

impl<S: Storage + Clone> BufFile<S> {
	/// Like `clone()`, but reports allocation failure instead of aborting.
	pub fn try_clone(&self) -> Result<Self, FileError> {
		let session = match &self.session {
			Some(s) => Some(Session {
				path: s.path.clone(),
				buf: s.buf.try_clone()?,
				mode: s.mode,
			}),
			None => None,
		};
		Ok(BufFile {
			storage: self.storage.clone(),
			session,
			last_mode: self.last_mode,
			bufsize: self.bufsize,
			incr: self.incr,
			max: self.max,
		})
	}

	/**
	Turns this file into a copy of `other`.

	Whatever this file had open is discarded, not stored.
	On error, the file ends up closed.
	*/
	pub fn assign_from(&mut self, other: &Self) -> Result<(), FileError> {
		self.discard();
		*self = other.try_clone()?;
		Ok(())
	}
}

/// Copies content and status as they are at the moment; later changes to either side are not shared.
impl<S: Storage + Clone> Clone for BufFile<S> {
	fn clone(&self) -> Self {
		BufFile {
			storage: self.storage.clone(),
			session: self.session.clone(),
			last_mode: self.last_mode,
			bufsize: self.bufsize,
			incr: self.incr,
			max: self.max,
		}
	}
}

impl<S: Storage> Drop for BufFile<S> {
	fn drop(&mut self) {
		if self.session.is_some() {
			if let Err(err) = self.close() {
				error!("dropping unsaved changes: {}", err);
			}
		}
	}
}

fn ignore_protection(res: Result<(), FileError>, ignore_errors: bool) -> Result<(), FileError> {
	match res {
		Err(ref err) if ignore_errors && err.is_protection() => Ok(()),
		res => res,
	}
}
