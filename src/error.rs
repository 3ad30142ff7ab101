use std::collections::TryReserveError;
use std::io;
use std::path::PathBuf;

use quick_error::quick_error;

quick_error! {
	/// Everything that can go wrong with a [`BufFile`](crate::BufFile).
	///
	/// Which state the file is left in after an error depends on the operation;
	/// see the docs of each method.
	#[derive(Debug)]
	pub enum FileError {
		/// Storage refused to hand out (or take in) the file's bytes.
		Open(path: PathBuf, err: io::Error) {
			display("could not open {}: {}", path.display(), err)
			cause(err)
		}
		/// Content would not fit under the largest representable offset.
		TooLarge(size: usize, max: usize) {
			display("{} bytes requested, at most {} can be held", size, max)
		}
		OutOfMemory(err: TryReserveError) {
			from()
			display("could not allocate buffer: {}", err)
			cause(err)
		}
		/// Write targets a byte below the protected end.
		Protected(offset: usize) {
			display("byte {} is write-protected", offset)
		}
		/// Write attempted on a file opened without write privilege.
		ReadOnly {
			display("file is opened read-only")
		}
		Config(reason: &'static str) {
			display("invalid mode: {}", reason)
		}
		NotOpen {
			display("no file is open")
		}
		OutOfRange(pos: usize, len: usize) {
			display("position {} is past the end of content ({} bytes)", pos, len)
		}
	}
}

impl FileError {
	/// Whether this is one of the errors `ignore_errors` puts are allowed to swallow.
	pub fn is_protection(&self) -> bool {
		matches!(self, FileError::Protected(_) | FileError::ReadOnly)
	}
}
