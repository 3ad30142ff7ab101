use bitflags::bitflags;

use crate::FileError;

bitflags! {
	/**
	Flags specifying what to do when opening a file.

	Unset groups fall back to defaults, so the empty set means the same as
	`WRITE | BINARY | OVERWRITE` (which is also what `Mode::default()` returns).
	*/
	#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
	pub struct Mode: u32 {
		/// Read-write. Takes precedence over `READ`.
		const WRITE     = 0x0000_0001;
		/// Read-only.
		const READ      = 0x0000_0002;

		/// No newline translation.
		const BINARY    = 0x0000_0004;
		/// Newline translation. Recorded, not performed.
		const TEXT      = 0x0000_0008;

		/// Drop existing content.
		const CLEAR     = 0x0000_0010;
		/// Keep existing content, start at its end.
		const APPEND    = 0x0000_0020;
		/// Keep existing content, start at its beginning.
		const OVERWRITE = 0x0000_0040;

		/// Make existing content read-only for this session.
		const PROTECT   = 0x0000_0080;
		/// Create a missing file instead of failing.
		const CREATE    = 0x0000_0100;

		/// Reopen with the previous session's mode, ignoring every other flag.
		const SAME      = 0x8000_0000;
	}
}

impl Default for Mode {
	fn default() -> Self {
		Mode::WRITE | Mode::BINARY | Mode::OVERWRITE
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Privilege {
	ReadWrite,
	ReadOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Translation {
	Binary,
	Text,
}

/// What happens to bytes already in the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Existing {
	Clear,
	Append,
	Overwrite,
}

/// Mode flags with defaults applied and combinations checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedMode {
	pub privilege: Privilege,
	pub translation: Translation,
	pub existing: Existing,
	pub protect: bool,
	pub create: bool,
}

impl ResolvedMode {
	pub fn writable(&self) -> bool {
		self.privilege == Privilege::ReadWrite
	}

	/// Whether content found in storage has to be loaded.
	pub fn loads_existing(&self) -> bool {
		self.existing != Existing::Clear || self.privilege == Privilege::ReadOnly
	}

	/// Cursor and protected end for a session starting with `len` bytes of content.
	pub fn initial_positions(&self, len: usize) -> (usize, usize) {
		let pos = match self.existing {
			Existing::Append => len,
			Existing::Clear | Existing::Overwrite => 0,
		};
		let protect_end = if self.protect && self.existing != Existing::Clear {
			len
		} else {
			0
		};
		(pos, protect_end)
	}
}

impl Mode {
	/**
	Applies defaults and rejects contradictory combinations.

	`previous` is the mode of the last session, consulted only for `SAME`.
	*/
	pub fn resolve(self, previous: Option<&ResolvedMode>) -> Result<ResolvedMode, FileError> {
		if self.contains(Mode::SAME) {
			return previous
				.copied()
				.ok_or(FileError::Config("SAME requires a previously opened file"));
		}

		// WRITE is a superset of READ
		let privilege = if self.contains(Mode::READ) && !self.contains(Mode::WRITE) {
			Privilege::ReadOnly
		} else {
			Privilege::ReadWrite
		};

		let translation = match (self.contains(Mode::BINARY), self.contains(Mode::TEXT)) {
			(true, true) => return Err(FileError::Config("BINARY and TEXT are exclusive")),
			(_, true) => Translation::Text,
			_ => Translation::Binary,
		};

		let positioning = self & (Mode::CLEAR | Mode::APPEND | Mode::OVERWRITE);
		let existing = if positioning.is_empty() || positioning == Mode::OVERWRITE {
			Existing::Overwrite
		} else if positioning == Mode::APPEND {
			Existing::Append
		} else if positioning == Mode::CLEAR {
			Existing::Clear
		} else {
			return Err(FileError::Config("CLEAR, APPEND and OVERWRITE are exclusive"));
		};

		if existing == Existing::Clear && privilege == Privilege::ReadOnly {
			return Err(FileError::Config("CLEAR needs write privilege"));
		}

		Ok(ResolvedMode {
			privilege,
			translation,
			existing,
			protect: self.contains(Mode::PROTECT),
			create: self.contains(Mode::CREATE),
		})
	}
}

impl From<ResolvedMode> for Mode {
	fn from(mode: ResolvedMode) -> Mode {
		let mut flags = match mode.privilege {
			Privilege::ReadWrite => Mode::WRITE,
			Privilege::ReadOnly => Mode::READ,
		};
		flags |= match mode.translation {
			Translation::Binary => Mode::BINARY,
			Translation::Text => Mode::TEXT,
		};
		flags |= match mode.existing {
			Existing::Clear => Mode::CLEAR,
			Existing::Append => Mode::APPEND,
			Existing::Overwrite => Mode::OVERWRITE,
		};
		if mode.protect {
			flags |= Mode::PROTECT;
		}
		if mode.create {
			flags |= Mode::CREATE;
		}
		flags
	}
}
