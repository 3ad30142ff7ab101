use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;

/**
Where whole files come from and go to.

Calls are atomic from the buffer's point of view:
they either hand over all the bytes or fail.

## Example usage

```no_run
use buf_file::{Storage, FsStorage};
use std::path::Path;

# fn foo() -> std::io::Result<()> {
let storage = FsStorage;
let path = Path::new("notes.txt");
if storage.exists(path) {
	let mut bytes = storage.fetch(path)?;
	bytes.push(b'\n');
	storage.store(path, &bytes)?;
}
# Ok(())
# }
```
*/
pub trait Storage {
	/**
	Whether `path` names a file that can be fetched.

	Anything else (a directory, a path whose metadata can't be read) counts as missing,
	so with [`Mode::CREATE`](crate::Mode::CREATE) the buffer will try to `store()` an empty file there,
	and the resulting error is about writing rather than about the path itself.
	*/
	fn exists(&self, path: &Path) -> bool;
	/// Reads the whole file. A missing file is reported as `io::ErrorKind::NotFound`.
	fn fetch(&self, path: &Path) -> io::Result<Vec<u8>>;
	/// Replaces the whole file with `bytes`, creating it if necessary.
	fn store(&self, path: &Path, bytes: &[u8]) -> io::Result<()>;
}

/// Storage backed by the local file system.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsStorage;

impl Storage for FsStorage {
	fn exists(&self, path: &Path) -> bool {
		path.is_file()
	}
	fn fetch(&self, path: &Path) -> io::Result<Vec<u8>> {
		fs::read(path)
	}
	fn store(&self, path: &Path, bytes: &[u8]) -> io::Result<()> {
		fs::write(path, bytes)
	}
}

#[derive(Debug, Default)]
struct MemFiles {
	files: HashMap<PathBuf, Vec<u8>>,
	read_only: bool,
}

/**
Storage kept in memory.

Clones share the same set of files, so whatever a [`BufFile`](crate::BufFile) stores
through its copy of the storage can be inspected through another one.
*/
#[derive(Debug, Clone, Default)]
pub struct MemStorage {
	inner: Rc<RefCell<MemFiles>>,
}

impl MemStorage {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn insert<P: Into<PathBuf>>(&self, path: P, bytes: &[u8]) {
		self.inner.borrow_mut().files.insert(path.into(), bytes.to_vec());
	}

	pub fn remove<P: AsRef<Path>>(&self, path: P) -> Option<Vec<u8>> {
		self.inner.borrow_mut().files.remove(path.as_ref())
	}

	pub fn get<P: AsRef<Path>>(&self, path: P) -> Option<Vec<u8>> {
		self.inner.borrow().files.get(path.as_ref()).cloned()
	}

	/// While set, every `store()` fails with `PermissionDenied`.
	pub fn set_read_only(&self, read_only: bool) {
		self.inner.borrow_mut().read_only = read_only;
	}
}

impl Storage for MemStorage {
	fn exists(&self, path: &Path) -> bool {
		self.inner.borrow().files.contains_key(path)
	}
	fn fetch(&self, path: &Path) -> io::Result<Vec<u8>> {
		self.get(path)
			.ok_or_else(|| io::Error::from(io::ErrorKind::NotFound))
	}
	fn store(&self, path: &Path, bytes: &[u8]) -> io::Result<()> {
		let mut inner = self.inner.borrow_mut();
		if inner.read_only {
			return Err(io::Error::from(io::ErrorKind::PermissionDenied));
		}
		inner.files.insert(path.to_path_buf(), bytes.to_vec());
		Ok(())
	}
}
