//! Companion `<name>_path` flags that load a flag's value from a file.
//!
//! Useful for values too large or too sensitive for a command line, such as
//! JSON policy blobs. The companion is an ordinary string flag; setting it
//! to a path reads the file and pushes the contents through the parent
//! cell's typed pipeline, so validators and notifiers fire exactly as for
//! any other write. Setting it to the empty string is a no-op.

use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwap;
use tracing::info;

use crate::cell::DynValue;
use crate::registry::{FlagSet, Value};
use crate::value::{FlagValue, ValueKind};
use crate::{Error, Result};

/// The value object behind a `<name>_path` companion flag.
pub struct FileReadValue<T: FlagValue> {
    parent: Arc<DynValue<T>>,
    path: ArcSwap<String>,
}

impl<T: FlagValue> fmt::Debug for FileReadValue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileReadValue").field("path", &self.path()).finish()
    }
}

impl<T: FlagValue> FileReadValue<T> {
    fn new(parent: Arc<DynValue<T>>, default_path: &str) -> Self {
        Self {
            parent,
            path: ArcSwap::from_pointee(default_path.to_string()),
        }
    }

    /// The most recently set path, or the default.
    pub fn path(&self) -> String {
        self.path.load().as_ref().clone()
    }

    fn load_from(&self, path: &str) -> Result<()> {
        let contents = std::fs::read(path)?;
        match T::from_raw_bytes(&contents) {
            Some(value) => self.parent.set_typed(value),
            None => {
                let text = std::str::from_utf8(&contents).map_err(|e| Error::Parse {
                    kind: T::KIND.label(),
                    input: path.to_string(),
                    reason: e.to_string(),
                })?;
                self.parent.set(text)
            }
        }
    }
}

impl<T: FlagValue> Value for FileReadValue<T> {
    fn set(&self, input: &str) -> Result<()> {
        let path = input.trim().to_string();
        let empty = path.is_empty();
        self.path.store(Arc::new(path.clone()));
        if empty {
            return Ok(());
        }
        self.load_from(&path)
    }

    fn current(&self) -> String {
        self.path()
    }

    fn kind(&self) -> ValueKind {
        ValueKind::String
    }

    fn is_dynamic(&self) -> bool {
        true
    }
}

/// Registers a `<name>_path` companion for a cell already bound to a flag.
/// A non-empty `default_path` is read immediately.
pub fn file_flag<T: FlagValue>(
    cell: &Arc<DynValue<T>>,
    default_path: &str,
) -> Result<Arc<FileReadValue<T>>> {
    let binding = cell.binding().ok_or(Error::Unbound)?;
    let owner = binding.owner.upgrade().ok_or(Error::Unbound)?;
    let flags = FlagSet::from_inner(owner);
    let name = format!("{}_path", binding.name);
    let usage = format!(
        "Path to a file to read the value of {} from (empty to disable)",
        binding.name
    );
    let value = Arc::new(FileReadValue::new(Arc::clone(cell), default_path));
    flags.var(&name, &usage, Arc::clone(&value) as Arc<dyn Value>)?;
    if !default_path.is_empty() {
        info!(flag = binding.name.as_str(), path = default_path, "reading flag value from file");
        value.load_from(default_path)?;
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn companion_loads_text_through_the_cell_pipeline() {
        let flags = FlagSet::new("fileflag_test");
        let cell = flags
            .register(
                "greeting",
                DynValue::new(String::from("hello"), "a greeting").with_validator(
                    |v: &String| {
                        if v.is_empty() {
                            Err(String::from("must not be empty"))
                        } else {
                            Ok(())
                        }
                    },
                ),
            )
            .unwrap();
        file_flag(&cell, "").unwrap();

        let companion = flags.lookup("greeting_path").unwrap();
        assert!(companion.is_dynamic());
        assert_eq!(companion.current(), "");

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "bonjour\n").unwrap();
        flags
            .set("greeting_path", file.path().to_str().unwrap())
            .unwrap();
        assert_eq!(cell.get().as_str(), "bonjour");
    }

    #[test]
    fn byte_cells_receive_raw_file_contents() {
        let flags = FlagSet::new("fileflag_test");
        let cell = flags.dynamic("blob", Vec::<u8>::new(), "a binary blob").unwrap();
        file_flag(&cell, "").unwrap();

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&[0u8, 1, 2, 3]).unwrap();
        flags.set("blob_path", file.path().to_str().unwrap()).unwrap();
        assert_eq!(*cell.get(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn empty_path_is_a_no_op() {
        let flags = FlagSet::new("fileflag_test");
        let cell = flags.dynamic("greeting", String::from("hello"), "").unwrap();
        file_flag(&cell, "").unwrap();
        flags.set("greeting_path", "").unwrap();
        assert_eq!(cell.get().as_str(), "hello");
    }

    #[test]
    fn default_path_is_read_at_registration() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "42").unwrap();

        let flags = FlagSet::new("fileflag_test");
        let cell = flags.dynamic("answer", 0i64, "").unwrap();
        file_flag(&cell, file.path().to_str().unwrap()).unwrap();
        assert_eq!(*cell.get(), 42);
    }

    #[test]
    fn unbound_cell_is_rejected() {
        let cell = Arc::new(DynValue::new(0i64, "unbound"));
        let err = file_flag(&cell, "").unwrap_err();
        assert!(matches!(err, Error::Unbound), "{err}");
    }
}
