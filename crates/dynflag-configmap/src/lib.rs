//! Watched-directory flag updates (the Kubernetes ConfigMap pattern).
//!
//! Each regular file in the watched directory names a flag; the file's
//! contents are the flag's value. The directory's parent is watched too, so
//! the whole directory can be replaced atomically through a symlink rename,
//! as Kubernetes does when a ConfigMap volume is updated. Dot-prefixed
//! entries are skipped and `..`-prefixed paths are treated as volume
//! internals.

mod updater;

pub use updater::{setup, Updater};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigMapError {
    #[error("flag error: {0}")]
    Flag(#[from] dynflag::Error),

    #[error("watch error: {0}")]
    Watch(#[from] notify::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Lifecycle(&'static str),

    #[error("encountered {count} errors while reading flags from directory:\n{details}")]
    Sync { count: usize, details: String },
}

pub type Result<T> = std::result::Result<T, ConfigMapError>;
