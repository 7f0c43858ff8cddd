//! Dynamic flags for long-running services.
//!
//! This crate provides:
//! - Typed flag values that can be swapped atomically at runtime
//! - Input mutation, validation and change notification hooks
//! - A JSON flag kind wrapping arbitrary serde structs
//! - Companion `<name>_path` flags that load a flag's value from a file
//! - A flag registry with lookup, enumeration and change tracking
//!
//! Readers call [`DynValue::get`], a single atomic load, and never block.
//! Writers go through [`DynValue::set`] (or the registry's
//! [`FlagSet::set`]), which parses, mutates and validates the candidate
//! value before anything becomes visible. A rejected write leaves the
//! current value untouched and fires no notifier.

pub mod cell;
pub mod duration;
pub mod fileflag;
pub mod json;
pub mod loglevel;
pub mod registry;
pub mod validation;
pub mod value;

pub use cell::DynValue;
pub use fileflag::{file_flag, FileReadValue};
pub use json::{DynJson, Json};
pub use registry::{Flag, FlagSet, StaticValue, Value};
pub use value::{FlagValue, ValueKind};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid {kind} value {input:?}: {reason}")]
    Parse {
        kind: &'static str,
        input: String,
        reason: String,
    },

    #[error("{0}")]
    Validation(String),

    #[error("operation not supported for {0} flags")]
    Unsupported(&'static str),

    #[error("flag {0:?} not found")]
    FlagNotFound(String),

    #[error("flag {0:?} is not dynamic")]
    FlagNotDynamic(String),

    #[error("flag {0:?} is already registered")]
    AlreadyRegistered(String),

    #[error("cell is not bound to a flag")]
    Unbound,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
