//! The closed set of flag value types and their canonical string forms.
//!
//! Every supported type implements [`FlagValue`]: a fallible parse from the
//! wire string and a canonical rendering back. The trait is sealed; the set
//! of supported types is fixed at compile time (JSON flags go through the
//! [`crate::json::Json`] adapter, which is part of the set).

use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use crate::duration;
use crate::{Error, Result};

/// Kind discriminant for the supported value types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Bool,
    Int64,
    Float64,
    Duration,
    String,
    StringList,
    StringSet,
    Bytes,
    Json,
}

impl ValueKind {
    pub fn label(self) -> &'static str {
        match self {
            ValueKind::Bool => "bool",
            ValueKind::Int64 => "int64",
            ValueKind::Float64 => "float64",
            ValueKind::Duration => "duration",
            ValueKind::String => "string",
            ValueKind::StringList => "string_list",
            ValueKind::StringSet => "string_set",
            ValueKind::Bytes => "bytes",
            ValueKind::Json => "json",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

pub(crate) mod sealed {
    pub trait Sealed {}
}

/// A value that can live in a dynamic flag.
///
/// `parse` and `format` round-trip: `parse(format(v)) == v` for every legal
/// value, and `format` is the canonical form shown by the registry and the
/// admin endpoint.
pub trait FlagValue: Clone + Send + Sync + sealed::Sealed + 'static {
    const KIND: ValueKind;

    fn parse(input: &str) -> Result<Self>;

    fn format(&self) -> String;

    /// Reconstruct directly from raw bytes. Only the byte kind does; every
    /// other kind goes through the textual `parse` path.
    fn from_raw_bytes(_bytes: &[u8]) -> Option<Self> {
        None
    }
}

pub(crate) fn parse_err(kind: &'static str, input: &str, reason: impl ToString) -> Error {
    Error::Parse {
        kind,
        input: input.to_string(),
        reason: reason.to_string(),
    }
}

/// Splits a comma-separated string. No escape processing; an empty input
/// yields a single empty element.
pub fn split_commas(input: &str) -> Vec<String> {
    input.split(',').map(str::to_string).collect()
}

impl sealed::Sealed for bool {}

impl FlagValue for bool {
    const KIND: ValueKind = ValueKind::Bool;

    fn parse(input: &str) -> Result<Self> {
        match input {
            "1" | "t" | "T" | "true" | "TRUE" | "True" => Ok(true),
            "0" | "f" | "F" | "false" | "FALSE" | "False" => Ok(false),
            _ => Err(parse_err("bool", input, "expected a truth literal such as true or 0")),
        }
    }

    fn format(&self) -> String {
        self.to_string()
    }
}

impl sealed::Sealed for i64 {}

impl FlagValue for i64 {
    const KIND: ValueKind = ValueKind::Int64;

    fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        let (sign, magnitude) = match trimmed.strip_prefix('-') {
            Some(rest) => ("-", rest),
            None => ("", trimmed.strip_prefix('+').unwrap_or(trimmed)),
        };
        let (radix, digits) = if let Some(hex) = strip_prefix_ci(magnitude, "0x") {
            (16, hex)
        } else if let Some(oct) = strip_prefix_ci(magnitude, "0o") {
            (8, oct)
        } else if let Some(bin) = strip_prefix_ci(magnitude, "0b") {
            (2, bin)
        } else {
            (10, magnitude)
        };
        if digits.is_empty() {
            return Err(parse_err("int64", input, "missing digits"));
        }
        i64::from_str_radix(&format!("{sign}{digits}"), radix)
            .map_err(|e| parse_err("int64", input, e))
    }

    fn format(&self) -> String {
        self.to_string()
    }
}

fn strip_prefix_ci<'a>(input: &'a str, prefix: &str) -> Option<&'a str> {
    input
        .strip_prefix(prefix)
        .or_else(|| input.strip_prefix(prefix.to_ascii_uppercase().as_str()))
}

impl sealed::Sealed for f64 {}

impl FlagValue for f64 {
    const KIND: ValueKind = ValueKind::Float64;

    fn parse(input: &str) -> Result<Self> {
        input
            .trim()
            .parse::<f64>()
            .map_err(|e| parse_err("float64", input, e))
    }

    fn format(&self) -> String {
        self.to_string()
    }
}

impl sealed::Sealed for Duration {}

impl FlagValue for Duration {
    const KIND: ValueKind = ValueKind::Duration;

    fn parse(input: &str) -> Result<Self> {
        duration::parse(input).map_err(|reason| parse_err("duration", input, reason))
    }

    fn format(&self) -> String {
        duration::format(*self)
    }
}

impl sealed::Sealed for String {}

impl FlagValue for String {
    const KIND: ValueKind = ValueKind::String;

    fn parse(input: &str) -> Result<Self> {
        Ok(input.to_string())
    }

    fn format(&self) -> String {
        self.clone()
    }
}

impl sealed::Sealed for Vec<String> {}

impl FlagValue for Vec<String> {
    const KIND: ValueKind = ValueKind::StringList;

    fn parse(input: &str) -> Result<Self> {
        Ok(split_commas(input))
    }

    fn format(&self) -> String {
        self.join(",")
    }
}

impl sealed::Sealed for BTreeSet<String> {}

impl FlagValue for BTreeSet<String> {
    const KIND: ValueKind = ValueKind::StringSet;

    fn parse(input: &str) -> Result<Self> {
        Ok(split_commas(input).into_iter().collect())
    }

    fn format(&self) -> String {
        self.iter().cloned().collect::<Vec<_>>().join(",")
    }
}

impl sealed::Sealed for Vec<u8> {}

impl FlagValue for Vec<u8> {
    const KIND: ValueKind = ValueKind::Bytes;

    fn parse(input: &str) -> Result<Self> {
        // Tolerate newline-framed files and other embedded whitespace.
        let compact: String = input.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        BASE64
            .decode(compact.as_bytes())
            .map_err(|e| parse_err("bytes", input, e))
    }

    fn format(&self) -> String {
        BASE64.encode(self)
    }

    fn from_raw_bytes(bytes: &[u8]) -> Option<Self> {
        Some(bytes.to_vec())
    }
}
