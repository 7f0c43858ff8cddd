//! JSON flags over arbitrary user structs.
//!
//! [`Json<T>`] adapts any serde-capable struct into the flag value set.
//! Parsing materializes a fresh instance from the input; the canonical form
//! is the struct's serde_json serialization, which keeps field order stable.

use std::ops::Deref;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::cell::DynValue;
use crate::registry::FlagSet;
use crate::value::{parse_err, sealed, FlagValue, ValueKind};
use crate::Result;

/// Marker wrapper that makes a serde struct usable as a flag value.
#[derive(Debug, Clone, PartialEq)]
pub struct Json<T>(pub T);

impl<T> Json<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> Deref for Json<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T> sealed::Sealed for Json<T> where T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}

impl<T> FlagValue for Json<T>
where
    T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    const KIND: ValueKind = ValueKind::Json;

    fn parse(input: &str) -> Result<Self> {
        serde_json::from_str(input)
            .map(Json)
            .map_err(|e| parse_err("json", input, e))
    }

    fn format(&self) -> String {
        match serde_json::to_string(&self.0) {
            Ok(rendered) => rendered,
            Err(_) => String::from("null"),
        }
    }
}

/// A dynamic flag holding a user struct, updated through its JSON form.
pub type DynJson<T> = DynValue<Json<T>>;

impl<T> DynValue<Json<T>>
where
    T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    pub fn new_json(initial: T, usage: impl Into<String>) -> Self {
        DynValue::new(Json(initial), usage)
    }
}

impl FlagSet {
    /// Registers a dynamic JSON flag for an arbitrary serde struct.
    pub fn dynamic_json<T>(&self, name: &str, initial: T, usage: &str) -> Result<Arc<DynJson<T>>>
    where
        T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
    {
        self.register(name, DynValue::new_json(initial, usage))
    }
}
