//! The host flag registry: named flags over opaque value objects.
//!
//! A [`FlagSet`] owns the mapping from flag names to [`Flag`] records and is
//! the uniform write path for every mutation source: directory reconciler,
//! admin endpoint and direct API calls all go through [`FlagSet::set`],
//! which marks the flag as changed. The set of registered flags is frozen
//! once announced; names bind exactly once.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::debug;

use crate::cell::DynValue;
use crate::value::{FlagValue, ValueKind};
use crate::{Error, Result};

/// Object-safe view of a flag's value, the contract every registered value
/// object satisfies.
pub trait Value: Send + Sync + 'static {
    /// Updates the value from its string representation.
    fn set(&self, input: &str) -> Result<()>;

    /// Updates the value from raw bytes. Only byte-kind flags accept this;
    /// everything else reports [`Error::Unsupported`].
    fn set_raw(&self, _bytes: &[u8]) -> Result<()> {
        Err(Error::Unsupported(self.kind().label()))
    }

    /// The canonical string form of the current value.
    fn current(&self) -> String;

    fn kind(&self) -> ValueKind;

    /// Whether the value may change after program start. Boolean kind plus
    /// this marker is what a CLI layer needs to recognize no-arg flags.
    fn is_dynamic(&self) -> bool {
        false
    }
}

/// One registered flag.
pub struct Flag {
    name: String,
    usage: String,
    default: String,
    changed: AtomicBool,
    value: Arc<dyn Value>,
}

impl Flag {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn usage(&self) -> &str {
        &self.usage
    }

    /// The canonical form of the value the flag was registered with.
    pub fn default_value(&self) -> &str {
        &self.default
    }

    pub fn current(&self) -> String {
        self.value.current()
    }

    pub fn kind(&self) -> ValueKind {
        self.value.kind()
    }

    pub fn is_dynamic(&self) -> bool {
        self.value.is_dynamic()
    }

    /// Whether a `-name` occurrence alone means true for a CLI parser.
    pub fn is_bool(&self) -> bool {
        self.kind() == ValueKind::Bool
    }

    /// Whether the flag was ever set through the registry.
    pub fn changed(&self) -> bool {
        self.changed.load(Ordering::Relaxed)
    }

    pub fn value(&self) -> &Arc<dyn Value> {
        &self.value
    }

    fn mark_changed(&self) {
        self.changed.store(true, Ordering::Relaxed);
    }
}

pub(crate) struct Inner {
    name: String,
    flags: DashMap<String, Arc<Flag>>,
}

/// A named registry of flags. Cheap to clone; clones share the same flags.
#[derive(Clone)]
pub struct FlagSet {
    inner: Arc<Inner>,
}

impl FlagSet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(Inner {
                name: name.into(),
                flags: DashMap::new(),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub(crate) fn downgrade(&self) -> Weak<Inner> {
        Arc::downgrade(&self.inner)
    }

    pub(crate) fn from_inner(inner: Arc<Inner>) -> Self {
        Self { inner }
    }

    /// Registers an arbitrary value object under `name`. The flag's default
    /// string is the value's canonical form at registration time.
    pub fn var(&self, name: &str, usage: &str, value: Arc<dyn Value>) -> Result<Arc<Flag>> {
        use dashmap::mapref::entry::Entry;
        let flag = Arc::new(Flag {
            name: name.to_string(),
            usage: usage.to_string(),
            default: value.current(),
            changed: AtomicBool::new(false),
            value,
        });
        match self.inner.flags.entry(name.to_string()) {
            Entry::Occupied(_) => Err(Error::AlreadyRegistered(name.to_string())),
            Entry::Vacant(entry) => {
                entry.insert(Arc::clone(&flag));
                debug!(set = self.inner.name.as_str(), flag = name, "flag registered");
                Ok(flag)
            }
        }
    }

    /// Binds a dynamic cell to `name` and registers it.
    pub fn register<T: FlagValue>(&self, name: &str, cell: DynValue<T>) -> Result<Arc<DynValue<T>>> {
        let cell = Arc::new(cell);
        cell.bind(name, self.downgrade())?;
        let usage = cell.usage().to_string();
        self.var(name, &usage, Arc::clone(&cell) as Arc<dyn Value>)?;
        Ok(cell)
    }

    /// Shorthand for registering a plain dynamic flag without hooks.
    pub fn dynamic<T: FlagValue>(&self, name: &str, initial: T, usage: &str) -> Result<Arc<DynValue<T>>> {
        self.register(name, DynValue::new(initial, usage))
    }

    /// Registers a flag whose value is fixed after startup-time parsing.
    pub fn static_value<T: FlagValue>(
        &self,
        name: &str,
        initial: T,
        usage: &str,
    ) -> Result<Arc<StaticValue<T>>> {
        let value = Arc::new(StaticValue::new(initial));
        self.var(name, usage, Arc::clone(&value) as Arc<dyn Value>)?;
        Ok(value)
    }

    pub fn lookup(&self, name: &str) -> Option<Arc<Flag>> {
        self.inner.flags.get(name).map(|entry| Arc::clone(entry.value()))
    }

    /// Sets a flag by name and marks it as changed. This is the uniform
    /// write path shared by the reconciler and the admin endpoint.
    pub fn set(&self, name: &str, value: &str) -> Result<()> {
        let flag = self
            .lookup(name)
            .ok_or_else(|| Error::FlagNotFound(name.to_string()))?;
        flag.value.set(value)?;
        flag.mark_changed();
        debug!(set = self.inner.name.as_str(), flag = name, value, "flag updated");
        Ok(())
    }

    /// All flags, sorted by name.
    pub fn flags(&self) -> Vec<Arc<Flag>> {
        let mut all: Vec<_> = self
            .inner
            .flags
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }

    pub fn len(&self) -> usize {
        self.inner.flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.flags.is_empty()
    }
}

/// A non-dynamic value holder for ordinary flags that share a registry with
/// dynamic ones.
pub struct StaticValue<T: FlagValue> {
    value: RwLock<T>,
}

impl<T: FlagValue> StaticValue<T> {
    pub fn new(initial: T) -> Self {
        Self {
            value: RwLock::new(initial),
        }
    }

    pub fn get(&self) -> T {
        self.value.read().clone()
    }
}

impl<T: FlagValue> Value for StaticValue<T> {
    fn set(&self, input: &str) -> Result<()> {
        let value = T::parse(input)?;
        *self.value.write() = value;
        Ok(())
    }

    fn current(&self) -> String {
        self.value.read().format()
    }

    fn kind(&self) -> ValueKind {
        T::KIND
    }
}
