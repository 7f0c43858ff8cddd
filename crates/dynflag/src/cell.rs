//! The dynamic value cell: an atomically swappable, validated, observable
//! holder for one flag's value.
//!
//! Reads are a single atomic load and never block. Writes run the pipeline
//! input mutator → parse → value mutator → validator → swap → notify; the
//! first failing step aborts with the visible value untouched.

use std::fmt;
use std::sync::{Arc, OnceLock, Weak};

use arc_swap::ArcSwap;

use crate::registry;
use crate::value::{FlagValue, ValueKind};
use crate::{Error, Result};

type InputMutator = Box<dyn Fn(&str) -> String + Send + Sync>;
type ValueMutator<T> = Box<dyn Fn(T) -> T + Send + Sync>;
type Validator<T> = Box<dyn Fn(&T) -> std::result::Result<(), String> + Send + Sync>;
type Notifier<T> = Arc<dyn Fn(Arc<T>, Arc<T>) + Send + Sync>;

pub(crate) struct Binding {
    pub(crate) name: String,
    pub(crate) owner: Weak<registry::Inner>,
}

/// A typed flag value that may change at runtime.
///
/// Create one with [`DynValue::new`], attach hooks with the `with_*`
/// builders, then hand it to [`crate::FlagSet::register`] to bind it to a
/// flag name. Binding happens exactly once; hooks are attached before
/// binding.
pub struct DynValue<T: FlagValue> {
    current: ArcSwap<T>,
    usage: String,
    input_mutator: InputMutator,
    value_mutator: Option<ValueMutator<T>>,
    validator: Option<Validator<T>>,
    notifier: Option<Notifier<T>>,
    sync_notifier: bool,
    binding: OnceLock<Binding>,
}

impl<T: FlagValue> fmt::Debug for DynValue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynValue").field("usage", &self.usage).finish()
    }
}

impl<T: FlagValue> DynValue<T> {
    pub fn new(initial: T, usage: impl Into<String>) -> Self {
        Self {
            current: ArcSwap::from_pointee(initial),
            usage: usage.into(),
            // Trimming by default keeps file- and form-sourced numbers
            // parseable without every caller stripping newlines.
            input_mutator: Box::new(|raw| raw.trim().to_string()),
            value_mutator: None,
            validator: None,
            notifier: None,
            sync_notifier: false,
            binding: OnceLock::new(),
        }
    }

    /// The current value. A single atomic load; never blocks, safe under
    /// any number of concurrent writers.
    pub fn get(&self) -> Arc<T> {
        self.current.load_full()
    }

    /// Updates the value from its string representation, running the full
    /// pipeline. On any failure the visible value is unchanged, the error
    /// is returned and no notifier fires.
    pub fn set(&self, raw: &str) -> Result<()> {
        let input = (self.input_mutator)(raw);
        let value = T::parse(&input)?;
        self.set_typed(value)
    }

    /// Same as [`DynValue::set`] for an already-typed value: value mutator,
    /// validator, swap and notification still run.
    pub fn set_typed(&self, value: T) -> Result<()> {
        let value = match &self.value_mutator {
            Some(mutate) => mutate(value),
            None => value,
        };
        if let Some(validate) = &self.validator {
            validate(&value).map_err(Error::Validation)?;
        }
        let new = Arc::new(value);
        let old = self.current.swap(Arc::clone(&new));
        if let Some(notifier) = &self.notifier {
            if self.sync_notifier {
                notifier(old, new);
            } else {
                let notifier = Arc::clone(notifier);
                std::thread::spawn(move || notifier(old, new));
            }
        }
        Ok(())
    }

    /// Attaches a check that runs before a new value becomes visible. The
    /// returned message surfaces as [`Error::Validation`].
    pub fn with_validator<F>(mut self, validator: F) -> Self
    where
        F: Fn(&T) -> std::result::Result<(), String> + Send + Sync + 'static,
    {
        self.validator = Some(Box::new(validator));
        self
    }

    /// Attaches a transformation applied after parsing, before validation.
    pub fn with_value_mutator<F>(mut self, mutator: F) -> Self
    where
        F: Fn(T) -> T + Send + Sync + 'static,
    {
        self.value_mutator = Some(Box::new(mutator));
        self
    }

    /// Replaces the default input processing (whitespace trim).
    pub fn with_input_mutator<F>(mut self, mutator: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.input_mutator = Box::new(mutator);
        self
    }

    /// Attaches an `(old, new)` observer invoked on a fresh thread after
    /// each successful swap. Invocations carry the before/after pair of an
    /// actual swap but are unordered relative to each other.
    pub fn with_notifier<F>(mut self, notifier: F) -> Self
    where
        F: Fn(Arc<T>, Arc<T>) + Send + Sync + 'static,
    {
        self.notifier = Some(Arc::new(notifier));
        self.sync_notifier = false;
        self
    }

    /// Like [`DynValue::with_notifier`], but invoked on the writer's thread
    /// after the swap and before `set` returns.
    pub fn with_sync_notifier<F>(mut self, notifier: F) -> Self
    where
        F: Fn(Arc<T>, Arc<T>) + Send + Sync + 'static,
    {
        self.notifier = Some(Arc::new(notifier));
        self.sync_notifier = true;
        self
    }

    pub fn usage(&self) -> &str {
        &self.usage
    }

    pub fn kind(&self) -> ValueKind {
        T::KIND
    }

    /// The flag name this cell is bound to, if any.
    pub fn name(&self) -> Option<&str> {
        self.binding.get().map(|b| b.name.as_str())
    }

    pub(crate) fn bind(&self, name: &str, owner: Weak<registry::Inner>) -> Result<()> {
        self.binding
            .set(Binding {
                name: name.to_string(),
                owner,
            })
            .map_err(|_| Error::AlreadyRegistered(name.to_string()))
    }

    pub(crate) fn binding(&self) -> Option<&Binding> {
        self.binding.get()
    }
}

impl<T: FlagValue + Default> Default for DynValue<T> {
    /// An unbound cell holding zero-of-`T`, so reads before explicit
    /// initialization return zero instead of faulting.
    fn default() -> Self {
        Self::new(T::default(), "")
    }
}

impl<T: FlagValue> fmt::Display for DynValue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.get().format())
    }
}

impl<T: FlagValue> registry::Value for DynValue<T> {
    fn set(&self, input: &str) -> Result<()> {
        DynValue::set(self, input)
    }

    fn set_raw(&self, bytes: &[u8]) -> Result<()> {
        match T::from_raw_bytes(bytes) {
            Some(value) => self.set_typed(value),
            None => Err(Error::Unsupported(T::KIND.label())),
        }
    }

    fn current(&self) -> String {
        self.to_string()
    }

    fn kind(&self) -> ValueKind {
        T::KIND
    }

    fn is_dynamic(&self) -> bool {
        true
    }
}
