//! A dynamic `loglevel` flag wired to a tracing level filter.
//!
//! Input is trimmed and lowercased, validated against the known level
//! names, and applied synchronously on the writer's thread, so a set that
//! returns success has already taken effect.

use std::str::FromStr;
use std::sync::Arc;

use tracing::level_filters::LevelFilter;

use crate::cell::DynValue;
use crate::registry::FlagSet;
use crate::Result;

pub const FLAG_NAME: &str = "loglevel";

/// Registers the `loglevel` flag. `apply` receives each validated level,
/// typically forwarding to a `tracing_subscriber` reload handle.
pub fn register<F>(flags: &FlagSet, initial: LevelFilter, apply: F) -> Result<Arc<DynValue<String>>>
where
    F: Fn(LevelFilter) + Send + Sync + 'static,
{
    let cell = DynValue::new(
        initial.to_string().to_lowercase(),
        "log level, one of off, error, warn, info, debug or trace",
    )
    .with_input_mutator(|raw| raw.trim().to_lowercase())
    .with_validator(|level: &String| {
        LevelFilter::from_str(level)
            .map(|_| ())
            .map_err(|_| format!("unknown log level {level:?}"))
    })
    .with_sync_notifier(move |_old, new| {
        // The validator ran just before the swap, so this parse succeeds.
        if let Ok(level) = LevelFilter::from_str(&new) {
            apply(level);
        }
    });
    flags.register(FLAG_NAME, cell)
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn applies_validated_levels_synchronously() {
        let applied = Arc::new(Mutex::new(Vec::new()));
        let applied_in_notifier = Arc::clone(&applied);
        let flags = FlagSet::new("loglevel_test");
        let cell = register(&flags, LevelFilter::INFO, move |level| {
            applied_in_notifier.lock().push(level);
        })
        .unwrap();

        assert_eq!(cell.get().as_str(), "info");
        flags.set(FLAG_NAME, " WaRn\n").unwrap();
        assert_eq!(cell.get().as_str(), "warn");
        assert_eq!(*applied.lock(), vec![LevelFilter::WARN]);
    }

    #[test]
    fn rejects_unknown_levels() {
        let flags = FlagSet::new("loglevel_test");
        let cell = register(&flags, LevelFilter::INFO, |_| {}).unwrap();
        assert!(flags.set(FLAG_NAME, "loud").is_err());
        assert_eq!(cell.get().as_str(), "info");
    }
}
