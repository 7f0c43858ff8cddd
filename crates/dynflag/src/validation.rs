//! Reusable validators for dynamic flags.

use std::collections::BTreeSet;
use std::fmt::Debug;

/// Accepts values in the inclusive `[from, to]` range.
pub fn in_range<T>(from: T, to: T) -> impl Fn(&T) -> Result<(), String>
where
    T: PartialOrd + Debug + Send + Sync,
{
    move |value| {
        if *value < from || *value > to {
            Err(format!("value {value:?} not in [{from:?}, {to:?}] range"))
        } else {
            Ok(())
        }
    }
}

/// Accepts lists with at least `count` elements.
pub fn min_list_elements<T>(count: usize) -> impl Fn(&Vec<T>) -> Result<(), String> {
    move |value| {
        if value.len() < count {
            Err(format!(
                "list must have at least {count} elements, got {}",
                value.len()
            ))
        } else {
            Ok(())
        }
    }
}

/// Accepts sets with at least `count` elements.
pub fn min_set_elements(count: usize) -> impl Fn(&BTreeSet<String>) -> Result<(), String> {
    move |value| {
        if value.len() < count {
            Err(format!(
                "set must have at least {count} elements, got {}",
                value.len()
            ))
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DynValue;
    use std::time::Duration;

    #[test]
    fn in_range_bounds_are_inclusive() {
        let validate = in_range(Duration::from_secs(1), Duration::from_secs(10));
        assert!(validate(&Duration::from_secs(1)).is_ok());
        assert!(validate(&Duration::from_secs(10)).is_ok());
        assert!(validate(&Duration::from_secs(11)).is_err());
        assert!(validate(&Duration::from_millis(500)).is_err());
    }

    #[test]
    fn min_elements_checks_length() {
        let validate = min_list_elements::<String>(2);
        assert!(validate(&vec![String::from("a")]).is_err());
        assert!(validate(&vec![String::from("a"), String::from("b")]).is_ok());

        let validate = min_set_elements(1);
        assert!(validate(&BTreeSet::new()).is_err());
    }

    #[test]
    fn composes_with_a_cell() {
        let cell = DynValue::new(5i64, "bounded").with_validator(in_range(0, 100));
        cell.set("100").unwrap();
        assert!(cell.set("101").is_err());
        assert_eq!(*cell.get(), 100);
    }
}
