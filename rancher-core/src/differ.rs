//! Differ - Detect which declared attributes moved away from the stored state
//!
//! The host owns planning. Drivers only need to know whether a particular
//! group of attributes changed, e.g. to decide if a Stack upgrade is due.

use crate::resource::{Resource, State, Value};

/// Whether any of `keys` differs between the stored state and the declaration
///
/// Absent and zero values compare equal, so an unset optional attribute does
/// not count as a change against an empty stored one.
pub fn has_change(from: &State, to: &Resource, keys: &[&str]) -> bool {
    keys.iter()
        .any(|key| !values_equal(to.attributes.get(*key), from.attributes.get(*key)))
}

fn values_equal(a: Option<&Value>, b: Option<&Value>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a == b || (a.is_empty() && b.is_empty()),
        (Some(v), None) | (None, Some(v)) => v.is_empty(),
        (None, None) => true,
    }
}
