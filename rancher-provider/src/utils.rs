//! Helper functions shared by the drivers

use std::collections::HashMap;

use rancher_client::ClientError;
use rancher_core::provider::ProviderError;
use rancher_core::resource::Value;

/// Split an import id of the form `<parent>/<id>`
///
/// Returns `(None, id)` when there is no separator.
pub fn split_id(id: &str) -> (Option<&str>, &str) {
    match id.split_once('/') {
        Some((parent, child)) => (Some(parent), child),
        None => (None, id),
    }
}

/// Whether a status means the entity is gone
pub fn removed(state: &str) -> bool {
    state == "removed" || state == "purged"
}

/// Convert a client failure into a provider error
pub fn api_error(context: &str, err: ClientError) -> ProviderError {
    ProviderError::new(format!("{}: {}", context, err)).with_cause(err)
}

/// Attribute bag from `(name, value)` pairs
pub fn attributes<const N: usize>(pairs: [(&str, Value); N]) -> HashMap<String, Value> {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

/// Keep `key` from the declared attributes, if it was declared
pub fn carry(attrs: &mut HashMap<String, Value>, declared: &HashMap<String, Value>, key: &str) {
    if let Some(value) = declared.get(key) {
        attrs.insert(key.to_string(), value.clone());
    }
}
