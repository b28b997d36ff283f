//! Environment resolution.
//!
//! Merge order, strongest first: per-call override options, the service
//! environment map, env-file-declared values. A key still unset after the
//! merge inherits its value from the host environment; a key absent there
//! too resolves to the empty string. An explicit empty string survives as
//! empty, distinct from unset.

use std::collections::BTreeMap;

/// Merge declared environment layers, preserving unset markers.
pub fn merge_environment(
    env_file: BTreeMap<String, Option<String>>,
    service: BTreeMap<String, Option<String>>,
    overrides: BTreeMap<String, Option<String>>,
) -> BTreeMap<String, Option<String>> {
    let mut merged = env_file;
    merged.extend(service);
    merged.extend(overrides);
    merged
}

/// Resolve a merged declaration to concrete values using `host_lookup` for
/// unset keys.
pub fn resolve_environment_with(
    merged: BTreeMap<String, Option<String>>,
    host_lookup: impl Fn(&str) -> Option<String>,
) -> BTreeMap<String, String> {
    merged
        .into_iter()
        .map(|(key, value)| {
            let resolved = match value {
                Some(v) => v,
                None => host_lookup(&key).unwrap_or_default(),
            };
            (key, resolved)
        })
        .collect()
}

/// Resolve against the real host environment.
pub fn resolve_environment(merged: BTreeMap<String, Option<String>>) -> BTreeMap<String, String> {
    resolve_environment_with(merged, |key| std::env::var(key).ok())
}
