//! Environment file loading.
//!
//! Parses `KEY=VALUE` files declared by a service's `env_file` list. Values
//! from these files sit between the service environment map and host
//! passthrough in the resolution order.

use crate::config::split_env;
use crate::error::{Error, Result};
use std::collections::BTreeMap;
use std::path::Path;

/// Load one env file into declaration order-independent form.
///
/// Blank lines and `#` comments are skipped. A bare `KEY` line declares the
/// variable as unset (inherit from host); `KEY=` declares an explicit empty
/// string.
pub fn env_vars_from_file(path: &Path) -> Result<BTreeMap<String, Option<String>>> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        Error::config_field(
            "env_file",
            format!("couldn't read '{}': {}", path.display(), e),
        )
    })?;
    Ok(parse_env_lines(&contents))
}

/// Load several env files in order; later files override earlier ones.
pub fn env_vars_from_files(paths: &[impl AsRef<Path>]) -> Result<BTreeMap<String, Option<String>>> {
    let mut merged = BTreeMap::new();
    for path in paths {
        merged.extend(env_vars_from_file(path.as_ref())?);
    }
    Ok(merged)
}

fn parse_env_lines(contents: &str) -> BTreeMap<String, Option<String>> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(split_env)
        .collect()
}
