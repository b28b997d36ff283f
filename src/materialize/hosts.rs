//! Extra hosts normalization.

use crate::config::ExtraHostsInput;
use crate::error::{Error, Result};
use std::collections::BTreeMap;

/// Normalize an `extra_hosts` declaration to a host-to-ip mapping.
///
/// Accepts a mapping (passed through) or an ordered sequence of `"host:ip"`
/// / `"host: ip"` strings (whitespace around the ip trimmed). A bare string
/// and a sequence of single-key mappings are both rejected: the former is
/// ambiguous, the latter has ambiguous ordering/merging. Neither is
/// silently coerced.
pub fn build_extra_hosts(input: &ExtraHostsInput) -> Result<BTreeMap<String, String>> {
    match input {
        ExtraHostsInput::Map(map) => Ok(map.clone()),
        ExtraHostsInput::List(entries) => {
            let mut hosts = BTreeMap::new();
            for entry in entries {
                let (host, ip) = entry.split_once(':').ok_or_else(|| {
                    Error::config_field(
                        "extra_hosts",
                        format!("expected 'host:ip' but got '{}'", entry),
                    )
                })?;
                hosts.insert(host.trim().to_string(), ip.trim().to_string());
            }
            Ok(hosts)
        }
        ExtraHostsInput::Single(entry) => Err(Error::config_field(
            "extra_hosts",
            format!("must be a list or a mapping, not a string ('{}')", entry),
        )),
        ExtraHostsInput::ListOfMaps(_) => Err(Error::config_field(
            "extra_hosts",
            "must be a list of strings or a single mapping, not a list of mappings",
        )),
    }
}
