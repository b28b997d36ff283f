//! Volume spec parsing and bind merging.
//!
//! Container paths are normalized (trailing slash stripped) before any
//! comparison, so an image-declared volume at `/data` and a spec-declared
//! bind at `/data/` resolve to the same mount point instead of producing
//! duplicate binds.

use crate::error::{Error, Result};
use serde::Serialize;
use std::collections::BTreeMap;

/// One volume bind: an optional host source (path or named volume; `None`
/// means anonymous volume) mapped to a normalized container path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VolumeBinding {
    pub host: Option<String>,
    pub container: String,
    pub read_only: bool,
}

impl VolumeBinding {
    /// Render in the `[host:]container[:ro]` form the runtime client expects.
    pub fn as_spec(&self) -> String {
        let mut spec = match &self.host {
            Some(host) => format!("{}:{}", host, self.container),
            None => self.container.clone(),
        };
        if self.read_only {
            spec.push_str(":ro");
        }
        spec
    }
}

/// Strip a trailing slash from a container path (root stays `/`).
pub fn normalize_container_path(path: &str) -> String {
    if path.len() > 1 {
        path.trim_end_matches('/').to_string()
    } else {
        path.to_string()
    }
}

/// Expand `~` and environment references in a volume host source.
///
/// `${VAR}` and `$VAR` resolve against the host environment, a leading `~`
/// against the home directory. Unresolvable references stay literal.
/// Container paths are never expanded.
pub fn expand_host_source(host: &str) -> String {
    expand_host_source_with(host, std::env::var("HOME").ok().as_deref(), |key| {
        std::env::var(key).ok()
    })
}

fn expand_host_source_with(
    host: &str,
    home: Option<&str>,
    lookup: impl Fn(&str) -> Option<String>,
) -> String {
    let expanded = expand_vars(host, &lookup);
    match (expanded.strip_prefix('~'), home) {
        (Some(rest), Some(home)) if rest.is_empty() || rest.starts_with('/') => {
            format!("{}{}", home, rest)
        }
        _ => expanded,
    }
}

fn expand_vars(input: &str, lookup: &impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];
        if let Some(braced) = after.strip_prefix('{') {
            if let Some(end) = braced.find('}') {
                let name = &braced[..end];
                match lookup(name) {
                    Some(value) => out.push_str(&value),
                    None => {
                        out.push_str("${");
                        out.push_str(name);
                        out.push('}');
                    }
                }
                rest = &braced[end + 1..];
                continue;
            }
            out.push('$');
            rest = after;
            continue;
        }
        let len = after
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(after.len());
        if len == 0 {
            out.push('$');
            rest = after;
            continue;
        }
        let name = &after[..len];
        match lookup(name) {
            Some(value) => out.push_str(&value),
            None => {
                out.push('$');
                out.push_str(name);
            }
        }
        rest = &after[len..];
    }
    out.push_str(rest);
    out
}

/// Parse one volume spec: `[host:]container[:ro|rw]`.
///
/// The host component may reference `~` and host environment variables;
/// both are expanded here.
pub fn parse_volume_spec(spec: &str) -> Result<VolumeBinding> {
    let parts: Vec<&str> = spec.split(':').collect();
    let (host, container, mode) = match parts.as_slice() {
        [container] => (None, *container, None),
        [host, container] => (Some(expand_host_source(host)), *container, None),
        [host, container, mode] => (Some(expand_host_source(host)), *container, Some(*mode)),
        _ => {
            return Err(Error::config_field(
                "volumes",
                format!("too many colons in '{}'", spec),
            ))
        }
    };
    if container.is_empty() {
        return Err(Error::config_field(
            "volumes",
            format!("empty container path in '{}'", spec),
        ));
    }
    let read_only = match mode {
        None | Some("rw") => false,
        Some("ro") => true,
        Some(other) => {
            return Err(Error::config_field(
                "volumes",
                format!("unknown access mode '{}' in '{}'", other, spec),
            ))
        }
    };
    Ok(VolumeBinding {
        host,
        container: normalize_container_path(container),
        read_only,
    })
}

/// Merge an old container's live volume bindings into the spec-declared
/// binds for its replacement.
///
/// Spec binds with an explicit host source win. Any other volume the old
/// container had — anonymous spec volumes and volumes declared by the image
/// itself — carries its existing source forward, so a recreate preserves
/// data. Paths are compared normalized; no duplicate binds are produced.
pub fn merge_inherited_volumes(
    spec_binds: &[VolumeBinding],
    old_volumes: &BTreeMap<String, String>,
) -> Vec<VolumeBinding> {
    let mut merged: Vec<VolumeBinding> = Vec::new();
    let mut bound: BTreeMap<String, usize> = BTreeMap::new();

    for bind in spec_binds {
        bound.insert(bind.container.clone(), merged.len());
        merged.push(bind.clone());
    }

    for (path, source) in old_volumes {
        let path = normalize_container_path(path);
        match bound.get(&path) {
            Some(&idx) => {
                // Anonymous in the spec: adopt the old source to keep data.
                if merged[idx].host.is_none() {
                    merged[idx].host = Some(source.clone());
                }
            }
            None => {
                merged.push(VolumeBinding {
                    host: Some(source.clone()),
                    container: path,
                    read_only: false,
                });
            }
        }
    }

    merged
}
