//! Container identity: bookkeeping labels, canonical names, and instance
//! numbering.
//!
//! Service membership is recovered purely from engine-visible state: every
//! created container carries structured labels encoding project, service,
//! instance number, one-off flag and configuration fingerprint. Queries
//! re-derive identity by listing and decoding those labels; nothing is
//! cached, so the core stays stateless and crash-recoverable.

pub const LABEL_PROJECT: &str = "com.service-converge.project";
pub const LABEL_SERVICE: &str = "com.service-converge.service";
pub const LABEL_NUMBER: &str = "com.service-converge.container-number";
pub const LABEL_ONE_OFF: &str = "com.service-converge.oneoff";
pub const LABEL_VERSION: &str = "com.service-converge.version";
pub const LABEL_CONFIG_HASH: &str = "com.service-converge.config-hash";

/// Name suffix separating one-off instances from the regular numbering
/// stream: `{project}_{service}_run_{n}` never collides with
/// `{project}_{service}_{n}`.
pub const ONE_OFF_SUFFIX: &str = "run_";

/// Derive the canonical container name for an instance.
///
/// A custom name is used verbatim for regular instances (and implies the
/// instance count is capped at 1); one-off instances always use the derived
/// form so they never steal the custom name slot.
pub fn canonical_name(
    project: &str,
    service: &str,
    number: u32,
    one_off: bool,
    custom_name: Option<&str>,
) -> String {
    if let Some(name) = custom_name {
        if !one_off {
            return name.to_string();
        }
    }
    if one_off {
        format!("{}_{}_{}{}", project, service, ONE_OFF_SUFFIX, number)
    } else {
        format!("{}_{}_{}", project, service, number)
    }
}

/// Smallest positive integer not currently assigned to any existing
/// container in the namespace; gaps from removed containers are reused.
pub fn next_number(used: impl IntoIterator<Item = u32>) -> u32 {
    let mut used: Vec<u32> = used.into_iter().collect();
    used.sort_unstable();
    used.dedup();
    let mut candidate = 1;
    for n in used {
        if n == candidate {
            candidate += 1;
        } else if n > candidate {
            break;
        }
    }
    candidate
}

/// The `count` smallest unused numbers, ascending.
pub fn next_numbers(used: impl IntoIterator<Item = u32>, count: usize) -> Vec<u32> {
    let mut used: Vec<u32> = used.into_iter().collect();
    used.sort_unstable();
    used.dedup();
    let mut picked = Vec::with_capacity(count);
    let mut candidate = 1;
    let mut idx = 0;
    while picked.len() < count {
        if idx < used.len() && used[idx] == candidate {
            idx += 1;
        } else {
            picked.push(candidate);
        }
        candidate += 1;
    }
    picked
}
