use crate::error::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::str::FromStr;

/// A field that accepts either a single scalar or a list in the input
/// document, normalized to the list form the runtime client expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StringOrList {
    One(String),
    Many(Vec<String>),
}

impl StringOrList {
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            StringOrList::One(s) => vec![s.clone()],
            StringOrList::Many(v) => v.clone(),
        }
    }
}

/// Declared environment: a mapping (values may be null, meaning "unset,
/// inherit from host") or a list of `KEY=VALUE` strings. A list entry with
/// no `=` declares the key as unset; `KEY=` declares an explicit empty
/// string, which is preserved as empty, distinct from unset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EnvironmentInput {
    Map(BTreeMap<String, Option<String>>),
    List(Vec<String>),
}

impl EnvironmentInput {
    pub fn to_map(&self) -> BTreeMap<String, Option<String>> {
        match self {
            EnvironmentInput::Map(m) => m.clone(),
            EnvironmentInput::List(entries) => entries.iter().map(|e| split_env(e)).collect(),
        }
    }
}

/// Split one `KEY=VALUE` environment entry. A bare `KEY` means unset.
pub fn split_env(entry: &str) -> (String, Option<String>) {
    match entry.split_once('=') {
        Some((key, value)) => (key.to_string(), Some(value.to_string())),
        None => (entry.to_string(), None),
    }
}

/// Declared labels: a mapping or a list of `key=value` / bare-`key` strings
/// (value defaults to empty string).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LabelsInput {
    Map(BTreeMap<String, String>),
    List(Vec<String>),
}

impl LabelsInput {
    pub fn to_map(&self) -> BTreeMap<String, String> {
        match self {
            LabelsInput::Map(m) => m.clone(),
            LabelsInput::List(entries) => entries
                .iter()
                .map(|e| {
                    let (key, value) = split_env(e);
                    (key, value.unwrap_or_default())
                })
                .collect(),
        }
    }
}

/// Extra hosts input, kept in its raw shape so malformed forms are rejected
/// with a configuration error at materialize time instead of being silently
/// coerced. Only a host-to-ip mapping or a sequence of `"host:ip"` strings
/// is valid; a bare string is ambiguous and a sequence of single-key
/// mappings has ambiguous ordering/merging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExtraHostsInput {
    Map(BTreeMap<String, String>),
    List(Vec<String>),
    ListOfMaps(Vec<BTreeMap<String, String>>),
    Single(String),
}

/// Container restart policy, parsed from `no`, `always` or `on-failure[:N]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestartPolicy {
    No,
    Always,
    OnFailure { max_retries: u32 },
}

impl RestartPolicy {
    /// Render in the `name[:count]` form the runtime client expects.
    pub fn as_spec(&self) -> String {
        match self {
            RestartPolicy::No => "no".to_string(),
            RestartPolicy::Always => "always".to_string(),
            RestartPolicy::OnFailure { max_retries: 0 } => "on-failure".to_string(),
            RestartPolicy::OnFailure { max_retries } => format!("on-failure:{}", max_retries),
        }
    }
}

impl FromStr for RestartPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (name, count) = match s.split_once(':') {
            Some((name, count)) => (name, Some(count)),
            None => (s, None),
        };
        match name {
            "no" => Ok(RestartPolicy::No),
            "always" => Ok(RestartPolicy::Always),
            "on-failure" => {
                let max_retries = match count {
                    Some(c) => c.parse::<u32>().map_err(|_| {
                        Error::config_field("restart", format!("invalid retry count '{}'", c))
                    })?,
                    None => 0,
                };
                Ok(RestartPolicy::OnFailure { max_retries })
            }
            other => Err(Error::config_field(
                "restart",
                format!("unknown restart policy '{}'", other),
            )),
        }
    }
}

impl std::fmt::Display for RestartPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_spec())
    }
}

impl Serialize for RestartPolicy {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.as_spec())
    }
}

impl<'de> Deserialize<'de> for RestartPolicy {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Immutable desired-state record for one logical service.
///
/// This is the already-validated, normalized configuration object the core
/// consumes; loading and schema validation of the declaring file are owned
/// by surrounding layers. The core only reads it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceDefinition {
    /// Image reference. At least one of `image` / `build` must be set.
    pub image: Option<String>,
    /// Build context directory, used when no usable image exists.
    pub build: Option<PathBuf>,

    pub command: Option<Vec<String>>,
    pub entrypoint: Option<Vec<String>>,
    pub working_dir: Option<String>,
    pub user: Option<String>,
    pub hostname: Option<String>,
    pub domainname: Option<String>,
    pub mac_address: Option<String>,
    pub privileged: bool,
    pub read_only: bool,

    pub environment: Option<EnvironmentInput>,
    pub env_file: Vec<PathBuf>,
    pub extra_hosts: Option<ExtraHostsInput>,

    /// Port specs: `[host_ip:][host_port:]container_port[/protocol]`.
    pub ports: Vec<String>,
    /// Declared-open ports that never produce a host binding.
    pub expose: Vec<String>,

    /// Volume specs: `[host_path:]container_path[:ro|rw]`.
    pub volumes: Vec<String>,
    pub volumes_from: Vec<String>,

    /// Links to other services in the project: `service[:alias]`.
    pub links: Vec<String>,
    /// Links to containers outside the project: `name[:alias]`.
    pub external_links: Vec<String>,

    pub labels: Option<LabelsInput>,

    pub dns: Option<StringOrList>,
    pub dns_search: Option<StringOrList>,
    pub cap_add: Vec<String>,
    pub cap_drop: Vec<String>,
    pub devices: Vec<String>,
    pub security_opt: Vec<String>,

    pub network_mode: Option<String>,
    pub pid_mode: Option<String>,
    pub restart: Option<RestartPolicy>,
    pub log_driver: Option<String>,

    pub mem_limit: Option<String>,
    pub cpu_shares: Option<u32>,
    pub cpuset: Option<String>,

    /// Custom container name. Forces the instance count to at most 1.
    pub container_name: Option<String>,
}
