//! Configuration materializer.
//!
//! Translates one [`ServiceDefinition`] plus optional per-call overrides
//! into the concrete parameter set the runtime client's create operation
//! consumes, and computes the deterministic configuration fingerprint used
//! for drift detection.

mod env;
mod hosts;
mod ports;
mod volumes;

pub use env::{merge_environment, resolve_environment, resolve_environment_with};
pub use hosts::build_extra_hosts;
pub use ports::{parse_expose_spec, parse_port_spec, ExposedPort, PortBinding, Protocol};
pub use volumes::{
    merge_inherited_volumes, normalize_container_path, parse_volume_spec, VolumeBinding,
};

use crate::config::{RestartPolicy, ServiceDefinition};
use crate::config::env_loader::env_vars_from_files;
use crate::error::{Error, Result};
use crate::identity::{
    canonical_name, LABEL_CONFIG_HASH, LABEL_NUMBER, LABEL_ONE_OFF, LABEL_PROJECT, LABEL_SERVICE,
    LABEL_VERSION,
};
use crate::links::LinkAlias;
use std::collections::BTreeMap;

/// Log drivers the runtime client accepts. Anything else is a
/// configuration error, never defaulted away.
const VALID_LOG_DRIVERS: &[&str] = &["json-file", "syslog", "journald", "gelf", "fluentd", "none"];

/// Ad hoc per-call overrides (e.g. one-off environment), stronger than the
/// service definition.
#[derive(Debug, Clone, Default)]
pub struct CreateOptions {
    pub environment: BTreeMap<String, Option<String>>,
    pub command: Option<Vec<String>>,
    pub labels: BTreeMap<String, String>,
}

/// Concrete parameter set for one engine create call.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateParams {
    pub name: String,
    pub image: String,
    pub command: Vec<String>,
    pub entrypoint: Option<Vec<String>>,
    pub environment: BTreeMap<String, String>,
    /// Predecessor container id carried as an `affinity:container==<id>`
    /// placement hint on recreated instances.
    pub affinity: Option<String>,
    pub labels: BTreeMap<String, String>,
    pub extra_hosts: BTreeMap<String, String>,
    pub ports: Vec<PortBinding>,
    pub expose: Vec<ExposedPort>,
    pub volumes: Vec<VolumeBinding>,
    pub volumes_from: Vec<String>,
    pub links: Vec<LinkAlias>,
    pub dns: Vec<String>,
    pub dns_search: Vec<String>,
    pub cap_add: Vec<String>,
    pub cap_drop: Vec<String>,
    pub devices: Vec<String>,
    pub security_opt: Vec<String>,
    pub network_mode: Option<String>,
    pub pid_mode: Option<String>,
    pub restart: Option<RestartPolicy>,
    pub mac_address: Option<String>,
    pub hostname: Option<String>,
    pub domainname: Option<String>,
    pub user: Option<String>,
    pub working_dir: Option<String>,
    pub privileged: bool,
    pub read_only: bool,
    pub mem_limit: Option<String>,
    pub cpu_shares: Option<u32>,
    pub cpuset: Option<String>,
    pub log_driver: Option<String>,
}

/// Materializes create parameters for one service.
pub struct Materializer<'a> {
    project: &'a str,
    service: &'a str,
    definition: &'a ServiceDefinition,
}

impl<'a> Materializer<'a> {
    pub fn new(project: &'a str, service: &'a str, definition: &'a ServiceDefinition) -> Self {
        Materializer {
            project,
            service,
            definition,
        }
    }

    /// Deterministic digest of the normalized desired configuration,
    /// recorded as a label at creation time and compared on every planning
    /// pass to detect drift.
    pub fn fingerprint(&self) -> String {
        // serde_json emits struct fields in declaration order and BTreeMap
        // keys sorted, so equal definitions always serialize identically.
        let encoded =
            serde_json::to_string(self.definition).unwrap_or_else(|_| String::from("{}"));
        format!("{:016x}", fnv1a_64(encoded.as_bytes()))
    }

    /// Build the create parameter set for one instance.
    ///
    /// `image` is the resolved image reference (the caller has already run
    /// image resolution). `inherited_volumes` and `affinity` are only set
    /// on a recreate, carrying the predecessor's live bindings and id.
    #[allow(clippy::too_many_arguments)]
    pub fn create_params(
        &self,
        image: &str,
        number: u32,
        one_off: bool,
        overrides: &CreateOptions,
        links: Vec<LinkAlias>,
        inherited_volumes: Option<&BTreeMap<String, String>>,
        affinity: Option<&str>,
    ) -> Result<CreateParams> {
        let def = self.definition;

        let name = canonical_name(
            self.project,
            self.service,
            number,
            one_off,
            def.container_name.as_deref(),
        );

        let env_file = env_vars_from_files(&def.env_file)?;
        let service_env = def
            .environment
            .as_ref()
            .map(|e| e.to_map())
            .unwrap_or_default();
        let merged = merge_environment(env_file, service_env, overrides.environment.clone());
        let environment = resolve_environment(merged);

        let extra_hosts = match &def.extra_hosts {
            Some(input) => build_extra_hosts(input)?,
            None => BTreeMap::new(),
        };

        let ports = def
            .ports
            .iter()
            .map(|spec| parse_port_spec(spec))
            .collect::<Result<Vec<_>>>()?;
        let expose = def
            .expose
            .iter()
            .map(|spec| parse_expose_spec(spec))
            .collect::<Result<Vec<_>>>()?;

        let spec_binds = def
            .volumes
            .iter()
            .map(|spec| parse_volume_spec(spec))
            .collect::<Result<Vec<_>>>()?;
        let volumes = match inherited_volumes {
            Some(old) => merge_inherited_volumes(&spec_binds, old),
            None => spec_binds,
        };

        if let Some(driver) = &def.log_driver {
            if !VALID_LOG_DRIVERS.contains(&driver.as_str()) {
                return Err(Error::config_field(
                    "log_driver",
                    format!("unknown log driver '{}'", driver),
                ));
            }
        }

        let mut labels = def.labels.as_ref().map(|l| l.to_map()).unwrap_or_default();
        labels.extend(overrides.labels.clone());
        labels.insert(LABEL_PROJECT.to_string(), self.project.to_string());
        labels.insert(LABEL_SERVICE.to_string(), self.service.to_string());
        labels.insert(LABEL_NUMBER.to_string(), number.to_string());
        labels.insert(LABEL_ONE_OFF.to_string(), one_off.to_string());
        labels.insert(
            LABEL_VERSION.to_string(),
            env!("CARGO_PKG_VERSION").to_string(),
        );
        labels.insert(LABEL_CONFIG_HASH.to_string(), self.fingerprint());

        Ok(CreateParams {
            name,
            image: image.to_string(),
            command: overrides
                .command
                .clone()
                .or_else(|| def.command.clone())
                .unwrap_or_default(),
            entrypoint: def.entrypoint.clone(),
            environment,
            affinity: affinity.map(str::to_string),
            labels,
            extra_hosts,
            ports,
            expose,
            volumes,
            volumes_from: def.volumes_from.clone(),
            links,
            dns: def.dns.as_ref().map(|d| d.to_vec()).unwrap_or_default(),
            dns_search: def
                .dns_search
                .as_ref()
                .map(|d| d.to_vec())
                .unwrap_or_default(),
            cap_add: def.cap_add.clone(),
            cap_drop: def.cap_drop.clone(),
            devices: def.devices.clone(),
            security_opt: def.security_opt.clone(),
            network_mode: def.network_mode.clone(),
            pid_mode: def.pid_mode.clone(),
            restart: def.restart.clone(),
            mac_address: def.mac_address.clone(),
            hostname: def.hostname.clone(),
            domainname: def.domainname.clone(),
            user: def.user.clone(),
            working_dir: def.working_dir.clone(),
            privileged: def.privileged,
            read_only: def.read_only,
            mem_limit: def.mem_limit.clone(),
            cpu_shares: def.cpu_shares,
            cpuset: def.cpuset.clone(),
            log_driver: def.log_driver.clone(),
        })
    }
}

/// FNV-1a 64-bit hash. Deterministic across Rust versions and platforms,
/// unlike `DefaultHasher` whose SipHash seeds are randomized per process.
fn fnv1a_64(data: &[u8]) -> u64 {
    const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;
    let mut hash = FNV_OFFSET;
    for &byte in data {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}
