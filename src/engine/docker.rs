//! Docker CLI implementation of the engine contract.
//!
//! All engine interactions go through [`DockerEngine`], which provides
//! consistent timeout handling, error mapping to [`EngineError`], and a
//! single point where `Command::new("docker")` is constructed.

use super::{ContainerDetails, ContainerSummary, EngineClient, EngineError};
use crate::materialize::CreateParams;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::process::Output;
use std::time::Duration;

// Engine operation timeouts.
const LIST_TIMEOUT: Duration = Duration::from_secs(10);
const INSPECT_TIMEOUT: Duration = Duration::from_secs(10);
const CREATE_TIMEOUT: Duration = Duration::from_secs(60);
const START_TIMEOUT: Duration = Duration::from_secs(30);
const REMOVE_TIMEOUT: Duration = Duration::from_secs(10);
/// Margin on top of the stop grace period before the RPC itself times out.
const STOP_MARGIN: Duration = Duration::from_secs(10);

/// Docker CLI client.
///
/// Construct once and thread through the application — the struct is cheap
/// (zero-sized today).
#[derive(Debug, Clone, Default)]
pub struct DockerEngine;

impl DockerEngine {
    pub fn new() -> Self {
        DockerEngine
    }

    /// Run a docker command with a timeout, returning raw Output.
    async fn run(&self, args: &[&str], timeout: Duration) -> Result<Output, EngineError> {
        let result = tokio::time::timeout(
            timeout,
            tokio::process::Command::new("docker").args(args).output(),
        )
        .await;

        let cmd_str = format!("docker {}", args.join(" "));

        match result {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(e)) => Err(EngineError::exec_failed(cmd_str, e)),
            Err(_) => Err(EngineError::timeout(cmd_str, timeout)),
        }
    }

    /// Run a docker command with a timeout, returning Output only if exit 0.
    async fn run_success(&self, args: &[&str], timeout: Duration) -> Result<Output, EngineError> {
        let output = self.run(args, timeout).await?;
        if output.status.success() {
            Ok(output)
        } else {
            let cmd_str = format!("docker {}", args.join(" "));
            Err(EngineError::failed(cmd_str, &output))
        }
    }
}

#[async_trait]
impl EngineClient for DockerEngine {
    async fn list(
        &self,
        label_filters: &[(&str, &str)],
    ) -> Result<Vec<ContainerSummary>, EngineError> {
        let mut args: Vec<String> = vec!["ps".into(), "-a".into(), "--no-trunc".into()];
        for (key, value) in label_filters {
            args.push("--filter".into());
            args.push(format!("label={}={}", key, value));
        }
        args.push("--format".into());
        args.push("{{.ID}}\t{{.Names}}\t{{.State}}\t{{.Labels}}".into());

        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        let output = self.run_success(&arg_refs, LIST_TIMEOUT).await?;

        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .filter_map(parse_ps_line)
            .collect())
    }

    async fn create(&self, params: &CreateParams) -> Result<String, EngineError> {
        let args = create_args(params);
        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        let output = self.run_success(&arg_refs, CREATE_TIMEOUT).await?;
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    async fn start(&self, id: &str) -> Result<(), EngineError> {
        self.run_success(&["start", id], START_TIMEOUT).await?;
        Ok(())
    }

    async fn stop(&self, id: &str, grace: Duration) -> Result<(), EngineError> {
        let grace_secs = grace.as_secs().max(1).to_string();
        self.run_success(&["stop", "-t", &grace_secs, id], grace + STOP_MARGIN)
            .await?;
        Ok(())
    }

    async fn kill(&self, id: &str) -> Result<(), EngineError> {
        let output = self.run(&["kill", id], REMOVE_TIMEOUT).await?;
        if output.status.success() {
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        // Already stopped is not an error for a kill escalation.
        if stderr.contains("is not running") {
            return Ok(());
        }
        Err(EngineError::failed("docker kill", &output))
    }

    async fn remove(&self, id: &str) -> Result<(), EngineError> {
        self.run_success(&["rm", id], REMOVE_TIMEOUT).await?;
        Ok(())
    }

    async fn rename(&self, id: &str, new_name: &str) -> Result<(), EngineError> {
        self.run_success(&["rename", id, new_name], REMOVE_TIMEOUT)
            .await?;
        Ok(())
    }

    async fn inspect(&self, id: &str) -> Result<ContainerDetails, EngineError> {
        let output = self
            .run_success(&["inspect", id], INSPECT_TIMEOUT)
            .await?;
        let raw: serde_json::Value = serde_json::from_slice(&output.stdout).map_err(|e| {
            EngineError::cmd_failed("docker inspect", format!("unparseable output: {}", e), None)
        })?;
        let entry = raw.get(0).ok_or_else(|| EngineError::ContainerNotFound {
            container: id.to_string(),
        })?;
        Ok(parse_inspect_entry(entry))
    }

    async fn image_exists(&self, image: &str) -> Result<bool, EngineError> {
        match self
            .run(&["image", "inspect", image], INSPECT_TIMEOUT)
            .await
        {
            Ok(o) => Ok(o.status.success()),
            Err(e) => Err(e),
        }
    }

    async fn build_image(&self, context: &Path, tag: &str) -> Result<(), EngineError> {
        let context = context.to_string_lossy();
        let cmd_str = format!("docker build -t {} {}", tag, context);
        // Inherit stdio so build progress is visible.
        let status = tokio::process::Command::new("docker")
            .args(["build", "-t", tag, context.as_ref()])
            .stdin(std::process::Stdio::inherit())
            .stdout(std::process::Stdio::inherit())
            .stderr(std::process::Stdio::inherit())
            .status()
            .await
            .map_err(|e| EngineError::exec_failed(&cmd_str, e))?;

        if status.success() {
            Ok(())
        } else {
            Err(EngineError::cmd_failed(cmd_str, "build failed", status.code()))
        }
    }
}

/// Parse one `docker ps` line in `id\tname\tstate\tlabels` format.
fn parse_ps_line(line: &str) -> Option<ContainerSummary> {
    let mut parts = line.splitn(4, '\t');
    let id = parts.next()?.trim();
    let name = parts.next()?.trim();
    let state = parts.next()?.trim();
    let labels_raw = parts.next().unwrap_or("");
    if id.is_empty() {
        return None;
    }
    let labels: HashMap<String, String> = labels_raw
        .split(',')
        .filter(|entry| !entry.is_empty())
        .map(|entry| match entry.split_once('=') {
            Some((k, v)) => (k.to_string(), v.to_string()),
            None => (entry.to_string(), String::new()),
        })
        .collect();
    Some(ContainerSummary {
        id: id.to_string(),
        name: name.to_string(),
        running: state == "running",
        labels,
    })
}

/// Decode one entry of `docker inspect` JSON output.
fn parse_inspect_entry(entry: &serde_json::Value) -> ContainerDetails {
    let id = entry
        .get("Id")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();
    let name = entry
        .get("Name")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .trim_start_matches('/')
        .to_string();
    let running = entry
        .pointer("/State/Running")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);
    let image = entry
        .pointer("/Config/Image")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();
    let labels = entry
        .pointer("/Config/Labels")
        .and_then(|v| v.as_object())
        .map(|obj| {
            obj.iter()
                .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())))
                .collect()
        })
        .unwrap_or_default();

    let mut volumes = BTreeMap::new();
    if let Some(mounts) = entry.get("Mounts").and_then(|v| v.as_array()) {
        for mount in mounts {
            let dest = mount.get("Destination").and_then(|v| v.as_str());
            let source = mount.get("Source").and_then(|v| v.as_str());
            if let (Some(dest), Some(source)) = (dest, source) {
                volumes.insert(dest.to_string(), source.to_string());
            }
        }
    }

    ContainerDetails {
        id,
        name,
        image,
        running,
        labels,
        volumes,
    }
}

/// Translate materialized create parameters into `docker create` arguments.
fn create_args(params: &CreateParams) -> Vec<String> {
    let mut args: Vec<String> = vec!["create".into(), "--name".into(), params.name.clone()];

    for (key, value) in &params.labels {
        args.push("--label".into());
        args.push(format!("{}={}", key, value));
    }
    for (key, value) in &params.environment {
        args.push("-e".into());
        args.push(format!("{}={}", key, value));
    }
    if let Some(old_id) = &params.affinity {
        args.push("-e".into());
        args.push(format!("affinity:container=={}", old_id));
    }
    for (host, ip) in &params.extra_hosts {
        args.push("--add-host".into());
        args.push(format!("{}:{}", host, ip));
    }
    for binding in &params.ports {
        args.push("-p".into());
        let container = format!("{}/{}", binding.container_port, binding.protocol.as_str());
        let host_port = binding
            .host_port
            .map(|p| p.to_string())
            .unwrap_or_default();
        match &binding.host_ip {
            Some(ip) => args.push(format!("{}:{}:{}", ip, host_port, container)),
            None if binding.host_port.is_some() => {
                args.push(format!("{}:{}", host_port, container))
            }
            None => args.push(container),
        }
    }
    for exposed in &params.expose {
        args.push("--expose".into());
        args.push(format!("{}/{}", exposed.port, exposed.protocol.as_str()));
    }
    for volume in &params.volumes {
        args.push("-v".into());
        args.push(volume.as_spec());
    }
    for source in &params.volumes_from {
        args.push("--volumes-from".into());
        args.push(source.clone());
    }
    for link in &params.links {
        args.push("--link".into());
        args.push(format!("{}:{}", link.target, link.alias));
    }
    for dns in &params.dns {
        args.push("--dns".into());
        args.push(dns.clone());
    }
    for domain in &params.dns_search {
        args.push("--dns-search".into());
        args.push(domain.clone());
    }
    for cap in &params.cap_add {
        args.push("--cap-add".into());
        args.push(cap.clone());
    }
    for cap in &params.cap_drop {
        args.push("--cap-drop".into());
        args.push(cap.clone());
    }
    for device in &params.devices {
        args.push("--device".into());
        args.push(device.clone());
    }
    for opt in &params.security_opt {
        args.push("--security-opt".into());
        args.push(opt.clone());
    }
    if let Some(mode) = &params.network_mode {
        args.push("--network".into());
        args.push(mode.clone());
    }
    if let Some(mode) = &params.pid_mode {
        args.push("--pid".into());
        args.push(mode.clone());
    }
    if let Some(restart) = &params.restart {
        args.push("--restart".into());
        args.push(restart.as_spec());
    }
    if let Some(mac) = &params.mac_address {
        args.push("--mac-address".into());
        args.push(mac.clone());
    }
    if let Some(hostname) = &params.hostname {
        args.push("--hostname".into());
        args.push(hostname.clone());
    }
    if let Some(domainname) = &params.domainname {
        args.push("--domainname".into());
        args.push(domainname.clone());
    }
    if let Some(user) = &params.user {
        args.push("--user".into());
        args.push(user.clone());
    }
    if let Some(dir) = &params.working_dir {
        args.push("--workdir".into());
        args.push(dir.clone());
    }
    if params.privileged {
        args.push("--privileged".into());
    }
    if params.read_only {
        args.push("--read-only".into());
    }
    if let Some(mem) = &params.mem_limit {
        args.push("--memory".into());
        args.push(mem.clone());
    }
    if let Some(shares) = params.cpu_shares {
        args.push("--cpu-shares".into());
        args.push(shares.to_string());
    }
    if let Some(cpuset) = &params.cpuset {
        args.push("--cpuset-cpus".into());
        args.push(cpuset.clone());
    }
    if let Some(driver) = &params.log_driver {
        args.push("--log-driver".into());
        args.push(driver.clone());
    }

    // `docker create` takes a single --entrypoint binary; extra entrypoint
    // elements are folded into the command.
    let mut command = params.command.clone();
    if let Some(entrypoint) = &params.entrypoint {
        if let Some((first, rest)) = entrypoint.split_first() {
            args.push("--entrypoint".into());
            args.push(first.clone());
            let mut folded = rest.to_vec();
            folded.extend(command);
            command = folded;
        }
    }

    args.push(params.image.clone());
    args.extend(command);
    args
}
