//! Port and expose spec parsing.

use crate::error::{Error, Result};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Tcp,
    Udp,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Tcp => "tcp",
            Protocol::Udp => "udp",
        }
    }
}

/// One published port: always a declared container port, optionally bound
/// to a host port and a specific host interface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortBinding {
    pub container_port: u16,
    pub protocol: Protocol,
    pub host_port: Option<u16>,
    pub host_ip: Option<String>,
}

/// A declared-open port that never produces a host binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExposedPort {
    pub port: u16,
    pub protocol: Protocol,
}

fn parse_protocol(spec: &str, field: &str) -> Result<(String, Protocol)> {
    match spec.split_once('/') {
        Some((port, "tcp")) => Ok((port.to_string(), Protocol::Tcp)),
        Some((port, "udp")) => Ok((port.to_string(), Protocol::Udp)),
        Some((_, proto)) => Err(Error::config_field(
            field,
            format!("unknown protocol '{}' in '{}'", proto, spec),
        )),
        None => Ok((spec.to_string(), Protocol::Tcp)),
    }
}

fn parse_port_number(s: &str, field: &str, spec: &str) -> Result<u16> {
    s.parse::<u16>()
        .map_err(|_| Error::config_field(field, format!("invalid port '{}' in '{}'", s, spec)))
}

/// Parse one port spec: `[host_ip:][host_port:]container_port[/protocol]`.
///
/// Accepted forms: `8000`, `8000/udp`, `8001:8000`, `127.0.0.1:8001:8000`
/// and `127.0.0.1::8000` (interface bind with an engine-assigned host port).
pub fn parse_port_spec(spec: &str) -> Result<PortBinding> {
    let (without_proto, protocol) = parse_protocol(spec, "ports")?;
    let parts: Vec<&str> = without_proto.split(':').collect();
    let (host_ip, host_port, container_port) = match parts.as_slice() {
        [container] => (None, None, *container),
        [host, container] => (None, Some(*host), *container),
        [ip, host, container] => (Some(ip.to_string()), Some(*host), *container),
        _ => {
            return Err(Error::config_field(
                "ports",
                format!("too many colons in '{}'", spec),
            ))
        }
    };
    let host_port = match host_port {
        Some("") => None,
        Some(p) => Some(parse_port_number(p, "ports", spec)?),
        None => None,
    };
    Ok(PortBinding {
        container_port: parse_port_number(container_port, "ports", spec)?,
        protocol,
        host_port,
        host_ip,
    })
}

/// Parse one expose entry: `port[/protocol]`.
pub fn parse_expose_spec(spec: &str) -> Result<ExposedPort> {
    let (port, protocol) = parse_protocol(spec, "expose")?;
    Ok(ExposedPort {
        port: parse_port_number(&port, "expose", spec)?,
        protocol,
    })
}
