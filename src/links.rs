//! Link and alias resolution.
//!
//! Computes the set of network aliases a consuming container should see for
//! each linked service. The alias set is rebuilt from a fresh container
//! listing on every container creation and never persisted.

use crate::config::ServiceDefinition;
use crate::container::{list_containers, ListOptions};
use crate::engine::EngineClient;
use crate::error::Result;
use std::collections::BTreeMap;

/// One resolved link: a target container addressed under an alias.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkAlias {
    pub target: String,
    pub alias: String,
}

/// Parse a `service[:alias]` link spec.
pub fn parse_link(spec: &str) -> (String, Option<String>) {
    match spec.split_once(':') {
        Some((service, alias)) => (service.to_string(), Some(alias.to_string())),
        None => (spec.to_string(), None),
    }
}

/// Parse a `name[:alias]` external link spec; the alias defaults to the
/// container name itself.
pub fn parse_external_link(spec: &str) -> (String, String) {
    match spec.split_once(':') {
        Some((name, alias)) => (name.to_string(), alias.to_string()),
        None => (spec.to_string(), spec.to_string()),
    }
}

/// Resolve every link the consuming container should carry.
///
/// Internal links produce, per instance of the linked service, a
/// project-qualified alias (`{project}_{service}_{n}`) and a short alias
/// (`{service}_{n}`), plus one service-wide alias: the custom alias if the
/// link declares one, the bare service name otherwise. One-off containers
/// additionally link to all instances of their own service; regular
/// containers never link to their own siblings. External links resolve to
/// a fixed alias with no engine lookup — a missing target surfaces at
/// execution time, not here.
pub async fn resolve_links(
    engine: &dyn EngineClient,
    project: &str,
    service: &str,
    definition: &ServiceDefinition,
    one_off: bool,
) -> Result<Vec<LinkAlias>> {
    // alias -> target; later entries win, matching engine link semantics
    // where an alias maps to exactly one container.
    let mut aliases: BTreeMap<String, String> = BTreeMap::new();

    for spec in &definition.links {
        let (linked_service, custom_alias) = parse_link(spec);
        let service_alias = custom_alias.unwrap_or_else(|| linked_service.clone());
        collect_service_aliases(engine, project, &linked_service, &service_alias, &mut aliases)
            .await?;
    }

    for spec in &definition.external_links {
        let (name, alias) = parse_external_link(spec);
        aliases.insert(alias, name);
    }

    if one_off {
        collect_service_aliases(engine, project, service, service, &mut aliases).await?;
    }

    Ok(aliases
        .into_iter()
        .map(|(alias, target)| LinkAlias { target, alias })
        .collect())
}

async fn collect_service_aliases(
    engine: &dyn EngineClient,
    project: &str,
    linked_service: &str,
    service_alias: &str,
    aliases: &mut BTreeMap<String, String>,
) -> Result<()> {
    let containers = list_containers(engine, project, linked_service, ListOptions::all()).await?;
    for container in &containers {
        aliases.insert(container.name.clone(), container.name.clone());
        if let Some(number) = container.number {
            aliases.insert(
                format!("{}_{}", linked_service, number),
                container.name.clone(),
            );
        }
        aliases.insert(service_alias.to_string(), container.name.clone());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_link_forms() {
        assert_eq!(parse_link("db"), ("db".to_string(), None));
        assert_eq!(
            parse_link("db:custom"),
            ("db".to_string(), Some("custom".to_string()))
        );
    }

    #[test]
    fn parse_external_link_defaults_alias_to_name() {
        assert_eq!(
            parse_external_link("proj_db_1"),
            ("proj_db_1".to_string(), "proj_db_1".to_string())
        );
        assert_eq!(
            parse_external_link("proj_db_3:db_3"),
            ("proj_db_3".to_string(), "db_3".to_string())
        );
    }
}
