// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Ghostfleet Maintainers

//! Fleet configuration loader.
//!
//! Sources, in priority order: a JSON blob from the environment, then hosts
//! auto-discovered from the deployment tool's YAML files merged with a
//! static JSON metadata file. Worker ids are assigned `gh-worker-N` by one
//! global counter across all discovery files, first occurrence of an IP
//! wins — including across environments. That collision behavior is
//! long-standing and deliberately preserved.
//!
//! The YAML scanner understands exactly one shape (`servers.<role>.hosts`
//! as a list of scalars); pulling in a YAML crate for that would be more
//! code than the scanner.

use ghfleet_core::{FleetEntry, WORKER_ROLE};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum FleetConfigError {
    #[error("invalid fleet JSON from environment: {0}")]
    InvalidEnvJson(serde_json::Error),
    #[error("invalid static fleet file {path}: {source}")]
    InvalidStaticFile {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Where the loader reads from; built once from `env` at startup.
#[derive(Debug, Clone)]
pub struct FleetSources {
    /// Full fleet as JSON; when set, nothing else is consulted.
    pub env_json: Option<String>,
    /// `(environment, path)` pairs of deployment YAML files, scanned in order.
    pub discovery: Vec<(String, PathBuf)>,
    /// Static JSON file with metadata overrides and non-worker entries.
    pub static_file: PathBuf,
}

/// Static-file row: worker metadata override or a standalone entry.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StaticEntry {
    #[serde(default)]
    id: Option<String>,
    ip: String,
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    instance_id: Option<String>,
    #[serde(default)]
    environment: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

pub fn load_fleet(sources: &FleetSources) -> Result<Vec<FleetEntry>, FleetConfigError> {
    if let Some(raw) = &sources.env_json {
        let entries: Vec<FleetEntry> =
            serde_json::from_str(raw).map_err(FleetConfigError::InvalidEnvJson)?;
        debug!(entries = entries.len(), "fleet loaded from environment JSON");
        return Ok(entries);
    }

    let mut entries: Vec<FleetEntry> = Vec::new();
    let mut worker_counter = 0usize;

    for (environment, path) in &sources.discovery {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "discovery config unreadable, skipping");
                continue;
            }
        };
        for (role, host) in scan_server_hosts(&raw) {
            if role != WORKER_ROLE {
                continue;
            }
            // First occurrence of an IP wins, across environments too.
            if entries.iter().any(|e| e.ip == host) {
                continue;
            }
            let mut entry = FleetEntry::new(format!("gh-worker-{}", worker_counter), host, WORKER_ROLE);
            entry.environment = Some(environment.clone());
            entries.push(entry);
            worker_counter += 1;
        }
    }

    merge_static_file(&mut entries, &sources.static_file)?;
    Ok(entries)
}

fn merge_static_file(
    entries: &mut Vec<FleetEntry>,
    path: &Path,
) -> Result<(), FleetConfigError> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(_) => return Ok(()),
    };
    let statics: Vec<StaticEntry> = serde_json::from_str(&raw)
        .map_err(|source| FleetConfigError::InvalidStaticFile { path: path.to_path_buf(), source })?;

    for row in statics {
        let role = row.role.clone().unwrap_or_else(|| WORKER_ROLE.to_string());
        if role == WORKER_ROLE {
            if let Some(existing) = entries.iter_mut().find(|e| e.ip == row.ip) {
                // Metadata override for a discovered worker.
                if row.instance_id.is_some() {
                    existing.instance_id = row.instance_id;
                }
                if row.environment.is_some() {
                    existing.environment = row.environment;
                }
                if row.name.is_some() {
                    existing.name = row.name;
                }
                continue;
            }
        }
        // Non-worker entries (and workers unknown to discovery) are
        // always preserved.
        let id = row.id.unwrap_or_else(|| format!("{}-{}", role, row.ip.replace('.', "-")));
        let mut entry = FleetEntry::new(id, row.ip, role);
        entry.instance_id = row.instance_id;
        entry.environment = row.environment;
        entry.name = row.name;
        entries.push(entry);
    }
    Ok(())
}

/// Scan a deployment YAML for `servers.<role>.hosts` lists.
///
/// Returns `(role, host)` pairs in file order. Indent-sensitive, comments
/// and blank lines skipped, everything outside the `servers:` block ignored.
fn scan_server_hosts(raw: &str) -> Vec<(String, String)> {
    let mut found = Vec::new();
    let mut servers_indent: Option<usize> = None;
    let mut role: Option<(usize, String)> = None;
    let mut in_hosts = false;

    for line in raw.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let indent = line.len() - line.trim_start().len();

        match servers_indent {
            None => {
                if trimmed == "servers:" {
                    servers_indent = Some(indent);
                }
            }
            Some(base) => {
                if indent <= base {
                    // Left the servers block entirely.
                    servers_indent = None;
                    role = None;
                    in_hosts = false;
                    if trimmed == "servers:" {
                        servers_indent = Some(indent);
                    }
                    continue;
                }
                if let Some(host) = trimmed.strip_prefix("- ") {
                    if in_hosts {
                        if let Some((_, role)) = &role {
                            found.push((role.clone(), host.trim().trim_matches('"').to_string()));
                        }
                    }
                    continue;
                }
                if trimmed == "hosts:" {
                    in_hosts = role.is_some();
                    continue;
                }
                if let Some(name) = trimmed.strip_suffix(':') {
                    match &role {
                        // Deeper keys under a role (e.g. options:) end hosts.
                        Some((role_indent, _)) if indent > *role_indent => {
                            in_hosts = false;
                        }
                        _ => {
                            role = Some((indent, name.to_string()));
                            in_hosts = false;
                        }
                    }
                }
            }
        }
    }
    found
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
