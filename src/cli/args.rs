// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

use crate::backup::{BackupRequest, LabelSelector};
use crate::config::Config;
use crate::kubernetes::ResourceRegistry;

#[derive(Parser, Debug)]
#[command(name = "k8sbackup")]
#[command(author, version, about = "Back up Kubernetes resources and everything they reference")]
pub struct Args {
    /// Name of the backup (also the directory created under the output dir)
    pub name: String,

    /// Kubernetes context to use (kubeconfig current context by default)
    #[arg(long, value_name = "CONTEXT")]
    pub context: Option<String>,

    /// Namespaces to back up, comma separated ("*" for all)
    #[arg(long, value_delimiter = ',', value_name = "NAMESPACES")]
    pub include_namespaces: Vec<String>,

    /// Namespaces to skip, comma separated
    #[arg(long, value_delimiter = ',', value_name = "NAMESPACES")]
    pub exclude_namespaces: Vec<String>,

    /// Resources to back up, comma separated (e.g. "deploy,pvc,certificates.cert-manager.io")
    #[arg(long, value_delimiter = ',', value_name = "RESOURCES")]
    pub include_resources: Vec<String>,

    /// Resources to skip, comma separated (added to the configured exclusions)
    #[arg(long, value_delimiter = ',', value_name = "RESOURCES")]
    pub exclude_resources: Vec<String>,

    /// Only back up items matching this label selector (e.g. "app=web,tier!=cache")
    #[arg(short = 'l', long, value_name = "SELECTOR")]
    pub selector: Option<LabelSelector>,

    /// Record that volumes should be snapshotted
    #[arg(long, num_args = 0..=1, default_missing_value = "true", value_name = "BOOL")]
    pub snapshot_volumes: Option<bool>,

    /// Back up cluster-scoped resources (default: only when namespaces are unrestricted)
    #[arg(long, num_args = 0..=1, default_missing_value = "true", value_name = "BOOL")]
    pub include_cluster_resources: Option<bool>,

    /// Directory backups are created under
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Timeout for a single item action, in seconds
    #[arg(long, value_name = "SECONDS")]
    pub action_timeout: Option<u64>,

    /// Discover all API groups (CRDs included) instead of only built-in kinds
    #[arg(long)]
    pub discover: bool,

    /// Output format of the run summary
    #[arg(short, long, value_enum, default_value = "table")]
    pub output: OutputFormat,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    /// Build the backup request, resolving resource aliases through the registry
    pub fn to_request(&self, registry: &ResourceRegistry, config: &Config) -> BackupRequest {
        let mut excluded = self.exclude_resources.clone();
        excluded.extend(config.excluded_resources.iter().cloned());

        let mut request = BackupRequest::new(&self.name);
        request.included_resources = resolve_resources(&self.include_resources, registry);
        request.excluded_resources = resolve_resources(&excluded, registry);
        request.included_namespaces = clean(&self.include_namespaces);
        request.excluded_namespaces = clean(&self.exclude_namespaces);
        request.label_selector = self.selector.clone().filter(|s| !s.is_empty());
        request.snapshot_volumes = self.snapshot_volumes;
        request.include_cluster_resources = self.include_cluster_resources;
        request
    }

    pub fn action_timeout(&self, config: &Config) -> Duration {
        self.action_timeout
            .map(Duration::from_secs)
            .unwrap_or_else(|| config.action_timeout())
    }

    pub fn output_dir(&self, config: &Config) -> anyhow::Result<PathBuf> {
        match &self.output_dir {
            Some(dir) => Ok(dir.clone()),
            None => config.output_dir(),
        }
    }
}

fn clean(values: &[String]) -> Vec<String> {
    values
        .iter()
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(String::from)
        .collect()
}

/// Map aliases (pvc, deploy, ...) to canonical `resource[.group]` names
///
/// Unknown names are kept as written so they can still match kinds found later.
fn resolve_resources(names: &[String], registry: &ResourceRegistry) -> Vec<String> {
    let mut resolved: Vec<String> = Vec::new();
    for name in clean(names) {
        let canonical = if name == "*" {
            name
        } else if let Some(info) = registry.resolve(&name) {
            info.group_resource.to_string()
        } else {
            warn!(resource = %name, "Unknown resource, using as written");
            name.to_lowercase()
        };
        if !resolved.contains(&canonical) {
            resolved.push(canonical);
        }
    }
    resolved
}

#[derive(ValueEnum, Clone, Debug, Default)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
    Yaml,
}
