// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Resource kind discovery for Kubernetes clusters.
//!
//! Core kinds come from k8s-openapi at compile time (no I/O); everything else,
//! including CRDs, is found at runtime through the discovery API.

use anyhow::Result;
use kube::Client;
use kube::discovery::{ApiCapabilities, ApiResource, Discovery, Scope, verbs};
use std::collections::HashMap;

use crate::backup::GroupResource;

/// Information about a resource kind the cluster serves
#[derive(Debug, Clone)]
pub struct ResourceInfo {
    /// The API resource definition
    pub api_resource: ApiResource,
    /// API capabilities (verbs, scope, etc.)
    pub capabilities: ApiCapabilities,
    pub group_resource: GroupResource,
    /// Short names accepted on the command line (e.g., "pvc")
    pub aliases: Vec<String>,
    /// Whether this is a built-in kind (from k8s-openapi) or discovered at runtime
    pub is_core: bool,
}

impl ResourceInfo {
    fn new(
        api_resource: ApiResource,
        capabilities: ApiCapabilities,
        aliases: Vec<String>,
        is_core: bool,
    ) -> Self {
        let group_resource = GroupResource::new(&api_resource.group, api_resource.plural.to_lowercase());
        Self {
            api_resource,
            capabilities,
            group_resource,
            aliases,
            is_core,
        }
    }

    /// Check if this resource is namespace-scoped
    pub fn is_namespaced(&self) -> bool {
        self.capabilities.scope == Scope::Namespaced
    }

    /// Whether the kind can be listed
    ///
    /// Core kinds carry no verb information and are always listable.
    pub fn is_listable(&self) -> bool {
        self.capabilities.operations.is_empty()
            || self.capabilities.supports_operation(verbs::LIST)
    }
}

/// All resource kinds known for a cluster
#[derive(Debug, Clone, Default)]
pub struct ResourceRegistry {
    by_group_resource: HashMap<GroupResource, ResourceInfo>,
    /// Alias to group resource mapping
    alias_map: HashMap<String, GroupResource>,
}

impl ResourceRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a resource kind to the registry
    ///
    /// Core kinds win alias conflicts: a discovered kind never takes over an alias
    /// (e.g. "events") that already points at a core kind.
    pub fn add(&mut self, info: ResourceInfo) {
        let gr = info.group_resource.clone();

        let mut names = vec![
            gr.to_string(),
            gr.resource.clone(),
            info.api_resource.kind.to_lowercase(),
        ];
        names.extend(info.aliases.iter().map(|a| a.to_lowercase()));

        for name in names {
            let taken_by_core = self
                .alias_map
                .get(&name)
                .and_then(|existing| self.by_group_resource.get(existing))
                .is_some_and(|existing| existing.is_core && existing.group_resource != gr);
            if taken_by_core && !info.is_core {
                continue;
            }
            self.alias_map.insert(name, gr.clone());
        }

        match self.by_group_resource.get(&gr) {
            // Keep the compile-time definition of core kinds
            Some(existing) if existing.is_core && !info.is_core => {}
            _ => {
                self.by_group_resource.insert(gr, info);
            }
        }
    }

    pub fn get(&self, group_resource: &GroupResource) -> Option<&ResourceInfo> {
        self.by_group_resource.get(group_resource)
    }

    /// Look up a kind by alias, plural, kind name or `resource.group`
    pub fn resolve(&self, name: &str) -> Option<&ResourceInfo> {
        let key = name.trim().to_lowercase();
        match self.alias_map.get(&key) {
            Some(gr) => self.by_group_resource.get(gr),
            None => self.by_group_resource.get(&GroupResource::parse(&key)),
        }
    }

    /// All kinds, sorted by group resource
    pub fn list(&self) -> Vec<&ResourceInfo> {
        let mut resources: Vec<_> = self.by_group_resource.values().collect();
        resources.sort_by(|a, b| a.group_resource.cmp(&b.group_resource));
        resources
    }

    pub fn len(&self) -> usize {
        self.by_group_resource.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_group_resource.is_empty()
    }

    /// Merge another registry into this one
    pub fn merge(&mut self, other: ResourceRegistry) {
        for info in other.by_group_resource.into_values() {
            self.add(info);
        }
    }
}

/// Build a registry with just core resources using k8s-openapi types (no discovery, instant startup)
pub fn build_core_registry() -> ResourceRegistry {
    use k8s_openapi::api::{
        apps::v1::{DaemonSet, Deployment, ReplicaSet, StatefulSet},
        autoscaling::v2::HorizontalPodAutoscaler,
        batch::v1::{CronJob, Job},
        core::v1::{
            ConfigMap, Endpoints, Event, LimitRange, Namespace, PersistentVolume,
            PersistentVolumeClaim, Pod, ResourceQuota, Secret, Service, ServiceAccount,
        },
        networking::v1::{Ingress, NetworkPolicy},
        policy::v1::PodDisruptionBudget,
        rbac::v1::{ClusterRole, ClusterRoleBinding, Role, RoleBinding},
        storage::v1::StorageClass,
    };
    use kube::Resource;

    let mut registry = ResourceRegistry::new();

    // Uses compile-time type info from k8s-openapi via kube::Resource trait.
    // Scope is spelled out since the Resource trait's Scope is an associated type.
    macro_rules! add_resource {
        ($type:ty, namespaced, [$($alias:expr),* $(,)?]) => {{
            add_resource!(@inner $type, Scope::Namespaced, [$($alias),*])
        }};
        ($type:ty, cluster, [$($alias:expr),* $(,)?]) => {{
            add_resource!(@inner $type, Scope::Cluster, [$($alias),*])
        }};
        (@inner $type:ty, $scope:expr, [$($alias:expr),* $(,)?]) => {{
            let ar = ApiResource {
                group: <$type>::group(&()).to_string(),
                version: <$type>::version(&()).to_string(),
                api_version: <$type>::api_version(&()).to_string(),
                kind: <$type>::kind(&()).to_string(),
                plural: <$type>::plural(&()).to_string(),
            };
            let caps = ApiCapabilities {
                scope: $scope,
                subresources: vec![],
                operations: vec![],
            };
            registry.add(ResourceInfo::new(ar, caps, vec![$($alias.to_string()),*], true));
        }};
    }

    // Core API (v1) - namespaced resources
    add_resource!(Pod, namespaced, ["pod", "po"]);
    add_resource!(Service, namespaced, ["service", "svc"]);
    add_resource!(ConfigMap, namespaced, ["configmap", "cm"]);
    add_resource!(Secret, namespaced, ["secret"]);
    add_resource!(Event, namespaced, ["event", "ev"]);
    add_resource!(ServiceAccount, namespaced, ["serviceaccount", "sa"]);
    add_resource!(Endpoints, namespaced, ["endpoint", "ep"]);
    add_resource!(PersistentVolumeClaim, namespaced, ["persistentvolumeclaim", "pvc"]);
    add_resource!(ResourceQuota, namespaced, ["resourcequota", "quota"]);
    add_resource!(LimitRange, namespaced, ["limitrange", "limits"]);

    // Core API (v1) - cluster-scoped resources
    // Nodes are runtime state and not worth backing up, so they are not listed here.
    add_resource!(Namespace, cluster, ["namespace", "ns"]);
    add_resource!(PersistentVolume, cluster, ["persistentvolume", "pv"]);

    // Apps API (apps/v1)
    add_resource!(Deployment, namespaced, ["deployment", "deploy"]);
    add_resource!(StatefulSet, namespaced, ["statefulset", "sts"]);
    add_resource!(DaemonSet, namespaced, ["daemonset", "ds"]);
    add_resource!(ReplicaSet, namespaced, ["replicaset", "rs"]);

    // Batch API (batch/v1)
    add_resource!(Job, namespaced, ["job"]);
    add_resource!(CronJob, namespaced, ["cronjob", "cj"]);

    // Networking API (networking.k8s.io/v1)
    add_resource!(Ingress, namespaced, ["ingress", "ing"]);
    add_resource!(NetworkPolicy, namespaced, ["networkpolicy", "netpol"]);

    // Autoscaling API (autoscaling/v2)
    add_resource!(HorizontalPodAutoscaler, namespaced, ["horizontalpodautoscaler", "hpa"]);

    // Policy API (policy/v1)
    add_resource!(PodDisruptionBudget, namespaced, ["poddisruptionbudget", "pdb"]);

    // Storage API (storage.k8s.io/v1) - cluster-scoped
    add_resource!(StorageClass, cluster, ["storageclass", "sc"]);

    // RBAC API (rbac.authorization.k8s.io/v1) - namespaced
    add_resource!(Role, namespaced, ["role"]);
    add_resource!(RoleBinding, namespaced, ["rolebinding"]);

    // RBAC API (rbac.authorization.k8s.io/v1) - cluster-scoped
    add_resource!(ClusterRole, cluster, ["clusterrole"]);
    add_resource!(ClusterRoleBinding, cluster, ["clusterrolebinding"]);

    registry
}

/// Discover every listable resource kind served by the cluster (including CRDs)
///
/// Queries the discovery API, which is slow on clusters with many API groups.
pub async fn discover_resources(client: &Client) -> Result<ResourceRegistry> {
    let mut registry = ResourceRegistry::new();

    let discovery = Discovery::new(client.clone()).run().await?;

    for group in discovery.groups() {
        // Preferred version only
        for (ar, caps) in group.recommended_resources() {
            // Skip subresources (e.g., pods/log, pods/exec)
            if ar.plural.contains('/') {
                continue;
            }
            if !caps.supports_operation(verbs::LIST) || !caps.supports_operation(verbs::GET) {
                continue;
            }

            let aliases = vec![ar.kind.to_lowercase()];
            registry.add(ResourceInfo::new(ar, caps, aliases, false));
        }
    }

    Ok(registry)
}
