// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Identity of resource kinds and resource instances.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A resource kind as addressed by the API server: plural resource name plus API group.
///
/// The group is empty for the core (`v1`) API.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupResource {
    pub group: String,
    pub resource: String,
}

impl GroupResource {
    pub fn new(group: impl Into<String>, resource: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            resource: resource.into(),
        }
    }

    /// Core API resource (empty group)
    pub fn core(resource: impl Into<String>) -> Self {
        Self::new("", resource)
    }

    /// Parse `resource` or `resource.group` notation (e.g. `deployments.apps`)
    pub fn parse(s: &str) -> Self {
        let s = s.trim().to_lowercase();
        match s.split_once('.') {
            Some((resource, group)) => Self::new(group, resource),
            None => Self::core(s),
        }
    }
}

impl fmt::Display for GroupResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.group.is_empty() {
            write!(f, "{}", self.resource)
        } else {
            write!(f, "{}.{}", self.resource, self.group)
        }
    }
}

/// Identifies one resource instance within a backup run.
///
/// Cluster-scoped resources carry an empty namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceIdentifier {
    pub group_resource: GroupResource,
    pub namespace: String,
    pub name: String,
}

impl ResourceIdentifier {
    pub fn new(
        group_resource: GroupResource,
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            group_resource,
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    pub fn cluster_scoped(group_resource: GroupResource, name: impl Into<String>) -> Self {
        Self::new(group_resource, "", name)
    }

    pub fn is_cluster_scoped(&self) -> bool {
        self.namespace.is_empty()
    }
}

impl fmt::Display for ResourceIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.is_empty() {
            write!(f, "{}/{}", self.group_resource, self.name)
        } else {
            write!(f, "{}/{}/{}", self.group_resource, self.namespace, self.name)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_group_resource_display() {
        assert_eq!(GroupResource::core("pods").to_string(), "pods");
        assert_eq!(
            GroupResource::new("apps", "deployments").to_string(),
            "deployments.apps"
        );
        assert_eq!(
            GroupResource::new("events.k8s.io", "events").to_string(),
            "events.events.k8s.io"
        );
    }

    #[test]
    fn test_group_resource_parse() {
        assert_eq!(GroupResource::parse("pods"), GroupResource::core("pods"));
        assert_eq!(
            GroupResource::parse("Deployments.Apps"),
            GroupResource::new("apps", "deployments")
        );
        assert_eq!(
            GroupResource::parse("events.events.k8s.io"),
            GroupResource::new("events.k8s.io", "events")
        );
    }

    #[test]
    fn test_identifier_equality_covers_all_fields() {
        let pvc = GroupResource::core("persistentvolumeclaims");
        let a = ResourceIdentifier::new(pvc.clone(), "default", "data");
        let b = ResourceIdentifier::new(pvc.clone(), "default", "data");
        let other_ns = ResourceIdentifier::new(pvc.clone(), "kube-system", "data");
        let other_kind =
            ResourceIdentifier::new(GroupResource::core("configmaps"), "default", "data");

        assert_eq!(a, b);
        assert_ne!(a, other_ns);
        assert_ne!(a, other_kind);

        let set: HashSet<_> = [a, b, other_ns, other_kind].into_iter().collect();
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn test_identifier_display() {
        let pv = ResourceIdentifier::cluster_scoped(
            GroupResource::core("persistentvolumes"),
            "pv-0001",
        );
        assert!(pv.is_cluster_scoped());
        assert_eq!(pv.to_string(), "persistentvolumes/pv-0001");

        let deploy =
            ResourceIdentifier::new(GroupResource::new("apps", "deployments"), "web", "nginx");
        assert_eq!(deploy.to_string(), "deployments.apps/web/nginx");
    }
}
