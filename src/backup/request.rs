// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

use serde::{Deserialize, Serialize};

use super::selector::{LabelSelector, ResourceSelector};

/// What the user asked to back up. Read-only for item actions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BackupRequest {
    pub name: String,
    #[serde(default)]
    pub included_resources: Vec<String>,
    #[serde(default)]
    pub excluded_resources: Vec<String>,
    #[serde(default)]
    pub included_namespaces: Vec<String>,
    #[serde(default)]
    pub excluded_namespaces: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_selector: Option<LabelSelector>,
    /// Whether volume snapshots should be taken (`None` = provider default)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot_volumes: Option<bool>,
    /// Whether cluster-scoped resources are listed as roots (`None` = auto)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_cluster_resources: Option<bool>,
}

impl BackupRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// The user's filters as a selector over root items
    pub fn selector(&self) -> ResourceSelector {
        ResourceSelector {
            included_resources: self.included_resources.clone(),
            excluded_resources: self.excluded_resources.clone(),
            included_namespaces: self.included_namespaces.clone(),
            excluded_namespaces: self.excluded_namespaces.clone(),
            label_selector: self.label_selector.clone(),
        }
    }

    /// Whether cluster-scoped kinds should be listed as roots
    ///
    /// When unset, they are listed only if the backup is not restricted to a set of namespaces.
    pub fn wants_cluster_resources(&self) -> bool {
        self.include_cluster_resources.unwrap_or_else(|| {
            self.included_namespaces.is_empty() || self.included_namespaces.iter().any(|n| n == "*")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::identifier::GroupResource;
    use std::collections::BTreeMap;

    #[test]
    fn test_selector_carries_filters() {
        let request = BackupRequest {
            included_namespaces: vec!["prod".to_string()],
            excluded_resources: vec!["secrets".to_string()],
            label_selector: Some("app=web".parse().unwrap()),
            ..BackupRequest::new("nightly")
        };
        let selector = request.selector();
        let labels: BTreeMap<_, _> = [("app".to_string(), "web".to_string())].into();

        assert!(selector.matches(&GroupResource::core("pods"), "prod", &labels));
        assert!(!selector.matches(&GroupResource::core("secrets"), "prod", &labels));
        assert!(!selector.matches(&GroupResource::core("pods"), "dev", &labels));
    }

    #[test]
    fn test_wants_cluster_resources() {
        let all = BackupRequest::new("all");
        assert!(all.wants_cluster_resources());

        let scoped = BackupRequest {
            included_namespaces: vec!["prod".to_string()],
            ..BackupRequest::new("scoped")
        };
        assert!(!scoped.wants_cluster_resources());

        let forced = BackupRequest {
            include_cluster_resources: Some(true),
            ..scoped.clone()
        };
        assert!(forced.wants_cluster_resources());

        let disabled = BackupRequest {
            include_cluster_resources: Some(false),
            ..BackupRequest::new("none")
        };
        assert!(!disabled.wants_cluster_resources());
    }
}
