// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Pluggable per-resource-kind backup logic.
//!
//! An [`ItemAction`] declares which items it handles through a [`ResourceSelector`]
//! and, when run against an item, may return a modified item plus identifiers of
//! other resources that must be backed up along with it.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

use super::error::ActionError;
use super::identifier::{GroupResource, ResourceIdentifier};
use super::item::Item;
use super::request::BackupRequest;
use super::selector::ResourceSelector;

/// Result of running an action against one item
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ActionOutput {
    /// Replacement item, `None` when the action left the item untouched
    pub item: Option<Item>,
    /// Resources to visit in addition to the current item, in order
    pub additional_items: Vec<ResourceIdentifier>,
}

impl ActionOutput {
    pub fn unchanged() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn modified(item: Item) -> Self {
        Self {
            item: Some(item),
            additional_items: Vec::new(),
        }
    }

    pub fn with_additional_items(mut self, items: Vec<ResourceIdentifier>) -> Self {
        self.additional_items = items;
        self
    }
}

/// Backup-time behavior for a kind of resource
///
/// Implementations hold no mutable state; calls into external systems must be
/// bounded in time since the processor wraps every call in a timeout.
#[async_trait]
pub trait ItemAction: Send + Sync {
    /// Stable identifier used in logs and error reports
    fn name(&self) -> &str;

    /// Which items this action runs for
    fn applies_to(&self) -> anyhow::Result<ResourceSelector>;

    async fn execute(
        &self,
        item: &Item,
        request: &BackupRequest,
    ) -> Result<ActionOutput, ActionError>;
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("action '{0}' is already registered")]
    Duplicate(String),
    #[error("action '{name}' has an unusable selector: {error:#}")]
    Selector { name: String, error: anyhow::Error },
}

struct RegisteredAction {
    action: Arc<dyn ItemAction>,
    selector: ResourceSelector,
}

/// Ordered set of actions, built once at start-up
///
/// Registration order decides the order in which matching actions run.
/// Share it between runs behind an `Arc`; it is never mutated after start-up.
#[derive(Default)]
pub struct ActionRegistry {
    actions: Vec<RegisteredAction>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an action; its selector is resolved once, here
    pub fn register(&mut self, action: Arc<dyn ItemAction>) -> Result<(), RegistryError> {
        let name = action.name().to_string();
        if self.actions.iter().any(|a| a.action.name() == name) {
            return Err(RegistryError::Duplicate(name));
        }

        let selector = action
            .applies_to()
            .map_err(|error| RegistryError::Selector {
                name: name.clone(),
                error,
            })?;

        tracing::debug!(action = %name, selector = ?selector, "Registered item action");
        self.actions.push(RegisteredAction { action, selector });
        Ok(())
    }

    /// Actions whose selector accepts the item, in registration order
    pub fn matching<'a>(
        &'a self,
        group_resource: &'a GroupResource,
        namespace: &'a str,
        labels: &'a BTreeMap<String, String>,
    ) -> impl Iterator<Item = &'a Arc<dyn ItemAction>> + 'a {
        self.actions
            .iter()
            .filter(move |a| a.selector.matches(group_resource, namespace, labels))
            .map(|a| &a.action)
    }

    pub fn names(&self) -> Vec<&str> {
        self.actions.iter().map(|a| a.action.name()).collect()
    }
}

impl std::fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionRegistry")
            .field("actions", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Named {
        name: &'static str,
        resources: Vec<&'static str>,
    }

    #[async_trait]
    impl ItemAction for Named {
        fn name(&self) -> &str {
            self.name
        }

        fn applies_to(&self) -> anyhow::Result<ResourceSelector> {
            Ok(ResourceSelector::for_resources(self.resources.clone()))
        }

        async fn execute(
            &self,
            _item: &Item,
            _request: &BackupRequest,
        ) -> Result<ActionOutput, ActionError> {
            Ok(ActionOutput::unchanged())
        }
    }

    struct Broken;

    #[async_trait]
    impl ItemAction for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        fn applies_to(&self) -> anyhow::Result<ResourceSelector> {
            Err(anyhow::anyhow!("invalid selector"))
        }

        async fn execute(
            &self,
            _item: &Item,
            _request: &BackupRequest,
        ) -> Result<ActionOutput, ActionError> {
            Ok(ActionOutput::unchanged())
        }
    }

    fn named(name: &'static str, resources: &[&'static str]) -> Arc<dyn ItemAction> {
        Arc::new(Named {
            name,
            resources: resources.to_vec(),
        })
    }

    #[test]
    fn test_matching_preserves_registration_order() {
        let mut registry = ActionRegistry::new();
        registry.register(named("second", &["pods"])).unwrap();
        registry.register(named("first", &["pods", "services"])).unwrap();
        registry.register(named("pvc-only", &["persistentvolumeclaims"])).unwrap();

        let pods = GroupResource::core("pods");
        let labels = BTreeMap::new();
        let names: Vec<_> = registry
            .matching(&pods, "default", &labels)
            .map(|a| a.name().to_string())
            .collect();
        assert_eq!(names, vec!["second", "first"]);
        assert_eq!(registry.names().len(), 3);
    }

    #[test]
    fn test_no_match() {
        let mut registry = ActionRegistry::new();
        registry.register(named("pvc", &["persistentvolumeclaims"])).unwrap();

        let cm = GroupResource::core("configmaps");
        let labels = BTreeMap::new();
        assert_eq!(registry.matching(&cm, "default", &labels).count(), 0);
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut registry = ActionRegistry::new();
        registry.register(named("pvc", &["persistentvolumeclaims"])).unwrap();
        let err = registry.register(named("pvc", &["pods"])).unwrap_err();
        assert!(matches!(err, RegistryError::Duplicate(ref n) if n == "pvc"));
        assert_eq!(registry.names(), vec!["pvc"]);
    }

    #[test]
    fn test_unusable_selector_rejected() {
        let mut registry = ActionRegistry::new();
        let err = registry.register(Arc::new(Broken)).unwrap_err();
        assert!(err.to_string().contains("invalid selector"));
        assert!(registry.names().is_empty());
    }

    #[test]
    fn test_action_output_builders() {
        let id = ResourceIdentifier::cluster_scoped(GroupResource::core("persistentvolumes"), "pv");
        let out = ActionOutput::unchanged().with_additional_items(vec![id.clone()]);
        assert!(out.item.is_none());
        assert_eq!(out.additional_items, vec![id]);

        let modified = ActionOutput::modified(Item::new(serde_json::json!({})));
        assert!(modified.item.is_some());
        assert!(modified.additional_items.is_empty());
    }
}
