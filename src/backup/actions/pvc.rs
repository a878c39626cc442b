// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

use async_trait::async_trait;
use tracing::debug;

use crate::backup::action::{ActionOutput, ItemAction};
use crate::backup::error::ActionError;
use crate::backup::identifier::{GroupResource, ResourceIdentifier};
use crate::backup::item::Item;
use crate::backup::request::BackupRequest;
use crate::backup::selector::ResourceSelector;

/// Backs up the PersistentVolume a PersistentVolumeClaim is bound to
pub struct PvcAction;

#[async_trait]
impl ItemAction for PvcAction {
    fn name(&self) -> &str {
        "pvc-volume"
    }

    fn applies_to(&self) -> anyhow::Result<ResourceSelector> {
        Ok(ResourceSelector::for_resources(["persistentvolumeclaims"]))
    }

    async fn execute(
        &self,
        item: &Item,
        _request: &BackupRequest,
    ) -> Result<ActionOutput, ActionError> {
        // An unbound claim has no volume yet; nothing else to back up
        let volume_name = match item.get_str("spec.volumeName")? {
            Some(name) if !name.is_empty() => name,
            _ => {
                debug!(
                    action = self.name(),
                    namespace = item.namespace(),
                    name = ?item.name(),
                    "No spec.volumeName on PersistentVolumeClaim"
                );
                return Ok(ActionOutput::unchanged());
            }
        };

        debug!(
            action = self.name(),
            namespace = item.namespace(),
            name = ?item.name(),
            volume = %volume_name,
            "Adding bound PersistentVolume"
        );

        Ok(ActionOutput::unchanged().with_additional_items(vec![
            ResourceIdentifier::cluster_scoped(
                GroupResource::core("persistentvolumes"),
                volume_name,
            ),
        ]))
    }
}
