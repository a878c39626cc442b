// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

use async_trait::async_trait;
use tracing::debug;

use crate::backup::action::{ActionOutput, ItemAction};
use crate::backup::error::ActionError;
use crate::backup::identifier::{GroupResource, ResourceIdentifier};
use crate::backup::item::{self, FieldError, Item};
use crate::backup::request::BackupRequest;
use crate::backup::selector::ResourceSelector;

/// Backs up the PersistentVolumeClaims mounted by a pod's volumes
pub struct PodVolumesAction;

/// Re-anchor an error from inside `spec.volumes[idx]` to the full path
fn in_volume(idx: usize, err: FieldError) -> FieldError {
    match err {
        FieldError::WrongType {
            path,
            expected,
            found,
        } => {
            let suffix = if path == "." {
                String::new()
            } else {
                format!(".{}", path)
            };
            FieldError::WrongType {
                path: format!("spec.volumes[{}]{}", idx, suffix),
                expected,
                found,
            }
        }
    }
}

#[async_trait]
impl ItemAction for PodVolumesAction {
    fn name(&self) -> &str {
        "pod-volumes"
    }

    fn applies_to(&self) -> anyhow::Result<ResourceSelector> {
        Ok(ResourceSelector::for_resources(["pods"]))
    }

    async fn execute(
        &self,
        pod: &Item,
        _request: &BackupRequest,
    ) -> Result<ActionOutput, ActionError> {
        let Some(volumes) = pod.get_array("spec.volumes")? else {
            return Ok(ActionOutput::unchanged());
        };

        let namespace = pod.namespace();
        let claims = GroupResource::core("persistentvolumeclaims");
        let mut additional: Vec<ResourceIdentifier> = Vec::new();

        for (idx, volume) in volumes.iter().enumerate() {
            let claim_name = item::get_str(volume, "persistentVolumeClaim.claimName")
                .map_err(|e| in_volume(idx, e))?;

            // Volumes of other types (configMap, emptyDir, ...) have no claim
            let Some(claim_name) = claim_name.filter(|n| !n.is_empty()) else {
                continue;
            };

            let id = ResourceIdentifier::new(claims.clone(), namespace, claim_name);
            if !additional.contains(&id) {
                additional.push(id);
            }
        }

        if !additional.is_empty() {
            debug!(
                action = self.name(),
                namespace = %namespace,
                name = ?pod.name(),
                claims = additional.len(),
                "Adding PersistentVolumeClaims mounted by pod"
            );
        }

        Ok(ActionOutput::unchanged().with_additional_items(additional))
    }
}
