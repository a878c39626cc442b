// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Collaborators the backup processor reads from and writes to

use async_trait::async_trait;

use super::error::FetchError;
use super::identifier::ResourceIdentifier;
use super::item::Item;
use super::request::BackupRequest;

/// Where items come from (normally the cluster's API server)
#[async_trait]
pub trait ItemSource: Send + Sync {
    /// Identifiers of the items selected by the request's filters
    async fn list_roots(&self, request: &BackupRequest) -> anyhow::Result<Vec<ResourceIdentifier>>;

    /// Current state of one item
    async fn fetch(&self, id: &ResourceIdentifier) -> Result<Item, FetchError>;
}

/// Where finished items go
///
/// Called once per archived item, in emission order. Any error is fatal for the run.
#[async_trait]
pub trait ArchiveWriter: Send {
    async fn write(&mut self, id: &ResourceIdentifier, item: &Item) -> anyhow::Result<()>;
}
