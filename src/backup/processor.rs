// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Breadth-first expansion of a backup run.
//!
//! Starting from the root items selected by the request, every item is fetched,
//! passed through each matching action in registration order, and written to the
//! archive. Identifiers yielded by actions are appended to the queue unless they
//! were already enqueued during this run, so each resource is visited at most once
//! and items at depth d are archived before items at depth d+1. The request's
//! resource and namespace filters apply to referenced items as well as roots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::action::ActionRegistry;
use super::error::{ActionError, BackupError, ErrorKind, ErrorList, Phase};
use super::identifier::ResourceIdentifier;
use super::item::Item;
use super::request::BackupRequest;
use super::selector::ResourceSelector;
use super::source::{ArchiveWriter, ItemSource};
use crate::progress::ProgressHandle;

/// Default upper bound for a single action call
pub const DEFAULT_ACTION_TIMEOUT: Duration = Duration::from_secs(30);

/// Terminal state of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackupStatus {
    Completed,
    PartiallyFailed,
    Failed,
}

impl fmt::Display for BackupStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BackupStatus::Completed => "Completed",
            BackupStatus::PartiallyFailed => "PartiallyFailed",
            BackupStatus::Failed => "Failed",
        };
        write!(f, "{}", s)
    }
}

/// Outcome of one run
#[derive(Debug, Serialize)]
pub struct BackupResult {
    pub name: String,
    pub status: BackupStatus,
    pub items_backed_up: usize,
    pub errors: ErrorList,
    /// Run-wide fault that stopped the run, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

/// Cooperative cancellation, checked between items
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// State owned by a single run
#[derive(Default)]
struct RunState {
    queue: VecDeque<ResourceIdentifier>,
    seen: HashSet<ResourceIdentifier>,
    errors: ErrorList,
    archived: usize,
}

impl RunState {
    /// Append to the queue unless already enqueued in this run
    fn enqueue(&mut self, id: ResourceIdentifier) -> bool {
        if self.seen.contains(&id) {
            return false;
        }
        self.seen.insert(id.clone());
        self.queue.push_back(id);
        true
    }
}

/// Drives backup runs against a shared, immutable action registry
pub struct BackupProcessor {
    registry: Arc<ActionRegistry>,
    action_timeout: Duration,
    progress: Option<ProgressHandle>,
}

impl BackupProcessor {
    pub fn new(registry: Arc<ActionRegistry>) -> Self {
        Self {
            registry,
            action_timeout: DEFAULT_ACTION_TIMEOUT,
            progress: None,
        }
    }

    pub fn with_action_timeout(mut self, timeout: Duration) -> Self {
        self.action_timeout = timeout;
        self
    }

    pub fn with_progress(mut self, progress: ProgressHandle) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Execute one run. Never panics on item-level failures; those end up in the result.
    pub async fn run(
        &self,
        request: &BackupRequest,
        source: &dyn ItemSource,
        archive: &mut dyn ArchiveWriter,
        cancel: &CancellationFlag,
    ) -> BackupResult {
        let started_at = Utc::now();
        let start = Instant::now();
        let mut state = RunState::default();

        info!(
            backup = %request.name,
            actions = ?self.registry.names(),
            "Starting backup"
        );

        let outcome = self
            .drain(&mut state, request, source, archive, cancel)
            .await;

        let status = match &outcome {
            Err(_) => BackupStatus::Failed,
            Ok(()) if state.errors.is_empty() => BackupStatus::Completed,
            Ok(()) => BackupStatus::PartiallyFailed,
        };

        let failure = outcome.err().map(|e| {
            warn!(backup = %request.name, error = %e, "Backup aborted");
            e.to_string()
        });

        info!(
            backup = %request.name,
            status = %status,
            items = state.archived,
            errors = state.errors.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Backup finished"
        );

        if let Some(progress) = &self.progress {
            progress.run_finished(
                &status.to_string(),
                state.archived,
                state.errors.len(),
                start.elapsed().as_millis() as u64,
            );
        }

        BackupResult {
            name: request.name.clone(),
            status,
            items_backed_up: state.archived,
            errors: state.errors,
            failure,
            started_at,
            completed_at: Utc::now(),
        }
    }

    async fn drain(
        &self,
        state: &mut RunState,
        request: &BackupRequest,
        source: &dyn ItemSource,
        archive: &mut dyn ArchiveWriter,
        cancel: &CancellationFlag,
    ) -> Result<(), BackupError> {
        if let Some(progress) = &self.progress {
            progress.listing_roots();
        }

        let roots = source
            .list_roots(request)
            .await
            .map_err(BackupError::ListRoots)?;

        if let Some(progress) = &self.progress {
            progress.roots_listed(roots.len());
        }
        debug!(backup = %request.name, roots = roots.len(), "Listed root items");

        for id in roots {
            self.enqueue(state, id);
        }

        let selector = request.selector();

        while let Some(id) = state.queue.pop_front() {
            if cancel.is_cancelled() {
                return Err(BackupError::Cancelled);
            }

            if !admitted(request, &selector, &id) {
                debug!(resource = %id, "Skipping item excluded by the request");
                continue;
            }

            let item = match source.fetch(&id).await {
                Ok(item) => item,
                Err(e) => {
                    warn!(resource = %id, error = %e, "Skipping item that could not be fetched");
                    self.record_failure(state, Phase::Fetch, &id, e.kind(), e.to_string());
                    continue;
                }
            };

            let item = self.apply_actions(state, &id, item, request).await;

            archive
                .write(&id, &item)
                .await
                .map_err(|error| BackupError::Archive {
                    id: id.clone(),
                    error,
                })?;

            state.archived += 1;
            debug!(resource = %id, "Archived item");
            if let Some(progress) = &self.progress {
                progress.item_archived(&id.to_string());
            }
        }

        Ok(())
    }

    /// Run every matching action in registration order, threading the item through
    ///
    /// A failing action is recorded and skipped: its output is discarded and the next
    /// action sees the item as it was before the failure.
    async fn apply_actions(
        &self,
        state: &mut RunState,
        id: &ResourceIdentifier,
        item: Item,
        request: &BackupRequest,
    ) -> Item {
        let labels = item.labels();
        let mut current = item;

        for action in self
            .registry
            .matching(&id.group_resource, &id.namespace, &labels)
        {
            debug!(action = action.name(), resource = %id, "Executing item action");

            let result =
                match tokio::time::timeout(self.action_timeout, action.execute(&current, request))
                    .await
                {
                    Ok(result) => result,
                    Err(_) => Err(ActionError::Timeout(self.action_timeout)),
                };

            match result {
                Ok(output) => {
                    if let Some(modified) = output.item {
                        current = modified;
                    }
                    for additional in output.additional_items {
                        if self.enqueue(state, additional.clone()) {
                            debug!(
                                action = action.name(),
                                resource = %id,
                                additional = %additional,
                                "Enqueued referenced item"
                            );
                        }
                    }
                }
                Err(e) => {
                    warn!(action = action.name(), resource = %id, error = %e, "Item action failed");
                    self.record_failure(
                        state,
                        Phase::Action(action.name().to_string()),
                        id,
                        e.kind(),
                        e.to_string(),
                    );
                }
            }
        }

        current
    }

    fn enqueue(&self, state: &mut RunState, id: ResourceIdentifier) -> bool {
        let added = state.enqueue(id);
        if added && let Some(progress) = &self.progress {
            progress.item_enqueued();
        }
        added
    }

    fn record_failure(
        &self,
        state: &mut RunState,
        phase: Phase,
        id: &ResourceIdentifier,
        kind: ErrorKind,
        message: String,
    ) {
        if let Some(progress) = &self.progress {
            progress.item_failed(&id.to_string(), &phase.to_string());
        }
        state.errors.record(phase, id, kind, message);
    }
}

/// Whether the request's filters let an item into the backup
///
/// Labels are not checked here: they only narrow the listing of roots.
fn admitted(
    request: &BackupRequest,
    selector: &ResourceSelector,
    id: &ResourceIdentifier,
) -> bool {
    if id.is_cluster_scoped() && request.include_cluster_resources == Some(false) {
        return false;
    }
    selector.matches_resource(&id.group_resource) && selector.matches_namespace(&id.namespace)
}
