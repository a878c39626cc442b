// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Error taxonomy of a backup run.
//!
//! Per-item and per-action failures are soft: they are recorded in the run's
//! [`ErrorList`] and the queue keeps draining. Only [`BackupError`] aborts a run.

use serde::ser::{SerializeStruct, Serializer};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

use super::identifier::ResourceIdentifier;
use super::item::FieldError;

/// Failure returned by an item action
#[derive(Debug, Error)]
pub enum ActionError {
    #[error(transparent)]
    FieldType(#[from] FieldError),
    #[error("{0:#}")]
    Execution(anyhow::Error),
    #[error("action did not finish within {0:?}")]
    Timeout(Duration),
}

impl From<anyhow::Error> for ActionError {
    fn from(error: anyhow::Error) -> Self {
        ActionError::Execution(error)
    }
}

impl ActionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ActionError::FieldType(_) => ErrorKind::FieldType,
            ActionError::Execution(_) | ActionError::Timeout(_) => ErrorKind::ActionExecution,
        }
    }
}

/// Failure to fetch an item from the cluster
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("{0} not found")]
    NotFound(ResourceIdentifier),
    #[error("failed to fetch {id}: {error:#}")]
    Other {
        id: ResourceIdentifier,
        error: anyhow::Error,
    },
}

impl FetchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FetchError::NotFound(_) => ErrorKind::NotFound,
            FetchError::Other { .. } => ErrorKind::Fetch,
        }
    }
}

/// Run-wide fault; the run stops immediately with status `Failed`
#[derive(Debug, Error)]
pub enum BackupError {
    #[error("failed to list items to back up: {0:#}")]
    ListRoots(anyhow::Error),
    #[error("failed to write {id} to the archive: {error:#}")]
    Archive {
        id: ResourceIdentifier,
        error: anyhow::Error,
    },
    #[error("backup cancelled")]
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    NotFound,
    Fetch,
    FieldType,
    ActionExecution,
}

/// Where in the pipeline an error happened
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Phase {
    Fetch,
    Action(String),
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Fetch => write!(f, "fetch"),
            Phase::Action(name) => write!(f, "action:{}", name),
        }
    }
}

impl Serialize for Phase {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorDetail {
    pub kind: ErrorKind,
    pub message: String,
}

/// Soft errors of one run, keyed by (phase, identifier)
///
/// Only grows while the run is in progress.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorList {
    entries: BTreeMap<(Phase, ResourceIdentifier), Vec<ErrorDetail>>,
}

impl ErrorList {
    pub fn record(
        &mut self,
        phase: Phase,
        id: &ResourceIdentifier,
        kind: ErrorKind,
        message: impl Into<String>,
    ) {
        self.entries
            .entry((phase, id.clone()))
            .or_default()
            .push(ErrorDetail {
                kind,
                message: message.into(),
            });
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total number of recorded errors (an entry may hold several)
    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    #[cfg(test)]
    pub fn get(&self, phase: &Phase, id: &ResourceIdentifier) -> Option<&[ErrorDetail]> {
        self.entries
            .get(&(phase.clone(), id.clone()))
            .map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Phase, &ResourceIdentifier, &ErrorDetail)> {
        self.entries
            .iter()
            .flat_map(|((phase, id), details)| details.iter().map(move |d| (phase, id, d)))
    }
}

struct ErrorEntry<'a> {
    phase: &'a Phase,
    id: &'a ResourceIdentifier,
    detail: &'a ErrorDetail,
}

impl Serialize for ErrorEntry<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("ErrorEntry", 4)?;
        s.serialize_field("phase", self.phase)?;
        s.serialize_field("resource", &self.id.to_string())?;
        s.serialize_field("kind", &self.detail.kind)?;
        s.serialize_field("message", &self.detail.message)?;
        s.end()
    }
}

impl Serialize for ErrorList {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(
            self.iter()
                .map(|(phase, id, detail)| ErrorEntry { phase, id, detail }),
        )
    }
}
