// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Rendering of a finished backup run

mod json;
mod table;
mod yaml;

pub use json::JsonFormatter;
pub use table::TableFormatter;
pub use yaml::YamlFormatter;

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;

use crate::backup::{BackupResult, BackupStatus, ErrorList};
use crate::cli::OutputFormat;

/// What gets printed once a run is over
#[derive(Debug, Serialize)]
pub struct RunSummary<'a> {
    pub name: &'a str,
    pub status: BackupStatus,
    pub items_backed_up: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<&'a str>,
    pub location: &'a Path,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub errors: &'a ErrorList,
}

impl<'a> RunSummary<'a> {
    pub fn new(result: &'a BackupResult, location: &'a Path) -> Self {
        Self {
            name: &result.name,
            status: result.status,
            items_backed_up: result.items_backed_up,
            failure: result.failure.as_deref(),
            location,
            started_at: result.started_at,
            completed_at: result.completed_at,
            errors: &result.errors,
        }
    }

    pub fn format(&self, format: &OutputFormat) -> String {
        match format {
            OutputFormat::Table => TableFormatter::format(self),
            OutputFormat::Json => JsonFormatter::format(self),
            OutputFormat::Yaml => YamlFormatter::format(self),
        }
    }

    pub fn duration_ms(&self) -> i64 {
        (self.completed_at - self.started_at).num_milliseconds()
    }
}
