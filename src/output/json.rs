// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

use super::RunSummary;

pub struct JsonFormatter;

impl JsonFormatter {
    pub fn format(summary: &RunSummary<'_>) -> String {
        serde_json::to_string_pretty(summary).unwrap_or_else(|_| "{}".to_string())
    }
}
