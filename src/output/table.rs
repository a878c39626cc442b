// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

use std::borrow::Cow;

use comfy_table::{Table, presets::ASCII_BORDERS_ONLY_CONDENSED};

use super::RunSummary;

/// Maximum width of the error message column
const MAX_MESSAGE_WIDTH: usize = 80;

/// Truncate a string to max_len chars, adding "..." if truncated
fn truncate_value(s: &str, max_len: usize) -> Cow<'_, str> {
    if s.chars().count() <= max_len {
        Cow::Borrowed(s)
    } else {
        let truncated: String = s.chars().take(max_len.saturating_sub(3)).collect();
        Cow::Owned(format!("{}...", truncated))
    }
}

pub struct TableFormatter;

impl TableFormatter {
    pub fn format(summary: &RunSummary<'_>) -> String {
        let mut overview = Table::new();
        overview.load_preset(ASCII_BORDERS_ONLY_CONDENSED);
        overview.add_row(vec!["Backup", summary.name]);
        overview.add_row(vec!["Status".to_string(), summary.status.to_string()]);
        overview.add_row(vec!["Items".to_string(), summary.items_backed_up.to_string()]);
        overview.add_row(vec!["Errors".to_string(), summary.errors.len().to_string()]);
        overview.add_row(vec![
            "Location".to_string(),
            summary.location.display().to_string(),
        ]);
        overview.add_row(vec![
            "Duration".to_string(),
            format!("{:.1}s", summary.duration_ms() as f64 / 1000.0),
        ]);
        if let Some(failure) = summary.failure {
            overview.add_row(vec!["Failure", failure]);
        }

        if summary.errors.is_empty() {
            return overview.to_string();
        }

        let mut errors = Table::new();
        errors.load_preset(ASCII_BORDERS_ONLY_CONDENSED);
        errors.set_header(vec!["phase", "resource", "kind", "message"]);
        for (phase, id, detail) in summary.errors.iter() {
            errors.add_row(vec![
                Cow::Owned(phase.to_string()),
                Cow::Owned(id.to_string()),
                Cow::Owned(format!("{:?}", detail.kind)),
                truncate_value(&detail.message, MAX_MESSAGE_WIDTH),
            ]);
        }

        format!(
            "{}\n{}\n({} errors)",
            overview,
            errors,
            summary.errors.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::error::{ErrorKind, Phase};
    use crate::backup::{BackupStatus, ErrorList, GroupResource, ResourceIdentifier};
    use crate::output::tests::sample_result;
    use std::path::Path;

    #[test]
    fn test_truncate_value_short() {
        let result = truncate_value("hello", 10);
        assert_eq!(result, "hello");
        assert!(matches!(result, Cow::Borrowed(_)));
    }

    #[test]
    fn test_truncate_value_too_long() {
        let long = "this is a very long string that needs truncation";
        let result = truncate_value(long, 20);
        assert!(result.ends_with("..."));
        assert!(result.chars().count() <= 20);
        assert!(matches!(result, Cow::Owned(_)));
    }

    #[test]
    fn test_truncate_value_unicode() {
        let unicode = "日本語テストです長い文字列";
        let result = truncate_value(unicode, 8);
        assert!(result.chars().count() <= 8);
        assert!(result.ends_with("..."));
    }

    #[test]
    fn test_table_with_errors() {
        let result = sample_result();
        let output = TableFormatter::format(&RunSummary::new(&result, Path::new("/tmp/nightly")));

        assert!(output.contains("PartiallyFailed"));
        assert!(output.contains("/tmp/nightly"));
        assert!(output.contains("pods/default/ghost"));
        assert!(output.contains("action:pvc-volume"));
        assert!(output.contains("NotFound"));
        assert!(output.ends_with("(2 errors)"));
    }

    #[test]
    fn test_table_without_errors() {
        let mut result = sample_result();
        result.errors = Default::default();
        result.status = BackupStatus::Completed;

        let output = TableFormatter::format(&RunSummary::new(&result, Path::new("/tmp/nightly")));
        assert!(output.contains("Completed"));
        assert!(!output.contains("message"));
    }

    #[test]
    fn test_table_shows_failure() {
        let mut result = sample_result();
        result.status = BackupStatus::Failed;
        result.failure = Some("backup cancelled".to_string());

        let output = TableFormatter::format(&RunSummary::new(&result, Path::new("/tmp/nightly")));
        assert!(output.contains("backup cancelled"));
    }

    #[test]
    fn test_long_messages_are_truncated() {
        let mut result = sample_result();
        let mut errors = ErrorList::default();
        errors.record(
            Phase::Fetch,
            &ResourceIdentifier::new(GroupResource::core("pods"), "default", "a"),
            ErrorKind::Fetch,
            "x".repeat(200),
        );
        result.errors = errors;

        let output = TableFormatter::format(&RunSummary::new(&result, Path::new("/tmp/nightly")));
        assert!(!output.contains(&"x".repeat(200)));
        assert!(output.contains("..."));
    }
}
