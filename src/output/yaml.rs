// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

use super::RunSummary;

pub struct YamlFormatter;

impl YamlFormatter {
    pub fn format(summary: &RunSummary<'_>) -> String {
        serde_yaml::to_string(summary).unwrap_or_else(|_| "{}".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::tests::sample_result;
    use std::path::Path;

    #[test]
    fn test_yaml_summary() {
        let result = sample_result();
        let output = YamlFormatter::format(&RunSummary::new(&result, Path::new("/tmp/nightly")));
        let value: serde_yaml::Value = serde_yaml::from_str(&output).unwrap();

        assert_eq!(value["status"].as_str(), Some("PartiallyFailed"));
        assert_eq!(value["items_backed_up"].as_u64(), Some(7));
        assert_eq!(value["errors"][0]["phase"].as_str(), Some("fetch"));
        assert_eq!(value["errors"][1]["phase"].as_str(), Some("action:pvc-volume"));
    }
}
