// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Resource selection: include/exclude lists over kinds and namespaces plus label selectors.
//!
//! Rules shared by every dimension:
//! - An empty include list matches everything
//! - `*` matches everything
//! - An exclude entry always wins over a matching include entry

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use super::identifier::GroupResource;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LabelSelectorError {
    #[error("invalid label selector requirement '{0}'")]
    InvalidRequirement(String),
    #[error("empty value list in label selector requirement '{0}'")]
    EmptyValues(String),
}

/// A single label requirement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Requirement {
    Equals(String, String),
    NotEquals(String, String),
    In(String, Vec<String>),
    NotIn(String, Vec<String>),
    Exists(String),
    DoesNotExist(String),
}

impl Requirement {
    fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        match self {
            Requirement::Equals(k, v) => labels.get(k) == Some(v),
            // Absent keys satisfy negative requirements
            Requirement::NotEquals(k, v) => labels.get(k) != Some(v),
            Requirement::In(k, vs) => labels.get(k).is_some_and(|actual| vs.contains(actual)),
            Requirement::NotIn(k, vs) => labels.get(k).is_none_or(|actual| !vs.contains(actual)),
            Requirement::Exists(k) => labels.contains_key(k),
            Requirement::DoesNotExist(k) => !labels.contains_key(k),
        }
    }

    fn parse(raw: &str) -> Result<Self, LabelSelectorError> {
        let invalid = || LabelSelectorError::InvalidRequirement(raw.to_string());
        let req = raw.trim();

        if let Some(key) = req.strip_prefix('!') {
            return Ok(Requirement::DoesNotExist(valid_key(key.trim()).ok_or_else(invalid)?));
        }

        // Set-based: "key in (a,b)" / "key notin (a,b)"
        if let Some(open) = req.find('(') {
            let inner = req[open + 1..].strip_suffix(')').ok_or_else(invalid)?;
            let mut head = req[..open].split_whitespace();
            let key = head.next().and_then(valid_key).ok_or_else(invalid)?;
            let op = head.next().ok_or_else(invalid)?;
            if head.next().is_some() {
                return Err(invalid());
            }

            let values: Vec<String> = inner
                .split(',')
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(String::from)
                .collect();
            if values.is_empty() {
                return Err(LabelSelectorError::EmptyValues(raw.to_string()));
            }

            return match op {
                "in" => Ok(Requirement::In(key, values)),
                "notin" => Ok(Requirement::NotIn(key, values)),
                _ => Err(invalid()),
            };
        }

        if let Some((k, v)) = req.split_once("!=") {
            let key = valid_key(k.trim()).ok_or_else(invalid)?;
            return Ok(Requirement::NotEquals(key, v.trim().to_string()));
        }

        if let Some((k, v)) = req.split_once('=') {
            let key = valid_key(k.trim()).ok_or_else(invalid)?;
            // "==" is accepted as a synonym of "="
            let value = v.strip_prefix('=').unwrap_or(v).trim();
            if value.contains('=') {
                return Err(invalid());
            }
            return Ok(Requirement::Equals(key, value.to_string()));
        }

        Ok(Requirement::Exists(valid_key(req).ok_or_else(invalid)?))
    }
}

fn valid_key(key: &str) -> Option<String> {
    let ok = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/'));
    ok.then(|| key.to_string())
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Requirement::Equals(k, v) => write!(f, "{}={}", k, v),
            Requirement::NotEquals(k, v) => write!(f, "{}!={}", k, v),
            Requirement::In(k, vs) => write!(f, "{} in ({})", k, vs.join(",")),
            Requirement::NotIn(k, vs) => write!(f, "{} notin ({})", k, vs.join(",")),
            Requirement::Exists(k) => write!(f, "{}", k),
            Requirement::DoesNotExist(k) => write!(f, "!{}", k),
        }
    }
}

/// Conjunction of label requirements, in Kubernetes selector syntax
///
/// Renders back to the canonical string so it can be pushed down to list calls.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LabelSelector {
    requirements: Vec<Requirement>,
}

impl LabelSelector {
    pub fn new(requirements: Vec<Requirement>) -> Self {
        Self { requirements }
    }

    pub fn requirements(&self) -> &[Requirement] {
        &self.requirements
    }

    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }

    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        self.requirements.iter().all(|r| r.matches(labels))
    }
}

/// Split on commas outside of parentheses
fn split_requirements(s: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;

    for (idx, c) in s.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&s[start..idx]);
                start = idx + 1;
            }
            _ => {}
        }
    }
    parts.push(&s[start..]);
    parts
}

impl FromStr for LabelSelector {
    type Err = LabelSelectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Ok(Self::default());
        }
        let requirements = split_requirements(s)
            .into_iter()
            .map(Requirement::parse)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { requirements })
    }
}

impl TryFrom<String> for LabelSelector {
    type Error = LabelSelectorError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<LabelSelector> for String {
    fn from(selector: LabelSelector) -> Self {
        selector.to_string()
    }
}

impl fmt::Display for LabelSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.requirements.iter().map(|r| r.to_string()).collect();
        write!(f, "{}", parts.join(","))
    }
}

/// Declarative predicate over resource kind, namespace and labels
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSelector {
    #[serde(default)]
    pub included_resources: Vec<String>,
    #[serde(default)]
    pub excluded_resources: Vec<String>,
    #[serde(default)]
    pub included_namespaces: Vec<String>,
    #[serde(default)]
    pub excluded_namespaces: Vec<String>,
    #[serde(default)]
    pub label_selector: Option<LabelSelector>,
}

/// Two-sided include/exclude evaluation shared by all dimensions
fn include_exclude(includes: &[String], excludes: &[String], matches: impl Fn(&str) -> bool) -> bool {
    let hit = |entry: &String| entry == "*" || matches(entry);
    if excludes.iter().any(hit) {
        return false;
    }
    includes.is_empty() || includes.iter().any(hit)
}

impl ResourceSelector {
    /// Selector matching a list of resources in `resource[.group]` notation
    pub fn for_resources<I, S>(resources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            included_resources: resources.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// Kind dimension; entries name the whole group resource, so a bare `pods` is the
    /// core kind only and never `pods.metrics.k8s.io`
    pub fn matches_resource(&self, group_resource: &GroupResource) -> bool {
        let full = group_resource.to_string();
        include_exclude(&self.included_resources, &self.excluded_resources, |entry| {
            entry.eq_ignore_ascii_case(&full)
        })
    }

    /// Namespace dimension; cluster-scoped resources (empty namespace) always pass
    pub fn matches_namespace(&self, namespace: &str) -> bool {
        if namespace.is_empty() {
            return true;
        }
        include_exclude(&self.included_namespaces, &self.excluded_namespaces, |entry| {
            entry == namespace
        })
    }

    pub fn matches_labels(&self, labels: &BTreeMap<String, String>) -> bool {
        self.label_selector
            .as_ref()
            .is_none_or(|selector| selector.matches(labels))
    }

    pub fn matches(
        &self,
        group_resource: &GroupResource,
        namespace: &str,
        labels: &BTreeMap<String, String>,
    ) -> bool {
        self.matches_resource(group_resource)
            && self.matches_namespace(namespace)
            && self.matches_labels(labels)
    }
}
