//! Merging resolved template elements into an existing schema
//!
//! Strategies:
//! - Additive: existing elements are kept, elements sharing an id are combined
//! - Replace: existing elements sharing an id are dropped in favour of the template
//! - Selective: additive, but existing elements left with an unresolved
//!   high or critical conflict are dropped
//!
//! Inputs are never mutated and the output never holds two elements with the same id.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::{
    conflict_detector::Severity,
    conflict_resolver::UnresolvedConflict,
    models::SchemaElement,
};

/// Policy combining whole element sets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeStrategy {
    /// Keep existing elements, combine shared ids
    #[default]
    Additive,
    /// Template elements replace existing elements with the same id
    Replace,
    /// Additive, dropping existing elements with unresolved severe conflicts
    Selective,
}

impl MergeStrategy {
    /// Snake-case name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Additive => "additive",
            Self::Replace => "replace",
            Self::Selective => "selective",
        }
    }
}

/// Result of a merge
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MergeOutcome {
    /// Final element list
    pub elements: Vec<SchemaElement>,
    /// Warnings produced while merging
    pub warnings: Vec<String>,
}

/// Combine two elements with `existing` as the base
///
/// Identity (`id`, `kind`, `name`) and `properties.name` come from `existing`
/// when it has one; every other top-level property is taken from `incoming`,
/// except `validation` whose rule mappings are unioned with `incoming` winning
/// per key.
pub fn combine_elements(existing: &SchemaElement, incoming: &SchemaElement) -> SchemaElement {
    let mut merged = existing.clone();

    for (key, value) in &incoming.properties {
        match key.as_str() {
            "name" => {
                let has_name = matches!(
                    existing.properties.get("name"),
                    Some(Value::String(s)) if !s.is_empty()
                );
                if !has_name {
                    merged.properties.insert(key.clone(), value.clone());
                }
            }
            "validation" => {
                let combined = match (existing.properties.get("validation"), value) {
                    (Some(Value::Object(base)), Value::Object(rules)) => {
                        let mut union = base.clone();
                        for (rule, setting) in rules {
                            union.insert(rule.clone(), setting.clone());
                        }
                        Value::Object(union)
                    }
                    (Some(base), Value::Null) => base.clone(),
                    _ => value.clone(),
                };
                merged.properties.insert(key.clone(), combined);
            }
            _ => {
                merged.properties.insert(key.clone(), value.clone());
            }
        }
    }

    merged
}

/// Ordered element list keyed by id
#[derive(Default)]
struct ElementSet {
    elements: Vec<SchemaElement>,
    index: HashMap<String, usize>,
}

impl ElementSet {
    fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Push, or combine into the element already holding this id
    fn upsert_combine(&mut self, element: SchemaElement) {
        match self.index.get(&element.id) {
            Some(&pos) => {
                let combined = combine_elements(&self.elements[pos], &element);
                self.elements[pos] = combined;
            }
            None => self.push(element),
        }
    }

    /// Push, or overwrite the element already holding this id
    fn upsert_replace(&mut self, element: SchemaElement) {
        match self.index.get(&element.id) {
            Some(&pos) => self.elements[pos] = element,
            None => self.push(element),
        }
    }

    fn push(&mut self, element: SchemaElement) {
        self.index.insert(element.id.clone(), self.elements.len());
        self.elements.push(element);
    }

    fn into_elements(self) -> Vec<SchemaElement> {
        self.elements
    }
}

/// Merges resolved template elements into an existing schema
#[derive(Debug, Clone, Default)]
pub struct MergeEngine;

impl MergeEngine {
    /// Create a new merge engine
    pub fn new() -> Self {
        Self
    }

    /// Merge with no knowledge of unresolved conflicts
    pub fn merge(
        &self,
        existing: &[SchemaElement],
        resolved: &[SchemaElement],
        strategy: MergeStrategy,
        preserve_existing: bool,
    ) -> MergeOutcome {
        self.merge_with_unresolved(existing, resolved, strategy, preserve_existing, &[])
    }

    /// Merge, letting the selective strategy drop existing elements that were
    /// left with an unresolved high or critical conflict
    pub fn merge_with_unresolved(
        &self,
        existing: &[SchemaElement],
        resolved: &[SchemaElement],
        strategy: MergeStrategy,
        preserve_existing: bool,
        unresolved: &[UnresolvedConflict],
    ) -> MergeOutcome {
        let outcome = if !preserve_existing {
            let mut set = ElementSet::default();
            for element in resolved {
                set.upsert_replace(element.clone());
            }
            MergeOutcome {
                elements: set.into_elements(),
                warnings: Vec::new(),
            }
        } else {
            match strategy {
                MergeStrategy::Additive => self.merge_additive(existing, resolved, &BTreeMap::new()),
                MergeStrategy::Replace => self.merge_replace(existing, resolved),
                MergeStrategy::Selective => {
                    let mut dropped = BTreeMap::new();
                    for conflict in unresolved.iter().filter(|c| c.severity >= Severity::High) {
                        dropped
                            .entry(conflict.existing_id.clone())
                            .or_insert(conflict);
                    }
                    self.merge_additive(existing, resolved, &dropped)
                }
            }
        };

        debug!(
            strategy = strategy.as_str(),
            preserve_existing,
            existing = existing.len(),
            resolved = resolved.len(),
            merged = outcome.elements.len(),
            "Merge complete"
        );
        outcome
    }

    fn merge_additive(
        &self,
        existing: &[SchemaElement],
        resolved: &[SchemaElement],
        dropped: &BTreeMap<String, &UnresolvedConflict>,
    ) -> MergeOutcome {
        let mut set = ElementSet::default();
        let mut warnings = Vec::new();
        let mut processed: HashSet<&str> = HashSet::new();

        for element in existing {
            if let Some(conflict) = dropped.get(&element.id) {
                if !set.contains(&element.id) && processed.insert(element.id.as_str()) {
                    warnings.push(format!(
                        "Dropped existing element '{}' with unresolved {} conflict '{}'",
                        element.display_name(),
                        severity_label(conflict.severity),
                        conflict.conflict_id
                    ));
                }
                continue;
            }

            let mut current = element.clone();
            for incoming in resolved.iter().filter(|r| r.id == element.id) {
                current = combine_elements(&current, incoming);
            }
            processed.insert(element.id.as_str());
            set.upsert_combine(current);
        }

        for element in resolved {
            if processed.contains(element.id.as_str()) && !dropped.contains_key(&element.id) {
                continue;
            }
            set.upsert_combine(element.clone());
        }

        MergeOutcome {
            elements: set.into_elements(),
            warnings,
        }
    }

    fn merge_replace(&self, existing: &[SchemaElement], resolved: &[SchemaElement]) -> MergeOutcome {
        let replaced: HashSet<&str> = resolved.iter().map(|r| r.id.as_str()).collect();
        let mut set = ElementSet::default();

        for element in existing.iter().filter(|e| !replaced.contains(e.id.as_str())) {
            set.upsert_replace(element.clone());
        }
        for element in resolved {
            set.upsert_replace(element.clone());
        }

        MergeOutcome {
            elements: set.into_elements(),
            warnings: Vec::new(),
        }
    }
}

fn severity_label(severity: Severity) -> &'static str {
    match severity {
        Severity::Low => "low",
        Severity::Medium => "medium",
        Severity::High => "high",
        Severity::Critical => "critical",
    }
}
