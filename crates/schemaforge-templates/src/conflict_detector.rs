//! Conflict detection between template elements and an existing schema
//!
//! Classifies every discrepancy between a template's elements and the elements
//! already present in the working schema:
//! - Name: same normalized `properties.name`, different id
//! - Content: same id, different properties
//! - Type: same normalized name, different `properties.type`
//! - Constraint: template tightens `required` or `unique`
//!
//! A single pair of elements may produce several conflicts.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::{SchemaElement, Template};

/// Kind of a detected conflict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    /// Name already used by another element
    Name,
    /// Declared types differ
    Type,
    /// Same element id with different properties
    Content,
    /// Template tightens a constraint
    Constraint,
}

impl ConflictKind {
    /// Snake-case name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Type => "type",
            Self::Content => "content",
            Self::Constraint => "constraint",
        }
    }
}

/// Severity of a conflict, ordered from least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Cosmetic
    Low,
    /// Needs a decision, safe default exists
    Medium,
    /// Changes existing semantics
    High,
    /// Cannot be applied without a human decision
    Critical,
}

/// Policy settling one conflict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStrategy {
    /// Combine existing and template properties
    Merge,
    /// Template values stand
    Replace,
    /// Give the template element a fresh name and id
    Rename,
    /// Drop the template element
    Skip,
    /// Defer to a human; degrades to skip without an override
    AskUser,
}

impl ResolutionStrategy {
    /// Snake-case name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Merge => "merge",
            Self::Replace => "replace",
            Self::Rename => "rename",
            Self::Skip => "skip",
            Self::AskUser => "ask_user",
        }
    }
}

/// A discrepancy between a template element and an existing element
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conflict {
    /// Stable id, usable as a resolution override key
    pub id: String,
    /// Conflict kind
    pub kind: ConflictKind,
    /// Existing element involved
    pub existing: SchemaElement,
    /// Template element involved
    pub template: SchemaElement,
    /// Severity
    pub severity: Severity,
    /// Human-readable description
    pub description: String,
    /// Strategy applied when no override is given
    pub suggested_resolution: ResolutionStrategy,
    /// Strategies offered to the user
    pub allowed_resolutions: Vec<ResolutionStrategy>,
}

/// Detects conflicts between a template and an existing schema
#[derive(Debug, Clone, Default)]
pub struct ConflictDetector;

impl ConflictDetector {
    /// Create a new conflict detector
    pub fn new() -> Self {
        Self
    }

    /// Detect conflicts for every element of a template
    pub fn detect(&self, template: &Template, existing: &[SchemaElement]) -> Vec<Conflict> {
        self.detect_elements(&template.elements, existing)
    }

    /// Detect conflicts for a list of template elements
    ///
    /// When several existing elements share a normalized name, the last one
    /// in schema order is the match.
    pub fn detect_elements(
        &self,
        template_elements: &[SchemaElement],
        existing: &[SchemaElement],
    ) -> Vec<Conflict> {
        let mut by_name: HashMap<String, &SchemaElement> = HashMap::new();
        let mut by_id: HashMap<&str, &SchemaElement> = HashMap::new();
        for element in existing {
            by_name.insert(element.normalized_name(), element);
            by_id.entry(element.id.as_str()).or_insert(element);
        }

        let mut conflicts = Vec::new();
        for template_element in template_elements {
            let name_match = by_name.get(&template_element.normalized_name()).copied();
            let id_match = by_id.get(template_element.id.as_str()).copied();

            if let Some(existing_element) = name_match {
                if existing_element.id != template_element.id {
                    conflicts.push(name_conflict(template_element, existing_element));
                }
            }

            if let Some(existing_element) = id_match {
                if existing_element.properties != template_element.properties {
                    conflicts.push(content_conflict(template_element, existing_element));
                }
            }

            if let Some(existing_element) = name_match {
                if existing_element.declared_type() != template_element.declared_type() {
                    conflicts.push(type_conflict(template_element, existing_element));
                }
                conflicts.extend(constraint_conflicts(template_element, existing_element));
            }
        }

        debug!(
            template_elements = template_elements.len(),
            existing_elements = existing.len(),
            conflicts = conflicts.len(),
            "Conflict detection complete"
        );
        conflicts
    }

    /// Highest severity among a set of conflicts
    pub fn max_severity(&self, conflicts: &[Conflict]) -> Option<Severity> {
        conflicts.iter().map(|c| c.severity).max()
    }
}

fn name_conflict(template: &SchemaElement, existing: &SchemaElement) -> Conflict {
    Conflict {
        id: format!("name_conflict_{}", template.id),
        kind: ConflictKind::Name,
        existing: existing.clone(),
        template: template.clone(),
        severity: Severity::Medium,
        description: format!("Field name '{}' already exists", template.display_name()),
        suggested_resolution: ResolutionStrategy::Rename,
        allowed_resolutions: vec![
            ResolutionStrategy::Rename,
            ResolutionStrategy::Replace,
            ResolutionStrategy::Skip,
        ],
    }
}

fn content_conflict(template: &SchemaElement, existing: &SchemaElement) -> Conflict {
    Conflict {
        id: format!("content_conflict_{}", template.id),
        kind: ConflictKind::Content,
        existing: existing.clone(),
        template: template.clone(),
        severity: Severity::High,
        description: format!("Element '{}' has different properties", template.display_name()),
        suggested_resolution: ResolutionStrategy::Merge,
        allowed_resolutions: vec![
            ResolutionStrategy::Merge,
            ResolutionStrategy::Replace,
            ResolutionStrategy::AskUser,
        ],
    }
}

fn type_conflict(template: &SchemaElement, existing: &SchemaElement) -> Conflict {
    Conflict {
        id: format!("type_conflict_{}", template.id),
        kind: ConflictKind::Type,
        existing: existing.clone(),
        template: template.clone(),
        severity: Severity::Critical,
        description: format!(
            "Type mismatch: existing '{}' vs template '{}'",
            type_label(existing),
            type_label(template)
        ),
        suggested_resolution: ResolutionStrategy::AskUser,
        allowed_resolutions: vec![
            ResolutionStrategy::Replace,
            ResolutionStrategy::Skip,
            ResolutionStrategy::AskUser,
        ],
    }
}

fn constraint_conflicts(template: &SchemaElement, existing: &SchemaElement) -> Vec<Conflict> {
    let mut conflicts = Vec::new();

    if template.flag("required") && !existing.flag("required") {
        conflicts.push(Conflict {
            id: format!("constraint_required_{}", template.id),
            kind: ConflictKind::Constraint,
            existing: existing.clone(),
            template: template.clone(),
            severity: Severity::Medium,
            description: format!(
                "Template requires '{}' to be required, but existing field is optional",
                template.display_name()
            ),
            suggested_resolution: ResolutionStrategy::Merge,
            allowed_resolutions: vec![ResolutionStrategy::Merge, ResolutionStrategy::Skip],
        });
    }

    if template.flag("unique") && !existing.flag("unique") {
        conflicts.push(Conflict {
            id: format!("constraint_unique_{}", template.id),
            kind: ConflictKind::Constraint,
            existing: existing.clone(),
            template: template.clone(),
            severity: Severity::High,
            description: format!(
                "Template requires '{}' to be unique, but existing field is not",
                template.display_name()
            ),
            suggested_resolution: ResolutionStrategy::Merge,
            allowed_resolutions: vec![ResolutionStrategy::Merge, ResolutionStrategy::Skip],
        });
    }

    conflicts
}

fn type_label(element: &SchemaElement) -> String {
    match element.declared_type() {
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => "unspecified".to_string(),
    }
}
