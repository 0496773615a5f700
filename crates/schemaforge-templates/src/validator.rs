//! Post-merge schema validation hooks

use std::collections::HashSet;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::models::{ElementKind, SchemaElement, Template};

/// Outcome of validating a merged schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationOutcome {
    /// Whether the schema is acceptable
    pub valid: bool,
    /// Errors that make the schema unacceptable
    pub errors: Vec<String>,
    /// Non-blocking findings
    pub warnings: Vec<String>,
}

impl ValidationOutcome {
    /// A passing outcome with no findings
    pub fn passed() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }
}

impl Default for ValidationOutcome {
    fn default() -> Self {
        Self::passed()
    }
}

/// Validates a merged schema before the application commits
///
/// Implementations must be pure: they see the merged elements and the
/// template being applied and report, they never modify either.
pub trait SchemaValidator: Send + Sync {
    /// Validate the merged elements
    fn validate(&self, elements: &[SchemaElement], template: &Template) -> ValidationOutcome;
}

/// Accepts every schema
#[derive(Debug, Clone, Default)]
pub struct AcceptAllValidator;

impl SchemaValidator for AcceptAllValidator {
    fn validate(&self, _elements: &[SchemaElement], _template: &Template) -> ValidationOutcome {
        ValidationOutcome::passed()
    }
}

/// Checks structural well-formedness of a merged schema
///
/// - element ids are unique
/// - display names are identifiers (`[A-Za-z_][A-Za-z0-9_]*`)
/// - relationships name a `target`
pub struct StructuralValidator {
    name_pattern: Option<Regex>,
}

impl StructuralValidator {
    /// Create a validator with the default identifier rule
    pub fn new() -> Self {
        Self { name_pattern: None }
    }

    /// Create a validator with a custom name pattern
    pub fn with_name_pattern(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            name_pattern: Some(Regex::new(pattern)?),
        })
    }

    fn is_valid_name(&self, name: &str) -> bool {
        match &self.name_pattern {
            Some(pattern) => pattern.is_match(name),
            None => is_identifier(name),
        }
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

impl Default for StructuralValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaValidator for StructuralValidator {
    fn validate(&self, elements: &[SchemaElement], _template: &Template) -> ValidationOutcome {
        let mut outcome = ValidationOutcome::passed();
        let mut seen = HashSet::new();

        for element in elements {
            if !seen.insert(element.id.as_str()) {
                outcome.errors.push(format!("Duplicate element id '{}'", element.id));
            }

            let name = element.display_name();
            if name.is_empty() {
                outcome.errors.push(format!("Element '{}' has no name", element.id));
            } else if !self.is_valid_name(name) {
                outcome.errors.push(format!(
                    "Element '{}' has invalid name '{}'",
                    element.id, name
                ));
            }

            if element.kind == ElementKind::Relationship
                && element.property("target").and_then(|t| t.as_str()).is_none()
            {
                outcome.errors.push(format!(
                    "Relationship '{}' does not name a target",
                    name
                ));
            }

            if element.kind == ElementKind::Field && element.declared_type().is_none() {
                outcome
                    .warnings
                    .push(format!("Field '{}' has no declared type", name));
            }
        }

        outcome.valid = outcome.errors.is_empty();
        outcome
    }
}
