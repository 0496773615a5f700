//! Structural impact assessment
//!
//! A heuristic estimate of how much a template application grows a schema.
//! It is not a performance prediction.

use serde::{Deserialize, Serialize};

use crate::models::{ElementKind, SchemaElement};

/// Coarse impact grade
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImpactLevel {
    /// Growth of at most 20%
    Low,
    /// Growth of at most 50%
    Medium,
    /// Anything larger
    High,
}

impl ImpactLevel {
    /// Snake-case name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

/// Structural deltas between two element sets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactMetrics {
    /// Change in element count
    pub element_count_change: i64,
    /// Change in field count
    pub field_count_change: i64,
    /// Change in relationship count
    pub relationship_count_change: i64,
    /// Change in complexity score
    pub complexity_increase: f64,
}

impl ImpactMetrics {
    /// Metrics as ordered `(key, value)` pairs, for reports
    pub fn entries(&self) -> [(&'static str, String); 4] {
        [
            ("element_count_change", self.element_count_change.to_string()),
            ("field_count_change", self.field_count_change.to_string()),
            ("relationship_count_change", self.relationship_count_change.to_string()),
            ("complexity_increase", self.complexity_increase.to_string()),
        ]
    }
}

/// Impact grade with the metrics behind it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactAssessment {
    /// Coarse grade
    pub estimated_impact: ImpactLevel,
    /// Underlying metrics
    pub metrics: ImpactMetrics,
}

/// Computes structural impact between a schema before and after a change
#[derive(Debug, Clone, Default)]
pub struct ImpactAssessor;

impl ImpactAssessor {
    /// Create a new impact assessor
    pub fn new() -> Self {
        Self
    }

    /// Assess the impact of going from `before` to `after`
    pub fn assess(&self, before: &[SchemaElement], after: &[SchemaElement]) -> ImpactAssessment {
        let metrics = ImpactMetrics {
            element_count_change: after.len() as i64 - before.len() as i64,
            field_count_change: count_kind(after, ElementKind::Field)
                - count_kind(before, ElementKind::Field),
            relationship_count_change: count_kind(after, ElementKind::Relationship)
                - count_kind(before, ElementKind::Relationship),
            complexity_increase: self.complexity(after) - self.complexity(before),
        };

        ImpactAssessment {
            estimated_impact: self.estimate(before.len(), after.len()),
            metrics,
        }
    }

    /// Grade the relative growth in element count
    pub fn estimate(&self, before: usize, after: usize) -> ImpactLevel {
        let ratio = (after as f64 - before as f64) / before.max(1) as f64;
        if ratio <= 0.2 {
            ImpactLevel::Low
        } else if ratio <= 0.5 {
            ImpactLevel::Medium
        } else {
            ImpactLevel::High
        }
    }

    /// Complexity score of an element set
    ///
    /// Each element counts 1; fields add 1 for validation rules, 1 for
    /// uniqueness and 0.5 when required; relationships add 2.
    pub fn complexity(&self, elements: &[SchemaElement]) -> f64 {
        elements
            .iter()
            .map(|element| {
                let mut score = 1.0;
                match element.kind {
                    ElementKind::Field => {
                        if element.has_validation_rules() {
                            score += 1.0;
                        }
                        if element.flag("unique") {
                            score += 1.0;
                        }
                        if element.flag("required") {
                            score += 0.5;
                        }
                    }
                    ElementKind::Relationship => score += 2.0,
                    _ => {}
                }
                score
            })
            .sum()
    }
}

fn count_kind(elements: &[SchemaElement], kind: ElementKind) -> i64 {
    elements.iter().filter(|e| e.kind == kind).count() as i64
}
