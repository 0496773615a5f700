//! Conflict resolution for template elements
//!
//! Applies one resolution strategy per conflict, in detection order, to a
//! working copy of each template element:
//! - Merge: combine with the existing element (existing identity wins)
//! - Replace: template values stand
//! - Rename: pick the first free `<name>_<n>` and id `<id>_renamed_<n>`
//! - Skip: drop the element
//! - AskUser: without an override, degrades to skip with an unresolved warning
//!
//! Resolution never blocks; a human decision arrives as an override on the
//! next invocation.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
    conflict_detector::{Conflict, ResolutionStrategy, Severity},
    merge_engine::combine_elements,
    models::{normalize_name, SchemaElement},
};

/// A conflict left without a decision because it asked for user input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnresolvedConflict {
    /// Conflict id
    pub conflict_id: String,
    /// Existing element involved
    pub existing_id: String,
    /// Template element involved
    pub template_id: String,
    /// Conflict severity
    pub severity: Severity,
}

/// Result of resolving a set of template elements
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResolutionOutcome {
    /// Resolved elements, in template order, skipped ones omitted
    pub resolved_elements: Vec<SchemaElement>,
    /// Warnings for renames, skips and unresolved conflicts
    pub warnings: Vec<String>,
    /// Conflicts that degraded from ask-user to skip
    pub unresolved: Vec<UnresolvedConflict>,
}

/// Resolves detected conflicts
#[derive(Debug, Clone, Default)]
pub struct ConflictResolver;

impl ConflictResolver {
    /// Create a new conflict resolver
    pub fn new() -> Self {
        Self
    }

    /// Strategy that will actually be applied to a conflict
    ///
    /// An override wins over the suggestion; ask-user, suggested or
    /// overridden, resolves to skip.
    pub fn effective_strategy(
        &self,
        conflict: &Conflict,
        overrides: &HashMap<String, ResolutionStrategy>,
    ) -> ResolutionStrategy {
        let strategy = overrides
            .get(&conflict.id)
            .copied()
            .unwrap_or(conflict.suggested_resolution);
        match strategy {
            ResolutionStrategy::AskUser => ResolutionStrategy::Skip,
            other => other,
        }
    }

    /// Resolve conflicts for a list of template elements
    pub fn resolve(
        &self,
        template_elements: &[SchemaElement],
        existing: &[SchemaElement],
        conflicts: &[Conflict],
        overrides: &HashMap<String, ResolutionStrategy>,
    ) -> ResolutionOutcome {
        let mut by_template: HashMap<&str, Vec<&Conflict>> = HashMap::new();
        for conflict in conflicts {
            by_template
                .entry(conflict.template.id.as_str())
                .or_default()
                .push(conflict);
        }

        let mut taken: HashSet<String> = existing.iter().map(|e| e.normalized_name()).collect();
        let mut pending: HashMap<String, usize> = HashMap::new();
        for element in template_elements {
            *pending.entry(element.normalized_name()).or_default() += 1;
        }
        let mut outcome = ResolutionOutcome::default();

        for template_element in template_elements {
            if let Some(count) = pending.get_mut(&template_element.normalized_name()) {
                *count -= 1;
            }
            let element_conflicts = by_template
                .get(template_element.id.as_str())
                .map(Vec::as_slice)
                .unwrap_or_default();

            let resolved = self.resolve_element(
                template_element,
                element_conflicts,
                overrides,
                |name| taken.contains(name) || pending.get(name).is_some_and(|&c| c > 0),
                &mut outcome,
            );

            if let Some(element) = resolved {
                taken.insert(element.normalized_name());
                outcome.resolved_elements.push(element);
            }
        }

        debug!(
            resolved = outcome.resolved_elements.len(),
            warnings = outcome.warnings.len(),
            unresolved = outcome.unresolved.len(),
            "Conflict resolution complete"
        );
        outcome
    }

    fn resolve_element(
        &self,
        template_element: &SchemaElement,
        conflicts: &[&Conflict],
        overrides: &HashMap<String, ResolutionStrategy>,
        is_taken: impl Fn(&str) -> bool,
        outcome: &mut ResolutionOutcome,
    ) -> Option<SchemaElement> {
        let mut working = template_element.clone();
        let name = template_element.display_name().to_string();
        // Rename warnings only count if the element survives
        let mut renames = Vec::new();

        for conflict in conflicts {
            let strategy = match overrides.get(&conflict.id) {
                Some(strategy) => {
                    if !conflict.allowed_resolutions.contains(strategy) {
                        warn!(
                            conflict = %conflict.id,
                            strategy = strategy.as_str(),
                            "Override is not among the offered resolutions"
                        );
                    }
                    *strategy
                }
                None => conflict.suggested_resolution,
            };

            match strategy {
                ResolutionStrategy::Merge => {
                    working = combine_elements(&conflict.existing, &working);
                }
                ResolutionStrategy::Replace => {}
                ResolutionStrategy::Rename => {
                    let (renamed, new_name) = rename_element(&working, &template_element.id, &is_taken);
                    renames.push(format!(
                        "Renamed element '{}' to '{}' to avoid conflict",
                        working.display_name(),
                        new_name
                    ));
                    working = renamed;
                }
                ResolutionStrategy::Skip => {
                    outcome
                        .warnings
                        .push(format!("Skipped element '{}' due to conflict", name));
                    return None;
                }
                ResolutionStrategy::AskUser => {
                    warn!(
                        conflict = %conflict.id,
                        element = %name,
                        "Conflict needs a user decision, skipping element"
                    );
                    outcome.warnings.push(format!(
                        "Unresolved conflict '{}' for element '{}': awaiting user decision, element skipped",
                        conflict.id, name
                    ));
                    outcome.unresolved.push(UnresolvedConflict {
                        conflict_id: conflict.id.clone(),
                        existing_id: conflict.existing.id.clone(),
                        template_id: template_element.id.clone(),
                        severity: conflict.severity,
                    });
                    return None;
                }
            }
        }

        outcome.warnings.extend(renames);
        Some(working)
    }
}

/// Rename an element to the first `<name>_<n>` that is not taken
fn rename_element(
    element: &SchemaElement,
    template_id: &str,
    is_taken: impl Fn(&str) -> bool,
) -> (SchemaElement, String) {
    let base = element.display_name().to_string();
    let mut n = 1usize;
    let new_name = loop {
        let candidate = format!("{}_{}", base, n);
        if !is_taken(&normalize_name(&candidate)) {
            break candidate;
        }
        n += 1;
    };

    let mut renamed = element.clone();
    renamed.id = format!("{}_renamed_{}", template_id, n);
    renamed.name = new_name.clone();
    renamed
        .properties
        .insert("name".to_string(), new_name.clone().into());
    (renamed, new_name)
}
