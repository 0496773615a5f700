//! Property-based tests for conflict resolution
//!
//! Property: For any renamed template element, the new name SHALL NOT collide
//! with an existing name or with the name of any other resolved element.

use std::collections::{HashMap, HashSet};

use proptest::prelude::*;
use schemaforge_templates::{
    normalize_name, ConflictDetector, ConflictResolver, ResolutionStrategy, SchemaElement,
};

/// Strategy for generating names from a small pool so collisions are common
fn name_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        r"[a-c]{1,2}".prop_map(|s| s.to_string()),
        r"[a-c]{1,2}_[1-3]".prop_map(|s| s.to_string()),
    ]
}

/// Strategy for generating an existing schema with unique ids
fn existing_strategy() -> impl Strategy<Value = Vec<SchemaElement>> {
    prop::collection::vec(name_strategy(), 0..8).prop_map(|names| {
        names
            .into_iter()
            .enumerate()
            .map(|(i, n)| SchemaElement::field(format!("e{}", i), n))
            .collect()
    })
}

/// Strategy for generating template elements with unique ids
fn template_strategy() -> impl Strategy<Value = Vec<SchemaElement>> {
    prop::collection::vec(name_strategy(), 1..8).prop_map(|names| {
        names
            .into_iter()
            .enumerate()
            .map(|(i, n)| SchemaElement::field(format!("t{}", i), n))
            .collect()
    })
}

proptest! {
    /// Property: Renamed elements get fresh names
    ///
    /// Every renamed element's name is absent from the existing names and
    /// from every other resolved name, earlier or later in template order.
    #[test]
    fn prop_rename_never_collides(
        existing in existing_strategy(),
        template in template_strategy(),
    ) {
        let conflicts = ConflictDetector::new().detect_elements(&template, &existing);
        let outcome = ConflictResolver::new().resolve(&template, &existing, &conflicts, &HashMap::new());

        let existing_names: HashSet<String> = existing.iter().map(|e| e.normalized_name()).collect();
        for (i, element) in outcome.resolved_elements.iter().enumerate() {
            if !element.id.contains("_renamed_") {
                continue;
            }
            let name = element.normalized_name();
            prop_assert!(
                !existing_names.contains(&name),
                "Renamed element '{}' collides with an existing name",
                name
            );
            let clashes = outcome
                .resolved_elements
                .iter()
                .enumerate()
                .filter(|(j, other)| *j != i && other.normalized_name() == name)
                .count();
            prop_assert_eq!(clashes, 0, "Renamed element '{}' collides with a resolved name", name);
        }
    }

    /// Property: Every name conflict is settled by a rename by default
    ///
    /// Without type or constraint differences, nothing is skipped and every
    /// conflicting element comes back renamed.
    #[test]
    fn prop_default_resolution_keeps_all_elements(
        existing in existing_strategy(),
        template in template_strategy(),
    ) {
        let conflicts = ConflictDetector::new().detect_elements(&template, &existing);
        let outcome = ConflictResolver::new().resolve(&template, &existing, &conflicts, &HashMap::new());

        prop_assert_eq!(outcome.resolved_elements.len(), template.len());
        prop_assert_eq!(outcome.warnings.len(), conflicts.len());
        prop_assert!(outcome.unresolved.is_empty());
    }

    /// Property: Ask-user without an override degrades to skip
    ///
    /// Each element with a type conflict and no override is dropped and
    /// recorded as unresolved.
    #[test]
    fn prop_ask_user_degrades_to_skip(names in prop::collection::btree_set(r"[a-z]{1,6}", 1..6)) {
        let existing: Vec<_> = names
            .iter()
            .map(|n| SchemaElement::field(format!("{}_id", n), n.clone()).with_property("type", "string"))
            .collect();
        let template: Vec<_> = names
            .iter()
            .map(|n| SchemaElement::field(format!("{}_id", n), n.clone()).with_property("type", "number"))
            .collect();

        let conflicts = ConflictDetector::new().detect_elements(&template, &existing);
        let resolver = ConflictResolver::new();
        let outcome = resolver.resolve(&template, &existing, &conflicts, &HashMap::new());

        prop_assert!(outcome.resolved_elements.is_empty());
        prop_assert_eq!(outcome.unresolved.len(), template.len());

        let overrides: HashMap<String, ResolutionStrategy> = conflicts
            .iter()
            .map(|c| (c.id.clone(), ResolutionStrategy::Replace))
            .collect();
        let replaced = resolver.resolve(&template, &existing, &conflicts, &overrides);
        prop_assert_eq!(replaced.resolved_elements, template);
    }
}

#[test]
fn test_normalized_names_collide() {
    assert_eq!(normalize_name("First Name"), normalize_name("first_name"));
}
