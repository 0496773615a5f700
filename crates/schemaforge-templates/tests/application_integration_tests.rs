//! Integration tests for template application
//!
//! Drives detection, resolution, merging, validation and rollback together
//! through the public application API.

use std::sync::Arc;

use serde_json::json;
use schemaforge_templates::{
    generate_application_report, ApplicationConfig, ApplicationEngine, ApplicationState,
    ConflictKind, ImpactLevel, MergeStrategy, ResolutionStrategy, SchemaElement,
    StructuralValidator, Template, TemplateCatalog, TemplateCategory, TemplateComplexity,
};

fn template(elements: Vec<SchemaElement>) -> Template {
    Template::new(
        "integration",
        "Integration Template",
        TemplateCategory::UserManagement,
        TemplateComplexity::Basic,
    )
    .with_elements(elements)
}

#[test]
fn test_clean_apply_onto_empty_schema() {
    let tpl = template(vec![SchemaElement::field("t1", "id")
        .with_property("type", "uuid")
        .with_property("primary_key", true)]);

    let result = ApplicationEngine::new().apply_template(&tpl, &[], &ApplicationConfig::default());

    assert!(result.success);
    assert_eq!(result.applied_elements.len(), 1);
    assert_eq!(result.applied_elements[0].id, "t1");
    assert_eq!(result.applied_elements[0].property("primary_key"), Some(&json!(true)));
    assert!(result.conflicts.is_none());
    assert_eq!(
        result.performance_impact.as_ref().map(|p| p.estimated_impact),
        Some(ImpactLevel::High)
    );
}

#[test]
fn test_constraint_conflict_skipped() {
    let existing = vec![SchemaElement::field("e1", "status")
        .with_property("type", "string")
        .with_property("required", false)];
    let tpl = template(vec![
        SchemaElement::field("t1", "status")
            .with_property("type", "string")
            .with_property("required", true),
        SchemaElement::field("t2", "created_at").with_property("type", "datetime"),
    ]);
    let config = ApplicationConfig::default()
        .with_override("constraint_required_t1", ResolutionStrategy::Skip);

    let result = ApplicationEngine::new().apply_template(&tpl, &existing, &config);

    assert!(result.success);
    assert!(result.applied_elements.iter().all(|e| e.id != "t1"));
    assert_eq!(result.applied_elements.len(), 1);
    let mentions: Vec<_> = result
        .warnings
        .iter()
        .filter(|w| w.contains("'status'"))
        .collect();
    assert_eq!(mentions.len(), 1);

    let conflicts = result.conflicts.unwrap();
    let constraint = conflicts
        .iter()
        .find(|c| c.kind == ConflictKind::Constraint)
        .unwrap();
    assert_eq!(constraint.resolution, ResolutionStrategy::Skip);
}

#[test]
fn test_ask_user_override_reported_as_skip() {
    let existing = vec![SchemaElement::field("t1", "status").with_property("type", "string")];
    let tpl = template(vec![SchemaElement::field("t1", "status").with_property("type", "enum")]);
    let config = ApplicationConfig::default()
        .with_override("content_conflict_t1", ResolutionStrategy::AskUser);

    let result = ApplicationEngine::new().apply_template(&tpl, &existing, &config);

    assert!(result.success);
    assert!(result.applied_elements.is_empty());
    let conflicts = result.conflicts.unwrap();
    let content = conflicts
        .iter()
        .find(|c| c.kind == ConflictKind::Content)
        .unwrap();
    assert_eq!(content.resolution, ResolutionStrategy::Skip);
    assert!(result.warnings.iter().any(|w| w.starts_with("Unresolved conflict 'content_conflict_t1'")));
}

#[test]
fn test_merge_resolution_uses_existing_identity() {
    let existing = vec![SchemaElement::field("e1", "email")
        .with_property("type", "string")
        .with_property("validation", json!({"maxLength": 100}))];
    let tpl = template(vec![SchemaElement::field("t1", "email")
        .with_property("type", "string")
        .with_property("unique", true)
        .with_property("validation", json!({"format": "email"}))]);
    let config = ApplicationConfig::default().with_override("name_conflict_t1", ResolutionStrategy::Merge);

    let result = ApplicationEngine::new().apply_template(&tpl, &existing, &config);

    assert!(result.success);
    assert_eq!(result.merged_elements.len(), 1);
    let merged = &result.merged_elements[0];
    assert_eq!(merged.id, "e1");
    assert_eq!(merged.property("unique"), Some(&json!(true)));
    assert_eq!(
        merged.property("validation"),
        Some(&json!({"maxLength": 100, "format": "email"}))
    );
}

#[test]
fn test_selective_merge_drops_unresolved_existing() {
    let existing = vec![
        SchemaElement::field("e1", "email").with_property("type", "string"),
        SchemaElement::field("e2", "phone").with_property("type", "string"),
    ];
    let tpl = template(vec![SchemaElement::field("t1", "email").with_property("type", "number")]);
    let config = ApplicationConfig {
        merge_strategy: MergeStrategy::Selective,
        ..Default::default()
    };

    let result = ApplicationEngine::new().apply_template(&tpl, &existing, &config);

    assert!(result.success);
    let ids: Vec<_> = result.merged_elements.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec!["e2"]);
    assert!(result.warnings.iter().any(|w| w.starts_with("Dropped existing element 'email'")));
}

#[test]
fn test_structural_validator_blocks_commit() {
    let engine = ApplicationEngine::with_validator(Arc::new(StructuralValidator::new()));
    let tpl = template(vec![SchemaElement::relationship("r1", "owner", "users")
        .with_property("target", serde_json::Value::Null)]);

    let result = engine.apply_template(&tpl, &[], &ApplicationConfig::default());

    assert!(!result.success);
    assert_eq!(result.state, ApplicationState::Failed);
    assert!(result.applied_elements.is_empty());
    assert!(result.backup.is_none());
    assert!(generate_application_report(&result).contains("Status: FAILED"));
}

#[test]
fn test_builtin_templates_apply_cleanly() {
    let catalog = TemplateCatalog::builtin().unwrap();
    let engine = ApplicationEngine::with_validator(Arc::new(StructuralValidator::new()));

    for tpl in catalog.iter() {
        let result = engine.apply_template(tpl, &[], &ApplicationConfig::default());
        assert!(result.success, "{} failed: {:?}", tpl.id, result.warnings);
        assert_eq!(result.applied_elements, tpl.elements);
    }
}

#[test]
fn test_preview_matches_apply() {
    let catalog = TemplateCatalog::builtin().unwrap();
    let tpl = catalog.get("technical-audit-trail").unwrap();
    let existing = vec![
        SchemaElement::field("field-user_id", "user_id").with_property("type", "uuid"),
        SchemaElement::field("x1", "timestamp").with_property("type", "string"),
    ];
    let engine = ApplicationEngine::new();
    let config = ApplicationConfig::default();

    let preview = engine.preview_application(tpl, &existing, &config).unwrap();
    let result = engine.apply_template(tpl, &existing, &config);

    assert_eq!(preview.preview_elements, result.merged_elements);
    assert_eq!(preview.impact.conflicts, result.conflicts.map_or(0, |c| c.len()));
    assert_eq!(preview.impact.modified, 1);
    assert_eq!(preview.impact.added + preview.impact.modified, result.applied_elements.len());
}

#[test]
fn test_reapply_with_user_decision() {
    let existing = vec![SchemaElement::field("e1", "email").with_property("type", "string")];
    let tpl = template(vec![SchemaElement::field("t1", "email").with_property("type", "number")]);
    let engine = ApplicationEngine::new();

    let first = engine.apply_template(&tpl, &existing, &ApplicationConfig::default());
    assert!(first.applied_elements.is_empty());
    assert!(first.warnings.iter().any(|w| w.contains("awaiting user decision")));

    let decided = ApplicationConfig::default()
        .with_override("name_conflict_t1", ResolutionStrategy::Rename)
        .with_override("type_conflict_t1", ResolutionStrategy::Replace);
    let second = engine.apply_template(&tpl, &existing, &decided);

    assert_eq!(second.applied_elements.len(), 1);
    assert_eq!(second.applied_elements[0].display_name(), "email_1");
    assert_eq!(second.applied_elements[0].id, "t1_renamed_1");
    assert_eq!(second.merged_elements.len(), 2);
}
