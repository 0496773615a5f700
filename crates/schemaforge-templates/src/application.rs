//! Template application transaction
//!
//! Applying a template runs a fixed sequence of stages:
//!
//! ```text
//! Idle -> Detecting -> [BackingUp] -> Resolving -> Merging -> [Validating] -> Committed
//!                                                                          \-> Failed
//! ```
//!
//! Any error along the way ends in `Failed`, and the result then carries no
//! elements, only the error message. The backup taken before resolution is
//! handed back with the result so the caller can roll back; rollback is never
//! automatic.

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::{
    config::ApplicationDefaults,
    conflict_detector::{Conflict, ConflictDetector, ConflictKind, ResolutionStrategy},
    conflict_resolver::ConflictResolver,
    error::{Result, TemplateError},
    impact_assessor::{ImpactAssessment, ImpactAssessor, ImpactLevel},
    merge_engine::{MergeEngine, MergeStrategy},
    models::{SchemaElement, Template},
    validator::{AcceptAllValidator, SchemaValidator},
};

/// Options for one template application
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationConfig {
    /// Only apply these template element ids
    pub include_elements: Option<Vec<String>>,
    /// Never apply these template element ids
    pub exclude_elements: Option<Vec<String>>,
    /// Per-conflict strategy overrides, keyed by conflict id
    pub resolution_overrides: HashMap<String, ResolutionStrategy>,
    /// How resolved elements are combined with existing ones
    pub merge_strategy: MergeStrategy,
    /// Keep existing elements in the merged schema
    pub preserve_existing: bool,
    /// Snapshot existing elements before applying
    pub make_backup: bool,
    /// Run the schema validator on the merged schema
    pub validate_after_apply: bool,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self::from(&ApplicationDefaults::default())
    }
}

impl From<&ApplicationDefaults> for ApplicationConfig {
    fn from(defaults: &ApplicationDefaults) -> Self {
        Self {
            include_elements: None,
            exclude_elements: None,
            resolution_overrides: HashMap::new(),
            merge_strategy: defaults.merge_strategy,
            preserve_existing: defaults.preserve_existing,
            make_backup: defaults.make_backup,
            validate_after_apply: defaults.validate_after_apply,
        }
    }
}

impl ApplicationConfig {
    /// Override the resolution of one conflict
    pub fn with_override(mut self, conflict_id: impl Into<String>, strategy: ResolutionStrategy) -> Self {
        self.resolution_overrides.insert(conflict_id.into(), strategy);
        self
    }
}

/// Stage of an application transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationState {
    /// Not started
    Idle,
    /// Detecting conflicts
    Detecting,
    /// Snapshotting existing elements
    BackingUp,
    /// Resolving conflicts
    Resolving,
    /// Merging resolved elements into the schema
    Merging,
    /// Running the schema validator
    Validating,
    /// Finished successfully
    Committed,
    /// Rolled back by the caller
    RolledBack,
    /// Aborted by an error
    Failed,
}

impl ApplicationState {
    /// Snake-case name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Detecting => "detecting",
            Self::BackingUp => "backing_up",
            Self::Resolving => "resolving",
            Self::Merging => "merging",
            Self::Validating => "validating",
            Self::Committed => "committed",
            Self::RolledBack => "rolled_back",
            Self::Failed => "failed",
        }
    }

    /// Whether the transaction has ended
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Committed | Self::RolledBack | Self::Failed)
    }
}

/// Snapshot of the existing elements taken before an application
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Backup {
    /// Template whose application this backup precedes
    pub template_id: String,
    /// Elements as they were before the application
    pub elements: Vec<SchemaElement>,
}

/// A detected conflict together with the strategy that settled it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppliedConflict {
    /// Conflict id
    pub id: String,
    /// Conflict kind
    #[serde(rename = "type")]
    pub kind: ConflictKind,
    /// Existing element involved
    pub existing: SchemaElement,
    /// Template element involved
    pub template: SchemaElement,
    /// Strategy actually applied
    pub resolution: ResolutionStrategy,
}

/// Outcome of [`ApplicationEngine::apply_template`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationResult {
    /// Whether the application committed
    pub success: bool,
    /// Applied template id
    pub template_id: String,
    /// Applied template name
    pub template_name: String,
    /// Applied template version
    pub template_version: String,
    /// Template elements after conflict resolution
    pub applied_elements: Vec<SchemaElement>,
    /// The complete schema after merging
    pub merged_elements: Vec<SchemaElement>,
    /// Conflicts and their resolutions, absent when there were none
    pub conflicts: Option<Vec<AppliedConflict>>,
    /// Warnings from resolution, merging and validation
    pub warnings: Vec<String>,
    /// Structural impact, absent on failure
    pub performance_impact: Option<ImpactAssessment>,
    /// Snapshot for rollback, when one was taken
    pub backup: Option<Backup>,
    /// Final transaction state
    pub state: ApplicationState,
}

impl ApplicationResult {
    fn failed(template: &Template, message: String) -> Self {
        Self {
            success: false,
            template_id: template.id.clone(),
            template_name: template.name.clone(),
            template_version: template.version.clone(),
            applied_elements: Vec::new(),
            merged_elements: Vec::new(),
            conflicts: None,
            warnings: vec![message],
            performance_impact: None,
            backup: None,
            state: ApplicationState::Failed,
        }
    }

    /// Roll back this application, consuming its backup
    ///
    /// Returns the elements captured before the application. Fails when no
    /// backup was taken or it was already used.
    pub fn rollback(&mut self) -> Result<Vec<SchemaElement>> {
        let backup = self.backup.take();
        let elements = rollback_template_application(backup.as_ref())?;
        self.state = ApplicationState::RolledBack;
        info!(template = %self.template_id, restored = elements.len(), "Rolled back template application");
        Ok(elements)
    }
}

/// Restore the elements captured in a backup
pub fn rollback_template_application(backup: Option<&Backup>) -> Result<Vec<SchemaElement>> {
    match backup {
        Some(backup) => Ok(backup.elements.clone()),
        None => Err(TemplateError::rollback("no backup available for rollback")),
    }
}

/// Summary counts of a preview
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreviewImpact {
    /// Resolved elements whose id is new
    pub added: usize,
    /// Resolved elements whose id already exists
    pub modified: usize,
    /// Number of detected conflicts
    pub conflicts: usize,
    /// Coarse impact grade
    pub estimated_impact: ImpactLevel,
}

/// Outcome of [`ApplicationEngine::preview_application`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationPreview {
    /// All detected conflicts
    pub conflicts: Vec<Conflict>,
    /// The schema as it would look after applying
    pub preview_elements: Vec<SchemaElement>,
    /// Summary counts
    pub impact: PreviewImpact,
}

/// Orchestrates detection, resolution, merging and validation
pub struct ApplicationEngine {
    detector: ConflictDetector,
    resolver: ConflictResolver,
    merger: MergeEngine,
    assessor: ImpactAssessor,
    validator: Arc<dyn SchemaValidator>,
}

impl ApplicationEngine {
    /// Create an engine whose validation accepts every schema
    pub fn new() -> Self {
        Self::with_validator(Arc::new(AcceptAllValidator))
    }

    /// Create an engine with a custom schema validator
    pub fn with_validator(validator: Arc<dyn SchemaValidator>) -> Self {
        Self {
            detector: ConflictDetector::new(),
            resolver: ConflictResolver::new(),
            merger: MergeEngine::new(),
            assessor: ImpactAssessor::new(),
            validator,
        }
    }

    /// Apply a template to a set of existing elements
    ///
    /// Never returns an error: failures are reported as `success == false`
    /// with the message as the only warning.
    #[instrument(skip_all, fields(template = %template.id))]
    pub fn apply_template(
        &self,
        template: &Template,
        existing: &[SchemaElement],
        config: &ApplicationConfig,
    ) -> ApplicationResult {
        let mut transaction = Transaction::new(&template.id);
        match self.run(&mut transaction, template, existing, config) {
            Ok(result) => result,
            Err(e) => {
                transaction.transition(ApplicationState::Failed);
                warn!(template = %template.id, error = %e, "Template application failed");
                ApplicationResult::failed(template, e.to_string())
            }
        }
    }

    /// Compute what applying a template would produce, without backup or validation
    #[instrument(skip_all, fields(template = %template.id))]
    pub fn preview_application(
        &self,
        template: &Template,
        existing: &[SchemaElement],
        config: &ApplicationConfig,
    ) -> Result<ApplicationPreview> {
        validate_inputs(template, existing)?;

        let conflicts = self.detector.detect(template, existing);
        let selected = select_elements(&template.elements, config);
        let resolution =
            self.resolver
                .resolve(&selected, existing, &conflicts, &config.resolution_overrides);
        let merged = self.merger.merge_with_unresolved(
            existing,
            &resolution.resolved_elements,
            config.merge_strategy,
            config.preserve_existing,
            &resolution.unresolved,
        );

        let existing_ids: HashSet<&str> = existing.iter().map(|e| e.id.as_str()).collect();
        let modified = resolution
            .resolved_elements
            .iter()
            .filter(|e| existing_ids.contains(e.id.as_str()))
            .count();

        let impact = PreviewImpact {
            added: resolution.resolved_elements.len() - modified,
            modified,
            conflicts: conflicts.len(),
            estimated_impact: self.assessor.estimate(existing.len(), merged.elements.len()),
        };

        debug!(
            added = impact.added,
            modified = impact.modified,
            conflicts = impact.conflicts,
            "Preview computed"
        );

        Ok(ApplicationPreview {
            conflicts,
            preview_elements: merged.elements,
            impact,
        })
    }

    fn run(
        &self,
        transaction: &mut Transaction,
        template: &Template,
        existing: &[SchemaElement],
        config: &ApplicationConfig,
    ) -> Result<ApplicationResult> {
        transaction.transition(ApplicationState::Detecting);
        validate_inputs(template, existing)?;
        let conflicts = self.detector.detect(template, existing);

        let backup = if config.make_backup {
            transaction.transition(ApplicationState::BackingUp);
            Some(Backup {
                template_id: template.id.clone(),
                elements: existing.to_vec(),
            })
        } else {
            None
        };

        transaction.transition(ApplicationState::Resolving);
        let selected = select_elements(&template.elements, config);
        let resolution =
            self.resolver
                .resolve(&selected, existing, &conflicts, &config.resolution_overrides);
        let mut warnings = resolution.warnings;

        transaction.transition(ApplicationState::Merging);
        let merged = self.merger.merge_with_unresolved(
            existing,
            &resolution.resolved_elements,
            config.merge_strategy,
            config.preserve_existing,
            &resolution.unresolved,
        );
        warnings.extend(merged.warnings);

        if config.validate_after_apply {
            transaction.transition(ApplicationState::Validating);
            let outcome = self.validator.validate(&merged.elements, template);
            if !outcome.valid {
                return Err(TemplateError::ValidatorRejected(outcome.errors));
            }
            warnings.extend(outcome.warnings);
        }

        let performance_impact = self.assessor.assess(existing, &merged.elements);

        let applied_conflicts = if conflicts.is_empty() {
            None
        } else {
            Some(
                conflicts
                    .iter()
                    .map(|conflict| AppliedConflict {
                        id: conflict.id.clone(),
                        kind: conflict.kind,
                        existing: conflict.existing.clone(),
                        template: conflict.template.clone(),
                        resolution: self
                            .resolver
                            .effective_strategy(conflict, &config.resolution_overrides),
                    })
                    .collect(),
            )
        };

        transaction.transition(ApplicationState::Committed);
        info!(
            template = %template.id,
            applied = resolution.resolved_elements.len(),
            conflicts = conflicts.len(),
            warnings = warnings.len(),
            impact = performance_impact.estimated_impact.as_str(),
            "Template applied"
        );

        Ok(ApplicationResult {
            success: true,
            template_id: template.id.clone(),
            template_name: template.name.clone(),
            template_version: template.version.clone(),
            applied_elements: resolution.resolved_elements,
            merged_elements: merged.elements,
            conflicts: applied_conflicts,
            warnings,
            performance_impact: Some(performance_impact),
            backup,
            state: transaction.state,
        })
    }
}

impl Default for ApplicationEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Tracks the stage of one application
struct Transaction<'a> {
    template_id: &'a str,
    state: ApplicationState,
}

impl<'a> Transaction<'a> {
    fn new(template_id: &'a str) -> Self {
        Self {
            template_id,
            state: ApplicationState::Idle,
        }
    }

    fn transition(&mut self, next: ApplicationState) {
        debug!(
            template = self.template_id,
            from = self.state.as_str(),
            to = next.as_str(),
            "Application state transition"
        );
        self.state = next;
    }
}

/// Reject templates and schemas with missing or duplicate ids
fn validate_inputs(template: &Template, existing: &[SchemaElement]) -> Result<()> {
    if template.id.trim().is_empty() {
        return Err(TemplateError::validation("template id must not be empty"));
    }
    check_ids(&template.elements, "template")?;
    check_ids(existing, "existing schema")
}

fn check_ids(elements: &[SchemaElement], origin: &str) -> Result<()> {
    let mut seen = HashSet::new();
    for element in elements {
        if element.id.trim().is_empty() {
            return Err(TemplateError::validation(format!(
                "{} contains an element without an id",
                origin
            )));
        }
        if !seen.insert(element.id.as_str()) {
            return Err(TemplateError::validation(format!(
                "{} contains duplicate element id '{}'",
                origin, element.id
            )));
        }
    }
    Ok(())
}

/// Apply include and exclude lists to the template elements
fn select_elements(elements: &[SchemaElement], config: &ApplicationConfig) -> Vec<SchemaElement> {
    elements
        .iter()
        .filter(|e| {
            config
                .include_elements
                .as_ref()
                .map_or(true, |ids| ids.contains(&e.id))
        })
        .filter(|e| {
            config
                .exclude_elements
                .as_ref()
                .map_or(true, |ids| !ids.contains(&e.id))
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::models::{TemplateCategory, TemplateComplexity};
    use crate::validator::StructuralValidator;

    fn template(elements: Vec<SchemaElement>) -> Template {
        Template::new(
            "tpl",
            "Employee",
            TemplateCategory::HrManagement,
            TemplateComplexity::Basic,
        )
        .with_elements(elements)
    }

    #[test]
    fn test_clean_apply_commits() {
        let engine = ApplicationEngine::new();
        let tpl = template(vec![SchemaElement::field("t1", "id")
            .with_property("type", "uuid")
            .with_property("primary_key", true)]);

        let result = engine.apply_template(&tpl, &[], &ApplicationConfig::default());

        assert!(result.success);
        assert_eq!(result.state, ApplicationState::Committed);
        assert_eq!(result.applied_elements.len(), 1);
        assert_eq!(result.applied_elements[0].id, "t1");
        assert!(result.conflicts.is_none());
        assert_eq!(
            result.performance_impact.unwrap().estimated_impact,
            ImpactLevel::High
        );
        assert_eq!(result.backup.unwrap().elements, Vec::<SchemaElement>::new());
    }

    #[test]
    fn test_no_backup_when_disabled() {
        let engine = ApplicationEngine::new();
        let tpl = template(vec![SchemaElement::field("t1", "id")]);
        let config = ApplicationConfig {
            make_backup: false,
            ..Default::default()
        };

        let mut result = engine.apply_template(&tpl, &[], &config);
        assert!(result.success);
        assert!(result.backup.is_none());
        assert!(matches!(result.rollback(), Err(TemplateError::Rollback(_))));
    }

    #[test]
    fn test_duplicate_existing_ids_fail() {
        let engine = ApplicationEngine::new();
        let existing = vec![SchemaElement::field("e1", "a"), SchemaElement::field("e1", "b")];
        let tpl = template(vec![SchemaElement::field("t1", "c")]);

        let result = engine.apply_template(&tpl, &existing, &ApplicationConfig::default());

        assert!(!result.success);
        assert_eq!(result.state, ApplicationState::Failed);
        assert!(result.applied_elements.is_empty());
        assert!(result.merged_elements.is_empty());
        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].contains("duplicate element id 'e1'"));
    }

    #[test]
    fn test_validator_rejection_fails() {
        let engine = ApplicationEngine::with_validator(Arc::new(StructuralValidator::new()));
        let tpl = template(vec![SchemaElement::field("t1", "first name").with_property("type", "string")]);

        let result = engine.apply_template(&tpl, &[], &ApplicationConfig::default());
        assert!(!result.success);
        assert!(result.warnings[0].contains("invalid name 'first name'"));

        let config = ApplicationConfig {
            validate_after_apply: false,
            ..Default::default()
        };
        assert!(engine.apply_template(&tpl, &[], &config).success);
    }

    #[test]
    fn test_conflicts_report_effective_resolution() {
        let engine = ApplicationEngine::new();
        let existing = vec![SchemaElement::field("e1", "email").with_property("type", "string")];
        let tpl = template(vec![SchemaElement::field("t1", "email").with_property("type", "number")]);

        let result = engine.apply_template(&tpl, &existing, &ApplicationConfig::default());
        let conflicts = result.conflicts.unwrap();

        let type_conflict = conflicts.iter().find(|c| c.kind == ConflictKind::Type).unwrap();
        assert_eq!(type_conflict.resolution, ResolutionStrategy::Skip);
        assert!(result.applied_elements.is_empty());
        assert_eq!(result.merged_elements, existing);
    }

    #[test]
    fn test_override_replaces_type_conflict() {
        let engine = ApplicationEngine::new();
        let existing = vec![SchemaElement::field("e1", "email").with_property("type", "string")];
        let tpl = template(vec![SchemaElement::field("t1", "email").with_property("type", "number")]);
        let config = ApplicationConfig::default()
            .with_override("type_conflict_t1", ResolutionStrategy::Replace)
            .with_override("name_conflict_t1", ResolutionStrategy::Replace);

        let result = engine.apply_template(&tpl, &existing, &config);

        assert!(result.success);
        assert_eq!(result.applied_elements.len(), 1);
        assert_eq!(result.applied_elements[0].property("type"), Some(&json!("number")));
    }

    #[test]
    fn test_include_exclude_selection() {
        let engine = ApplicationEngine::new();
        let tpl = template(vec![
            SchemaElement::field("t1", "a"),
            SchemaElement::field("t2", "b"),
            SchemaElement::field("t3", "c"),
        ]);
        let config = ApplicationConfig {
            include_elements: Some(vec!["t1".into(), "t2".into()]),
            exclude_elements: Some(vec!["t2".into()]),
            ..Default::default()
        };

        let result = engine.apply_template(&tpl, &[], &config);
        let ids: Vec<_> = result.applied_elements.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["t1"]);
    }

    #[test]
    fn test_preview_counts() {
        let engine = ApplicationEngine::new();
        let existing = vec![SchemaElement::field("t1", "a").with_property("type", "string")];
        let tpl = template(vec![
            SchemaElement::field("t1", "a").with_property("type", "string").with_property("required", true),
            SchemaElement::field("t2", "b"),
        ]);

        let preview = engine
            .preview_application(&tpl, &existing, &ApplicationConfig::default())
            .unwrap();

        assert_eq!(preview.impact.added, 1);
        assert_eq!(preview.impact.modified, 1);
        assert_eq!(preview.impact.conflicts, preview.conflicts.len());
        assert_eq!(preview.preview_elements.len(), 2);
    }

    #[test]
    fn test_rollback_restores_snapshot() {
        let engine = ApplicationEngine::new();
        let existing = vec![SchemaElement::field("e1", "name").with_property("type", "string")];
        let tpl = template(vec![SchemaElement::field("t1", "age").with_property("type", "integer")]);

        let mut result = engine.apply_template(&tpl, &existing, &ApplicationConfig::default());
        assert_eq!(result.merged_elements.len(), 2);

        let restored = result.rollback().unwrap();
        assert_eq!(restored, existing);
        assert_eq!(result.state, ApplicationState::RolledBack);
        assert!(result.rollback().is_err());
    }

    #[test]
    fn test_rollback_without_backup() {
        assert!(matches!(
            rollback_template_application(None),
            Err(TemplateError::Rollback(_))
        ));
    }
}
