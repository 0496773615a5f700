#![warn(missing_docs)]

//! Schema template engine for schemaforge
//!
//! Recommends and searches reusable schema templates, detects conflicts
//! between a template and an existing schema, resolves and merges them under
//! configurable policies, assesses structural impact, and supports rollback.
//! All operations are synchronous and perform no I/O; catalogs and
//! configuration are loaded by the caller and injected.

pub mod error;
pub mod models;
pub mod config;
pub mod catalog;
pub mod conflict_detector;
pub mod conflict_resolver;
pub mod merge_engine;
pub mod impact_assessor;
pub mod validator;
pub mod application;
pub mod report_generator;
pub mod recommendation;
pub mod search;

// Re-export public API
pub use error::{Result, TemplateError};
pub use models::{
    normalize_name, ElementKind, Properties, QualityMetrics, SchemaElement, Template,
    TemplateAuthor, TemplateCategory, TemplateCompatibility, TemplateComplexity,
};
pub use config::{
    ApplicationDefaults, ConfigLoader, EngineConfig, RecommendationConfig, SearchConfig,
};
pub use catalog::TemplateCatalog;
pub use conflict_detector::{
    Conflict, ConflictDetector, ConflictKind, ResolutionStrategy, Severity,
};
pub use conflict_resolver::{ConflictResolver, ResolutionOutcome, UnresolvedConflict};
pub use merge_engine::{combine_elements, MergeEngine, MergeOutcome, MergeStrategy};
pub use impact_assessor::{ImpactAssessment, ImpactAssessor, ImpactLevel, ImpactMetrics};
pub use validator::{
    AcceptAllValidator, SchemaValidator, StructuralValidator, ValidationOutcome,
};
pub use application::{
    rollback_template_application, ApplicationConfig, ApplicationEngine, ApplicationPreview,
    ApplicationResult, ApplicationState, AppliedConflict, Backup, PreviewImpact,
};
pub use report_generator::{
    generate_application_report, generate_application_report_json, ApplicationReport,
    ReportGenerator,
};
pub use recommendation::{
    Compatibility, ConflictRisk, Recommendation, RecommendationContext, RecommendationEngine,
    ScoreBreakdown, TechnicalConstraints, UserPreferences,
};
pub use search::{FacetCount, Facets, SearchEngine, SearchFilter, SearchResult, SortBy, SortOrder};
