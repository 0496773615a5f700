//! Template recommendation scoring
//!
//! Every catalog template gets a score between 0 and 100 built from four
//! weighted terms, strongest first:
//! - relevance: category match, keyword overlap with the schema, field-type similarity
//! - preference: requested complexity and categories (or team size)
//! - quality: the quality composite
//! - popularity: community rating and usage count
//!
//! Technical constraints then scale the score down for templates that do not
//! fit the project's database, framework or spec version.

use std::{
    cmp::Ordering,
    collections::{BTreeSet, HashSet},
    sync::Arc,
};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    catalog::TemplateCatalog,
    config::RecommendationConfig,
    conflict_detector::{ConflictDetector, Severity},
    error::{Result, TemplateError},
    models::{
        normalize_name, ElementKind, SchemaElement, Template, TemplateCategory, TemplateComplexity,
    },
};

/// Database, framework and spec version of the target project
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TechnicalConstraints {
    /// Target database, e.g. `postgresql`
    pub database: Option<String>,
    /// Target API framework, e.g. `graphql`
    pub framework: Option<String>,
    /// Spec version the project is on
    pub spec_version: Option<String>,
}

/// Explicit user preferences
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserPreferences {
    /// Preferred complexity levels
    pub complexity: Vec<TemplateComplexity>,
    /// Preferred categories
    pub categories: Vec<TemplateCategory>,
}

/// What the recommendation engine knows about the project
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecommendationContext {
    /// Elements already in the schema
    pub existing_elements: Vec<SchemaElement>,
    /// Categories the project already covers
    pub existing_categories: Vec<TemplateCategory>,
    /// Project type, e.g. `hr` or `ecommerce`
    pub project_type: Option<String>,
    /// Industry, e.g. `healthcare` or `retail`
    pub industry: Option<String>,
    /// Team size
    pub team_size: Option<u32>,
    /// Technical constraints
    pub technical_constraints: Option<TechnicalConstraints>,
    /// User preferences
    pub user_preferences: Option<UserPreferences>,
}

/// How well a template fits, graded from its score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Compatibility {
    /// Score at or above the perfect threshold
    Perfect,
    /// Score at or above the good threshold
    Good,
    /// Score at or above the partial threshold
    Partial,
    /// Anything lower
    Poor,
}

impl Compatibility {
    /// Snake-case name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Perfect => "perfect",
            Self::Good => "good",
            Self::Partial => "partial",
            Self::Poor => "poor",
        }
    }
}

/// Likelihood that applying the template produces conflicts
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictRisk {
    /// No conflicts detected
    None,
    /// Only low or medium conflicts
    Low,
    /// At least one high conflict
    Medium,
    /// At least one critical conflict
    High,
}

impl ConflictRisk {
    /// Risk implied by the most severe detected conflict
    pub fn from_max_severity(severity: Option<Severity>) -> Self {
        match severity {
            None => Self::None,
            Some(Severity::Low) | Some(Severity::Medium) => Self::Low,
            Some(Severity::High) => Self::Medium,
            Some(Severity::Critical) => Self::High,
        }
    }
}

/// Weighted points contributed by each scoring term
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    /// Relevance points
    pub relevance: f64,
    /// Preference points
    pub preference: f64,
    /// Quality points
    pub quality: f64,
    /// Popularity points
    pub popularity: f64,
    /// Multiplier applied for technical constraints (1.0 = no penalty)
    pub constraint_multiplier: f64,
}

/// A scored template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    /// The template
    pub template: Template,
    /// Score (0-100)
    pub score: f64,
    /// Strongest reasons, at most three
    pub reasons: Vec<String>,
    /// Fit grade
    pub compatibility: Compatibility,
    /// Conflict risk against the existing schema
    pub conflict_risk: ConflictRisk,
    /// Points per term
    pub breakdown: ScoreBreakdown,
}

/// One candidate reason with the points behind it
struct Reason {
    points: f64,
    text: String,
}

/// Ranks catalog templates for a context
pub struct RecommendationEngine {
    catalog: Arc<TemplateCatalog>,
    detector: ConflictDetector,
    config: RecommendationConfig,
}

impl RecommendationEngine {
    /// Create an engine with default scoring
    pub fn new(catalog: Arc<TemplateCatalog>) -> Self {
        Self::with_config(catalog, RecommendationConfig::default())
    }

    /// Create an engine with custom scoring
    pub fn with_config(catalog: Arc<TemplateCatalog>, config: RecommendationConfig) -> Self {
        Self {
            catalog,
            detector: ConflictDetector::new(),
            config,
        }
    }

    /// Recommend with the configured default limit
    pub fn recommend(&self, context: &RecommendationContext) -> Result<Vec<Recommendation>> {
        self.get_recommendations(context, self.config.default_limit)
    }

    /// Score every template and return the best `limit`, score descending
    ///
    /// Ties break on community rating, then usage count (both descending),
    /// then template id.
    pub fn get_recommendations(
        &self,
        context: &RecommendationContext,
        limit: usize,
    ) -> Result<Vec<Recommendation>> {
        validate_context(context)?;

        let signals = ContextSignals::from_context(context);
        let mut recommendations: Vec<Recommendation> = self
            .catalog
            .iter()
            .map(|template| self.score_template(template, context, &signals))
            .collect();

        recommendations.sort_by(compare_recommendations);
        recommendations.truncate(limit);

        debug!(
            candidates = self.catalog.len(),
            returned = recommendations.len(),
            "Recommendations computed"
        );
        Ok(recommendations)
    }

    fn score_template(
        &self,
        template: &Template,
        context: &RecommendationContext,
        signals: &ContextSignals,
    ) -> Recommendation {
        let cfg = &self.config;
        let mut reasons = Vec::new();

        // Relevance
        let (category, category_reason) = category_match(template.category, context, signals);
        if let Some(text) = category_reason {
            reasons.push(Reason {
                points: cfg.relevance_weight * 0.5 * category,
                text,
            });
        }

        let matched_terms = keyword_matches(template, &signals.tokens);
        let term_count = template_terms(template).len();
        let keywords = if term_count == 0 {
            0.0
        } else {
            (matched_terms.len() as f64 / term_count as f64).min(1.0)
        };
        if !matched_terms.is_empty() {
            let shown: Vec<&str> = matched_terms.iter().take(3).map(String::as_str).collect();
            reasons.push(Reason {
                points: cfg.relevance_weight * 0.3 * keywords,
                text: format!("Shares keywords with your schema: {}", shown.join(", ")),
            });
        }

        let field_types = jaccard(&signals.field_types, &field_types(&template.elements));
        if field_types > 0.0 {
            reasons.push(Reason {
                points: cfg.relevance_weight * 0.2 * field_types,
                text: "Uses field types similar to your schema".to_string(),
            });
        }

        let relevance = 0.5 * category + 0.3 * keywords + 0.2 * field_types;

        // Preference
        let (complexity_pref, complexity_reason) = complexity_preference(template.complexity, context);
        if let Some(text) = complexity_reason {
            reasons.push(Reason {
                points: cfg.preference_weight * 0.5 * complexity_pref,
                text,
            });
        }
        let (category_pref, category_pref_reason) = category_preference(template.category, context);
        if let Some(text) = category_pref_reason {
            reasons.push(Reason {
                points: cfg.preference_weight * 0.5 * category_pref,
                text,
            });
        }
        let preference = 0.5 * complexity_pref + 0.5 * category_pref;

        // Quality
        let composite = template.quality.composite();
        let quality = (composite / 100.0).clamp(0.0, 1.0);
        if quality > 0.0 {
            reasons.push(Reason {
                points: cfg.quality_weight * quality,
                text: format!("High quality score ({:.0}/100)", composite),
            });
        }

        // Popularity
        let rating = (template.quality.community_rating / 5.0).clamp(0.0, 1.0);
        let usage = if cfg.popularity_saturation == 0 {
            1.0
        } else {
            (template.quality.usage_count as f64 / cfg.popularity_saturation as f64).min(1.0)
        };
        let popularity = 0.5 * rating + 0.5 * usage;
        if popularity > 0.0 {
            reasons.push(Reason {
                points: cfg.popularity_weight * popularity,
                text: format!(
                    "Rated {:.1}/5 across {} projects",
                    template.quality.community_rating, template.quality.usage_count
                ),
            });
        }

        let multiplier = constraint_multiplier(template, context);

        let breakdown = ScoreBreakdown {
            relevance: cfg.relevance_weight * relevance,
            preference: cfg.preference_weight * preference,
            quality: cfg.quality_weight * quality,
            popularity: cfg.popularity_weight * popularity,
            constraint_multiplier: multiplier,
        };

        // Zero or negative total weight scores everything 0
        let total_weight = cfg.total_weight();
        let raw = if total_weight > 0.0 {
            (breakdown.relevance + breakdown.preference + breakdown.quality + breakdown.popularity)
                / total_weight
                * 100.0
        } else {
            0.0
        };
        let score = round2((raw * multiplier).clamp(0.0, 100.0));

        reasons.sort_by(|a, b| b.points.total_cmp(&a.points));
        let reasons = if score > 0.0 {
            reasons
                .into_iter()
                .filter(|r| r.points > 0.0)
                .take(3)
                .map(|r| r.text)
                .collect()
        } else {
            Vec::new()
        };

        let conflicts = self.detector.detect(template, &context.existing_elements);
        let conflict_risk = ConflictRisk::from_max_severity(self.detector.max_severity(&conflicts));

        Recommendation {
            template: template.clone(),
            score,
            reasons,
            compatibility: self.grade(score),
            conflict_risk,
            breakdown,
        }
    }

    fn grade(&self, score: f64) -> Compatibility {
        if score >= self.config.perfect_threshold {
            Compatibility::Perfect
        } else if score >= self.config.good_threshold {
            Compatibility::Good
        } else if score >= self.config.partial_threshold {
            Compatibility::Partial
        } else {
            Compatibility::Poor
        }
    }
}

fn compare_recommendations(a: &Recommendation, b: &Recommendation) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| {
            b.template
                .quality
                .community_rating
                .total_cmp(&a.template.quality.community_rating)
        })
        .then_with(|| b.template.quality.usage_count.cmp(&a.template.quality.usage_count))
        .then_with(|| a.template.id.cmp(&b.template.id))
}

fn validate_context(context: &RecommendationContext) -> Result<()> {
    let mut seen = HashSet::new();
    for element in &context.existing_elements {
        if element.id.trim().is_empty() {
            return Err(TemplateError::validation(
                "recommendation context contains an element without an id",
            ));
        }
        if !seen.insert(element.id.as_str()) {
            return Err(TemplateError::validation(format!(
                "recommendation context contains duplicate element id '{}'",
                element.id
            )));
        }
    }
    Ok(())
}

/// Signals derived once per context
struct ContextSignals {
    tokens: HashSet<String>,
    field_types: BTreeSet<String>,
    project_categories: &'static [TemplateCategory],
    industry_categories: &'static [TemplateCategory],
}

impl ContextSignals {
    fn from_context(context: &RecommendationContext) -> Self {
        let mut tokens = HashSet::new();
        for element in &context.existing_elements {
            let name = element.normalized_name();
            tokens.extend(name.split('_').filter(|t| !t.is_empty()).map(str::to_string));
            if !name.is_empty() {
                tokens.insert(name);
            }
        }
        for text in [&context.project_type, &context.industry].into_iter().flatten() {
            tokens.insert(text.trim().to_lowercase());
        }

        Self {
            tokens,
            field_types: field_types(&context.existing_elements),
            project_categories: context
                .project_type
                .as_deref()
                .map(project_type_categories)
                .unwrap_or_default(),
            industry_categories: context
                .industry
                .as_deref()
                .map(industry_categories)
                .unwrap_or_default(),
        }
    }
}

fn project_type_categories(project_type: &str) -> &'static [TemplateCategory] {
    use TemplateCategory::*;
    match project_type.trim().to_lowercase().as_str() {
        "hr" => &[HrManagement, EmployeeProfile, Organization],
        "finance" => &[FinancialServices, AuditTrail],
        "ecommerce" => &[Ecommerce, ProductCatalog, OrderManagement],
        "security" => &[Rbac, DataEncryption, PiiProtection],
        _ => &[],
    }
}

fn industry_categories(industry: &str) -> &'static [TemplateCategory] {
    use TemplateCategory::*;
    match industry.trim().to_lowercase().as_str() {
        "healthcare" => &[Healthcare, PiiProtection, AuditTrail],
        "finance" => &[FinancialServices, DataEncryption, GdprCompliance],
        "education" => &[Education, UserManagement],
        "retail" => &[Ecommerce, ProductCatalog],
        _ => &[],
    }
}

/// Category match in [0, 1]: direct 1.0, project/industry 0.8, related 0.5
fn category_match(
    category: TemplateCategory,
    context: &RecommendationContext,
    signals: &ContextSignals,
) -> (f64, Option<String>) {
    if context.existing_categories.contains(&category) {
        return (1.0, Some(format!("Matches your project category ({})", category)));
    }
    if signals.project_categories.contains(&category) {
        if let Some(project_type) = &context.project_type {
            return (0.8, Some(format!("Suited to {} projects", project_type)));
        }
    }
    if signals.industry_categories.contains(&category) {
        if let Some(industry) = &context.industry {
            return (0.8, Some(format!("Common in the {} industry", industry)));
        }
    }
    if let Some(related) = context
        .existing_categories
        .iter()
        .find(|existing| category.is_related_to(**existing))
    {
        return (0.5, Some(format!("Related to your {} category", related)));
    }
    (0.0, None)
}

/// Lowercased keywords and tags; tags are also split on `-`
fn template_terms(template: &Template) -> BTreeSet<String> {
    let mut terms = BTreeSet::new();
    for keyword in &template.keywords {
        terms.insert(keyword.trim().to_lowercase());
    }
    for tag in &template.tags {
        let tag = tag.trim().to_lowercase();
        terms.extend(tag.split('-').filter(|t| !t.is_empty()).map(str::to_string));
        terms.insert(tag);
    }
    terms.remove("");
    terms
}

fn keyword_matches(template: &Template, tokens: &HashSet<String>) -> Vec<String> {
    template_terms(template)
        .into_iter()
        .filter(|term| tokens.contains(term) || tokens.contains(&normalize_name(term)))
        .collect()
}

fn field_types(elements: &[SchemaElement]) -> BTreeSet<String> {
    elements
        .iter()
        .filter(|e| e.kind == ElementKind::Field)
        .filter_map(|e| e.declared_type().and_then(|t| t.as_str()))
        .map(|t| t.to_lowercase())
        .collect()
}

fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count() as f64;
    let union = a.union(b).count() as f64;
    intersection / union
}

fn complexity_preference(
    complexity: TemplateComplexity,
    context: &RecommendationContext,
) -> (f64, Option<String>) {
    let preferred = context
        .user_preferences
        .as_ref()
        .map(|p| p.complexity.as_slice())
        .unwrap_or_default();

    if !preferred.is_empty() {
        return if preferred.contains(&complexity) {
            (1.0, Some(format!("Matches preferred complexity level ({})", complexity)))
        } else {
            (0.0, None)
        };
    }

    match context.team_size {
        Some(team_size) => {
            let suited = TemplateComplexity::for_team_size(team_size);
            let distance = (rank(suited) - rank(complexity)).abs();
            match distance {
                0 => (1.0, Some(format!("Right-sized for a team of {}", team_size))),
                1 => (0.5, Some(format!("Manageable for a team of {}", team_size))),
                _ => (0.0, None),
            }
        }
        None => (0.0, None),
    }
}

fn rank(complexity: TemplateComplexity) -> i32 {
    match complexity {
        TemplateComplexity::Basic => 0,
        TemplateComplexity::Intermediate => 1,
        TemplateComplexity::Advanced => 2,
        TemplateComplexity::Enterprise => 3,
    }
}

fn category_preference(
    category: TemplateCategory,
    context: &RecommendationContext,
) -> (f64, Option<String>) {
    let preferred = context
        .user_preferences
        .as_ref()
        .map(|p| p.categories.as_slice())
        .unwrap_or_default();

    if preferred.contains(&category) {
        (1.0, Some(format!("In a preferred category ({})", category)))
    } else if let Some(related) = preferred.iter().find(|p| category.is_related_to(**p)) {
        (0.5, Some(format!("Close to preferred category ({})", related)))
    } else {
        (0.0, None)
    }
}

/// Product of the technical-constraint penalties
fn constraint_multiplier(template: &Template, context: &RecommendationContext) -> f64 {
    let compatibility = &template.compatibility;
    let mut multiplier = 1.0;

    if let Some(constraints) = &context.technical_constraints {
        if let Some(database) = &constraints.database {
            if !supports(&compatibility.supported_databases, database) {
                multiplier *= 0.5;
            }
        }
        if let Some(framework) = &constraints.framework {
            if !supports(&compatibility.supported_frameworks, framework) {
                multiplier *= 0.5;
            }
        }
        if let Some(spec_version) = &constraints.spec_version {
            if compare_versions(&compatibility.min_spec_version, spec_version) == Ordering::Greater {
                multiplier *= 0.3;
            }
        }
    }

    let clashes = compatibility.conflicts.iter().any(|conflict| {
        context
            .existing_categories
            .iter()
            .any(|category| category.as_str() == conflict.trim())
    });
    if clashes {
        multiplier *= 0.5;
    }

    multiplier
}

/// An empty support list means unrestricted
fn supports(supported: &[String], wanted: &str) -> bool {
    supported.is_empty() || supported.iter().any(|s| s.eq_ignore_ascii_case(wanted.trim()))
}

/// Compare dotted numeric versions; missing or non-numeric parts count as 0
fn compare_versions(a: &str, b: &str) -> Ordering {
    let parse = |v: &str| -> Vec<u64> {
        v.trim()
            .split('.')
            .map(|part| part.trim().parse().unwrap_or(0))
            .collect()
    };
    let (a, b) = (parse(a), parse(b));
    let len = a.len().max(b.len());
    for i in 0..len {
        let ordering = a.get(i).unwrap_or(&0).cmp(b.get(i).unwrap_or(&0));
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
