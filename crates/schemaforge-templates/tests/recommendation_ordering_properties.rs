//! Property-based tests for recommendation ordering
//!
//! Property: Recommendations SHALL be ordered by descending score, and a
//! smaller limit SHALL return a prefix of a larger one for the same context.

use std::sync::Arc;

use proptest::prelude::*;
use schemaforge_templates::{
    QualityMetrics, RecommendationContext, RecommendationEngine, SchemaElement, Template,
    TemplateCatalog, TemplateCategory, TemplateComplexity, UserPreferences,
};

/// Strategy for generating a category
fn category_strategy() -> impl Strategy<Value = TemplateCategory> {
    prop::sample::select(TemplateCategory::ALL.to_vec())
}

/// Strategy for generating a complexity level
fn complexity_strategy() -> impl Strategy<Value = TemplateComplexity> {
    prop::sample::select(TemplateComplexity::ALL.to_vec())
}

/// Strategy for generating quality metadata; ratings are coarse so ties happen
fn quality_strategy() -> impl Strategy<Value = QualityMetrics> {
    (60u8..=100, 60u8..=100, 0u8..=10, 0u64..3).prop_map(|(performance, security, rating, usage)| {
        QualityMetrics {
            performance_score: performance as f64,
            security_score: security as f64,
            community_rating: rating as f64 / 2.0,
            usage_count: usage * 5_000,
            ..Default::default()
        }
    })
}

/// Strategy for generating a catalog with unique ids
fn catalog_strategy() -> impl Strategy<Value = TemplateCatalog> {
    prop::collection::vec(
        (
            category_strategy(),
            complexity_strategy(),
            quality_strategy(),
            prop::collection::vec(r"[a-d]{1,3}", 0..4),
        ),
        0..15,
    )
    .prop_map(|specs| {
        let templates = specs
            .into_iter()
            .enumerate()
            .map(|(i, (category, complexity, quality, keywords))| {
                let mut template = Template::new(format!("tpl-{:02}", i), format!("Template {}", i), category, complexity);
                template.quality = quality;
                template.keywords = keywords;
                template.elements = vec![SchemaElement::field(format!("f{}", i), "id").with_property("type", "uuid")];
                template
            })
            .collect();
        TemplateCatalog::new(templates).expect("ids are unique")
    })
}

/// Strategy for generating a recommendation context
fn context_strategy() -> impl Strategy<Value = RecommendationContext> {
    (
        prop::collection::vec(category_strategy(), 0..3),
        prop::collection::vec(complexity_strategy(), 0..2),
        prop::option::of(1u32..100),
        prop::collection::vec(r"[a-d]{1,3}", 0..4),
    )
        .prop_map(|(categories, complexity, team_size, names)| RecommendationContext {
            existing_elements: names
                .into_iter()
                .enumerate()
                .map(|(i, n)| SchemaElement::field(format!("e{}", i), n).with_property("type", "string"))
                .collect(),
            existing_categories: categories,
            team_size,
            user_preferences: Some(UserPreferences {
                complexity,
                categories: Vec::new(),
            }),
            ..Default::default()
        })
}

proptest! {
    /// Property: Scores never increase down the list
    #[test]
    fn prop_scores_descend(catalog in catalog_strategy(), context in context_strategy()) {
        let engine = RecommendationEngine::new(Arc::new(catalog));
        let recommendations = engine.get_recommendations(&context, 100).unwrap();

        for pair in recommendations.windows(2) {
            prop_assert!(pair[0].score >= pair[1].score);
        }
        for rec in &recommendations {
            prop_assert!((0.0..=100.0).contains(&rec.score));
            prop_assert!(rec.reasons.len() <= 3);
            if rec.score > 0.0 {
                prop_assert!(!rec.reasons.is_empty());
            }
        }
    }

    /// Property: A smaller limit returns a prefix of a larger one
    #[test]
    fn prop_limit_is_prefix(catalog in catalog_strategy(), context in context_strategy()) {
        let engine = RecommendationEngine::new(Arc::new(catalog));
        let top3: Vec<String> = engine
            .get_recommendations(&context, 3)
            .unwrap()
            .into_iter()
            .map(|r| r.template.id)
            .collect();
        let top10: Vec<String> = engine
            .get_recommendations(&context, 10)
            .unwrap()
            .into_iter()
            .map(|r| r.template.id)
            .collect();

        prop_assert!(top3.len() <= 3);
        prop_assert_eq!(&top3[..], &top10[..top3.len()]);
    }

    /// Property: Recommendations are deterministic
    #[test]
    fn prop_recommendations_deterministic(catalog in catalog_strategy(), context in context_strategy()) {
        let engine = RecommendationEngine::new(Arc::new(catalog));
        prop_assert_eq!(
            engine.get_recommendations(&context, 10).unwrap(),
            engine.get_recommendations(&context, 10).unwrap()
        );
    }
}
