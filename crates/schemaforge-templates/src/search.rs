//! Catalog search with facets and stable pagination
//!
//! Filtering is strict: a category or complexity name that does not parse
//! matches nothing. Facets describe the filtered set before pagination, so
//! they stay the same across pages of one query.

use std::{
    cmp::Ordering,
    collections::{BTreeMap, HashMap},
    str::FromStr,
    sync::Arc,
};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    catalog::TemplateCatalog,
    config::SearchConfig,
    models::{Template, TemplateCategory, TemplateComplexity},
};

/// Sort key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortBy {
    /// Query relevance, then rating
    #[default]
    Relevance,
    /// Community rating
    Rating,
    /// Template name
    Name,
    /// Usage count
    UsageCount,
    /// Last update time; templates without one sort oldest
    Recent,
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    /// Ascending
    Asc,
    /// Descending
    #[default]
    Desc,
}

/// Search filter; empty lists and `None` mean "no restriction"
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchFilter {
    /// Case-insensitive substring over name, description, tags and keywords
    pub query: Option<String>,
    /// Category names
    pub categories: Vec<String>,
    /// Complexity names
    pub complexity: Vec<String>,
    /// Tags; a template matches if it has any of them
    pub tags: Vec<String>,
    /// Author id
    pub author: Option<String>,
    /// Minimum community rating
    pub min_rating: Option<f64>,
    /// Maximum community rating
    pub max_rating: Option<f64>,
    /// Sort key
    pub sort_by: SortBy,
    /// Sort direction
    pub sort_order: SortOrder,
    /// Page size; defaults to the configured limit
    pub limit: Option<usize>,
    /// Number of results to skip
    pub offset: usize,
}

/// A facet value with its count
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacetCount {
    /// Facet value
    pub value: String,
    /// Number of matching templates
    pub count: usize,
}

/// Counts over the filtered set
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Facets {
    /// Per category, in category name order
    pub categories: Vec<FacetCount>,
    /// Per complexity, ascending
    pub complexity: Vec<FacetCount>,
    /// Per tag, count descending then tag ascending
    pub tags: Vec<FacetCount>,
    /// Per author id, in id order
    pub authors: Vec<FacetCount>,
}

/// One page of search results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Templates on this page
    pub templates: Vec<Template>,
    /// Number of templates matching the filter
    pub total: usize,
    /// Facets over all matching templates
    pub facets: Facets,
}

/// Searches a template catalog
pub struct SearchEngine {
    catalog: Arc<TemplateCatalog>,
    config: SearchConfig,
}

impl SearchEngine {
    /// Create with default paging
    pub fn new(catalog: Arc<TemplateCatalog>) -> Self {
        Self::with_config(catalog, SearchConfig::default())
    }

    /// Create with custom paging
    pub fn with_config(catalog: Arc<TemplateCatalog>, config: SearchConfig) -> Self {
        Self { catalog, config }
    }

    /// Filter, sort and paginate the catalog
    pub fn search(&self, filter: &SearchFilter) -> SearchResult {
        let criteria = Criteria::from_filter(filter);

        let mut matches: Vec<(&Template, u32)> = self
            .catalog
            .iter()
            .filter(|template| criteria.matches(template))
            .map(|template| (template, relevance(template, criteria.query.as_deref())))
            .collect();

        matches.sort_by(|a, b| compare(a, b, filter.sort_by, filter.sort_order));

        let total = matches.len();
        let facets = self.facets(matches.iter().map(|(t, _)| *t));
        let limit = filter.limit.unwrap_or(self.config.default_limit);
        let templates: Vec<Template> = matches
            .into_iter()
            .skip(filter.offset)
            .take(limit)
            .map(|(t, _)| t.clone())
            .collect();

        debug!(
            total,
            returned = templates.len(),
            offset = filter.offset,
            limit,
            "Search complete"
        );

        SearchResult {
            templates,
            total,
            facets,
        }
    }

    fn facets<'a>(&self, templates: impl Iterator<Item = &'a Template>) -> Facets {
        let mut categories: BTreeMap<&str, usize> = BTreeMap::new();
        let mut complexity: BTreeMap<TemplateComplexity, usize> = BTreeMap::new();
        let mut tags: HashMap<String, usize> = HashMap::new();
        let mut authors: BTreeMap<&str, usize> = BTreeMap::new();

        for template in templates {
            *categories.entry(template.category.as_str()).or_default() += 1;
            *complexity.entry(template.complexity).or_default() += 1;
            *authors.entry(template.author.id.as_str()).or_default() += 1;
            for tag in &template.tags {
                *tags.entry(tag.to_lowercase()).or_default() += 1;
            }
        }

        let mut tags: Vec<FacetCount> = tags
            .into_iter()
            .map(|(value, count)| FacetCount { value, count })
            .collect();
        tags.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.value.cmp(&b.value)));
        tags.truncate(self.config.max_tag_facets);

        Facets {
            categories: counts(categories),
            complexity: complexity
                .into_iter()
                .map(|(c, count)| FacetCount {
                    value: c.as_str().to_string(),
                    count,
                })
                .collect(),
            tags,
            authors: counts(authors),
        }
    }
}

fn counts(map: BTreeMap<&str, usize>) -> Vec<FacetCount> {
    map.into_iter()
        .map(|(value, count)| FacetCount {
            value: value.to_string(),
            count,
        })
        .collect()
}

/// Parsed form of a filter
struct Criteria {
    query: Option<String>,
    categories: Option<Vec<TemplateCategory>>,
    complexity: Option<Vec<TemplateComplexity>>,
    tags: Vec<String>,
    author: Option<String>,
    min_rating: Option<f64>,
    max_rating: Option<f64>,
}

impl Criteria {
    fn from_filter(filter: &SearchFilter) -> Self {
        Self {
            query: filter
                .query
                .as_deref()
                .map(|q| q.trim().to_lowercase())
                .filter(|q| !q.is_empty()),
            categories: parse_all(&filter.categories),
            complexity: parse_all(&filter.complexity),
            tags: filter.tags.iter().map(|t| t.trim().to_lowercase()).collect(),
            author: filter.author.clone(),
            min_rating: filter.min_rating,
            max_rating: filter.max_rating,
        }
    }

    fn matches(&self, template: &Template) -> bool {
        if let Some(query) = &self.query {
            if relevance(template, Some(query)) == 0 {
                return false;
            }
        }
        if let Some(categories) = &self.categories {
            if !categories.contains(&template.category) {
                return false;
            }
        }
        if let Some(complexity) = &self.complexity {
            if !complexity.contains(&template.complexity) {
                return false;
            }
        }
        if !self.tags.is_empty()
            && !template
                .tags
                .iter()
                .any(|tag| self.tags.contains(&tag.to_lowercase()))
        {
            return false;
        }
        if let Some(author) = &self.author {
            if &template.author.id != author {
                return false;
            }
        }
        let rating = template.quality.community_rating;
        if self.min_rating.is_some_and(|min| rating < min) {
            return false;
        }
        if self.max_rating.is_some_and(|max| rating > max) {
            return false;
        }
        true
    }
}

/// Parse names, dropping unknown ones; `None` for an empty list
///
/// A list of only unknown names parses to `Some(vec![])`, which matches nothing.
fn parse_all<T: FromStr>(names: &[String]) -> Option<Vec<T>> {
    if names.is_empty() {
        return None;
    }
    Some(names.iter().filter_map(|n| n.trim().parse().ok()).collect())
}

/// Query relevance: name 8, tag 4, keyword 2, description 1
fn relevance(template: &Template, query: Option<&str>) -> u32 {
    let Some(query) = query else {
        return 0;
    };
    let contains = |text: &str| text.to_lowercase().contains(query);

    let mut score = 0;
    if contains(&template.name) {
        score += 8;
    }
    if template.tags.iter().any(|t| contains(t)) {
        score += 4;
    }
    if template.keywords.iter().any(|k| contains(k)) {
        score += 2;
    }
    if contains(&template.description) {
        score += 1;
    }
    score
}

fn compare(a: &(&Template, u32), b: &(&Template, u32), sort_by: SortBy, order: SortOrder) -> Ordering {
    let (ta, ra) = a;
    let (tb, rb) = b;
    let primary = match sort_by {
        SortBy::Relevance => ra.cmp(rb).then_with(|| {
            ta.quality
                .community_rating
                .total_cmp(&tb.quality.community_rating)
        }),
        SortBy::Rating => ta
            .quality
            .community_rating
            .total_cmp(&tb.quality.community_rating),
        SortBy::Name => ta.name.to_lowercase().cmp(&tb.name.to_lowercase()),
        SortBy::UsageCount => ta.quality.usage_count.cmp(&tb.quality.usage_count),
        SortBy::Recent => ta.updated_at.cmp(&tb.updated_at),
    };
    let primary = match order {
        SortOrder::Asc => primary,
        SortOrder::Desc => primary.reverse(),
    };
    primary.then_with(|| ta.id.cmp(&tb.id))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> SearchEngine {
        SearchEngine::new(Arc::new(TemplateCatalog::builtin().unwrap()))
    }

    #[test]
    fn test_empty_filter_returns_all() {
        let result = engine().search(&SearchFilter::default());
        assert_eq!(result.total, 6);
        assert_eq!(result.templates.len(), 6);
        assert_eq!(result.facets.authors[0].value, "system");
        assert_eq!(result.facets.authors[0].count, 6);
    }

    #[test]
    fn test_query_is_case_insensitive() {
        let filter = SearchFilter {
            query: Some("AUDIT".to_string()),
            ..Default::default()
        };
        let result = engine().search(&filter);
        assert_eq!(result.templates[0].id, "technical-audit-trail");
    }

    #[test]
    fn test_unknown_category_matches_nothing() {
        let filter = SearchFilter {
            categories: vec!["gardening".to_string()],
            ..Default::default()
        };
        let result = engine().search(&filter);
        assert_eq!(result.total, 0);
        assert!(result.templates.is_empty());
        assert!(result.facets.tags.is_empty());
    }

    #[test]
    fn test_unknown_category_ignored_beside_known_ones() {
        let filter = SearchFilter {
            categories: vec!["rbac".to_string(), "gardening".to_string()],
            complexity: vec!["intermediate".to_string(), "extreme".to_string()],
            ..Default::default()
        };
        let result = engine().search(&filter);
        assert_eq!(result.total, 1);
        assert_eq!(result.templates[0].id, "security-rbac-roles");
    }

    #[test]
    fn test_tags_any_match_and_rating_bounds() {
        let filter = SearchFilter {
            tags: vec!["security".to_string(), "inventory".to_string()],
            min_rating: Some(4.5),
            ..Default::default()
        };
        let result = engine().search(&filter);
        let ids: Vec<_> = result.templates.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["technical-audit-trail", "security-rbac-roles"]);
    }

    #[test]
    fn test_sort_by_usage_ascending() {
        let filter = SearchFilter {
            sort_by: SortBy::UsageCount,
            sort_order: SortOrder::Asc,
            ..Default::default()
        };
        let result = engine().search(&filter);
        let usage: Vec<u64> = result.templates.iter().map(|t| t.quality.usage_count).collect();
        let mut sorted = usage.clone();
        sorted.sort();
        assert_eq!(usage, sorted);
    }

    #[test]
    fn test_tag_facets_sorted_by_count() {
        let result = engine().search(&SearchFilter::default());
        assert_eq!(result.facets.tags[0].value, "security");
        assert_eq!(result.facets.tags[0].count, 2);
        for pair in result.facets.tags.windows(2) {
            assert!(pair[0].count >= pair[1].count);
        }
    }

    #[test]
    fn test_pages_do_not_overlap() {
        let engine = engine();
        let page = |offset| {
            engine.search(&SearchFilter {
                sort_by: SortBy::Rating,
                limit: Some(4),
                offset,
                ..Default::default()
            })
        };
        let first = page(0);
        let second = page(4);
        assert_eq!(first.templates.len(), 4);
        assert_eq!(second.templates.len(), 2);
        assert_eq!(first.facets, second.facets);
        for template in &second.templates {
            assert!(!first.templates.iter().any(|t| t.id == template.id));
        }
    }
}
