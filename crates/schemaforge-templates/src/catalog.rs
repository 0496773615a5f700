//! Read-only template catalog
//!
//! The catalog is built once and shared (typically behind an `Arc`) by the
//! recommendation and search engines. It preserves insertion order and
//! rejects duplicate template ids.

use std::{collections::HashMap, path::Path};

use tracing::debug;

use crate::{
    error::{Result, TemplateError},
    models::{Template, TemplateCategory, TemplateComplexity},
};

const BUILTIN_TEMPLATES: &str = include_str!("../templates/builtin.yaml");

/// An ordered, id-indexed collection of templates
#[derive(Debug, Clone, Default)]
pub struct TemplateCatalog {
    templates: Vec<Template>,
    index: HashMap<String, usize>,
}

impl TemplateCatalog {
    /// Build a catalog, failing on duplicate or empty ids
    pub fn new(templates: Vec<Template>) -> Result<Self> {
        let mut index = HashMap::with_capacity(templates.len());
        for (position, template) in templates.iter().enumerate() {
            if template.id.trim().is_empty() {
                return Err(TemplateError::validation(format!(
                    "template '{}' has an empty id",
                    template.name
                )));
            }
            if index.insert(template.id.clone(), position).is_some() {
                return Err(TemplateError::DuplicateTemplate(template.id.clone()));
            }
        }

        debug!(templates = templates.len(), "Template catalog built");
        Ok(Self { templates, index })
    }

    /// The stock templates shipped with the engine
    pub fn builtin() -> Result<Self> {
        Self::from_yaml_str(BUILTIN_TEMPLATES)
    }

    /// Parse a YAML sequence of templates
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let templates: Vec<Template> = serde_yaml::from_str(yaml)?;
        Self::new(templates)
    }

    /// Parse a JSON array of templates
    pub fn from_json_str(json: &str) -> Result<Self> {
        let templates: Vec<Template> = serde_json::from_str(json)?;
        Self::new(templates)
    }

    /// Load a catalog file; `.json` is parsed as JSON, anything else as YAML
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&content),
            _ => Self::from_yaml_str(&content),
        }
    }

    /// Look up a template by id
    pub fn get(&self, id: &str) -> Option<&Template> {
        self.index.get(id).map(|&position| &self.templates[position])
    }

    /// Look up a template by id, failing when absent
    pub fn require(&self, id: &str) -> Result<&Template> {
        self.get(id)
            .ok_or_else(|| TemplateError::TemplateNotFound(id.to_string()))
    }

    /// Templates in a category, in catalog order
    pub fn by_category(&self, category: TemplateCategory) -> Vec<&Template> {
        self.templates.iter().filter(|t| t.category == category).collect()
    }

    /// Templates of a complexity, in catalog order
    pub fn by_complexity(&self, complexity: TemplateComplexity) -> Vec<&Template> {
        self.templates
            .iter()
            .filter(|t| t.complexity == complexity)
            .collect()
    }

    /// All templates in catalog order
    pub fn iter(&self) -> impl Iterator<Item = &Template> {
        self.templates.iter()
    }

    /// All templates as a slice
    pub fn templates(&self) -> &[Template] {
        &self.templates
    }

    /// Number of templates
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    /// Whether the catalog is empty
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}
