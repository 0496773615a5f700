//! Core data models for schema templates

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use heck::ToSnakeCase;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Free-form element properties (`name`, `type`, `required`, `validation`, ...)
pub type Properties = Map<String, Value>;

/// Kind of a schema element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    /// Data field
    #[default]
    Field,
    /// Relationship to another resource
    Relationship,
    /// Security rule
    Security,
    /// Validation rule
    Validation,
    /// Index definition
    Index,
}

/// One entry of a working schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaElement {
    /// Structural identity, assigned by the caller
    pub id: String,
    /// Element kind
    #[serde(rename = "type", default)]
    pub kind: ElementKind,
    /// Display label
    #[serde(default)]
    pub name: String,
    /// Element properties; `properties.name` is the human-facing identity
    #[serde(default)]
    pub properties: Properties,
}

impl SchemaElement {
    /// Creates an element with no properties
    pub fn new(id: impl Into<String>, kind: ElementKind, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            name: name.into(),
            properties: Properties::new(),
        }
    }

    /// Creates a field element whose `properties.name` mirrors its name
    pub fn field(id: impl Into<String>, name: impl Into<String>) -> Self {
        let name = name.into();
        Self::new(id, ElementKind::Field, name.clone()).with_property("name", name)
    }

    /// Creates a relationship element pointing at `target`
    pub fn relationship(
        id: impl Into<String>,
        name: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        let name = name.into();
        Self::new(id, ElementKind::Relationship, name.clone())
            .with_property("name", name)
            .with_property("target", target.into())
    }

    /// Sets a property, returning the element
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Gets a property value
    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    /// Human-facing name: `properties.name` when set, else the element name
    pub fn display_name(&self) -> &str {
        match self.properties.get("name").and_then(Value::as_str) {
            Some(name) if !name.is_empty() => name,
            _ => &self.name,
        }
    }

    /// Normalized display name used for identity checks
    pub fn normalized_name(&self) -> String {
        normalize_name(self.display_name())
    }

    /// Declared `properties.type`, if any
    pub fn declared_type(&self) -> Option<&Value> {
        self.properties.get("type")
    }

    /// Whether a boolean property is set to `true`
    pub fn flag(&self, key: &str) -> bool {
        matches!(self.properties.get(key), Some(Value::Bool(true)))
    }

    /// Whether the element carries non-empty validation rules
    pub fn has_validation_rules(&self) -> bool {
        match self.properties.get("validation") {
            None | Some(Value::Null) => false,
            Some(Value::Object(rules)) => !rules.is_empty(),
            Some(Value::Array(rules)) => !rules.is_empty(),
            Some(Value::String(rule)) => !rule.is_empty(),
            Some(_) => true,
        }
    }
}

/// Normalizes a name for comparison: trimmed and snake_cased, so `Email`,
/// `email` and ` email ` compare equal and `firstName` matches `first_name`
pub fn normalize_name(name: &str) -> String {
    name.trim().to_snake_case()
}

/// Template category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateCategory {
    /// HR management
    HrManagement,
    /// Employee profile
    EmployeeProfile,
    /// Organization structure
    Organization,
    /// Financial services
    FinancialServices,
    /// Audit trail
    AuditTrail,
    /// Data encryption
    DataEncryption,
    /// E-commerce
    Ecommerce,
    /// Product catalog
    ProductCatalog,
    /// Order management
    OrderManagement,
    /// Role-based access control
    Rbac,
    /// Permission management
    PermissionManagement,
    /// User management
    UserManagement,
    /// Version control
    VersionControl,
    /// Soft delete
    SoftDelete,
    /// PII protection
    PiiProtection,
    /// GDPR compliance
    GdprCompliance,
    /// Healthcare
    Healthcare,
    /// Education
    Education,
}

impl TemplateCategory {
    /// Every category, in declaration order
    pub const ALL: [TemplateCategory; 18] = [
        Self::HrManagement,
        Self::EmployeeProfile,
        Self::Organization,
        Self::FinancialServices,
        Self::AuditTrail,
        Self::DataEncryption,
        Self::Ecommerce,
        Self::ProductCatalog,
        Self::OrderManagement,
        Self::Rbac,
        Self::PermissionManagement,
        Self::UserManagement,
        Self::VersionControl,
        Self::SoftDelete,
        Self::PiiProtection,
        Self::GdprCompliance,
        Self::Healthcare,
        Self::Education,
    ];

    /// Snake-case name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HrManagement => "hr_management",
            Self::EmployeeProfile => "employee_profile",
            Self::Organization => "organization",
            Self::FinancialServices => "financial_services",
            Self::AuditTrail => "audit_trail",
            Self::DataEncryption => "data_encryption",
            Self::Ecommerce => "ecommerce",
            Self::ProductCatalog => "product_catalog",
            Self::OrderManagement => "order_management",
            Self::Rbac => "rbac",
            Self::PermissionManagement => "permission_management",
            Self::UserManagement => "user_management",
            Self::VersionControl => "version_control",
            Self::SoftDelete => "soft_delete",
            Self::PiiProtection => "pii_protection",
            Self::GdprCompliance => "gdpr_compliance",
            Self::Healthcare => "healthcare",
            Self::Education => "education",
        }
    }

    /// Categories considered close enough to count as a partial match
    pub fn related(&self) -> &'static [TemplateCategory] {
        use TemplateCategory::*;
        match self {
            HrManagement => &[EmployeeProfile, Organization],
            FinancialServices => &[AuditTrail, DataEncryption],
            Ecommerce => &[ProductCatalog, OrderManagement],
            Rbac => &[PermissionManagement, UserManagement],
            AuditTrail => &[VersionControl, SoftDelete],
            DataEncryption => &[PiiProtection, GdprCompliance],
            _ => &[],
        }
    }

    /// Whether two categories are related in either direction
    pub fn is_related_to(&self, other: TemplateCategory) -> bool {
        self.related().contains(&other) || other.related().contains(self)
    }
}

impl fmt::Display for TemplateCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TemplateCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("unknown template category: {}", s))
    }
}

/// Template complexity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateComplexity {
    /// A handful of plain fields
    Basic,
    /// Validation rules and a relationship or two
    Intermediate,
    /// Cross-cutting structure
    Advanced,
    /// Full enterprise bundle
    Enterprise,
}

impl TemplateComplexity {
    /// Every level, ascending
    pub const ALL: [TemplateComplexity; 4] =
        [Self::Basic, Self::Intermediate, Self::Advanced, Self::Enterprise];

    /// Snake-case name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Intermediate => "intermediate",
            Self::Advanced => "advanced",
            Self::Enterprise => "enterprise",
        }
    }

    /// Level suited to a team of the given size
    pub fn for_team_size(team_size: u32) -> Self {
        match team_size {
            0..=3 => Self::Basic,
            4..=10 => Self::Intermediate,
            11..=50 => Self::Advanced,
            _ => Self::Enterprise,
        }
    }
}

impl fmt::Display for TemplateComplexity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TemplateComplexity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("unknown template complexity: {}", s))
    }
}

/// Quality metadata of a template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityMetrics {
    /// Performance score (0-100)
    pub performance_score: f64,
    /// Security score (0-100)
    pub security_score: f64,
    /// Maintainability score (0-100)
    pub maintainability_score: f64,
    /// Best practices score (0-100)
    pub best_practices_score: f64,
    /// Community rating (0-5)
    pub community_rating: f64,
    /// Number of projects using the template
    pub usage_count: u64,
}

impl QualityMetrics {
    /// Average of the four quality scores (0-100)
    pub fn composite(&self) -> f64 {
        (self.performance_score
            + self.security_score
            + self.maintainability_score
            + self.best_practices_score)
            / 4.0
    }
}

impl Default for QualityMetrics {
    fn default() -> Self {
        Self {
            performance_score: 85.0,
            security_score: 90.0,
            maintainability_score: 88.0,
            best_practices_score: 92.0,
            community_rating: 4.5,
            usage_count: 0,
        }
    }
}

/// Template author
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateAuthor {
    /// Author id
    pub id: String,
    /// Display name
    pub name: String,
}

impl Default for TemplateAuthor {
    fn default() -> Self {
        Self {
            id: "system".to_string(),
            name: "System Templates".to_string(),
        }
    }
}

/// Technical compatibility of a template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateCompatibility {
    /// Lowest meta-contract spec version the template targets
    pub min_spec_version: String,
    /// Supported databases; empty means unrestricted
    pub supported_databases: Vec<String>,
    /// Supported API frameworks; empty means unrestricted
    pub supported_frameworks: Vec<String>,
    /// Template ids this template builds on
    pub dependencies: Vec<String>,
    /// Categories this template clashes with
    pub conflicts: Vec<String>,
}

impl Default for TemplateCompatibility {
    fn default() -> Self {
        Self {
            min_spec_version: "1.0".to_string(),
            supported_databases: Vec::new(),
            supported_frameworks: Vec::new(),
            dependencies: Vec::new(),
            conflicts: Vec::new(),
        }
    }
}

/// A reusable, versioned bundle of schema elements
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    /// Unique identifier
    pub id: String,
    /// Human-readable name
    pub name: String,
    /// Description
    #[serde(default)]
    pub description: String,
    /// Template version
    pub version: String,
    /// Category
    pub category: TemplateCategory,
    /// Complexity level
    pub complexity: TemplateComplexity,
    /// Elements, in application order
    #[serde(default)]
    pub elements: Vec<SchemaElement>,
    /// Quality metadata
    #[serde(default)]
    pub quality: QualityMetrics,
    /// Tags
    #[serde(default)]
    pub tags: Vec<String>,
    /// Keywords
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Technical compatibility
    #[serde(default)]
    pub compatibility: TemplateCompatibility,
    /// Author
    #[serde(default)]
    pub author: TemplateAuthor,
    /// Last update time
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Template {
    /// Creates an empty template
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        category: TemplateCategory,
        complexity: TemplateComplexity,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            version: "1.0.0".to_string(),
            category,
            complexity,
            elements: Vec::new(),
            quality: QualityMetrics::default(),
            tags: Vec::new(),
            keywords: Vec::new(),
            compatibility: TemplateCompatibility::default(),
            author: TemplateAuthor::default(),
            updated_at: None,
        }
    }

    /// Replaces the element list
    pub fn with_elements(mut self, elements: Vec<SchemaElement>) -> Self {
        self.elements = elements;
        self
    }
}
