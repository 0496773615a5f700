//! Application reports
//!
//! Renders an [`ApplicationResult`] as a line-oriented text report whose
//! section order never changes, so reports from different runs diff cleanly:
//! - header: template name and version, status, applied element count
//! - conflicts resolved (only when there were conflicts)
//! - warnings (only when there were warnings)
//! - performance impact metrics (only when assessed)

use serde::{Deserialize, Serialize};

use crate::{application::ApplicationResult, error::Result};

/// One resolved conflict line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictLine {
    /// Display name of the existing element
    pub element: String,
    /// Resolution applied
    pub resolution: String,
}

/// One `key: value` metric line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricLine {
    /// Metric name
    pub key: String,
    /// Rendered value
    pub value: String,
}

/// Performance impact section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactSection {
    /// Coarse grade
    pub estimated_impact: String,
    /// Metrics in fixed order
    pub metrics: Vec<MetricLine>,
}

/// Structured form of an application report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationReport {
    /// Report title
    pub title: String,
    /// Template name
    pub template_name: String,
    /// Template version
    pub template_version: String,
    /// `SUCCESS` or `FAILED`
    pub status: String,
    /// Number of applied elements
    pub applied_elements: usize,
    /// Resolved conflicts
    pub conflicts: Vec<ConflictLine>,
    /// Warnings
    pub warnings: Vec<String>,
    /// Performance impact, when assessed
    pub performance_impact: Option<ImpactSection>,
}

/// Generates reports from application results
pub struct ReportGenerator;

impl ReportGenerator {
    /// Build the structured report
    pub fn generate(result: &ApplicationResult) -> ApplicationReport {
        let conflicts = result
            .conflicts
            .iter()
            .flatten()
            .map(|conflict| ConflictLine {
                element: conflict.existing.display_name().to_string(),
                resolution: conflict.resolution.as_str().to_string(),
            })
            .collect();

        let performance_impact = result.performance_impact.as_ref().map(|impact| ImpactSection {
            estimated_impact: impact.estimated_impact.as_str().to_string(),
            metrics: impact
                .metrics
                .entries()
                .into_iter()
                .map(|(key, value)| MetricLine {
                    key: key.to_string(),
                    value,
                })
                .collect(),
        });

        ApplicationReport {
            title: "Template Application Report".to_string(),
            template_name: result.template_name.clone(),
            template_version: result.template_version.clone(),
            status: if result.success { "SUCCESS" } else { "FAILED" }.to_string(),
            applied_elements: result.applied_elements.len(),
            conflicts,
            warnings: result.warnings.clone(),
            performance_impact,
        }
    }

    /// Render the report as text
    pub fn generate_text(result: &ApplicationResult) -> String {
        Self::format_report(&Self::generate(result))
    }

    /// Render the report as pretty JSON
    pub fn generate_json(result: &ApplicationResult) -> Result<String> {
        Ok(serde_json::to_string_pretty(&Self::generate(result))?)
    }

    fn format_report(report: &ApplicationReport) -> String {
        let mut lines = vec![
            report.title.clone(),
            "=".repeat(report.title.len()),
            format!("Template: {} v{}", report.template_name, report.template_version),
            format!("Status: {}", report.status),
            format!("Applied Elements: {}", report.applied_elements),
        ];

        if !report.conflicts.is_empty() {
            lines.push(String::new());
            lines.push(format!("Conflicts Resolved: {}", report.conflicts.len()));
            for conflict in &report.conflicts {
                lines.push(format!("  - {}: {}", conflict.element, conflict.resolution));
            }
        }

        if !report.warnings.is_empty() {
            lines.push(String::new());
            lines.push(format!("Warnings: {}", report.warnings.len()));
            for warning in &report.warnings {
                lines.push(format!("  - {}", warning));
            }
        }

        if let Some(impact) = &report.performance_impact {
            lines.push(String::new());
            lines.push(format!("Performance Impact: {}", impact.estimated_impact));
            for metric in &impact.metrics {
                lines.push(format!("  {}: {}", metric.key, metric.value));
            }
        }

        lines.join("\n")
    }
}

/// Render an application result as a text report
pub fn generate_application_report(result: &ApplicationResult) -> String {
    ReportGenerator::generate_text(result)
}

/// Render an application result as a JSON report
pub fn generate_application_report_json(result: &ApplicationResult) -> Result<String> {
    ReportGenerator::generate_json(result)
}
