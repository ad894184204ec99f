//! Validation report generation and display.
//!
//! A validation pass produces a flat list of [`Issue`]s; the report wraps
//! them with a verdict (`is_valid` is false iff anything reached error
//! severity) and renders to JSON, CSV, HTML, Markdown, or the terminal.

use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::Path;

/// Issue severity, ordered. Numeric rule scores in 0..1 bucket into these
/// at the configured thresholds (defaults 0.3 / 0.7 / 0.9).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Critical => "critical",
        }
    }

    /// Bucket a 0..1 score using the configured thresholds.
    pub fn from_score(score: f64, cfg: &audiopcb::config::ValidationConfig) -> Severity {
        if score >= cfg.critical_threshold {
            Severity::Critical
        } else if score >= cfg.error_threshold {
            Severity::Error
        } else if score >= cfg.warning_threshold {
            Severity::Warning
        } else {
            Severity::Info
        }
    }
}

/// Rule module that produced an issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    Drc,
    Connectivity,
    Power,
    Ground,
    SignalIntegrity,
    Emi,
    Thermal,
    Audio,
    Manufacturing,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Drc => "drc",
            Category::Connectivity => "connectivity",
            Category::Power => "power",
            Category::Ground => "ground",
            Category::SignalIntegrity => "signal-integrity",
            Category::Emi => "emi",
            Category::Thermal => "thermal",
            Category::Audio => "audio",
            Category::Manufacturing => "manufacturing",
        }
    }
}

/// A single finding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    pub severity: Severity,
    pub category: Category,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub affected_components: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub affected_nets: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub documentation_ref: Option<String>,
    /// Free-form modeling notes (e.g. which parasitics a prediction
    /// includes).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl Issue {
    pub fn new(severity: Severity, category: Category, message: impl Into<String>) -> Issue {
        Issue {
            severity,
            category,
            message: message.into(),
            suggestion: None,
            affected_components: Vec::new(),
            affected_nets: Vec::new(),
            documentation_ref: None,
            details: None,
        }
    }

    pub fn suggest(mut self, s: impl Into<String>) -> Issue {
        self.suggestion = Some(s.into());
        self
    }

    pub fn component(mut self, reference: impl Into<String>) -> Issue {
        self.affected_components.push(reference.into());
        self
    }

    pub fn net(mut self, name: impl Into<String>) -> Issue {
        self.affected_nets.push(name.into());
        self
    }

    pub fn doc(mut self, tag: impl Into<String>) -> Issue {
        self.documentation_ref = Some(tag.into());
        self
    }

    pub fn detail(mut self, d: impl Into<String>) -> Issue {
        self.details = Some(d.into());
        self
    }
}

/// Aggregated result of one validation pass. Immutable once returned; each
/// refinement iteration produces a fresh report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub is_valid: bool,
    pub timestamp: String,
    /// Set when the refinement budget or deadline ran out before fixed
    /// point.
    pub exhausted: bool,
    pub issues: Vec<Issue>,
}

impl ValidationReport {
    pub fn new(issues: Vec<Issue>) -> ValidationReport {
        let is_valid = !issues.iter().any(|i| i.severity >= Severity::Error);
        ValidationReport {
            is_valid,
            timestamp: unix_timestamp(),
            exhausted: false,
            issues,
        }
    }

    pub fn error_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity >= Severity::Error)
            .count()
    }

    pub fn count_at(&self, severity: Severity) -> usize {
        self.issues.iter().filter(|i| i.severity == severity).count()
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).expect("report serialization should not fail")
    }

    pub fn to_csv(&self) -> String {
        let mut out = String::from("severity,category,message,suggestion,components,nets\n");
        for issue in &self.issues {
            writeln!(
                out,
                "{},{},{},{},{},{}",
                issue.severity.as_str(),
                issue.category.as_str(),
                csv_field(&issue.message),
                csv_field(issue.suggestion.as_deref().unwrap_or("")),
                csv_field(&issue.affected_components.join(";")),
                csv_field(&issue.affected_nets.join(";")),
            )
            .expect("string write");
        }
        out
    }

    pub fn to_html(&self) -> String {
        let verdict = if self.is_valid { "VALID" } else { "INVALID" };
        let mut out = format!(
            "<html><head><title>Board validation report</title></head><body>\n\
             <h1>Board validation: {verdict}</h1>\n<p>timestamp: {}</p>\n<table border=\"1\">\n\
             <tr><th>Severity</th><th>Category</th><th>Message</th><th>Suggestion</th></tr>\n",
            self.timestamp
        );
        for issue in &self.issues {
            writeln!(
                out,
                "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
                issue.severity.as_str(),
                issue.category.as_str(),
                html_escape(&issue.message),
                html_escape(issue.suggestion.as_deref().unwrap_or("")),
            )
            .expect("string write");
        }
        out.push_str("</table></body></html>\n");
        out
    }

    pub fn to_markdown(&self) -> String {
        let verdict = if self.is_valid { "valid" } else { "INVALID" };
        let mut out = format!(
            "# Board validation report\n\nResult: **{verdict}** ({} issues, {} at error or above)\n\n\
             | Severity | Category | Message | Suggestion |\n|---|---|---|---|\n",
            self.issues.len(),
            self.error_count()
        );
        for issue in &self.issues {
            writeln!(
                out,
                "| {} | {} | {} | {} |",
                issue.severity.as_str(),
                issue.category.as_str(),
                issue.message.replace('|', "\\|"),
                issue.suggestion.as_deref().unwrap_or("-").replace('|', "\\|"),
            )
            .expect("string write");
        }
        out
    }

    pub fn save(&self, path: impl AsRef<Path>, format: ReportFormat) -> std::io::Result<()> {
        let text = match format {
            ReportFormat::Json => self.to_json(),
            ReportFormat::Csv => self.to_csv(),
            ReportFormat::Html => self.to_html(),
            ReportFormat::Markdown => self.to_markdown(),
        };
        std::fs::write(path, text)
    }

    /// Human-readable summary to the terminal.
    pub fn print_summary(&self) {
        println!("\n{}", "═".repeat(60).bold());
        println!("{}", " BOARD VALIDATION REPORT ".bold().on_blue());
        println!("{}", "═".repeat(60).bold());
        let verdict = if self.is_valid {
            "VALID".green().bold()
        } else {
            "INVALID".red().bold()
        };
        println!(
            "Result: {} | {} issue(s) | {} error+ | exhausted: {}",
            verdict,
            self.issues.len(),
            self.error_count(),
            self.exhausted
        );
        for issue in &self.issues {
            let tag = match issue.severity {
                Severity::Info => "info".dimmed(),
                Severity::Warning => "warn".yellow(),
                Severity::Error => "ERROR".red().bold(),
                Severity::Critical => "CRIT".red().bold().underline(),
            };
            println!("  [{}] {}: {}", tag, issue.category.as_str(), issue.message);
            if let Some(ref s) = issue.suggestion {
                println!("        {} {}", "→".dimmed(), s.dimmed());
            }
        }
        println!("{}\n", "═".repeat(60).bold());
    }

    /// Detailed table view.
    pub fn print_detailed(&self) {
        use tabled::{Table, Tabled};

        #[derive(Tabled)]
        struct Row {
            severity: String,
            category: String,
            message: String,
            nets: String,
            components: String,
        }

        let rows: Vec<Row> = self
            .issues
            .iter()
            .map(|i| Row {
                severity: i.severity.as_str().to_string(),
                category: i.category.as_str().to_string(),
                message: i.message.clone(),
                nets: i.affected_nets.join(", "),
                components: i.affected_components.join(", "),
            })
            .collect();
        if !rows.is_empty() {
            println!("\n{}", Table::new(rows));
        }
    }
}

/// Simple epoch-seconds timestamp without pulling in chrono.
fn unix_timestamp() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let duration = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    format!("{}", duration.as_secs())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Json,
    Csv,
    Html,
    Markdown,
}

impl ReportFormat {
    pub fn parse(name: &str) -> Option<ReportFormat> {
        Some(match name {
            "json" => ReportFormat::Json,
            "csv" => ReportFormat::Csv,
            "html" => ReportFormat::Html,
            "markdown" | "md" => ReportFormat::Markdown,
            _ => return None,
        })
    }
}

fn csv_field(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}
