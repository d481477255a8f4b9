//! Diagnostics collected while validating a generator table.
//!
//! Validation never stops at the first problem: every issue is recorded with
//! the offending unit and, where relevant, the bucket, so a malformed table can
//! be fixed in one pass. Warnings are informational; any error makes the table
//! unusable for a merit-order build.
//!
//! # Example
//!
//! ```
//! use merit_core::diagnostics::Diagnostics;
//!
//! let mut diag = Diagnostics::new();
//! diag.add_warning_with_entity("capacity", "unit never available", "12_1");
//! diag.add_bucket_error("capacity", "negative capacity", "12_2", 7);
//!
//! assert_eq!(diag.warning_count(), 1);
//! assert_eq!(diag.error_count(), 1);
//! ```

use crate::{GeneratorTable, MeritError, MeritResult};
use serde::Serialize;
use std::collections::HashSet;

/// Severity level for diagnostic issues
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Unusual but usable (e.g., a unit with zero capacity all year)
    Warning,
    /// Makes the table unusable (e.g., a non-finite heat rate)
    Error,
}

/// A single diagnostic issue
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticIssue {
    pub severity: Severity,
    /// Category for grouping (e.g., "capacity", "fraction", "identity")
    pub category: String,
    pub message: String,
    /// Offending unit key
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity: Option<String>,
    /// Offending bucket (1-based)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bucket: Option<usize>,
}

impl DiagnosticIssue {
    pub fn new(
        severity: Severity,
        category: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            category: category.into(),
            message: message.into(),
            entity: None,
            bucket: None,
        }
    }

    pub fn with_entity(mut self, entity: impl Into<String>) -> Self {
        self.entity = Some(entity.into());
        self
    }

    pub fn with_bucket(mut self, bucket: usize) -> Self {
        self.bucket = Some(bucket);
        self
    }
}

impl std::fmt::Display for DiagnosticIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let severity = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };

        write!(f, "[{}:{}] {}", severity, self.category, self.message)?;

        if let Some(entity) = &self.entity {
            write!(f, " (unit {})", entity)?;
        }
        if let Some(bucket) = self.bucket {
            write!(f, " in bucket {}", bucket)?;
        }

        Ok(())
    }
}

/// Collection of diagnostic issues for one validation pass
#[derive(Debug, Clone, Default, Serialize)]
pub struct Diagnostics {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<DiagnosticIssue>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, issue: DiagnosticIssue) {
        self.issues.push(issue);
    }

    pub fn add_warning(&mut self, category: &str, message: &str) {
        self.issues
            .push(DiagnosticIssue::new(Severity::Warning, category, message));
    }

    pub fn add_warning_with_entity(&mut self, category: &str, message: &str, entity: &str) {
        self.issues
            .push(DiagnosticIssue::new(Severity::Warning, category, message).with_entity(entity));
    }

    pub fn add_error_with_entity(&mut self, category: &str, message: &str, entity: &str) {
        self.issues
            .push(DiagnosticIssue::new(Severity::Error, category, message).with_entity(entity));
    }

    pub fn add_bucket_error(&mut self, category: &str, message: &str, entity: &str, bucket: usize) {
        self.issues.push(
            DiagnosticIssue::new(Severity::Error, category, message)
                .with_entity(entity)
                .with_bucket(bucket),
        );
    }

    pub fn warning_count(&self) -> usize {
        self.warnings().count()
    }

    pub fn error_count(&self) -> usize {
        self.errors().count()
    }

    pub fn has_errors(&self) -> bool {
        self.issues.iter().any(|i| i.severity == Severity::Error)
    }

    pub fn errors(&self) -> impl Iterator<Item = &DiagnosticIssue> {
        self.issues.iter().filter(|i| i.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &DiagnosticIssue> {
        self.issues
            .iter()
            .filter(|i| i.severity == Severity::Warning)
    }

    pub fn summary(&self) -> String {
        let warnings = self.warning_count();
        let errors = self.error_count();

        match (warnings, errors) {
            (0, 0) => "No issues".to_string(),
            (w, 0) => format!("{} warning{}", w, if w == 1 { "" } else { "s" }),
            (0, e) => format!("{} error{}", e, if e == 1 { "" } else { "s" }),
            (w, e) => format!(
                "{} warning{}, {} error{}",
                w,
                if w == 1 { "" } else { "s" },
                e,
                if e == 1 { "" } else { "s" }
            ),
        }
    }

    /// Turn collected errors into a [`MeritError::Validation`]; warnings pass through.
    pub fn into_result(self) -> MeritResult<Diagnostics> {
        if !self.has_errors() {
            return Ok(self);
        }
        let details: Vec<String> = self.errors().take(5).map(|i| i.to_string()).collect();
        Err(MeritError::Validation(format!(
            "{}: {}",
            self.summary(),
            details.join("; ")
        )))
    }
}

impl std::fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Diagnostics: {}", self.summary())?;
        for issue in &self.issues {
            writeln!(f, "  {}", issue)?;
        }
        Ok(())
    }
}

/// Check a generator table before any merit order is built from it.
pub fn validate_generator_table(table: &GeneratorTable) -> Diagnostics {
    let mut diag = Diagnostics::new();
    let expected = table.bucket_count();

    if table.units.iter().all(|u| u.role.is_sentinel()) {
        diag.add_warning("identity", "generator table has no regular units");
    }

    let mut seen = HashSet::new();
    for unit in &table.units {
        let id = unit.id.as_str();
        if !seen.insert(id) {
            diag.add_error_with_entity("identity", "duplicate unit key", id);
        }
        if unit.buckets.len() != expected {
            diag.add_error_with_entity(
                "buckets",
                &format!("expected {expected} buckets, found {}", unit.buckets.len()),
                id,
            );
        }
        if !(0.0..=1.0).contains(&unit.min_out_fraction) {
            diag.add_error_with_entity(
                "fraction",
                &format!("minimum-output fraction {} outside [0, 1]", unit.min_out_fraction),
                id,
            );
        }
        if !unit.vom.is_finite() {
            diag.add_error_with_entity("cost", "variable operating cost is not finite", id);
        }

        for (i, attrs) in unit.buckets.iter().enumerate() {
            let bucket = i + 1;
            if !attrs.is_finite() {
                diag.add_bucket_error("attributes", "non-finite attribute", id, bucket);
            } else if attrs.capacity_mw < 0.0 {
                diag.add_bucket_error(
                    "capacity",
                    &format!("negative capacity {}", attrs.capacity_mw),
                    id,
                    bucket,
                );
            }
        }

        if !unit.role.is_sentinel()
            && !unit.buckets.is_empty()
            && unit.buckets.iter().all(|b| b.capacity_mw == 0.0)
        {
            diag.add_warning_with_entity("capacity", "unit has zero capacity in every bucket", id);
        }
    }

    diag
}
