//! Accumulated validation findings.

use serde::{Deserialize, Serialize};

use crate::catalog::SbdhErrorKind;

/// Severity of a finding. Only errors make extraction fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorLevel {
    Warning,
    Error,
}

/// One finding of one rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationEntry {
    pub level: ErrorLevel,
    /// Path of the checked field, e.g. `StandardBusinessDocumentHeader/HeaderVersion`
    pub field_path: String,
    pub kind: SbdhErrorKind,
    pub message: String,
}

/// All findings of one validation run, in rule order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ErrorReport {
    entries: Vec<ValidationEntry>,
}

impl ErrorReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: ValidationEntry) {
        self.entries.push(entry);
    }

    /// Add an error-level finding.
    pub fn add_error(
        &mut self,
        field_path: impl Into<String>,
        kind: SbdhErrorKind,
        message: impl Into<String>,
    ) {
        self.push(ValidationEntry {
            level: ErrorLevel::Error,
            field_path: field_path.into(),
            kind,
            message: message.into(),
        });
    }

    /// Add a warning-level finding.
    pub fn add_warning(
        &mut self,
        field_path: impl Into<String>,
        kind: SbdhErrorKind,
        message: impl Into<String>,
    ) {
        self.push(ValidationEntry {
            level: ErrorLevel::Warning,
            field_path: field_path.into(),
            kind,
            message: message.into(),
        });
    }

    pub fn entries(&self) -> &[ValidationEntry] {
        &self.entries
    }

    /// Error-level findings only.
    pub fn errors(&self) -> impl Iterator<Item = &ValidationEntry> {
        self.entries
            .iter()
            .filter(|e| e.level == ErrorLevel::Error)
    }

    /// Warning-level findings only.
    pub fn warnings(&self) -> impl Iterator<Item = &ValidationEntry> {
        self.entries
            .iter()
            .filter(|e| e.level == ErrorLevel::Warning)
    }

    pub fn first_error(&self) -> Option<&ValidationEntry> {
        self.errors().next()
    }

    pub fn has_errors(&self) -> bool {
        self.first_error().is_some()
    }

    /// Error messages joined by newlines.
    pub fn error_text(&self) -> String {
        self.errors()
            .map(|e| e.message.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Whether any entry, error or warning, has the given kind.
    pub fn contains_kind(&self, kind: SbdhErrorKind) -> bool {
        self.entries.iter().any(|e| e.kind == kind)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ValidationEntry> {
        self.entries.iter()
    }
}

impl<'a> IntoIterator for &'a ErrorReport {
    type Item = &'a ValidationEntry;
    type IntoIter = std::slice::Iter<'a, ValidationEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
