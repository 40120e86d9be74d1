//! Diagnostics reported while binding the references of a compilation.
//!
//! Binding never fails as a whole. Unreadable files, duplicate references, version
//! unification and references that bind to nothing are recorded here instead, and the affected
//! references degrade to missing symbols or are left out.
//!
//! # Examples
//!
//! ```rust,no_run
//! use dotbind::compilation::{Compilation, CompilationOptions, DiagnosticKind, MetadataReference};
//!
//! let compilation = Compilation::create(
//!     "App",
//!     vec![MetadataReference::file("Missing.dll")],
//!     CompilationOptions::default(),
//! );
//!
//! for diagnostic in compilation.diagnostics().iter() {
//!     println!("{diagnostic}");
//! }
//! assert!(!compilation.diagnostics().by_kind(DiagnosticKind::MetadataFileNotFound).is_empty());
//! ```

use std::fmt;

use strum::{Display, EnumIter};

/// Severity level of a diagnostic entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticSeverity {
    /// Binding succeeded, possibly with a different result than the reference asked for
    Warning,
    /// A reference could not be used
    Error,
}

impl fmt::Display for DiagnosticSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticSeverity::Warning => write!(f, "WARN"),
            DiagnosticSeverity::Error => write!(f, "ERROR"),
        }
    }
}

/// What a diagnostic reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum DiagnosticKind {
    /// Two references provide different versions of the same assembly; both are kept
    DuplicateImport,
    /// An assembly is referenced both with and without type embedding
    AssemblySpecifiedForLinkAndRef,
    /// Two module references have the same module name
    DuplicateModuleName,
    /// An `AssemblyRef` bound to a higher version of the requested assembly
    VersionUnified,
    /// An `AssemblyRef` bound to nothing
    MissingAssembly,
    /// No reference provides the core library
    MissingCorLibrary,
    /// A referenced file does not exist
    MetadataFileNotFound,
    /// A referenced file could not be read or parsed
    MetadataReadError,
}

impl DiagnosticKind {
    /// The severity diagnostics of this kind are reported with
    #[must_use]
    pub fn severity(self) -> DiagnosticSeverity {
        match self {
            DiagnosticKind::AssemblySpecifiedForLinkAndRef
            | DiagnosticKind::VersionUnified
            | DiagnosticKind::MissingAssembly => DiagnosticSeverity::Warning,
            DiagnosticKind::DuplicateImport
            | DiagnosticKind::DuplicateModuleName
            | DiagnosticKind::MissingCorLibrary
            | DiagnosticKind::MetadataFileNotFound
            | DiagnosticKind::MetadataReadError => DiagnosticSeverity::Error,
        }
    }
}

/// A single diagnostic entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// What is reported
    pub kind: DiagnosticKind,
    /// Severity, derived from `kind`
    pub severity: DiagnosticSeverity,
    /// Human-readable description
    pub message: String,
}

impl Diagnostic {
    /// Creates a new diagnostic entry
    ///
    /// # Arguments
    /// * `kind`    - What is reported
    /// * `message` - Human-readable description
    pub fn new(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity: kind.severity(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.severity, self.kind, self.message)
    }
}

/// Thread-safe, append-only collection of diagnostics.
///
/// Uses `boxcar::Vec` so that references loaded in parallel can report without
/// synchronization.
#[derive(Debug)]
pub struct Diagnostics {
    entries: boxcar::Vec<Diagnostic>,
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self::new()
    }
}

impl Diagnostics {
    /// Creates a new empty diagnostics container
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: boxcar::Vec::new(),
        }
    }

    /// Adds a diagnostic of `kind`
    pub fn report(&self, kind: DiagnosticKind, message: impl Into<String>) {
        self.push(Diagnostic::new(kind, message));
    }

    /// Adds a diagnostic entry
    pub fn push(&self, diagnostic: Diagnostic) {
        self.entries.push(diagnostic);
    }

    /// Returns true if any diagnostics have been collected
    pub fn has_any(&self) -> bool {
        self.entries.count() > 0
    }

    /// Returns true if any error-level diagnostics have been collected
    pub fn has_errors(&self) -> bool {
        self.iter()
            .any(|diagnostic| diagnostic.severity == DiagnosticSeverity::Error)
    }

    /// Returns the total number of diagnostics
    pub fn count(&self) -> usize {
        self.entries.count()
    }

    /// Returns an iterator over all diagnostics, in report order
    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter().map(|(_, diagnostic)| diagnostic)
    }

    /// Returns all diagnostics of `kind`
    pub fn by_kind(&self, kind: DiagnosticKind) -> Vec<&Diagnostic> {
        self.iter()
            .filter(|diagnostic| diagnostic.kind == kind)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn collects_in_order() {
        let diagnostics = Diagnostics::new();
        assert!(!diagnostics.has_any());

        diagnostics.report(DiagnosticKind::VersionUnified, "first");
        assert!(!diagnostics.has_errors());

        diagnostics.report(DiagnosticKind::MissingCorLibrary, "second");
        assert!(diagnostics.has_errors());
        assert_eq!(diagnostics.count(), 2);

        let messages: Vec<_> = diagnostics.iter().map(|d| d.message.as_str()).collect();
        assert_eq!(messages, ["first", "second"]);
        assert_eq!(diagnostics.by_kind(DiagnosticKind::VersionUnified).len(), 1);
    }

    #[test]
    fn display() {
        let diagnostic = Diagnostic::new(DiagnosticKind::MissingAssembly, "Lib, Version=1.0.0.0");
        assert_eq!(
            diagnostic.to_string(),
            "[WARN] MissingAssembly: Lib, Version=1.0.0.0"
        );
    }

    #[test]
    fn every_kind_has_a_severity() {
        let errors = DiagnosticKind::iter()
            .filter(|kind| kind.severity() == DiagnosticSeverity::Error)
            .count();
        assert_eq!(errors, 5);
    }
}
