/// Source units and the diagnostics collected while compiling them

use std::fmt;
use std::fs;
use std::path::Path;

use serde::Serialize;
use shared_library_parser::{ModuleNode, Span};

use crate::driver::Phase;
use crate::error::{CompileError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// A message attached to a source unit, optionally at a position
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub message: String,
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub span: Option<Span>,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>, span: Option<Span>) -> Self {
        Self {
            message: message.into(),
            severity: Severity::Error,
            span,
        }
    }

    pub fn warning(message: impl Into<String>, span: Option<Span>) -> Self {
        Self {
            message: message.into(),
            severity: Severity::Warning,
            span,
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        match self.span {
            Some(span) => write!(f, "{}: {}: {}", span, label, self.message),
            None => write!(f, "{}: {}", label, self.message),
        }
    }
}

/// Collects diagnostics for one source unit.
///
/// Errors never stop the current phase; the host checks the collector once
/// the phase is over and fails the unit if anything went wrong.
#[derive(Debug, Default)]
pub struct ErrorCollector {
    diagnostics: Vec<Diagnostic>,
    failed_phase: Option<Phase>,
}

impl ErrorCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a diagnostic and keep going
    pub fn add_error_and_continue(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    /// Mark the unit as failed in `phase`. The earliest reported phase wins.
    pub fn report_phase_failure(&mut self, phase: Phase) {
        match self.failed_phase {
            Some(existing) if existing <= phase => {}
            _ => self.failed_phase = Some(phase),
        }
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.is_error())
    }

    pub fn has_errors(&self) -> bool {
        self.errors().next().is_some()
    }

    pub fn failed_phase(&self) -> Option<Phase> {
        self.failed_phase
    }

    /// End-of-phase check. Returns true if the unit has failed, either
    /// because an error was collected or because a failure was reported.
    pub fn fail_if_errors(&mut self, phase: Phase) -> bool {
        if self.has_errors() {
            self.report_phase_failure(phase);
        }
        self.failed_phase.is_some()
    }
}

/// One script being compiled: its text, its tree once parsed, and its errors
#[derive(Debug)]
pub struct SourceUnit {
    name: String,
    text: String,
    ast: Option<ModuleNode>,
    errors: ErrorCollector,
}

impl SourceUnit {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
            ast: None,
            errors: ErrorCollector::new(),
        }
    }

    /// Read a script from disk; the unit is named after its path
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(CompileError::FileNotFound(path.to_path_buf()));
        }
        let text = fs::read_to_string(path)?;
        Ok(Self::new(path.display().to_string(), text))
    }

    /// A unit whose tree was produced elsewhere; parsing is skipped for it
    pub fn from_ast(name: impl Into<String>, ast: ModuleNode) -> Self {
        Self {
            name: name.into(),
            text: String::new(),
            ast: Some(ast),
            errors: ErrorCollector::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn ast(&self) -> Option<&ModuleNode> {
        self.ast.as_ref()
    }

    pub fn ast_mut(&mut self) -> Option<&mut ModuleNode> {
        self.ast.as_mut()
    }

    pub(crate) fn set_ast(&mut self, ast: ModuleNode) {
        self.ast = Some(ast);
    }

    pub fn errors(&self) -> &ErrorCollector {
        &self.errors
    }

    pub fn errors_mut(&mut self) -> &mut ErrorCollector {
        &mut self.errors
    }

    pub fn add_error_and_continue(&mut self, diagnostic: Diagnostic) {
        self.errors.add_error_and_continue(diagnostic);
    }

    pub fn report_phase_failure(&mut self, phase: Phase) {
        self.errors.report_phase_failure(phase);
    }

    pub fn has_failed(&self) -> bool {
        self.errors.failed_phase().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warnings_do_not_fail_phase() {
        let mut errors = ErrorCollector::new();
        errors.add_error_and_continue(Diagnostic::warning("unused import", None));
        assert!(!errors.fail_if_errors(Phase::Conversion));
        assert_eq!(errors.failed_phase(), None);
    }

    #[test]
    fn test_errors_fail_phase() {
        let mut errors = ErrorCollector::new();
        errors.add_error_and_continue(Diagnostic::error("bad", Some(Span::new(2, 1))));
        assert!(errors.fail_if_errors(Phase::Conversion));
        assert_eq!(errors.failed_phase(), Some(Phase::Conversion));
    }

    #[test]
    fn test_earliest_failure_is_kept() {
        let mut errors = ErrorCollector::new();
        errors.report_phase_failure(Phase::SemanticAnalysis);
        errors.report_phase_failure(Phase::Conversion);
        errors.report_phase_failure(Phase::SemanticAnalysis);
        assert_eq!(errors.failed_phase(), Some(Phase::Conversion));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Jenkinsfile");
        fs::write(&path, "@SharedLibrary('utils') _").unwrap();
        let unit = SourceUnit::from_file(&path).unwrap();
        assert_eq!(unit.text(), "@SharedLibrary('utils') _");
        assert_eq!(unit.name(), path.display().to_string());

        let missing = SourceUnit::from_file(dir.path().join("nope")).unwrap_err();
        assert!(matches!(missing, CompileError::FileNotFound(_)));
    }

    #[test]
    fn test_diagnostic_display() {
        let d = Diagnostic::error("@SharedLibrary was missing a path", Some(Span::new(3, 1)));
        assert_eq!(d.to_string(), "3:1: error: @SharedLibrary was missing a path");
        let d = Diagnostic::warning("ignored", None);
        assert_eq!(d.to_string(), "warning: ignored");
    }

    #[test]
    fn test_diagnostic_serializes_without_missing_span() {
        let d = Diagnostic::error("Loading shared libraries failed", None);
        let json = serde_json::to_value(&d).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"message": "Loading shared libraries failed", "severity": "error"})
        );
    }
}
