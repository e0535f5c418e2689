/// Error types for shared library resolution and the compilation host

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::driver::Phase;
use crate::source::Diagnostic;

pub type Result<T> = std::result::Result<T, CompileError>;

/// Failure of a compilation run as seen by the host
#[derive(Error, Debug)]
pub enum CompileError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Compilation of {unit} failed during {phase}:\n{}", format_diagnostics(.diagnostics))]
    PhaseFailed {
        unit: String,
        phase: Phase,
        diagnostics: Vec<Diagnostic>,
    },

    #[error("Customizer failed on {unit} during {phase}: {source}")]
    Customizer {
        unit: String,
        phase: Phase,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl CompileError {
    pub fn customizer(
        unit: impl Into<String>,
        phase: Phase,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        CompileError::Customizer {
            unit: unit.into(),
            phase,
            source: Box::new(source),
        }
    }
}

fn format_diagnostics(diagnostics: &[Diagnostic]) -> String {
    diagnostics
        .iter()
        .map(|d| format!("  - {}", d))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Failure to turn a library name and execution URL into a checkout path
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("No shared library names were given")]
    NoLibraries,

    #[error("Workspace root is not configured (set JENKINS_HOME)")]
    MissingWorkspaceRoot,

    #[error("Cannot derive a job path from execution URL '{url}': {reason}")]
    MalformedExecutionUrl { url: String, reason: String },

    #[error("Invalid shared library name '{name}': {reason}")]
    InvalidLibraryName { name: String, reason: String },
}

impl ResolutionError {
    pub fn malformed_url(url: impl Into<String>, reason: impl Into<String>) -> Self {
        ResolutionError::MalformedExecutionUrl {
            url: url.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_name(name: impl Into<String>, reason: impl Into<String>) -> Self {
        ResolutionError::InvalidLibraryName {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

/// Failure while adding a library path to the classpath
#[derive(Error, Debug)]
pub enum InjectionError {
    /// Recognized refusal; the message alone is shown to the user
    #[error("{0}")]
    Abort(String),

    #[error("Could not add {path} to the classpath")]
    Registration {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Could not write to the build log")]
    Sink(#[source] io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Failure of the load step run by the shared library customizer
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Build log is unavailable")]
    Listener(#[source] io::Error),

    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error(transparent)]
    Injection(#[from] InjectionError),
}

impl LoadError {
    /// Message to show on its own when the failure is a recognized refusal
    pub fn abort_message(&self) -> Option<&str> {
        match self {
            LoadError::Injection(InjectionError::Abort(message)) => Some(message),
            _ => None,
        }
    }
}

/// Render an error with its full chain of causes, one per line
pub fn render_trace(error: &(dyn std::error::Error + 'static)) -> String {
    let mut out = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        out.push_str("\nCaused by: ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_library_parser::Span;

    #[test]
    fn test_abort_message_only_for_abort() {
        let abort = LoadError::from(InjectionError::Abort("class loader closed".into()));
        assert_eq!(abort.abort_message(), Some("class loader closed"));

        let other = LoadError::from(ResolutionError::NoLibraries);
        assert_eq!(other.abort_message(), None);
    }

    #[test]
    fn test_render_trace_includes_causes() {
        let err = LoadError::from(InjectionError::Registration {
            path: PathBuf::from("/w/lib"),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        });
        let trace = render_trace(&err);
        assert!(trace.starts_with("Could not add /w/lib to the classpath"));
        assert!(trace.contains("Caused by: denied"));
    }

    #[test]
    fn test_phase_failed_lists_diagnostics() {
        let err = CompileError::PhaseFailed {
            unit: "Jenkinsfile".into(),
            phase: Phase::Conversion,
            diagnostics: vec![
                Diagnostic::error("@SharedLibrary was missing a path", None),
                Diagnostic::error(
                    "@SharedLibrary only accepts string values",
                    Some(Span::new(3, 1)),
                ),
            ],
        };
        let text = err.to_string();
        assert!(text.contains("Jenkinsfile"));
        assert!(text.contains("conversion"));
        assert!(text.contains("\n  - error: @SharedLibrary was missing a path"));
        assert!(text.contains("\n  - 3:1: error: @SharedLibrary only accepts string values"));
    }
}
