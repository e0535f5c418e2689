/// Shared library decorator
///
/// Plugs into compilation of a run's scripts: makes `@SharedLibrary`
/// available without an import and, when the run is known, registers a
/// conversion-phase customizer that loads the requested library.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::WorkspaceConfig;
use crate::directive::{DIRECTIVE_CLASS_NAME, LOG_PREFIX};
use crate::driver::{
    CompilationCustomizer, CompilerConfiguration, ImportCustomizer, Phase, ShellDecorator,
};
use crate::error::{render_trace, CompileError, InjectionError, LoadError, Result};
use crate::execution::FlowExecution;
use crate::injector;
use crate::resolver::LibraryPathResolver;
use crate::scanner;
use crate::source::{Diagnostic, SourceUnit};

/// Added to a unit when loading its library fails
pub const LOAD_FAILED_MESSAGE: &str = "Loading shared libraries failed";

/// Decorator installed once per controller
#[derive(Debug, Clone, Default)]
pub struct SharedLibraryDecorator {
    config: WorkspaceConfig,
}

impl SharedLibraryDecorator {
    pub fn new(config: WorkspaceConfig) -> Self {
        Self { config }
    }

    /// Decorator reading its workspace root from the environment
    pub fn from_env() -> Self {
        Self::new(WorkspaceConfig::from_env())
    }
}

impl ShellDecorator for SharedLibraryDecorator {
    fn customize_imports(
        &self,
        _execution: Option<&dyn FlowExecution>,
        imports: &mut ImportCustomizer,
    ) {
        imports.add_import(DIRECTIVE_CLASS_NAME);
    }

    fn configure_compiler(
        &self,
        execution: Option<Arc<dyn FlowExecution>>,
        config: &mut CompilerConfiguration,
    ) {
        let Some(execution) = execution else {
            debug!("no execution to load shared libraries into");
            return;
        };
        let customizer = SharedLibraryCustomizer::new(execution, self.config.clone());
        config.add_customizer(Box::new(customizer));
    }
}

/// What a successful load did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The unit requested no library
    NoDirective,
    /// The library checkout was added to the classpath
    Loaded(PathBuf),
}

/// Conversion-phase customizer bound to one execution
pub struct SharedLibraryCustomizer {
    execution: Arc<dyn FlowExecution>,
    resolver: LibraryPathResolver,
}

impl SharedLibraryCustomizer {
    pub fn new(execution: Arc<dyn FlowExecution>, config: WorkspaceConfig) -> Self {
        Self {
            execution,
            resolver: LibraryPathResolver::new(config),
        }
    }

    /// Resolve and inject the first of `libraries`, or log that there is none
    pub fn load(&self, libraries: &[String]) -> std::result::Result<LoadOutcome, LoadError> {
        let listener = self.execution.listener().map_err(LoadError::Listener)?;
        if libraries.is_empty() {
            listener
                .println(&format!("{} Could not find any definition of SharedLibrary", LOG_PREFIX))
                .map_err(InjectionError::Sink)?;
            return Ok(LoadOutcome::NoDirective);
        }

        let path = self.resolver.resolve(libraries, self.execution.url())?;
        injector::inject(&path, self.execution.classpath(), listener.as_ref())?;
        Ok(LoadOutcome::Loaded(path))
    }

    /// Mark the unit failed and tell the user why. If the build log cannot
    /// take the report, the failure is raised to the host instead.
    fn fail(&self, source: &mut SourceUnit, err: LoadError) -> Result<()> {
        source.add_error_and_continue(Diagnostic::error(LOAD_FAILED_MESSAGE, None));
        source.report_phase_failure(Phase::Conversion);

        match self.report(&err) {
            Ok(()) => Ok(()),
            Err(log_err) => {
                warn!(
                    unit = source.name(),
                    error = %log_err,
                    cause = %err,
                    "failed to report shared library failure"
                );
                Err(CompileError::customizer(source.name(), Phase::Conversion, err))
            }
        }
    }

    fn report(&self, err: &LoadError) -> io::Result<()> {
        let listener = self.execution.listener()?;
        match err.abort_message() {
            Some(message) => listener.error(message),
            None => listener.println(&render_trace(err)),
        }
    }
}

impl CompilationCustomizer for SharedLibraryCustomizer {
    fn phase(&self) -> Phase {
        Phase::Conversion
    }

    fn call(&self, source: &mut SourceUnit) -> Result<()> {
        let Some(module) = source.ast() else {
            return Ok(());
        };
        let outcome = scanner::scan(module);
        for diagnostic in outcome.diagnostics {
            source.add_error_and_continue(diagnostic);
        }

        match self.load(&outcome.libraries) {
            Ok(LoadOutcome::NoDirective) => Ok(()),
            Ok(LoadOutcome::Loaded(path)) => {
                debug!(unit = source.name(), path = %path.display(), "shared library loaded");
                Ok(())
            }
            Err(err) => self.fail(source, err),
        }
    }
}
