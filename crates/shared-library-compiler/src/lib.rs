/// Shared library directive resolver
///
/// Lets a pipeline script request a shared library at compile time with
/// `@SharedLibrary('name') _`. During conversion the script is scanned for
/// the directive, the library's checkout under the job workspace is
/// resolved from the run's execution URL, and that directory is added to
/// the run's classpath before the rest of the script is compiled.

pub mod classpath;
pub mod config;
pub mod decorator;
pub mod directive;
pub mod driver;
pub mod error;
pub mod execution;
pub mod injector;
pub mod resolver;
pub mod scanner;
pub mod source;

pub use classpath::{ClasspathEnvironment, ScriptClassLoader};
pub use config::{WorkspaceConfig, WORKSPACE_ROOT_ENV};
pub use decorator::{LoadOutcome, SharedLibraryCustomizer, SharedLibraryDecorator};
pub use driver::{
    CompilationCustomizer, Compiler, CompilerConfiguration, ImportCustomizer, Phase, ShellDecorator,
};
pub use error::{CompileError, InjectionError, LoadError, ResolutionError, Result};
pub use execution::{BufferedListener, FlowExecution, RunExecution, StreamListener, TaskListener};
pub use resolver::LibraryPathResolver;
pub use scanner::{scan, ScanOutcome};
pub use source::{Diagnostic, ErrorCollector, Severity, SourceUnit};
