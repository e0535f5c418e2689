/// Compilation host that runs source units through their phases
///
/// Each unit goes through initialization, parsing, conversion, and semantic
/// analysis. Registered customizers run at the end of the phase they asked
/// for; a unit that collected errors or reported a failure stops at the end
/// of that phase.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use shared_library_parser::visit::walk_annotations_mut;
use shared_library_parser::{AnnotationNode, ModuleNode};
use tracing::debug;

use crate::error::{CompileError, Result};
use crate::execution::FlowExecution;
use crate::source::{Diagnostic, SourceUnit};

/// Compilation phases, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Phase {
    Initialization,
    Parsing,
    Conversion,
    SemanticAnalysis,
}

impl Phase {
    pub const ALL: [Phase; 4] = [
        Phase::Initialization,
        Phase::Parsing,
        Phase::Conversion,
        Phase::SemanticAnalysis,
    ];
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Initialization => "initialization",
            Phase::Parsing => "parsing",
            Phase::Conversion => "conversion",
            Phase::SemanticAnalysis => "semantic analysis",
        };
        f.write_str(name)
    }
}

/// Hook run against every source unit during one phase
pub trait CompilationCustomizer: Send + Sync {
    fn phase(&self) -> Phase;

    /// Inspect or rewrite the unit. Problems with the unit itself go into
    /// its error collector; `Err` is for failures of the customizer.
    fn call(&self, source: &mut SourceUnit) -> Result<()>;
}

/// Imports every unit gets without declaring them
#[derive(Debug, Clone, Default)]
pub struct ImportCustomizer {
    imports: Vec<String>,
}

impl ImportCustomizer {
    pub fn add_import(&mut self, class_name: impl Into<String>) -> &mut Self {
        let class_name = class_name.into();
        if !self.imports.contains(&class_name) {
            self.imports.push(class_name);
        }
        self
    }

    pub fn imports(&self) -> &[String] {
        &self.imports
    }
}

/// Extension point through which plugins shape compilation of a run's scripts
pub trait ShellDecorator: Send + Sync {
    fn customize_imports(
        &self,
        _execution: Option<&dyn FlowExecution>,
        _imports: &mut ImportCustomizer,
    ) {
    }

    fn configure_compiler(
        &self,
        _execution: Option<Arc<dyn FlowExecution>>,
        _config: &mut CompilerConfiguration,
    ) {
    }
}

/// Imports and customizers applied to every unit
#[derive(Default)]
pub struct CompilerConfiguration {
    imports: ImportCustomizer,
    customizers: Vec<Box<dyn CompilationCustomizer>>,
}

impl CompilerConfiguration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration for compiling the scripts of `execution`, shaped by each decorator in turn
    pub fn for_execution(
        execution: Option<Arc<dyn FlowExecution>>,
        decorators: &[&dyn ShellDecorator],
    ) -> Self {
        let mut config = Self::new();
        for decorator in decorators {
            decorator.customize_imports(execution.as_deref(), &mut config.imports);
            decorator.configure_compiler(execution.clone(), &mut config);
        }
        config
    }

    pub fn add_customizer(&mut self, customizer: Box<dyn CompilationCustomizer>) -> &mut Self {
        self.customizers.push(customizer);
        self
    }

    pub fn imports(&self) -> &ImportCustomizer {
        &self.imports
    }

    pub fn imports_mut(&mut self) -> &mut ImportCustomizer {
        &mut self.imports
    }

    pub fn customizers(&self) -> &[Box<dyn CompilationCustomizer>] {
        &self.customizers
    }
}

/// Runs source units through all phases
pub struct Compiler {
    config: CompilerConfiguration,
}

impl Compiler {
    pub fn new(config: CompilerConfiguration) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CompilerConfiguration {
        &self.config
    }

    /// Compile `source` through semantic analysis
    pub fn compile(&self, source: &mut SourceUnit) -> Result<()> {
        for phase in Phase::ALL {
            self.run_phase(phase, source)?;
        }
        Ok(())
    }

    fn run_phase(&self, phase: Phase, source: &mut SourceUnit) -> Result<()> {
        debug!(unit = source.name(), %phase, "entering phase");
        match phase {
            Phase::Initialization | Phase::Conversion => {}
            Phase::Parsing => parse_unit(source),
            Phase::SemanticAnalysis => {
                if let Some(module) = source.ast_mut() {
                    resolve_annotation_names(module, &self.config.imports);
                }
            }
        }

        for customizer in self.config.customizers.iter().filter(|c| c.phase() == phase) {
            customizer.call(source)?;
        }

        if source.errors_mut().fail_if_errors(phase) {
            let failed = source.errors().failed_phase().unwrap_or(phase);
            return Err(CompileError::PhaseFailed {
                unit: source.name().to_string(),
                phase: failed,
                diagnostics: source.errors().errors().cloned().collect(),
            });
        }
        Ok(())
    }
}

fn parse_unit(source: &mut SourceUnit) {
    if source.ast().is_some() {
        return;
    }
    match shared_library_parser::parse(source.text()) {
        Ok(module) => source.set_ast(module),
        Err(err) => {
            let span = err.span();
            source.add_error_and_continue(Diagnostic::error(err.to_string(), Some(span)));
        }
    }
}

/// Rewrite simple annotation names to the class they import.
///
/// Explicit imports (including aliases) take precedence over the implicit
/// imports of the configuration. Names that match nothing are left as written.
fn resolve_annotation_names(module: &mut ModuleNode, implicit: &ImportCustomizer) {
    let mut known: HashMap<String, String> = HashMap::new();
    for class_name in implicit.imports() {
        if let Some(simple) = class_name.rsplit('.').next() {
            known.insert(simple.to_string(), class_name.clone());
        }
    }
    for import in module.imports.iter().filter(|i| !i.is_static) {
        if let Some(simple) = import.simple_name() {
            known.insert(simple.to_string(), import.name.clone());
        }
    }

    walk_annotations_mut(module, &mut |annotation: &mut AnnotationNode| {
        if annotation.class_name.contains('.') {
            return;
        }
        if let Some(qualified) = known.get(&annotation.class_name) {
            annotation.class_name = qualified.clone();
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_library_parser::visit::walk_annotations;
    use std::sync::Mutex;

    fn annotation_names(source: &SourceUnit) -> Vec<String> {
        let mut names = Vec::new();
        if let Some(module) = source.ast() {
            walk_annotations(module, &mut |a: &AnnotationNode| names.push(a.class_name.clone()));
        }
        names
    }

    struct RecordingCustomizer {
        phase: Phase,
        seen: Arc<Mutex<Vec<(Phase, Vec<String>)>>>,
    }

    impl CompilationCustomizer for RecordingCustomizer {
        fn phase(&self) -> Phase {
            self.phase
        }

        fn call(&self, source: &mut SourceUnit) -> Result<()> {
            self.seen.lock().unwrap().push((self.phase, annotation_names(source)));
            Ok(())
        }
    }

    #[test]
    fn test_phase_order_and_display() {
        assert!(Phase::Parsing < Phase::Conversion);
        assert!(Phase::Conversion < Phase::SemanticAnalysis);
        assert_eq!(Phase::SemanticAnalysis.to_string(), "semantic analysis");
    }

    #[test]
    fn test_conversion_sees_names_as_written() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut config = CompilerConfiguration::new();
        config.imports_mut().add_import("org.acme.Marker");
        config.add_customizer(Box::new(RecordingCustomizer {
            phase: Phase::SemanticAnalysis,
            seen: seen.clone(),
        }));
        config.add_customizer(Box::new(RecordingCustomizer {
            phase: Phase::Conversion,
            seen: seen.clone(),
        }));

        let mut unit =
            SourceUnit::new("Jenkinsfile", "import x.y.Other as Alias\n@Marker @Alias @Unknown _");
        Compiler::new(config).compile(&mut unit).unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(
            seen[0],
            (Phase::Conversion, vec!["Marker".into(), "Alias".into(), "Unknown".into()])
        );
        assert_eq!(
            seen[1],
            (
                Phase::SemanticAnalysis,
                vec!["org.acme.Marker".into(), "x.y.Other".into(), "Unknown".into()]
            )
        );
    }

    #[test]
    fn test_explicit_import_wins_over_implicit() {
        let mut config = CompilerConfiguration::new();
        config.imports_mut().add_import("org.acme.Marker");
        let mut unit = SourceUnit::new("Jenkinsfile", "import my.own.Marker\n@Marker _");
        Compiler::new(config).compile(&mut unit).unwrap();
        assert_eq!(annotation_names(&unit), vec!["my.own.Marker"]);
    }

    #[test]
    fn test_parse_error_fails_parsing_phase() {
        let mut unit = SourceUnit::new("Jenkinsfile", "node {\n  sh 'make'\n");
        let err = Compiler::new(CompilerConfiguration::new()).compile(&mut unit).unwrap_err();
        match err {
            CompileError::PhaseFailed { phase, diagnostics, .. } => {
                assert_eq!(phase, Phase::Parsing);
                assert_eq!(diagnostics.len(), 1);
                assert!(diagnostics[0].span.is_some());
            }
            other => panic!("unexpected error: {}", other),
        }
        assert!(unit.has_failed());
        assert!(unit.ast().is_none());
    }

    #[test]
    fn test_reported_failure_stops_compilation() {
        struct Failing;
        impl CompilationCustomizer for Failing {
            fn phase(&self) -> Phase {
                Phase::Conversion
            }
            fn call(&self, source: &mut SourceUnit) -> Result<()> {
                source.report_phase_failure(Phase::Conversion);
                Ok(())
            }
        }

        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut config = CompilerConfiguration::new();
        config.add_customizer(Box::new(Failing));
        config.add_customizer(Box::new(RecordingCustomizer {
            phase: Phase::SemanticAnalysis,
            seen: seen.clone(),
        }));

        let mut unit = SourceUnit::new("Jenkinsfile", "echo 'hi'");
        let err = Compiler::new(config).compile(&mut unit).unwrap_err();
        assert!(matches!(err, CompileError::PhaseFailed { phase: Phase::Conversion, .. }));
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_add_import_deduplicates() {
        let mut imports = ImportCustomizer::default();
        imports.add_import("a.B").add_import("a.B").add_import("c.D");
        assert_eq!(imports.imports(), ["a.B".to_string(), "c.D".to_string()]);
    }
}
