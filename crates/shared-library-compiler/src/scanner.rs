/// Annotation scanner
///
/// Walks a parsed script and collects the library names requested with
/// `@SharedLibrary`, reporting every malformed occurrence as a diagnostic.

use serde::Serialize;
use shared_library_parser::visit::walk_annotations;
use shared_library_parser::{AnnotationNode, Constant, Expr, ModuleNode, Span};
use tracing::debug;

use crate::directive::{self, DIRECTIVE_SIMPLE_NAME, VALUE_MEMBER};
use crate::source::Diagnostic;

/// Result of scanning one source unit
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScanOutcome {
    /// Library names in the order their directives appear
    pub libraries: Vec<String>,
    /// One error per malformed directive value
    pub diagnostics: Vec<Diagnostic>,
}

impl ScanOutcome {
    pub fn first_library(&self) -> Option<&str> {
        self.libraries.first().map(String::as_str)
    }
}

/// Scan every annotation in the unit for the directive
pub fn scan(module: &ModuleNode) -> ScanOutcome {
    let mut outcome = ScanOutcome::default();
    walk_annotations(module, &mut |annotation: &AnnotationNode| {
        if !directive::is_directive(&annotation.class_name) {
            return;
        }
        match annotation.member(VALUE_MEMBER) {
            None => outcome.diagnostics.push(Diagnostic::error(
                format!("@{} was missing a path", DIRECTIVE_SIMPLE_NAME),
                Some(annotation.span),
            )),
            Some(Expr::List(items)) => {
                for item in items {
                    collect_value(item, annotation.span, &mut outcome);
                }
            }
            Some(value) => collect_value(value, annotation.span, &mut outcome),
        }
    });
    debug!(
        libraries = ?outcome.libraries,
        errors = outcome.diagnostics.len(),
        "scanned for shared library directives"
    );
    outcome
}

fn collect_value(value: &Expr, span: Span, outcome: &mut ScanOutcome) {
    match value {
        Expr::Constant(Constant::String(name)) => outcome.libraries.push(name.clone()),
        Expr::Constant(other) => outcome.diagnostics.push(Diagnostic::error(
            format!("@{} value '{}' was not a string", DIRECTIVE_SIMPLE_NAME, other),
            Some(span),
        )),
        other => outcome.diagnostics.push(Diagnostic::error(
            format!(
                "@{} value '{}' was not a constant; did you mean to use the 'library' step instead?",
                DIRECTIVE_SIMPLE_NAME,
                other.text()
            ),
            Some(span),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_library_parser::parse;

    fn scan_source(source: &str) -> ScanOutcome {
        scan(&parse(source).unwrap())
    }

    fn messages(outcome: &ScanOutcome) -> Vec<String> {
        outcome.diagnostics.iter().map(|d| d.message.clone()).collect()
    }

    #[test]
    fn test_single_directive() {
        let outcome = scan_source("@SharedLibrary('utils') _\nnode { sh 'make' }");
        assert_eq!(outcome.libraries, vec!["utils"]);
        assert!(outcome.diagnostics.is_empty());
    }

    #[test]
    fn test_qualified_name_and_named_member() {
        let outcome = scan_source(
            "@io.jenkins.plugins.shared_library.SharedLibrary(value = \"common\") _",
        );
        assert_eq!(outcome.libraries, vec!["common"]);
    }

    #[test]
    fn test_directives_in_source_order() {
        let outcome = scan_source(
            r#"
@SharedLibrary('first') _
class Helper {
    @SharedLibrary('second') def field
}
def run() {
    node {
        @SharedLibrary('third') _
    }
}
"#,
        );
        assert_eq!(outcome.libraries, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_other_annotations_ignored() {
        let outcome = scan_source("@Library('x') _\n@Grab('a:b:1') import a.B\n@Field def y = 1");
        assert_eq!(outcome, ScanOutcome::default());
    }

    #[test]
    fn test_missing_value() {
        let outcome = scan_source("@SharedLibrary _\n@SharedLibrary(name = 'x') _");
        assert!(outcome.libraries.is_empty());
        assert_eq!(
            messages(&outcome),
            vec!["@SharedLibrary was missing a path", "@SharedLibrary was missing a path"]
        );
        assert_eq!(outcome.diagnostics[1].span, Some(Span::new(2, 1)));
    }

    #[test]
    fn test_non_string_constant() {
        let outcome = scan_source("@SharedLibrary(42) _");
        assert!(outcome.libraries.is_empty());
        assert_eq!(messages(&outcome), vec!["@SharedLibrary value '42' was not a string"]);
    }

    #[test]
    fn test_non_constant_value() {
        let outcome = scan_source("@SharedLibrary(\"lib-${branch}\") _\n@SharedLibrary(name) _");
        assert!(outcome.libraries.is_empty());
        assert_eq!(
            messages(&outcome),
            vec![
                "@SharedLibrary value 'lib-${branch}' was not a constant; did you mean to use the 'library' step instead?",
                "@SharedLibrary value 'name' was not a constant; did you mean to use the 'library' step instead?",
            ]
        );
    }

    #[test]
    fn test_malformed_does_not_hide_valid() {
        let outcome = scan_source("@SharedLibrary(true) _\n@SharedLibrary('utils') _");
        assert_eq!(outcome.libraries, vec!["utils"]);
        assert_eq!(outcome.diagnostics.len(), 1);
    }

    #[test]
    fn test_list_value_elements_validated() {
        let outcome = scan_source("@SharedLibrary(['a', 'b', 3, ['c']]) _");
        assert_eq!(outcome.libraries, vec!["a", "b"]);
        assert_eq!(
            messages(&outcome),
            vec![
                "@SharedLibrary value '3' was not a string",
                "@SharedLibrary value '[c]' was not a constant; did you mean to use the 'library' step instead?",
            ]
        );
        assert_eq!(outcome.first_library(), Some("a"));
    }

    #[test]
    fn test_outcome_serializes() {
        let outcome = scan_source("@SharedLibrary('utils') _");
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["libraries"], serde_json::json!(["utils"]));
        assert_eq!(json["diagnostics"], serde_json::json!([]));
    }
}
