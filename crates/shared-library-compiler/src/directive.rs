//! Names that identify the `@SharedLibrary` directive in a script.
//!
//! A script requests a library with `@SharedLibrary('utils') _`. The
//! annotation is recognized by its fully qualified class name, or by its
//! simple name when the script never went through import resolution.

/// Fully qualified class name of the directive
pub const DIRECTIVE_CLASS_NAME: &str = "io.jenkins.plugins.shared_library.SharedLibrary";

/// Simple name, as written in scripts that rely on the implicit import
pub const DIRECTIVE_SIMPLE_NAME: &str = "SharedLibrary";

/// Annotation member holding the library name
pub const VALUE_MEMBER: &str = "value";

/// Prefix of every line written to the build log
pub const LOG_PREFIX: &str = "[SharedLibrary]";

/// Whether an annotation class name denotes the directive
pub fn is_directive(class_name: &str) -> bool {
    class_name == DIRECTIVE_CLASS_NAME || class_name == DIRECTIVE_SIMPLE_NAME
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_directive() {
        assert!(is_directive("SharedLibrary"));
        assert!(is_directive("io.jenkins.plugins.shared_library.SharedLibrary"));
        assert!(!is_directive("Library"));
        assert!(!is_directive("org.other.SharedLibrary"));
        assert!(!is_directive("sharedlibrary"));
    }
}
