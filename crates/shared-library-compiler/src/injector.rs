/// Classpath injection
///
/// Adds a resolved library checkout to the run's classpath and reports it
/// in the build log as a single line:
///
/// ```text
/// [SharedLibrary] Loading /var/jenkins_home/workspace/Folder/MyJob@script/utils to classpath... done
/// ```

use std::path::Path;

use tracing::info;

use crate::classpath::ClasspathEnvironment;
use crate::directive::LOG_PREFIX;
use crate::error::InjectionError;
use crate::execution::TaskListener;

/// Register `path` with `environment`, announcing it on `sink`.
///
/// `done` is written only once registration succeeded.
pub fn inject(
    path: &Path,
    environment: &dyn ClasspathEnvironment,
    sink: &dyn TaskListener,
) -> Result<(), InjectionError> {
    sink.print(&format!("{} Loading {} to classpath... ", LOG_PREFIX, path.display()))
        .map_err(InjectionError::Sink)?;
    environment.add_classpath(path)?;
    sink.print("done\n").map_err(InjectionError::Sink)?;
    info!(path = %path.display(), "shared library added to classpath");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classpath::ScriptClassLoader;
    use crate::execution::BufferedListener;
    use std::path::PathBuf;

    #[test]
    fn test_inject_logs_and_registers() {
        let loader = ScriptClassLoader::new();
        let log = BufferedListener::new();
        inject(Path::new("/w/Folder/MyJob@script/utils"), &loader, &log).unwrap();
        assert_eq!(
            log.contents(),
            "[SharedLibrary] Loading /w/Folder/MyJob@script/utils to classpath... done\n"
        );
        assert_eq!(loader.entries(), vec![PathBuf::from("/w/Folder/MyJob@script/utils")]);
    }

    #[test]
    fn test_inject_failure_has_no_done() {
        let loader = ScriptClassLoader::new();
        loader.close();
        let log = BufferedListener::new();
        let err = inject(Path::new("/w/lib"), &loader, &log).unwrap_err();
        assert!(matches!(err, InjectionError::Abort(_)));
        assert_eq!(log.contents(), "[SharedLibrary] Loading /w/lib to classpath... ");
    }
}
