/// Library path resolution
///
/// Maps the first requested library name and the execution URL of the run
/// to the library's checkout directory:
///
/// ```text
/// job/Folder/job/MyJob/34/execution/  +  utils
///   -> <root>/workspace/Folder/MyJob@script/utils
/// ```
///
/// Resolution is pure: nothing is checked on disk.

use std::path::{Component, Path, PathBuf};

use tracing::{debug, warn};

use crate::config::WorkspaceConfig;
use crate::error::ResolutionError;

const URL_PREFIX: &str = "job/";
const JOB_SEPARATOR: &str = "/job/";
const WORKSPACE_DIR: &str = "workspace";
const SCRIPT_CHECKOUT_SUFFIX: &str = "@script";

/// Resolves library names to checkout directories under the workspace root
#[derive(Debug, Clone)]
pub struct LibraryPathResolver {
    config: WorkspaceConfig,
}

impl LibraryPathResolver {
    pub fn new(config: WorkspaceConfig) -> Self {
        Self { config }
    }

    /// Resolve the checkout of `libraries[0]` for the run at `execution_url`.
    /// Any further names are ignored with a warning.
    pub fn resolve(
        &self,
        libraries: &[String],
        execution_url: &str,
    ) -> Result<PathBuf, ResolutionError> {
        let (library, ignored) = libraries.split_first().ok_or(ResolutionError::NoLibraries)?;
        if !ignored.is_empty() {
            warn!(loaded = %library, ignored = ?ignored, "only the first shared library is loaded");
        }

        validate_library_name(library)?;
        let job = job_path(execution_url)?;
        let root = self.config.root().ok_or(ResolutionError::MissingWorkspaceRoot)?;

        let path = root
            .join(WORKSPACE_DIR)
            .join(format!("{}{}", job, SCRIPT_CHECKOUT_SUFFIX))
            .join(library);
        debug!(url = execution_url, path = %path.display(), "resolved shared library path");
        Ok(path)
    }
}

/// Derive the job's path from an execution URL by dropping the `job/`
/// markers between folder levels and everything after the job name.
///
/// `job/Folder/job/MyJob/34/execution/` gives `Folder/MyJob`.
pub fn job_path(execution_url: &str) -> Result<String, ResolutionError> {
    let rest = execution_url.strip_prefix(URL_PREFIX).ok_or_else(|| {
        let reason = format!("expected it to start with '{}'", URL_PREFIX);
        ResolutionError::malformed_url(execution_url, reason)
    })?;

    let mut segments: Vec<&str> = rest.split(JOB_SEPARATOR).collect();
    if let Some(last) = segments.last_mut() {
        *last = last.split('/').next().unwrap_or_default();
    }
    if segments.iter().any(|segment| segment.is_empty()) {
        return Err(ResolutionError::malformed_url(execution_url, "empty job name"));
    }
    Ok(segments.join("/"))
}

/// A library name is a relative path that stays inside the checkout directory
fn validate_library_name(name: &str) -> Result<(), ResolutionError> {
    if name.is_empty() {
        return Err(ResolutionError::invalid_name(name, "name is empty"));
    }
    let path = Path::new(name);
    if path.has_root() {
        return Err(ResolutionError::invalid_name(name, "name must be a relative path"));
    }
    if path.components().any(|c| matches!(c, Component::ParentDir | Component::Prefix(_))) {
        return Err(ResolutionError::invalid_name(
            name,
            "name must not leave the checkout directory",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> LibraryPathResolver {
        LibraryPathResolver::new(WorkspaceConfig::new("/var/jenkins_home"))
    }

    fn names(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_resolve_folder_job() {
        let path = resolver()
            .resolve(&names(&["utils"]), "job/Folder/job/MyJob/34/execution/")
            .unwrap();
        assert_eq!(path, PathBuf::from("/var/jenkins_home/workspace/Folder/MyJob@script/utils"));
    }

    #[test]
    fn test_resolve_top_level_job() {
        let path = resolver().resolve(&names(&["common"]), "job/Build/7/").unwrap();
        assert_eq!(path, PathBuf::from("/var/jenkins_home/workspace/Build@script/common"));
    }

    #[test]
    fn test_only_first_library_used() {
        let path = resolver()
            .resolve(&names(&["a", "b"]), "job/X/job/Y/1/execution/")
            .unwrap();
        assert_eq!(path, PathBuf::from("/var/jenkins_home/workspace/X/Y@script/a"));
    }

    #[test]
    fn test_job_path() {
        assert_eq!(job_path("job/A/job/B/job/C/12/execution/").unwrap(), "A/B/C");
        assert_eq!(job_path("job/Solo").unwrap(), "Solo");
        assert_eq!(job_path("job/Solo/").unwrap(), "Solo");
    }

    #[test]
    fn test_job_path_malformed() {
        for url in ["", "view/all/job/A/1/", "/job/A/1/", "job/", "job//1/", "job/A/job//2/"] {
            assert!(
                matches!(job_path(url), Err(ResolutionError::MalformedExecutionUrl { .. })),
                "expected {:?} to be rejected",
                url
            );
        }
    }

    #[test]
    fn test_no_libraries() {
        assert_eq!(
            resolver().resolve(&[], "job/A/1/"),
            Err(ResolutionError::NoLibraries)
        );
    }

    #[test]
    fn test_missing_workspace_root() {
        let resolver = LibraryPathResolver::new(WorkspaceConfig::default());
        assert_eq!(
            resolver.resolve(&names(&["utils"]), "job/A/1/"),
            Err(ResolutionError::MissingWorkspaceRoot)
        );
    }

    #[test]
    fn test_invalid_library_names() {
        for name in ["", "/etc", "../other", "libs/../../x"] {
            assert!(
                matches!(
                    resolver().resolve(&names(&[name]), "job/A/1/"),
                    Err(ResolutionError::InvalidLibraryName { .. })
                ),
                "expected {:?} to be rejected",
                name
            );
        }
        assert!(resolver().resolve(&names(&["libs/utils"]), "job/A/1/").is_ok());
    }
}
