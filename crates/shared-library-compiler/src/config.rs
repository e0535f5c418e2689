/// Workspace configuration read from the environment

use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Environment variable naming the controller's home directory
pub const WORKSPACE_ROOT_ENV: &str = "JENKINS_HOME";

/// Where job workspaces live on this controller
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkspaceConfig {
    /// Root under which `workspace/<job>@script` checkouts are found
    pub workspace_root: Option<PathBuf>,
}

impl WorkspaceConfig {
    pub fn new(workspace_root: impl Into<PathBuf>) -> Self {
        Self {
            workspace_root: Some(workspace_root.into()),
        }
    }

    /// Read the workspace root from `JENKINS_HOME`. An empty value counts as unset.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var_os(key))
    }

    /// Same as [`WorkspaceConfig::from_env`] with a custom variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<OsString>) -> Self {
        let workspace_root = lookup(WORKSPACE_ROOT_ENV)
            .filter(|value| !value.is_empty())
            .map(PathBuf::from);
        Self { workspace_root }
    }

    pub fn workspace_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.workspace_root = Some(root.into());
        self
    }

    pub fn root(&self) -> Option<&Path> {
        self.workspace_root
            .as_deref()
            .filter(|root| !root.as_os_str().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_lookup_reads_home() {
        let config = WorkspaceConfig::from_lookup(|key| {
            (key == "JENKINS_HOME").then(|| OsString::from("/var/jenkins_home"))
        });
        assert_eq!(config.root(), Some(Path::new("/var/jenkins_home")));
    }

    #[test]
    fn test_empty_value_is_unset() {
        let config = WorkspaceConfig::from_lookup(|_| Some(OsString::new()));
        assert_eq!(config.workspace_root, None);
        assert_eq!(config.root(), None);
    }

    #[test]
    fn test_missing_value_is_unset() {
        let config = WorkspaceConfig::from_lookup(|_| None);
        assert_eq!(config, WorkspaceConfig::default());
    }

    #[test]
    fn test_builder() {
        let config = WorkspaceConfig::default().workspace_root("/srv/ci");
        assert_eq!(config.root(), Some(Path::new("/srv/ci")));
        assert_eq!(WorkspaceConfig::new("").root(), None);
    }
}
