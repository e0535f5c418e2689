/// Classpath of a running pipeline
///
/// Directories added here become visible to the compiler when it resolves
/// global variables (`vars/<name>.groovy`) and classes
/// (`src/<package path>/<Name>.groovy`) referenced by a script.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{debug, warn};

use crate::error::InjectionError;

/// Where library checkouts are registered for the rest of compilation
pub trait ClasspathEnvironment: Send + Sync {
    /// Append `path` to the classpath. Adding a path that is already present
    /// succeeds and leaves the classpath unchanged.
    fn add_classpath(&self, path: &Path) -> Result<(), InjectionError>;

    /// Current entries, in the order they were added
    fn entries(&self) -> Vec<PathBuf>;
}

/// In-process classpath of one run
#[derive(Debug, Default)]
pub struct ScriptClassLoader {
    state: Mutex<LoaderState>,
}

#[derive(Debug, Default)]
struct LoaderState {
    entries: Vec<PathBuf>,
    closed: bool,
}

impl ScriptClassLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop accepting entries; the run has started executing its scripts
    pub fn close(&self) {
        match self.state.lock() {
            Ok(mut state) => state.closed = true,
            Err(poisoned) => poisoned.into_inner().closed = true,
        }
    }

    /// Find the source file backing `name` in the registered entries.
    ///
    /// A simple name is looked up as a global variable first, then as a
    /// class in the default package. A dotted name is looked up as a class.
    pub fn find_source(&self, name: &str) -> Option<PathBuf> {
        let candidates = source_candidates(name);
        self.entries().into_iter().find_map(|entry| {
            candidates
                .iter()
                .map(|relative| entry.join(relative))
                .find(|path| path.is_file())
        })
    }
}

fn source_candidates(name: &str) -> Vec<PathBuf> {
    let class_path: PathBuf = name.split('.').collect();
    let class_file = Path::new("src").join(class_path).with_extension("groovy");
    if name.contains('.') {
        vec![class_file]
    } else {
        vec![Path::new("vars").join(format!("{}.groovy", name)), class_file]
    }
}

impl ClasspathEnvironment for ScriptClassLoader {
    fn add_classpath(&self, path: &Path) -> Result<(), InjectionError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| anyhow::anyhow!("script class loader lock poisoned"))?;

        if state.closed {
            return Err(InjectionError::Abort(format!(
                "Cannot add {} to the classpath: the script class loader is closed",
                path.display()
            )));
        }
        if state.entries.iter().any(|entry| entry == path) {
            debug!(path = %path.display(), "classpath entry already present");
            return Ok(());
        }
        if !path.is_dir() {
            warn!(path = %path.display(), "classpath entry does not exist yet");
        }
        state.entries.push(path.to_path_buf());
        Ok(())
    }

    fn entries(&self) -> Vec<PathBuf> {
        match self.state.lock() {
            Ok(state) => state.entries.clone(),
            Err(poisoned) => poisoned.into_inner().entries.clone(),
        }
    }
}
