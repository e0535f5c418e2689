/// The running pipeline as seen by compilation customizers: its URL, its
/// build log, and the classpath its scripts are loaded from.

use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use crate::classpath::{ClasspathEnvironment, ScriptClassLoader};

/// Writable build log of a run
pub trait TaskListener: Send + Sync {
    /// Append text as-is
    fn print(&self, text: &str) -> io::Result<()>;

    fn println(&self, line: &str) -> io::Result<()> {
        self.print(&format!("{}\n", line))
    }

    /// Report a failure the user should read without a trace
    fn error(&self, message: &str) -> io::Result<()> {
        self.println(&format!("ERROR: {}", message))
    }
}

/// A pipeline run in progress
pub trait FlowExecution: Send + Sync {
    /// URL of the execution relative to the controller root,
    /// e.g. `job/Folder/job/MyJob/34/execution/`
    fn url(&self) -> &str;

    /// The run's build log. Fails when the log can no longer be written.
    fn listener(&self) -> io::Result<Arc<dyn TaskListener>>;

    /// Classpath the run's scripts are compiled against
    fn classpath(&self) -> &dyn ClasspathEnvironment;
}

/// Build log kept in memory
#[derive(Debug, Default)]
pub struct BufferedListener {
    log: Mutex<String>,
}

impl BufferedListener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far
    pub fn contents(&self) -> String {
        match self.log.lock() {
            Ok(log) => log.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl TaskListener for BufferedListener {
    fn print(&self, text: &str) -> io::Result<()> {
        let mut log = self
            .log
            .lock()
            .map_err(|_| io::Error::other("build log lock poisoned"))?;
        log.push_str(text);
        Ok(())
    }
}

/// Build log streamed to a writer, e.g. stdout
pub struct StreamListener<W> {
    out: Mutex<W>,
}

impl<W: Write + Send> StreamListener<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }
}

impl<W: Write + Send> TaskListener for StreamListener<W> {
    fn print(&self, text: &str) -> io::Result<()> {
        let mut out = self
            .out
            .lock()
            .map_err(|_| io::Error::other("build log lock poisoned"))?;
        out.write_all(text.as_bytes())?;
        out.flush()
    }
}

/// Execution backed by a [`ScriptClassLoader`]
pub struct RunExecution {
    url: String,
    listener: Option<Arc<dyn TaskListener>>,
    class_loader: Arc<ScriptClassLoader>,
}

impl RunExecution {
    pub fn new(url: impl Into<String>, listener: Arc<dyn TaskListener>) -> Self {
        Self {
            url: url.into(),
            listener: Some(listener),
            class_loader: Arc::new(ScriptClassLoader::new()),
        }
    }

    /// An execution whose build log has already been closed
    pub fn without_listener(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            listener: None,
            class_loader: Arc::new(ScriptClassLoader::new()),
        }
    }

    /// Share a class loader with other executions
    pub fn class_loader(mut self, class_loader: Arc<ScriptClassLoader>) -> Self {
        self.class_loader = class_loader;
        self
    }

    pub fn script_class_loader(&self) -> &Arc<ScriptClassLoader> {
        &self.class_loader
    }
}

impl FlowExecution for RunExecution {
    fn url(&self) -> &str {
        &self.url
    }

    fn listener(&self) -> io::Result<Arc<dyn TaskListener>> {
        self.listener
            .clone()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "build log is closed"))
    }

    fn classpath(&self) -> &dyn ClasspathEnvironment {
        self.class_loader.as_ref()
    }
}
