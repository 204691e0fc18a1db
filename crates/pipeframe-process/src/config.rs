use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

/// How to launch a child process.
///
/// stdin and stdout always become pipes owned by the parent; stderr is
/// inherited so the child's diagnostics reach the parent's terminal.
#[derive(Debug, Clone)]
pub struct ProcessConfig {
    /// Executable to run. Resolved through `PATH` when not absolute.
    pub program: PathBuf,
    /// Arguments passed to the executable.
    pub args: Vec<OsString>,
    /// Extra environment variables layered over the parent's environment.
    pub env: Vec<(OsString, OsString)>,
    /// Working directory; the parent's when `None`.
    pub current_dir: Option<PathBuf>,
    /// Kill and reap the child if its handle is dropped while it still runs.
    pub kill_on_drop: bool,
}

impl ProcessConfig {
    /// Configure a child running `program` with no arguments.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            current_dir: None,
            kill_on_drop: true,
        }
    }

    /// Add an argument.
    pub fn with_arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    /// Add several arguments.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|arg| arg.as_ref().to_os_string()));
        self
    }

    /// Set an environment variable for the child.
    pub fn with_env(mut self, key: impl AsRef<OsStr>, value: impl AsRef<OsStr>) -> Self {
        self.env
            .push((key.as_ref().to_os_string(), value.as_ref().to_os_string()));
        self
    }

    /// Run the child in `dir`.
    pub fn with_current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.current_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Leave the child running when its handle is dropped.
    pub fn detach_on_drop(mut self) -> Self {
        self.kill_on_drop = false;
        self
    }
}
