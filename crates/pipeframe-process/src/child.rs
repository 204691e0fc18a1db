use std::fmt;
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, ExitStatus, Stdio};

use tracing::{debug, info, warn};

use crate::config::ProcessConfig;
use crate::error::{ProcessError, Result};
use crate::traits::ProcessControl;

/// How a child process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCondition {
    /// Exited normally with this status code.
    Code(i32),
    /// Killed by this signal (Unix only).
    Signal(i32),
    /// The platform reported neither a code nor a signal.
    Unknown,
}

impl ExitCondition {
    /// Returns true only for a zero exit code.
    pub fn is_clean(&self) -> bool {
        matches!(self, ExitCondition::Code(0))
    }

    pub fn code(&self) -> Option<i32> {
        match self {
            ExitCondition::Code(code) => Some(*code),
            _ => None,
        }
    }
}

impl From<ExitStatus> for ExitCondition {
    fn from(status: ExitStatus) -> Self {
        if let Some(code) = status.code() {
            return ExitCondition::Code(code);
        }

        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if let Some(signal) = status.signal() {
                return ExitCondition::Signal(signal);
            }
        }

        ExitCondition::Unknown
    }
}

impl fmt::Display for ExitCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitCondition::Code(code) => write!(f, "exit code {code}"),
            ExitCondition::Signal(signal) => write!(f, "signal {signal}"),
            ExitCondition::Unknown => f.write_str("unknown exit status"),
        }
    }
}

/// A spawned child with piped stdin/stdout and inherited stderr.
pub struct ChildProcess {
    child: Child,
    program: PathBuf,
    exit: Option<ExitCondition>,
    kill_on_drop: bool,
}

impl ChildProcess {
    /// Spawn the process described by `config`.
    pub fn spawn(config: &ProcessConfig) -> Result<Self> {
        let mut cmd = Command::new(&config.program);
        cmd.args(&config.args)
            .envs(config.env.iter().map(|(k, v)| (k, v)))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit());

        if let Some(dir) = &config.current_dir {
            cmd.current_dir(dir);
        }

        let child = cmd.spawn().map_err(|source| ProcessError::Spawn {
            program: config.program.clone(),
            source,
        })?;

        info!(program = %config.program.display(), pid = child.id(), "spawned child process");

        Ok(Self {
            child,
            program: config.program.clone(),
            exit: None,
            kill_on_drop: config.kill_on_drop,
        })
    }

    /// OS process identifier.
    pub fn pid(&self) -> u32 {
        self.child.id()
    }

    /// The executable this child was spawned from.
    pub fn program(&self) -> &PathBuf {
        &self.program
    }

    /// Take ownership of the child's stdin pipe.
    pub fn take_stdin(&mut self) -> Result<ChildStdin> {
        self.child
            .stdin
            .take()
            .ok_or(ProcessError::MissingPipe("stdin"))
    }

    /// Take ownership of the child's stdout pipe.
    pub fn take_stdout(&mut self) -> Result<ChildStdout> {
        self.child
            .stdout
            .take()
            .ok_or(ProcessError::MissingPipe("stdout"))
    }

    /// Block until the child exits.
    pub fn wait(&mut self) -> Result<ExitCondition> {
        if let Some(exit) = self.exit {
            return Ok(exit);
        }
        let status = self.child.wait()?;
        Ok(self.record_exit(status))
    }

    /// Check for exit without blocking.
    pub fn try_wait(&mut self) -> Result<Option<ExitCondition>> {
        if let Some(exit) = self.exit {
            return Ok(Some(exit));
        }
        Ok(self.child.try_wait()?.map(|status| self.record_exit(status)))
    }

    /// Forcefully kill the child (SIGKILL on Unix).
    pub fn kill(&mut self) -> Result<()> {
        if self.try_wait()?.is_some() {
            return Ok(());
        }
        match self.child.kill() {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::InvalidInput => Ok(()),
            Err(err) => Err(ProcessError::Io(err)),
        }
    }

    fn record_exit(&mut self, status: ExitStatus) -> ExitCondition {
        let exit = ExitCondition::from(status);
        debug!(pid = self.child.id(), %exit, "child process exited");
        self.exit = Some(exit);
        exit
    }

    #[cfg(unix)]
    fn send_sigterm(&mut self) -> Result<()> {
        let pid = self.pid();
        // SAFETY: `kill` has no memory-safety preconditions; `pid` names a child
        // we spawned and have not yet reaped, so it cannot have been recycled.
        let rc = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
        if rc == 0 {
            return Ok(());
        }

        let err = std::io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::ESRCH) {
            return Ok(());
        }
        Err(ProcessError::Signal { pid, source: err })
    }
}

impl ProcessControl for ChildProcess {
    fn pid(&self) -> u32 {
        ChildProcess::pid(self)
    }

    fn terminate(&mut self) -> Result<()> {
        if self.try_wait()?.is_some() {
            return Ok(());
        }
        debug!(pid = self.pid(), "terminating child process");

        #[cfg(unix)]
        {
            self.send_sigterm()
        }

        #[cfg(not(unix))]
        {
            self.kill()
        }
    }
}

impl fmt::Debug for ChildProcess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChildProcess")
            .field("pid", &self.child.id())
            .field("program", &self.program)
            .field("exit", &self.exit)
            .finish()
    }
}

impl Drop for ChildProcess {
    fn drop(&mut self) {
        if !self.kill_on_drop || self.exit.is_some() {
            return;
        }
        if let Err(e) = self.kill().and_then(|()| self.wait().map(|_| ())) {
            warn!(pid = self.child.id(), error = %e, "failed to reap child process");
        }
    }
}
