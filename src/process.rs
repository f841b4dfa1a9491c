//! Starting the child under the PTY and watching it until it terminates.

use crate::error::{Error, Result};
use crate::pty::Pty;
use portable_pty::CommandBuilder;
use std::fmt;
use std::io;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use tracing::{debug, warn};

/// How the child process terminated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitStatus {
    /// Normal exit with a status code.
    Code(u32),
    /// Killed by a signal; carries the signal's name as reported by the OS.
    Signal(String),
}

impl ExitStatus {
    /// `true` for a zero exit code.
    pub fn success(&self) -> bool {
        matches!(self, ExitStatus::Code(0))
    }

    /// The numeric exit code, if the child exited normally.
    pub fn code(&self) -> Option<u32> {
        match self {
            ExitStatus::Code(code) => Some(*code),
            ExitStatus::Signal(_) => None,
        }
    }
}

impl From<portable_pty::ExitStatus> for ExitStatus {
    fn from(status: portable_pty::ExitStatus) -> Self {
        match status.signal() {
            Some(signal) => ExitStatus::Signal(signal.to_string()),
            None => ExitStatus::Code(status.exit_code()),
        }
    }
}

impl fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitStatus::Code(code) => write!(f, "exit code {code}"),
            ExitStatus::Signal(signal) => write!(f, "signal {signal}"),
        }
    }
}

/// A running child attached to the slave end of a PTY.
pub(crate) struct Child {
    pub(crate) pid: Option<u32>,
    pub(crate) inner: Box<dyn portable_pty::Child + Send + Sync>,
    switch: Arc<KillSwitch>,
}

impl Child {
    pub(crate) fn kill_switch(&self) -> Arc<KillSwitch> {
        self.switch.clone()
    }
}

/// Kills the child by pid for as long as the pid still belongs to it.
///
/// The waiter reaps the child while holding `reaped`, and `kill` holds the
/// same lock, so a signal never reaches a recycled pid.
pub(crate) struct KillSwitch {
    pid: Option<u32>,
    reaped: Mutex<bool>,
}

impl KillSwitch {
    fn new(pid: Option<u32>) -> Self {
        Self {
            pid,
            reaped: Mutex::new(false),
        }
    }

    fn lock(&self) -> MutexGuard<'_, bool> {
        self.reaped.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// SIGKILL the child unless it has already been reaped.
    pub(crate) fn kill(&self) -> io::Result<()> {
        let reaped = self.lock();
        if *reaped {
            return Ok(());
        }
        match self.pid {
            Some(pid) => kill(pid),
            None => Err(io::Error::other("child has no pid")),
        }
    }
}

/// Launch `argv` with stdin, stdout and stderr bound to the PTY slave.
///
/// The child becomes a session leader with the slave as its controlling
/// terminal, so it never sees signals meant for our own terminal. The
/// environment is inherited, with `env` layered on top.
pub(crate) fn start(
    argv: &[String],
    pty: &Pty,
    cwd: &Path,
    env: &[(String, String)],
) -> Result<Child> {
    let Some(program) = argv.first() else {
        return Err(Error::Spawn {
            program: String::new(),
            reason: "empty argument vector".to_string(),
        });
    };
    let slave = pty.slave().ok_or_else(|| Error::Spawn {
        program: program.clone(),
        reason: "PTY slave already closed".to_string(),
    })?;

    let mut cmd = CommandBuilder::new(program);
    cmd.args(&argv[1..]);
    cmd.cwd(cwd);
    for (key, value) in env {
        cmd.env(key, value);
    }

    let inner = slave.spawn_command(cmd).map_err(|e| Error::Spawn {
        program: program.clone(),
        reason: format!("{e:#}"),
    })?;
    let pid = inner.process_id();
    debug!(?pid, ?argv, "child started");

    Ok(Child {
        pid,
        inner,
        switch: Arc::new(KillSwitch::new(pid)),
    })
}

/// Block on the child in a dedicated thread and hand its fate to `on_exit`.
///
/// A failing wait still calls `on_exit` (with `None`) so the session always
/// gets to mark itself ended.
pub(crate) fn spawn_waiter<F>(mut child: Child, on_exit: F) -> Result<()>
where
    F: FnOnce(Option<ExitStatus>) + Send + 'static,
{
    thread::Builder::new()
        .name("expectty-wait".to_string())
        .spawn(move || {
            // Once the child has exited, reap it under the lock.
            let exited = child.pid.is_some_and(wait_exited);
            let guard = exited.then(|| child.switch.lock());
            let status = match child.inner.wait() {
                Ok(status) => Some(ExitStatus::from(status)),
                Err(err) => {
                    warn!(pid = ?child.pid, "waiting for child failed: {err}");
                    None
                }
            };
            let mut reaped = guard.unwrap_or_else(|| child.switch.lock());
            *reaped = true;
            drop(reaped);
            debug!(pid = ?child.pid, ?status, "child terminated");
            on_exit(status);
        })?;
    Ok(())
}

/// Block until `pid` has exited, leaving it unreaped. `false` if that could
/// not be observed.
#[cfg(unix)]
fn wait_exited(pid: u32) -> bool {
    loop {
        // SAFETY: siginfo_t is plain data and waitid only writes into it.
        let mut info: libc::siginfo_t = unsafe { std::mem::zeroed() };
        let rc = unsafe {
            libc::waitid(
                libc::P_PID,
                pid as libc::id_t,
                &mut info,
                libc::WEXITED | libc::WNOWAIT,
            )
        };
        if rc == 0 {
            return true;
        }
        if io::Error::last_os_error().kind() != io::ErrorKind::Interrupted {
            return false;
        }
    }
}

#[cfg(not(unix))]
fn wait_exited(_pid: u32) -> bool {
    false
}

/// Send SIGKILL to `pid`. A process that is already gone counts as success.
#[cfg(unix)]
fn kill(pid: u32) -> io::Result<()> {
    let Ok(pid) = libc::pid_t::try_from(pid) else {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("pid {pid} out of range"),
        ));
    };
    if pid <= 0 {
        return Ok(());
    }
    // SAFETY: plain integer arguments, errno is read right after the call.
    let rc = unsafe { libc::kill(pid, libc::SIGKILL) };
    if rc == 0 {
        return Ok(());
    }
    let err = io::Error::last_os_error();
    if err.raw_os_error() == Some(libc::ESRCH) {
        return Ok(());
    }
    Err(err)
}

#[cfg(not(unix))]
fn kill(_pid: u32) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "killing by pid is only supported on unix",
    ))
}
