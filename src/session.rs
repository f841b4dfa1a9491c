//! [`Session`]: one child program running under a PTY, plus the expect engine
//! that reads its output.
//!
//! Each session runs three threads (PTY reader, PTY writer, exit waiter) and
//! one Tokio task that kills the child once the session is cancelled. Output
//! flows through an unbounded FIFO queue of [`Chunk`]s; input flows through a
//! small bounded queue so a stalled writer shows up as a `send` timeout.
//!
//! A read blocked inside the kernel cannot be interrupted. Cancelling kills the
//! child instead, which makes the pending read return EOF.

use crate::error::{Error, Result};
use crate::pattern::{Match, Pattern};
use crate::process::{self, ExitStatus, KillSwitch};
use crate::pty::{self, DEFAULT_COLS, DEFAULT_ROWS, Pty};
use crate::relay::{self, Chunk, OutputHandler, RelayEvents};
use regex::Regex;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// How long `expect*` and `send` wait unless told otherwise.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

const INPUT_QUEUE_DEPTH: usize = 64;

/// State shared between the session and its background threads.
///
/// Every field is written once by the thread that owns it and only read
/// afterwards.
struct Lifecycle {
    cancel: CancellationToken,
    ended: AtomicBool,
    exit_status: OnceLock<ExitStatus>,
    fault: OnceLock<Error>,
    released: watch::Sender<bool>,
    debug: AtomicBool,
}

impl Lifecycle {
    fn is_ended(&self) -> bool {
        self.ended.load(Ordering::SeqCst)
    }

    fn fault(&self) -> Option<Error> {
        self.fault.get().cloned()
    }

    /// Record the child's fate and fire the released notification, once.
    fn finish(&self, status: Option<ExitStatus>) {
        if let Some(status) = status {
            let _ = self.exit_status.set(status);
        }
        if self.ended.swap(true, Ordering::SeqCst) {
            return;
        }
        self.released.send_replace(true);
    }

    async fn wait_released(&self) {
        let mut released = self.released.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = released.wait_for(|done| *done).await;
    }

    /// What a call that was waiting on the session should report once the
    /// session has stopped under it.
    fn interrupted(&self, operation: &str) -> Error {
        self.fault().unwrap_or_else(|| Error::Cancelled {
            operation: operation.to_string(),
        })
    }
}

impl RelayEvents for Lifecycle {
    fn closed(&self) {
        self.cancel.cancel();
    }

    fn failed(&self, err: io::Error) {
        warn!("PTY relay failed: {err}");
        let _ = self.fault.set(Error::from(err));
    }

    fn debug(&self) -> bool {
        self.debug.load(Ordering::Relaxed)
    }
}

/// Kill the child once the session is cancelled, unless it already ended.
async fn watch_cancellation(lifecycle: Arc<Lifecycle>, child: Arc<KillSwitch>) {
    tokio::select! {
        _ = lifecycle.cancel.cancelled() => {}
        _ = lifecycle.wait_released() => return,
    }
    if lifecycle.is_ended() {
        return;
    }
    if lifecycle.debug() {
        debug!("shutting down child");
    }
    if let Err(err) = child.kill() {
        warn!("kill returned {err}");
    }
}

/// Configures and spawns a [`Session`].
///
/// ```no_run
/// use expectty::Session;
/// use std::time::Duration;
///
/// # async fn demo() -> expectty::Result<()> {
/// let mut session = Session::builder()
///     .timeout(Duration::from_secs(5))
///     .size(40, 120)
///     .env("LANG", "C")
///     .spawn(["python3", "-i"])?;
/// session.expect_literal(">>> ").await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct SessionBuilder {
    timeout: Duration,
    debug: bool,
    rows: u16,
    cols: u16,
    cwd: Option<PathBuf>,
    env: Vec<(String, String)>,
    on_output: Option<OutputHandler>,
}

impl Default for SessionBuilder {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            debug: false,
            rows: DEFAULT_ROWS,
            cols: DEFAULT_COLS,
            cwd: None,
            env: Vec::new(),
            on_output: None,
        }
    }
}

impl fmt::Debug for SessionBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionBuilder")
            .field("timeout", &self.timeout)
            .field("debug", &self.debug)
            .field("rows", &self.rows)
            .field("cols", &self.cols)
            .field("cwd", &self.cwd)
            .field("env", &self.env)
            .field("on_output", &self.on_output.is_some())
            .finish()
    }
}

impl SessionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Default deadline for `expect*` and `send`.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Log per-chunk and per-call diagnostics at `debug` level.
    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Terminal size reported to the child.
    pub fn size(mut self, rows: u16, cols: u16) -> Self {
        self.rows = rows;
        self.cols = cols;
        self
    }

    /// Working directory for the child. Defaults to ours.
    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Extra environment variable on top of the inherited environment.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Receive a copy of every output chunk as soon as it is read, whether or
    /// not an `expect` ever looks at it.
    pub fn on_output<F>(mut self, handler: F) -> Self
    where
        F: Fn(&[u8]) + Send + Sync + 'static,
    {
        self.on_output = Some(Arc::new(handler));
        self
    }

    /// Start `argv[0]` with the full `argv` under a new PTY.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// [`Error::PtyAllocation`] if no PTY could be opened, [`Error::Spawn`] if
    /// the program could not be started.
    pub fn spawn<I, S>(self, argv: I) -> Result<Session>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let argv: Vec<String> = argv.into_iter().map(Into::into).collect();
        let program = argv.first().cloned().unwrap_or_default();
        let spawn_error = |reason: String| Error::Spawn {
            program: program.clone(),
            reason,
        };

        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| spawn_error(format!("no Tokio runtime: {e}")))?;
        let cwd = match self.cwd {
            Some(cwd) => cwd,
            None => std::env::current_dir()
                .map_err(|e| spawn_error(format!("cannot resolve working directory: {e}")))?,
        };

        let mut pty = pty::allocate(self.rows, self.cols)?;
        let (reader, writer) = pty.master_io()?;

        let (released, _) = watch::channel(false);
        let lifecycle = Arc::new(Lifecycle {
            cancel: CancellationToken::new(),
            ended: AtomicBool::new(false),
            exit_status: OnceLock::new(),
            fault: OnceLock::new(),
            released,
            debug: AtomicBool::new(self.debug),
        });

        // Relay threads come first: if they cannot start, no child is left behind.
        let (output_tx, output_rx) = mpsc::unbounded_channel();
        let (input_tx, input_rx) = mpsc::channel(INPUT_QUEUE_DEPTH);
        relay::spawn_reader(reader, output_tx, self.on_output, lifecycle.clone())?;
        relay::spawn_writer(writer, input_rx, lifecycle.clone())?;

        if self.debug {
            debug!(?argv, slave = ?pty.slave_path(), "starting");
        }
        let child = process::start(&argv, &pty, &cwd, &self.env)?;
        pty.close_slave();
        let pid = child.pid;
        let kill_switch = child.kill_switch();

        let on_exit = lifecycle.clone();
        if let Err(err) = process::spawn_waiter(child, move |status| on_exit.finish(status)) {
            let _ = kill_switch.kill();
            return Err(err);
        }
        runtime.spawn(watch_cancellation(lifecycle.clone(), kill_switch.clone()));

        Ok(Session {
            argv,
            pid,
            slave_path: pty.slave_path().cloned(),
            pty: Mutex::new(pty),
            input: input_tx,
            output: output_rx,
            lifecycle,
            kill_switch,
            timeout: self.timeout,
        })
    }
}

/// Outcome of waiting for the next chunk.
enum Next {
    Chunk(Chunk),
    Stopped,
    TimedOut,
}

/// A child program running under a PTY.
///
/// Output is consumed strictly in arrival order. An `expect` discards every
/// chunk that does not match, so expectations must follow the order in which
/// the program actually prints. Matching looks at one chunk at a time; see
/// [`Pattern`] for what that means for patterns split across reads.
///
/// Dropping the session kills the child if it is still running.
pub struct Session {
    argv: Vec<String>,
    pid: Option<u32>,
    slave_path: Option<PathBuf>,
    pty: Mutex<Pty>,
    input: mpsc::Sender<Vec<u8>>,
    output: mpsc::UnboundedReceiver<Chunk>,
    lifecycle: Arc<Lifecycle>,
    kill_switch: Arc<KillSwitch>,
    timeout: Duration,
}

impl Session {
    /// Spawn `argv` with default settings. See [`SessionBuilder::spawn`].
    pub fn spawn<I, S>(argv: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        SessionBuilder::default().spawn(argv)
    }

    pub fn builder() -> SessionBuilder {
        SessionBuilder::default()
    }

    pub fn argv(&self) -> &[String] {
        &self.argv
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Path of the terminal device the child sees, e.g. `/dev/pts/3`.
    pub fn slave_path(&self) -> Option<&Path> {
        self.slave_path.as_deref()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    pub fn debug(&self) -> bool {
        self.lifecycle.debug()
    }

    pub fn set_debug(&self, debug: bool) {
        self.lifecycle.debug.store(debug, Ordering::Relaxed);
    }

    /// Whether the child has terminated.
    pub fn is_ended(&self) -> bool {
        self.lifecycle.is_ended()
    }

    /// How the child terminated. `None` while it runs, or if waiting on it failed.
    pub fn exit_status(&self) -> Option<ExitStatus> {
        self.lifecycle.exit_status.get().cloned()
    }

    /// Change the terminal size the child sees.
    pub fn resize(&self, rows: u16, cols: u16) -> Result<()> {
        let pty = self.pty.lock().unwrap_or_else(|e| {
            warn!("PTY lock was poisoned, recovering");
            e.into_inner()
        });
        pty.resize(rows, cols)
    }

    /// Kill the child if it is still running. Safe to call any number of times.
    pub fn cancel(&self) {
        self.lifecycle.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.lifecycle.cancel.is_cancelled()
    }

    /// A handle that cancels this session from another task.
    pub fn cancel_token(&self) -> CancellationToken {
        self.lifecycle.cancel.clone()
    }

    /// Resolves once the child has terminated and the session is ended.
    pub async fn released(&self) {
        self.lifecycle.wait_released().await;
    }

    /// Queue `text` for the child's input, verbatim.
    ///
    /// Messages from one caller reach the child in call order. With several
    /// concurrent callers, the order is whichever message enters the queue
    /// first, not which call started first.
    pub async fn send(&self, text: &str) -> Result<()> {
        self.send_bytes(text.as_bytes()).await
    }

    /// Queue `text` followed by a newline.
    pub async fn send_line(&self, text: &str) -> Result<()> {
        let mut data = text.as_bytes().to_vec();
        data.push(b'\n');
        self.send_bytes(data).await
    }

    /// Queue raw bytes, e.g. control characters, for the child's input.
    pub async fn send_bytes(&self, data: impl Into<Vec<u8>>) -> Result<()> {
        let data = data.into();
        if let Some(err) = self.lifecycle.fault() {
            return Err(err);
        }
        if self.is_ended() || self.is_cancelled() {
            return Err(Error::Cancelled {
                operation: "send".to_string(),
            });
        }
        if self.debug() {
            debug!("sending {:?}", String::from_utf8_lossy(&data));
        }
        match tokio::time::timeout(self.timeout, self.input.send(data)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => Err(self.lifecycle.interrupted("send")),
            Err(_) => Err(Error::Timeout {
                pattern: "send".to_string(),
                timeout: self.timeout,
            }),
        }
    }

    /// Wait for the next chunk, whatever it holds.
    pub async fn next_chunk(&mut self) -> Result<Chunk> {
        let timeout = self.timeout;
        self.next_chunk_timeout(timeout).await
    }

    pub async fn next_chunk_timeout(&mut self, timeout: Duration) -> Result<Chunk> {
        let deadline = Instant::now() + timeout;
        self.next_before(deadline, "output", timeout).await
    }

    /// Wait for a chunk containing `needle` and return that chunk's text.
    pub async fn expect_literal(&mut self, needle: &str) -> Result<String> {
        let pattern = Pattern::literal(needle);
        Ok(self.expect(&pattern).await?.text)
    }

    /// Wait for a chunk matching `re` and return every match in it.
    ///
    /// Each match is the full matched text followed by its capture groups.
    pub async fn expect_regex(&mut self, re: &Regex) -> Result<Vec<Vec<String>>> {
        let pattern = Pattern::Regex(re.clone());
        Ok(self.expect(&pattern).await?.captures)
    }

    /// Wait for `pattern` using the session timeout.
    pub async fn expect(&mut self, pattern: &Pattern) -> Result<Match> {
        let timeout = self.timeout;
        self.expect_timeout(pattern, timeout).await
    }

    /// Wait for `pattern` for at most `timeout`.
    ///
    /// Chunks that do not match are dropped. On timeout nothing else is
    /// consumed and the session keeps running, so the call can be retried.
    ///
    /// # Errors
    ///
    /// [`Error::Timeout`] when the deadline passes, [`Error::Io`] after a relay
    /// failure, [`Error::Cancelled`] when the output ends first.
    pub async fn expect_timeout(&mut self, pattern: &Pattern, timeout: Duration) -> Result<Match> {
        if self.debug() {
            debug!(%pattern, "expecting");
        }
        let description = pattern.to_string();
        let deadline = Instant::now() + timeout;
        loop {
            let chunk = self.next_before(deadline, &description, timeout).await?;
            if let Some(found) = pattern.find(&chunk.text()) {
                if self.debug() {
                    debug!(%pattern, "found match");
                }
                return Ok(found);
            }
        }
    }

    /// Wait for the child to terminate. Does not consume any output.
    pub async fn expect_eof(&mut self) -> Result<()> {
        let timeout = self.timeout;
        self.expect_eof_timeout(timeout).await
    }

    pub async fn expect_eof_timeout(&mut self, timeout: Duration) -> Result<()> {
        if self.debug() {
            debug!("expecting EOF");
        }
        if self.is_ended() {
            return Ok(());
        }
        if let Some(err) = self.lifecycle.fault() {
            return Err(err);
        }
        tokio::time::timeout(timeout, self.lifecycle.wait_released())
            .await
            .map_err(|_| Error::Timeout {
                pattern: "EOF".to_string(),
                timeout,
            })
    }

    async fn next_before(
        &mut self,
        deadline: Instant,
        description: &str,
        timeout: Duration,
    ) -> Result<Chunk> {
        if let Some(err) = self.lifecycle.fault() {
            return Err(err);
        }
        let output = &mut self.output;
        let cancel = &self.lifecycle.cancel;
        // Queued output always wins over cancellation and the timer.
        let next = tokio::select! {
            biased;
            chunk = output.recv() => match chunk {
                Some(chunk) => Next::Chunk(chunk),
                None => Next::Stopped,
            },
            _ = cancel.cancelled() => Next::Stopped,
            _ = tokio::time::sleep_until(deadline) => Next::TimedOut,
        };
        match next {
            Next::Chunk(chunk) => Ok(chunk),
            Next::Stopped => Err(self.lifecycle.interrupted(description)),
            Next::TimedOut => Err(Error::Timeout {
                pattern: description.to_string(),
                timeout,
            }),
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("argv", &self.argv)
            .field("pid", &self.pid)
            .field("timeout", &self.timeout)
            .field("ended", &self.is_ended())
            .field("exit_status", &self.exit_status())
            .finish()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.lifecycle.cancel.cancel();
        if self.is_ended() {
            return;
        }
        // The watcher task may never run again if the runtime is going away.
        if let Err(err) = self.kill_switch.kill() {
            warn!(pid = ?self.pid, "kill on drop returned {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lifecycle() -> Lifecycle {
        let (released, _) = watch::channel(false);
        Lifecycle {
            cancel: CancellationToken::new(),
            ended: AtomicBool::new(false),
            exit_status: OnceLock::new(),
            fault: OnceLock::new(),
            released,
            debug: AtomicBool::new(false),
        }
    }

    #[tokio::test]
    async fn test_finish_fires_released_once() {
        let lifecycle = Arc::new(lifecycle());
        let mut rx = lifecycle.released.subscribe();

        lifecycle.finish(Some(ExitStatus::Code(0)));
        assert!(rx.has_changed().unwrap());
        assert!(*rx.borrow_and_update());

        lifecycle.finish(Some(ExitStatus::Code(9)));
        assert!(!rx.has_changed().unwrap());
        assert_eq!(lifecycle.exit_status.get(), Some(&ExitStatus::Code(0)));
        assert!(lifecycle.is_ended());

        // Late waiters still see the release.
        tokio::time::timeout(Duration::from_secs(1), lifecycle.wait_released())
            .await
            .unwrap();
    }

    #[test]
    fn test_failed_wait_still_ends() {
        let lifecycle = lifecycle();
        lifecycle.finish(None);
        assert!(lifecycle.is_ended());
        assert!(lifecycle.exit_status.get().is_none());
    }

    #[test]
    fn test_first_fault_wins() {
        let lifecycle = lifecycle();
        lifecycle.failed(io::Error::new(io::ErrorKind::BrokenPipe, "first"));
        lifecycle.failed(io::Error::new(io::ErrorKind::Other, "second"));
        let err = lifecycle.interrupted("expect");
        assert!(err.to_string().contains("first"), "got {err}");
    }

    #[test]
    fn test_interrupted_without_fault_is_cancelled() {
        let lifecycle = lifecycle();
        lifecycle.closed();
        assert!(lifecycle.cancel.is_cancelled());
        match lifecycle.interrupted("Hello,") {
            Error::Cancelled { operation } => assert_eq!(operation, "Hello,"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_builder_defaults() {
        let builder = SessionBuilder::new();
        assert_eq!(builder.timeout, DEFAULT_TIMEOUT);
        assert_eq!((builder.rows, builder.cols), (DEFAULT_ROWS, DEFAULT_COLS));
        assert!(!builder.debug);
        assert!(builder.cwd.is_none());
    }

    #[tokio::test]
    async fn test_relay_fault_fails_every_call_fast() {
        let mut session = Session::builder()
            .timeout(Duration::from_secs(30))
            .spawn(["/bin/sh", "-c", "sleep 30"])
            .unwrap();
        session
            .lifecycle
            .failed(io::Error::new(io::ErrorKind::BrokenPipe, "master gone"));

        let calls = async {
            let expect = session.expect_literal("anything").await.unwrap_err();
            let send = session.send("input\n").await.unwrap_err();
            let eof = session.expect_eof().await.unwrap_err();
            (expect, send, eof)
        };
        let (expect, send, eof) = tokio::time::timeout(Duration::from_secs(2), calls)
            .await
            .unwrap();

        for err in [expect, send, eof] {
            assert!(matches!(err, Error::Io(_)), "got {err}");
            assert!(err.to_string().contains("master gone"), "got {err}");
        }
        session.cancel();
    }

    #[test]
    fn test_spawn_outside_runtime_is_an_error() {
        let err = Session::spawn(["/bin/true"]).err().unwrap();
        assert!(matches!(err, Error::Spawn { .. }), "got {err}");
    }
}
