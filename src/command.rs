//! The [`ScriptCommand`] trait and the [`Context`] type commands receive when executed.

use crate::pattern::{Match, Pattern};
use crate::relay::OutputHandler;
use crate::session::Session;
use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;

/// Execution context passed to [`ScriptCommand::execute`].
///
/// Gives commands the running [`Session`] and the output handler that also
/// receives the program's transcript.
pub struct Context {
    pub(crate) session: Session,
    pub(crate) output_handler: OutputHandler,
}

impl Context {
    /// Write raw bytes to the program's stdin.
    pub async fn write_to_pty(&self, data: &[u8]) -> Result<()> {
        self.session.send_bytes(data).await?;
        Ok(())
    }

    /// Pass bytes through the output handler (e.g. to stdout or a custom sink).
    pub fn emit(&self, data: &[u8]) {
        (self.output_handler)(data);
    }

    /// Wait for `pattern`, with `timeout` overriding the session default.
    pub async fn expect(&mut self, pattern: &Pattern, timeout: Option<Duration>) -> Result<Match> {
        let timeout = timeout.unwrap_or_else(|| self.session.timeout());
        Ok(self.session.expect_timeout(pattern, timeout).await?)
    }

    /// Wait for the program to exit.
    pub async fn expect_eof(&mut self, timeout: Option<Duration>) -> Result<()> {
        let timeout = timeout.unwrap_or_else(|| self.session.timeout());
        Ok(self.session.expect_eof_timeout(timeout).await?)
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }
}

/// A single script command.
///
/// Implement this trait to add a new command to the engine. Then:
///
/// 1. Define `pub const NAME: &'static str` on your struct: the script
///    keyword (e.g. `"send"`, `"expect"`) used by the parser.
/// 2. Re-export the struct from `src/commands/mod.rs`.
/// 3. Add one entry to the `REGISTRY` in [`crate::parser`]:
///    `(MyCmd::NAME, MyCmd::parse_boxed)`.
#[async_trait(?Send)]
pub trait ScriptCommand: 'static {
    /// The command name, accessible at runtime through a trait object.
    ///
    /// Implementations should return their `NAME` constant:
    /// `fn name(&self) -> &'static str { Self::NAME }`.
    fn name(&self) -> &'static str;

    /// Parse this command from the argument string (everything after the
    /// command keyword on the script line).
    fn parse(args: &str) -> Result<Self>
    where
        Self: Sized;

    /// Parse and box this command. Used as the function-pointer type stored in
    /// the command registry; the default implementation calls [`parse`](Self::parse)
    /// and boxes the result.
    fn parse_boxed(args: &str) -> Result<Box<dyn ScriptCommand>>
    where
        Self: Sized,
    {
        Ok(Box::new(Self::parse(args)?))
    }

    /// Execute the command using the provided engine context.
    async fn execute(&self, ctx: &mut Context) -> Result<()>;
}
