use crate::command::{Context, ScriptCommand};
use crate::process::ExitStatus;
use crate::session::{Session, SessionBuilder};
use anyhow::{Context as _, Result};
use std::io::{self, Write};
use std::sync::Arc;
use tracing::debug;

/// Runs script commands against one program under a PTY
pub struct Engine {
    ctx: Context,
}

impl Engine {
    /// Spawn `command` with `args`, echoing all of its output to stdout
    pub fn spawn(command: &str, args: &[impl AsRef<str>]) -> Result<Self> {
        Self::spawn_with_handler(command, args, |data| {
            let mut stdout = io::stdout().lock();
            let _ = stdout.write_all(data);
            let _ = stdout.flush();
        })
    }

    /// Spawn `command` with `args`, passing all of its output to `handler`
    pub fn spawn_with_handler<F>(command: &str, args: &[impl AsRef<str>], handler: F) -> Result<Self>
    where
        F: Fn(&[u8]) + Send + Sync + 'static,
    {
        Self::spawn_with_builder(Session::builder(), command, args, handler)
    }

    /// Spawn with a preconfigured [`SessionBuilder`] (timeout, size, environment)
    pub fn spawn_with_builder<F>(
        builder: SessionBuilder,
        command: &str,
        args: &[impl AsRef<str>],
        handler: F,
    ) -> Result<Self>
    where
        F: Fn(&[u8]) + Send + Sync + 'static,
    {
        let handler = Arc::new(handler);
        let tee = handler.clone();

        let argv = std::iter::once(command.to_string())
            .chain(args.iter().map(|arg| arg.as_ref().to_string()));
        let session = builder
            .on_output(move |data| tee(data))
            .spawn(argv)
            .with_context(|| format!("Failed to spawn {command}"))?;

        Ok(Engine {
            ctx: Context {
                session,
                output_handler: handler,
            },
        })
    }

    /// Execute commands in order, stopping at the first failure
    pub async fn execute(&mut self, commands: Vec<Box<dyn ScriptCommand>>) -> Result<()> {
        for (index, command) in commands.iter().enumerate() {
            debug!(step = index + 1, command = command.name(), "executing");
            command
                .execute(&mut self.ctx)
                .await
                .with_context(|| format!("Command {} ({}) failed", index + 1, command.name()))?;
        }
        Ok(())
    }

    pub fn session(&self) -> &Session {
        &self.ctx.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.ctx.session
    }

    /// Finish the run: report how the program exited, or kill it if it is still running
    pub fn finish(self) -> Option<ExitStatus> {
        let session = &self.ctx.session;
        if session.is_ended() {
            session.exit_status()
        } else {
            session.cancel();
            None
        }
    }
}
