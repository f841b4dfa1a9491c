//! [`SendInput`] command: sends a line to the program's stdin instantly.
//!
//! Script syntax: `send "text here"`

use crate::command::{Context, ScriptCommand};
use crate::parser::parse_quoted_string;
use anyhow::Result;
use async_trait::async_trait;

/// Queues bytes for the program's stdin in one piece.
///
/// A newline is appended so the program receives a complete line.
pub struct SendInput {
    pub data: Vec<u8>,
}

impl SendInput {
    pub const NAME: &'static str = "send";

    /// Create a `SendInput` command. A newline is appended automatically.
    pub fn new(text: impl Into<String>) -> Self {
        let mut bytes = text.into().into_bytes();
        bytes.push(b'\n');
        Self { data: bytes }
    }
}

#[async_trait(?Send)]
impl ScriptCommand for SendInput {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn parse(args: &str) -> Result<Self> {
        Ok(Self::new(parse_quoted_string(args)?))
    }

    async fn execute(&self, ctx: &mut Context) -> Result<()> {
        ctx.write_to_pty(&self.data).await
    }
}
