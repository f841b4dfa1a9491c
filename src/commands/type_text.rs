//! [`TypeText`] command: feeds text to the program one character at a time.
//!
//! Script syntax: `type "text here"`

use crate::command::{Context, ScriptCommand};
use crate::parser::parse_quoted_string;
use anyhow::Result;
use async_trait::async_trait;
use rand::Rng;
use std::time::Duration;
use tokio::time::sleep;

/// Sends `text` one character at a time with random per-character delays,
/// then submits the line with a newline.
///
/// Useful for programs that read raw keystrokes and drop input that arrives
/// faster than a person could type it.
pub struct TypeText {
    pub text: String,
    pub min_delay: Duration,
    pub max_delay: Duration,
}

impl TypeText {
    pub const NAME: &'static str = "type";

    /// Create a `TypeText` command with default timing (50 to 150 ms per character).
    pub fn new(text: impl Into<String>) -> Self {
        Self::with_timing(text, Duration::from_millis(50), Duration::from_millis(150))
    }

    /// Create a `TypeText` command with custom per-character timing.
    pub fn with_timing(text: impl Into<String>, min_delay: Duration, max_delay: Duration) -> Self {
        Self {
            text: text.into(),
            min_delay,
            max_delay: max_delay.max(min_delay),
        }
    }

    fn next_delay(&self) -> Duration {
        let mut rng = rand::thread_rng();
        let ms = rng.gen_range(self.min_delay.as_millis()..=self.max_delay.as_millis());
        Duration::from_millis(u64::try_from(ms).unwrap_or(u64::MAX))
    }
}

#[async_trait(?Send)]
impl ScriptCommand for TypeText {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn parse(args: &str) -> Result<Self> {
        Ok(Self::new(parse_quoted_string(args)?))
    }

    async fn execute(&self, ctx: &mut Context) -> Result<()> {
        let mut buf = [0u8; 4];
        for ch in self.text.chars() {
            ctx.write_to_pty(ch.encode_utf8(&mut buf).as_bytes()).await?;
            sleep(self.next_delay()).await;
        }
        ctx.write_to_pty(b"\n").await
    }
}
