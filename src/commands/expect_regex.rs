//! [`ExpectRegex`] command: blocks until a regular expression matches the program output.
//!
//! Script syntax:
//! - `expect_regex "[Pp]assword:"`
//! - `expect_regex "(\d+) files" 5s`

use crate::command::{Context, ScriptCommand};
use crate::parser::parse_quoted_with_timeout;
use crate::pattern::Pattern;
use anyhow::{Context as _, Result};
use async_trait::async_trait;
use regex::Regex;
use std::time::Duration;

/// Like [`Expect`](super::Expect), but matches a regex against each chunk.
///
/// The regex is compiled while parsing, so a bad pattern fails the whole
/// script before the program is touched.
pub struct ExpectRegex {
    pub regex: Regex,
    pub timeout: Option<Duration>,
}

impl ExpectRegex {
    pub const NAME: &'static str = "expect_regex";
}

#[async_trait(?Send)]
impl ScriptCommand for ExpectRegex {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn parse(args: &str) -> Result<Self> {
        let (source, timeout) = parse_quoted_with_timeout(args)?;
        let regex =
            Regex::new(&source).with_context(|| format!("Invalid regular expression: {source}"))?;
        Ok(Self { regex, timeout })
    }

    async fn execute(&self, ctx: &mut Context) -> Result<()> {
        let pattern = Pattern::Regex(self.regex.clone());
        ctx.expect(&pattern, self.timeout).await?;
        Ok(())
    }
}
