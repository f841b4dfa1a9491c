//! [`ExpectEof`] command: waits for the program to exit.
//!
//! Script syntax: `expect_eof` or `expect_eof 10s`

use crate::command::{Context, ScriptCommand};
use crate::parser::parse_optional_duration;
use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;

pub struct ExpectEof {
    pub timeout: Option<Duration>,
}

impl ExpectEof {
    pub const NAME: &'static str = "expect_eof";
}

#[async_trait(?Send)]
impl ScriptCommand for ExpectEof {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn parse(args: &str) -> Result<Self> {
        Ok(Self {
            timeout: parse_optional_duration(args)?,
        })
    }

    async fn execute(&self, ctx: &mut Context) -> Result<()> {
        ctx.expect_eof(self.timeout).await
    }
}
