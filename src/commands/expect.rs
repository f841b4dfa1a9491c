//! [`Expect`] command: blocks until literal text appears in the program output.
//!
//! Script syntax:
//! - `expect "$ "`: session timeout
//! - `expect "Password:" 10s`: custom timeout

use crate::command::{Context, ScriptCommand};
use crate::parser::parse_quoted_with_timeout;
use crate::pattern::Pattern;
use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;

/// Blocks until a chunk of output contains `pattern`, or until the timeout elapses.
///
/// Output chunks that do not contain the text are consumed, so a later
/// `Expect` only sees what arrives after the match.
pub struct Expect {
    pub pattern: String,
    pub timeout: Option<Duration>,
}

impl Expect {
    pub const NAME: &'static str = "expect";

    /// Create an `Expect` command that uses the session timeout.
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            timeout: None,
        }
    }

    /// Create an `Expect` command with a custom timeout.
    pub fn with_timeout(pattern: impl Into<String>, timeout: Duration) -> Self {
        Self {
            pattern: pattern.into(),
            timeout: Some(timeout),
        }
    }
}

#[async_trait(?Send)]
impl ScriptCommand for Expect {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn parse(args: &str) -> Result<Self> {
        let (pattern, timeout) = parse_quoted_with_timeout(args)?;
        Ok(Self { pattern, timeout })
    }

    async fn execute(&self, ctx: &mut Context) -> Result<()> {
        let pattern = Pattern::literal(self.pattern.as_str());
        ctx.expect(&pattern, self.timeout).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::ScriptCommand;

    #[test]
    fn test_parse_default_timeout() {
        let cmd = Expect::parse(r#""$ ""#).unwrap();
        assert_eq!(cmd.pattern, "$ ");
        assert_eq!(cmd.timeout, None);
    }

    #[test]
    fn test_parse_custom_timeout() {
        let cmd = Expect::parse(r#""hello world" 2s"#).unwrap();
        assert_eq!(cmd.pattern, "hello world");
        assert_eq!(cmd.timeout, Some(Duration::from_secs(2)));
    }

    #[test]
    fn test_parse_ms_timeout() {
        let cmd = Expect::parse(r#""Ready" 500ms"#).unwrap();
        assert_eq!(cmd.timeout, Some(Duration::from_millis(500)));
    }

    #[test]
    fn test_parse_unclosed_quote() {
        assert!(Expect::parse(r#""unclosed"#).is_err());
    }

    #[test]
    fn test_parse_missing_quote() {
        assert!(Expect::parse("no_quotes").is_err());
    }
}
