//! # Expectty
//!
//! Drive interactive terminal programs through a pseudo-terminal: start a
//! program, feed it input, and wait for the text it prints.
//!
//! Programs that prompt for passwords, run REPLs or draw wizards often behave
//! differently (or refuse to run) without a terminal. Expectty gives them one
//! and lets you script the conversation.
//!
//! ## Quick start
//!
//! ```no_run
//! use expectty::Session;
//!
//! #[tokio::main]
//! async fn main() -> expectty::Result<()> {
//!     let mut session = Session::spawn(["./who.sh"])?;
//!
//!     session.expect_literal("Who are you?").await?;
//!     session.send("Fred\n").await?;
//!     let reply = session.expect_literal("Hello,").await?;
//!     println!("{}", reply.trim_end());
//!
//!     session.expect_eof().await?;
//!     println!("exited with {:?}", session.exit_status());
//!     Ok(())
//! }
//! ```
//!
//! ## How output is matched
//!
//! Output is delivered as [`Chunk`]s, one per read from the terminal, in the
//! order it was read. `expect_literal`, `expect_regex` and `expect` look at one
//! chunk at a time and throw away chunks that do not match. Two consequences:
//!
//! - expectations must follow the order in which the program prints; text that
//!   was already skipped is gone.
//! - a pattern that arrives split across two reads does not match. Prefer short,
//!   distinctive patterns.
//!
//! Every wait is bounded by [`Session::timeout`] (60 seconds unless changed).
//! A timeout fails only that call; the session keeps running.
//!
//! ## Regular expressions
//!
//! ```no_run
//! # async fn demo(session: &mut expectty::Session) -> expectty::Result<()> {
//! let re = regex::Regex::new(r"(.)(.)(.) are you\?").unwrap();
//! let matches = session.expect_regex(&re).await?;
//! assert_eq!(matches[0], ["Who are you?", "W", "h", "o"]);
//! # Ok(())
//! # }
//! ```
//!
//! ## Scripts
//!
//! The same engine runs small line-oriented scripts, either from the
//! `expectty` binary or through [`Engine`]:
//!
//! | Command | Description |
//! |---------|-------------|
//! | `send "text"` | Send a line to the program |
//! | `type "text"` | Send a line one character at a time with random delays |
//! | `key Enter` | Send a key press (supports `Ctrl+`, `Alt+`, `Shift+` modifiers) |
//! | `show "text"` | Write text directly to the output handler |
//! | `expect "text"` | Wait until a chunk of output contains `text` |
//! | `expect "text" 5s` | Same, waiting at most 5 seconds |
//! | `expect_regex "re" [5s]` | Wait until a chunk matches the regular expression |
//! | `expect_eof [5s]` | Wait for the program to exit |
//! | `wait 500ms` | Pause for a duration (`ms` or `s` units, floats allowed) |
//! | `# comment` | Full-line or inline comment |
//!
//! ```no_run
//! use expectty::{Engine, parse_str};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let commands = parse_str("expect \"Who are you?\"\nsend \"Fred\"\nexpect_eof\n")?;
//!     let mut engine = Engine::spawn("./who.sh", &[] as &[&str])?;
//!     engine.execute(commands).await?;
//!     println!("{:?}", engine.finish());
//!     Ok(())
//! }
//! ```
//!
//! New commands implement [`ScriptCommand`] and are registered in the parser.

pub mod command;
pub mod commands;
pub mod engine;
pub mod error;
pub mod parser;
pub mod pattern;
pub(crate) mod process;
pub(crate) mod pty;
pub(crate) mod relay;
pub mod session;

pub use command::{Context, ScriptCommand};
pub use commands::{Expect, ExpectEof, ExpectRegex, KeyPress, SendInput, Show, TypeText, Wait};
pub use engine::Engine;
pub use error::{Error, Result};
pub use parser::{parse_file, parse_str};
pub use pattern::{Match, Pattern};
pub use process::ExitStatus;
pub use relay::Chunk;
pub use session::{DEFAULT_TIMEOUT, Session, SessionBuilder};

/// Crate version, as published.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
