use anyhow::{Context, Result};
use clap::Parser;
use expectty::{Engine, ExitStatus, Session, parse_file};
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "expectty",
    about = "Run an expect script against an interactive terminal program",
    version
)]
struct Args {
    /// Path to the script file
    #[arg(short, long)]
    script: PathBuf,

    /// Default timeout for expect commands (e.g. 30s, 500ms)
    #[arg(short, long, default_value = "60s", value_parser = parse_timeout)]
    timeout: Duration,

    /// Log session diagnostics to stderr
    #[arg(short, long)]
    debug: bool,

    /// Do not echo the program's output
    #[arg(short, long)]
    quiet: bool,

    /// Program to run in the PTY, followed by its arguments
    #[arg(trailing_var_arg = true, required = true, num_args = 1..)]
    command: Vec<String>,
}

fn parse_timeout(s: &str) -> Result<Duration, String> {
    expectty::parser::parse_duration(s).map_err(|e| e.to_string())
}

fn init_tracing(debug: bool) {
    let default = if debug { "expectty=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();
    init_tracing(args.debug);

    let commands = parse_file(&args.script)
        .with_context(|| format!("Failed to parse script file: {}", args.script.display()))?;

    let builder = Session::builder().timeout(args.timeout).debug(args.debug);
    let (program, program_args) = args
        .command
        .split_first()
        .context("No program given")?;
    let quiet = args.quiet;
    let mut engine = Engine::spawn_with_builder(builder, program, program_args, move |data| {
        if quiet {
            return;
        }
        let mut stdout = std::io::stdout().lock();
        let _ = stdout.write_all(data);
        let _ = stdout.flush();
    })?;

    engine
        .execute(commands)
        .await
        .context("Failed to execute script")?;

    let code = match engine.finish() {
        Some(ExitStatus::Code(code)) => u8::try_from(code).unwrap_or(1),
        Some(ExitStatus::Signal(_)) => 1,
        None => 0,
    };
    Ok(ExitCode::from(code))
}
