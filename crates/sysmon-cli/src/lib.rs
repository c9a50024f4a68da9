//! Command-line dashboard for the sysmon collector.
//!
//! The module owns argument parsing, configuration bootstrapping, the
//! connection to `sysmond`, and result rendering. The interface is designed
//! to be exercised both from the binary entrypoint and from tests where
//! configuration loading and IO streams can be substituted.

use std::ffi::OsString;
use std::io::{BufRead, Write};
use std::process::ExitCode;

use clap::Parser;
use serde_json::Value;

use sysmon_config::Config;

mod cli;
mod config;
mod errors;
pub mod output;
mod session;

pub use cli::Topic;
use cli::Cli;
use config::{command_arguments, split_config_arguments};
pub(crate) use config::{ConfigLoader, OrthoConfigLoader};
pub(crate) use errors::AppError;
pub use output::{OutputFormat, ResolvedOutputFormat, render, render_human_output};
use session::WatchPlan;

/// Bundles the IO streams provided to the CLI runtime.
///
/// `stdin` is only read when no port is configured and the operator has to
/// be asked for one.
pub(crate) struct IoStreams<'a, R: BufRead, W: Write, E: Write> {
    pub(crate) stdin: &'a mut R,
    pub(crate) stdout: &'a mut W,
    pub(crate) stderr: &'a mut E,
    stdout_is_terminal: bool,
}

impl<'a, R: BufRead, W: Write, E: Write> IoStreams<'a, R, W, E> {
    pub(crate) const fn new(
        stdin: &'a mut R,
        stdout: &'a mut W,
        stderr: &'a mut E,
        stdout_is_terminal: bool,
    ) -> Self {
        Self {
            stdin,
            stdout,
            stderr,
            stdout_is_terminal,
        }
    }

    pub(crate) const fn stdout_is_terminal(&self) -> bool {
        self.stdout_is_terminal
    }
}

struct CliRunner<'a, R: BufRead, W: Write, E: Write, L: ConfigLoader> {
    io: &'a mut IoStreams<'a, R, W, E>,
    loader: &'a L,
}

impl<'a, R, W, E, L> CliRunner<'a, R, W, E, L>
where
    R: BufRead,
    W: Write,
    E: Write,
    L: ConfigLoader,
{
    const fn new(io: &'a mut IoStreams<'a, R, W, E>, loader: &'a L) -> Self {
        Self { io, loader }
    }

    fn run<I>(&mut self, args: I) -> ExitCode
    where
        I: IntoIterator<Item = OsString>,
    {
        let args: Vec<OsString> = args.into_iter().collect();
        let split = split_config_arguments(&args);

        let cli = match Cli::try_parse_from(command_arguments(&args, &split)) {
            Ok(cli) => cli,
            Err(error) if !error.use_stderr() => {
                return match write!(self.io.stdout, "{error}") {
                    Ok(()) => ExitCode::SUCCESS,
                    Err(_) => ExitCode::FAILURE,
                };
            }
            Err(error) => return self.fail(&AppError::CliUsage(error)),
        };

        let result = self
            .loader
            .load(&split.config_arguments)
            .and_then(|config| self.execute(&cli, &config));
        match result {
            Ok(()) => ExitCode::SUCCESS,
            Err(error) => self.fail(&error),
        }
    }

    fn execute(&mut self, cli: &Cli, config: &Config) -> Result<(), AppError> {
        let endpoint = session::resolve_endpoint(config, self.io.stdin, self.io.stderr)?;
        let client = session::connect(&endpoint, &session::connection_settings(config))?;
        let format = cli.output.resolve(self.io.stdout_is_terminal());
        let topic = cli.topic;
        let stdout = &mut *self.io.stdout;
        let print = |value: &Value| emit(&mut *stdout, topic, value, format);

        if cli.watch {
            let plan = WatchPlan {
                interval: cli.interval(),
                count: cli.count,
            };
            session::watch(&client, topic, plan, print).map(drop)
        } else {
            session::fetch(&client, topic, print)
        }
    }

    fn fail(&mut self, error: &AppError) -> ExitCode {
        writeln!(self.io.stderr, "{error}").ok();
        ExitCode::FAILURE
    }
}

fn emit<W: Write>(
    stdout: &mut W,
    topic: Topic,
    value: &Value,
    format: ResolvedOutputFormat,
) -> Result<(), AppError> {
    let rendered = render(topic, value, format).map_err(AppError::Render)?;
    stdout.write_all(rendered.as_bytes())?;
    stdout.flush()?;
    Ok(())
}

/// Runs the CLI using the provided arguments and IO handles.
#[must_use]
pub fn run<I, R, W, E>(
    args: I,
    stdin: &mut R,
    stdout: &mut W,
    stderr: &mut E,
    stdout_is_terminal: bool,
) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    R: BufRead,
    W: Write,
    E: Write,
{
    let mut io = IoStreams::new(stdin, stdout, stderr, stdout_is_terminal);
    run_with_loader(args, &mut io, &OrthoConfigLoader)
}

/// Runs the CLI with a custom configuration loader.
#[must_use]
pub(crate) fn run_with_loader<'a, I, R, W, E, L>(
    args: I,
    io: &'a mut IoStreams<'a, R, W, E>,
    loader: &'a L,
) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    R: BufRead,
    W: Write,
    E: Write,
    L: ConfigLoader,
{
    CliRunner::new(io, loader).run(args)
}
