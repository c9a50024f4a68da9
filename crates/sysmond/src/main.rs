//! Collector entrypoint; delegates to [`sysmond::run_daemon`].

use std::io::{self, Write};
use std::process::ExitCode;

fn main() -> ExitCode {
    match sysmond::run_daemon() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            writeln!(io::stderr().lock(), "sysmond: {error}").ok();
            ExitCode::FAILURE
        }
    }
}
