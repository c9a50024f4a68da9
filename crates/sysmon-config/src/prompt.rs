//! Interactive fallback used when no port has been configured.

use std::io::{self, BufRead, Write};

use thiserror::Error;

/// Errors raised while prompting the operator for a port.
#[derive(Debug, Error)]
pub enum PromptError {
    /// Writing the prompt or reading the answer failed.
    #[error("failed to prompt for a port: {0}")]
    Io(#[from] io::Error),
    /// Input ended before an answer was given.
    #[error("no port was entered")]
    NoInput,
    /// The answer was not a valid TCP port.
    #[error("'{0}' is not a valid port")]
    InvalidPort(String),
}

/// Writes `label` to `output` and reads a port number from `input`.
///
/// # Errors
///
/// Returns [`PromptError::NoInput`] at end of input and
/// [`PromptError::InvalidPort`] when the line is not a `u16`.
pub fn prompt_port<R, W>(label: &str, input: &mut R, output: &mut W) -> Result<u16, PromptError>
where
    R: BufRead,
    W: Write,
{
    write!(output, "{label}")?;
    output.flush()?;

    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Err(PromptError::NoInput);
    }
    let answer = line.trim();
    answer
        .parse::<u16>()
        .map_err(|_| PromptError::InvalidPort(answer.to_owned()))
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn reads_trimmed_port() {
        let mut input = Cursor::new(b"  8080 \n".to_vec());
        let mut output = Vec::new();
        let port = prompt_port("Server port: ", &mut input, &mut output).expect("port");
        assert_eq!(port, 8080);
        assert_eq!(output, b"Server port: ");
    }

    #[test]
    fn rejects_non_numeric_answer() {
        let mut input = Cursor::new(b"eighty\n".to_vec());
        let error = prompt_port("Port: ", &mut input, &mut Vec::new()).expect_err("invalid");
        assert!(matches!(error, PromptError::InvalidPort(ref value) if value == "eighty"));
    }

    #[test]
    fn reports_closed_input() {
        let mut input = Cursor::new(Vec::new());
        let error = prompt_port("Port: ", &mut input, &mut Vec::new()).expect_err("no input");
        assert!(matches!(error, PromptError::NoInput));
    }
}
