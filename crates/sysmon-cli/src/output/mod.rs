//! Rendering of topic results.
//!
//! Human output lays each topic out as labelled fields or an aligned table.
//! JSON output prints the result value on a single line so watch mode
//! produces one document per line.

mod render;

use clap::ValueEnum;
use serde_json::Value;

use crate::cli::Topic;

pub use render::render_human_output;

/// Output format selection for topic results.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, ValueEnum)]
pub enum OutputFormat {
    /// Selects `human` for terminal output and `json` for redirected output.
    #[default]
    Auto,
    /// Always render human-readable output.
    Human,
    /// Always emit raw JSON values.
    Json,
}

/// Output format after resolving `auto` based on TTY detection.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ResolvedOutputFormat {
    /// Labelled fields and tables.
    Human,
    /// Compact JSON, one value per line.
    Json,
}

impl OutputFormat {
    /// Resolves the output format based on whether stdout is a terminal.
    #[must_use]
    pub const fn resolve(self, stdout_is_terminal: bool) -> ResolvedOutputFormat {
        match self {
            Self::Auto => {
                if stdout_is_terminal {
                    ResolvedOutputFormat::Human
                } else {
                    ResolvedOutputFormat::Json
                }
            }
            Self::Human => ResolvedOutputFormat::Human,
            Self::Json => ResolvedOutputFormat::Json,
        }
    }
}

/// Renders `value` for `topic` in `format`, ending with a newline.
///
/// # Errors
///
/// Returns the serialiser error when JSON output cannot be produced.
pub fn render(
    topic: Topic,
    value: &Value,
    format: ResolvedOutputFormat,
) -> Result<String, serde_json::Error> {
    match format {
        ResolvedOutputFormat::Human => Ok(render_human_output(topic, value)),
        ResolvedOutputFormat::Json => {
            let mut line = serde_json::to_string(value)?;
            line.push('\n');
            Ok(line)
        }
    }
}
