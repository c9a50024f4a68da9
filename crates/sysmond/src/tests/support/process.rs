//! Shutdown and prompt doubles for launch tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use sysmon_config::PromptError;

use crate::process::{PortPrompt, ShutdownError, ShutdownSignal};

/// Shutdown mechanism raised by the test itself.
#[derive(Debug, Clone, Default)]
pub struct ManualShutdown {
    flag: Arc<AtomicBool>,
}

impl ManualShutdown {
    /// Raises the shutdown flag.
    pub fn trigger(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }
}

impl ShutdownSignal for ManualShutdown {
    fn install(&self) -> Result<Arc<AtomicBool>, ShutdownError> {
        Ok(Arc::clone(&self.flag))
    }
}

/// Prompt that answers with a fixed port or fails as if input ended.
#[derive(Debug, Clone, Copy)]
pub struct ScriptedPrompt {
    answer: Option<u16>,
}

impl ScriptedPrompt {
    /// Answers every prompt with `port`.
    #[must_use]
    pub const fn answering(port: u16) -> Self {
        Self { answer: Some(port) }
    }

    /// Fails every prompt with [`PromptError::NoInput`].
    #[must_use]
    pub const fn silent() -> Self {
        Self { answer: None }
    }
}

impl PortPrompt for ScriptedPrompt {
    fn prompt(&self) -> Result<u16, PromptError> {
        self.answer.ok_or(PromptError::NoInput)
    }
}
