//! Test harness utilities for the collector behavioural suite.

mod config_loader;
mod process;
mod reporter;
mod world;

pub use config_loader::{FailingConfigLoader, TestConfigLoader};
pub use process::{ManualShutdown, ScriptedPrompt};
pub use reporter::{HealthEvent, RecordingHealthReporter};
pub use world::{CollectorRun, TestWorld, world};
