mod openai;

pub use openai::OpenAiProvider;

use crate::error::ProviderError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A single shell command produced by the intent provider.
///
/// Immutable once produced: the engine and queue only ever read it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    pub cmd: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub is_async: bool,
}

impl CommandSpec {
    pub fn new(cmd: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            cmd: cmd.into(),
            args,
            is_async: false,
        }
    }

    /// The full command line as a single string (`cmd` followed by args).
    pub fn command_line(&self) -> String {
        if self.args.is_empty() {
            self.cmd.clone()
        } else {
            format!("{} {}", self.cmd, self.args.join(" "))
        }
    }

    /// Program name with any leading directory components stripped, so
    /// `/bin/rm` and `rm` compare equal.
    pub fn program_name(&self) -> &str {
        self.cmd.rsplit('/').next().unwrap_or(&self.cmd)
    }
}

/// Parsed user intent: an ordered command list plus the provider's rationale.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Intent {
    #[serde(default)]
    pub commands: Vec<CommandSpec>,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub needs_confirm: bool,
}

/// Contract for the AI backend that turns free text into commands.
#[async_trait]
pub trait IntentProvider: Send + Sync {
    /// Parse a natural-language request into an ordered command list.
    async fn parse_intent(
        &self,
        input: &str,
        system_prompt: &str,
    ) -> Result<Intent, ProviderError>;

    /// Summarize command output for the user in one or two sentences.
    async fn analyze_output(&self, cmd: &str, output: &str) -> Result<String, ProviderError>;
}
