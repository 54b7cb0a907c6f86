use crate::provider::CommandSpec;
use std::process::Stdio;
use std::time::Duration;
use tracing::debug;

/// Default deadline for a single command execution.
const DEFAULT_TIMEOUT_SECS: u64 = 30;
/// Maximum captured output size in bytes (1 MB).
const MAX_OUTPUT_BYTES: usize = 1_048_576;

/// What running a command produced. Failure is data here, never an `Err`:
/// a non-zero exit or a spawn problem is reported through `error`.
#[derive(Debug, Clone)]
pub struct RunOutput {
    /// Merged stdout and stderr, trimmed.
    pub output: String,
    pub exit_code: i32,
    pub error: Option<String>,
}

/// Bounded-deadline child-process runner.
///
/// Spawns the program directly with its argument list; no shell
/// interpolation happens here; anything shell-like must already have been
/// vetted by the policy engine.
#[derive(Debug, Clone)]
pub struct CommandRunner {
    timeout: Duration,
}

impl CommandRunner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn default_timeout() -> Self {
        Self::new(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    pub async fn run(&self, command: &CommandSpec) -> RunOutput {
        debug!(cmd = %command.command_line(), "running command");

        let mut child = tokio::process::Command::new(&command.cmd);
        child
            .args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let result = tokio::time::timeout(self.timeout, child.output()).await;

        match result {
            Ok(Ok(output)) => {
                let stdout = String::from_utf8_lossy(&output.stdout);
                let stderr = String::from_utf8_lossy(&output.stderr);

                let mut merged = stdout.into_owned();
                if !stderr.is_empty() {
                    if !merged.is_empty() {
                        merged.push('\n');
                    }
                    merged.push_str(&stderr);
                }
                let mut merged = merged.trim().to_string();
                if merged.len() > MAX_OUTPUT_BYTES {
                    merged.truncate(MAX_OUTPUT_BYTES);
                    merged.push_str("\n... [output truncated at 1MB]");
                }

                let exit_code = output.status.code().unwrap_or(-1);
                let error = (!output.status.success())
                    .then(|| format!("command exited with status {exit_code}"));

                RunOutput {
                    output: merged,
                    exit_code,
                    error,
                }
            }
            Ok(Err(err)) => RunOutput {
                output: String::new(),
                exit_code: 0,
                error: Some(format!("failed to execute command: {err}")),
            },
            Err(_) => RunOutput {
                output: String::new(),
                exit_code: 0,
                error: Some(format!(
                    "command timed out after {}s and was killed",
                    self.timeout.as_secs()
                )),
            },
        }
    }
}
