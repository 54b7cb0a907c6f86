use crate::error::Result;
use crate::exec::CommandRunner;
use crate::provider::IntentProvider;
use crate::queue::TaskQueue;
use crate::security::SecurityPolicy;
use crate::terminal::{Confirmation, Confirmer};
use std::sync::Arc;
use tracing::{debug, warn};

/// How many output lines to show inline before truncating.
const MAX_OUTPUT_LINES: usize = 20;

/// Per-request orchestration: parse intent, classify each command, then
/// deny, queue, confirm or run it. One command's failure never aborts the
/// remaining commands in the same turn.
pub struct Engine {
    provider: Arc<dyn IntentProvider>,
    policy: SecurityPolicy,
    runner: CommandRunner,
    confirmer: Arc<dyn Confirmer>,
    queue: Option<Arc<TaskQueue>>,
}

impl Engine {
    pub fn new(
        provider: Arc<dyn IntentProvider>,
        policy: SecurityPolicy,
        runner: CommandRunner,
        confirmer: Arc<dyn Confirmer>,
    ) -> Self {
        Self {
            provider,
            policy,
            runner,
            confirmer,
            queue: None,
        }
    }

    /// Attach the task queue used for deferred (async) authorization.
    /// Without one, async commands fall back to interactive confirmation.
    pub fn attach_queue(&mut self, queue: Arc<TaskQueue>) {
        self.queue = Some(queue);
    }

    /// Handle one user request from input text to output.
    pub async fn process(&self, input: &str, system_prompt: &str) -> Result<()> {
        let (is_async, input) = parse_async_marker(input);

        println!("Thinking...");
        let mut intent = self.provider.parse_intent(&input, system_prompt).await?;

        if is_async {
            for command in &mut intent.commands {
                command.is_async = true;
            }
        }

        println!("Plan: {}", intent.reason);

        if intent.needs_confirm
            && self.confirmer.confirm_plan(&intent).await? != Confirmation::Approved
        {
            println!("Cancelled.");
            return Ok(());
        }

        let total = intent.commands.len();
        for (index, command) in intent.commands.iter().enumerate() {
            let check = self.policy.check_command(command);

            if !check.allowed {
                println!("Denied: {}", check.reason);
                continue;
            }

            if check.requires_auth {
                if command.is_async {
                    if let Some(queue) = &self.queue {
                        let task = queue.add_task(command.clone(), check.clone())?;
                        println!("Queued for authorization (task {})", short_id(&task.id));
                        println!("  run `magpie tasks` to review and approve");
                        continue;
                    }
                    // No queue attached: fall back to interactive confirmation.
                }

                match self.confirmer.confirm(command, &check).await? {
                    Confirmation::Approved => {}
                    Confirmation::Skipped => continue,
                    Confirmation::QuitAll => {
                        println!("Cancelled remaining commands.");
                        return Ok(());
                    }
                }
            }

            println!();
            println!(
                "Executing [{}/{}]: {}",
                index + 1,
                total,
                command.command_line()
            );

            let run = self.runner.run(command).await;
            display_output(&run.output);

            if let Some(error) = &run.error {
                println!("Command failed (exit code {}): {error}", run.exit_code);
                continue;
            }

            match self.provider.analyze_output(&command.cmd, &run.output).await {
                Ok(summary) => println!("{summary}"),
                Err(err) => warn!(error = %err, "could not analyze output"),
            }
        }

        debug!("request processed");
        Ok(())
    }
}

/// Detect a trailing `&` async marker and strip it exactly once. Repeated
/// trailing markers survive: `"cmd & &"` parses async with residual
/// `"cmd &"`.
pub fn parse_async_marker(input: &str) -> (bool, String) {
    let trimmed = input.trim();
    match trimmed.strip_suffix('&') {
        Some(stripped) => (true, stripped.trim_end().to_string()),
        None => (false, trimmed.to_string()),
    }
}

fn display_output(output: &str) {
    if output.is_empty() {
        return;
    }
    let lines: Vec<&str> = output.lines().collect();
    if lines.len() > MAX_OUTPUT_LINES {
        println!(
            "Output ({} lines, showing first {MAX_OUTPUT_LINES}):",
            lines.len()
        );
        for line in &lines[..MAX_OUTPUT_LINES] {
            println!("  {line}");
        }
        println!("  ... ({} more lines)", lines.len() - MAX_OUTPUT_LINES);
    } else {
        println!("Output:\n{output}");
    }
}

fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use crate::provider::{CommandSpec, Intent};
    use crate::security::{CheckResult, ConfirmLevel};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tempfile::TempDir;

    struct ScriptedProvider {
        intent: Intent,
    }

    #[async_trait]
    impl IntentProvider for ScriptedProvider {
        async fn parse_intent(
            &self,
            _input: &str,
            _system_prompt: &str,
        ) -> std::result::Result<Intent, ProviderError> {
            Ok(self.intent.clone())
        }

        async fn analyze_output(
            &self,
            _cmd: &str,
            _output: &str,
        ) -> std::result::Result<String, ProviderError> {
            Ok("looks fine".to_string())
        }
    }

    struct ScriptedConfirmer {
        decisions: Mutex<Vec<Confirmation>>,
        calls: Mutex<usize>,
    }

    impl ScriptedConfirmer {
        fn new(decisions: Vec<Confirmation>) -> Self {
            Self {
                decisions: Mutex::new(decisions),
                calls: Mutex::new(0),
            }
        }

        fn calls(&self) -> usize {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl Confirmer for ScriptedConfirmer {
        async fn confirm(
            &self,
            _command: &CommandSpec,
            _check: &CheckResult,
        ) -> anyhow::Result<Confirmation> {
            *self.calls.lock().unwrap() += 1;
            let mut decisions = self.decisions.lock().unwrap();
            Ok(if decisions.is_empty() {
                Confirmation::Skipped
            } else {
                decisions.remove(0)
            })
        }
    }

    fn cmd(program: &str, args: &[&str]) -> CommandSpec {
        CommandSpec::new(program, args.iter().map(ToString::to_string).collect())
    }

    fn engine_with(
        commands: Vec<CommandSpec>,
        policy: SecurityPolicy,
        confirmer: Arc<ScriptedConfirmer>,
    ) -> Engine {
        let provider = Arc::new(ScriptedProvider {
            intent: Intent {
                commands,
                reason: "scripted plan".into(),
                needs_confirm: false,
            },
        });
        Engine::new(provider, policy, CommandRunner::default_timeout(), confirmer)
    }

    #[test]
    fn async_marker_is_stripped_exactly_once() {
        assert_eq!(parse_async_marker("create folder &"), (true, "create folder".into()));
        assert_eq!(
            parse_async_marker("create folder & &"),
            (true, "create folder &".into())
        );
        assert_eq!(parse_async_marker("create folder"), (false, "create folder".into()));
        assert_eq!(parse_async_marker("  spaced &  "), (true, "spaced".into()));
    }

    #[tokio::test]
    async fn denied_command_is_skipped_and_the_turn_continues() {
        let policy = SecurityPolicy {
            restricted_paths: vec!["/etc".to_string()],
            ..SecurityPolicy::default()
        };
        let confirmer = Arc::new(ScriptedConfirmer::new(vec![]));
        let engine = engine_with(
            vec![cmd("cat", &["/etc/shadow"]), cmd("echo", &["hi"])],
            policy,
            Arc::clone(&confirmer),
        );

        engine.process("show the shadow file", "").await.unwrap();
        // The denied command never reaches confirmation; the safe one runs
        // without needing it.
        assert_eq!(confirmer.calls(), 0);
    }

    #[tokio::test]
    async fn async_auth_commands_are_queued_not_confirmed() {
        let dir = TempDir::new().unwrap();
        let queue = Arc::new(
            TaskQueue::new(dir.path().join("queue.json"), "session-1").expect("open queue"),
        );
        let confirmer = Arc::new(ScriptedConfirmer::new(vec![]));

        let mut dangerous = cmd("rm", &["-rf", "/tmp/scratch"]);
        dangerous.is_async = true;
        let mut engine = engine_with(
            vec![dangerous],
            SecurityPolicy::default(),
            Arc::clone(&confirmer),
        );
        engine.attach_queue(Arc::clone(&queue));

        engine.process("clean scratch &", "").await.unwrap();

        assert_eq!(confirmer.calls(), 0);
        let pending = queue.pending_tasks();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].command.cmd, "rm");
        assert!(pending[0].check_result.requires_auth);
    }

    #[tokio::test]
    async fn sync_auth_commands_block_on_confirmation_and_skip_works() {
        let confirmer = Arc::new(ScriptedConfirmer::new(vec![
            Confirmation::Skipped,
            Confirmation::Skipped,
        ]));
        let engine = engine_with(
            vec![cmd("rm", &["a"]), cmd("rm", &["b"])],
            SecurityPolicy::default(),
            Arc::clone(&confirmer),
        );

        engine.process("remove a and b", "").await.unwrap();
        assert_eq!(confirmer.calls(), 2);
    }

    #[tokio::test]
    async fn quit_all_aborts_the_remaining_commands_without_error() {
        let confirmer = Arc::new(ScriptedConfirmer::new(vec![Confirmation::QuitAll]));
        let engine = engine_with(
            vec![cmd("rm", &["a"]), cmd("rm", &["b"]), cmd("rm", &["c"])],
            SecurityPolicy::default(),
            Arc::clone(&confirmer),
        );

        engine.process("remove everything", "").await.unwrap();
        assert_eq!(confirmer.calls(), 1);
    }

    #[tokio::test]
    async fn approved_command_actually_runs() {
        let dir = TempDir::new().unwrap();
        let marker = dir.path().join("marker");
        let confirmer = Arc::new(ScriptedConfirmer::new(vec![Confirmation::Approved]));

        let policy = SecurityPolicy {
            command_level: ConfirmLevel::Always,
            ..SecurityPolicy::default()
        };
        let engine = engine_with(
            vec![cmd("touch", &[marker.to_str().unwrap()])],
            policy,
            Arc::clone(&confirmer),
        );

        engine.process("create the marker", "").await.unwrap();
        assert_eq!(confirmer.calls(), 1);
        assert!(marker.exists());
    }

    #[tokio::test]
    async fn never_level_runs_dangerous_commands_without_confirmation() {
        let dir = TempDir::new().unwrap();
        let marker = dir.path().join("marker");
        std::fs::write(&marker, "x").unwrap();
        let confirmer = Arc::new(ScriptedConfirmer::new(vec![]));

        let policy = SecurityPolicy {
            command_level: ConfirmLevel::Never,
            ..SecurityPolicy::default()
        };
        let engine = engine_with(
            vec![cmd("rm", &[marker.to_str().unwrap()])],
            policy,
            Arc::clone(&confirmer),
        );

        engine.process("remove the marker", "").await.unwrap();
        assert_eq!(confirmer.calls(), 0);
        assert!(!marker.exists());
    }
}
