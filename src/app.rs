use crate::cli::{Cli, Commands};
use crate::config::Config;
use crate::engine::Engine;
use crate::exec::{CommandRunner, TaskExecutor};
use crate::provider::OpenAiProvider;
use crate::queue::{TaskQueue, TaskStatus};
use crate::security::SecurityPolicy;
use crate::sessions;
use crate::terminal::StdinConfirmer;
use crate::tui;
use anyhow::{Context, Result, bail};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

/// Route a parsed CLI invocation to its handler.
pub async fn dispatch(cli: Cli, config: Config) -> Result<()> {
    match cli.command {
        Some(Commands::Chat { prompt }) => chat(&prompt.join(" "), &config).await,
        Some(Commands::Tasks) => tasks().await,
        Some(Commands::Run) => run_approved().await,
        None => chat(&cli.prompt.join(" "), &config).await,
    }
}

async fn chat(prompt: &str, config: &Config) -> Result<()> {
    if prompt.trim().is_empty() {
        bail!("no prompt given; try `magpie \"list my files\"` or `magpie help`");
    }
    if config.ai.api_key.is_empty() {
        let path = Config::config_path()?;
        bail!(
            "AI API key not configured; set ai.api_key in {}",
            path.display()
        );
    }

    let provider = Arc::new(OpenAiProvider::new(
        Some(&config.ai.api_key),
        &config.ai.model,
        &config.ai.base_url,
        Duration::from_secs(config.ai.timeout_secs),
        config.ai.max_tokens,
    ));
    let policy = SecurityPolicy::from_config(&config.security);
    let mut engine = Engine::new(
        provider,
        policy,
        CommandRunner::default_timeout(),
        Arc::new(StdinConfirmer),
    );

    let session_id = sessions::new_session_id();
    let queue_path = sessions::queue_path(&Config::sessions_dir()?, &session_id);
    let queue = TaskQueue::new(queue_path, &session_id).context("open session queue")?;
    engine.attach_queue(Arc::new(queue));

    engine.process(prompt, "").await?;
    Ok(())
}

async fn tasks() -> Result<()> {
    let queues = sessions::load_all_queues(&Config::sessions_dir()?)?;
    let pending: usize = queues.iter().map(|q| q.pending_tasks().len()).sum();
    if pending == 0 {
        println!("No pending tasks.");
        return Ok(());
    }
    tui::run_queue_tui(queues).await
}

/// Batch-execute every approved task across all sessions. Individual task
/// failures are reported per task; the process still exits 0.
async fn run_approved() -> Result<()> {
    let queues = sessions::load_all_queues(&Config::sessions_dir()?)?;
    if queues.is_empty() {
        println!("No task queues found.");
        return Ok(());
    }

    let runner = Arc::new(CommandRunner::default_timeout());
    let mut total_executed = 0usize;
    let mut total_failed = 0usize;

    for queue in queues {
        let approved_ids: HashSet<String> = queue
            .all_tasks()
            .into_iter()
            .filter(|t| t.status == TaskStatus::Approved)
            .map(|t| t.id)
            .collect();
        if approved_ids.is_empty() {
            continue;
        }

        println!(
            "Session {}: executing {} approved task(s)...",
            short_id(queue.session_id()),
            approved_ids.len()
        );

        let executor = TaskExecutor::new(Arc::clone(&queue), Arc::clone(&runner));
        let (results, err) = executor.execute_all_approved().await;
        total_executed += results.len();
        if let Some(err) = err {
            eprintln!("  some tasks could not be executed: {err}");
        }

        for task in queue.all_tasks() {
            if !approved_ids.contains(&task.id) {
                continue;
            }
            match task.status {
                TaskStatus::Completed => {
                    println!("  ok   [{}] {}", short_id(&task.id), task.command.command_line());
                }
                TaskStatus::Failed => {
                    total_failed += 1;
                    println!("  fail [{}] {}", short_id(&task.id), task.command.command_line());
                    if let Some(result) = &task.result {
                        if !result.error.is_empty() {
                            println!("       {}", result.error);
                        }
                    }
                }
                _ => {}
            }
        }
    }

    if total_executed == 0 {
        println!("No approved tasks to execute.");
        println!("Hint: use `magpie tasks` to review and approve pending tasks.");
    } else {
        print!("\nDone: {total_executed} task(s) executed");
        if total_failed > 0 {
            print!(" ({total_failed} failed)");
        }
        println!();
    }

    Ok(())
}

fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}
