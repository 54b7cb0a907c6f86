use crate::provider::{CommandSpec, Intent};
use crate::security::CheckResult;
use anyhow::Result;
use async_trait::async_trait;

/// What the user decided about one command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    /// Run it now.
    Approved,
    /// Skip this command, continue with the rest.
    Skipped,
    /// Abort every remaining command in this turn.
    QuitAll,
}

/// Blocking interactive authorization seam. The engine only sees this trait,
/// so tests substitute a scripted implementation.
#[async_trait]
pub trait Confirmer: Send + Sync {
    async fn confirm(&self, command: &CommandSpec, check: &CheckResult) -> Result<Confirmation>;

    /// One up-front question for a whole plan the provider marked as needing
    /// confirmation. Defaults to proceeding.
    async fn confirm_plan(&self, _intent: &Intent) -> Result<Confirmation> {
        Ok(Confirmation::Approved)
    }
}

/// Reads y/s/q decisions from standard input.
pub struct StdinConfirmer;

#[async_trait]
impl Confirmer for StdinConfirmer {
    async fn confirm(&self, command: &CommandSpec, check: &CheckResult) -> Result<Confirmation> {
        eprintln!();
        eprintln!("This operation requires your authorization");
        eprintln!();
        eprintln!("Command: {}", command.command_line());
        if !check.warning.is_empty() {
            eprintln!("Warning: {}", check.warning);
        }
        if !check.reason.is_empty() {
            eprintln!("Reason:  {}", check.reason);
        }
        eprintln!();
        eprint!("[y] run  [s] skip  [q] cancel all\n> ");

        loop {
            let line = read_line().await?;
            match line.trim().to_lowercase().as_str() {
                "y" => return Ok(Confirmation::Approved),
                "s" => return Ok(Confirmation::Skipped),
                "q" => return Ok(Confirmation::QuitAll),
                _ => eprint!("invalid choice, enter y/s/q: "),
            }
        }
    }

    async fn confirm_plan(&self, intent: &Intent) -> Result<Confirmation> {
        eprintln!();
        eprintln!("The assistant wants to run {} command(s):", intent.commands.len());
        for command in &intent.commands {
            eprintln!("  {}", command.command_line());
        }
        eprint!("[y] proceed  [q] cancel\n> ");

        let line = read_line().await?;
        if line.trim().eq_ignore_ascii_case("y") {
            Ok(Confirmation::Approved)
        } else {
            Ok(Confirmation::QuitAll)
        }
    }
}

async fn read_line() -> Result<String> {
    // stdin is blocking; keep the runtime free while waiting on the user.
    let line = tokio::task::spawn_blocking(|| {
        let mut input = String::new();
        std::io::stdin().read_line(&mut input)?;
        Ok::<_, std::io::Error>(input)
    })
    .await??;
    Ok(line)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confirmation_variants_compare() {
        assert_eq!(Confirmation::Approved, Confirmation::Approved);
        assert_ne!(Confirmation::Approved, Confirmation::QuitAll);
    }

    #[tokio::test]
    async fn default_plan_confirmation_proceeds() {
        struct AlwaysYes;

        #[async_trait]
        impl Confirmer for AlwaysYes {
            async fn confirm(
                &self,
                _command: &CommandSpec,
                _check: &CheckResult,
            ) -> Result<Confirmation> {
                Ok(Confirmation::Approved)
            }
        }

        let confirmer = AlwaysYes;
        let decision = confirmer.confirm_plan(&Intent::default()).await.unwrap();
        assert_eq!(decision, Confirmation::Approved);
    }
}
