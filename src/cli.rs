use clap::{Parser, Subcommand};

/// Command-line surface. A bare prompt with no subcommand behaves like
/// `magpie chat <prompt>`.
#[derive(Debug, Parser)]
#[command(
    name = "magpie",
    version,
    about = "Terminal assistant that turns natural language into shell commands"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Free-text prompt when no subcommand is given.
    #[arg(trailing_var_arg = true)]
    pub prompt: Vec<String>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Turn a natural-language request into commands and run them.
    Chat {
        /// The request, in plain language. End with `&` to defer
        /// authorization to the task queue.
        prompt: Vec<String>,
    },
    /// Review and authorize queued commands in a TUI.
    Tasks,
    /// Execute every approved task across all sessions.
    Run,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_words_become_the_prompt() {
        let cli = Cli::try_parse_from(["magpie", "list", "my", "files"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.prompt, vec!["list", "my", "files"]);
    }

    #[test]
    fn chat_subcommand_collects_its_prompt() {
        let cli = Cli::try_parse_from(["magpie", "chat", "clean", "up", "&"]).unwrap();
        match cli.command {
            Some(Commands::Chat { prompt }) => assert_eq!(prompt, vec!["clean", "up", "&"]),
            other => panic!("expected chat, got {other:?}"),
        }
    }

    #[test]
    fn tasks_and_run_parse() {
        assert!(matches!(
            Cli::try_parse_from(["magpie", "tasks"]).unwrap().command,
            Some(Commands::Tasks)
        ));
        assert!(matches!(
            Cli::try_parse_from(["magpie", "run"]).unwrap().command,
            Some(Commands::Run)
        ));
    }
}
