mod danger;
mod path;
mod shell;

use crate::provider::CommandSpec;
use serde::{Deserialize, Serialize};

/// When a command must be confirmed by the user before it runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfirmLevel {
    /// Every command requires confirmation.
    Always,
    /// Only commands a check flagged as dangerous require confirmation.
    #[default]
    Dangerous,
    /// No confirmation required.
    Never,
}

/// Outcome of a policy check. A value, not an error: classification never
/// fails, it only decides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResult {
    pub allowed: bool,
    pub requires_auth: bool,
    #[serde(default)]
    pub warning: String,
    #[serde(default)]
    pub reason: String,
}

impl CheckResult {
    pub fn pass() -> Self {
        Self {
            allowed: true,
            ..Self::default()
        }
    }

    pub fn denied(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            requires_auth: false,
            warning: String::new(),
            reason: reason.into(),
        }
    }

    pub fn needs_auth(warning: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            allowed: true,
            requires_auth: true,
            warning: warning.into(),
            reason: reason.into(),
        }
    }
}

/// Security policy enforced on every command before it runs or is queued.
#[derive(Debug, Clone)]
pub struct SecurityPolicy {
    pub command_level: ConfirmLevel,
    pub restricted_paths: Vec<String>,
    pub readonly_paths: Vec<String>,
    pub allow_shell: bool,
    pub allow_terminal_takeover: bool,
}

impl Default for SecurityPolicy {
    fn default() -> Self {
        Self {
            command_level: ConfirmLevel::Dangerous,
            restricted_paths: Vec::new(),
            readonly_paths: Vec::new(),
            allow_shell: true,
            allow_terminal_takeover: true,
        }
    }
}

/// Programs that write to the filesystem by nature, independent of redirects.
const WRITE_COMMANDS: &[&str] = &["rm", "mv", "cp", "touch", "mkdir", "chmod", "chown", "tee"];

fn is_write_operation(cmd: &CommandSpec) -> bool {
    cmd.command_line().contains('>') || WRITE_COMMANDS.contains(&cmd.program_name())
}

impl SecurityPolicy {
    /// Build from the `[security]` config section.
    pub fn from_config(config: &crate::config::SecurityConfig) -> Self {
        Self {
            command_level: config.command_level,
            restricted_paths: config.restricted_paths.clone(),
            readonly_paths: config.readonly_paths.clone(),
            allow_shell: config.allow_shell,
            allow_terminal_takeover: config.allow_terminal_takeover,
        }
    }

    /// Classify a command: run the dangerous-command, path-access and
    /// shell-level checks in order and aggregate their findings.
    ///
    /// A restricted-path hit denies unconditionally and short-circuits.
    /// Otherwise warnings/reasons from every triggered check are joined and
    /// the final `requires_auth` is derived from `command_level`:
    /// `always` → true, `never` → false, `dangerous` → any check triggered.
    pub fn check_command(&self, cmd: &CommandSpec) -> CheckResult {
        let mut warnings: Vec<String> = Vec::new();
        let mut reasons: Vec<String> = Vec::new();

        // Check 1: dangerous command detection
        if danger::is_dangerous(cmd) {
            warnings.push(format!("Dangerous command: {}", cmd.command_line()));
            reasons.push("command is in the dangerous list".to_string());
        }

        // Check 2: path access control
        let write = is_write_operation(cmd);
        for candidate in path::extract_paths(cmd) {
            if self.is_restricted_path(&candidate) {
                return CheckResult::denied(format!("access denied: {candidate} is restricted"));
            }
            if self.is_readonly_path(&candidate, write) {
                warnings.push(format!("read-only protection: {candidate} cannot be written"));
                reasons.push("path is in the readonly list".to_string());
            }
        }

        // Check 3: shell-level analysis
        let shell = self.analyze_shell_command(&cmd.command_line());
        if !shell.allowed {
            return shell;
        }
        if shell.requires_auth {
            warnings.push(shell.warning);
            reasons.push(shell.reason);
        }

        let triggered = !reasons.is_empty();
        let requires_auth = match self.command_level {
            ConfirmLevel::Always => true,
            ConfirmLevel::Never => false,
            ConfirmLevel::Dangerous => triggered,
        };

        CheckResult {
            allowed: true,
            requires_auth,
            warning: warnings.join("; "),
            reason: reasons.join("; "),
        }
    }
}
