use crate::provider::CommandSpec;
use regex::Regex;
use std::sync::OnceLock;

/// Programs considered inherently risky. Matched against the basename so
/// `/bin/rm` is caught while `rmfoo` is not.
const DANGEROUS_COMMANDS: &[&str] = &[
    "rm", "rmdir", "dd", "mkfs", "format", "chmod", "chown", "userdel", "groupdel", "fdisk",
];

/// Specific command-line fragments that always require authorization,
/// matched as plain substrings of the reconstructed command line.
const DANGEROUS_PATTERNS: &[&str] = &["rm -rf /", "rm -rf .*", "chmod 777 /", "chmod 777/"];

/// Output redirect whose target is the root directory or a file directly
/// under it (`> /`, `>/x`, `>> /x`), with or without whitespace. Deeper
/// system targets like `/etc/...` are the shell analyzer's job.
fn root_redirect_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r">[ \t]*/[^/\s]*([ \t]|$)").expect("root redirect regex"))
}

/// Check a command against the fixed dangerous-name and pattern lists.
pub(crate) fn is_dangerous(cmd: &CommandSpec) -> bool {
    if DANGEROUS_COMMANDS.contains(&cmd.program_name()) {
        return true;
    }

    let line = cmd.command_line();
    if DANGEROUS_PATTERNS.iter().any(|p| line.contains(p)) {
        return true;
    }

    root_redirect_regex().is_match(&line)
}
