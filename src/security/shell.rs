use super::{CheckResult, SecurityPolicy};
use regex::Regex;
use std::sync::OnceLock;

/// Filesystem prefixes an output redirect may not target without
/// authorization.
const PROTECTED_PREFIXES: &[&str] = &[
    "/etc/", "/usr/", "/bin/", "/sbin/", "/boot/", "/lib/", "/lib64/", "/System",
];

/// Output redirects with an optional leading file-descriptor digit and
/// optional whitespace before the target: `>file`, `>> file`, `2>/etc/error`.
fn redirect_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[0-9]?(>{1,2})[ \t]*([^\s&|;]+)").expect("redirect regex"))
}

impl SecurityPolicy {
    /// Analyze a raw shell command line for operations that need
    /// authorization: redirects into protected system paths and `../`
    /// traversal. Denies everything when shell execution is policy-disabled.
    pub fn analyze_shell_command(&self, command_line: &str) -> CheckResult {
        if !self.allow_shell {
            return CheckResult::denied("shell commands are disabled (allow_shell=false)");
        }

        let mut reasons: Vec<String> = Vec::new();

        if command_line.contains("../") {
            reasons.push("potential path traversal".to_string());
        }

        if has_protected_redirect(command_line) {
            reasons.push("redirecting to a protected system path".to_string());
        }

        if reasons.is_empty() {
            CheckResult::pass()
        } else {
            CheckResult::needs_auth("dangerous shell operation detected", reasons.join("; "))
        }
    }
}

fn has_protected_redirect(command_line: &str) -> bool {
    redirect_regex().captures_iter(command_line).any(|caps| {
        let target = &caps[2];
        PROTECTED_PREFIXES
            .iter()
            .any(|prefix| target.starts_with(prefix) || target == prefix.trim_end_matches('/'))
    })
}
