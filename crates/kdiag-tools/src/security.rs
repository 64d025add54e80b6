//! Security - Allow-listing for diagnostic command pipelines
//!
//! Diagnostic templates are read-only `kubectl` invocations, optionally piped
//! through `grep`. Anything outside that shape is rejected before a shell
//! ever sees it.

use crate::error::{Error, Result};
use crate::executor::ExecutorConfig;

/// Shell metacharacters that are never allowed in a diagnostic command.
///
/// `|` is absent on purpose: pipelines are split and every stage is checked.
pub const SHELL_METACHARACTERS: &[char] =
    &[';', '&', '$', '`', '<', '>', '\n', '\r', '(', ')', '\\'];

/// Default programs a diagnostic pipeline may invoke
pub const DEFAULT_ALLOWED_PROGRAMS: &[&str] = &["kubectl", "grep"];

/// `kubectl` flags that redirect the client to another cluster or identity
pub const BLOCKED_KUBECTL_FLAGS: &[&str] = &[
    "--server",
    "-s",
    "--kubeconfig",
    "--insecure-skip-tls-verify",
    "--token",
    "--certificate-authority",
    "--client-certificate",
    "--client-key",
    "--tls-server-name",
    "--username",
    "--password",
    "--context",
    "--cluster",
    "--user",
];

/// `grep` long flags that read from the filesystem instead of stdin
pub const BLOCKED_GREP_FLAGS: &[&str] = &[
    "--recursive",
    "--dereference-recursive",
    "--directories",
    "--devices",
    "--file",
    "--include",
    "--exclude",
    "--exclude-dir",
];

/// Short `grep` options that read from the filesystem
const BLOCKED_GREP_SHORT: &[char] = &['r', 'R', 'd', 'D', 'f'];

/// Short `grep` options whose value is attached (`-A10`)
const GREP_VALUE_SHORT: &[char] = &['A', 'B', 'C', 'm', 'e'];

/// Find the first forbidden metacharacter in a command, if any
pub fn contains_shell_metacharacters(command: &str) -> Option<char> {
    command.chars().find(|c| SHELL_METACHARACTERS.contains(c))
}

/// Base program name of every stage in a pipeline (`/usr/bin/kubectl get` -> `kubectl`)
pub fn pipeline_programs(command: &str) -> Vec<&str> {
    command
        .split('|')
        .filter_map(|stage| stage.split_whitespace().next())
        .map(|program| program.rsplit('/').next().unwrap_or(program))
        .collect()
}

/// Split a pipeline stage into words, keeping quoted text together
pub fn stage_words(stage: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut in_word = false;

    for c in stage.chars() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => current.push(c),
            None if c == '\'' || c == '"' => {
                quote = Some(c);
                in_word = true;
            }
            None if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            None => {
                current.push(c);
                in_word = true;
            }
        }
    }
    if in_word {
        words.push(current);
    }
    words
}

fn flag_name(word: &str) -> &str {
    word.split('=').next().unwrap_or(word)
}

fn check_kubectl_args(args: &[String]) -> Result<()> {
    for arg in args {
        let name = flag_name(arg);
        if BLOCKED_KUBECTL_FLAGS.contains(&name) {
            return Err(Error::PermissionDenied(format!(
                "kubectl flag '{}' is blocked",
                name
            )));
        }
    }
    Ok(())
}

/// grep may only filter stdin: no file flags, one pattern operand
fn check_grep_args(args: &[String]) -> Result<()> {
    let mut operands = 0;
    for arg in args {
        if let Some(long) = arg.strip_prefix("--") {
            let name = flag_name(arg);
            if long.is_empty() || BLOCKED_GREP_FLAGS.contains(&name) {
                return Err(Error::PermissionDenied(format!("grep flag '{}' is blocked", arg)));
            }
        } else if let Some(short) = arg.strip_prefix('-').filter(|s| !s.is_empty()) {
            for c in short.chars() {
                if BLOCKED_GREP_SHORT.contains(&c) {
                    return Err(Error::PermissionDenied(format!("grep flag '-{}' is blocked", c)));
                }
                if GREP_VALUE_SHORT.contains(&c) {
                    break;
                }
            }
        } else {
            operands += 1;
        }
    }
    if operands > 1 {
        return Err(Error::PermissionDenied(
            "grep may only read from the pipeline, not from files".to_string(),
        ));
    }
    Ok(())
}

/// Check a command against the executor's allow list

pub fn check_command(config: &ExecutorConfig, command: &str) -> Result<()> {
    let trimmed = command.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidCommand("empty command".to_string()));
    }

    if let Some(c) = contains_shell_metacharacters(trimmed) {
        return Err(Error::PermissionDenied(format!(
            "command contains blocked shell metacharacter '{}'",
            c.escape_default()
        )));
    }

    let stages = trimmed.split('|').count();
    let programs = pipeline_programs(trimmed);
    if programs.len() != stages {
        return Err(Error::InvalidCommand("empty pipeline stage".to_string()));
    }

    for (stage, program) in trimmed.split('|').zip(programs) {
        if !config.allowed_programs.iter().any(|p| p == program) {
            return Err(Error::PermissionDenied(format!(
                "program '{}' is blocked: not in the diagnostic allow list",
                program
            )));
        }
        let words = stage_words(stage);
        let args = words.get(1..).unwrap_or_default();
        match program {
            "kubectl" => check_kubectl_args(args)?,
            "grep" => check_grep_args(args)?,
            _ => {}
        }
    }

    Ok(())
}
