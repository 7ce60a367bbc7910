use std::process::Command;

/// Render a command the way it would be typed in a shell, for logs and error messages.
/// Arguments with anything outside a shell-safe set of characters get single-quoted
pub fn command_to_string(cmd: &Command) -> String {
    let program = cmd.get_program().to_string_lossy().to_string();
    let mut parts = vec![quote_arg(&program)];
    for arg in cmd.get_args() {
        parts.push(quote_arg(&arg.to_string_lossy()));
    }
    parts.join(" ")
}

fn quote_arg(s: &str) -> String {
    if s.is_empty() {
        return "''".to_string();
    }
    if s.chars().any(|c| !is_shell_safe(c)) {
        format!("'{}'", s.replace('\'', "'\\''"))
    } else {
        s.to_string()
    }
}

fn is_shell_safe(c: char) -> bool {
    c.is_ascii_alphanumeric() || "_./=:@%+,-".contains(c)
}
