//! Shell quoting for launch command construction.

/// Wrap `s` in single quotes so a POSIX shell reads it back verbatim.
///
/// Embedded single quotes become `'"'"'` (close, double-quoted quote, reopen),
/// so `hello 'world'` becomes `'hello '"'"'world'"'"''`.
pub fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        if c == '\'' {
            out.push_str("'\"'\"'");
        } else {
            out.push(c);
        }
    }
    out.push('\'');
    out
}

/// Quote `s` only when it contains characters a shell would interpret.
///
/// Flag values such as model names are usually plain identifiers; leaving
/// them bare keeps commands readable in `tmux ls` and logs.
pub fn quote_arg(s: &str) -> String {
    let is_plain = !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '/' | ':' | '=' | '@' | '+' | ','));
    if is_plain { s.to_string() } else { quote(s) }
}
