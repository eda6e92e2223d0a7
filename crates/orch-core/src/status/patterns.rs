//! Fixed phrase sets used by the status classifier.
//!
//! All phrases are matched case-insensitively against lowercased output, so
//! they are written in lowercase here. The sets deliberately overlap (for
//! example `esc to cancel` is both an interactive marker and a waiting
//! marker); precedence in [`super::classify`] decides which role wins.

/// Lines searched from the bottom for completion phrases.
pub const COMPLETION_WINDOW: usize = 5;
/// Lines searched from the bottom for rate/quota/cost-limit phrases.
pub const API_LIMIT_WINDOW: usize = 30;
/// Lines searched from the bottom for fatal-error phrases.
pub const FAILURE_WINDOW: usize = 10;

/// Substrings proving an agent UI is still on screen, even when the last
/// line happens to look like a shell prompt.
pub const INTERACTIVE_MARKERS: &[&str] = &[
    "⏎ send",
    "enter to send",
    "? for shortcuts",
    "esc to interrupt",
    "esc to cancel",
    "do you want to proceed",
    "do you want to make this edit",
    "allow edit",
    "allow command",
    "tokens",
    "context left",
    "server listening",
    "listening on http",
];

/// Phrases an agent prints when it considers the task finished.
pub const COMPLETION_PHRASES: &[&str] = &[
    "orch_done",
    "task completed successfully",
    "all tasks completed",
    "work is complete",
];

/// Phrases reporting that a provider limit stopped the agent.
pub const API_LIMIT_PHRASES: &[&str] = &[
    "rate limit",
    "rate_limit",
    "ratelimit",
    "quota exceeded",
    "insufficient_quota",
    "usage limit",
    "limit reached",
    "too many requests",
    "credit balance is too low",
    "cost limit",
    "overloaded_error",
];

/// Phrases reporting a crash or an unrecoverable setup problem.
pub const FAILURE_PHRASES: &[&str] = &[
    "fatal error",
    "panic:",
    "panicked at",
    "segmentation fault",
    "traceback (most recent call last)",
    "authentication failed",
    "invalid api key",
    "please run /login",
    "unauthorized",
    "command not found",
];

/// Substrings shown while the agent waits for the user.
pub const WAITING_MARKERS: &[&str] = &[
    "⏎ send",
    "enter to send",
    "? for shortcuts",
    "esc to cancel",
    "type your message",
    "waiting for input",
    "do you want to proceed",
    "(y/n)",
    "[y/n]",
    "press enter to continue",
];

/// Regular expressions recognising the last line of a shell prompt.
///
/// Matched against the last non-blank line with trailing whitespace removed
/// (tmux strips it when capturing).
pub const SHELL_PROMPT_PATTERNS: &[&str] = &[
    // a bare prompt glyph
    r"^\s*[$%#❯➜»λ]$",
    // user@host:~/dir$, bash-5.2#, (main) $, ~/repo ❯
    r"[\w~/\]\)@:.\-]\s?[$#❯➜»λ]$",
    // zsh `host%`, but not `100%`
    r"[^\d\s%]\s?%$",
    // oh-my-zsh: `➜  repo git:(main) ✗`
    r"\bgit:\([^)]*\)(?:\s*[✗✔*])?$",
    r"^\s*➜\s",
];
