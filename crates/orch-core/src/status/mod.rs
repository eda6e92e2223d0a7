//! Status classification from captured terminal output.
//!
//! Classification is best-effort text matching over fixed phrase sets. The
//! contract is the precedence order in [`classify`], not the phrase sets
//! themselves:
//!
//! 1. agent exited back to a shell prompt
//! 2. completion phrase in the last 5 lines
//! 3. rate/quota/cost-limit phrase in the last 30 lines
//! 4. fatal/crash/auth phrase in the last 10 lines
//! 5. output changed since the previous poll
//! 6. waiting-for-input marker present
//! 7. no opinion
//!
//! Rarer, higher-signal events come first so a crash banner that also
//! changed the screen is not reported as progress.

pub mod patterns;
pub mod state;

use std::sync::LazyLock;

use regex::Regex;

use self::patterns::*;

pub use state::RunState;

/// What the classifier concluded from one capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// The agent process is gone and a shell prompt is showing.
    Exited,
    /// The agent printed a completion phrase.
    Completed,
    /// A provider rate/quota/cost limit stopped the agent.
    ApiLimited,
    /// The agent crashed or cannot authenticate.
    Failed,
    /// Output changed since the last poll.
    Working,
    /// The agent is waiting for user input.
    WaitingForInput,
}

static SHELL_PROMPTS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    SHELL_PROMPT_PATTERNS
        .iter()
        .filter_map(|p| Regex::new(p).ok())
        .collect()
});

/// Classify captured output.
///
/// `output_changed` is whether the capture differs from the previous poll;
/// `has_prompt` is the result of [`is_waiting_for_input`] (callers usually
/// compute it once and reuse it). Returns `None` when no rule matches and the
/// caller should keep the previous status.
pub fn classify(text: &str, output_changed: bool, has_prompt: bool) -> Option<Classification> {
    if is_agent_exited(text) {
        return Some(Classification::Exited);
    }
    if is_completed(text) {
        return Some(Classification::Completed);
    }
    if is_api_limited(text) {
        return Some(Classification::ApiLimited);
    }
    if is_failed(text) {
        return Some(Classification::Failed);
    }
    if output_changed {
        return Some(Classification::Working);
    }
    if has_prompt {
        return Some(Classification::WaitingForInput);
    }
    None
}

/// Whether the last non-blank line looks like a shell prompt and no agent
/// UI marker is visible anywhere in the capture.
pub fn is_agent_exited(text: &str) -> bool {
    let Some(last) = text.lines().rev().find(|l| !l.trim().is_empty()) else {
        return false;
    };
    let last = last.trim_end();
    if !SHELL_PROMPTS.iter().any(|re| re.is_match(last)) {
        return false;
    }
    let lower = text.to_lowercase();
    !contains_any(&lower, INTERACTIVE_MARKERS)
}

/// Whether a completion phrase appears in the last few lines.
pub fn is_completed(text: &str) -> bool {
    tail_contains_any(text, COMPLETION_WINDOW, COMPLETION_PHRASES)
}

/// Whether a rate/quota/cost-limit phrase appears near the bottom.
pub fn is_api_limited(text: &str) -> bool {
    tail_contains_any(text, API_LIMIT_WINDOW, API_LIMIT_PHRASES)
}

/// Whether a fatal/crash/auth-failure phrase appears near the bottom.
pub fn is_failed(text: &str) -> bool {
    tail_contains_any(text, FAILURE_WINDOW, FAILURE_PHRASES)
}

/// Whether the agent shows a waiting-for-input marker anywhere on screen.
pub fn is_waiting_for_input(text: &str) -> bool {
    contains_any(&text.to_lowercase(), WAITING_MARKERS)
}

/// The last `n` lines of `text`, ignoring trailing blank lines.
///
/// tmux pads captures with empty rows below the cursor; those would
/// otherwise push real output out of the window.
pub fn tail_lines(text: &str, n: usize) -> Vec<&str> {
    let lines: Vec<&str> = text.lines().collect();
    let end = lines
        .iter()
        .rposition(|l| !l.trim().is_empty())
        .map(|i| i + 1)
        .unwrap_or(0);
    let start = end.saturating_sub(n);
    lines[start..end].to_vec()
}

fn tail_contains_any(text: &str, n: usize, phrases: &[&str]) -> bool {
    tail_lines(text, n)
        .iter()
        .any(|line| contains_any(&line.to_lowercase(), phrases))
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_prompt_patterns_compile() {
        assert_eq!(SHELL_PROMPTS.len(), SHELL_PROMPT_PATTERNS.len());
    }

    // -- exited ---------------------------------------------------------

    #[test]
    fn shell_prompts_count_as_exited() {
        for prompt in [
            "user@host:~/repo$ ",
            "$",
            "bash-5.2# ",
            "mbp% ",
            "~/src/orch ❯ ",
            "➜  orch git:(main) ✗ ",
            "➜  orch git:(feature/x)",
            "(main) $ ",
        ] {
            let text = format!("some agent output\nbye\n{prompt}\n\n");
            assert!(is_agent_exited(&text), "expected exited for {prompt:?}");
        }
    }

    #[test]
    fn ordinary_output_is_not_exited() {
        for line in [
            "Compiling orch v0.1.0",
            "Downloading 100%",
            "> ",
            "Reading file src/main.rs",
        ] {
            let text = format!("start\n{line}\n");
            assert!(!is_agent_exited(&text), "unexpected exited for {line:?}");
        }
    }

    #[test]
    fn interactive_marker_suppresses_exited() {
        let text = "╭────────╮\n│ >      │\n╰────────╯\n  ? for shortcuts\nuser@host:~/repo$ ";
        assert!(!is_agent_exited(text));

        let codex = "⏎ send   ⌃J newline\n$ ";
        assert!(!is_agent_exited(codex));

        let server = "opencode server listening on http://127.0.0.1:4096\n% ";
        assert!(!is_agent_exited(server));
    }

    #[test]
    fn empty_capture_is_not_exited() {
        assert!(!is_agent_exited(""));
        assert!(!is_agent_exited("\n\n   \n"));
    }

    // -- windows --------------------------------------------------------

    #[test]
    fn completion_only_counts_in_last_five_lines() {
        let near = "working\nORCH_DONE\n1\n2\n3\n4\n";
        assert!(is_completed(near));

        let far = "ORCH_DONE\n1\n2\n3\n4\n5\n";
        assert!(!is_completed(far));
    }

    #[test]
    fn trailing_blank_rows_do_not_shift_window() {
        let text = format!("ORCH_DONE\n{}", "\n".repeat(40));
        assert!(is_completed(&text));
    }

    #[test]
    fn rate_limit_within_thirty_lines() {
        let mut text = String::from("ORCH_DONE was mentioned long ago\n");
        text.push_str("Rate limit exceeded\n");
        for i in 0..29 {
            text.push_str(&format!("line {i}\n"));
        }
        assert!(is_api_limited(&text));
        assert_eq!(classify(&text, true, false), Some(Classification::ApiLimited));
    }

    #[test]
    fn rate_limit_beyond_thirty_lines_is_ignored() {
        let mut text = String::from("Rate limit exceeded\n");
        for i in 0..30 {
            text.push_str(&format!("line {i}\n"));
        }
        assert!(!is_api_limited(&text));
    }

    #[test]
    fn failure_within_ten_lines() {
        let text = "thread 'main' panicked at src/lib.rs:1:1\nnote: run with RUST_BACKTRACE=1\n";
        assert!(is_failed(text));

        let mut old = String::from("Segmentation fault\n");
        for i in 0..10 {
            old.push_str(&format!("line {i}\n"));
        }
        assert!(!is_failed(&old));
    }

    #[test]
    fn tail_lines_handles_short_text() {
        assert_eq!(tail_lines("a\nb", 5), vec!["a", "b"]);
        assert!(tail_lines("", 5).is_empty());
    }

    // -- precedence -----------------------------------------------------

    #[test]
    fn completion_beats_changed_output() {
        let text = "did stuff\nTask completed successfully\n";
        assert_eq!(classify(text, true, false), Some(Classification::Completed));
        assert_eq!(classify(text, true, true), Some(Classification::Completed));
    }

    #[test]
    fn exited_beats_completion() {
        let text = "ORCH_DONE\nuser@host:~$ ";
        assert_eq!(classify(text, true, false), Some(Classification::Exited));
    }

    #[test]
    fn api_limit_beats_failure() {
        let text = "Error: 429 Too Many Requests\nfatal error: giving up\n";
        assert_eq!(classify(text, false, false), Some(Classification::ApiLimited));
    }

    #[test]
    fn failure_beats_changed_output() {
        let text = "Authentication failed: invalid API key\n";
        assert_eq!(classify(text, true, false), Some(Classification::Failed));
    }

    #[test]
    fn changed_output_beats_waiting() {
        let text = "Editing src/main.rs\nesc to cancel\n";
        assert_eq!(classify(text, true, true), Some(Classification::Working));
        assert_eq!(classify(text, false, true), Some(Classification::WaitingForInput));
    }

    #[test]
    fn nothing_matches_means_no_opinion() {
        assert_eq!(classify("quiet screen\n", false, false), None);
    }

    #[test]
    fn waiting_markers_are_case_insensitive() {
        assert!(is_waiting_for_input("  Type your message or @path/to/file"));
        assert!(is_waiting_for_input("Continue? (Y/n)"));
        assert!(!is_waiting_for_input("Thinking..."));
    }
}
