//! The `AgentAdapter` trait -- how one agent CLI is started and prompted.
//!
//! Each concrete adapter (Claude Code, Codex, Gemini, opencode, custom)
//! implements this trait. The trait is object-safe so adapters can be stored
//! as `Box<dyn AgentAdapter>` in the [`super::AdapterRegistry`].

use orch_store::AgentType;

use super::types::{LaunchConfig, PromptInjection};
use crate::error::Result;

/// Launch specification for one agent CLI.
///
/// Implementations are pure apart from [`AgentAdapter::is_available`]: the
/// same [`LaunchConfig`] always yields the same command string.
pub trait AgentAdapter: Send + Sync {
    /// The agent type this adapter launches.
    fn agent_type(&self) -> AgentType;

    /// Executable probed by [`AgentAdapter::is_available`].
    fn executable(&self) -> &str;

    /// Build the single shell command line that starts the agent.
    ///
    /// Every user-supplied value is shell-quoted. Fails with
    /// [`crate::Error::Config`] when required launch fields are missing.
    fn build_launch_command(&self, config: &LaunchConfig) -> Result<String>;

    /// How the initial prompt reaches the agent.
    fn prompt_injection(&self) -> PromptInjection;

    /// Substring that appears in the terminal once the agent accepts input.
    ///
    /// Only meaningful for [`PromptInjection::TerminalKeystrokes`]; empty
    /// means no wait is needed.
    fn ready_pattern(&self) -> &str {
        ""
    }

    /// Best-effort check that the executable is installed.
    ///
    /// A `$PATH` lookup only; never spawns the agent. False negatives are
    /// acceptable.
    fn is_available(&self) -> bool {
        probe_executable(self.executable())
    }
}

/// Look up `name` on `$PATH` (or check it directly when it is a path).
pub fn probe_executable(name: &str) -> bool {
    which::which(name).is_ok()
}

// Compile-time assertion: AgentAdapter must be object-safe.
const _: () = {
    fn _assert_object_safe(_: &dyn AgentAdapter) {}
};

#[cfg(test)]
mod tests {
    use super::*;

    /// A trivial adapter proving the trait can be used as `dyn AgentAdapter`.
    struct EchoAdapter;

    impl AgentAdapter for EchoAdapter {
        fn agent_type(&self) -> AgentType {
            AgentType::Custom
        }

        fn executable(&self) -> &str {
            "sh"
        }

        fn build_launch_command(&self, config: &LaunchConfig) -> Result<String> {
            Ok(format!("echo {}", config.issue_id))
        }

        fn prompt_injection(&self) -> PromptInjection {
            PromptInjection::InlineArgument
        }
    }

    #[test]
    fn adapter_is_object_safe() {
        let adapter: Box<dyn AgentAdapter> = Box::new(EchoAdapter);
        assert_eq!(adapter.agent_type(), AgentType::Custom);
        assert_eq!(adapter.ready_pattern(), "");
        let cmd = adapter
            .build_launch_command(&LaunchConfig::new("/tmp", "issue-1", "run-1"))
            .unwrap();
        assert_eq!(cmd, "echo issue-1");
    }

    #[test]
    fn probe_finds_sh_but_not_nonsense() {
        assert!(probe_executable("sh"));
        assert!(!probe_executable("orch-definitely-not-installed-binary"));
    }
}
