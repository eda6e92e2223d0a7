//! Adapter registry -- maps agent identifiers to launch specifications.

use std::collections::HashMap;

use orch_store::AgentType;

use super::claude::ClaudeAdapter;
use super::codex::CodexAdapter;
use super::custom::CustomAdapter;
use super::gemini::GeminiAdapter;
use super::opencode::OpencodeAdapter;
use super::trait_def::AgentAdapter;
use crate::error::{Error, Result};

/// A collection of registered [`AgentAdapter`] implementations, keyed by
/// agent type.
///
/// # Example
///
/// ```ignore
/// let registry = AdapterRegistry::with_defaults();
/// let adapter = registry.get_by_name("claude")?;
/// let command = adapter.build_launch_command(&config)?;
/// ```
#[derive(Default)]
pub struct AdapterRegistry {
    adapters: HashMap<AgentType, Box<dyn AgentAdapter>>,
}

impl AdapterRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding the built-in adapter for every agent type.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(ClaudeAdapter::new());
        registry.register(CodexAdapter::new());
        registry.register(GeminiAdapter::new());
        registry.register(OpencodeAdapter::new());
        registry.register(CustomAdapter::new());
        registry
    }

    /// Register an adapter under its [`AgentAdapter::agent_type`].
    ///
    /// Replaces and returns any adapter previously registered for that type.
    pub fn register(
        &mut self,
        adapter: impl AgentAdapter + 'static,
    ) -> Option<Box<dyn AgentAdapter>> {
        self.adapters.insert(adapter.agent_type(), Box::new(adapter))
    }

    /// Look up the adapter for an agent type.
    pub fn get(&self, agent: AgentType) -> Result<&dyn AgentAdapter> {
        self.adapters
            .get(&agent)
            .map(|b| b.as_ref())
            .ok_or_else(|| Error::NotFound(agent.to_string()))
    }

    /// Look up an adapter by its string identifier (e.g. `"codex"`).
    pub fn get_by_name(&self, name: &str) -> Result<&dyn AgentAdapter> {
        let agent: AgentType = name
            .parse()
            .map_err(|_| Error::NotFound(name.to_string()))?;
        self.get(agent)
    }

    /// Registered agent types in display order.
    pub fn list(&self) -> Vec<AgentType> {
        let mut agents: Vec<AgentType> = self.adapters.keys().copied().collect();
        agents.sort();
        agents
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

impl std::fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterRegistry")
            .field("adapters", &self.list())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::types::{LaunchConfig, PromptInjection};

    #[test]
    fn registry_starts_empty() {
        let registry = AdapterRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.list().is_empty());
    }

    #[test]
    fn defaults_cover_every_agent_type() {
        let registry = AdapterRegistry::with_defaults();
        assert_eq!(registry.len(), AgentType::ALL.len());
        assert_eq!(registry.list(), AgentType::ALL.to_vec());
        for agent in AgentType::ALL {
            assert_eq!(registry.get(agent).unwrap().agent_type(), agent);
        }
    }

    #[test]
    fn unknown_name_is_not_found() {
        let registry = AdapterRegistry::with_defaults();
        let err = registry.get_by_name("cursor").err().unwrap();
        assert!(matches!(err, Error::NotFound(ref name) if name == "cursor"));
    }

    #[test]
    fn unregistered_type_is_not_found() {
        let registry = AdapterRegistry::new();
        assert!(matches!(
            registry.get(AgentType::Claude),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn register_replaces_existing() {
        let mut registry = AdapterRegistry::new();
        assert!(registry.register(ClaudeAdapter::new()).is_none());
        let old = registry.register(ClaudeAdapter::with_binary("/opt/claude"));
        assert!(old.is_some());
        assert_eq!(registry.len(), 1);
        assert_eq!(
            registry.get(AgentType::Claude).unwrap().executable(),
            "/opt/claude"
        );
    }

    #[test]
    fn injection_methods_by_agent() {
        let registry = AdapterRegistry::with_defaults();
        let method = |a| registry.get(a).unwrap().prompt_injection();
        assert_eq!(method(AgentType::Claude), PromptInjection::InlineArgument);
        assert_eq!(method(AgentType::Codex), PromptInjection::InlineArgument);
        assert_eq!(method(AgentType::Gemini), PromptInjection::TerminalKeystrokes);
        assert_eq!(method(AgentType::Opencode), PromptInjection::HttpAfterStart);
        assert_eq!(method(AgentType::Custom), PromptInjection::TerminalKeystrokes);
    }

    #[test]
    fn custom_without_command_fails_through_registry() {
        let registry = AdapterRegistry::with_defaults();
        let adapter = registry.get_by_name("custom").unwrap();
        let err = adapter
            .build_launch_command(&LaunchConfig::new("/w", "i", "r"))
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn registry_debug_shows_agents() {
        let registry = AdapterRegistry::with_defaults();
        let debug = format!("{registry:?}");
        assert!(debug.contains("Claude"));
        assert!(debug.contains("Opencode"));
    }
}
