//! Adapter registry for coding-agent CLIs.
//!
//! This module defines the [`AgentAdapter`] trait that every agent
//! implements, the launch value types ([`LaunchConfig`],
//! [`PromptInjection`]) and the [`AdapterRegistry`] for runtime lookup.
//!
//! # Architecture
//!
//! ```text
//! CLI / Launcher
//!     |
//!     v
//! AdapterRegistry --get(AgentType::Claude)--> &dyn AgentAdapter
//!                                                  |
//!     build_launch_command(config) -> "claude ... 'prompt'"
//!     prompt_injection()           -> inline | keystrokes | http
//!     ready_pattern()              -> "" | "Type your message"
//!     is_available()               -> $PATH probe
//! ```

pub mod claude;
pub mod codex;
pub mod custom;
pub mod gemini;
pub mod opencode;
pub mod registry;
pub mod shell;
pub mod trait_def;
pub mod types;

pub use claude::ClaudeAdapter;
pub use codex::CodexAdapter;
pub use custom::CustomAdapter;
pub use gemini::GeminiAdapter;
pub use opencode::OpencodeAdapter;
pub use registry::AdapterRegistry;
pub use trait_def::AgentAdapter;
pub use types::{LaunchConfig, PromptInjection};
