//! Core of the orch supervisor: agent adapters, status classification, the
//! headless client, backend session managers, the launcher and poller, and
//! the IPC daemon.

pub mod agent;
pub mod backend;
#[cfg(unix)]
pub mod daemon;
pub mod error;
pub mod exec;
pub mod headless;
pub mod launcher;
pub mod poll;
pub mod status;

pub use error::{Error, Result};
