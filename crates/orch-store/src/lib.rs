//! Run records and the store collaborator used by the orch supervisor.

pub mod file;
pub mod memory;
pub mod models;
pub mod store;

pub use file::FileRunStore;
pub use memory::MemoryRunStore;
pub use models::{AgentType, Run, RunStatus};
pub use store::{RunStore, StoreError};
