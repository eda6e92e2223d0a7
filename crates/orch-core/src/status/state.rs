use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

/// Per-poll cache for one run.
///
/// Lives for the duration of a polling loop and is never persisted; its only
/// job is answering "did the output change since last poll".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunState {
    pub last_output: String,
    /// Hex-encoded SHA-256 of `last_output`; empty before the first capture.
    pub last_hash: String,
    pub last_capture: Option<DateTime<Utc>>,
    /// Set once the run has been classified as done.
    pub completion_recorded: bool,
}

impl RunState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new capture and report whether it differs from the previous
    /// one. The first capture always counts as a change.
    pub fn observe(&mut self, output: &str) -> bool {
        let hash = hash_output(output);
        let changed = hash != self.last_hash;
        self.last_hash = hash;
        self.last_output = output.to_string();
        self.last_capture = Some(Utc::now());
        changed
    }

    pub fn record_completion(&mut self) {
        self.completion_recorded = true;
    }
}

fn hash_output(output: &str) -> String {
    hex::encode(Sha256::digest(output.as_bytes()))
}
