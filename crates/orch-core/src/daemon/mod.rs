//! Local IPC daemon.
//!
//! One daemon per vault listens on `<vault>/.orch/daemon.sock` and forwards
//! send requests from short-lived CLI invocations to the addressed run's
//! backend. A pid file next to the socket plus the socket itself tell other
//! invocations that a daemon is up.

pub mod client;
pub mod protocol;
pub mod server;

use std::path::{Path, PathBuf};

pub use client::DaemonClient;
pub use protocol::{MAX_REQUEST_BYTES, Request, Response, SendRequest};
pub use server::DaemonServer;

/// Filesystem locations used by the daemon of one vault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonPaths {
    pub socket: PathBuf,
    pub pid_file: PathBuf,
}

impl DaemonPaths {
    pub fn for_vault(vault: &Path) -> Self {
        let dir = vault.join(".orch");
        Self {
            socket: dir.join("daemon.sock"),
            pid_file: dir.join("daemon.pid"),
        }
    }

    /// Recorded daemon pid, if the pid file exists and parses.
    pub fn read_pid(&self) -> Option<i32> {
        std::fs::read_to_string(&self.pid_file)
            .ok()?
            .trim()
            .parse()
            .ok()
    }
}

/// Whether a process with `pid` exists.
pub fn process_alive(pid: i32) -> bool {
    if pid <= 0 {
        return false;
    }
    // SAFETY: signal 0 performs only the existence and permission check.
    let rc = unsafe { libc::kill(pid, 0) };
    rc == 0 || std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}
