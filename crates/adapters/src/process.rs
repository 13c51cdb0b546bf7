// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Plain `tokio::process` launcher for headless hosts.
//!
//! No window control and no message channel; those return `Unsupported`.
//! Termination sends SIGTERM and escalates to SIGKILL after the grace
//! period.

use crate::launch::{LaunchError, LaunchSpec, Launcher, ProcessHandle};
use async_trait::async_trait;
use marshal_core::{HostMessage, SessionToken, WindowPos};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::{Child, Command};

const KILL_POLL: Duration = Duration::from_millis(50);

struct HandleInner {
    child: Child,
    exit: Option<i32>,
}

struct LocalHandle {
    token: SessionToken,
    pid: Option<u32>,
    inner: Mutex<HandleInner>,
}

impl LocalHandle {
    /// Refresh the cached exit status without blocking.
    fn poll_exit(&self) -> Option<i32> {
        let mut inner = self.inner.lock();
        if inner.exit.is_some() {
            return inner.exit;
        }
        if let Ok(Some(status)) = inner.child.try_wait() {
            inner.exit = Some(status.code().unwrap_or(-1));
        }
        inner.exit
    }
}

impl ProcessHandle for LocalHandle {
    fn token(&self) -> SessionToken {
        self.token
    }

    fn pid(&self) -> Option<u32> {
        self.pid
    }

    fn has_exited(&self) -> bool {
        self.poll_exit().is_some()
    }

    fn exit_code(&self) -> Option<i32> {
        self.poll_exit()
    }
}

/// Launcher backed by local child processes.
pub struct LocalLauncher {
    handles: Mutex<HashMap<SessionToken, Arc<LocalHandle>>>,
}

impl LocalLauncher {
    pub fn new() -> Self {
        Self { handles: Mutex::new(HashMap::new()) }
    }

    fn lookup(&self, token: SessionToken) -> Option<Arc<LocalHandle>> {
        self.handles.lock().get(&token).cloned()
    }
}

impl Default for LocalLauncher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(unix)]
fn request_exit(pid: u32) -> Result<(), LaunchError> {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;
    match kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
        Ok(()) | Err(nix::errno::Errno::ESRCH) => Ok(()),
        Err(e) => Err(LaunchError::Terminate(e.to_string())),
    }
}

#[cfg(not(unix))]
fn request_exit(_pid: u32) -> Result<(), LaunchError> {
    // No polite signal available; the grace loop falls through to kill.
    Ok(())
}

#[async_trait]
impl Launcher for LocalLauncher {
    async fn launch(&self, spec: LaunchSpec) -> Result<Arc<dyn ProcessHandle>, LaunchError> {
        let mut command = Command::new(&spec.executable);
        for arg in spec.arguments.split_whitespace() {
            command.arg(arg);
        }
        command.kill_on_drop(true);

        let child = command.spawn().map_err(|source| LaunchError::Spawn {
            executable: spec.executable.display().to_string(),
            source,
        })?;

        let handle = Arc::new(LocalHandle {
            token: spec.host_token,
            pid: child.id(),
            inner: Mutex::new(HandleInner { child, exit: None }),
        });
        self.handles.lock().insert(spec.host_token, Arc::clone(&handle));

        tracing::info!(
            profile = %spec.profile,
            executable = %spec.executable.display(),
            pid = ?handle.pid,
            "launched local process"
        );
        Ok(handle)
    }

    async fn terminate(
        &self,
        handle: &dyn ProcessHandle,
        grace: Duration,
    ) -> Result<(), LaunchError> {
        let Some(local) = self.lookup(handle.token()) else {
            return Ok(());
        };

        if !local.has_exited() {
            if let Some(pid) = local.pid {
                request_exit(pid)?;
            }

            let deadline = tokio::time::Instant::now() + grace;
            while !local.has_exited() && tokio::time::Instant::now() < deadline {
                tokio::time::sleep(KILL_POLL).await;
            }

            if !local.has_exited() {
                tracing::warn!(pid = ?local.pid, "grace expired, killing process");
                let mut inner = local.inner.lock();
                let _ = inner.child.start_kill();
            }
            while !local.has_exited() {
                tokio::time::sleep(KILL_POLL).await;
            }
        }

        self.handles.lock().remove(&handle.token());
        Ok(())
    }

    async fn show_window(
        &self,
        _handle: &dyn ProcessHandle,
        _pos: Option<WindowPos>,
    ) -> Result<(), LaunchError> {
        Err(LaunchError::Unsupported("window control"))
    }

    async fn hide_window(&self, _handle: &dyn ProcessHandle) -> Result<(), LaunchError> {
        Err(LaunchError::Unsupported("window control"))
    }

    async fn is_window_visible(
        &self,
        _handle: &dyn ProcessHandle,
    ) -> Result<bool, LaunchError> {
        Err(LaunchError::Unsupported("window control"))
    }

    async fn send_message(
        &self,
        _handle: &dyn ProcessHandle,
        _message: HostMessage,
        _payload: &str,
    ) -> Result<(), LaunchError> {
        Err(LaunchError::Unsupported("message channel"))
    }

    async fn post_window_message(
        &self,
        _handle: &dyn ProcessHandle,
        _message_id: u32,
        _w_param: isize,
    ) -> Result<(), LaunchError> {
        Err(LaunchError::Unsupported("window messages"))
    }
}

#[cfg(test)]
#[path = "process_tests.rs"]
mod tests;
