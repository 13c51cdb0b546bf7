// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scriptable launcher for engine and spec tests.
//!
//! Behaviors are queued per launch: the default keeps the fake process
//! running until terminated; `ExitAfter` self-terminates with a chosen
//! code; `FailSpawn` makes the launch call itself fail. Every message and
//! window operation is recorded for assertions.

use crate::launch::{LaunchError, LaunchSpec, Launcher, ProcessHandle};
use async_trait::async_trait;
use marshal_core::{HostMessage, SessionToken, WindowPos};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// What the next launch should do.
#[derive(Debug, Clone)]
pub enum LaunchBehavior {
    /// Stay alive until terminated (terminate reports exit code 0).
    StayRunning,
    /// Exit on its own after `delay` with `code`.
    ExitAfter { delay: Duration, code: i32 },
    /// Fail the launch call itself.
    FailSpawn,
}

/// One host-to-runtime message the engine sent.
#[derive(Debug, Clone)]
pub struct SentMessage {
    pub token: SessionToken,
    pub message: HostMessage,
    pub payload: String,
}

struct FakeHandle {
    token: SessionToken,
    pid: u32,
    exited: AtomicBool,
    code: Mutex<Option<i32>>,
}

impl FakeHandle {
    fn exit(&self, code: i32) {
        *self.code.lock() = Some(code);
        self.exited.store(true, Ordering::SeqCst);
    }
}

impl ProcessHandle for FakeHandle {
    fn token(&self) -> SessionToken {
        self.token
    }

    fn pid(&self) -> Option<u32> {
        Some(self.pid)
    }

    fn has_exited(&self) -> bool {
        self.exited.load(Ordering::SeqCst)
    }

    fn exit_code(&self) -> Option<i32> {
        if self.has_exited() {
            *self.code.lock()
        } else {
            None
        }
    }
}

#[derive(Default)]
struct FakeState {
    behaviors: VecDeque<LaunchBehavior>,
    launches: Vec<LaunchSpec>,
    handles: HashMap<SessionToken, Arc<FakeHandle>>,
    messages: Vec<SentMessage>,
    window_messages: Vec<(SessionToken, u32, isize)>,
    visible: HashMap<SessionToken, bool>,
    next_pid: u32,
}

/// Scriptable [`Launcher`].
#[derive(Default)]
pub struct FakeLauncher {
    state: Mutex<FakeState>,
}

impl FakeLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a behavior for the next launch; unqueued launches stay running.
    pub fn queue_behavior(&self, behavior: LaunchBehavior) {
        self.state.lock().behaviors.push_back(behavior);
    }

    /// Queue the same behavior `count` times.
    pub fn queue_behaviors(&self, behavior: LaunchBehavior, count: usize) {
        for _ in 0..count {
            self.queue_behavior(behavior.clone());
        }
    }

    /// Specs of every launch seen so far, in order.
    pub fn launches(&self) -> Vec<LaunchSpec> {
        self.state.lock().launches.clone()
    }

    pub fn launch_count(&self) -> usize {
        self.state.lock().launches.len()
    }

    /// Token of the most recent launch.
    pub fn last_token(&self) -> Option<SessionToken> {
        self.state.lock().launches.last().map(|s| s.host_token)
    }

    /// Every message sent through `send_message`, in order.
    pub fn sent_messages(&self) -> Vec<SentMessage> {
        self.state.lock().messages.clone()
    }

    pub fn messages_for(&self, token: SessionToken) -> Vec<SentMessage> {
        self.state.lock().messages.iter().filter(|m| m.token == token).cloned().collect()
    }

    /// Raw window messages passed through, in order.
    pub fn window_messages(&self) -> Vec<(SessionToken, u32, isize)> {
        self.state.lock().window_messages.clone()
    }

    /// Make a fake process exit with `code`, as if it crashed or finished.
    pub fn exit_process(&self, token: SessionToken, code: i32) {
        if let Some(handle) = self.state.lock().handles.get(&token) {
            handle.exit(code);
        }
    }

    fn lookup(&self, token: SessionToken) -> Option<Arc<FakeHandle>> {
        self.state.lock().handles.get(&token).cloned()
    }
}

#[async_trait]
impl Launcher for FakeLauncher {
    async fn launch(&self, spec: LaunchSpec) -> Result<Arc<dyn ProcessHandle>, LaunchError> {
        let (behavior, handle) = {
            let mut state = self.state.lock();
            let behavior = state.behaviors.pop_front().unwrap_or(LaunchBehavior::StayRunning);
            state.launches.push(spec.clone());

            if matches!(behavior, LaunchBehavior::FailSpawn) {
                return Err(LaunchError::Spawn {
                    executable: spec.executable.display().to_string(),
                    source: std::io::Error::new(std::io::ErrorKind::NotFound, "scripted failure"),
                });
            }

            state.next_pid += 1;
            let handle = Arc::new(FakeHandle {
                token: spec.host_token,
                pid: 10_000 + state.next_pid,
                exited: AtomicBool::new(false),
                code: Mutex::new(None),
            });
            state.handles.insert(spec.host_token, Arc::clone(&handle));
            state.visible.insert(spec.host_token, spec.visible);
            (behavior, handle)
        };

        if let LaunchBehavior::ExitAfter { delay, code } = behavior {
            let scripted = Arc::clone(&handle);
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                scripted.exit(code);
            });
        }

        Ok(handle)
    }

    async fn terminate(
        &self,
        handle: &dyn ProcessHandle,
        _grace: Duration,
    ) -> Result<(), LaunchError> {
        if let Some(fake) = self.lookup(handle.token()) {
            if !fake.has_exited() {
                fake.exit(0);
            }
        }
        Ok(())
    }

    async fn show_window(
        &self,
        handle: &dyn ProcessHandle,
        _pos: Option<WindowPos>,
    ) -> Result<(), LaunchError> {
        self.state.lock().visible.insert(handle.token(), true);
        Ok(())
    }

    async fn hide_window(&self, handle: &dyn ProcessHandle) -> Result<(), LaunchError> {
        self.state.lock().visible.insert(handle.token(), false);
        Ok(())
    }

    async fn is_window_visible(&self, handle: &dyn ProcessHandle) -> Result<bool, LaunchError> {
        Ok(*self.state.lock().visible.get(&handle.token()).unwrap_or(&false))
    }

    async fn send_message(
        &self,
        handle: &dyn ProcessHandle,
        message: HostMessage,
        payload: &str,
    ) -> Result<(), LaunchError> {
        self.state.lock().messages.push(SentMessage {
            token: handle.token(),
            message,
            payload: payload.to_string(),
        });
        Ok(())
    }

    async fn post_window_message(
        &self,
        handle: &dyn ProcessHandle,
        message_id: u32,
        w_param: isize,
    ) -> Result<(), LaunchError> {
        self.state.lock().window_messages.push((handle.token(), message_id, w_param));
        Ok(())
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
