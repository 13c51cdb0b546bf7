// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The launch collaborator contract.

use async_trait::async_trait;
use marshal_core::{CredentialPayload, HostMessage, SessionToken, WindowPos};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Errors from the launch collaborator.
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("failed to spawn {executable}: {source}")]
    Spawn {
        executable: String,
        #[source]
        source: std::io::Error,
    },

    #[error("terminate failed: {0}")]
    Terminate(String),

    #[error("message send failed: {0}")]
    Send(String),

    #[error("not supported by this launcher: {0}")]
    Unsupported(&'static str),
}

/// Everything a launcher needs to start one managed process.
#[derive(Debug, Clone)]
pub struct LaunchSpec {
    pub profile: String,
    pub executable: PathBuf,
    pub arguments: String,
    /// Credential payload drawn from the profile's key pool, if any.
    pub credential: Option<CredentialPayload>,
    pub window: Option<WindowPos>,
    pub visible: bool,
    /// Address the runtime should reply to; echoed as the sender of every
    /// frame from this process.
    pub host_token: SessionToken,
}

/// A handle on a launched process.
pub trait ProcessHandle: Send + Sync {
    /// The token assigned at launch; keys the frame-sender registry.
    fn token(&self) -> SessionToken;
    fn pid(&self) -> Option<u32>;
    fn has_exited(&self) -> bool;
    /// Exit code once exited; `None` while running or when unknowable.
    fn exit_code(&self) -> Option<i32>;
}

/// Process creation, termination, window control, and host-to-runtime
/// messaging.
///
/// Implementations own the OS-specific parts (injection, window handles,
/// message channels); the engine only holds `ProcessHandle`s and tokens.
#[async_trait]
pub trait Launcher: Send + Sync + 'static {
    async fn launch(&self, spec: LaunchSpec) -> Result<Arc<dyn ProcessHandle>, LaunchError>;

    /// Ask the process to exit, escalating to a forced kill after `grace`.
    /// Terminating an already-gone handle is a no-op.
    async fn terminate(
        &self,
        handle: &dyn ProcessHandle,
        grace: Duration,
    ) -> Result<(), LaunchError>;

    async fn show_window(
        &self,
        handle: &dyn ProcessHandle,
        pos: Option<WindowPos>,
    ) -> Result<(), LaunchError>;

    async fn hide_window(&self, handle: &dyn ProcessHandle) -> Result<(), LaunchError>;

    async fn is_window_visible(&self, handle: &dyn ProcessHandle) -> Result<bool, LaunchError>;

    /// Send one typed message over the point-to-point channel.
    async fn send_message(
        &self,
        handle: &dyn ProcessHandle,
        message: HostMessage,
        payload: &str,
    ) -> Result<(), LaunchError>;

    /// Raw window-message pass-through for `winmsg` frames.
    async fn post_window_message(
        &self,
        handle: &dyn ProcessHandle,
        message_id: u32,
        w_param: isize,
    ) -> Result<(), LaunchError>;
}
