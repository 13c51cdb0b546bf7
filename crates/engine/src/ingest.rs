// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Transport ingestion: one dispatcher task draining the frame channel.
//!
//! Frames arrive from the message-transport collaborator in bursts; the
//! channel is unbounded and the dispatcher applies each frame through the
//! same runtime-state and persistence paths the facade uses. Senders are
//! resolved through the launch-time token registry; frames from unknown
//! senders are dropped.

use crate::orchestrator::{Inner, Orchestrator};
use marshal_adapters::Launcher;
use marshal_core::{Clock, Frame, HostMessage};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Recognized frame functions, decoded from the wire names.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum FrameKind {
    HeartBeat,
    UpdateStatus(String),
    BumpRuns,
    BumpAborts,
    BumpDeaths,
    ConsoleLine(String),
    ItemLogLine(String),
    GetProfile(Option<String>),
    RequestGameInfo,
    SetProfile {
        account: String,
        password: String,
        character: String,
        difficulty: String,
        realm: String,
        info_tag: String,
        game_path: String,
    },
    RestartProfile,
    StopSelf,
    StartNamed(String),
    KeyInUse(String),
    KeyDisabled(String),
    KeyRestricted(String),
    CacheStore { key: String, value: String },
    CacheRetrieve(String),
    CacheDelete(String),
    Shout { text: String, kind: u32 },
    ScheduleOff,
    ScheduleOn,
    WindowMessage { message_id: u32, w_param: isize },
}

impl FrameKind {
    pub(crate) fn parse(frame: &Frame) -> Option<Self> {
        let arg = |i: usize| frame.arg(i).unwrap_or_default().to_string();
        let kind = match frame.function.as_str() {
            "heartBeat" => FrameKind::HeartBeat,
            "updateStatus" => FrameKind::UpdateStatus(arg(0)),
            "updateRuns" => FrameKind::BumpRuns,
            "updateChickens" => FrameKind::BumpAborts,
            "updateDeaths" => FrameKind::BumpDeaths,
            "printToConsole" => FrameKind::ConsoleLine(arg(0)),
            "printToItemLog" => FrameKind::ItemLogLine(arg(0)),
            "getProfile" => {
                FrameKind::GetProfile(frame.arg(0).filter(|s| !s.is_empty()).map(str::to_string))
            }
            "requestGameInfo" => FrameKind::RequestGameInfo,
            "setProfile" => FrameKind::SetProfile {
                account: arg(0),
                password: arg(1),
                character: arg(2),
                difficulty: arg(3),
                realm: arg(4),
                info_tag: arg(5),
                game_path: arg(6),
            },
            "restartProfile" => FrameKind::RestartProfile,
            "stop" => FrameKind::StopSelf,
            "start" => FrameKind::StartNamed(arg(0)),
            "CDKeyInUse" => FrameKind::KeyInUse(arg(0)),
            "CDKeyDisabled" => FrameKind::KeyDisabled(arg(0)),
            "CDKeyRD" => FrameKind::KeyRestricted(arg(0)),
            "store" => FrameKind::CacheStore { key: arg(0), value: arg(1) },
            "retrieve" => FrameKind::CacheRetrieve(arg(0)),
            "delete" => FrameKind::CacheDelete(arg(0)),
            "shoutGlobal" => {
                FrameKind::Shout { text: arg(0), kind: arg(1).parse().unwrap_or(0) }
            }
            "stopSchedule" => FrameKind::ScheduleOff,
            "startSchedule" => FrameKind::ScheduleOn,
            "winmsg" => FrameKind::WindowMessage {
                message_id: arg(0).parse().ok()?,
                w_param: arg(1).parse().unwrap_or(0),
            },
            _ => return None,
        };
        Some(kind)
    }
}

pub(crate) async fn run_ingest<L: Launcher, C: Clock>(
    orch: Orchestrator<L, C>,
    mut frames: mpsc::UnboundedReceiver<Frame>,
) {
    loop {
        tokio::select! {
            _ = orch.inner.shutdown.cancelled() => break,
            frame = frames.recv() => match frame {
                Some(frame) => dispatch(&orch, frame).await,
                None => break,
            },
        }
    }
}

async fn dispatch<L: Launcher, C: Clock>(orch: &Orchestrator<L, C>, frame: Frame) {
    let inner = &orch.inner;
    let Some(kind) = FrameKind::parse(&frame) else {
        tracing::debug!(function = %frame.function, "unrecognized frame function");
        return;
    };
    let Some(name) = inner.registry.resolve(frame.sender) else {
        tracing::debug!(sender = %frame.sender, function = %frame.function, "frame from unknown sender");
        return;
    };

    match kind {
        FrameKind::HeartBeat => {
            let now = inner.clock.epoch_ms();
            inner.states.update(&name, |rt| {
                rt.last_heartbeat_ms = Some(now);
                rt.missed_heartbeats = 0;
                // A beating process proves the run healthy.
                rt.crash_count = 0;
            });
        }

        FrameKind::UpdateStatus(text) => {
            let changed = inner
                .states
                .update(&name, |rt| {
                    if rt.status == text {
                        false
                    } else {
                        rt.status = text.clone();
                        true
                    }
                })
                .unwrap_or(false);
            if changed {
                inner.publish_state(&name, None);
            }
        }

        FrameKind::BumpRuns => bump_counter(inner, &name, |p| p.counters.runs += 1),
        FrameKind::BumpAborts => bump_counter(inner, &name, |p| p.counters.aborts += 1),
        FrameKind::BumpDeaths => bump_counter(inner, &name, |p| p.counters.deaths += 1),

        FrameKind::ConsoleLine(blob) => {
            let (content, color) = parse_console_blob(&blob);
            inner.publish_log(&name, content, color, None);
        }

        FrameKind::ItemLogLine(blob) => {
            let attachment = serde_json::from_str(&blob).ok();
            let (content, color) = parse_console_blob(&blob);
            inner.publish_log(&name, content, color, attachment);
        }

        FrameKind::GetProfile(requested) => {
            let target = requested.as_deref().unwrap_or(&name);
            if let Ok(Some(profile)) = inner.profiles.get_by_name(target) {
                if let Ok(payload) = serde_json::to_string(&profile) {
                    reply(inner, &name, HostMessage::Profile, &payload).await;
                }
            }
        }

        FrameKind::RequestGameInfo => {
            if let Ok(Some(profile)) = inner.profiles.get_by_name(&name) {
                let payload = serde_json::json!({
                    "profile": profile.name,
                    "arguments": profile.arguments,
                    "info_tag": profile.account.info_tag,
                });
                reply(inner, &name, HostMessage::GameInfo, &payload.to_string()).await;
            }
        }

        FrameKind::SetProfile {
            account,
            password,
            character,
            difficulty,
            realm,
            info_tag,
            game_path,
        } => {
            let updated = inner.update_profile(&name, |p| {
                p.account.account = account;
                p.account.password = password;
                p.account.character = character;
                p.account.difficulty = difficulty;
                p.account.realm = realm;
                p.account.info_tag = info_tag;
                if !game_path.is_empty() {
                    p.executable = game_path.into();
                }
            });
            match updated {
                Ok(profile) => inner.publish_state(&name, Some(profile)),
                Err(e) => tracing::warn!(profile = %name, error = %e, "set-profile failed"),
            }
        }

        FrameKind::RestartProfile => {
            if let Err(e) = orch.restart(&name).await {
                tracing::warn!(profile = %name, error = %e, "requested restart failed");
            }
        }

        FrameKind::StopSelf => {
            if let Err(e) = orch.stop(&name, false).await {
                tracing::warn!(profile = %name, error = %e, "requested stop refused");
            }
        }

        FrameKind::StartNamed(target) => {
            if let Err(e) = orch.start(&target) {
                tracing::warn!(profile = %target, error = %e, "requested start refused");
            }
        }

        FrameKind::KeyInUse(key) | FrameKind::KeyRestricted(key) => {
            // The realm rejected the key; rotate away from it and relaunch.
            inner.publish_log(&name, format!("key {key} rejected by realm, rotating"), None, None);
            if let Err(e) = orch.restart(&name).await {
                tracing::warn!(profile = %name, error = %e, "restart after key rejection failed");
            }
        }

        FrameKind::KeyDisabled(key) => {
            // Terminal for the credential: hold it so allocation skips it.
            inner.publish_log(&name, format!("key {key} disabled, holding"), None, None);
            if let Ok(Some(profile)) = inner.profiles.get_by_name(&name) {
                if let Some(pool) = profile.key_pool.as_deref() {
                    if let Err(e) = orch.set_key_held(pool, &key, true) {
                        tracing::warn!(pool, key, error = %e, "hold failed");
                    }
                }
            }
            if let Err(e) = orch.restart(&name).await {
                tracing::warn!(profile = %name, error = %e, "restart after key disable failed");
            }
        }

        FrameKind::CacheStore { key, value } => {
            inner.cache.lock().entry(name).or_default().insert(key, value);
        }

        FrameKind::CacheRetrieve(key) => {
            let value = inner
                .cache
                .lock()
                .get(&name)
                .and_then(|entries| entries.get(&key).cloned())
                .unwrap_or_default();
            reply(inner, &name, HostMessage::CacheValue, &value).await;
        }

        FrameKind::CacheDelete(key) => {
            if let Some(entries) = inner.cache.lock().get_mut(&name) {
                entries.remove(&key);
            }
        }

        FrameKind::Shout { text, kind } => {
            tracing::debug!(profile = %name, kind, "relaying shout");
            orch.broadcast_message(HostMessage::Chat, &text).await;
        }

        FrameKind::ScheduleOff => {
            if let Err(e) = orch.set_schedule_enabled(&name, false) {
                tracing::warn!(profile = %name, error = %e, "schedule disable failed");
            }
        }

        FrameKind::ScheduleOn => {
            if let Err(e) = orch.set_schedule_enabled(&name, true) {
                tracing::warn!(profile = %name, error = %e, "schedule enable failed");
            }
        }

        FrameKind::WindowMessage { message_id, w_param } => {
            let handle = inner.states.with_slot(&name, |slot| slot.handle.clone()).flatten();
            if let Some(handle) = handle {
                if let Err(e) =
                    inner.launcher.post_window_message(handle.as_ref(), message_id, w_param).await
                {
                    tracing::debug!(profile = %name, error = %e, "window message failed");
                }
            }
        }
    }
}

fn bump_counter<L: Launcher, C: Clock>(
    inner: &Arc<Inner<L, C>>,
    name: &str,
    f: impl FnOnce(&mut marshal_core::Profile),
) {
    match inner.update_profile(name, f) {
        Ok(profile) => inner.publish_state(name, Some(profile)),
        Err(e) => tracing::warn!(profile = name, error = %e, "counter update failed"),
    }
}

/// Console blobs are JSON `{"msg": ..., "color": ...}` from the runtime;
/// fall back to the raw text when they are not.
fn parse_console_blob(blob: &str) -> (String, Option<u32>) {
    match serde_json::from_str::<serde_json::Value>(blob) {
        Ok(value) => {
            let content = value
                .get("msg")
                .and_then(|m| m.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| blob.to_string());
            let color = value.get("color").and_then(|c| c.as_u64()).map(|c| c as u32);
            (content, color)
        }
        Err(_) => (blob.to_string(), None),
    }
}

async fn reply<L: Launcher, C: Clock>(
    inner: &Arc<Inner<L, C>>,
    name: &str,
    message: HostMessage,
    payload: &str,
) {
    let handle = inner.states.with_slot(name, |slot| slot.handle.clone()).flatten();
    let Some(handle) = handle else {
        return;
    };
    if let Err(e) = inner.launcher.send_message(handle.as_ref(), message, payload).await {
        tracing::debug!(profile = name, message = %message, error = %e, "reply failed");
    }
}

#[cfg(test)]
#[path = "ingest_tests.rs"]
mod tests;
