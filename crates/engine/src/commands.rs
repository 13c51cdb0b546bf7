// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Facade commands: the operations the surrounding product calls.
//!
//! Preconditions are enforced through the runtime state store's
//! transition guard; violations return typed refusals without side
//! effects.

use crate::error::EngineError;
use crate::orchestrator::Orchestrator;
use crate::supervisor;
use marshal_adapters::Launcher;
use marshal_core::{Clock, Event, HostMessage, Profile, ProfileState, Settings};
use tokio_util::sync::CancellationToken;

impl<L: Launcher, C: Clock> Orchestrator<L, C> {
    fn require_profile(&self, name: &str) -> Result<Profile, EngineError> {
        self.inner
            .profiles
            .get_by_name(name)?
            .ok_or_else(|| EngineError::UnknownProfile(name.to_string()))
    }

    fn current_state(&self, name: &str) -> Result<ProfileState, EngineError> {
        self.inner
            .states
            .snapshot(name)
            .map(|rt| rt.state)
            .ok_or_else(|| EngineError::UnknownProfile(name.to_string()))
    }

    /// Begin supervising `name`.
    ///
    /// Refused unless the transition into `Starting` is legal (from
    /// `Stopped` or `Error`). On success the state change is published and
    /// a supervision task is spawned with a fresh cancellation signal.
    pub fn start(&self, name: &str) -> Result<(), EngineError> {
        self.require_profile(name)?;
        let from = self.current_state(name)?;
        if !self.inner.states.try_transition(name, ProfileState::Starting) {
            return Err(EngineError::IllegalTransition {
                name: name.to_string(),
                from,
                to: ProfileState::Starting,
            });
        }

        let cancel = CancellationToken::new();
        self.inner.states.with_slot(name, |slot| {
            slot.runtime.status.clear();
            slot.runtime.crash_count = 0;
            slot.runtime.missed_heartbeats = 0;
            slot.runtime.started_at_ms = None;
            slot.runtime.last_heartbeat_ms = None;
            slot.cancel = Some(cancel.clone());
        });
        self.inner.publish_state(name, None);

        let task = tokio::spawn(supervisor::supervise(
            self.clone(),
            name.to_string(),
            cancel,
        ));
        self.inner.states.with_slot(name, |slot| slot.task = Some(task));
        Ok(())
    }

    /// Stop supervising `name`.
    ///
    /// Idempotent on `Stopped`. Without `force`, refused when the
    /// transition into `Stopping` is illegal (notably mid-`Starting`).
    /// Cancels the supervision task, waits for its cleanup, and finishes
    /// the cleanup itself when no task is alive to do it.
    pub async fn stop(&self, name: &str, force: bool) -> Result<(), EngineError> {
        let state = self.current_state(name)?;
        if state == ProfileState::Stopped {
            return Ok(());
        }

        if !force && !state.can_transition(ProfileState::Stopping) {
            return Err(EngineError::IllegalTransition {
                name: name.to_string(),
                from: state,
                to: ProfileState::Stopping,
            });
        }

        if self.inner.states.try_transition(name, ProfileState::Stopping) {
            self.inner.publish_state(name, None);
        } else if force && state != ProfileState::Stopping {
            self.inner.states.force_state(name, ProfileState::Stopping);
            self.inner.publish_state(name, None);
        }

        let (cancel, task) = self
            .inner
            .states
            .with_slot(name, |slot| (slot.cancel.take(), slot.task.take()))
            .unwrap_or((None, None));
        if let Some(cancel) = cancel {
            cancel.cancel();
        }
        if let Some(task) = task {
            let _ = task.await;
        }

        // The supervision task normally lands the state in Stopped; cover
        // the paths where none was alive (Error without a task, forced
        // stop of a stale slot).
        if self.current_state(name)? != ProfileState::Stopped {
            supervisor::stop_cleanup(&self.inner, name).await;
        }
        if self.current_state(name)? != ProfileState::Stopped {
            self.inner.states.force_state(name, ProfileState::Stopped);
            self.inner.publish_state(name, None);
        }
        Ok(())
    }

    /// Start every registered profile; refusals are reported per profile.
    pub fn start_all(&self) -> Vec<(String, Result<(), EngineError>)> {
        self.profile_names()
            .into_iter()
            .map(|name| {
                let result = self.start(&name);
                (name, result)
            })
            .collect()
    }

    /// Stop every registered profile; refusals are reported per profile.
    pub async fn stop_all(&self, force: bool) -> Vec<(String, Result<(), EngineError>)> {
        let mut results = Vec::new();
        for name in self.profile_names() {
            let result = self.stop(&name, force).await;
            results.push((name, result));
        }
        results
    }

    /// Supervised stop + start. The stopped run releases its key, so the
    /// relaunch acquires the next one in round-robin order.
    pub async fn restart(&self, name: &str) -> Result<(), EngineError> {
        let profile = self.inner.update_profile(name, |p| p.counters.restarts += 1)?;
        self.inner.publish_state(name, Some(profile));
        self.stop(name, true).await?;
        self.start(name)
    }

    /// Drop the current credential and draw the next free one from the
    /// profile's pool.
    pub fn rotate_key(&self, name: &str) -> Result<(), EngineError> {
        let profile = self.require_profile(name)?;
        let pool_name = profile
            .key_pool
            .ok_or_else(|| EngineError::NoKeyPool(name.to_string()))?;
        let pool = self
            .inner
            .key_pools
            .get_by_name(&pool_name)?
            .ok_or_else(|| EngineError::NoAvailableKeys(pool_name.clone()))?;

        self.inner
            .states
            .update(name, |rt| rt.assigned_key = None)
            .ok_or_else(|| EngineError::UnknownProfile(name.to_string()))?;

        if self.inner.acquire_key(&pool, name).is_none() {
            // The old key stays released.
            self.inner.publish_key_pools();
            return Err(EngineError::NoAvailableKeys(pool_name));
        }
        self.inner.publish_state(name, None);
        self.inner.publish_key_pools();
        Ok(())
    }

    /// Clear the assigned credential. Releasing a profile that holds no
    /// key succeeds.
    pub fn release_key(&self, name: &str) -> Result<(), EngineError> {
        self.inner
            .states
            .update(name, |rt| rt.assigned_key = None)
            .ok_or_else(|| EngineError::UnknownProfile(name.to_string()))?;
        self.inner.publish_key_pools();
        Ok(())
    }

    /// Toggle the administrative hold on a credential.
    pub fn set_key_held(&self, pool: &str, key: &str, held: bool) -> Result<(), EngineError> {
        let mut stored = self
            .inner
            .key_pools
            .get_by_name(pool)?
            .ok_or_else(|| marshal_storage::StoreError::NotFound(pool.to_string()))?;
        match stored.credential_mut(key) {
            Some(credential) => credential.held = held,
            None => {
                return Err(EngineError::UnknownKey {
                    pool: pool.to_string(),
                    key: key.to_string(),
                })
            }
        }
        self.inner.key_pools.update(stored)?;
        self.inner.publish_key_pools();
        Ok(())
    }

    /// Zero all counters through persistence.
    pub fn reset_stats(&self, name: &str) -> Result<(), EngineError> {
        let profile = self.inner.update_profile(name, |p| p.counters = Default::default())?;
        self.inner.publish_state(name, Some(profile));
        Ok(())
    }

    pub async fn show_window(&self, name: &str) -> Result<(), EngineError> {
        let profile = self.require_profile(name)?;
        let handle = self
            .inner
            .states
            .with_slot(name, |slot| slot.handle.clone())
            .flatten()
            .ok_or_else(|| EngineError::NotRunning(name.to_string()))?;
        self.inner
            .launcher
            .show_window(handle.as_ref(), profile.window)
            .await?;
        let profile = self.inner.update_profile(name, |p| p.visible = true)?;
        self.inner.publish_state(name, Some(profile));
        Ok(())
    }

    pub async fn hide_window(&self, name: &str) -> Result<(), EngineError> {
        self.require_profile(name)?;
        let handle = self
            .inner
            .states
            .with_slot(name, |slot| slot.handle.clone())
            .flatten()
            .ok_or_else(|| EngineError::NotRunning(name.to_string()))?;
        self.inner.launcher.hide_window(handle.as_ref()).await?;
        let profile = self.inner.update_profile(name, |p| p.visible = false)?;
        self.inner.publish_state(name, Some(profile));
        Ok(())
    }

    pub async fn is_window_visible(&self, name: &str) -> Result<bool, EngineError> {
        let handle = self
            .inner
            .states
            .with_slot(name, |slot| slot.handle.clone())
            .flatten()
            .ok_or_else(|| EngineError::NotRunning(name.to_string()))?;
        Ok(self.inner.launcher.is_window_visible(handle.as_ref()).await?)
    }

    /// Persist the schedule-enabled flag and publish the full profile.
    pub fn set_schedule_enabled(&self, name: &str, enabled: bool) -> Result<(), EngineError> {
        let profile = self.inner.update_profile(name, |p| p.schedule_enabled = enabled)?;
        self.inner.publish_state(name, Some(profile));
        Ok(())
    }

    /// Reorder the persisted profile list; optionally reassign the group.
    pub fn reorder(
        &self,
        name: &str,
        index: usize,
        group: Option<&str>,
    ) -> Result<(), EngineError> {
        self.require_profile(name)?;
        if let Some(group) = group {
            self.inner.update_profile(name, |p| p.group = group.to_string())?;
        }
        self.inner.profiles.move_to_index(name, index)?;
        self.inner.publish_profiles();
        Ok(())
    }

    /// Send the same message to every Running profile. Best-effort;
    /// per-profile failures are published as log lines.
    pub async fn broadcast_message(&self, message: HostMessage, text: &str) {
        for (name, runtime) in self.inner.states.snapshot_all() {
            if runtime.state != ProfileState::Running {
                continue;
            }
            let handle = self.inner.states.with_slot(&name, |slot| slot.handle.clone()).flatten();
            let Some(handle) = handle else { continue };
            if let Err(e) = self.inner.launcher.send_message(handle.as_ref(), message, text).await {
                self.inner.publish_log(
                    &name,
                    format!("broadcast {message} failed: {e}"),
                    None,
                    None,
                );
            }
        }
    }

    /// Send one message to one profile's process. Best-effort.
    pub async fn send_message(
        &self,
        name: &str,
        message: HostMessage,
        text: &str,
    ) -> Result<(), EngineError> {
        let handle = self
            .inner
            .states
            .with_slot(name, |slot| slot.handle.clone())
            .flatten()
            .ok_or_else(|| EngineError::NotRunning(name.to_string()))?;
        self.inner.launcher.send_message(handle.as_ref(), message, text).await?;
        Ok(())
    }

    /// Announce a profile created by the persistence collaborator.
    pub fn add_profile(&self, name: &str) -> Result<(), EngineError> {
        self.require_profile(name)?;
        self.inner.states.register(name);
        self.inner.publish_state_with_profile(name);
        Ok(())
    }

    /// Force-stop, forget, and delete a profile.
    pub async fn remove_profile(&self, name: &str) -> Result<(), EngineError> {
        self.require_profile(name)?;
        self.stop(name, true).await?;
        if let Some((cancel, task)) = self.inner.states.unregister(name) {
            if let Some(cancel) = cancel {
                cancel.cancel();
            }
            if let Some(task) = task {
                let _ = task.await;
            }
        }
        self.inner.registry.remove_profile(name);
        self.inner.cache.lock().remove(name);
        self.inner.profiles.delete(name)?;
        self.inner.publish_profiles();
        Ok(())
    }

    /// Rename a stopped profile, keeping its position in the list.
    pub async fn rename_profile(&self, name: &str, new_name: &str) -> Result<(), EngineError> {
        let profile = self.require_profile(name)?;
        if self.current_state(name)? != ProfileState::Stopped {
            return Err(EngineError::Busy(name.to_string()));
        }

        let index = self
            .inner
            .profiles
            .list()?
            .iter()
            .position(|p| p.name == name)
            .ok_or_else(|| EngineError::UnknownProfile(name.to_string()))?;

        let mut renamed = profile;
        renamed.name = new_name.to_string();
        self.inner.profiles.create(renamed)?;
        self.inner.profiles.delete(name)?;
        self.inner.profiles.move_to_index(new_name, index)?;

        self.inner.states.unregister(name);
        self.inner.states.register(new_name);
        let cache_entry = self.inner.cache.lock().remove(name);
        if let Some(entry) = cache_entry {
            self.inner.cache.lock().insert(new_name.to_string(), entry);
        }
        self.inner.publish_profiles();
        Ok(())
    }

    /// Persist a new settings document and announce it to observers.
    /// Timing fields take effect on the next engine start.
    pub fn update_settings(&self, settings: Settings) -> Result<(), EngineError> {
        self.inner.settings_store.save(&settings)?;
        self.inner.publish(Event::SettingsSnapshot { settings });
        Ok(())
    }

    /// Announce an item-index reload to observers.
    pub fn notify_entities_changed(&self) {
        self.inner.publish(Event::EntitiesChanged);
    }

    /// Relay a self-update payload to observers, uninterpreted.
    pub fn notify_update_status(&self, payload: serde_json::Value) {
        self.inner.publish(Event::UpdateStatus { payload });
    }

    fn profile_names(&self) -> Vec<String> {
        self.inner
            .profiles
            .list()
            .map(|profiles| profiles.into_iter().map(|p| p.name).collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
#[path = "commands_tests.rs"]
mod tests;
