// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Orchestrator facade: the single public contract the surrounding
//! product consumes.
//!
//! Composes the event bus, runtime state store, key allocator, supervisor,
//! schedule evaluator, and transport ingestion over the persistence and
//! launch collaborators. Command methods live in `commands.rs`; the
//! supervision loop in `supervisor.rs`.

use crate::bus::{EventBus, EventStream, SubscriberGuard};
use crate::error::EngineError;
use crate::evaluator;
use crate::ingest;
use crate::keypool::KeyAllocator;
use crate::log_ring::LogRing;
use crate::registry::SessionRegistry;
use crate::state::StateStore;
use marshal_adapters::Launcher;
use marshal_core::{
    Clock, Credential, Envelope, Event, Frame, KeyPool, Profile, ProfileSnapshot, Schedule,
    Settings,
};
use marshal_storage::{SettingsStore, Store};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Collaborators the engine is built over.
pub struct EngineDeps<L> {
    pub profiles: Arc<dyn Store<Profile>>,
    pub key_pools: Arc<dyn Store<KeyPool>>,
    pub schedules: Arc<dyn Store<Schedule>>,
    pub settings: Arc<dyn SettingsStore>,
    pub launcher: Arc<L>,
}

pub(crate) struct Inner<L: Launcher, C: Clock> {
    pub(crate) profiles: Arc<dyn Store<Profile>>,
    pub(crate) key_pools: Arc<dyn Store<KeyPool>>,
    pub(crate) schedules: Arc<dyn Store<Schedule>>,
    pub(crate) settings_store: Arc<dyn SettingsStore>,
    pub(crate) settings: Settings,
    pub(crate) launcher: Arc<L>,
    pub(crate) clock: C,
    pub(crate) bus: EventBus,
    pub(crate) states: StateStore,
    pub(crate) keys: KeyAllocator,
    pub(crate) registry: SessionRegistry,
    /// Serializes scan-acquire-assign so concurrent launches can never be
    /// granted the same credential from stale in-use views.
    key_grant: Mutex<()>,
    /// Side key/value cache the runtimes read and write over the
    /// transport; not part of the persisted state model.
    pub(crate) cache: Mutex<HashMap<String, HashMap<String, String>>>,
    pub(crate) log_ring: Mutex<LogRing>,
    pub(crate) shutdown: CancellationToken,
    pub(crate) frames_tx: mpsc::UnboundedSender<Frame>,
    frames_rx: Mutex<Option<mpsc::UnboundedReceiver<Frame>>>,
}

impl<L: Launcher, C: Clock> Inner<L, C> {
    fn stamp(&self, event: Event) -> Envelope {
        Envelope { at_ms: self.clock.epoch_ms(), event }
    }

    pub(crate) fn publish(&self, event: Event) {
        self.bus.publish(self.stamp(event));
    }

    /// Publish the current runtime state of `name`, optionally with the
    /// full profile when the persistent record changed too.
    pub(crate) fn publish_state(&self, name: &str, profile: Option<Profile>) {
        if let Some(runtime) = self.states.snapshot(name) {
            self.publish(Event::ProfileStateChanged { name: name.to_string(), runtime, profile });
        }
    }

    /// Publish state with the stored profile attached, best-effort.
    pub(crate) fn publish_state_with_profile(&self, name: &str) {
        let profile = self.profiles.get_by_name(name).ok().flatten();
        self.publish_state(name, profile);
    }

    pub(crate) fn publish_key_pools(&self) {
        if let Some(event) = self.key_pools_snapshot() {
            self.publish(event);
        }
    }

    pub(crate) fn publish_profiles(&self) {
        if let Some(event) = self.profiles_snapshot() {
            self.publish(event);
        }
    }

    /// Publish a log line and retain it in the ring.
    pub(crate) fn publish_log(
        &self,
        source: &str,
        content: impl Into<String>,
        color: Option<u32>,
        attachment: Option<serde_json::Value>,
    ) {
        let envelope = self.stamp(Event::LogLine {
            source: source.to_string(),
            content: content.into(),
            color,
            attachment,
        });
        self.log_ring.lock().push(envelope.clone());
        self.bus.publish(envelope);
    }

    fn profiles_snapshot(&self) -> Option<Event> {
        let profiles = self.profiles.list().ok()?;
        let profiles = profiles
            .into_iter()
            .map(|profile| {
                let runtime = self.states.snapshot(&profile.name).unwrap_or_default();
                ProfileSnapshot { profile, runtime }
            })
            .collect();
        Some(Event::ProfilesSnapshot { profiles })
    }

    fn key_pools_snapshot(&self) -> Option<Event> {
        let pools = self.key_pools.list().ok()?;
        let in_use = pools
            .iter()
            .map(|pool| {
                let mut used: Vec<String> = self.in_use_for_pool(&pool.name).into_iter().collect();
                used.sort();
                (pool.name.clone(), used)
            })
            .collect::<BTreeMap<String, Vec<String>>>();
        Some(Event::KeyPoolsSnapshot { pools, in_use })
    }

    /// The four join-time snapshots, in delivery order.
    pub(crate) fn snapshots(&self) -> Vec<Envelope> {
        let mut events = Vec::with_capacity(4);
        if let Some(event) = self.profiles_snapshot() {
            events.push(event);
        }
        if let Some(event) = self.key_pools_snapshot() {
            events.push(event);
        }
        if let Ok(schedules) = self.schedules.list() {
            events.push(Event::SchedulesSnapshot { schedules });
        }
        events.push(Event::SettingsSnapshot { settings: self.settings.clone() });
        events.into_iter().map(|event| self.stamp(event)).collect()
    }

    /// Names of profiles bound to `pool`.
    fn pool_members(&self, pool: &str) -> Vec<String> {
        self.profiles
            .list()
            .map(|profiles| {
                profiles
                    .into_iter()
                    .filter(|p| p.key_pool.as_deref() == Some(pool))
                    .map(|p| p.name)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Credential names of `pool` currently assigned to some runtime
    /// state. Computed fresh on every call; nothing is persisted.
    pub(crate) fn in_use_for_pool(&self, pool: &str) -> HashSet<String> {
        let members = self.pool_members(pool);
        self.states.assigned_keys(&members).into_iter().collect()
    }

    /// Grant a credential from `pool` to `target`, atomically with the
    /// in-use scan and the assignment into the runtime state.
    pub(crate) fn acquire_key(&self, pool: &KeyPool, target: &str) -> Option<Credential> {
        let _serialized = self.key_grant.lock();
        let in_use = self.in_use_for_pool(&pool.name);
        let credential = self.keys.acquire(pool, &in_use)?;
        self.states
            .update(target, |rt| rt.assigned_key = Some(credential.name.clone()))?;
        Some(credential)
    }

    /// Read-modify-write on a stored profile, returning the updated copy.
    pub(crate) fn update_profile(
        &self,
        name: &str,
        f: impl FnOnce(&mut Profile),
    ) -> Result<Profile, EngineError> {
        let mut profile = self
            .profiles
            .get_by_name(name)?
            .ok_or_else(|| EngineError::UnknownProfile(name.to_string()))?;
        f(&mut profile);
        self.profiles.update(profile.clone())?;
        Ok(profile)
    }
}

/// The engine facade. Cheap to clone; all clones share one engine.
pub struct Orchestrator<L: Launcher, C: Clock> {
    pub(crate) inner: Arc<Inner<L, C>>,
}

impl<L: Launcher, C: Clock> Clone for Orchestrator<L, C> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<L: Launcher, C: Clock> Orchestrator<L, C> {
    /// Build an engine over the given collaborators.
    ///
    /// Loads settings once and registers a `Stopped` runtime slot for every
    /// persisted profile. Background tasks start with
    /// [`Orchestrator::start_background`].
    pub fn new(deps: EngineDeps<L>, clock: C) -> Result<Self, EngineError> {
        let settings = deps.settings.load()?;
        let (frames_tx, frames_rx) = mpsc::unbounded_channel();

        let inner = Inner {
            bus: EventBus::new(settings.subscriber_backlog_limit),
            log_ring: Mutex::new(LogRing::new(settings.log_ring_capacity)),
            states: StateStore::new(),
            keys: KeyAllocator::new(),
            registry: SessionRegistry::new(),
            key_grant: Mutex::new(()),
            cache: Mutex::new(HashMap::new()),
            shutdown: CancellationToken::new(),
            profiles: deps.profiles,
            key_pools: deps.key_pools,
            schedules: deps.schedules,
            settings_store: deps.settings,
            settings,
            launcher: deps.launcher,
            clock,
            frames_tx,
            frames_rx: Mutex::new(Some(frames_rx)),
        };

        for profile in inner.profiles.list()? {
            inner.states.register(&profile.name);
        }

        Ok(Self { inner: Arc::new(inner) })
    }

    /// Spawn the schedule evaluator and the transport ingestion task.
    pub fn start_background(&self) {
        tokio::spawn(evaluator::run_evaluator(self.clone()));
        if let Some(frames_rx) = self.inner.frames_rx.lock().take() {
            tokio::spawn(ingest::run_ingest(self.clone(), frames_rx));
        }
    }

    /// Sender the transport collaborator pushes decoded frames into.
    pub fn frame_sender(&self) -> mpsc::UnboundedSender<Frame> {
        self.inner.frames_tx.clone()
    }

    /// Subscribe to the event stream.
    ///
    /// The stream opens with the four snapshots (profiles, key pools,
    /// schedules, settings), computed atomically with the subscription,
    /// then yields every event published afterwards in publish order.
    pub fn subscribe_events(&self) -> (EventStream, SubscriberGuard) {
        self.inner.bus.subscribe_with_init(|| self.inner.snapshots())
    }

    /// Stop background tasks, force-stop every profile, and complete all
    /// subscriber streams.
    pub async fn shutdown(&self) {
        self.inner.shutdown.cancel();
        for name in self.inner.states.names() {
            if let Err(e) = self.stop(&name, true).await {
                tracing::warn!(profile = %name, error = %e, "stop during shutdown failed");
            }
        }
        self.inner.publish(Event::Shutdown);
        self.inner.bus.close_all();
    }

    /// Run one schedule-evaluation pass immediately, outside the tick.
    pub async fn evaluate_schedules_now(&self) {
        evaluator::evaluate_once(self).await;
    }

    // -- introspection --

    pub fn runtime(&self, name: &str) -> Option<marshal_core::RuntimeState> {
        self.inner.states.snapshot(name)
    }

    pub fn settings(&self) -> Settings {
        self.inner.settings.clone()
    }

    /// Up to `limit` most recent log events, oldest first.
    pub fn recent_logs(&self, limit: usize) -> Vec<Envelope> {
        self.inner.log_ring.lock().recent(limit)
    }

    /// Derived credential usage per pool.
    pub fn key_pool_usage(&self) -> BTreeMap<String, Vec<String>> {
        match self.inner.key_pools.list() {
            Ok(pools) => pools
                .iter()
                .map(|pool| {
                    let mut used: Vec<String> =
                        self.inner.in_use_for_pool(&pool.name).into_iter().collect();
                    used.sort();
                    (pool.name.clone(), used)
                })
                .collect(),
            Err(_) => BTreeMap::new(),
        }
    }
}
