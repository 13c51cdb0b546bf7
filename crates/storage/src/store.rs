// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The persistence contract the engine consumes.

use crate::error::StoreError;
use marshal_core::{KeyPool, Profile, Schedule};

/// An entity addressed by a unique name within its kind.
pub trait Named: Clone + Send + Sync + 'static {
    fn name(&self) -> &str;
}

impl Named for Profile {
    fn name(&self) -> &str {
        &self.name
    }
}

impl Named for KeyPool {
    fn name(&self) -> &str {
        &self.name
    }
}

impl Named for Schedule {
    fn name(&self) -> &str {
        &self.name
    }
}

/// Ordered, name-addressed persistence for one entity kind.
///
/// Implementations keep entities in insertion order unless `move_to_index`
/// is used; list order is the source of truth for display. Every call is
/// atomic with respect to concurrent callers.
pub trait Store<T: Named>: Send + Sync {
    /// All entities in persisted order.
    fn list(&self) -> Result<Vec<T>, StoreError>;

    fn get_by_name(&self, name: &str) -> Result<Option<T>, StoreError>;

    /// Append a new entity. Refused when the name is taken.
    fn create(&self, entity: T) -> Result<(), StoreError>;

    /// Replace the entity with the same name, preserving its position.
    fn update(&self, entity: T) -> Result<(), StoreError>;

    fn delete(&self, name: &str) -> Result<(), StoreError>;

    /// Move the named entity to `index` within the persisted order.
    fn move_to_index(&self, name: &str, index: usize) -> Result<(), StoreError>;

    /// Re-read from the backing medium, discarding cached state.
    fn reload(&self) -> Result<(), StoreError>;
}
