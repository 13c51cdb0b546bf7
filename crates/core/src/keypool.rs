// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Key pools: named, ordered sets of scarce licence credentials.
//!
//! Only the `held` flag is persistent state. Which credential is in use is
//! never stored; it is derived by scanning runtime states for
//! `assigned_key` matches, so a crashed engine can never leak a key.

use serde::{Deserialize, Serialize};

/// Opaque payload handed to the launch collaborator alongside a credential.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialPayload {
    pub primary: String,
    #[serde(default)]
    pub secondary: String,
}

/// One licence credential within a pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// Unique within the pool.
    pub name: String,
    pub payload: CredentialPayload,
    /// Administratively disabled; skipped by allocation until unheld.
    #[serde(default)]
    pub held: bool,
}

impl Credential {
    pub fn new(name: impl Into<String>, primary: impl Into<String>, secondary: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            payload: CredentialPayload { primary: primary.into(), secondary: secondary.into() },
            held: false,
        }
    }
}

/// A named, ordered collection of credentials allocated round-robin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyPool {
    pub name: String,
    pub credentials: Vec<Credential>,
}

impl KeyPool {
    pub fn new(name: impl Into<String>, credentials: Vec<Credential>) -> Self {
        Self { name: name.into(), credentials }
    }

    pub fn credential(&self, name: &str) -> Option<&Credential> {
        self.credentials.iter().find(|c| c.name == name)
    }

    pub fn credential_mut(&mut self, name: &str) -> Option<&mut Credential> {
        self.credentials.iter_mut().find(|c| c.name == name)
    }

    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }
}

#[cfg(test)]
#[path = "keypool_tests.rs"]
mod tests;
