/*
 *  Copyright 2025-2026 Colliery Software
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

//! Container Registry (C1, spec.md §4.1).
//!
//! Two logical tables — `containers` and `attempts` — cross-reference
//! each other (I3). Following the same pattern as
//! `cloacina::trigger::registry`'s global `Arc<RwLock<HashMap<..>>>`,
//! each table is its own lock so readers of one never block on writers of
//! the other; `assign`/`remove_container` are the only operations that
//! touch both, and they do so with the container's own critical section
//! held so no observer can see an attempt entry pointing at a missing or
//! stale container (I1, I3).

mod container_info;

pub use container_info::{ContainerEntry, ContainerInfo};

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::error::RegistryError;
use crate::ids::{ContainerId, TaskAttemptId};
use crate::model::{Credentials, ResourceMap, TaskSpec};

/// A snapshot of a container's state at the moment it was removed from
/// the registry, returned by [`ContainerRegistry::remove_container`].
#[derive(Debug)]
pub struct RemovedContainer {
    /// The container's id.
    pub id: ContainerId,
    /// Its assignment at the time of removal, if any.
    pub task_spec: Option<TaskSpec>,
}

/// The shared registry of live containers and their task assignments.
#[derive(Default)]
pub struct ContainerRegistry {
    containers: RwLock<HashMap<ContainerId, Arc<ContainerEntry>>>,
    attempts: RwLock<HashMap<TaskAttemptId, ContainerId>>,
}

impl ContainerRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs a fresh [`ContainerInfo`] for `id` (I1).
    ///
    /// # Errors
    ///
    /// [`RegistryError::AlreadyRegistered`] if `id` is already present.
    pub fn insert_container(&self, id: ContainerId) -> Result<(), RegistryError> {
        let mut containers = self.containers.write();
        if containers.contains_key(&id) {
            return Err(RegistryError::AlreadyRegistered(id.to_string()));
        }
        containers.insert(id.clone(), Arc::new(ContainerEntry::new(id)));
        Ok(())
    }

    /// Removes a container and tears down any outstanding attempt mapping
    /// atomically with respect to concurrent observers.
    ///
    /// Returns the removed container's last-known assignment, or `None`
    /// if it wasn't registered.
    pub fn remove_container(&self, id: &ContainerId) -> Option<RemovedContainer> {
        let mut containers = self.containers.write();
        let entry = containers.remove(id)?;

        let task_spec = entry.with_state(|s| s.task_spec().cloned());

        // Remove any attempt entry that still points at this container.
        // Held under the containers write lock so no reader can observe
        // `attempts[a] == id` after this returns while `id` is absent
        // from `containers`.
        let mut attempts = self.attempts.write();
        attempts.retain(|_, owner| owner != id);

        debug!(container_id = %id, "removed container from registry");
        Some(RemovedContainer {
            id: entry.id().clone(),
            task_spec,
        })
    }

    /// Assigns a task to a container (§4.1 `assign`).
    ///
    /// # Errors
    ///
    /// - [`RegistryError::UnknownContainer`] if `id` isn't registered.
    /// - [`RegistryError::ContainerBusy`] if the container already has an
    ///   assignment.
    /// - [`RegistryError::AttemptAlreadyAssigned`] if the spec's attempt
    ///   id is already mapped to some container.
    pub fn assign(
        &self,
        id: &ContainerId,
        spec: TaskSpec,
        resources: Option<ResourceMap>,
        credentials: Option<Credentials>,
        credentials_changed: bool,
    ) -> Result<(), RegistryError> {
        let entry = {
            let containers = self.containers.read();
            containers
                .get(id)
                .cloned()
                .ok_or_else(|| RegistryError::UnknownContainer(id.to_string()))?
        };

        // Attempts write lock is taken first so the compare-and-insert is
        // atomic with the container's busy check: once we observe the
        // attempt id free here, nothing else can claim it until we've
        // either inserted it or returned an error.
        let mut attempts = self.attempts.write();
        if attempts.contains_key(spec.attempt_id()) {
            return Err(RegistryError::AttemptAlreadyAssigned(
                spec.attempt_id().clone(),
            ));
        }

        entry.with_state_mut(|state| -> Result<(), RegistryError> {
            if state.task_spec().is_some() {
                return Err(RegistryError::ContainerBusy(id.to_string()));
            }
            let attempt_id = spec.attempt_id().clone();
            state.set_assignment(spec, resources, credentials, credentials_changed);
            attempts.insert(attempt_id, id.clone());
            Ok(())
        })
    }

    /// Clears the assignment matching `attempt_id` and removes the
    /// attempt entry (§4.1 `unassign`). Missing entries are silently
    /// ignored (logged), matching the source's tolerance for a
    /// late/duplicate unregister.
    pub fn unassign(&self, attempt_id: &TaskAttemptId) {
        let owner = {
            let mut attempts = self.attempts.write();
            attempts.remove(attempt_id)
        };

        let Some(owner) = owner else {
            warn!(attempt_id = %attempt_id, "unregisterRunningTaskAttempt for unknown attempt");
            return;
        };

        let containers = self.containers.read();
        if let Some(entry) = containers.get(&owner) {
            entry.with_state_mut(|state| state.clear_assignment());
        } else {
            warn!(
                attempt_id = %attempt_id,
                container_id = %owner,
                "attempt mapping referenced a container no longer registered"
            );
        }
    }

    /// Looks up a registered container's entry, cloning the `Arc` so the
    /// caller can operate on its critical section without holding the
    /// table lock.
    pub fn entry(&self, id: &ContainerId) -> Option<Arc<ContainerEntry>> {
        self.containers.read().get(id).cloned()
    }

    /// Resolves which container currently owns `attempt_id`, if any.
    pub fn attempt_owner(&self, attempt_id: &TaskAttemptId) -> Option<ContainerId> {
        self.attempts.read().get(attempt_id).cloned()
    }

    /// Number of currently registered containers.
    ///
    /// Supplemental introspection accessor (SPEC_FULL.md §3), grounded on
    /// `cloacina::trigger::registry::list_triggers`-style read helpers.
    pub fn container_count(&self) -> usize {
        self.containers.read().len()
    }

    /// Number of currently outstanding attempt mappings.
    pub fn attempt_count(&self) -> usize {
        self.attempts.read().len()
    }
}
