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

//! Per-container state (§3 `ContainerInfo`) and its critical section.

use parking_lot::Mutex;

use crate::ids::ContainerId;
use crate::messages::HeartbeatResponse;
use crate::model::{Credentials, ResourceMap, TaskSpec};

/// Mutable state tracked for one registered container.
///
/// All mutation goes through [`ContainerEntry::with_state_mut`], which
/// serializes access per container (I2, I4, I5). Nothing here is ever
/// held locked across an `.await` — callers drop the guard before
/// invoking upstream callbacks, per the no-callback-under-lock invariant
/// (§5).
#[derive(Debug, Default)]
pub struct ContainerInfo {
    task_spec: Option<TaskSpec>,
    additional_resources: Option<ResourceMap>,
    credentials: Option<Credentials>,
    credentials_changed: bool,
    task_pulled: bool,
    last_request_id: i64,
    last_response: Option<HeartbeatResponse>,
}

impl ContainerInfo {
    /// The current assignment, if any.
    pub fn task_spec(&self) -> Option<&TaskSpec> {
        self.task_spec.as_ref()
    }

    /// Additional per-task resources for the current assignment.
    pub fn additional_resources(&self) -> Option<&ResourceMap> {
        self.additional_resources.as_ref()
    }

    /// Credentials for the current assignment.
    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    /// Whether credentials changed since the last delivery.
    pub fn credentials_changed(&self) -> bool {
        self.credentials_changed
    }

    /// Whether the current assignment has already been delivered via
    /// `getTask` (I5).
    pub fn task_pulled(&self) -> bool {
        self.task_pulled
    }

    /// The last accepted heartbeat sequence number (0 = none yet).
    pub fn last_request_id(&self) -> i64 {
        self.last_request_id
    }

    /// The last heartbeat response built, retained for duplicate replay
    /// (§4.2.3, §9).
    pub fn last_response(&self) -> Option<&HeartbeatResponse> {
        self.last_response.as_ref()
    }

    /// Installs a fresh assignment. Called under the container's critical
    /// section by [`crate::registry::ContainerRegistry::assign`]. Resets
    /// `task_pulled` since this is a new assignment (I2: null -> set).
    pub(crate) fn set_assignment(
        &mut self,
        spec: TaskSpec,
        resources: Option<ResourceMap>,
        credentials: Option<Credentials>,
        credentials_changed: bool,
    ) {
        self.task_spec = Some(spec);
        self.additional_resources = resources;
        self.credentials = credentials;
        self.credentials_changed = credentials_changed;
        self.task_pulled = false;
    }

    /// Clears the current assignment (I2: set -> null). Heartbeat
    /// sequencing state is intentionally left untouched: `unassign` ends
    /// one attempt's lifetime but the container keeps heartbeating.
    pub(crate) fn clear_assignment(&mut self) {
        self.task_spec = None;
        self.additional_resources = None;
        self.credentials = None;
        self.credentials_changed = false;
        self.task_pulled = false;
    }

    /// Marks the current assignment as delivered (§4.2.1 rule 3).
    pub(crate) fn mark_pulled(&mut self) {
        self.task_pulled = true;
    }

    /// Records a freshly-built heartbeat response for replay and advances
    /// `last_request_id` (I4, §4.2.3 "after a successful response").
    pub(crate) fn record_heartbeat(&mut self, request_id: i64, response: HeartbeatResponse) {
        self.last_request_id = request_id;
        self.last_response = Some(response);
    }
}

/// One registered container: its immutable id plus its guarded state.
#[derive(Debug)]
pub struct ContainerEntry {
    id: ContainerId,
    state: Mutex<ContainerInfo>,
}

impl ContainerEntry {
    pub(crate) fn new(id: ContainerId) -> Self {
        Self {
            id,
            state: Mutex::new(ContainerInfo::default()),
        }
    }

    /// The container's immutable id.
    pub fn id(&self) -> &ContainerId {
        &self.id
    }

    /// Runs `f` with read/write access to this container's state under
    /// its critical section. `f` must not perform blocking I/O or invoke
    /// upstream callbacks — the lock is a `parking_lot::Mutex` and is not
    /// safe to hold across an `.await` point.
    pub fn with_state_mut<R>(&self, f: impl FnOnce(&mut ContainerInfo) -> R) -> R {
        let mut guard = self.state.lock();
        f(&mut guard)
    }

    /// Runs `f` with read-only access to this container's state.
    pub fn with_state<R>(&self, f: impl FnOnce(&ContainerInfo) -> R) -> R {
        let guard = self.state.lock();
        f(&guard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::TaskAttemptId;

    fn spec(attempt: &str) -> TaskSpec {
        TaskSpec::new(TaskAttemptId::new(attempt), "vertex", Vec::new())
    }

    #[test]
    fn assignment_lifecycle_resets_pulled_flag() {
        let entry = ContainerEntry::new(ContainerId::new("c1"));
        entry.with_state_mut(|s| s.set_assignment(spec("a1"), None, None, false));
        assert!(!entry.with_state(|s| s.task_pulled()));

        entry.with_state_mut(|s| s.mark_pulled());
        assert!(entry.with_state(|s| s.task_pulled()));

        entry.with_state_mut(|s| s.clear_assignment());
        assert!(entry.with_state(|s| s.task_spec().is_none()));
        assert!(!entry.with_state(|s| s.task_pulled()));
    }

    #[test]
    fn heartbeat_recording_advances_sequence_and_caches_response() {
        let entry = ContainerEntry::new(ContainerId::new("c1"));
        assert_eq!(entry.with_state(|s| s.last_request_id()), 0);

        let response = HeartbeatResponse {
            last_request_id: 1,
            should_die: false,
            events: Vec::new(),
        };
        entry.with_state_mut(|s| s.record_heartbeat(1, response.clone()));

        assert_eq!(entry.with_state(|s| s.last_request_id()), 1);
        assert_eq!(
            entry.with_state(|s| s.last_response().cloned()),
            Some(response)
        );
    }
}
