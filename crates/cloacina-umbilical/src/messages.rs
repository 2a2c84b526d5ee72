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

//! Wire-level message schemas for the umbilical RPC surface (§6).
//!
//! These types are transport-agnostic: whatever RPC layer a caller wires
//! up (the transport encoding is an explicit Non-goal, §1) is expected to
//! marshal these field-for-field.

use crate::ids::{ContainerId, TaskAttemptId};
use crate::model::{Credentials, ResourceMap, TaskSpec};

/// A single progress/status event reported by a worker container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// Opaque event payload, interpreted by the event sink, not the core.
    pub data: Vec<u8>,
}

/// Identifies the calling container on a `getTask` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerContext {
    /// The calling container's id, if present.
    pub container_id: Option<ContainerId>,
}

/// Response to `getTask` (§4.2.1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerTask {
    /// The container should terminate: it is unknown or deregistered.
    DieMarker,
    /// The container is known but has no pullable assignment right now.
    NoTask,
    /// A task assignment is being delivered for the first time.
    TaskDelivery {
        /// The task to run.
        task_spec: TaskSpec,
        /// Additional per-task side inputs.
        additional_resources: Option<ResourceMap>,
        /// Security credentials for this assignment.
        credentials: Option<Credentials>,
        /// Whether credentials changed since the last delivery to this
        /// container.
        credentials_changed: bool,
    },
}

impl ContainerTask {
    /// `true` for [`ContainerTask::DieMarker`].
    pub fn should_die(&self) -> bool {
        matches!(self, ContainerTask::DieMarker)
    }
}

/// Request body for `heartbeat` (§4.2.3, §6).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeartbeatRequest {
    /// The calling container's id.
    pub container_id: ContainerId,
    /// Monotone request sequence number.
    pub request_id: i64,
    /// The attempt the container believes it is currently running, if any.
    pub current_attempt_id: Option<TaskAttemptId>,
    /// Events accumulated since the last heartbeat.
    pub events: Vec<Event>,
    /// Start index into the caller's event backlog (for paginated
    /// delivery upstream).
    pub start_index: i32,
    /// Maximum events the caller wants returned.
    pub max_events: i32,
}

/// Response body for `heartbeat`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeartbeatResponse {
    /// Echoes back the request id that produced this response (or the
    /// replayed one, on a duplicate).
    pub last_request_id: i64,
    /// Whether the container should terminate.
    pub should_die: bool,
    /// Events returned by the upstream in response to this heartbeat.
    pub events: Vec<Event>,
}

impl HeartbeatResponse {
    /// Builds a die response for an unregistered container (§4.2.3 table).
    pub fn die(request_id: i64) -> Self {
        Self {
            last_request_id: request_id,
            should_die: true,
            events: Vec::new(),
        }
    }
}

/// Request passed to [`crate::context::TaskCommunicatorContext::heartbeat`].
///
/// Distinct from [`HeartbeatRequest`]: this is the type the umbilical
/// endpoint hands to the upstream collaborator once sequencing has been
/// validated, carrying only what the upstream needs (the attempt, not the
/// raw sequencing fields).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskHeartbeatRequest {
    /// The attempt this heartbeat is for.
    pub attempt_id: TaskAttemptId,
    /// Events accumulated since the last heartbeat.
    pub events: Vec<Event>,
    /// Start index into the caller's event backlog.
    pub start_index: i32,
    /// Maximum events the caller wants returned.
    pub max_events: i32,
}

/// Response from [`crate::context::TaskCommunicatorContext::heartbeat`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TaskHeartbeatResponse {
    /// Events the upstream wants delivered back to the container.
    pub events: Vec<Event>,
}

/// Clamps a requested event window against what's actually available
/// (§3 of SPEC_FULL.md — preserved from the original rather than treated
/// as a caller error).
pub fn clamp_window(available: usize, start_index: i32, max_events: i32) -> (usize, usize) {
    let start = start_index.max(0) as usize;
    let start = start.min(available);
    let max = max_events.max(0) as usize;
    let end = start.saturating_add(max).min(available);
    (start, end)
}
