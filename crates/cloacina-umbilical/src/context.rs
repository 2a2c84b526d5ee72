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

//! The upstream collaborator interface (§6 `TaskCommunicatorContext`).
//!
//! This is the seam between the umbilical endpoint and everything this
//! crate treats as out of scope: scheduler policy, history persistence,
//! and node-manager communication (§1). Implementations are supplied by
//! the embedding application; this crate only calls through the trait.
//!
//! Every method here is invoked by [`crate::umbilical::UmbilicalEndpoint`]
//! **without** holding any registry lock (§5 "callback discipline") —
//! that's an invariant of the caller, not something this trait can
//! enforce, so implementations must not assume otherwise either way.

use async_trait::async_trait;

use crate::ids::{ContainerId, TaskAttemptId};
use crate::messages::{TaskHeartbeatRequest, TaskHeartbeatResponse};

/// Upstream collaborator consumed by the umbilical endpoint (C2).
#[async_trait]
pub trait TaskCommunicatorContext: Send + Sync {
    /// Whether `attempt_id` is authorized to commit its output.
    async fn can_commit(&self, attempt_id: &TaskAttemptId) -> anyhow::Result<bool>;

    /// Forwards a validated heartbeat to the upstream scheduler/event
    /// sink and returns whatever events it wants delivered back.
    async fn heartbeat(
        &self,
        request: TaskHeartbeatRequest,
    ) -> anyhow::Result<TaskHeartbeatResponse>;

    /// Whether `container_id` is known to the upstream, used purely to
    /// classify an unknown-container `getTask` as "known but gone" vs.
    /// "never known" for logging (§4.2.1 rule 2) — it does not change the
    /// `DieMarker` outcome either way.
    fn is_known_container(&self, container_id: &ContainerId) -> bool;

    /// Notifies the upstream that `attempt_id` has started executing on
    /// `container_id`. Called outside any registry lock, after a
    /// successful `getTask` delivery (§4.2.1 rule 4).
    fn task_started_remotely(&self, attempt_id: &TaskAttemptId, container_id: &ContainerId);
}
