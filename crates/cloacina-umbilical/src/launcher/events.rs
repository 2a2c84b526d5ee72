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

//! The event sink the launcher emits lifecycle events to (§6).
//!
//! History/event persistence and node-manager communication are explicit
//! Non-goals (§1) — `EventSink` is the seam an embedder fills in with
//! whatever records those events durably.

use crate::ids::ContainerId;

/// Why a container's execution ended, reported on every `Completed` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationCause {
    /// The container exited on its own (success, asked-to-die, or a
    /// locally-initiated stop).
    ContainerExited,
    /// The payload failed on its own, not in response to a stop request.
    ApplicationError,
}

/// A durable record of a container launch, mirroring the original's
/// `ContainerLaunched` history event (§6).
#[derive(Debug, Clone)]
pub struct ContainerLaunchedRecord {
    /// The launched container's id.
    pub container_id: ContainerId,
    /// The application attempt this launch belongs to.
    pub application_attempt_id: String,
}

/// Lifecycle events emitted by the [`super::LauncherEventLoop`] (§4.5, §6).
pub trait EventSink: Send + Sync {
    /// A launch could not even be submitted (credential parse error,
    /// runner construction error, or pool rejection) — never the payload
    /// itself failing, which goes through `completed` instead.
    fn launch_failed(&self, container_id: &ContainerId, message: &str);

    /// A launch was accepted and submitted to the worker pool.
    fn launched(&self, container_id: &ContainerId);

    /// A submitted payload finished, one way or another.
    fn completed(
        &self,
        container_id: &ContainerId,
        exit_code: i32,
        cause: TerminationCause,
        message: Option<&str>,
    );

    /// A `STOP` request was processed for a container that was running
    /// (emitted whenever a matching entry is found in `running`, even
    /// though the corresponding `Completed` may not have landed yet —
    /// §4.5 preserves the upstream state machine's expectation that
    /// `C_NM_STOP_SENT` always follows a `STOP` for a container actually
    /// in flight). A `STOP` for a container that isn't running emits no
    /// event at all (logged and ignored).
    fn stop_sent(&self, container_id: &ContainerId);

    /// Durable record of a successful launch.
    fn container_launched(&self, record: ContainerLaunchedRecord);
}
