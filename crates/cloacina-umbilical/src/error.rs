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

//! Error types for the task-dispatch and umbilical subsystem.
//!
//! Errors are split by the subsystem that raises them, mirroring the rest
//! of `cloacina`: registry mutation errors, umbilical RPC faults, and
//! launcher submission failures are distinct enums rather than one bag of
//! variants. [`CommunicatorError`] unifies them for the public service
//! surface.

use crate::ids::TaskAttemptId;

/// Errors raised by [`crate::registry::ContainerRegistry`] mutations.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// `insertContainer` was called with an id that is already registered.
    #[error("container already registered: {0}")]
    AlreadyRegistered(String),

    /// A call referenced a container id that isn't in the registry.
    #[error("unknown container: {0}")]
    UnknownContainer(String),

    /// `assign` was called on a container that already has a task assigned.
    #[error("container busy: {0}")]
    ContainerBusy(String),

    /// `assign` was called with an attempt id already present in the
    /// attempt table.
    #[error("attempt already assigned: {0:?}")]
    AttemptAlreadyAssigned(TaskAttemptId),
}

/// Errors surfaced by the umbilical RPC handlers (§4.2, §7).
///
/// `UnknownContainer` is intentionally absent here: per spec.md §4.2.1 an
/// unknown container is not an error, it's a `DieMarker` response.
#[derive(Debug, thiserror::Error)]
pub enum UmbilicalError {
    /// Heartbeat named an attempt id not mapped to the calling container.
    #[error("attempt not recognized: {0:?}")]
    AttemptNotRecognized(TaskAttemptId),

    /// Heartbeat `requestId` skipped or regressed relative to
    /// `lastRequestId + 1`.
    #[error("invalid heartbeat sequence for container: expected {expected}, got {actual}")]
    InvalidSequence {
        /// The sequence number that would have been accepted.
        expected: i64,
        /// The sequence number the caller actually sent.
        actual: i64,
    },

    /// The upstream `TaskCommunicatorContext` callback failed.
    #[error("upstream callback failed: {0}")]
    Upstream(#[from] anyhow::Error),
}

/// Errors raised while submitting or running a task payload on the local
/// worker pool (§4.4) or the launcher event loop (§4.5).
#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    /// The launch context's credentials could not be parsed.
    #[error("failed to parse launch credentials: {0}")]
    CredentialParse(String),

    /// Constructing the `TaskRunner` for this container failed.
    #[error("failed to construct task runner: {0}")]
    RunnerConstruction(String),

    /// The worker pool rejected the submission (queue saturated or pool
    /// stopped).
    #[error("submission rejected: {0}")]
    SubmitRejected(String),
}

/// Unified error type returned from the public
/// [`crate::communicator::TaskCommunicatorService`] surface.
#[derive(Debug, thiserror::Error)]
pub enum CommunicatorError {
    /// A registry-level violation (duplicate registration, busy container,
    /// double-assigned attempt).
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// An umbilical RPC-level fault.
    #[error(transparent)]
    Umbilical(#[from] UmbilicalError),

    /// A launcher/worker-pool submission failure.
    #[error(transparent)]
    Launch(#[from] LaunchError),

    /// The RPC listener failed to bind or start.
    #[error("failed to start umbilical RPC server: {0}")]
    ServerStartup(String),

    /// A local-launch operation was requested but the service wasn't
    /// configured with a [`crate::launcher::LauncherEventLoop`]
    /// (non-local mode, or local mode without launcher dependencies
    /// supplied).
    #[error("local launcher is not configured on this service")]
    LocalLauncherUnavailable,
}
