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

//! Opaque data-model types shared across the registry, umbilical, and
//! launcher (§3, §6).
//!
//! None of these types are interpreted by the core: `TaskSpec`'s payload,
//! `LocalResource`'s descriptor, and `Credentials`' bytes are all opaque
//! as far as this crate is concerned — they're carried end to end between
//! the upstream scheduler and the worker container.

use std::collections::HashMap;

use crate::ids::TaskAttemptId;

/// Opaque descriptor of work to perform.
///
/// Carries its own [`TaskAttemptId`] and vertex name; the body is an
/// opaque blob the core never inspects (modeled as bytes rather than a
/// generic type parameter, to keep the registry and umbilical types
/// concrete — see DESIGN.md).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSpec {
    attempt_id: TaskAttemptId,
    vertex_name: String,
    payload: Vec<u8>,
}

impl TaskSpec {
    /// Creates a new task spec.
    pub fn new(attempt_id: TaskAttemptId, vertex_name: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            attempt_id,
            vertex_name: vertex_name.into(),
            payload,
        }
    }

    /// The attempt this spec describes.
    pub fn attempt_id(&self) -> &TaskAttemptId {
        &self.attempt_id
    }

    /// The vertex (task type) name.
    pub fn vertex_name(&self) -> &str {
        &self.vertex_name
    }

    /// The opaque payload bytes.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }
}

/// Opaque per-task side input descriptor, keyed by string name in
/// [`ContainerInfo::additional_resources`](crate::registry::ContainerInfo).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalResource {
    descriptor: Vec<u8>,
}

impl LocalResource {
    /// Creates a new local resource from an opaque descriptor blob.
    pub fn new(descriptor: Vec<u8>) -> Self {
        Self { descriptor }
    }

    /// The opaque descriptor bytes.
    pub fn descriptor(&self) -> &[u8] {
        &self.descriptor
    }
}

/// Opaque security credentials associated with a task assignment.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Credentials {
    bytes: Vec<u8>,
}

impl Credentials {
    /// Creates credentials from opaque bytes.
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// The opaque credential bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// A mapping of resource name to [`LocalResource`].
pub type ResourceMap = HashMap<String, LocalResource>;

/// Outcome of running a task payload (§4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    /// The payload completed its work successfully.
    Success,
    /// The payload was told to die (e.g. the umbilical returned a
    /// `DieMarker`) and exited cooperatively.
    AskedToDie,
    /// The payload ran and failed.
    ExecutionFailure,
}

/// The result of running a [`TaskRunner`](crate::executor::TaskRunner).
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    /// How the payload exited.
    pub exit_status: ExitStatus,
    /// A human-readable failure message, set when `exit_status` is not
    /// `Success`.
    pub error_message: Option<String>,
    /// An optional lower-level cause, preserved for diagnostics.
    pub cause: Option<String>,
}

impl ExecutionResult {
    /// Builds a successful result.
    pub fn success() -> Self {
        Self {
            exit_status: ExitStatus::Success,
            error_message: None,
            cause: None,
        }
    }

    /// Builds an asked-to-die result.
    pub fn asked_to_die() -> Self {
        Self {
            exit_status: ExitStatus::AskedToDie,
            error_message: None,
            cause: None,
        }
    }

    /// Builds an execution-failure result with a message.
    pub fn execution_failure(message: impl Into<String>) -> Self {
        Self {
            exit_status: ExitStatus::ExecutionFailure,
            error_message: Some(message.into()),
            cause: None,
        }
    }
}
