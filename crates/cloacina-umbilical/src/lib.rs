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

//! Task-dispatch and umbilical subsystem for a DAG execution engine's
//! application-master side.
//!
//! This crate brokers the handoff of task assignments from an upstream
//! scheduler to already-running worker containers, serves the worker
//! side of that handoff (`getTask`/`canCommit`/`heartbeat`), and — when
//! no external resource manager is present — runs task payloads itself
//! on a bounded in-process worker pool.
//!
//! # Modules
//!
//! - [`registry`] — C1, the container/attempt tables.
//! - [`umbilical`] — C2, the worker-facing RPC operations.
//! - [`communicator`] — C3, the upstream-facing registration API that
//!   owns C1 and C2.
//! - [`executor`] — C4, the local bounded worker pool.
//! - [`launcher`] — C5, the launch/stop event loop driving C4.
//!
//! Transport encoding, scheduler policy, and the task payload's own
//! semantics are explicit non-goals — see each module's documentation
//! for the exact seam it exposes to the embedding application.

pub mod communicator;
pub mod config;
pub mod context;
pub mod error;
pub mod executor;
pub mod ids;
pub mod launcher;
pub mod messages;
pub mod model;
pub mod registry;
pub mod umbilical;

pub use communicator::TaskCommunicatorService;
pub use config::{CommunicatorConfig, CommunicatorConfigBuilder, ConfigError};
pub use context::TaskCommunicatorContext;
pub use error::{CommunicatorError, LaunchError, RegistryError, UmbilicalError};
pub use ids::{ContainerId, TaskAttemptId};
