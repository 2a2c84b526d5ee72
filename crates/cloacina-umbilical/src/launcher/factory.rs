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

//! Turning a `LAUNCH` event into a runnable payload (§4.5).
//!
//! What a `TaskRunner` actually does is out of scope (§1); so is how its
//! launch context's tokens decode into [`Credentials`]. `TaskRunnerFactory`
//! is the seam an embedder fills in for both.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::LaunchError;
use crate::ids::ContainerId;

/// Everything the original scheduler handed over to launch one container,
/// carried opaquely end to end.
#[derive(Debug, Clone, Default)]
pub struct LaunchContext {
    /// Opaque, not-yet-decoded security tokens.
    pub tokens: Vec<u8>,
    /// Environment variables the payload should see.
    pub environment: Vec<(String, String)>,
}

impl LaunchContext {
    /// Creates a launch context from opaque token bytes.
    pub fn new(tokens: Vec<u8>) -> Self {
        Self {
            tokens,
            environment: Vec::new(),
        }
    }
}

/// Constructs the opaque [`TaskRunner`](crate::executor::TaskRunner) bound
/// to a container, given its launch context and working directories
/// (§4.5 "parse credentials... construct a TaskRunner").
pub trait TaskRunnerFactory: Send + Sync {
    /// Parses `launch_context`'s credentials and builds the runner for
    /// `container_id`.
    fn create(
        &self,
        container_id: &ContainerId,
        launch_context: &LaunchContext,
        working_directory: &Path,
        local_directories: &[PathBuf],
    ) -> Result<Arc<dyn crate::executor::TaskRunner>, LaunchError>;
}
