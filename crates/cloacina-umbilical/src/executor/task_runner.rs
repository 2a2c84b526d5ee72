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

//! The opaque task payload contract (§1, §4.4).
//!
//! `TaskRunner` is the seam between this subsystem and "what running a
//! task actually does" — explicitly out of scope (§1). The core only
//! ever calls `run` and inspects the returned [`ExecutionResult`].

use async_trait::async_trait;

use super::cancellation::CancellationToken;
use crate::model::ExecutionResult;

/// An opaque unit of work submitted to the [`super::WorkerPool`].
#[async_trait]
pub trait TaskRunner: Send + Sync {
    /// Runs the payload to completion, observing `cancel` at whatever
    /// points the implementation considers safe to check.
    async fn run(&self, cancel: CancellationToken) -> ExecutionResult;
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::time::Duration;

    /// A runner that completes immediately with a fixed result.
    pub struct Immediate(pub ExecutionResult);

    #[async_trait]
    impl TaskRunner for Immediate {
        async fn run(&self, _cancel: CancellationToken) -> ExecutionResult {
            self.0.clone()
        }
    }

    /// A runner that waits for cancellation before returning, to exercise
    /// the cooperative-cancel path.
    pub struct WaitsForCancel;

    #[async_trait]
    impl TaskRunner for WaitsForCancel {
        async fn run(&self, cancel: CancellationToken) -> ExecutionResult {
            cancel.cancelled().await;
            ExecutionResult::success()
        }
    }

    /// A runner that ignores cancellation and runs for a fixed duration.
    pub struct IgnoresCancel(pub Duration);

    #[async_trait]
    impl TaskRunner for IgnoresCancel {
        async fn run(&self, _cancel: CancellationToken) -> ExecutionResult {
            tokio::time::sleep(self.0).await;
            ExecutionResult::success()
        }
    }
}
