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

//! `getTask` / `canCommit` / `heartbeat` request handling (§4.2).
//!
//! The transport that carries these calls in from a worker container is
//! an explicit Non-goal (§1) — `UmbilicalEndpoint` is a plain async
//! struct a caller (a generated RPC service, a test harness, an in-process
//! proxy for the local launcher) invokes directly.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::context::TaskCommunicatorContext;
use crate::error::UmbilicalError;
use crate::ids::{ContainerId, TaskAttemptId};
use crate::messages::{
    clamp_window, ContainerContext, ContainerTask, Event, HeartbeatRequest, HeartbeatResponse,
    TaskHeartbeatRequest,
};
use crate::registry::ContainerRegistry;

/// Serves the three umbilical operations against a shared
/// [`ContainerRegistry`] and upstream [`TaskCommunicatorContext`].
pub struct UmbilicalEndpoint {
    registry: Arc<ContainerRegistry>,
    context: Arc<dyn TaskCommunicatorContext>,
}

impl UmbilicalEndpoint {
    /// Creates a new endpoint over a shared registry and upstream context.
    pub fn new(registry: Arc<ContainerRegistry>, context: Arc<dyn TaskCommunicatorContext>) -> Self {
        Self { registry, context }
    }

    /// `getTask` (§4.2.1).
    pub async fn get_task(&self, request: ContainerContext) -> ContainerTask {
        let Some(container_id) = request.container_id else {
            debug!("getTask with no containerId — sending DieMarker");
            return ContainerTask::DieMarker;
        };

        let Some(entry) = self.registry.entry(&container_id) else {
            if self.context.is_known_container(&container_id) {
                info!(container_id = %container_id, "getTask from a known-but-deregistered container");
            } else {
                warn!(container_id = %container_id, "getTask from a never-registered container");
            }
            return ContainerTask::DieMarker;
        };

        // Critical section: decide the outcome and, on delivery, flip
        // task_pulled before releasing the lock (I5).
        let delivery = entry.with_state_mut(|state| {
            if state.task_spec().is_none() || state.task_pulled() {
                return None;
            }
            state.mark_pulled();
            let spec = state.task_spec().cloned().expect("checked above");
            Some((
                spec,
                state.additional_resources().cloned(),
                state.credentials().cloned(),
                state.credentials_changed(),
            ))
        });

        let Some((task_spec, additional_resources, credentials, credentials_changed)) = delivery
        else {
            return ContainerTask::NoTask;
        };

        // Notify the upstream outside the lock (§4.2.1 rule 4, §5).
        let attempt_id = task_spec.attempt_id().clone();
        self.context
            .task_started_remotely(&attempt_id, &container_id);

        ContainerTask::TaskDelivery {
            task_spec,
            additional_resources,
            credentials,
            credentials_changed,
        }
    }

    /// `canCommit` (§4.2.2). Pure delegation, no local state mutation.
    pub async fn can_commit(&self, attempt_id: &TaskAttemptId) -> Result<bool, UmbilicalError> {
        self.context
            .can_commit(attempt_id)
            .await
            .map_err(UmbilicalError::Upstream)
    }

    /// `heartbeat` (§4.2.3).
    pub async fn heartbeat(
        &self,
        request: HeartbeatRequest,
    ) -> Result<HeartbeatResponse, UmbilicalError> {
        let Some(entry) = self.registry.entry(&request.container_id) else {
            return Ok(HeartbeatResponse::die(request.request_id));
        };

        // Duplicate check: exact retry of the last accepted request id
        // replays byte-for-byte with no upstream call (P3).
        if let Some(cached) = entry.with_state(|state| {
            (state.last_request_id() == request.request_id && state.last_response().is_some())
                .then(|| state.last_response().cloned().unwrap())
        }) {
            debug!(
                container_id = %request.container_id,
                request_id = request.request_id,
                "duplicate heartbeat — replaying cached response"
            );
            return Ok(cached);
        }

        let expected_sequence = entry.with_state(|state| state.last_request_id() + 1);

        if let Some(attempt_id) = &request.current_attempt_id {
            let owner = self.registry.attempt_owner(attempt_id);
            if owner.as_ref() != Some(&request.container_id) {
                return Err(UmbilicalError::AttemptNotRecognized(attempt_id.clone()));
            }
            if request.request_id != expected_sequence {
                return Err(UmbilicalError::InvalidSequence {
                    expected: expected_sequence,
                    actual: request.request_id,
                });
            }
        }

        let response = if let Some(attempt_id) = request.current_attempt_id.clone() {
            let (start, end) = clamp_window(
                request.events.len(),
                request.start_index,
                request.max_events,
            );
            let windowed: Vec<Event> = request.events[start..end].to_vec();

            let upstream_request = TaskHeartbeatRequest {
                attempt_id,
                events: windowed,
                start_index: request.start_index,
                max_events: request.max_events,
            };
            // Outside any registry lock (§5).
            let upstream_response = self
                .context
                .heartbeat(upstream_request)
                .await
                .map_err(UmbilicalError::Upstream)?;

            HeartbeatResponse {
                last_request_id: request.request_id,
                should_die: false,
                events: upstream_response.events,
            }
        } else {
            // No current attempt: liveness-only heartbeat, no upstream
            // call, but a response is still constructed so
            // last_request_id keeps advancing (§9).
            HeartbeatResponse {
                last_request_id: request.request_id,
                should_die: false,
                events: Vec::new(),
            }
        };

        entry.with_state_mut(|state| {
            state.record_heartbeat(request.request_id, response.clone());
        });

        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TaskSpec;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct MockContext {
        known: StdMutex<Vec<ContainerId>>,
        heartbeat_calls: AtomicUsize,
        started_remotely: StdMutex<Vec<(TaskAttemptId, ContainerId)>>,
        can_commit_result: StdMutex<bool>,
    }

    #[async_trait::async_trait]
    impl TaskCommunicatorContext for MockContext {
        async fn can_commit(&self, _attempt_id: &TaskAttemptId) -> anyhow::Result<bool> {
            Ok(*self.can_commit_result.lock().unwrap())
        }

        async fn heartbeat(
            &self,
            request: TaskHeartbeatRequest,
        ) -> anyhow::Result<crate::messages::TaskHeartbeatResponse> {
            self.heartbeat_calls.fetch_add(1, Ordering::SeqCst);
            Ok(crate::messages::TaskHeartbeatResponse {
                events: request.events,
            })
        }

        fn is_known_container(&self, container_id: &ContainerId) -> bool {
            self.known.lock().unwrap().contains(container_id)
        }

        fn task_started_remotely(&self, attempt_id: &TaskAttemptId, container_id: &ContainerId) {
            self.started_remotely
                .lock()
                .unwrap()
                .push((attempt_id.clone(), container_id.clone()));
        }
    }

    fn setup() -> (Arc<ContainerRegistry>, Arc<MockContext>, UmbilicalEndpoint) {
        let registry = Arc::new(ContainerRegistry::new());
        let ctx = Arc::new(MockContext::default());
        let endpoint = UmbilicalEndpoint::new(registry.clone(), ctx.clone());
        (registry, ctx, endpoint)
    }

    #[tokio::test]
    async fn get_task_with_no_container_id_dies() {
        let (_, _, endpoint) = setup();
        let result = endpoint
            .get_task(ContainerContext { container_id: None })
            .await;
        assert!(result.should_die());
    }

    #[tokio::test]
    async fn get_task_on_unknown_container_dies() {
        let (_, _, endpoint) = setup();
        let result = endpoint
            .get_task(ContainerContext {
                container_id: Some(ContainerId::new("c42")),
            })
            .await;
        assert!(result.should_die());
    }

    #[tokio::test]
    async fn get_task_delivers_once_then_no_task() {
        // Scenario 1 (happy path) from spec.md §8.
        let (registry, ctx, endpoint) = setup();
        let c1 = ContainerId::new("c1");
        registry.insert_container(c1.clone()).unwrap();
        registry
            .assign(
                &c1,
                TaskSpec::new(TaskAttemptId::new("a1"), "vertex", Vec::new()),
                None,
                None,
                false,
            )
            .unwrap();

        let first = endpoint
            .get_task(ContainerContext {
                container_id: Some(c1.clone()),
            })
            .await;
        assert!(matches!(first, ContainerTask::TaskDelivery { .. }));
        assert_eq!(ctx.started_remotely.lock().unwrap().len(), 1);

        let second = endpoint
            .get_task(ContainerContext {
                container_id: Some(c1),
            })
            .await;
        assert!(matches!(second, ContainerTask::NoTask));
    }

    #[tokio::test]
    async fn heartbeat_on_unregistered_container_dies_without_caching() {
        let (_, _, endpoint) = setup();
        let response = endpoint
            .heartbeat(HeartbeatRequest {
                container_id: ContainerId::new("c42"),
                request_id: 5,
                current_attempt_id: None,
                events: Vec::new(),
                start_index: 0,
                max_events: 10,
            })
            .await
            .unwrap();
        assert!(response.should_die);
        assert_eq!(response.last_request_id, 5);
    }

    #[tokio::test]
    async fn heartbeat_happy_path_then_duplicate_does_not_call_upstream_again() {
        // Scenarios 1 and 2 from spec.md §8.
        let (registry, ctx, endpoint) = setup();
        let c1 = ContainerId::new("c1");
        registry.insert_container(c1.clone()).unwrap();
        registry
            .assign(
                &c1,
                TaskSpec::new(TaskAttemptId::new("a1"), "vertex", Vec::new()),
                None,
                None,
                false,
            )
            .unwrap();

        let req = HeartbeatRequest {
            container_id: c1.clone(),
            request_id: 1,
            current_attempt_id: Some(TaskAttemptId::new("a1")),
            events: Vec::new(),
            start_index: 0,
            max_events: 10,
        };

        let first = endpoint.heartbeat(req.clone()).await.unwrap();
        assert_eq!(first.last_request_id, 1);
        assert_eq!(ctx.heartbeat_calls.load(Ordering::SeqCst), 1);

        let duplicate = endpoint.heartbeat(req).await.unwrap();
        assert_eq!(duplicate, first);
        assert_eq!(ctx.heartbeat_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn heartbeat_out_of_order_is_invalid_sequence() {
        // Scenario 3 from spec.md §8.
        let (registry, _ctx, endpoint) = setup();
        let c1 = ContainerId::new("c1");
        registry.insert_container(c1.clone()).unwrap();
        registry
            .assign(
                &c1,
                TaskSpec::new(TaskAttemptId::new("a1"), "vertex", Vec::new()),
                None,
                None,
                false,
            )
            .unwrap();

        endpoint
            .heartbeat(HeartbeatRequest {
                container_id: c1.clone(),
                request_id: 1,
                current_attempt_id: Some(TaskAttemptId::new("a1")),
                events: Vec::new(),
                start_index: 0,
                max_events: 10,
            })
            .await
            .unwrap();

        let err = endpoint
            .heartbeat(HeartbeatRequest {
                container_id: c1,
                request_id: 3,
                current_attempt_id: Some(TaskAttemptId::new("a1")),
                events: Vec::new(),
                start_index: 0,
                max_events: 10,
            })
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            UmbilicalError::InvalidSequence {
                expected: 2,
                actual: 3
            }
        ));
    }

    #[tokio::test]
    async fn heartbeat_with_mismatched_attempt_owner_is_rejected() {
        let (registry, _ctx, endpoint) = setup();
        let c1 = ContainerId::new("c1");
        let c2 = ContainerId::new("c2");
        registry.insert_container(c1.clone()).unwrap();
        registry.insert_container(c2.clone()).unwrap();
        registry
            .assign(
                &c1,
                TaskSpec::new(TaskAttemptId::new("a1"), "vertex", Vec::new()),
                None,
                None,
                false,
            )
            .unwrap();

        let err = endpoint
            .heartbeat(HeartbeatRequest {
                container_id: c2,
                request_id: 1,
                current_attempt_id: Some(TaskAttemptId::new("a1")),
                events: Vec::new(),
                start_index: 0,
                max_events: 10,
            })
            .await
            .unwrap_err();

        assert!(matches!(err, UmbilicalError::AttemptNotRecognized(_)));
    }

    #[tokio::test]
    async fn heartbeat_without_current_attempt_skips_upstream_but_advances_sequence() {
        let (registry, ctx, endpoint) = setup();
        let c1 = ContainerId::new("c1");
        registry.insert_container(c1.clone()).unwrap();

        let response = endpoint
            .heartbeat(HeartbeatRequest {
                container_id: c1,
                request_id: 1,
                current_attempt_id: None,
                events: Vec::new(),
                start_index: 0,
                max_events: 10,
            })
            .await
            .unwrap();

        assert_eq!(response.last_request_id, 1);
        assert!(response.events.is_empty());
        assert_eq!(ctx.heartbeat_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn can_commit_delegates_to_upstream() {
        let (registry, ctx, endpoint) = setup();
        let c1 = ContainerId::new("c1");
        registry.insert_container(c1).unwrap();
        *ctx.can_commit_result.lock().unwrap() = true;

        let result = endpoint
            .can_commit(&TaskAttemptId::new("a1"))
            .await
            .unwrap();
        assert!(result);
    }
}
