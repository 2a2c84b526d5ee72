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

//! Task Communicator Service (C3, spec.md §4.3).
//!
//! Owns the [`ContainerRegistry`] (C1) and [`UmbilicalEndpoint`] (C2) and
//! exposes the registration API an upstream scheduler calls. In local
//! mode it additionally owns a [`LauncherEventLoop`] (C5) so registering
//! a container's task can drive an in-process launch instead of a real
//! resource-manager round trip.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::config::CommunicatorConfig;
use crate::context::TaskCommunicatorContext;
use crate::error::CommunicatorError;
use crate::executor::WorkerPool;
use crate::ids::{ContainerId, TaskAttemptId};
use crate::launcher::{EventSink, LaunchContext, LauncherEventLoop, TaskRunnerFactory};
use crate::model::{Credentials, ResourceMap, TaskSpec};
use crate::registry::ContainerRegistry;
use crate::umbilical::UmbilicalEndpoint;

/// The loopback address synthesized for `getAddress()` in local mode
/// (SPEC_FULL.md §3) — port 0 is the fixed sentinel, not an
/// OS-assigned ephemeral port, since nothing is actually bound.
fn local_loopback_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 0))
}

/// Owns C1 + C2 (and, in local mode, C5) and exposes the registration
/// surface described in spec.md §4.3.
pub struct TaskCommunicatorService {
    registry: Arc<ContainerRegistry>,
    endpoint: UmbilicalEndpoint,
    launcher: Option<LauncherEventLoop>,
    config: CommunicatorConfig,
    address: Mutex<Option<SocketAddr>>,
    stopped: AtomicBool,
}

impl TaskCommunicatorService {
    /// Creates a service with no local launcher. Suitable for non-local
    /// mode, where container launch is driven by an external resource
    /// manager and this crate only ever serves the umbilical + the
    /// registration API.
    pub fn new(config: CommunicatorConfig, context: Arc<dyn TaskCommunicatorContext>) -> Self {
        let registry = Arc::new(ContainerRegistry::new());
        let endpoint = UmbilicalEndpoint::new(registry.clone(), context);
        Self {
            registry,
            endpoint,
            launcher: None,
            config,
            address: Mutex::new(None),
            stopped: AtomicBool::new(false),
        }
    }

    /// Attaches a local (no-resource-manager) launcher, consuming the
    /// builder-style `self` the way `cloacina`'s runner builders chain
    /// (§4.5). Only meaningful when [`CommunicatorConfig::local_mode`] is
    /// set.
    pub fn with_local_launcher(
        mut self,
        pool: WorkerPool,
        factory: Arc<dyn TaskRunnerFactory>,
        sink: Arc<dyn EventSink>,
        working_directory: PathBuf,
        local_directories: Vec<PathBuf>,
    ) -> Self {
        let launcher = LauncherEventLoop::new(
            pool,
            factory,
            sink,
            working_directory,
            local_directories,
            self.config.application_attempt_id().to_string(),
        );
        self.launcher = Some(launcher);
        self
    }

    /// Starts the service (§4.3 "Startup").
    ///
    /// In local mode, synthesizes a loopback address regardless of
    /// `remote_bound_address`. Otherwise, records the address an external
    /// RPC layer already bound — building and binding that listener is
    /// explicitly out of scope for this crate (§1).
    ///
    /// # Errors
    ///
    /// [`CommunicatorError::ServerStartup`] if not in local mode and no
    /// address was supplied.
    pub fn start(&self, remote_bound_address: Option<SocketAddr>) -> Result<(), CommunicatorError> {
        let addr = if self.config.local_mode() {
            local_loopback_address()
        } else {
            remote_bound_address.ok_or_else(|| {
                CommunicatorError::ServerStartup(
                    "non-local mode requires an already-bound RPC listener address".into(),
                )
            })?
        };

        *self.address.lock() = Some(addr);
        info!(%addr, local_mode = self.config.local_mode(), "task communicator started");
        Ok(())
    }

    /// `getAddress()` (§4.3). `None` before [`Self::start`] is called.
    pub fn get_address(&self) -> Option<SocketAddr> {
        *self.address.lock()
    }

    /// `registerRunningContainer(id, host, port)` (§4.3).
    ///
    /// `host`/`port` are accepted but never stored or interpreted — the
    /// source ignores them and this crate preserves that (§9 "Open
    /// questions", DESIGN.md).
    ///
    /// # Errors
    ///
    /// [`CommunicatorError::Registry`] wrapping
    /// [`crate::error::RegistryError::AlreadyRegistered`] on a duplicate
    /// id.
    pub fn register_running_container(
        &self,
        id: ContainerId,
        _host: impl Into<String>,
        _port: u16,
    ) -> Result<(), CommunicatorError> {
        debug!(container_id = %id, "registerRunningContainer");
        self.registry.insert_container(id).map_err(Into::into)
    }

    /// `registerContainerEnd(id)` (§4.3). Tears down the container and
    /// any outstanding attempt mapping; a missing id is a no-op.
    pub fn register_container_end(&self, id: &ContainerId) {
        if self.registry.remove_container(id).is_some() {
            debug!(container_id = %id, "registerContainerEnd");
        }
    }

    /// `registerRunningTaskAttempt` (§4.3, delegates to §4.1 `assign`).
    pub fn register_running_task_attempt(
        &self,
        id: &ContainerId,
        spec: TaskSpec,
        resources: Option<ResourceMap>,
        credentials: Option<Credentials>,
        credentials_changed: bool,
    ) -> Result<(), CommunicatorError> {
        self.registry
            .assign(id, spec, resources, credentials, credentials_changed)
            .map_err(Into::into)
    }

    /// `unregisterRunningTaskAttempt` (§4.3, delegates to §4.1 `unassign`).
    pub fn unregister_running_task_attempt(&self, attempt_id: &TaskAttemptId) {
        self.registry.unassign(attempt_id);
    }

    /// Access to the umbilical endpoint (`getTask`/`canCommit`/
    /// `heartbeat`) this service serves over whatever RPC transport the
    /// embedder wires up.
    pub fn umbilical(&self) -> &UmbilicalEndpoint {
        &self.endpoint
    }

    /// Enqueues a `LAUNCH` event on the local launcher (§4.5).
    ///
    /// # Errors
    ///
    /// [`CommunicatorError::LocalLauncherUnavailable`] if no launcher was
    /// attached via [`Self::with_local_launcher`].
    pub fn launch_local(
        &self,
        container_id: ContainerId,
        launch_context: LaunchContext,
    ) -> Result<(), CommunicatorError> {
        let launcher = self
            .launcher
            .as_ref()
            .ok_or(CommunicatorError::LocalLauncherUnavailable)?;
        launcher.launch(container_id, launch_context);
        Ok(())
    }

    /// Enqueues a `STOP` event on the local launcher (§4.5).
    ///
    /// # Errors
    ///
    /// [`CommunicatorError::LocalLauncherUnavailable`] if no launcher was
    /// attached.
    pub fn stop_local(&self, container_id: ContainerId) -> Result<(), CommunicatorError> {
        let launcher = self
            .launcher
            .as_ref()
            .ok_or(CommunicatorError::LocalLauncherUnavailable)?;
        launcher.stop(container_id);
        Ok(())
    }

    /// Number of currently registered containers (SPEC_FULL.md §3
    /// introspection).
    pub fn container_count(&self) -> usize {
        self.registry.container_count()
    }

    /// Number of currently outstanding attempt mappings.
    pub fn attempt_count(&self) -> usize {
        self.registry.attempt_count()
    }

    /// Shuts the service down (§4.3 "Shutdown"): stops accepting new
    /// umbilical/registration traffic conceptually (callers are expected
    /// to stop routing to this instance) and, if a local launcher is
    /// attached, drains it per §4.5's shutdown sequence. Registry entries
    /// are left intact — shutdown tears down process lifecycle, not
    /// state.
    pub async fn shutdown(self) {
        self.stopped.store(true, Ordering::SeqCst);
        if let Some(launcher) = self.launcher {
            launcher.shutdown(self.config.shutdown_join_timeout()).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::TaskHeartbeatResponse;
    use async_trait::async_trait;

    struct NoopContext;

    #[async_trait]
    impl TaskCommunicatorContext for NoopContext {
        async fn can_commit(&self, _attempt_id: &TaskAttemptId) -> anyhow::Result<bool> {
            Ok(true)
        }

        async fn heartbeat(
            &self,
            request: crate::messages::TaskHeartbeatRequest,
        ) -> anyhow::Result<TaskHeartbeatResponse> {
            Ok(TaskHeartbeatResponse {
                events: request.events,
            })
        }

        fn is_known_container(&self, _container_id: &ContainerId) -> bool {
            false
        }

        fn task_started_remotely(&self, _attempt_id: &TaskAttemptId, _container_id: &ContainerId) {}
    }

    fn service() -> TaskCommunicatorService {
        TaskCommunicatorService::new(CommunicatorConfig::default(), Arc::new(NoopContext))
    }

    #[test]
    fn start_in_local_mode_synthesizes_loopback_address() {
        let svc = service();
        assert!(svc.get_address().is_none());
        svc.start(None).unwrap();
        assert_eq!(svc.get_address().unwrap().ip().to_string(), "127.0.0.1");
    }

    #[test]
    fn start_in_non_local_mode_requires_an_address() {
        let config = CommunicatorConfig::builder()
            .local_mode(false)
            .build()
            .unwrap();
        let svc = TaskCommunicatorService::new(config, Arc::new(NoopContext));
        let err = svc.start(None).unwrap_err();
        assert!(matches!(err, CommunicatorError::ServerStartup(_)));
    }

    #[test]
    fn start_in_non_local_mode_records_supplied_address() {
        let config = CommunicatorConfig::builder()
            .local_mode(false)
            .build()
            .unwrap();
        let svc = TaskCommunicatorService::new(config, Arc::new(NoopContext));
        let addr: SocketAddr = "10.0.0.5:9102".parse().unwrap();
        svc.start(Some(addr)).unwrap();
        assert_eq!(svc.get_address(), Some(addr));
    }

    #[test]
    fn register_running_container_rejects_duplicates() {
        let svc = service();
        svc.register_running_container(ContainerId::new("c1"), "localhost", 0)
            .unwrap();
        let err = svc
            .register_running_container(ContainerId::new("c1"), "localhost", 0)
            .unwrap_err();
        assert!(matches!(err, CommunicatorError::Registry(_)));
    }

    #[test]
    fn registration_lifecycle_updates_introspection_counts() {
        let svc = service();
        svc.register_running_container(ContainerId::new("c1"), "h", 0)
            .unwrap();
        assert_eq!(svc.container_count(), 1);

        svc.register_running_task_attempt(
            &ContainerId::new("c1"),
            TaskSpec::new(TaskAttemptId::new("a1"), "vertex", Vec::new()),
            None,
            None,
            false,
        )
        .unwrap();
        assert_eq!(svc.attempt_count(), 1);

        svc.unregister_running_task_attempt(&TaskAttemptId::new("a1"));
        assert_eq!(svc.attempt_count(), 0);

        svc.register_container_end(&ContainerId::new("c1"));
        assert_eq!(svc.container_count(), 0);
    }

    #[tokio::test]
    async fn local_launch_without_launcher_is_rejected() {
        let svc = service();
        let err = svc
            .launch_local(ContainerId::new("c1"), LaunchContext::default())
            .unwrap_err();
        assert!(matches!(err, CommunicatorError::LocalLauncherUnavailable));
        svc.shutdown().await;
    }
}
