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

//! Local (no-resource-manager) container launcher event loop (C5, §4.5).
//!
//! A single dedicated task drains a FIFO of `LAUNCH`/`STOP` events so the
//! two never race each other for the same container; the `running` table
//! is written from this task on launch and from the worker pool's
//! callback executor on completion — two distinct writers, so a plain
//! mutex-guarded map suffices (mirroring the locking discipline of
//! `crate::registry::ContainerRegistry`, scaled down to one map). The
//! submitted payload is held behind a gate (see `GatedRunner` below)
//! until the launch side has finished writing, so the completion side
//! can never observe the key before the launch does.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{mpsc, Notify};
use tracing::{debug, warn};

use super::events::{ContainerLaunchedRecord, EventSink, TerminationCause};
use super::factory::{LaunchContext, TaskRunnerFactory};
use crate::executor::{CancellationToken, ExecutionHandle, TaskRunner, WorkerPool};
use crate::ids::ContainerId;
use crate::model::{ExecutionResult, ExitStatus};

/// Exit code reported on a container that exited cleanly or was stopped
/// locally.
const EXIT_CODE_SUCCESS: i32 = 0;
/// Exit code reported when the payload itself failed.
const EXIT_CODE_EXECUTION_FAILURE: i32 = 1;

/// Wraps a submitted [`TaskRunner`] so it cannot start until `gate` fires.
///
/// `pool.submit` hands the payload to a task that the runtime may schedule
/// immediately, concurrently with `handle_launch`'s own post-submit
/// bookkeeping (`running.lock().insert`, `sink.launched`). Without this
/// gate, a fast payload's completion callback — which runs on the worker
/// pool's callback executor, a third task — can observe `running` and
/// emit `completed` before that bookkeeping lands, emitting `Completed`
/// ahead of `Launched` and racing the callback's `remove` against the
/// launch's `insert` (§5, P6). Holding the payload behind a `Notify` that
/// `handle_launch` only signals once bookkeeping is done gives the two a
/// single, well-defined ordering point.
struct GatedRunner {
    inner: Arc<dyn TaskRunner>,
    gate: Arc<Notify>,
}

#[async_trait::async_trait]
impl TaskRunner for GatedRunner {
    async fn run(&self, cancel: CancellationToken) -> ExecutionResult {
        self.gate.notified().await;
        self.inner.run(cancel).await
    }
}

enum LaunchCommand {
    Launch {
        container_id: ContainerId,
        launch_context: LaunchContext,
    },
    Stop {
        container_id: ContainerId,
    },
}

/// Drives container launch and stop requests against a [`WorkerPool`],
/// reporting lifecycle outcomes to an [`EventSink`] (§4.5, §6).
pub struct LauncherEventLoop {
    tx: mpsc::UnboundedSender<LaunchCommand>,
    worker: Option<tokio::task::JoinHandle<()>>,
    running: Arc<Mutex<HashMap<ContainerId, ExecutionHandle>>>,
    pool: Arc<tokio::sync::Mutex<WorkerPool>>,
}

impl LauncherEventLoop {
    /// Starts the event loop, spawning its dedicated processing task.
    pub fn new(
        pool: WorkerPool,
        factory: Arc<dyn TaskRunnerFactory>,
        sink: Arc<dyn EventSink>,
        working_directory: PathBuf,
        local_directories: Vec<PathBuf>,
        application_attempt_id: String,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let running = Arc::new(Mutex::new(HashMap::new()));
        let pool = Arc::new(tokio::sync::Mutex::new(pool));
        let stopped_locally = Arc::new(Mutex::new(HashSet::new()));

        let worker = tokio::spawn(Self::run_loop(
            rx,
            pool.clone(),
            running.clone(),
            stopped_locally,
            factory,
            sink,
            working_directory,
            local_directories,
            application_attempt_id,
        ));

        Self {
            tx,
            worker: Some(worker),
            running,
            pool,
        }
    }

    /// Enqueues a `LAUNCH` event. Submission failures surface as a
    /// `launch_failed` event on the sink rather than a return value —
    /// the loop is fire-and-forget by design (§4.5).
    pub fn launch(&self, container_id: ContainerId, launch_context: LaunchContext) {
        let _ = self.tx.send(LaunchCommand::Launch {
            container_id,
            launch_context,
        });
    }

    /// Enqueues a `STOP` event for a running container. A `STOP` for a
    /// container that isn't running (already completed, or never
    /// launched) is ignored and logged — no event is emitted (§4.5).
    pub fn stop(&self, container_id: ContainerId) {
        let _ = self.tx.send(LaunchCommand::Stop { container_id });
    }

    /// The number of containers currently running.
    pub fn running_count(&self) -> usize {
        self.running.lock().len()
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_loop(
        mut rx: mpsc::UnboundedReceiver<LaunchCommand>,
        pool: Arc<tokio::sync::Mutex<WorkerPool>>,
        running: Arc<Mutex<HashMap<ContainerId, ExecutionHandle>>>,
        stopped_locally: Arc<Mutex<HashSet<ContainerId>>>,
        factory: Arc<dyn TaskRunnerFactory>,
        sink: Arc<dyn EventSink>,
        working_directory: PathBuf,
        local_directories: Vec<PathBuf>,
        application_attempt_id: String,
    ) {
        while let Some(cmd) = rx.recv().await {
            match cmd {
                LaunchCommand::Launch {
                    container_id,
                    launch_context,
                } => {
                    Self::handle_launch(
                        container_id,
                        launch_context,
                        &pool,
                        &running,
                        &stopped_locally,
                        &factory,
                        &sink,
                        &working_directory,
                        &local_directories,
                        &application_attempt_id,
                    )
                    .await;
                }
                LaunchCommand::Stop { container_id } => {
                    Self::handle_stop(container_id, &running, &stopped_locally, &sink);
                }
            }
        }
        debug!("launcher event loop exiting: command channel closed");
    }

    #[allow(clippy::too_many_arguments)]
    async fn handle_launch(
        container_id: ContainerId,
        launch_context: LaunchContext,
        pool: &Arc<tokio::sync::Mutex<WorkerPool>>,
        running: &Arc<Mutex<HashMap<ContainerId, ExecutionHandle>>>,
        stopped_locally: &Arc<Mutex<HashSet<ContainerId>>>,
        factory: &Arc<dyn TaskRunnerFactory>,
        sink: &Arc<dyn EventSink>,
        working_directory: &PathBuf,
        local_directories: &[PathBuf],
        application_attempt_id: &str,
    ) {
        let runner = match factory.create(
            &container_id,
            &launch_context,
            working_directory,
            local_directories,
        ) {
            Ok(runner) => runner,
            Err(err) => {
                warn!(%container_id, error = %err, "failed to construct task runner");
                sink.launch_failed(&container_id, &err.to_string());
                return;
            }
        };

        let gate = Arc::new(Notify::new());
        let gated_runner: Arc<dyn TaskRunner> = Arc::new(GatedRunner {
            inner: runner,
            gate: gate.clone(),
        });

        let cb_container_id = container_id.clone();
        let cb_running = running.clone();
        let cb_stopped_locally = stopped_locally.clone();
        let cb_sink = sink.clone();

        let submitted = {
            let pool = pool.lock().await;
            pool.submit(gated_runner, move |result| {
                cb_running.lock().remove(&cb_container_id);
                let was_stopped = cb_stopped_locally.lock().remove(&cb_container_id);

                if was_stopped {
                    cb_sink.completed(
                        &cb_container_id,
                        EXIT_CODE_SUCCESS,
                        TerminationCause::ContainerExited,
                        Some("cancelled"),
                    );
                    return;
                }

                match result.exit_status {
                    ExitStatus::Success | ExitStatus::AskedToDie => {
                        cb_sink.completed(
                            &cb_container_id,
                            EXIT_CODE_SUCCESS,
                            TerminationCause::ContainerExited,
                            None,
                        );
                    }
                    ExitStatus::ExecutionFailure => {
                        cb_sink.completed(
                            &cb_container_id,
                            EXIT_CODE_EXECUTION_FAILURE,
                            TerminationCause::ApplicationError,
                            result.error_message.as_deref(),
                        );
                    }
                }
            })
        };

        match submitted {
            Ok(handle) => {
                running.lock().insert(container_id.clone(), handle);
                sink.launched(&container_id);
                sink.container_launched(ContainerLaunchedRecord {
                    container_id,
                    application_attempt_id: application_attempt_id.to_string(),
                });
                // Bookkeeping is in place — let the payload actually run.
                // `notify_one` buffers its permit if the gated task hasn't
                // reached `gate.notified().await` yet, so this is safe
                // regardless of which side gets there first.
                gate.notify_one();
            }
            Err(err) => {
                warn!(%container_id, error = %err, "worker pool rejected launch");
                sink.launch_failed(&container_id, &err.to_string());
            }
        }
    }

    fn handle_stop(
        container_id: ContainerId,
        running: &Arc<Mutex<HashMap<ContainerId, ExecutionHandle>>>,
        stopped_locally: &Arc<Mutex<HashSet<ContainerId>>>,
        sink: &Arc<dyn EventSink>,
    ) {
        let running = running.lock();
        let Some(handle) = running.get(&container_id) else {
            debug!(%container_id, "STOP for a container that isn't running — ignored");
            return;
        };
        stopped_locally.lock().insert(container_id.clone());
        handle.cancel();
        sink.stop_sent(&container_id);
    }

    /// Stops accepting new events, cancels every outstanding execution,
    /// and waits (bounded) for both the event loop and the worker pool's
    /// callback executor to drain.
    pub async fn shutdown(mut self, join_timeout: Duration) {
        // Dropping our sender closes the command channel, so `run_loop`
        // returns once it's done processing whatever is already queued.
        drop(self.tx);

        for (_, handle) in self.running.lock().iter() {
            handle.cancel();
        }

        if let Some(worker) = self.worker.take() {
            if tokio::time::timeout(join_timeout, worker).await.is_err() {
                warn!("launcher event loop worker did not exit within timeout");
            }
        }

        self.pool.lock().await.shutdown(join_timeout).await;
    }
}
