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

//! Configuration for [`crate::communicator::TaskCommunicatorService`]
//! (SPEC_FULL.md §2.3).
//!
//! Mirrors `cloacina::runner::default_runner::config`'s
//! builder-with-validated-`build()` shape: a plain data struct with
//! read-only accessors, built through a separate builder type so
//! construction can be validated in one place.

use std::time::Duration;

/// Configuration for a [`crate::communicator::TaskCommunicatorService`].
///
/// # Construction
///
/// ```rust,ignore
/// let config = CommunicatorConfig::builder()
///     .local_mode(true)
///     .worker_pool_capacity(8)
///     .build()?;
/// ```
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct CommunicatorConfig {
    local_mode: bool,
    worker_pool_capacity: usize,
    shutdown_join_timeout: Duration,
    application_attempt_id: String,
}

impl CommunicatorConfig {
    /// Creates a new configuration builder with default values.
    pub fn builder() -> CommunicatorConfigBuilder {
        CommunicatorConfigBuilder::default()
    }

    /// Whether the communicator runs without a node manager/RPC listener,
    /// synthesizing a loopback address from `getAddress()` instead
    /// (SPEC_FULL.md §3, §4.3).
    pub fn local_mode(&self) -> bool {
        self.local_mode
    }

    /// The local worker pool's concurrency bound (§4.4).
    pub fn worker_pool_capacity(&self) -> usize {
        self.worker_pool_capacity
    }

    /// Bound on how long shutdown waits for outstanding executions and
    /// queued completion callbacks to drain before giving up.
    pub fn shutdown_join_timeout(&self) -> Duration {
        self.shutdown_join_timeout
    }

    /// The application attempt id stamped onto `ContainerLaunched`
    /// records (§6).
    pub fn application_attempt_id(&self) -> &str {
        &self.application_attempt_id
    }
}

impl Default for CommunicatorConfig {
    fn default() -> Self {
        CommunicatorConfigBuilder::default()
            .build()
            .expect("default configuration is always valid")
    }
}

/// Error returned by [`CommunicatorConfigBuilder::build`] when a value is
/// out of range.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// `worker_pool_capacity` was set to 0.
    #[error("worker_pool_capacity must be at least 1")]
    ZeroWorkerPoolCapacity,
}

/// Builder for [`CommunicatorConfig`].
#[derive(Debug, Clone)]
pub struct CommunicatorConfigBuilder {
    local_mode: bool,
    worker_pool_capacity: usize,
    shutdown_join_timeout: Duration,
    application_attempt_id: String,
}

impl Default for CommunicatorConfigBuilder {
    fn default() -> Self {
        Self {
            local_mode: true,
            worker_pool_capacity: 4,
            shutdown_join_timeout: Duration::from_secs(30),
            application_attempt_id: String::from("local_attempt_1"),
        }
    }
}

impl CommunicatorConfigBuilder {
    /// Sets whether the communicator runs in local (no-resource-manager)
    /// mode.
    pub fn local_mode(mut self, value: bool) -> Self {
        self.local_mode = value;
        self
    }

    /// Sets the local worker pool's concurrency bound.
    pub fn worker_pool_capacity(mut self, value: usize) -> Self {
        self.worker_pool_capacity = value;
        self
    }

    /// Sets the shutdown join timeout.
    pub fn shutdown_join_timeout(mut self, value: Duration) -> Self {
        self.shutdown_join_timeout = value;
        self
    }

    /// Sets the application attempt id.
    pub fn application_attempt_id(mut self, value: impl Into<String>) -> Self {
        self.application_attempt_id = value.into();
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// [`ConfigError::ZeroWorkerPoolCapacity`] if `worker_pool_capacity`
    /// is 0.
    pub fn build(self) -> Result<CommunicatorConfig, ConfigError> {
        if self.worker_pool_capacity == 0 {
            return Err(ConfigError::ZeroWorkerPoolCapacity);
        }

        Ok(CommunicatorConfig {
            local_mode: self.local_mode,
            worker_pool_capacity: self.worker_pool_capacity,
            shutdown_join_timeout: self.shutdown_join_timeout,
            application_attempt_id: self.application_attempt_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_local_mode_with_capacity_four() {
        let config = CommunicatorConfig::default();
        assert!(config.local_mode());
        assert_eq!(config.worker_pool_capacity(), 4);
    }

    #[test]
    fn builder_rejects_zero_capacity() {
        let err = CommunicatorConfig::builder()
            .worker_pool_capacity(0)
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::ZeroWorkerPoolCapacity));
    }

    #[test]
    fn builder_applies_all_fields() {
        let config = CommunicatorConfig::builder()
            .local_mode(false)
            .worker_pool_capacity(16)
            .shutdown_join_timeout(Duration::from_secs(5))
            .application_attempt_id("attempt_xyz")
            .build()
            .unwrap();

        assert!(!config.local_mode());
        assert_eq!(config.worker_pool_capacity(), 16);
        assert_eq!(config.shutdown_join_timeout(), Duration::from_secs(5));
        assert_eq!(config.application_attempt_id(), "attempt_xyz");
    }
}
