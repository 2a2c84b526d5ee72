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

//! Opaque identity types (§3).
//!
//! Both ids are string-convertible value types. Neither carries any
//! behavior beyond equality, hashing, and display — the core never
//! interprets their contents.

use std::fmt;

/// Opaque identity of a worker container.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct ContainerId(String);

impl ContainerId {
    /// Creates a new container id from anything string-convertible.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrows the underlying string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ContainerId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for ContainerId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Opaque identity of one task attempt.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct TaskAttemptId(String);

impl TaskAttemptId {
    /// Creates a new attempt id from anything string-convertible.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrows the underlying string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskAttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for TaskAttemptId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for TaskAttemptId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn container_id_display_roundtrips_string() {
        let id = ContainerId::new("container_42");
        assert_eq!(id.as_str(), "container_42");
        assert_eq!(id.to_string(), "container_42");
    }

    #[test]
    fn ids_hash_and_compare_by_value() {
        let a = TaskAttemptId::new("attempt_1");
        let b = TaskAttemptId::new("attempt_1");
        let c = TaskAttemptId::new("attempt_2");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
