//! Backend identity and the hook through which a backend contributes workloads.

pub mod registry;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::workload::WorkloadRegistry;

pub use registry::{create_backend, has_backend, list_backends, register_backend};

/// Name a backend is registered and selected under, e.g. `CpuRef`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BackendId(String);

impl BackendId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BackendId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BackendId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// A compute backend: an identity plus the workloads it can build.
pub trait Backend: Send + Sync {
    fn id(&self) -> BackendId;

    /// Adds one constructor per supported (operation, data type) pair.
    fn register_workloads(&self, registry: &mut WorkloadRegistry);
}
