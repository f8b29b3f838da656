use std::collections::HashMap;

use tracing::debug;

use super::{Workload, WorkloadDescriptor, WorkloadError, WorkloadResult};
use crate::backend::{create_backend, Backend, BackendId};
use crate::graph::OperationKind;
use crate::tensor::DataType;

/// Exact dispatch key; there is no fallback between keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkloadKey {
    pub kind: OperationKind,
    pub backend: BackendId,
    pub data_type: DataType,
}

impl WorkloadKey {
    pub fn new(kind: OperationKind, backend: BackendId, data_type: DataType) -> Self {
        Self {
            kind,
            backend,
            data_type,
        }
    }
}

pub type WorkloadConstructor = fn(&WorkloadDescriptor) -> WorkloadResult<Box<dyn Workload>>;

/// Maps (operation kind, backend, data type) to a workload constructor.
#[derive(Default, Clone)]
pub struct WorkloadRegistry {
    constructors: HashMap<WorkloadKey, WorkloadConstructor>,
}

impl WorkloadRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the workloads of a single backend.
    pub fn for_backend(backend: &dyn Backend) -> Self {
        let mut registry = Self::new();
        backend.register_workloads(&mut registry);
        registry
    }

    /// Registry for a backend looked up in the global backend registry.
    pub fn for_backend_named(name: &str) -> WorkloadResult<Self> {
        let backend =
            create_backend(name).ok_or_else(|| WorkloadError::UnknownBackend(name.to_string()))?;
        Ok(Self::for_backend(backend.as_ref()))
    }

    /// Adds `constructor` under `key`, replacing any earlier entry.
    pub fn register(&mut self, key: WorkloadKey, constructor: WorkloadConstructor) -> &mut Self {
        if self.constructors.insert(key.clone(), constructor).is_some() {
            debug!(?key, "replaced workload constructor");
        }
        self
    }

    pub fn supports(&self, kind: OperationKind, backend: &BackendId, data_type: DataType) -> bool {
        self.constructors
            .contains_key(&WorkloadKey::new(kind, backend.clone(), data_type))
    }

    /// Registered keys in a stable order.
    pub fn keys(&self) -> Vec<WorkloadKey> {
        let mut keys: Vec<WorkloadKey> = self.constructors.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.constructors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constructors.is_empty()
    }

    /// Builds the workload for `descriptor`, specialized for exactly `data_type`.
    pub fn create(
        &self,
        descriptor: &WorkloadDescriptor,
        backend: &BackendId,
        data_type: DataType,
    ) -> WorkloadResult<Box<dyn Workload>> {
        let kind = descriptor.operation.kind();
        let key = WorkloadKey::new(kind, backend.clone(), data_type);
        let constructor =
            self.constructors
                .get(&key)
                .ok_or_else(|| WorkloadError::UnsupportedCombination {
                    operation: kind,
                    data_type,
                    backend: backend.clone(),
                })?;
        let workload = constructor(descriptor)?;
        if workload.data_type() != data_type {
            return Err(WorkloadError::DataTypeMismatch {
                workload: workload.name().to_string(),
                requested: data_type,
                created: workload.data_type(),
            });
        }
        Ok(workload)
    }
}

impl std::fmt::Debug for WorkloadRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkloadRegistry")
            .field("keys", &self.keys())
            .finish()
    }
}
