//! Executable units bound to graph nodes and the factory that creates them.

mod registry;

use smallvec::SmallVec;
use thiserror::Error;

use crate::backend::BackendId;
use crate::graph::{NodeId, Operation, OperationKind};
use crate::tensor::{DataType, Storage, StorageKind, TensorDescriptor, TensorView, TensorViewMut};

pub use registry::{WorkloadConstructor, WorkloadKey, WorkloadRegistry};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum WorkloadError {
    #[error("no {operation} workload for data type {data_type:?} on backend {backend}")]
    UnsupportedCombination {
        operation: OperationKind,
        data_type: DataType,
        backend: BackendId,
    },
    #[error("backend {0} is not registered")]
    UnknownBackend(String),
    #[error("constructor for {requested:?} produced workload {workload} of type {created:?}")]
    DataTypeMismatch {
        workload: String,
        requested: DataType,
        created: DataType,
    },
    #[error("invalid descriptor for {workload}: {reason}")]
    InvalidDescriptor { workload: String, reason: String },
    #[error("{workload} has no {direction} tensor at index {index}")]
    MissingTensor {
        workload: String,
        direction: &'static str,
        index: usize,
    },
    #[error("{workload} expected {expected:?} memory, got {actual:?}")]
    StorageMismatch {
        workload: String,
        expected: StorageKind,
        actual: StorageKind,
    },
    #[error("{workload} failed: {reason}")]
    Execution { workload: String, reason: String },
}

pub type WorkloadResult<T> = Result<T, WorkloadError>;

/// Where a workload tensor lives during execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotRef {
    /// Network-owned buffer with the given index.
    Intermediate(usize),
    /// Caller input with the given binding-table index.
    BoundInput(usize),
    /// Caller output with the given binding-table index.
    BoundOutput(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TensorBinding {
    pub slot: SlotRef,
    pub descriptor: TensorDescriptor,
}

/// Everything a constructor needs to build the workload for one node.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkloadDescriptor {
    pub node: NodeId,
    pub name: String,
    pub operation: Operation,
    pub inputs: Vec<TensorBinding>,
    pub outputs: Vec<TensorBinding>,
}

impl WorkloadDescriptor {
    /// Tensor counts a workload for `kind` binds: boundary nodes also bind
    /// the caller tensor they copy from or into.
    pub fn arity(kind: OperationKind) -> (usize, usize) {
        match kind {
            OperationKind::Input | OperationKind::Output => (1, 1),
            _ => (kind.num_inputs(), kind.num_outputs()),
        }
    }

    /// Rejects descriptors whose tensor counts differ from the operation arity.
    pub fn check_arity(&self, workload: &str) -> WorkloadResult<()> {
        let kind = self.operation.kind();
        let (inputs, outputs) = Self::arity(kind);
        if self.inputs.len() != inputs || self.outputs.len() != outputs {
            return Err(WorkloadError::InvalidDescriptor {
                workload: workload.to_string(),
                reason: format!(
                    "{kind} binds {inputs} inputs and {outputs} outputs, descriptor has {} and {}",
                    self.inputs.len(),
                    self.outputs.len()
                ),
            });
        }
        Ok(())
    }

    pub fn input_descriptor(&self, index: usize) -> Option<&TensorDescriptor> {
        self.inputs.get(index).map(|binding| &binding.descriptor)
    }

    pub fn output_descriptor(&self, index: usize) -> Option<&TensorDescriptor> {
        self.outputs.get(index).map(|binding| &binding.descriptor)
    }
}

/// `<prefix><Operation><DataType>Workload`, e.g. `RefPermuteFloat32Workload`.
pub fn workload_name(prefix: &str, kind: OperationKind, data_type: DataType) -> String {
    format!("{prefix}{}{}Workload", kind.name(), data_type.name())
}

/// Memory resolved for one workload invocation.
#[derive(Debug, Default)]
pub struct WorkloadIo<'a> {
    inputs: SmallVec<[TensorView<'a>; 2]>,
    outputs: SmallVec<[TensorViewMut<'a>; 1]>,
}

impl<'a> WorkloadIo<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_input(&mut self, view: TensorView<'a>) {
        self.inputs.push(view);
    }

    pub fn push_output(&mut self, view: TensorViewMut<'a>) {
        self.outputs.push(view);
    }

    pub fn num_inputs(&self) -> usize {
        self.inputs.len()
    }

    pub fn num_outputs(&self) -> usize {
        self.outputs.len()
    }

    pub fn input(&self, index: usize) -> Option<TensorView<'a>> {
        self.inputs.get(index).copied()
    }

    pub fn output(&mut self, index: usize) -> Option<TensorViewMut<'_>> {
        self.outputs.get_mut(index).map(|view| view.reborrow())
    }

    /// Input `index` as a typed slice.
    pub fn typed_input<T: Storage>(&self, workload: &str, index: usize) -> WorkloadResult<&'a [T]> {
        let view = self.inputs.get(index).ok_or_else(|| WorkloadError::MissingTensor {
            workload: workload.to_string(),
            direction: "input",
            index,
        })?;
        T::view(view).ok_or_else(|| WorkloadError::StorageMismatch {
            workload: workload.to_string(),
            expected: T::KIND,
            actual: view.storage(),
        })
    }

    /// Output `index` as a typed mutable slice.
    pub fn typed_output<T: Storage>(
        &mut self,
        workload: &str,
        index: usize,
    ) -> WorkloadResult<&mut [T]> {
        let view = self
            .outputs
            .get_mut(index)
            .ok_or_else(|| WorkloadError::MissingTensor {
                workload: workload.to_string(),
                direction: "output",
                index,
            })?;
        let actual = view.storage();
        T::view_mut(view).ok_or_else(|| WorkloadError::StorageMismatch {
            workload: workload.to_string(),
            expected: T::KIND,
            actual,
        })
    }
}

/// An executable unit for one node, specialized for one numeric type.
///
/// `execute` reads its inputs and writes its outputs; it never changes its
/// own metadata, so running it again on unchanged inputs gives the same result.
pub trait Workload: Send + Sync {
    fn name(&self) -> &str;

    /// Human-readable form, e.g. `reference permute, 32-bit float`.
    fn describe(&self) -> String;

    fn data_type(&self) -> DataType;

    fn descriptor(&self) -> &WorkloadDescriptor;

    fn inputs(&self) -> &[TensorBinding] {
        &self.descriptor().inputs
    }

    fn outputs(&self) -> &[TensorBinding] {
        &self.descriptor().outputs
    }

    fn execute(&self, io: &mut WorkloadIo<'_>) -> WorkloadResult<()>;
}

impl std::fmt::Debug for dyn Workload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workload")
            .field("name", &self.name())
            .field("node", &self.descriptor().node)
            .finish()
    }
}
