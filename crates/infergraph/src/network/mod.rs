//! Loading optimized graphs onto a backend and running them.

mod binding;
mod def;
mod loaded;

use thiserror::Error;

use crate::backend::BackendId;
use crate::graph::{Graph, GraphError};
use crate::optimizer::{default_rules, optimize, OptimizationReport, OptimizerOptions};
use crate::tensor::{DataType, TensorShape};
use crate::workload::{SlotRef, WorkloadError, WorkloadRegistry};

pub use binding::{BindingDescriptor, BindingDirection, BindingTable};
pub use def::{LayerDef, NetworkDef, SlotRefDef};
pub use loaded::LoadedNetwork;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum LoadError {
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error("cannot create workload for node '{node}'")]
    Workload {
        node: String,
        #[source]
        source: WorkloadError,
    },
}

pub type LoadResult<T> = Result<T, LoadError>;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ExecutionError {
    #[error("no {direction} binding named '{name}'")]
    UnknownBoundary {
        name: String,
        direction: BindingDirection,
    },
    #[error("{direction} '{name}' expects {expected:?} data, got {actual:?}")]
    TypeMismatch {
        name: String,
        direction: BindingDirection,
        expected: DataType,
        actual: DataType,
    },
    #[error("{direction} '{name}' expects shape {expected} ({} elements), got {actual}", .expected.num_elements())]
    ShapeMismatch {
        name: String,
        direction: BindingDirection,
        expected: TensorShape,
        actual: TensorShape,
    },
    #[error("{direction} '{name}' was not bound")]
    MissingBinding {
        name: String,
        direction: BindingDirection,
    },
    #[error("{direction} '{name}' was bound more than once")]
    DuplicateBinding {
        name: String,
        direction: BindingDirection,
    },
    #[error("workload {workload} cannot resolve tensor slot {slot:?}")]
    InvalidSlot { workload: String, slot: SlotRef },
    #[error("workload {workload} failed")]
    Workload {
        workload: String,
        #[source]
        source: WorkloadError,
    },
}

pub type ExecutionResult<T> = Result<T, ExecutionError>;

/// Optimizes `graph` with the standard rules, then loads it onto `backend`.
pub fn prepare(
    graph: &mut Graph,
    options: &OptimizerOptions,
    backend: &BackendId,
    registry: &WorkloadRegistry,
) -> LoadResult<(LoadedNetwork, OptimizationReport)> {
    let report = optimize(graph, &default_rules(), options)?;
    let network = LoadedNetwork::load(graph, backend, registry)?;
    Ok((network, report))
}
