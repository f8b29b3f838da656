//! Core of a neural-network inference engine.
//!
//! A [`graph::Graph`] of tensor operations is rewritten by an ordered list of
//! [`optimizer::RewriteRule`]s driven to a fixed point, bound to backend
//! [`workload::Workload`]s chosen by exact (operation, backend, data type)
//! dispatch, and executed in topological order by a [`network::LoadedNetwork`].

pub mod backend;
mod env;
pub mod graph;
pub mod network;
pub mod optimizer;
pub mod tensor;
pub mod workload;

pub use backend::{Backend, BackendId};
pub use graph::{Graph, GraphError, GraphResult, NodeId, Operation, OperationKind};
pub use network::{
    prepare, ExecutionError, ExecutionResult, LoadError, LoadResult, LoadedNetwork, NetworkDef,
};
pub use optimizer::{default_rules, optimize, OptimizationReport, OptimizerOptions};
pub use tensor::{ConstTensor, DataType, Tensor, TensorDescriptor, TensorShape};
pub use workload::{Workload, WorkloadError, WorkloadRegistry, WorkloadResult};
