//! Tensor metadata and memory shared by the graph, the optimizer and workloads.

pub mod descriptor;
pub mod dtype;
pub mod memory;

pub use descriptor::{
    DescriptorError, DescriptorResult, QuantizationInfo, TensorDescriptor, TensorShape,
};
pub use dtype::{markers, DataType, DataTypeMarker, StorageKind};
pub use memory::{ConstTensor, Storage, Tensor, TensorBuffer, TensorView, TensorViewMut};
