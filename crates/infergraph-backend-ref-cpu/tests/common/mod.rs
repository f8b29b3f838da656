//! Graph builders and a naive axis-reordering oracle shared by the
//! reference backend tests.

#![allow(dead_code)]

use infergraph::graph::{
    Graph, InputSlot, OutputSlot, PermutationVector, PermuteDescriptor, ReshapeDescriptor,
    TransposeDescriptor,
};
use infergraph::tensor::{DataType, QuantizationInfo, TensorDescriptor, TensorShape};
use infergraph::workload::WorkloadRegistry;
use infergraph::{BackendId, Operation};
use infergraph_backend_ref_cpu::{RefBackend, CPU_REF};

pub fn backend() -> BackendId {
    BackendId::new(CPU_REF)
}

pub fn registry() -> WorkloadRegistry {
    RefBackend::registry()
}

pub fn desc(dims: &[usize], data_type: DataType) -> TensorDescriptor {
    if data_type.is_quantized() {
        TensorDescriptor::quantized(dims.to_vec(), data_type, QuantizationInfo::new(0.5, 0))
            .unwrap()
    } else {
        TensorDescriptor::from_dims(dims.to_vec(), data_type).unwrap()
    }
}

pub fn transpose(perm: &[usize]) -> Operation {
    Operation::Transpose(TransposeDescriptor::new(
        PermutationVector::new(perm.to_vec()).unwrap(),
    ))
}

pub fn permute(mappings: &[usize]) -> Operation {
    Operation::Permute(PermuteDescriptor::new(
        PermutationVector::new(mappings.to_vec()).unwrap(),
    ))
}

pub fn reshape(dims: &[usize]) -> Operation {
    Operation::Reshape(ReshapeDescriptor::new(TensorShape::new(dims.to_vec()).unwrap()))
}

/// Output dims of `operation` applied to `dims`.
pub fn output_dims(operation: &Operation, dims: &[usize]) -> Vec<usize> {
    match operation {
        Operation::Transpose(desc) => desc.permutation.as_slice().iter().map(|&a| dims[a]).collect(),
        Operation::Permute(desc) => {
            let mut out = vec![0; dims.len()];
            for (axis, &dim) in dims.iter().enumerate() {
                out[desc.mappings[axis]] = dim;
            }
            out
        }
        Operation::Reshape(desc) => desc.target_shape.dims().to_vec(),
        _ => dims.to_vec(),
    }
}

/// `input -> layers... -> output` where every layer keeps `data_type`.
pub fn chain(input_dims: &[usize], data_type: DataType, layers: &[(&str, Operation)]) -> Graph {
    let mut graph = Graph::new();
    let input = graph.add_node(Operation::Input { binding_id: 0 }, "input");
    graph
        .set_output_descriptor(OutputSlot::new(input, 0), desc(input_dims, data_type))
        .unwrap();
    let mut previous = input;
    let mut dims = input_dims.to_vec();
    for (name, operation) in layers {
        dims = output_dims(operation, &dims);
        let id = graph.add_node(operation.clone(), *name);
        graph
            .set_output_descriptor(OutputSlot::new(id, 0), desc(&dims, data_type))
            .unwrap();
        graph
            .connect(OutputSlot::new(previous, 0), InputSlot::new(id, 0))
            .unwrap();
        previous = id;
    }
    let output = graph.add_node(Operation::Output { binding_id: 0 }, "output");
    graph
        .connect(OutputSlot::new(previous, 0), InputSlot::new(output, 0))
        .unwrap();
    graph.validate().unwrap();
    graph
}

fn strides(dims: &[usize]) -> Vec<usize> {
    let mut strides = vec![1; dims.len()];
    for axis in (0..dims.len().saturating_sub(1)).rev() {
        strides[axis] = strides[axis + 1] * dims[axis + 1];
    }
    strides
}

/// Moves input axis `i` to output axis `mappings[i]`, element by element.
pub fn naive_permute<T: Copy + Default>(data: &[T], dims: &[usize], mappings: &[usize]) -> Vec<T> {
    let mut out_dims = vec![0; dims.len()];
    for (axis, &dim) in dims.iter().enumerate() {
        out_dims[mappings[axis]] = dim;
    }
    let in_strides = strides(dims);
    let out_strides = strides(&out_dims);
    let mut out = vec![T::default(); data.len()];
    for (flat, &value) in data.iter().enumerate() {
        let mut target = 0;
        for axis in 0..dims.len() {
            let coord = (flat / in_strides[axis]) % dims[axis];
            target += coord * out_strides[mappings[axis]];
        }
        out[target] = value;
    }
    out
}

/// Output axis `j` reads input axis `perm[j]`.
pub fn naive_transpose<T: Copy + Default>(data: &[T], dims: &[usize], perm: &[usize]) -> Vec<T> {
    let mut mappings = vec![0; perm.len()];
    for (out_axis, &in_axis) in perm.iter().enumerate() {
        mappings[in_axis] = out_axis;
    }
    naive_permute(data, dims, &mappings)
}
