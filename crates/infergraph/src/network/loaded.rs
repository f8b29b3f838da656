use std::collections::HashMap;

use smallvec::SmallVec;
use tracing::{debug, info};

use super::{
    BindingDescriptor, BindingDirection, BindingTable, ExecutionError, ExecutionResult, LoadError,
    LoadResult,
};
use crate::backend::BackendId;
use crate::graph::{Graph, GraphError, Node, Operation, OutputSlot};
use crate::tensor::{ConstTensor, Tensor, TensorBuffer, TensorDescriptor, TensorView, TensorViewMut};
use crate::workload::{
    SlotRef, TensorBinding, Workload, WorkloadDescriptor, WorkloadIo, WorkloadRegistry,
};

/// A graph bound to one backend, ready to execute.
///
/// Holds one workload per node in topological order and one preallocated
/// buffer per intermediate tensor. Executing takes `&mut self`, so a network
/// never runs twice at the same time; separate networks are independent.
pub struct LoadedNetwork {
    backend: BackendId,
    bindings: BindingTable,
    workloads: Vec<Box<dyn Workload>>,
    buffers: Vec<TensorBuffer>,
}

fn producer_binding(
    graph: &Graph,
    node: &Node,
    index: usize,
    buffers: &HashMap<OutputSlot, usize>,
) -> LoadResult<TensorBinding> {
    let dangling = || GraphError::DanglingInput {
        node: node.id(),
        name: node.name().to_string(),
        index,
    };
    let producer = node.input(index).ok_or_else(dangling)?;
    let descriptor = graph.output_descriptor(producer).cloned().ok_or_else(dangling)?;
    let slot = buffers.get(&producer).copied().ok_or_else(dangling)?;
    Ok(TensorBinding {
        slot: SlotRef::Intermediate(slot),
        descriptor,
    })
}

fn missing_binding(node: &Node) -> LoadError {
    LoadError::Graph(GraphError::InvalidOperation {
        node: node.id(),
        name: node.name().to_string(),
        reason: "boundary node is missing from the binding table".to_string(),
    })
}

impl LoadedNetwork {
    /// Validates `graph` and creates a workload for every node on `backend`.
    ///
    /// Fails if any node has no workload for its exact (operation, backend,
    /// data type) combination; no workloads are kept in that case.
    pub fn load(graph: &Graph, backend: &BackendId, registry: &WorkloadRegistry) -> LoadResult<Self> {
        graph.validate()?;
        let bindings = graph.binding_table()?;
        let order: Vec<&Node> = graph.iter().collect();

        let mut buffer_of = HashMap::new();
        let mut buffer_descriptors: Vec<TensorDescriptor> = Vec::new();
        for node in &order {
            for index in 0..node.num_outputs() {
                let slot = node.output_slot(index);
                let descriptor = graph.output_descriptor(slot).cloned().ok_or_else(|| {
                    GraphError::MissingDescriptor {
                        node: node.id(),
                        name: node.name().to_string(),
                        index,
                    }
                })?;
                buffer_of.insert(slot, buffer_descriptors.len());
                buffer_descriptors.push(descriptor);
            }
        }

        let mut workloads = Vec::with_capacity(order.len());
        for node in &order {
            let mut inputs = Vec::with_capacity(node.num_inputs());
            let mut outputs = Vec::with_capacity(node.num_outputs());
            match node.operation() {
                Operation::Input { .. } => {
                    let index = bindings
                        .input_position_of(node.id())
                        .ok_or_else(|| missing_binding(node))?;
                    inputs.push(TensorBinding {
                        slot: SlotRef::BoundInput(index),
                        descriptor: bindings.inputs()[index].descriptor.clone(),
                    });
                }
                _ => {
                    for index in 0..node.num_inputs() {
                        inputs.push(producer_binding(graph, node, index, &buffer_of)?);
                    }
                }
            }
            match node.operation() {
                Operation::Output { .. } => {
                    let index = bindings
                        .output_position_of(node.id())
                        .ok_or_else(|| missing_binding(node))?;
                    outputs.push(TensorBinding {
                        slot: SlotRef::BoundOutput(index),
                        descriptor: bindings.outputs()[index].descriptor.clone(),
                    });
                }
                _ => {
                    for index in 0..node.num_outputs() {
                        let slot = node.output_slot(index);
                        outputs.push(TensorBinding {
                            slot: SlotRef::Intermediate(buffer_of[&slot]),
                            descriptor: buffer_descriptors[buffer_of[&slot]].clone(),
                        });
                    }
                }
            }

            // Output nodes carry no tensor of their own; they run at the type they consume.
            let data_type = match node.operation() {
                Operation::Output { .. } => inputs[0].descriptor.data_type(),
                _ => outputs[0].descriptor.data_type(),
            };
            let descriptor = WorkloadDescriptor {
                node: node.id(),
                name: node.name().to_string(),
                operation: node.operation().clone(),
                inputs,
                outputs,
            };
            let workload = registry
                .create(&descriptor, backend, data_type)
                .map_err(|source| LoadError::Workload {
                    node: node.name().to_string(),
                    source,
                })?;
            debug!(node = node.name(), workload = workload.name(), "created workload");
            workloads.push(workload);
        }

        let buffers = buffer_descriptors
            .iter()
            .map(|desc| TensorBuffer::zeroed(desc.data_type().storage(), desc.num_elements()))
            .collect();

        info!(
            backend = %backend,
            workloads = workloads.len(),
            inputs = bindings.inputs().len(),
            outputs = bindings.outputs().len(),
            "loaded network"
        );
        Ok(Self {
            backend: backend.clone(),
            bindings,
            workloads,
            buffers,
        })
    }

    pub fn backend(&self) -> &BackendId {
        &self.backend
    }

    pub fn bindings(&self) -> &BindingTable {
        &self.bindings
    }

    pub fn input_binding(&self, name: &str) -> Option<&BindingDescriptor> {
        self.bindings.input(name)
    }

    pub fn output_binding(&self, name: &str) -> Option<&BindingDescriptor> {
        self.bindings.output(name)
    }

    /// Workloads in execution order.
    pub fn workloads(&self) -> impl Iterator<Item = &dyn Workload> {
        self.workloads.iter().map(|workload| &**workload)
    }

    pub fn workload_names(&self) -> Vec<&str> {
        self.workloads().map(|workload| workload.name()).collect()
    }

    /// Runs every workload once, in topological order.
    ///
    /// All bindings are resolved and checked before anything runs, so a
    /// binding error leaves the network untouched and ready for another call.
    pub fn execute(
        &mut self,
        inputs: &[(&str, ConstTensor<'_>)],
        outputs: &mut [(&str, Tensor<'_>)],
    ) -> ExecutionResult<()> {
        let mut input_views: SmallVec<[Option<TensorView<'_>>; 4]> =
            SmallVec::from_elem(None, self.bindings.inputs().len());
        for (name, tensor) in inputs {
            let index = resolve(
                &self.bindings,
                BindingDirection::Input,
                name,
                tensor.descriptor(),
            )?;
            if input_views[index].replace(tensor.memory()).is_some() {
                return Err(ExecutionError::DuplicateBinding {
                    name: name.to_string(),
                    direction: BindingDirection::Input,
                });
            }
        }

        let mut output_views: SmallVec<[Option<TensorViewMut<'_>>; 4]> =
            (0..self.bindings.outputs().len()).map(|_| None).collect();
        for (name, tensor) in outputs.iter_mut() {
            let name: &str = name;
            let index = resolve(
                &self.bindings,
                BindingDirection::Output,
                name,
                tensor.descriptor(),
            )?;
            if output_views[index].is_some() {
                return Err(ExecutionError::DuplicateBinding {
                    name: name.to_string(),
                    direction: BindingDirection::Output,
                });
            }
            output_views[index] = Some(tensor.memory_mut());
        }

        if let Some(index) = input_views.iter().position(Option::is_none) {
            return Err(ExecutionError::MissingBinding {
                name: self.bindings.inputs()[index].name.clone(),
                direction: BindingDirection::Input,
            });
        }
        if let Some(index) = output_views.iter().position(Option::is_none) {
            return Err(ExecutionError::MissingBinding {
                name: self.bindings.outputs()[index].name.clone(),
                direction: BindingDirection::Output,
            });
        }

        for workload in &self.workloads {
            // Intermediate outputs are moved out for the call so that the
            // remaining buffers can be borrowed as inputs at the same time.
            let mut taken: SmallVec<[(usize, TensorBuffer); 1]> = SmallVec::new();
            let mut bound: SmallVec<[TensorViewMut<'_>; 1]> = SmallVec::new();
            for binding in workload.outputs() {
                match binding.slot {
                    SlotRef::Intermediate(index) => {
                        taken.push((index, self.buffers[index].take()));
                    }
                    SlotRef::BoundOutput(index) => {
                        bound.extend(output_views.get_mut(index).and_then(Option::take));
                    }
                    SlotRef::BoundInput(_) => {}
                }
            }

            let result = run_workload(
                workload.as_ref(),
                &self.buffers,
                &input_views,
                bound,
                &mut taken,
            );

            for (index, buffer) in taken {
                self.buffers[index] = buffer;
            }
            result?;
        }
        Ok(())
    }
}

fn resolve(
    bindings: &BindingTable,
    direction: BindingDirection,
    name: &str,
    supplied: &TensorDescriptor,
) -> ExecutionResult<usize> {
    let (index, binding) = match direction {
        BindingDirection::Input => bindings
            .input_index(name)
            .map(|index| (index, &bindings.inputs()[index])),
        BindingDirection::Output => bindings
            .output_index(name)
            .map(|index| (index, &bindings.outputs()[index])),
    }
    .ok_or_else(|| ExecutionError::UnknownBoundary {
        name: name.to_string(),
        direction,
    })?;

    let expected = &binding.descriptor;
    if expected.data_type() != supplied.data_type() {
        return Err(ExecutionError::TypeMismatch {
            name: name.to_string(),
            direction,
            expected: expected.data_type(),
            actual: supplied.data_type(),
        });
    }
    if expected.num_elements() != supplied.num_elements() {
        return Err(ExecutionError::ShapeMismatch {
            name: name.to_string(),
            direction,
            expected: expected.shape().clone(),
            actual: supplied.shape().clone(),
        });
    }
    Ok(index)
}

fn run_workload<'a>(
    workload: &dyn Workload,
    buffers: &'a [TensorBuffer],
    input_views: &[Option<TensorView<'a>>],
    bound: SmallVec<[TensorViewMut<'a>; 1]>,
    taken: &'a mut [(usize, TensorBuffer)],
) -> ExecutionResult<()> {
    let invalid = |slot: SlotRef| ExecutionError::InvalidSlot {
        workload: workload.name().to_string(),
        slot,
    };

    let mut io = WorkloadIo::new();
    for binding in workload.inputs() {
        let view = match binding.slot {
            SlotRef::Intermediate(index) => buffers.get(index).map(TensorBuffer::as_view),
            SlotRef::BoundInput(index) => input_views.get(index).copied().flatten(),
            SlotRef::BoundOutput(_) => None,
        };
        io.push_input(view.ok_or_else(|| invalid(binding.slot))?);
    }

    let mut taken = taken.iter_mut();
    let mut bound = bound.into_iter();
    for binding in workload.outputs() {
        let view = match binding.slot {
            SlotRef::Intermediate(_) => taken.next().map(|(_, buffer)| buffer.as_view_mut()),
            SlotRef::BoundOutput(_) => bound.next(),
            SlotRef::BoundInput(_) => None,
        };
        io.push_output(view.ok_or_else(|| invalid(binding.slot))?);
    }

    workload
        .execute(&mut io)
        .map_err(|source| ExecutionError::Workload {
            workload: workload.name().to_string(),
            source,
        })
}
