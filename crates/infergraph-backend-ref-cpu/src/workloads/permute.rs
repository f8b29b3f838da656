use std::marker::PhantomData;

use infergraph::graph::{Operation, OperationKind};
use infergraph::tensor::DataTypeMarker;
use infergraph::workload::{Workload, WorkloadDescriptor, WorkloadIo, WorkloadResult};

use super::{ref_workload_accessors, RefBase};
use crate::layout::gather_table;

/// Validates shapes for an axis reordering where output axis `j` reads input
/// axis `source_axes[j]`, and precomputes the gather table.
fn plan_gather(base: &RefBase, source_axes: &[usize]) -> WorkloadResult<Vec<usize>> {
    let input = base.descriptor.inputs[0].descriptor.shape();
    let output = base.descriptor.outputs[0].descriptor.shape();
    if source_axes.len() != input.rank() {
        return Err(base.invalid(format!(
            "{}-axis permutation applied to rank-{} input {}",
            source_axes.len(),
            input.rank(),
            input
        )));
    }
    let expected: Vec<usize> = source_axes.iter().map(|&axis| input.dims()[axis]).collect();
    if expected != output.dims() {
        return Err(base.invalid(format!(
            "permuting {input} yields {expected:?}, output is {output}"
        )));
    }
    Ok(gather_table(input.dims(), source_axes))
}

fn gather<T: DataTypeMarker>(
    base: &RefBase,
    table: &[usize],
    io: &mut WorkloadIo<'_>,
) -> WorkloadResult<()> {
    let input = io.typed_input::<T::Storage>(&base.name, 0)?;
    let output = io.typed_output::<T::Storage>(&base.name, 0)?;
    if input.len() != table.len() || output.len() != table.len() {
        return Err(base.failed(format!(
            "expected {} elements, got input {} and output {}",
            table.len(),
            input.len(),
            output.len()
        )));
    }
    for (slot, &source) in output.iter_mut().zip(table) {
        *slot = input[source];
    }
    Ok(())
}

/// Permute: input axis `i` moves to output axis `mappings[i]`.
#[derive(Debug)]
pub struct RefPermuteWorkload<T: DataTypeMarker> {
    base: RefBase,
    table: Vec<usize>,
    _marker: PhantomData<T>,
}

impl<T: DataTypeMarker> RefPermuteWorkload<T> {
    pub fn new(descriptor: &WorkloadDescriptor) -> WorkloadResult<Self> {
        let base = RefBase::new::<T>(OperationKind::Permute, descriptor)?;
        let Operation::Permute(permute) = &base.descriptor.operation else {
            return Err(base.invalid("expected permute parameters"));
        };
        let source_axes = permute.mappings.inverse();
        let table = plan_gather(&base, source_axes.as_slice())?;
        Ok(Self {
            base,
            table,
            _marker: PhantomData,
        })
    }
}

impl<T: DataTypeMarker> Workload for RefPermuteWorkload<T> {
    ref_workload_accessors!();

    fn execute(&self, io: &mut WorkloadIo<'_>) -> WorkloadResult<()> {
        gather::<T>(&self.base, &self.table, io)
    }
}

/// Transpose: output axis `j` reads input axis `permutation[j]`.
#[derive(Debug)]
pub struct RefTransposeWorkload<T: DataTypeMarker> {
    base: RefBase,
    table: Vec<usize>,
    _marker: PhantomData<T>,
}

impl<T: DataTypeMarker> RefTransposeWorkload<T> {
    pub fn new(descriptor: &WorkloadDescriptor) -> WorkloadResult<Self> {
        let base = RefBase::new::<T>(OperationKind::Transpose, descriptor)?;
        let Operation::Transpose(transpose) = &base.descriptor.operation else {
            return Err(base.invalid("expected transpose parameters"));
        };
        let table = plan_gather(&base, transpose.permutation.as_slice())?;
        Ok(Self {
            base,
            table,
            _marker: PhantomData,
        })
    }
}

impl<T: DataTypeMarker> Workload for RefTransposeWorkload<T> {
    ref_workload_accessors!();

    fn execute(&self, io: &mut WorkloadIo<'_>) -> WorkloadResult<()> {
        gather::<T>(&self.base, &self.table, io)
    }
}
