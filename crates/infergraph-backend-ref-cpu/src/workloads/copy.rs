use std::marker::PhantomData;

use infergraph::graph::{Operation, OperationKind};
use infergraph::tensor::DataTypeMarker;
use infergraph::workload::{Workload, WorkloadDescriptor, WorkloadIo, WorkloadResult};

use super::{ref_workload_accessors, RefBase};

/// Contiguous element copy from input 0 to output 0.
fn copy_contiguous<T: DataTypeMarker>(base: &RefBase, io: &mut WorkloadIo<'_>) -> WorkloadResult<()> {
    let input = io.typed_input::<T::Storage>(&base.name, 0)?;
    let output = io.typed_output::<T::Storage>(&base.name, 0)?;
    if input.len() != output.len() {
        return Err(base.failed(format!(
            "cannot copy {} elements into {}",
            input.len(),
            output.len()
        )));
    }
    output.copy_from_slice(input);
    Ok(())
}

fn check_element_counts(base: &RefBase) -> WorkloadResult<()> {
    let input = base.descriptor.inputs[0].descriptor.num_elements();
    let output = base.descriptor.outputs[0].descriptor.num_elements();
    if input != output {
        return Err(base.invalid(format!(
            "input has {input} elements but output has {output}"
        )));
    }
    Ok(())
}

/// Copies a caller input into the network.
#[derive(Debug)]
pub struct RefInputWorkload<T: DataTypeMarker> {
    base: RefBase,
    _marker: PhantomData<T>,
}

impl<T: DataTypeMarker> RefInputWorkload<T> {
    pub fn new(descriptor: &WorkloadDescriptor) -> WorkloadResult<Self> {
        let base = RefBase::new::<T>(OperationKind::Input, descriptor)?;
        check_element_counts(&base)?;
        Ok(Self {
            base,
            _marker: PhantomData,
        })
    }
}

impl<T: DataTypeMarker> Workload for RefInputWorkload<T> {
    ref_workload_accessors!();

    fn execute(&self, io: &mut WorkloadIo<'_>) -> WorkloadResult<()> {
        copy_contiguous::<T>(&self.base, io)
    }
}

/// Copies a network tensor out to caller memory.
#[derive(Debug)]
pub struct RefOutputWorkload<T: DataTypeMarker> {
    base: RefBase,
    _marker: PhantomData<T>,
}

impl<T: DataTypeMarker> RefOutputWorkload<T> {
    pub fn new(descriptor: &WorkloadDescriptor) -> WorkloadResult<Self> {
        let base = RefBase::new::<T>(OperationKind::Output, descriptor)?;
        check_element_counts(&base)?;
        Ok(Self {
            base,
            _marker: PhantomData,
        })
    }
}

impl<T: DataTypeMarker> Workload for RefOutputWorkload<T> {
    ref_workload_accessors!();

    fn execute(&self, io: &mut WorkloadIo<'_>) -> WorkloadResult<()> {
        copy_contiguous::<T>(&self.base, io)
    }
}

/// Reshape: row-major data is unchanged, only the shape differs.
#[derive(Debug)]
pub struct RefReshapeWorkload<T: DataTypeMarker> {
    base: RefBase,
    _marker: PhantomData<T>,
}

impl<T: DataTypeMarker> RefReshapeWorkload<T> {
    pub fn new(descriptor: &WorkloadDescriptor) -> WorkloadResult<Self> {
        let base = RefBase::new::<T>(OperationKind::Reshape, descriptor)?;
        check_element_counts(&base)?;
        if let Operation::Reshape(reshape) = &base.descriptor.operation {
            if reshape.target_shape != *base.descriptor.outputs[0].descriptor.shape() {
                return Err(base.invalid(format!(
                    "target shape {} differs from output {}",
                    reshape.target_shape, base.descriptor.outputs[0].descriptor
                )));
            }
        }
        Ok(Self {
            base,
            _marker: PhantomData,
        })
    }
}

impl<T: DataTypeMarker> Workload for RefReshapeWorkload<T> {
    ref_workload_accessors!();

    fn execute(&self, io: &mut WorkloadIo<'_>) -> WorkloadResult<()> {
        copy_contiguous::<T>(&self.base, io)
    }
}
