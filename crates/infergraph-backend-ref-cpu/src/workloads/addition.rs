use std::marker::PhantomData;

use half::f16;
use infergraph::graph::OperationKind;
use infergraph::tensor::{DataTypeMarker, Storage};
use infergraph::workload::{Workload, WorkloadDescriptor, WorkloadIo, WorkloadResult};

use super::{ref_workload_accessors, RefBase};

/// Element types the reference addition is defined for.
pub trait ElementAdd: Storage {
    fn add(self, rhs: Self) -> Self;
}

impl ElementAdd for f32 {
    fn add(self, rhs: Self) -> Self {
        self + rhs
    }
}

impl ElementAdd for f16 {
    fn add(self, rhs: Self) -> Self {
        self + rhs
    }
}

impl ElementAdd for i32 {
    fn add(self, rhs: Self) -> Self {
        self.wrapping_add(rhs)
    }
}

/// Elementwise sum of two tensors with identical shapes.
#[derive(Debug)]
pub struct RefAdditionWorkload<T: DataTypeMarker> {
    base: RefBase,
    _marker: PhantomData<T>,
}

impl<T> RefAdditionWorkload<T>
where
    T: DataTypeMarker,
    T::Storage: ElementAdd,
{
    pub fn new(descriptor: &WorkloadDescriptor) -> WorkloadResult<Self> {
        let base = RefBase::new::<T>(OperationKind::Addition, descriptor)?;
        let shapes = [
            base.descriptor.inputs[0].descriptor.shape(),
            base.descriptor.inputs[1].descriptor.shape(),
            base.descriptor.outputs[0].descriptor.shape(),
        ];
        if shapes[0] != shapes[1] || shapes[0] != shapes[2] {
            return Err(base.invalid(format!(
                "operands {} and {} cannot produce {}",
                shapes[0], shapes[1], shapes[2]
            )));
        }
        Ok(Self {
            base,
            _marker: PhantomData,
        })
    }
}

impl<T> Workload for RefAdditionWorkload<T>
where
    T: DataTypeMarker,
    T::Storage: ElementAdd,
{
    ref_workload_accessors!();

    fn execute(&self, io: &mut WorkloadIo<'_>) -> WorkloadResult<()> {
        let lhs = io.typed_input::<T::Storage>(&self.base.name, 0)?;
        let rhs = io.typed_input::<T::Storage>(&self.base.name, 1)?;
        let out = io.typed_output::<T::Storage>(&self.base.name, 0)?;
        if lhs.len() != out.len() || rhs.len() != out.len() {
            return Err(self.base.failed(format!(
                "operand lengths {} and {} do not match output {}",
                lhs.len(),
                rhs.len(),
                out.len()
            )));
        }
        for ((slot, &a), &b) in out.iter_mut().zip(lhs).zip(rhs) {
            *slot = a.add(b);
        }
        Ok(())
    }
}
