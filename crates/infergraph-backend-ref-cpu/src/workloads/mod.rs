//! Reference workloads, one monomorphized type per (operation, data type).

mod addition;
mod copy;
mod permute;

pub use addition::{ElementAdd, RefAdditionWorkload};
pub use copy::{RefInputWorkload, RefOutputWorkload, RefReshapeWorkload};
pub use permute::{RefPermuteWorkload, RefTransposeWorkload};

use infergraph::graph::OperationKind;
use infergraph::tensor::{markers, DataType, DataTypeMarker};
use infergraph::workload::{
    workload_name, WorkloadDescriptor, WorkloadError, WorkloadKey, WorkloadRegistry,
    WorkloadResult,
};
use infergraph::BackendId;

/// Name, data type and descriptor shared by every reference workload.
#[derive(Debug, Clone)]
pub(crate) struct RefBase {
    pub(crate) name: String,
    pub(crate) data_type: DataType,
    pub(crate) descriptor: WorkloadDescriptor,
}

impl RefBase {
    /// Checks arity and that every bound tensor has type `T`.
    pub(crate) fn new<T: DataTypeMarker>(
        kind: OperationKind,
        descriptor: &WorkloadDescriptor,
    ) -> WorkloadResult<Self> {
        let name = workload_name("Ref", kind, T::DATA_TYPE);
        if descriptor.operation.kind() != kind {
            return Err(WorkloadError::InvalidDescriptor {
                workload: name,
                reason: format!("descriptor is for a {} node", descriptor.operation.kind()),
            });
        }
        descriptor.check_arity(&name)?;
        let mismatched = descriptor
            .inputs
            .iter()
            .chain(&descriptor.outputs)
            .find(|binding| binding.descriptor.data_type() != T::DATA_TYPE);
        if let Some(binding) = mismatched {
            return Err(WorkloadError::InvalidDescriptor {
                workload: name,
                reason: format!(
                    "tensor {} does not have type {:?}",
                    binding.descriptor,
                    T::DATA_TYPE
                ),
            });
        }
        Ok(Self {
            name,
            data_type: T::DATA_TYPE,
            descriptor: descriptor.clone(),
        })
    }

    pub(crate) fn describe(&self) -> String {
        format!("reference {}, {}", self.descriptor.operation.kind(), self.data_type)
    }

    pub(crate) fn invalid(&self, reason: impl Into<String>) -> WorkloadError {
        WorkloadError::InvalidDescriptor {
            workload: self.name.clone(),
            reason: reason.into(),
        }
    }

    pub(crate) fn failed(&self, reason: impl Into<String>) -> WorkloadError {
        WorkloadError::Execution {
            workload: self.name.clone(),
            reason: reason.into(),
        }
    }
}

/// Implements the `Workload` accessors every reference workload shares.
macro_rules! ref_workload_accessors {
    () => {
        fn name(&self) -> &str {
            &self.base.name
        }

        fn describe(&self) -> String {
            self.base.describe()
        }

        fn data_type(&self) -> infergraph::tensor::DataType {
            self.base.data_type
        }

        fn descriptor(&self) -> &infergraph::workload::WorkloadDescriptor {
            &self.base.descriptor
        }
    };
}
pub(crate) use ref_workload_accessors;

macro_rules! register_for {
    ($registry:ident, $backend:ident, $kind:expr, $ctor:ident, [$($marker:ident),+ $(,)?]) => {
        $(
            $registry.register(
                WorkloadKey::new($kind, $backend.clone(), <markers::$marker as DataTypeMarker>::DATA_TYPE),
                $ctor::<markers::$marker>,
            );
        )+
    };
}

/// Registers every reference workload under `backend`.
pub(crate) fn register_all(registry: &mut WorkloadRegistry, backend: &BackendId) {
    register_for!(registry, backend, OperationKind::Input, create_input, [
        Float16, Float32, BFloat16, QAsymmU8, QAsymmS8, QSymmS8, QSymmS16, Signed32, Signed64,
        Boolean,
    ]);
    register_for!(registry, backend, OperationKind::Output, create_output, [
        Float16, Float32, BFloat16, QAsymmU8, QAsymmS8, QSymmS8, QSymmS16, Signed32, Signed64,
        Boolean,
    ]);
    register_for!(registry, backend, OperationKind::Reshape, create_reshape, [
        Float16, Float32, BFloat16, QAsymmU8, QAsymmS8, QSymmS8, QSymmS16, Signed32, Signed64,
        Boolean,
    ]);
    register_for!(registry, backend, OperationKind::Permute, create_permute, [
        BFloat16, Float16, Float32, QAsymmS8, QAsymmU8, QSymmS16,
    ]);
    register_for!(registry, backend, OperationKind::Transpose, create_transpose, [
        BFloat16, Float16, Float32, QAsymmS8, QAsymmU8, QSymmS16,
    ]);
    register_for!(registry, backend, OperationKind::Addition, create_addition, [
        Float32, Float16, Signed32,
    ]);
}

fn create_input<T: DataTypeMarker>(
    descriptor: &WorkloadDescriptor,
) -> WorkloadResult<Box<dyn infergraph::Workload>> {
    Ok(Box::new(RefInputWorkload::<T>::new(descriptor)?))
}

fn create_output<T: DataTypeMarker>(
    descriptor: &WorkloadDescriptor,
) -> WorkloadResult<Box<dyn infergraph::Workload>> {
    Ok(Box::new(RefOutputWorkload::<T>::new(descriptor)?))
}

fn create_reshape<T: DataTypeMarker>(
    descriptor: &WorkloadDescriptor,
) -> WorkloadResult<Box<dyn infergraph::Workload>> {
    Ok(Box::new(RefReshapeWorkload::<T>::new(descriptor)?))
}

fn create_permute<T: DataTypeMarker>(
    descriptor: &WorkloadDescriptor,
) -> WorkloadResult<Box<dyn infergraph::Workload>> {
    Ok(Box::new(RefPermuteWorkload::<T>::new(descriptor)?))
}

fn create_transpose<T: DataTypeMarker>(
    descriptor: &WorkloadDescriptor,
) -> WorkloadResult<Box<dyn infergraph::Workload>> {
    Ok(Box::new(RefTransposeWorkload::<T>::new(descriptor)?))
}

fn create_addition<T>(descriptor: &WorkloadDescriptor) -> WorkloadResult<Box<dyn infergraph::Workload>>
where
    T: DataTypeMarker,
    T::Storage: ElementAdd,
{
    Ok(Box::new(RefAdditionWorkload::<T>::new(descriptor)?))
}
