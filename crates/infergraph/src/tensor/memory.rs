//! Borrowed and owned tensor memory.
//!
//! Caller-supplied tensors cross the execution boundary as borrowed slices
//! ([`TensorView`] / [`TensorViewMut`]) that are valid for a single
//! `execute()` call. Intermediate tensors live in network-owned
//! [`TensorBuffer`]s allocated once at load time.

use half::{bf16, f16};

use super::descriptor::{DescriptorError, DescriptorResult, TensorDescriptor};
use super::dtype::StorageKind;

/// Native element type that can back tensor memory.
pub trait Storage: Copy + Default + Send + Sync + 'static {
    const KIND: StorageKind;

    fn view<'a>(view: &TensorView<'a>) -> Option<&'a [Self]>;
    fn view_mut<'s>(view: &'s mut TensorViewMut<'_>) -> Option<&'s mut [Self]>;
    fn wrap(values: &[Self]) -> TensorView<'_>;
    fn wrap_mut(values: &mut [Self]) -> TensorViewMut<'_>;
    fn buffer(len: usize) -> TensorBuffer;
}

macro_rules! storage_variants {
    ($($variant:ident => $ty:ty),+ $(,)?) => {
        /// Read-only borrowed tensor memory.
        #[derive(Debug, Clone, Copy)]
        pub enum TensorView<'a> {
            $($variant(&'a [$ty]),)+
        }

        /// Mutable borrowed tensor memory.
        #[derive(Debug)]
        pub enum TensorViewMut<'a> {
            $($variant(&'a mut [$ty]),)+
        }

        /// Network-owned tensor memory.
        #[derive(Debug, Clone, PartialEq)]
        pub enum TensorBuffer {
            $($variant(Vec<$ty>),)+
        }

        impl<'a> TensorView<'a> {
            pub fn storage(&self) -> StorageKind {
                match self {
                    $(TensorView::$variant(_) => StorageKind::$variant,)+
                }
            }

            pub fn len(&self) -> usize {
                match self {
                    $(TensorView::$variant(values) => values.len(),)+
                }
            }

            pub fn is_empty(&self) -> bool {
                self.len() == 0
            }
        }

        impl<'a> TensorViewMut<'a> {
            pub fn storage(&self) -> StorageKind {
                match self {
                    $(TensorViewMut::$variant(_) => StorageKind::$variant,)+
                }
            }

            pub fn len(&self) -> usize {
                match self {
                    $(TensorViewMut::$variant(values) => values.len(),)+
                }
            }

            pub fn is_empty(&self) -> bool {
                self.len() == 0
            }

            /// Reborrows the memory for a shorter lifetime.
            pub fn reborrow(&mut self) -> TensorViewMut<'_> {
                match self {
                    $(TensorViewMut::$variant(values) => TensorViewMut::$variant(&mut **values),)+
                }
            }

            pub fn as_view(&self) -> TensorView<'_> {
                match self {
                    $(TensorViewMut::$variant(values) => TensorView::$variant(&**values),)+
                }
            }
        }

        impl TensorBuffer {
            /// Zero-initialised buffer for `len` elements of the given storage.
            pub fn zeroed(storage: StorageKind, len: usize) -> Self {
                match storage {
                    $(StorageKind::$variant => <$ty as Storage>::buffer(len),)+
                }
            }

            pub fn storage(&self) -> StorageKind {
                match self {
                    $(TensorBuffer::$variant(_) => StorageKind::$variant,)+
                }
            }

            pub fn len(&self) -> usize {
                match self {
                    $(TensorBuffer::$variant(values) => values.len(),)+
                }
            }

            pub fn is_empty(&self) -> bool {
                self.len() == 0
            }

            pub fn as_view(&self) -> TensorView<'_> {
                match self {
                    $(TensorBuffer::$variant(values) => TensorView::$variant(values),)+
                }
            }

            /// Moves the elements out, leaving an empty buffer of the same storage.
            pub(crate) fn take(&mut self) -> Self {
                match self {
                    $(TensorBuffer::$variant(values) => TensorBuffer::$variant(std::mem::take(values)),)+
                }
            }

            pub fn as_view_mut(&mut self) -> TensorViewMut<'_> {
                match self {
                    $(TensorBuffer::$variant(values) => TensorViewMut::$variant(values),)+
                }
            }
        }

        $(
            impl Storage for $ty {
                const KIND: StorageKind = StorageKind::$variant;

                fn view<'a>(view: &TensorView<'a>) -> Option<&'a [Self]> {
                    match *view {
                        TensorView::$variant(values) => Some(values),
                        #[allow(unreachable_patterns)]
                        _ => None,
                    }
                }

                fn view_mut<'s>(view: &'s mut TensorViewMut<'_>) -> Option<&'s mut [Self]> {
                    match view {
                        TensorViewMut::$variant(values) => Some(&mut **values),
                        #[allow(unreachable_patterns)]
                        _ => None,
                    }
                }

                fn wrap(values: &[Self]) -> TensorView<'_> {
                    TensorView::$variant(values)
                }

                fn wrap_mut(values: &mut [Self]) -> TensorViewMut<'_> {
                    TensorViewMut::$variant(values)
                }

                fn buffer(len: usize) -> TensorBuffer {
                    TensorBuffer::$variant(vec![<$ty>::default(); len])
                }
            }
        )+
    };
}

storage_variants! {
    F16 => f16,
    F32 => f32,
    Bf16 => bf16,
    U8 => u8,
    I8 => i8,
    I16 => i16,
    I32 => i32,
    I64 => i64,
}

impl<'a, T: Storage> From<&'a [T]> for TensorView<'a> {
    fn from(values: &'a [T]) -> Self {
        T::wrap(values)
    }
}

impl<'a, T: Storage> From<&'a mut [T]> for TensorViewMut<'a> {
    fn from(values: &'a mut [T]) -> Self {
        T::wrap_mut(values)
    }
}

fn check_memory(
    descriptor: &TensorDescriptor,
    storage: StorageKind,
    len: usize,
) -> DescriptorResult<()> {
    if descriptor.data_type().storage() != storage {
        return Err(DescriptorError::StorageMismatch {
            data_type: descriptor.data_type(),
            actual: storage,
        });
    }
    if descriptor.num_elements() != len {
        return Err(DescriptorError::LengthMismatch {
            expected: descriptor.num_elements(),
            actual: len,
        });
    }
    Ok(())
}

/// Caller-owned input tensor: a descriptor plus read-only memory.
#[derive(Debug, Clone)]
pub struct ConstTensor<'a> {
    descriptor: TensorDescriptor,
    memory: TensorView<'a>,
}

impl<'a> ConstTensor<'a> {
    pub fn new(
        descriptor: TensorDescriptor,
        memory: impl Into<TensorView<'a>>,
    ) -> DescriptorResult<Self> {
        let memory = memory.into();
        check_memory(&descriptor, memory.storage(), memory.len())?;
        Ok(Self { descriptor, memory })
    }

    pub fn descriptor(&self) -> &TensorDescriptor {
        &self.descriptor
    }

    pub fn memory(&self) -> TensorView<'a> {
        self.memory
    }
}

/// Caller-owned output tensor: a descriptor plus writable memory.
#[derive(Debug)]
pub struct Tensor<'a> {
    descriptor: TensorDescriptor,
    memory: TensorViewMut<'a>,
}

impl<'a> Tensor<'a> {
    pub fn new(
        descriptor: TensorDescriptor,
        memory: impl Into<TensorViewMut<'a>>,
    ) -> DescriptorResult<Self> {
        let memory = memory.into();
        check_memory(&descriptor, memory.storage(), memory.len())?;
        Ok(Self { descriptor, memory })
    }

    pub fn descriptor(&self) -> &TensorDescriptor {
        &self.descriptor
    }

    pub fn memory_mut(&mut self) -> TensorViewMut<'_> {
        self.memory.reborrow()
    }
}
