use std::fmt;

use half::{bf16, f16};
use serde::{Deserialize, Serialize};

/// Enumerates the numeric element types a tensor descriptor can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DataType {
    Float16,
    Float32,
    BFloat16,
    /// Asymmetric quantized unsigned 8-bit (scale + zero point).
    QAsymmU8,
    /// Asymmetric quantized signed 8-bit (scale + zero point).
    QAsymmS8,
    /// Symmetric quantized signed 8-bit (scale, zero point fixed at 0).
    QSymmS8,
    /// Symmetric quantized signed 16-bit (scale, zero point fixed at 0).
    QSymmS16,
    Signed32,
    Signed64,
    Boolean,
}

impl DataType {
    pub const ALL: [DataType; 10] = [
        DataType::Float16,
        DataType::Float32,
        DataType::BFloat16,
        DataType::QAsymmU8,
        DataType::QAsymmS8,
        DataType::QSymmS8,
        DataType::QSymmS16,
        DataType::Signed32,
        DataType::Signed64,
        DataType::Boolean,
    ];

    /// Returns `true` for the quantized variants, which require quantization info.
    pub fn is_quantized(self) -> bool {
        matches!(
            self,
            DataType::QAsymmU8 | DataType::QAsymmS8 | DataType::QSymmS8 | DataType::QSymmS16
        )
    }

    /// Returns `true` for quantized types whose zero point must be 0.
    pub fn is_symmetric(self) -> bool {
        matches!(self, DataType::QSymmS8 | DataType::QSymmS16)
    }

    pub fn is_float(self) -> bool {
        matches!(
            self,
            DataType::Float16 | DataType::Float32 | DataType::BFloat16
        )
    }

    /// Native storage backing one element of this type.
    pub fn storage(self) -> StorageKind {
        match self {
            DataType::Float16 => StorageKind::F16,
            DataType::Float32 => StorageKind::F32,
            DataType::BFloat16 => StorageKind::Bf16,
            DataType::QAsymmU8 | DataType::Boolean => StorageKind::U8,
            DataType::QAsymmS8 | DataType::QSymmS8 => StorageKind::I8,
            DataType::QSymmS16 => StorageKind::I16,
            DataType::Signed32 => StorageKind::I32,
            DataType::Signed64 => StorageKind::I64,
        }
    }

    pub fn size_in_bytes(self) -> usize {
        self.storage().size_in_bytes()
    }

    /// Identifier used in generated workload names (`RefPermuteFloat32Workload`).
    pub fn name(self) -> &'static str {
        match self {
            DataType::Float16 => "Float16",
            DataType::Float32 => "Float32",
            DataType::BFloat16 => "BFloat16",
            DataType::QAsymmU8 => "QAsymmU8",
            DataType::QAsymmS8 => "QAsymmS8",
            DataType::QSymmS8 => "QSymmS8",
            DataType::QSymmS16 => "QSymmS16",
            DataType::Signed32 => "Signed32",
            DataType::Signed64 => "Signed64",
            DataType::Boolean => "Boolean",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            DataType::Float16 => "16-bit float",
            DataType::Float32 => "32-bit float",
            DataType::BFloat16 => "16-bit brain float",
            DataType::QAsymmU8 => "asymmetric quantized unsigned 8-bit",
            DataType::QAsymmS8 => "asymmetric quantized signed 8-bit",
            DataType::QSymmS8 => "symmetric quantized signed 8-bit",
            DataType::QSymmS16 => "symmetric quantized signed 16-bit",
            DataType::Signed32 => "signed 32-bit integer",
            DataType::Signed64 => "signed 64-bit integer",
            DataType::Boolean => "boolean",
        };
        f.write_str(text)
    }
}

/// Native element representation shared by one or more [`DataType`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKind {
    F16,
    F32,
    Bf16,
    U8,
    I8,
    I16,
    I32,
    I64,
}

impl StorageKind {
    pub fn size_in_bytes(self) -> usize {
        match self {
            StorageKind::U8 | StorageKind::I8 => 1,
            StorageKind::F16 | StorageKind::Bf16 | StorageKind::I16 => 2,
            StorageKind::F32 | StorageKind::I32 => 4,
            StorageKind::I64 => 8,
        }
    }
}

/// Compile-time tag for a [`DataType`].
///
/// Workloads are generic over a marker so every numeric type gets its own
/// monomorphized implementation; nothing switches on the data type while executing.
pub trait DataTypeMarker: Send + Sync + 'static {
    const DATA_TYPE: DataType;
    type Storage: super::memory::Storage;
}

macro_rules! data_type_markers {
    ($($marker:ident => $storage:ty),+ $(,)?) => {
        $(
            #[derive(Debug, Clone, Copy, Default)]
            pub struct $marker;

            impl DataTypeMarker for $marker {
                const DATA_TYPE: DataType = DataType::$marker;
                type Storage = $storage;
            }
        )+
    };
}

/// Marker types, one per [`DataType`] variant.
pub mod markers {
    use super::{bf16, f16, DataType, DataTypeMarker};

    data_type_markers! {
        Float16 => f16,
        Float32 => f32,
        BFloat16 => bf16,
        QAsymmU8 => u8,
        QAsymmS8 => i8,
        QSymmS8 => i8,
        QSymmS16 => i16,
        Signed32 => i32,
        Signed64 => i64,
        Boolean => u8,
    }
}
