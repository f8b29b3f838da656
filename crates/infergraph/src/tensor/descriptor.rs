use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::dtype::DataType;

/// Errors raised while constructing descriptors or binding memory to them.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DescriptorError {
    #[error("tensor shape must have at least one dimension")]
    EmptyShape,
    #[error("dimension {axis} of shape {shape:?} must be positive")]
    ZeroDimension { axis: usize, shape: Vec<usize> },
    #[error("element count of shape {shape:?} overflows usize")]
    ElementCountOverflow { shape: Vec<usize> },
    #[error("data type {data_type:?} requires quantization info")]
    MissingQuantization { data_type: DataType },
    #[error("data type {data_type:?} does not carry quantization info")]
    UnexpectedQuantization { data_type: DataType },
    #[error("symmetric data type {data_type:?} requires a zero offset, got {offset}")]
    NonZeroSymmetricOffset { data_type: DataType, offset: i32 },
    #[error("quantization scale must be finite and positive, got {scale}")]
    InvalidScale { scale: f32 },
    #[error("memory holds {actual} elements but the descriptor expects {expected}")]
    LengthMismatch { expected: usize, actual: usize },
    #[error("memory storage {actual:?} cannot back data type {data_type:?}")]
    StorageMismatch {
        data_type: DataType,
        actual: super::dtype::StorageKind,
    },
}

pub type DescriptorResult<T> = Result<T, DescriptorError>;

/// Ordered list of positive dimension sizes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<usize>", into = "Vec<usize>")]
pub struct TensorShape {
    dims: Vec<usize>,
    num_elements: usize,
}

impl TensorShape {
    pub fn new(dims: impl Into<Vec<usize>>) -> DescriptorResult<Self> {
        let dims = dims.into();
        if dims.is_empty() {
            return Err(DescriptorError::EmptyShape);
        }
        let mut num_elements = 1usize;
        for (axis, &dim) in dims.iter().enumerate() {
            if dim == 0 {
                return Err(DescriptorError::ZeroDimension {
                    axis,
                    shape: dims.clone(),
                });
            }
            num_elements = num_elements
                .checked_mul(dim)
                .ok_or_else(|| DescriptorError::ElementCountOverflow { shape: dims.clone() })?;
        }
        Ok(Self { dims, num_elements })
    }

    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    pub fn num_elements(&self) -> usize {
        self.num_elements
    }
}

impl TryFrom<Vec<usize>> for TensorShape {
    type Error = DescriptorError;

    fn try_from(dims: Vec<usize>) -> Result<Self, Self::Error> {
        TensorShape::new(dims)
    }
}

impl From<TensorShape> for Vec<usize> {
    fn from(shape: TensorShape) -> Self {
        shape.dims
    }
}

impl fmt::Display for TensorShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dims = self
            .dims
            .iter()
            .map(|dim| dim.to_string())
            .collect::<Vec<_>>()
            .join("x");
        write!(f, "[{dims}]")
    }
}

/// Affine quantization parameters: `real = scale * (quantized - offset)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuantizationInfo {
    pub scale: f32,
    pub offset: i32,
}

impl QuantizationInfo {
    pub fn new(scale: f32, offset: i32) -> Self {
        Self { scale, offset }
    }

    pub fn symmetric(scale: f32) -> Self {
        Self { scale, offset: 0 }
    }
}

/// Immutable shape + numeric type + quantization metadata attached to an edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawTensorDescriptor", into = "RawTensorDescriptor")]
pub struct TensorDescriptor {
    shape: TensorShape,
    data_type: DataType,
    quantization: Option<QuantizationInfo>,
}

impl TensorDescriptor {
    /// Builds a descriptor, enforcing that quantization info is present iff the type is quantized.
    pub fn new(
        shape: TensorShape,
        data_type: DataType,
        quantization: Option<QuantizationInfo>,
    ) -> DescriptorResult<Self> {
        match (data_type.is_quantized(), quantization) {
            (true, None) => return Err(DescriptorError::MissingQuantization { data_type }),
            (false, Some(_)) => return Err(DescriptorError::UnexpectedQuantization { data_type }),
            (true, Some(info)) => {
                if !info.scale.is_finite() || info.scale <= 0.0 {
                    return Err(DescriptorError::InvalidScale { scale: info.scale });
                }
                if data_type.is_symmetric() && info.offset != 0 {
                    return Err(DescriptorError::NonZeroSymmetricOffset {
                        data_type,
                        offset: info.offset,
                    });
                }
            }
            (false, None) => {}
        }
        Ok(Self {
            shape,
            data_type,
            quantization,
        })
    }

    /// Convenience constructor for non-quantized types.
    pub fn from_dims(dims: impl Into<Vec<usize>>, data_type: DataType) -> DescriptorResult<Self> {
        Self::new(TensorShape::new(dims)?, data_type, None)
    }

    /// Convenience constructor for quantized types.
    pub fn quantized(
        dims: impl Into<Vec<usize>>,
        data_type: DataType,
        quantization: QuantizationInfo,
    ) -> DescriptorResult<Self> {
        Self::new(TensorShape::new(dims)?, data_type, Some(quantization))
    }

    pub fn shape(&self) -> &TensorShape {
        &self.shape
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn quantization(&self) -> Option<QuantizationInfo> {
        self.quantization
    }

    pub fn num_elements(&self) -> usize {
        self.shape.num_elements()
    }

    pub fn num_bytes(&self) -> usize {
        self.num_elements() * self.data_type.size_in_bytes()
    }

    /// Same type and quantization with a different shape.
    pub fn with_shape(&self, shape: TensorShape) -> Self {
        Self {
            shape,
            data_type: self.data_type,
            quantization: self.quantization,
        }
    }
}

impl fmt::Display for TensorDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.data_type.name(), self.shape)?;
        if let Some(info) = self.quantization {
            write!(f, " (scale={}, offset={})", info.scale, info.offset)?;
        }
        Ok(())
    }
}

#[derive(Serialize, Deserialize)]
struct RawTensorDescriptor {
    shape: TensorShape,
    data_type: DataType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    quantization: Option<QuantizationInfo>,
}

impl TryFrom<RawTensorDescriptor> for TensorDescriptor {
    type Error = DescriptorError;

    fn try_from(raw: RawTensorDescriptor) -> Result<Self, Self::Error> {
        TensorDescriptor::new(raw.shape, raw.data_type, raw.quantization)
    }
}

impl From<TensorDescriptor> for RawTensorDescriptor {
    fn from(desc: TensorDescriptor) -> Self {
        RawTensorDescriptor {
            shape: desc.shape,
            data_type: desc.data_type,
            quantization: desc.quantization,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn element_count_is_product_of_shape() {
        let desc = TensorDescriptor::from_dims([1, 2, 3, 1], DataType::Float32).unwrap();
        assert_eq!(desc.num_elements(), 6);
        assert_eq!(desc.num_bytes(), 24);
        assert_eq!(desc.to_string(), "Float32:[1x2x3x1]");
    }

    #[test]
    fn zero_dimension_is_rejected() {
        let err = TensorShape::new([2, 0, 3]).unwrap_err();
        assert!(matches!(err, DescriptorError::ZeroDimension { axis: 1, .. }));
    }

    #[test]
    fn quantization_present_iff_quantized() {
        assert!(matches!(
            TensorDescriptor::from_dims([4], DataType::QAsymmU8),
            Err(DescriptorError::MissingQuantization { .. })
        ));
        let shape = TensorShape::new([4]).unwrap();
        assert!(matches!(
            TensorDescriptor::new(shape, DataType::Float32, Some(QuantizationInfo::new(0.5, 1))),
            Err(DescriptorError::UnexpectedQuantization { .. })
        ));
        assert!(matches!(
            TensorDescriptor::quantized([4], DataType::QSymmS16, QuantizationInfo::new(0.5, 3)),
            Err(DescriptorError::NonZeroSymmetricOffset { offset: 3, .. })
        ));
        let ok =
            TensorDescriptor::quantized([4], DataType::QAsymmU8, QuantizationInfo::new(0.5, 128))
                .unwrap();
        assert_eq!(ok.quantization(), Some(QuantizationInfo::new(0.5, 128)));
    }

    #[test]
    fn serde_rejects_invalid_descriptors() {
        let json = r#"{"shape":[2,3],"data_type":"QAsymmS8"}"#;
        assert!(serde_json::from_str::<TensorDescriptor>(json).is_err());

        let json = r#"{"shape":[2,3],"data_type":"QAsymmS8","quantization":{"scale":0.25,"offset":-3}}"#;
        let desc: TensorDescriptor = serde_json::from_str(json).unwrap();
        assert_eq!(desc.shape().dims(), &[2, 3]);
    }
}
