use std::fmt;

use serde::{Deserialize, Serialize};

use crate::tensor::{DescriptorResult, TensorShape};

/// Identifier a caller uses to bind a boundary tensor, assigned when the graph is built.
pub type LayerBindingId = i32;

/// Axis permutation shared by permute and transpose descriptors.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<usize>", into = "Vec<usize>")]
pub struct PermutationVector(Vec<usize>);

impl PermutationVector {
    /// Returns `None` unless `axes` is a permutation of `0..axes.len()`.
    pub fn new(axes: impl Into<Vec<usize>>) -> Option<Self> {
        let axes = axes.into();
        let mut seen = vec![false; axes.len()];
        for &axis in &axes {
            if axis >= axes.len() || std::mem::replace(&mut seen[axis], true) {
                return None;
            }
        }
        Some(Self(axes))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.0
    }

    pub fn is_identity(&self) -> bool {
        self.0.iter().copied().eq(0..self.0.len())
    }

    pub fn inverse(&self) -> Self {
        let mut inverse = vec![0; self.0.len()];
        for (index, &axis) in self.0.iter().enumerate() {
            inverse[axis] = index;
        }
        Self(inverse)
    }
}

impl TryFrom<Vec<usize>> for PermutationVector {
    type Error = String;

    fn try_from(axes: Vec<usize>) -> Result<Self, Self::Error> {
        Self::new(axes.clone()).ok_or_else(|| format!("{axes:?} is not a permutation"))
    }
}

impl From<PermutationVector> for Vec<usize> {
    fn from(permutation: PermutationVector) -> Self {
        permutation.0
    }
}

impl std::ops::Index<usize> for PermutationVector {
    type Output = usize;

    fn index(&self, index: usize) -> &usize {
        &self.0[index]
    }
}

/// Permute parameters: input axis `i` is moved to output axis `mappings[i]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PermuteDescriptor {
    pub mappings: PermutationVector,
}

impl PermuteDescriptor {
    pub fn new(mappings: PermutationVector) -> Self {
        Self { mappings }
    }

    pub fn output_shape(&self, input: &TensorShape) -> Option<DescriptorResult<TensorShape>> {
        if input.rank() != self.mappings.len() {
            return None;
        }
        let mut dims = vec![0; input.rank()];
        for (axis, &dim) in input.dims().iter().enumerate() {
            dims[self.mappings[axis]] = dim;
        }
        Some(TensorShape::new(dims))
    }
}

/// Transpose parameters: output axis `j` reads input axis `permutation[j]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransposeDescriptor {
    pub permutation: PermutationVector,
}

impl TransposeDescriptor {
    pub fn new(permutation: PermutationVector) -> Self {
        Self { permutation }
    }

    pub fn output_shape(&self, input: &TensorShape) -> Option<DescriptorResult<TensorShape>> {
        if input.rank() != self.permutation.len() {
            return None;
        }
        let dims = self
            .permutation
            .as_slice()
            .iter()
            .map(|&axis| input.dims()[axis])
            .collect::<Vec<_>>();
        Some(TensorShape::new(dims))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReshapeDescriptor {
    pub target_shape: TensorShape,
}

impl ReshapeDescriptor {
    pub fn new(target_shape: TensorShape) -> Self {
        Self { target_shape }
    }
}

/// Typed operation carried by a graph node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Operation {
    Input { binding_id: LayerBindingId },
    Output { binding_id: LayerBindingId },
    Permute(PermuteDescriptor),
    Transpose(TransposeDescriptor),
    Reshape(ReshapeDescriptor),
    Addition,
}

impl Operation {
    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::Input { .. } => OperationKind::Input,
            Operation::Output { .. } => OperationKind::Output,
            Operation::Permute(_) => OperationKind::Permute,
            Operation::Transpose(_) => OperationKind::Transpose,
            Operation::Reshape(_) => OperationKind::Reshape,
            Operation::Addition => OperationKind::Addition,
        }
    }
}

/// Parameter-free operation discriminant used for workload dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum OperationKind {
    Input,
    Output,
    Permute,
    Transpose,
    Reshape,
    Addition,
}

impl OperationKind {
    pub fn num_inputs(self) -> usize {
        match self {
            OperationKind::Input => 0,
            OperationKind::Addition => 2,
            _ => 1,
        }
    }

    pub fn num_outputs(self) -> usize {
        match self {
            OperationKind::Output => 0,
            _ => 1,
        }
    }

    /// Identifier used in generated workload names (`RefPermuteFloat32Workload`).
    pub fn name(self) -> &'static str {
        match self {
            OperationKind::Input => "Input",
            OperationKind::Output => "Output",
            OperationKind::Permute => "Permute",
            OperationKind::Transpose => "Transpose",
            OperationKind::Reshape => "Reshape",
            OperationKind::Addition => "Addition",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name().to_ascii_lowercase())
    }
}
