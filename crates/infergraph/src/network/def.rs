use std::collections::HashMap;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::graph::{Graph, GraphError, GraphResult, InputSlot, Operation, OutputSlot};
use crate::tensor::TensorDescriptor;

/// Reference to output `slot` of the layer called `layer`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotRefDef {
    pub layer: String,
    #[serde(default)]
    pub slot: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerDef {
    pub name: String,
    pub operation: Operation,
    /// Producers of each input slot, in slot order.
    #[serde(default)]
    pub inputs: Vec<SlotRefDef>,
    /// Descriptor of each output slot, in slot order.
    #[serde(default)]
    pub outputs: Vec<TensorDescriptor>,
}

/// Serializable network definition; layers may appear in any order.
///
/// ```json
/// { "layers": [
///   { "name": "input", "operation": { "kind": "input", "binding_id": 0 },
///     "outputs": [ { "shape": [1, 2, 3, 1], "data_type": "Float32" } ] },
///   { "name": "transpose", "operation": { "kind": "transpose", "permutation": [0, 3, 1, 2] },
///     "inputs": [ { "layer": "input" } ],
///     "outputs": [ { "shape": [1, 1, 2, 3], "data_type": "Float32" } ] },
///   { "name": "output", "operation": { "kind": "output", "binding_id": 0 },
///     "inputs": [ { "layer": "transpose" } ] }
/// ] }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkDef {
    pub layers: Vec<LayerDef>,
}

impl NetworkDef {
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        let def: NetworkDef =
            serde_json::from_str(json).context("failed to parse network definition")?;
        Ok(def)
    }

    pub fn to_json(&self) -> anyhow::Result<String> {
        serde_json::to_string_pretty(self).context("failed to serialize network definition")
    }

    /// Builds the graph: nodes are added in layer order, then wired by name.
    pub fn build(&self) -> GraphResult<Graph> {
        let mut graph = Graph::new();
        let mut ids = HashMap::with_capacity(self.layers.len());
        for layer in &self.layers {
            let id = graph.add_node(layer.operation.clone(), layer.name.clone());
            if ids.insert(layer.name.as_str(), id).is_some() {
                return Err(GraphError::DuplicateLayerName(layer.name.clone()));
            }

            let node = graph.try_node(id)?;
            if layer.outputs.len() != node.num_outputs() || layer.inputs.len() != node.num_inputs()
            {
                return Err(GraphError::InvalidOperation {
                    node: id,
                    name: layer.name.clone(),
                    reason: format!(
                        "{} takes {} inputs and {} outputs, layer lists {} and {}",
                        node.kind(),
                        node.num_inputs(),
                        node.num_outputs(),
                        layer.inputs.len(),
                        layer.outputs.len()
                    ),
                });
            }
            for (index, descriptor) in layer.outputs.iter().enumerate() {
                graph.set_output_descriptor(OutputSlot::new(id, index), descriptor.clone())?;
            }
        }

        for layer in &self.layers {
            let id = ids[layer.name.as_str()];
            for (index, source) in layer.inputs.iter().enumerate() {
                let producer =
                    ids.get(source.layer.as_str())
                        .copied()
                        .ok_or_else(|| GraphError::UnknownLayer {
                            layer: source.layer.clone(),
                            referenced_by: layer.name.clone(),
                        })?;
                graph.connect(
                    OutputSlot::new(producer, source.slot),
                    InputSlot::new(id, index),
                )?;
            }
        }
        Ok(graph)
    }
}
