//! Property-based tests: optimizing a graph never changes what it computes.
//!
//! Each case runs the same graph on the reference backend twice, once as
//! built and once after the standard rewrite rules, and compares outputs
//! with each other and with a naive index-by-index oracle.

mod common;

use common::{
    backend, chain, naive_permute, naive_transpose, output_dims, permute, registry, reshape,
    transpose,
};
use infergraph::network::LoadedNetwork;
use infergraph::tensor::DataType;
use infergraph::{
    default_rules, optimize, ConstTensor, Graph, Operation, OptimizerOptions, Tensor,
};
use proptest::prelude::*;

fn execute(graph: &Graph, input: &[f32]) -> Vec<f32> {
    let mut network = LoadedNetwork::load(graph, &backend(), &registry()).unwrap();
    let input_desc = network.input_binding("input").unwrap().descriptor.clone();
    let output_desc = network.output_binding("output").unwrap().descriptor.clone();
    let mut out = vec![0.0f32; output_desc.num_elements()];
    {
        let inputs = [("input", ConstTensor::new(input_desc, input).unwrap())];
        let mut outputs = [("output", Tensor::new(output_desc, out.as_mut_slice()).unwrap())];
        network.execute(&inputs, &mut outputs).unwrap();
    }
    out
}

/// Runs `graph` before and after optimization and returns both outputs.
fn before_and_after(mut graph: Graph, input: &[f32]) -> (Vec<f32>, Vec<f32>) {
    let before = execute(&graph, input);
    let options = OptimizerOptions {
        max_passes: 16,
        validate_each_rewrite: true,
    };
    let report = optimize(&mut graph, &default_rules(), &options).unwrap();
    assert!(report.converged);
    let after = execute(&graph, input);
    (before, after)
}

fn iota(len: usize) -> Vec<f32> {
    (0..len).map(|i| i as f32 + 0.5).collect()
}

/// Shapes of rank 1 to 4 where unit axes are common, so layout-preserving
/// permutations show up often.
fn arb_dims() -> impl Strategy<Value = Vec<usize>> {
    proptest::collection::vec(prop_oneof![3 => Just(1usize), 2 => 2usize..4], 1..=4)
}

fn arb_dims_and_perm() -> impl Strategy<Value = (Vec<usize>, Vec<usize>)> {
    arb_dims().prop_flat_map(|dims| {
        let rank = dims.len();
        (Just(dims), Just((0..rank).collect::<Vec<_>>()).prop_shuffle())
    })
}

fn inverse(perm: &[usize]) -> Vec<usize> {
    let mut inverse = vec![0; perm.len()];
    for (index, &axis) in perm.iter().enumerate() {
        inverse[axis] = index;
    }
    inverse
}

proptest! {
    #[test]
    fn transpose_results_survive_optimization((dims, perm) in arb_dims_and_perm()) {
        let input = iota(dims.iter().product());
        let graph = chain(&dims, DataType::Float32, &[("transpose", transpose(&perm))]);
        let (before, after) = before_and_after(graph, &input);
        prop_assert_eq!(&before, &naive_transpose(&input, &dims, &perm));
        prop_assert_eq!(before, after);
    }

    #[test]
    fn permute_results_survive_optimization((dims, mappings) in arb_dims_and_perm()) {
        let input = iota(dims.iter().product());
        let graph = chain(&dims, DataType::Float32, &[("permute", permute(&mappings))]);
        let (before, after) = before_and_after(graph, &input);
        prop_assert_eq!(&before, &naive_permute(&input, &dims, &mappings));
        prop_assert_eq!(before, after);
    }

    #[test]
    fn inverse_pairs_are_identity((dims, perm) in arb_dims_and_perm()) {
        let input = iota(dims.iter().product());
        let graph = chain(
            &dims,
            DataType::Float32,
            &[
                ("forward", transpose(&perm)),
                ("back", transpose(&inverse(&perm))),
            ],
        );
        let (before, after) = before_and_after(graph, &input);
        prop_assert_eq!(&before, &input);
        prop_assert_eq!(before, after);
    }

    #[test]
    fn mixed_chains_survive_optimization(
        (dims, perm) in arb_dims_and_perm(),
        second in arb_dims_and_perm(),
    ) {
        let input = iota(dims.iter().product());
        let total: usize = dims.iter().product();
        let after_transpose = output_dims(&transpose(&perm), &dims);
        // Reshape into the second shape only when the element counts agree.
        let target = if second.0.iter().product::<usize>() == total {
            second.0.clone()
        } else {
            vec![total]
        };
        let mappings: Vec<usize> = (0..target.len()).rev().collect();
        let layers: Vec<(&str, Operation)> = vec![
            ("flatten", reshape(&[total])),
            ("unflatten", reshape(&dims)),
            ("transpose", transpose(&perm)),
            ("regroup", reshape(&target)),
            ("reverse", permute(&mappings)),
        ];
        prop_assert_eq!(after_transpose.iter().product::<usize>(), total);
        let graph = chain(&dims, DataType::Float32, &layers);
        let (before, after) = before_and_after(graph, &input);
        prop_assert_eq!(before, after);
    }
}
