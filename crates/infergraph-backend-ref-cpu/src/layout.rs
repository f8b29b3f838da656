//! Row-major index arithmetic shared by the data-movement workloads.

pub(crate) fn compute_strides(dims: &[usize]) -> Vec<usize> {
    let mut strides = vec![0; dims.len()];
    let mut acc = 1usize;
    for (i, dim) in dims.iter().enumerate().rev() {
        strides[i] = acc;
        acc *= *dim;
    }
    strides
}

fn unravel_index(mut index: usize, dims: &[usize], coords: &mut [usize]) {
    for (i, dim) in dims.iter().enumerate().rev() {
        coords[i] = index % *dim;
        index /= *dim;
    }
}

/// For every flat output index, the flat input index it reads, where output
/// axis `j` reads input axis `source_axes[j]`.
///
/// Built once per workload so execution is a plain gather.
pub(crate) fn gather_table(input_dims: &[usize], source_axes: &[usize]) -> Vec<usize> {
    let output_dims: Vec<usize> = source_axes.iter().map(|&axis| input_dims[axis]).collect();
    let input_strides = compute_strides(input_dims);
    let count: usize = output_dims.iter().product();

    let mut coords = vec![0; output_dims.len()];
    (0..count)
        .map(|index| {
            unravel_index(index, &output_dims, &mut coords);
            coords
                .iter()
                .zip(source_axes)
                .map(|(&coord, &axis)| coord * input_strides[axis])
                .sum()
        })
        .collect()
}
