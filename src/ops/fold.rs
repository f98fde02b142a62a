//! Shared machinery for constant folding.
//!
//! Folding materializes dense output values, so unlike the shape and dtype
//! rules it runs in time proportional to data volume. Values store their
//! elements in the widest type of their class (`f64` / `i64` / `bool`);
//! results are wrapped or rounded to the logical output type when the
//! folded [`Value`] is built.

use crate::shape::{Dim, Shape};
use crate::value::{DataClass, DataType, Operand, Value};

/// Row-major strides for a list of dimension sizes.
pub(crate) fn row_major_strides(sizes: &[usize]) -> Vec<usize> {
    let mut strides = vec![1; sizes.len()];
    for i in (0..sizes.len().saturating_sub(1)).rev() {
        strides[i] = strides[i + 1] * sizes[i + 1];
    }
    strides
}

/// Concrete dimension sizes of a shape that is fully known.
pub(crate) fn known_sizes(shape: &Shape) -> Option<Vec<usize>> {
    shape.iter().map(Dim::size).collect()
}

/// For every element of `out_sizes` (in row-major order), the flat offset of
/// the corresponding element in an input of shape `in_sizes`, following
/// broadcasting rules.
///
/// `in_sizes` is right-aligned against `out_sizes`; size-1 input dimensions
/// repeat their single element.
fn broadcast_offsets(in_sizes: &[usize], out_sizes: &[usize]) -> Vec<usize> {
    let in_strides = row_major_strides(in_sizes);
    let pad = out_sizes.len() - in_sizes.len();
    let num_elements: usize = out_sizes.iter().product();

    let mut offsets = Vec::with_capacity(num_elements);
    let mut coords = vec![0usize; out_sizes.len()];
    for _ in 0..num_elements {
        let mut offset = 0;
        for (dim, &coord) in coords.iter().enumerate().skip(pad) {
            let in_dim = dim - pad;
            if in_sizes[in_dim] != 1 {
                offset += coord * in_strides[in_dim];
            }
        }
        offsets.push(offset);

        for dim in (0..out_sizes.len()).rev() {
            coords[dim] += 1;
            if coords[dim] < out_sizes[dim] {
                break;
            }
            coords[dim] = 0;
        }
    }
    offsets
}

/// The pair of constant values of a two-input operator, if both are known,
/// together with the broadcast output sizes.
pub(crate) fn known_pair<'a>(
    inputs: &'a [Operand],
) -> Option<(&'a Value, &'a Value, Vec<usize>)> {
    let [a, b] = inputs else {
        return None;
    };
    let (a, b) = (a.value.as_ref()?, b.value.as_ref()?);
    let a_sizes = known_sizes(a.shape())?;
    let b_sizes = known_sizes(b.shape())?;

    let out_ndim = a_sizes.len().max(b_sizes.len());
    let mut out_sizes = Vec::with_capacity(out_ndim);
    for i in 0..out_ndim {
        let dim_of = |sizes: &[usize]| {
            let pad = out_ndim - sizes.len();
            if i < pad { 1 } else { sizes[i - pad] }
        };
        out_sizes.push(dim_of(&a_sizes).max(dim_of(&b_sizes)));
    }
    Some((a, b, out_sizes))
}

/// Fold an elementwise numeric binary operator.
///
/// The float or integer path is chosen by the class of the promoted output
/// type. `int_op` may return `None` (eg. for a division by zero), in which
/// case folding is abandoned for the whole node and the value is left to the
/// runtime kernel.
pub(crate) fn fold_numeric_binary(
    inputs: &[Operand],
    out_dtype: DataType,
    float_op: impl Fn(f64, f64) -> f64,
    int_op: impl Fn(i64, i64) -> Option<i64>,
) -> Option<Value> {
    let (a, b, out_sizes) = known_pair(inputs)?;
    let a_offsets = broadcast_offsets(&known_sizes(a.shape())?, &out_sizes);
    let b_offsets = broadcast_offsets(&known_sizes(b.shape())?, &out_sizes);
    let out_shape = Shape::from_sizes(out_sizes.iter().copied());

    match out_dtype.class() {
        DataClass::Float => {
            let data = a_offsets
                .iter()
                .zip(&b_offsets)
                .map(|(&i, &j)| float_op(a.float_at(i), b.float_at(j)))
                .collect();
            Some(Value::from_floats(out_shape, out_dtype, data))
        }
        DataClass::Int => {
            let data: Option<Vec<i64>> = a_offsets
                .iter()
                .zip(&b_offsets)
                .map(|(&i, &j)| int_op(a.int_at(i), b.int_at(j)))
                .collect();
            Some(Value::from_ints(out_shape, out_dtype, data?))
        }
        DataClass::Bool => None,
    }
}

/// Fold an elementwise comparison, producing a boolean value.
///
/// The comparison reads elements in the widest class of the two inputs so
/// that integer comparisons stay exact.
pub(crate) fn fold_compare(
    inputs: &[Operand],
    float_op: impl Fn(f64, f64) -> bool,
    int_op: impl Fn(i64, i64) -> bool,
) -> Option<Value> {
    let (a, b, out_sizes) = known_pair(inputs)?;
    let a_offsets = broadcast_offsets(&known_sizes(a.shape())?, &out_sizes);
    let b_offsets = broadcast_offsets(&known_sizes(b.shape())?, &out_sizes);
    let out_shape = Shape::from_sizes(out_sizes.iter().copied());

    let use_float = a.dtype().class() == DataClass::Float || b.dtype().class() == DataClass::Float;
    let data = a_offsets
        .iter()
        .zip(&b_offsets)
        .map(|(&i, &j)| {
            if use_float {
                float_op(a.float_at(i), b.float_at(j))
            } else {
                int_op(a.int_at(i), b.int_at(j))
            }
        })
        .collect();
    Some(Value::from_bools(out_shape, data))
}

/// Fold an elementwise boolean binary operator (LogicalAnd/LogicalOr).
pub(crate) fn fold_bool_binary(
    inputs: &[Operand],
    op: impl Fn(bool, bool) -> bool,
) -> Option<Value> {
    let (a, b, out_sizes) = known_pair(inputs)?;
    let a_offsets = broadcast_offsets(&known_sizes(a.shape())?, &out_sizes);
    let b_offsets = broadcast_offsets(&known_sizes(b.shape())?, &out_sizes);
    let out_shape = Shape::from_sizes(out_sizes.iter().copied());

    let data = a_offsets
        .iter()
        .zip(&b_offsets)
        .map(|(&i, &j)| op(a.bool_at(i), b.bool_at(j)))
        .collect();
    Some(Value::from_bools(out_shape, data))
}

/// Fold an elementwise unary numeric operator.
///
/// Integer inputs use `int_op`, which defaults to computing through
/// `float_op` and truncating, matching how the runtime casts a float
/// intermediate back to the input type.
pub(crate) fn fold_numeric_unary(
    input: &Operand,
    out_dtype: DataType,
    float_op: impl Fn(f64) -> f64,
    int_op: impl Fn(i64) -> i64,
) -> Option<Value> {
    let value = input.value.as_ref()?;
    let out_shape = value.shape().clone();

    match out_dtype.class() {
        DataClass::Float => {
            let data = (0..value.len()).map(|i| float_op(value.float_at(i))).collect();
            Some(Value::from_floats(out_shape, out_dtype, data))
        }
        DataClass::Int => {
            let data = (0..value.len()).map(|i| int_op(value.int_at(i))).collect();
            Some(Value::from_ints(out_shape, out_dtype, data))
        }
        DataClass::Bool => None,
    }
}

#[cfg(test)]
mod tests {
    use crate::shape;
    use crate::value::{DataType, Operand, Value};

    use super::{broadcast_offsets, fold_compare, fold_numeric_binary, row_major_strides};

    #[test]
    fn test_row_major_strides() {
        assert_eq!(row_major_strides(&[]), Vec::<usize>::new());
        assert_eq!(row_major_strides(&[4]), vec![1]);
        assert_eq!(row_major_strides(&[2, 3, 4]), vec![12, 4, 1]);
    }

    #[test]
    fn test_broadcast_offsets() {
        // [3, 1] broadcast to [3, 2]: each element repeats along the last dim.
        assert_eq!(broadcast_offsets(&[3, 1], &[3, 2]), vec![0, 0, 1, 1, 2, 2]);
        // [2] broadcast to [2, 2]: the vector cycles along the first dim.
        assert_eq!(broadcast_offsets(&[2], &[2, 2]), vec![0, 1, 0, 1]);
        // Scalar broadcast.
        assert_eq!(broadcast_offsets(&[], &[2, 2]), vec![0, 0, 0, 0]);
        // Same shape: identity.
        assert_eq!(broadcast_offsets(&[2, 2], &[2, 2]), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_fold_numeric_binary_broadcasts() {
        let a = Operand::from_value(Value::from_ints(shape![3, 1], DataType::Int32, vec![1, 2, 3]));
        let b = Operand::from_value(Value::from_ints(shape![2], DataType::Int32, vec![10, 20]));
        let out = fold_numeric_binary(
            &[a, b],
            DataType::Int32,
            |x, y| x + y,
            |x, y| Some(x.wrapping_add(y)),
        )
        .unwrap();
        assert_eq!(out.shape(), &shape![3, 2]);
        assert_eq!(out.as_ints(), Some([11, 21, 12, 22, 13, 23].as_slice()));
    }

    #[test]
    fn test_fold_numeric_binary_int_abandon() {
        let a = Operand::from_value(Value::from_ints(shape![2], DataType::Int32, vec![1, 2]));
        let b = Operand::from_value(Value::from_ints(shape![2], DataType::Int32, vec![1, 0]));
        let out = fold_numeric_binary(
            &[a, b],
            DataType::Int32,
            |x, y| x / y,
            |x, y| x.checked_div(y),
        );
        assert!(out.is_none());
    }

    #[test]
    fn test_fold_compare_mixed_classes() {
        let a = Operand::from_value(Value::from_ints(shape![3], DataType::Int32, vec![1, 2, 3]));
        let b = Operand::from_value(Value::scalar_float(DataType::Float32, 2.0));
        let out = fold_compare(&[a, b], |x, y| x == y, |x, y| x == y).unwrap();
        assert_eq!(out.as_bools(), Some([false, true, false].as_slice()));
    }
}
