//! Cumulative scan operators.

use crate::check::check_dtype_valid;
use crate::infer::{Infer, OpError, OutputDTypes, OutputShapes, expect_inputs};
use crate::ops::fold::{known_sizes, row_major_strides};
use crate::shape::resolve_axis;
use crate::value::{DataClass, DataType, NUMBER_DTYPES, Operand, Value};

/// Extract the scan axis, which must be a graph-time constant integer
/// scalar in `[-ndim, ndim)`.
fn scan_axis(x: &Operand, axis: &Operand) -> Result<usize, OpError> {
    let Some(value) = axis.value.as_ref() else {
        return Err(OpError::NonConstInput("axis must be const"));
    };
    let Some(axis) = value.as_int_scalar() else {
        return Err(OpError::WrongValueKind {
            label: "axis",
            expected: "an int",
        });
    };
    resolve_axis(x.ndim(), axis)
}

/// Scan one lane of values. `op` is applied cumulatively starting from
/// `identity`; `exclusive` shifts each output one step so a position does
/// not include its own element, and `reverse` runs the scan from the end.
fn scan_lane<T: Copy>(
    vals: &[T],
    exclusive: bool,
    reverse: bool,
    identity: T,
    op: impl Fn(T, T) -> T,
) -> Vec<T> {
    let n = vals.len();
    let mut out = vec![identity; n];
    let mut acc = identity;

    let mut step = |k: usize| {
        if exclusive {
            out[k] = acc;
            acc = op(acc, vals[k]);
        } else {
            acc = op(acc, vals[k]);
            out[k] = acc;
        }
    };

    if reverse {
        for k in (0..n).rev() {
            step(k);
        }
    } else {
        for k in 0..n {
            step(k);
        }
    }
    out
}

/// Fold a scan of `value` along `axis` by running [`scan_lane`] over every
/// lane of the tensor.
fn fold_scan(
    value: &Value,
    axis: usize,
    exclusive: bool,
    reverse: bool,
    float_identity: f64,
    float_op: impl Fn(f64, f64) -> f64 + Copy,
    int_identity: i64,
    int_op: impl Fn(i64, i64) -> i64 + Copy,
) -> Option<Value> {
    let sizes = known_sizes(value.shape())?;
    let strides = row_major_strides(&sizes);
    let axis_size = sizes[axis];
    let axis_stride = strides[axis];

    match value.dtype().class() {
        DataClass::Float => {
            let mut out = vec![0.; value.len()];
            for start in lane_starts(value.len(), axis_size, axis_stride) {
                let lane: Vec<f64> = (0..axis_size)
                    .map(|k| value.float_at(start + k * axis_stride))
                    .collect();
                let scanned = scan_lane(&lane, exclusive, reverse, float_identity, float_op);
                for (k, elt) in scanned.into_iter().enumerate() {
                    out[start + k * axis_stride] = elt;
                }
            }
            Some(Value::from_floats(value.shape().clone(), value.dtype(), out))
        }
        DataClass::Int => {
            let mut out = vec![0; value.len()];
            for start in lane_starts(value.len(), axis_size, axis_stride) {
                let lane: Vec<i64> = (0..axis_size)
                    .map(|k| value.int_at(start + k * axis_stride))
                    .collect();
                let scanned = scan_lane(&lane, exclusive, reverse, int_identity, int_op);
                for (k, elt) in scanned.into_iter().enumerate() {
                    out[start + k * axis_stride] = elt;
                }
            }
            Some(Value::from_ints(value.shape().clone(), value.dtype(), out))
        }
        DataClass::Bool => None,
    }
}

/// Flat offsets of every position whose coordinate along the scan axis is
/// zero.
fn lane_starts(len: usize, axis_size: usize, axis_stride: usize) -> impl Iterator<Item = usize> {
    (0..len).filter(move |i| (i / axis_stride) % axis_size == 0)
}

/// Element types accepted by [`CumSum`].
const CUM_SUM_DTYPES: &[DataType] = &[
    DataType::UInt8,
    DataType::Int8,
    DataType::Int32,
    DataType::Float16,
    DataType::Float32,
    DataType::Float64,
];

/// Define a cumulative scan operator. The output has the input's shape and
/// dtype; `exclusive` and `reverse` select among the four scan variants.
macro_rules! scan_op {
    (
        $(#[$doc:meta])* $name:ident, $allowed:expr,
        identity($float_identity:expr, $int_identity:expr),
        fold($float_op:expr, $int_op:expr)
    ) => {
        $(#[$doc])*
        #[derive(Clone, Debug, Default)]
        pub struct $name {
            /// Exclude each position's own element from its scan result.
            pub exclusive: bool,
            /// Run the scan from the last element toward the first.
            pub reverse: bool,
        }

        impl Infer for $name {
            fn name(&self) -> &str {
                stringify!($name)
            }

            fn infer_shape(&self, inputs: &[Operand]) -> Result<OutputShapes, OpError> {
                expect_inputs!(inputs, x, axis);
                scan_axis(x, axis)?;
                Ok([x.shape.clone()].into())
            }

            fn infer_dtype(&self, inputs: &[Operand]) -> Result<OutputDTypes, OpError> {
                expect_inputs!(inputs, x, _axis);
                let dtype = check_dtype_valid("x", x.dtype, $allowed)?;
                Ok([dtype].into())
            }

            fn infer_value(&self, inputs: &[Operand]) -> Result<Option<Value>, OpError> {
                expect_inputs!(inputs, x, axis);
                let axis = scan_axis(x, axis)?;
                let Some(value) = x.value.as_ref() else {
                    return Ok(None);
                };
                let folded = fold_scan(
                    value,
                    axis,
                    self.exclusive,
                    self.reverse,
                    $float_identity,
                    $float_op,
                    $int_identity,
                    $int_op,
                );
                Ok(folded)
            }
        }
    };
}

scan_op!(
    /// Cumulative sum along an axis.
    CumSum,
    CUM_SUM_DTYPES,
    identity(0., 0),
    fold(|acc, x| acc + x, |acc: i64, x: i64| acc.wrapping_add(x))
);

scan_op!(
    /// Cumulative product along an axis.
    CumProd,
    NUMBER_DTYPES,
    identity(1., 1),
    fold(|acc, x| acc * x, |acc: i64, x: i64| acc.wrapping_mul(x))
);
