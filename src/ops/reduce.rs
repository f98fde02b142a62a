//! Reduction operators: Sum, Mean, Prod, Max, Min, All, Any.
//!
//! All reductions share one inference routine parameterized by the allowed
//! element types and an optional folding rule. The reduction axes arrive as
//! the second operand and must be known at graph-construction time, since
//! the output rank depends on them.

use crate::check::check_dtype_valid;
use crate::infer::{Infer, OpError, OutputDTypes, OutputShapes, expect_inputs};
use crate::ops::fold::{known_sizes, row_major_strides};
use crate::shape::{AxisSpec, reduce_shape};
use crate::value::{DataClass, DataType, NUMBER_DTYPES, NUMBER_OR_BOOL_DTYPES, Operand, Value};

/// Extract the reduction axes from the axis operand.
///
/// The axis operand must be a graph-time constant holding an integer scalar
/// or integer list. When the operand is omitted entirely, every axis is
/// reduced.
fn reduce_axes<'a>(inputs: &'a [Operand]) -> Result<(&'a Operand, AxisSpec), OpError> {
    match inputs {
        [x] => Ok((x, AxisSpec::all())),
        [x, axis] => {
            let Some(value) = axis.value.as_ref() else {
                return Err(OpError::NonConstInput("axis must be const"));
            };
            let Some(ints) = value.as_ints() else {
                return Err(OpError::WrongValueKind {
                    label: "axis",
                    expected: "an int or a list of ints",
                });
            };
            let axes = if value.shape().ndim() == 0 {
                AxisSpec::Single(ints[0])
            } else {
                AxisSpec::Multi(ints.to_vec())
            };
            Ok((x, axes))
        }
        _ => Err(OpError::MissingInputs),
    }
}

/// The reductions that constant folding supports.
///
/// Mean and Prod are deliberately absent; their folds are left to the
/// runtime.
#[derive(Copy, Clone, Debug)]
enum FoldKind {
    Sum,
    Max,
    Min,
}

/// Fold a reduction of `value` over `axes` (resolved, sorted, deduplicated).
fn fold_reduce(value: &Value, axes: &[usize], keep_dims: bool, kind: FoldKind) -> Option<Value> {
    if value.is_empty() {
        // Reducing a zero-sized extent has no meaningful result for Max/Min
        // and is rare enough to leave to the runtime for Sum too.
        return None;
    }

    let in_sizes = known_sizes(value.shape())?;
    let in_strides = row_major_strides(&in_sizes);

    // Accumulate into a keep-dims layout, then drop the reduced axes at the
    // end if requested.
    let acc_sizes: Vec<usize> = in_sizes
        .iter()
        .enumerate()
        .map(|(dim, &size)| if axes.contains(&dim) { 1 } else { size })
        .collect();
    let acc_strides = row_major_strides(&acc_sizes);
    let acc_len: usize = acc_sizes.iter().product();

    let acc_offset = |flat: usize| {
        let mut offset = 0;
        for dim in 0..in_sizes.len() {
            if !axes.contains(&dim) {
                let coord = (flat / in_strides[dim]) % in_sizes[dim];
                offset += coord * acc_strides[dim];
            }
        }
        offset
    };

    let out_shape = {
        let spec = AxisSpec::Multi(axes.iter().map(|&axis| axis as i64).collect());
        reduce_shape(value.shape(), &spec, keep_dims).ok()?
    };

    match (value.dtype().class(), kind) {
        (DataClass::Float, _) => {
            let mut acc: Vec<f64> = match kind {
                FoldKind::Sum => vec![0.; acc_len],
                FoldKind::Max => vec![f64::NEG_INFINITY; acc_len],
                FoldKind::Min => vec![f64::INFINITY; acc_len],
            };
            for i in 0..value.len() {
                let elt = value.float_at(i);
                let slot = &mut acc[acc_offset(i)];
                *slot = match kind {
                    FoldKind::Sum => *slot + elt,
                    // NaN elements propagate, as in the runtime kernels.
                    _ if elt.is_nan() || slot.is_nan() => f64::NAN,
                    FoldKind::Max => slot.max(elt),
                    FoldKind::Min => slot.min(elt),
                };
            }
            Some(Value::from_floats(out_shape, value.dtype(), acc))
        }
        (DataClass::Int, _) => {
            let mut acc: Vec<i64> = match kind {
                FoldKind::Sum => vec![0; acc_len],
                FoldKind::Max => vec![i64::MIN; acc_len],
                FoldKind::Min => vec![i64::MAX; acc_len],
            };
            for i in 0..value.len() {
                let elt = value.int_at(i);
                let slot = &mut acc[acc_offset(i)];
                *slot = match kind {
                    FoldKind::Sum => slot.wrapping_add(elt),
                    FoldKind::Max => (*slot).max(elt),
                    FoldKind::Min => (*slot).min(elt),
                };
            }
            Some(Value::from_ints(out_shape, value.dtype(), acc))
        }
        // Bool reduction only arises for Max, where it acts as a logical OR.
        (DataClass::Bool, FoldKind::Max) => {
            let mut acc = vec![false; acc_len];
            for i in 0..value.len() {
                let slot = &mut acc[acc_offset(i)];
                *slot = *slot || value.bool_at(i);
            }
            Some(Value::from_bools(out_shape, acc))
        }
        (DataClass::Bool, _) => None,
    }
}

/// Define a reduction operator.
macro_rules! reduce_op {
    ($(#[$doc:meta])* $name:ident, $allowed:expr, $fold:expr) => {
        $(#[$doc])*
        #[derive(Clone, Debug)]
        pub struct $name {
            /// Keep reduced dimensions with size 1 instead of removing them.
            pub keep_dims: bool,
        }

        impl Infer for $name {
            fn name(&self) -> &str {
                stringify!($name)
            }

            fn infer_shape(&self, inputs: &[Operand]) -> Result<OutputShapes, OpError> {
                let (x, axes) = reduce_axes(inputs)?;
                Ok([reduce_shape(&x.shape, &axes, self.keep_dims)?].into())
            }

            fn infer_dtype(&self, inputs: &[Operand]) -> Result<OutputDTypes, OpError> {
                expect_inputs!(inputs, x, ..);
                let dtype = check_dtype_valid("input_x", x.dtype, $allowed)?;
                Ok([dtype].into())
            }

            fn infer_value(&self, inputs: &[Operand]) -> Result<Option<Value>, OpError> {
                let fold: Option<FoldKind> = $fold;
                let Some(kind) = fold else {
                    return Ok(None);
                };
                let (x, axes) = reduce_axes(inputs)?;
                let Some(value) = x.value.as_ref() else {
                    return Ok(None);
                };
                let resolved = axes.resolve(x.ndim())?;
                Ok(fold_reduce(value, &resolved, self.keep_dims, kind))
            }
        }
    };
}

reduce_op!(
    /// Sums the elements along the reduced axes.
    ReduceSum,
    NUMBER_DTYPES,
    Some(FoldKind::Sum)
);

reduce_op!(
    /// Averages the elements along the reduced axes.
    ReduceMean,
    NUMBER_DTYPES,
    None
);

reduce_op!(
    /// Multiplies the elements along the reduced axes.
    ReduceProd,
    NUMBER_DTYPES,
    None
);

reduce_op!(
    /// Takes the maximum along the reduced axes. Also accepts boolean
    /// tensors, where it acts as a logical OR.
    ReduceMax,
    NUMBER_OR_BOOL_DTYPES,
    Some(FoldKind::Max)
);

reduce_op!(
    /// Takes the minimum along the reduced axes.
    ReduceMin,
    NUMBER_DTYPES,
    Some(FoldKind::Min)
);

/// Element types accepted by the boolean reductions.
const BOOL_DTYPES: &[DataType] = &[DataType::Bool];

reduce_op!(
    /// Logical AND along the reduced axes.
    ReduceAll,
    BOOL_DTYPES,
    None
);

reduce_op!(
    /// Logical OR along the reduced axes.
    ReduceAny,
    BOOL_DTYPES,
    None
);
