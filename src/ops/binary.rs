//! Elementwise arithmetic and bitwise binary operators.

use crate::check::check_dtypes_same_and_valid;
use crate::infer::{Infer, OpError, OutputDTypes, OutputShapes, expect_inputs};
use crate::ops::fold::fold_numeric_binary;
use crate::shape::broadcast_shapes;
use crate::value::{
    DataType, INT_OR_UINT_DTYPES, NUMBER_DTYPES, NUMBER_OR_BOOL_DTYPES, Operand, Value,
};

/// Output shape of an elementwise binary operator: the broadcast of its two
/// input shapes.
pub(crate) fn broadcast_binary_shape(inputs: &[Operand]) -> Result<OutputShapes, OpError> {
    expect_inputs!(inputs, x, y);
    Ok([broadcast_shapes(&x.shape, &y.shape)?].into())
}

/// Validate and promote the dtypes of a math binary operator's inputs.
pub(crate) fn math_binary_dtype(
    inputs: &[Operand],
    allowed: &'static [DataType],
) -> Result<DataType, OpError> {
    expect_inputs!(inputs, x, y);
    check_dtypes_same_and_valid(&[("x", x), ("y", y)], allowed)
}

/// Dtype rule for Add/Sub/Mul: numeric or bool operands, but two bool
/// operands are jointly rejected.
fn arith_dtype(inputs: &[Operand]) -> Result<DataType, OpError> {
    expect_inputs!(inputs, x, y);
    if x.dtype == DataType::Bool && y.dtype == DataType::Bool {
        return Err(OpError::UnsupportedDType {
            label: "x and y".to_string(),
            actual: DataType::Bool,
            allowed: NUMBER_DTYPES,
        });
    }
    check_dtypes_same_and_valid(&[("x", x), ("y", y)], NUMBER_OR_BOOL_DTYPES)
}

/// Define an elementwise arithmetic operator: broadcast shape, validated and
/// promoted dtype, and optionally a constant-folding rule given as a float
/// closure and an integer closure. The integer closure returns `None` to
/// abandon folding (eg. division by zero).
macro_rules! math_binary_op {
    ($(#[$doc:meta])* $name:ident, $dtype_rule:expr) => {
        $(#[$doc])*
        #[derive(Clone, Debug, Default)]
        pub struct $name {}

        impl Infer for $name {
            fn name(&self) -> &str {
                stringify!($name)
            }

            fn infer_shape(&self, inputs: &[Operand]) -> Result<OutputShapes, OpError> {
                broadcast_binary_shape(inputs)
            }

            fn infer_dtype(&self, inputs: &[Operand]) -> Result<OutputDTypes, OpError> {
                #[allow(clippy::redundant_closure_call)]
                let dtype: DataType = ($dtype_rule)(inputs)?;
                Ok([dtype].into())
            }
        }
    };

    (
        $(#[$doc:meta])* $name:ident, $dtype_rule:expr,
        fold($float_op:expr, $int_op:expr)
    ) => {
        $(#[$doc])*
        #[derive(Clone, Debug, Default)]
        pub struct $name {}

        impl Infer for $name {
            fn name(&self) -> &str {
                stringify!($name)
            }

            fn infer_shape(&self, inputs: &[Operand]) -> Result<OutputShapes, OpError> {
                broadcast_binary_shape(inputs)
            }

            fn infer_dtype(&self, inputs: &[Operand]) -> Result<OutputDTypes, OpError> {
                #[allow(clippy::redundant_closure_call)]
                let dtype: DataType = ($dtype_rule)(inputs)?;
                Ok([dtype].into())
            }

            fn infer_value(&self, inputs: &[Operand]) -> Result<Option<Value>, OpError> {
                #[allow(clippy::redundant_closure_call)]
                let out_dtype: DataType = ($dtype_rule)(inputs)?;
                let folded = fold_numeric_binary(inputs, out_dtype, $float_op, $int_op);
                Ok(folded)
            }
        }
    };
}

math_binary_op!(
    /// Adds two tensors elementwise.
    Add,
    arith_dtype,
    fold(|x, y| x + y, |x: i64, y: i64| Some(x.wrapping_add(y)))
);

math_binary_op!(
    /// Subtracts the second tensor from the first elementwise.
    Sub,
    arith_dtype,
    fold(|x, y| x - y, |x: i64, y: i64| Some(x.wrapping_sub(y)))
);

math_binary_op!(
    /// Multiplies two tensors elementwise.
    Mul,
    arith_dtype,
    fold(|x, y| x * y, |x: i64, y: i64| Some(x.wrapping_mul(y)))
);

math_binary_op!(
    /// Divides the first tensor by the second elementwise.
    ///
    /// Integer division truncates toward zero. An integer division by zero
    /// abandons folding and leaves the value to the runtime.
    Div,
    |inputs| math_binary_dtype(inputs, NUMBER_DTYPES),
    fold(|x, y| x / y, |x: i64, y: i64| x.checked_div(y))
);

math_binary_op!(
    /// Divides the first tensor by the second elementwise.
    ///
    /// RealDiv and Div share inference semantics; they differ only in which
    /// kernel the runtime dispatches to.
    RealDiv,
    |inputs| math_binary_dtype(inputs, NUMBER_DTYPES),
    fold(|x, y| x / y, |x: i64, y: i64| x.checked_div(y))
);

math_binary_op!(
    /// Safe division: positions where the result would be non-finite
    /// (division by zero, or zero by zero) fold to exactly 0.
    DivNoNan,
    |inputs| math_binary_dtype(inputs, NUMBER_DTYPES),
    fold(
        |x: f64, y: f64| {
            let out = x / y;
            if out.is_finite() { out } else { 0. }
        },
        |x: i64, y: i64| Some(if y == 0 { 0 } else { x.wrapping_div(y) })
    )
);

/// Element types accepted by [`MulNoNan`].
const MUL_NO_NAN_DTYPES: &[DataType] = &[
    DataType::Float16,
    DataType::Float32,
    DataType::Int32,
    DataType::Int64,
];

math_binary_op!(
    /// Safe multiplication: positions where the second operand is zero fold
    /// to exactly 0, regardless of the first operand (including inf/NaN).
    MulNoNan,
    |inputs| math_binary_dtype(inputs, MUL_NO_NAN_DTYPES),
    fold(
        |x: f64, y: f64| if y == 0. { 0. } else { x * y },
        |x: i64, y: i64| Some(if y == 0 { 0 } else { x.wrapping_mul(y) })
    )
);

math_binary_op!(
    /// Raises the first tensor to the power of the second, elementwise.
    ///
    /// Integer folding requires a non-negative exponent; otherwise folding
    /// is abandoned.
    Pow,
    |inputs| math_binary_dtype(inputs, NUMBER_DTYPES),
    fold(|x: f64, y: f64| x.powf(y), |x: i64, y: i64| {
        let exp: u32 = y.try_into().ok()?;
        Some(x.wrapping_pow(exp))
    })
);

math_binary_op!(
    /// Elementwise minimum of two tensors. NaN operands propagate.
    Minimum,
    |inputs| math_binary_dtype(inputs, NUMBER_DTYPES),
    fold(
        |x: f64, y: f64| if x.is_nan() || y.is_nan() { f64::NAN } else { x.min(y) },
        |x: i64, y: i64| Some(x.min(y))
    )
);

math_binary_op!(
    /// Elementwise maximum of two tensors. NaN operands propagate.
    Maximum,
    |inputs| math_binary_dtype(inputs, NUMBER_DTYPES),
    fold(
        |x: f64, y: f64| if x.is_nan() || y.is_nan() { f64::NAN } else { x.max(y) },
        |x: i64, y: i64| Some(x.max(y))
    )
);

math_binary_op!(
    /// Elementwise remainder with the sign of the dividend (fmod semantics).
    Mod,
    |inputs| math_binary_dtype(inputs, NUMBER_DTYPES),
    fold(|x: f64, y: f64| x % y, |x: i64, y: i64| x.checked_rem(y))
);

math_binary_op!(
    /// Elementwise division rounded down to the closest integer.
    FloorDiv,
    |inputs| math_binary_dtype(inputs, NUMBER_DTYPES)
);

math_binary_op!(
    /// Elementwise remainder with the sign of the divisor.
    FloorMod,
    |inputs| math_binary_dtype(inputs, NUMBER_DTYPES)
);

math_binary_op!(
    /// Elementwise division rounded toward zero.
    TruncateDiv,
    |inputs| math_binary_dtype(inputs, NUMBER_DTYPES)
);

math_binary_op!(
    /// Elementwise remainder of truncating division.
    TruncateMod,
    |inputs| math_binary_dtype(inputs, NUMBER_DTYPES)
);

/// Element types accepted by [`SquaredDifference`].
const SQUARED_DIFFERENCE_DTYPES: &[DataType] =
    &[DataType::Float16, DataType::Float32, DataType::Int32];

math_binary_op!(
    /// Computes `(x - y)^2` elementwise.
    SquaredDifference,
    |inputs| math_binary_dtype(inputs, SQUARED_DIFFERENCE_DTYPES)
);

/// Element types accepted by [`Xdivy`] and [`Xlogy`].
const X_OP_Y_DTYPES: &[DataType] = &[DataType::Float16, DataType::Float32];

math_binary_op!(
    /// Computes `x / y`, returning zero where `x` is zero.
    Xdivy,
    |inputs| math_binary_dtype(inputs, X_OP_Y_DTYPES)
);

math_binary_op!(
    /// Computes `x * log(y)`, returning zero where `x` is zero.
    Xlogy,
    |inputs| math_binary_dtype(inputs, X_OP_Y_DTYPES)
);

math_binary_op!(
    /// Elementwise arctangent of `x / y` using the signs of both arguments
    /// to determine the quadrant.
    Atan2,
    |inputs| math_binary_dtype(inputs, NUMBER_DTYPES)
);

/// Define an elementwise bitwise operator. These restrict operands to the
/// integer types and always fold on the integer path.
macro_rules! bitwise_binary_op {
    ($(#[$doc:meta])* $name:ident, $int_op:expr) => {
        math_binary_op!(
            $(#[$doc])*
            $name,
            |inputs| math_binary_dtype(inputs, INT_OR_UINT_DTYPES),
            fold(
                // Bitwise dtypes are integer-only, so the float path is
                // never taken.
                |_, _| unreachable!("bitwise operands are integers"),
                $int_op
            )
        );
    };
}

bitwise_binary_op!(
    /// Bitwise AND of two integer tensors.
    BitwiseAnd,
    |x: i64, y: i64| Some(x & y)
);

bitwise_binary_op!(
    /// Bitwise OR of two integer tensors.
    BitwiseOr,
    |x: i64, y: i64| Some(x | y)
);

bitwise_binary_op!(
    /// Bitwise XOR of two integer tensors.
    BitwiseXor,
    |x: i64, y: i64| Some(x ^ y)
);

#[cfg(test)]
mod tests {
    use opsig_testing::TestCases;

    use crate::infer::{Infer, OpError};
    use crate::shape;
    use crate::shape::{Dim, Shape};
    use crate::value::{DataType, Operand, Value};

    use super::{Add, BitwiseAnd, Div, DivNoNan, Maximum, Mod, Mul, MulNoNan, Pow, Sub};

    fn operand(shape: Shape, dtype: DataType) -> Operand {
        Operand::new(shape, dtype)
    }

    #[test]
    fn test_binary_op_broadcast_shape() {
        #[derive(Debug)]
        struct Case {
            a: Shape,
            b: Shape,
            expected: Shape,
        }

        let cases = [
            Case {
                a: shape![3, 1],
                b: shape![1, 4],
                expected: shape![3, 4],
            },
            Case {
                a: shape![2, 3, 4],
                b: shape![4],
                expected: shape![2, 3, 4],
            },
            Case {
                a: shape![],
                b: shape![5],
                expected: shape![5],
            },
            Case {
                a: shape![Dim::Unknown, 4],
                b: shape![2, 4],
                expected: shape![2, 4],
            },
        ];

        cases.test_each(|case| {
            let inputs = [
                operand(case.a.clone(), DataType::Float32),
                operand(case.b.clone(), DataType::Float32),
            ];
            let shapes = Add {}.infer_shape(&inputs).unwrap();
            assert_eq!(shapes.as_slice(), &[case.expected.clone()]);
        });
    }

    #[test]
    fn test_binary_op_shape_mismatch() {
        let inputs = [
            operand(shape![1, 3], DataType::Float32),
            operand(shape![2, 4], DataType::Float32),
        ];
        let err = Add {}.infer_shape(&inputs).err().unwrap();
        assert!(matches!(err, OpError::IncompatibleShapes(_)));
    }

    #[test]
    fn test_arith_dtype_rules() {
        // Matching tensor dtypes pass through.
        let inputs = [
            operand(shape![2], DataType::Int32),
            operand(shape![2], DataType::Int32),
        ];
        let dtypes = Mul {}.infer_dtype(&inputs).unwrap();
        assert_eq!(dtypes.as_slice(), &[DataType::Int32]);

        // A scalar operand promotes instead of requiring equality.
        let inputs = [
            operand(shape![2], DataType::Int32),
            operand(shape![], DataType::Float32),
        ];
        let dtypes = Add {}.infer_dtype(&inputs).unwrap();
        assert_eq!(dtypes.as_slice(), &[DataType::Float32]);

        // Dtype inference is symmetric in argument order.
        let flipped = [
            operand(shape![], DataType::Float32),
            operand(shape![2], DataType::Int32),
        ];
        assert_eq!(
            Add {}.infer_dtype(&inputs).unwrap(),
            Add {}.infer_dtype(&flipped).unwrap()
        );

        // Mismatched tensor dtypes are rejected.
        let inputs = [
            operand(shape![2], DataType::Int32),
            operand(shape![2], DataType::Float32),
        ];
        assert!(matches!(
            Sub {}.infer_dtype(&inputs).err().unwrap(),
            OpError::DTypeMismatch { .. }
        ));

        // One bool operand is fine, two are jointly rejected.
        let inputs = [
            operand(shape![2], DataType::Bool),
            operand(shape![], DataType::Int32),
        ];
        assert_eq!(
            Add {}.infer_dtype(&inputs).unwrap().as_slice(),
            &[DataType::Int32]
        );

        let inputs = [
            operand(shape![2], DataType::Bool),
            operand(shape![2], DataType::Bool),
        ];
        assert!(matches!(
            Add {}.infer_dtype(&inputs).err().unwrap(),
            OpError::UnsupportedDType { .. }
        ));

        // Div does not accept bool at all.
        let inputs = [
            operand(shape![2], DataType::Bool),
            operand(shape![], DataType::Int32),
        ];
        assert!(Div {}.infer_dtype(&inputs).is_err());
    }

    #[test]
    fn test_add_fold_matches_elementwise() {
        let a = Operand::from_value(Value::from_floats(
            shape![3],
            DataType::Float32,
            vec![1., 2., 3.],
        ));
        let b = Operand::from_value(Value::from_floats(
            shape![3],
            DataType::Float32,
            vec![4., 5., 6.],
        ));
        let value = Add {}.infer_value(&[a, b]).unwrap().unwrap();
        assert_eq!(value.dtype(), DataType::Float32);
        assert_eq!(value.as_floats(), Some([5., 7., 9.].as_slice()));
    }

    #[test]
    fn test_fold_wraps_integer_overflow() {
        let a = Operand::from_value(Value::from_ints(shape![1], DataType::Int8, vec![127]));
        let b = Operand::from_value(Value::from_ints(shape![], DataType::Int8, vec![1]));
        let value = Add {}.infer_value(&[a, b]).unwrap().unwrap();
        assert_eq!(value.as_ints(), Some([-128].as_slice()));
    }

    #[test]
    fn test_fold_skipped_when_value_unknown() {
        let a = Operand::from_value(Value::from_ints(shape![2], DataType::Int32, vec![1, 2]));
        let b = operand(shape![2], DataType::Int32);
        assert_eq!(Add {}.infer_value(&[a, b]).unwrap(), None);
    }

    #[test]
    fn test_div_no_nan_fold_zeros() {
        #[derive(Debug)]
        struct Case {
            x: Vec<f64>,
            y: Vec<f64>,
            expected: Vec<f64>,
        }

        let cases = [
            Case {
                x: vec![-1., 0., 1., 5., 6.],
                y: vec![0., 0., 0., 2., 3.],
                expected: vec![0., 0., 0., 2.5, 2.],
            },
            Case {
                x: vec![1e30, -4.],
                y: vec![1e-30, 2.],
                expected: vec![1e30 / 1e-30, -2.],
            },
        ];

        cases.test_each(|case| {
            let a = Operand::from_value(Value::from_floats(
                Shape::from_sizes([case.x.len()]),
                DataType::Float64,
                case.x.clone(),
            ));
            let b = Operand::from_value(Value::from_floats(
                Shape::from_sizes([case.y.len()]),
                DataType::Float64,
                case.y.clone(),
            ));
            let value = DivNoNan {}.infer_value(&[a, b]).unwrap().unwrap();
            let folded = value.as_floats().unwrap();
            assert_eq!(folded, case.expected.as_slice());
            assert!(folded.iter().all(|v| v.is_finite()));
        });
    }

    #[test]
    fn test_mul_no_nan_fold_zeros() {
        let a = Operand::from_value(Value::from_floats(
            shape![2, 3],
            DataType::Float32,
            vec![-1., 6., f64::INFINITY, f64::NAN, -7., 4.],
        ));
        let b = Operand::from_value(Value::from_floats(
            shape![2, 3],
            DataType::Float32,
            vec![-1., 4., 0., 0., -3., 1.],
        ));
        let value = MulNoNan {}.infer_value(&[a, b]).unwrap().unwrap();
        assert_eq!(
            value.as_floats(),
            Some([1., 24., 0., 0., 21., 4.].as_slice())
        );
    }

    #[test]
    fn test_int_div_by_zero_abandons_fold() {
        let a = Operand::from_value(Value::from_ints(shape![2], DataType::Int32, vec![4, 5]));
        let b = Operand::from_value(Value::from_ints(shape![2], DataType::Int32, vec![2, 0]));
        assert_eq!(Div {}.infer_value(&[a.clone(), b]).unwrap(), None);

        let b = Operand::from_value(Value::from_ints(shape![2], DataType::Int32, vec![2, 5]));
        let value = Div {}.infer_value(&[a, b]).unwrap().unwrap();
        assert_eq!(value.as_ints(), Some([2, 1].as_slice()));
    }

    #[test]
    fn test_mod_fold() {
        let a = Operand::from_value(Value::from_floats(
            shape![3],
            DataType::Float32,
            vec![7., -7., 7.5],
        ));
        let b = Operand::from_value(Value::from_floats(
            shape![3],
            DataType::Float32,
            vec![2., 2., 2.],
        ));
        let value = Mod {}.infer_value(&[a, b]).unwrap().unwrap();
        // fmod keeps the sign of the dividend.
        assert_eq!(value.as_floats(), Some([1., -1., 1.5].as_slice()));
    }

    #[test]
    fn test_pow_fold() {
        let a = Operand::from_value(Value::from_ints(shape![3], DataType::Int32, vec![2, 3, 4]));
        let b = Operand::from_value(Value::from_ints(shape![], DataType::Int32, vec![2]));
        let value = Pow {}.infer_value(&[a.clone(), b]).unwrap().unwrap();
        assert_eq!(value.as_ints(), Some([4, 9, 16].as_slice()));

        // Negative integer exponents abandon folding.
        let b = Operand::from_value(Value::from_ints(shape![], DataType::Int32, vec![-1]));
        assert_eq!(Pow {}.infer_value(&[a, b]).unwrap(), None);
    }

    #[test]
    fn test_maximum_fold_propagates_nan() {
        let a = Operand::from_value(Value::from_floats(
            shape![2],
            DataType::Float32,
            vec![1., f64::NAN],
        ));
        let b = Operand::from_value(Value::from_floats(
            shape![2],
            DataType::Float32,
            vec![2., 0.],
        ));
        let value = Maximum {}.infer_value(&[a, b]).unwrap().unwrap();
        let folded = value.as_floats().unwrap();
        assert_eq!(folded[0], 2.);
        assert!(folded[1].is_nan());
    }

    #[test]
    fn test_bitwise_ops() {
        // Bool and float operands are rejected.
        let inputs = [
            operand(shape![2], DataType::Float32),
            operand(shape![2], DataType::Float32),
        ];
        assert!(BitwiseAnd {}.infer_dtype(&inputs).is_err());

        let a = Operand::from_value(Value::from_ints(
            shape![3],
            DataType::UInt8,
            vec![0b1100, 0b1010, 0xFF],
        ));
        let b = Operand::from_value(Value::from_ints(
            shape![3],
            DataType::UInt8,
            vec![0b1010, 0b1010, 0x0F],
        ));
        assert_eq!(
            BitwiseAnd {}.infer_dtype(&[a.clone(), b.clone()]).unwrap()[0],
            DataType::UInt8
        );
        let value = BitwiseAnd {}.infer_value(&[a, b]).unwrap().unwrap();
        assert_eq!(value.as_ints(), Some([0b1000, 0b1010, 0x0F].as_slice()));
    }
}
