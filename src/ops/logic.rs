//! Comparison and logical operators. These produce boolean outputs.

use crate::check::{check_dtype_valid, check_dtypes_same_and_valid, check_shapes_match};
use crate::infer::{Infer, OpError, OutputDTypes, OutputShapes, expect_inputs};
use crate::ops::binary::broadcast_binary_shape;
use crate::ops::fold::{fold_bool_binary, fold_compare};
use crate::value::{DataType, NUMBER_DTYPES, NUMBER_OR_BOOL_DTYPES, Operand, Value};

/// Validate the dtypes of a comparison operator's inputs. The output is
/// always boolean, but inputs must still be valid and mutually consistent.
fn logic_binary_dtype(
    inputs: &[Operand],
    allowed: &'static [DataType],
) -> Result<OutputDTypes, OpError> {
    expect_inputs!(inputs, x, y);
    check_dtypes_same_and_valid(&[("x", x), ("y", y)], allowed)?;
    Ok([DataType::Bool].into())
}

/// Define a comparison operator: broadcast shape, boolean output dtype and
/// an elementwise comparison fold.
macro_rules! compare_op {
    ($(#[$doc:meta])* $name:ident, $allowed:expr, $float_op:expr, $int_op:expr) => {
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
                logic_binary_dtype(inputs, $allowed)
            }

            fn infer_value(&self, inputs: &[Operand]) -> Result<Option<Value>, OpError> {
                Ok(fold_compare(inputs, $float_op, $int_op))
            }
        }
    };
}

compare_op!(
    /// Elementwise equality.
    Equal,
    NUMBER_OR_BOOL_DTYPES,
    |x, y| x == y,
    |x, y| x == y
);

compare_op!(
    /// Elementwise inequality.
    NotEqual,
    NUMBER_OR_BOOL_DTYPES,
    |x, y| x != y,
    |x, y| x != y
);

compare_op!(
    /// Elementwise `x > y`.
    Greater,
    NUMBER_DTYPES,
    |x, y| x > y,
    |x, y| x > y
);

compare_op!(
    /// Elementwise `x >= y`.
    GreaterEqual,
    NUMBER_DTYPES,
    |x, y| x >= y,
    |x, y| x >= y
);

compare_op!(
    /// Elementwise `x < y`.
    Less,
    NUMBER_DTYPES,
    |x, y| x < y,
    |x, y| x < y
);

compare_op!(
    /// Elementwise `x <= y`.
    LessEqual,
    NUMBER_DTYPES,
    |x, y| x <= y,
    |x, y| x <= y
);

/// Element types accepted by the boolean connectives.
const BOOL_DTYPES: &[DataType] = &[DataType::Bool];

/// Define a boolean connective: broadcast shape, bool-only operands,
/// elementwise fold.
macro_rules! logical_binary_op {
    ($(#[$doc:meta])* $name:ident, $bool_op:expr) => {
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
                logic_binary_dtype(inputs, BOOL_DTYPES)
            }

            fn infer_value(&self, inputs: &[Operand]) -> Result<Option<Value>, OpError> {
                Ok(fold_bool_binary(inputs, $bool_op))
            }
        }
    };
}

logical_binary_op!(
    /// Elementwise logical AND.
    LogicalAnd,
    |x, y| x && y
);

logical_binary_op!(
    /// Elementwise logical OR.
    LogicalOr,
    |x, y| x || y
);

/// Elementwise logical negation of a boolean tensor.
#[derive(Clone, Debug, Default)]
pub struct LogicalNot {}

impl Infer for LogicalNot {
    fn name(&self) -> &str {
        "LogicalNot"
    }

    fn infer_shape(&self, inputs: &[Operand]) -> Result<OutputShapes, OpError> {
        expect_inputs!(inputs, x);
        Ok([x.shape.clone()].into())
    }

    fn infer_dtype(&self, inputs: &[Operand]) -> Result<OutputDTypes, OpError> {
        expect_inputs!(inputs, x);
        check_dtype_valid("x", x.dtype, BOOL_DTYPES)?;
        Ok([DataType::Bool].into())
    }

    fn infer_value(&self, inputs: &[Operand]) -> Result<Option<Value>, OpError> {
        expect_inputs!(inputs, x);
        let Some(value) = x.value.as_ref() else {
            return Ok(None);
        };
        let data = (0..value.len()).map(|i| !value.bool_at(i)).collect();
        Ok(Some(Value::from_bools(value.shape().clone(), data)))
    }
}

/// Element types accepted by [`ApproximateEqual`].
const APPROX_EQUAL_DTYPES: &[DataType] = &[DataType::Float16, DataType::Float32];

/// Elementwise `|x - y| < tolerance`.
///
/// Unlike the comparison operators this requires both inputs to have the
/// same shape; no broadcasting is applied.
#[derive(Clone, Debug)]
pub struct ApproximateEqual {
    pub tolerance: f32,
}

impl Infer for ApproximateEqual {
    fn name(&self) -> &str {
        "ApproximateEqual"
    }

    fn infer_shape(&self, inputs: &[Operand]) -> Result<OutputShapes, OpError> {
        expect_inputs!(inputs, x, y);
        check_shapes_match("x", &x.shape, "y", &y.shape)?;
        Ok([x.shape.clone()].into())
    }

    fn infer_dtype(&self, inputs: &[Operand]) -> Result<OutputDTypes, OpError> {
        expect_inputs!(inputs, x, y);
        check_dtypes_same_and_valid(&[("x", x), ("y", y)], APPROX_EQUAL_DTYPES)?;
        Ok([DataType::Bool].into())
    }
}

/// Counts the positions where two equal-shaped tensors agree.
///
/// The output is a 1-element tensor of the input dtype.
#[derive(Clone, Debug, Default)]
pub struct EqualCount {}

impl Infer for EqualCount {
    fn name(&self) -> &str {
        "EqualCount"
    }

    fn infer_shape(&self, inputs: &[Operand]) -> Result<OutputShapes, OpError> {
        expect_inputs!(inputs, x, y);
        check_shapes_match("x", &x.shape, "y", &y.shape)?;
        Ok([crate::shape![1]].into())
    }

    fn infer_dtype(&self, inputs: &[Operand]) -> Result<OutputDTypes, OpError> {
        expect_inputs!(inputs, x, y);
        let dtype = check_dtypes_same_and_valid(&[("x", x), ("y", y)], NUMBER_OR_BOOL_DTYPES)?;
        Ok([dtype].into())
    }
}

#[cfg(test)]
mod tests {
    use opsig_testing::TestCases;

    use crate::infer::{Infer, OpError};
    use crate::shape;
    use crate::value::{DataType, Operand, Value};

    use super::{
        ApproximateEqual, Equal, EqualCount, Greater, Less, LogicalAnd, LogicalNot, LogicalOr,
        NotEqual,
    };

    #[test]
    fn test_comparison_dtype_is_bool() {
        let inputs = [
            Operand::new(shape![2, 3], DataType::Float32),
            Operand::new(shape![3], DataType::Float32),
        ];
        for op in [&Equal {} as &dyn Infer, &Greater {}, &Less {}] {
            let dtypes = op.infer_dtype(&inputs).unwrap();
            assert_eq!(dtypes.as_slice(), &[DataType::Bool]);
            let shapes = op.infer_shape(&inputs).unwrap();
            assert_eq!(shapes.as_slice(), &[shape![2, 3]]);
        }

        // Equal accepts bools; Greater does not.
        let bools = [
            Operand::new(shape![2], DataType::Bool),
            Operand::new(shape![2], DataType::Bool),
        ];
        assert!(Equal {}.infer_dtype(&bools).is_ok());
        assert!(Greater {}.infer_dtype(&bools).is_err());
    }

    #[test]
    fn test_equal_fold_with_scalar() {
        // Tensor compared against a scalar constant of a different dtype.
        let x = Operand::from_value(Value::from_ints(shape![3], DataType::Int32, vec![1, 2, 3]));
        let y = Operand::from_value(Value::scalar_float(DataType::Float32, 2.0));
        let value = Equal {}.infer_value(&[x.clone(), y.clone()]).unwrap().unwrap();
        assert_eq!(value.dtype(), DataType::Bool);
        assert_eq!(value.as_bools(), Some([false, true, false].as_slice()));

        let value = NotEqual {}.infer_value(&[x, y]).unwrap().unwrap();
        assert_eq!(value.as_bools(), Some([true, false, true].as_slice()));
    }

    #[test]
    fn test_ordering_folds() {
        #[derive(Debug)]
        struct Case {
            op: &'static str,
            expected: [bool; 3],
        }

        let cases = [
            Case {
                op: "Greater",
                expected: [false, false, true],
            },
            Case {
                op: "Less",
                expected: [true, false, false],
            },
        ];

        cases.test_each(|case| {
            let x =
                Operand::from_value(Value::from_ints(shape![3], DataType::Int32, vec![1, 2, 3]));
            let y =
                Operand::from_value(Value::from_ints(shape![3], DataType::Int32, vec![2, 2, 2]));
            let op: Box<dyn Infer> = match case.op {
                "Greater" => Box::new(Greater {}),
                _ => Box::new(Less {}),
            };
            let value = op.infer_value(&[x, y]).unwrap().unwrap();
            assert_eq!(value.as_bools(), Some(case.expected.as_slice()));
        });
    }

    #[test]
    fn test_logical_ops() {
        let x = Operand::from_value(Value::from_bools(shape![2], vec![true, false]));
        let y = Operand::from_value(Value::from_bools(shape![2], vec![true, true]));

        let value = LogicalAnd {}.infer_value(&[x.clone(), y.clone()]).unwrap().unwrap();
        assert_eq!(value.as_bools(), Some([true, false].as_slice()));

        let value = LogicalOr {}.infer_value(&[x.clone(), y]).unwrap().unwrap();
        assert_eq!(value.as_bools(), Some([true, true].as_slice()));

        let value = LogicalNot {}.infer_value(&[x]).unwrap().unwrap();
        assert_eq!(value.as_bools(), Some([false, true].as_slice()));

        // Non-bool operands are rejected.
        let ints = [
            Operand::new(shape![2], DataType::Int32),
            Operand::new(shape![2], DataType::Int32),
        ];
        assert!(matches!(
            LogicalAnd {}.infer_dtype(&ints).err().unwrap(),
            OpError::UnsupportedDType { .. }
        ));
        assert!(LogicalNot {}.infer_dtype(&ints[..1]).is_err());
    }

    #[test]
    fn test_approximate_equal() {
        let op = ApproximateEqual { tolerance: 1e-3 };
        let inputs = [
            Operand::new(shape![2, 3], DataType::Float32),
            Operand::new(shape![2, 3], DataType::Float32),
        ];
        assert_eq!(op.infer_dtype(&inputs).unwrap().as_slice(), &[DataType::Bool]);

        // Shapes must match exactly; broadcasting does not apply.
        let inputs = [
            Operand::new(shape![2, 3], DataType::Float32),
            Operand::new(shape![3], DataType::Float32),
        ];
        assert!(op.infer_shape(&inputs).is_err());

        // Only f16/f32 operands are accepted.
        let inputs = [
            Operand::new(shape![2], DataType::Float64),
            Operand::new(shape![2], DataType::Float64),
        ];
        assert!(op.infer_dtype(&inputs).is_err());
    }

    #[test]
    fn test_equal_count() {
        let inputs = [
            Operand::new(shape![4], DataType::Int32),
            Operand::new(shape![4], DataType::Int32),
        ];
        let op = EqualCount {};
        assert_eq!(op.infer_shape(&inputs).unwrap().as_slice(), &[shape![1]]);
        assert_eq!(
            op.infer_dtype(&inputs).unwrap().as_slice(),
            &[DataType::Int32]
        );

        let inputs = [
            Operand::new(shape![4], DataType::Int32),
            Operand::new(shape![5], DataType::Int32),
        ];
        assert!(op.infer_shape(&inputs).is_err());
    }
}
