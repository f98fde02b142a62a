//! Elementwise unary operators.
//!
//! These keep the input shape and, except for the predicates at the bottom
//! of this module, the input element type.

use crate::check::check_dtype_valid;
use crate::infer::{Infer, OpError, OutputDTypes, OutputShapes, expect_inputs};
use crate::ops::fold::fold_numeric_unary;
use crate::shape;
use crate::value::{
    DataType, FLOAT_DTYPES, NUMBER_DTYPES, NUMBER_OR_BOOL_DTYPES, Operand, Value,
};

/// Output shape of a unary operator: the input shape, unchanged.
fn unary_shape(inputs: &[Operand]) -> Result<OutputShapes, OpError> {
    expect_inputs!(inputs, x);
    Ok([x.shape.clone()].into())
}

/// Define an elementwise unary operator with a restricted dtype set and
/// optionally a constant-folding rule.
macro_rules! unary_op {
    ($(#[$doc:meta])* $name:ident, $allowed:expr) => {
        $(#[$doc])*
        #[derive(Clone, Debug, Default)]
        pub struct $name {}

        impl Infer for $name {
            fn name(&self) -> &str {
                stringify!($name)
            }

            fn infer_shape(&self, inputs: &[Operand]) -> Result<OutputShapes, OpError> {
                unary_shape(inputs)
            }

            fn infer_dtype(&self, inputs: &[Operand]) -> Result<OutputDTypes, OpError> {
                expect_inputs!(inputs, x);
                let dtype = check_dtype_valid("x", x.dtype, $allowed)?;
                Ok([dtype].into())
            }
        }
    };

    ($(#[$doc:meta])* $name:ident, $allowed:expr, fold($float_op:expr, $int_op:expr)) => {
        $(#[$doc])*
        #[derive(Clone, Debug, Default)]
        pub struct $name {}

        impl Infer for $name {
            fn name(&self) -> &str {
                stringify!($name)
            }

            fn infer_shape(&self, inputs: &[Operand]) -> Result<OutputShapes, OpError> {
                unary_shape(inputs)
            }

            fn infer_dtype(&self, inputs: &[Operand]) -> Result<OutputDTypes, OpError> {
                expect_inputs!(inputs, x);
                let dtype = check_dtype_valid("x", x.dtype, $allowed)?;
                Ok([dtype].into())
            }

            fn infer_value(&self, inputs: &[Operand]) -> Result<Option<Value>, OpError> {
                expect_inputs!(inputs, x);
                let folded = fold_numeric_unary(x, x.dtype, $float_op, $int_op);
                Ok(folded)
            }
        }
    };
}

unary_op!(
    /// Elementwise numerical negation.
    Neg,
    NUMBER_DTYPES,
    fold(|x| -x, |x: i64| x.wrapping_neg())
);

unary_op!(
    /// Elementwise absolute value.
    Abs,
    NUMBER_DTYPES,
    fold(|x: f64| x.abs(), |x: i64| x.wrapping_abs())
);

unary_op!(
    /// Elementwise sign: -1, 0 or 1.
    Sign,
    NUMBER_DTYPES
);

unary_op!(
    /// Rounds elementwise to the nearest integer.
    Round,
    NUMBER_DTYPES
);

unary_op!(
    /// Elementwise square.
    Square,
    NUMBER_DTYPES,
    fold(|x| x * x, |x: i64| x.wrapping_mul(x))
);

unary_op!(
    /// Elementwise square root.
    ///
    /// Integer inputs compute through floats and truncate, matching the
    /// runtime's cast back to the input type.
    Sqrt,
    NUMBER_DTYPES,
    fold(|x: f64| x.sqrt(), |x: i64| (x as f64).sqrt() as i64)
);

unary_op!(
    /// Elementwise reciprocal of the square root.
    Rsqrt,
    NUMBER_DTYPES,
    fold(|x: f64| 1. / x.sqrt(), |x: i64| (1. / (x as f64).sqrt()) as i64)
);

unary_op!(
    /// Elementwise reciprocal.
    Reciprocal,
    NUMBER_OR_BOOL_DTYPES,
    fold(|x| 1. / x, |x: i64| (1. / x as f64) as i64)
);

unary_op!(
    /// Elementwise natural exponential.
    Exp,
    NUMBER_OR_BOOL_DTYPES,
    fold(|x: f64| x.exp(), |x: i64| (x as f64).exp() as i64)
);

unary_op!(
    /// Elementwise natural logarithm.
    Log,
    NUMBER_OR_BOOL_DTYPES,
    fold(|x: f64| x.ln(), |x: i64| (x as f64).ln() as i64)
);

/// Element types accepted by the half/single-precision-only transcendental
/// operators.
const F16_F32_DTYPES: &[DataType] = &[DataType::Float16, DataType::Float32];

unary_op!(
    /// Elementwise `exp(x) - 1`.
    Expm1,
    F16_F32_DTYPES
);

unary_op!(
    /// Elementwise `log(1 + x)`.
    Log1p,
    F16_F32_DTYPES
);

unary_op!(
    /// Gauss error function, elementwise.
    Erf,
    F16_F32_DTYPES
);

unary_op!(
    /// Complementary error function, elementwise.
    Erfc,
    F16_F32_DTYPES
);

unary_op!(
    /// Rounds elementwise down to the closest integer.
    Floor,
    FLOAT_DTYPES
);

unary_op!(
    /// Rounds elementwise up to the closest integer.
    Ceil,
    F16_F32_DTYPES
);

unary_op!(
    /// Elementwise cosine (radians).
    Cos,
    NUMBER_DTYPES
);

unary_op!(
    /// Elementwise sine (radians).
    Sin,
    NUMBER_DTYPES
);

/// Element types accepted by [`Tan`] and [`Inv`].
const TAN_DTYPES: &[DataType] = &[DataType::Float16, DataType::Float32, DataType::Int32];

unary_op!(
    /// Elementwise tangent (radians).
    Tan,
    TAN_DTYPES
);

unary_op!(
    /// Elementwise arccosine.
    ACos,
    NUMBER_DTYPES
);

unary_op!(
    /// Elementwise arcsine.
    Asin,
    NUMBER_DTYPES
);

unary_op!(
    /// Elementwise arctangent.
    Atan,
    NUMBER_DTYPES
);

unary_op!(
    /// Elementwise hyperbolic cosine.
    Cosh,
    NUMBER_DTYPES
);

unary_op!(
    /// Elementwise hyperbolic sine.
    Sinh,
    NUMBER_DTYPES
);

unary_op!(
    /// Elementwise inverse hyperbolic cosine.
    Acosh,
    NUMBER_DTYPES
);

unary_op!(
    /// Elementwise inverse hyperbolic sine.
    Asinh,
    NUMBER_DTYPES
);

unary_op!(
    /// Elementwise inverse hyperbolic tangent.
    Atanh,
    NUMBER_DTYPES
);

unary_op!(
    /// Exponentially scaled modified Bessel function of order 0.
    BesselI0e,
    NUMBER_DTYPES
);

unary_op!(
    /// Exponentially scaled modified Bessel function of order 1.
    BesselI1e,
    NUMBER_DTYPES
);

unary_op!(
    /// Elementwise reciprocal, restricted to the types the Inv kernel
    /// supports.
    Inv,
    TAN_DTYPES
);

/// Element types accepted by [`Invert`].
const INVERT_DTYPES: &[DataType] = &[DataType::Int16, DataType::UInt16];

unary_op!(
    /// Elementwise bitwise NOT.
    Invert,
    INVERT_DTYPES
);

/// Define a unary predicate: shape passes through, output dtype is bool.
macro_rules! unary_predicate_op {
    ($(#[$doc:meta])* $name:ident, $allowed:expr) => {
        $(#[$doc])*
        #[derive(Clone, Debug, Default)]
        pub struct $name {}

        impl Infer for $name {
            fn name(&self) -> &str {
                stringify!($name)
            }

            fn infer_shape(&self, inputs: &[Operand]) -> Result<OutputShapes, OpError> {
                unary_shape(inputs)
            }

            fn infer_dtype(&self, inputs: &[Operand]) -> Result<OutputDTypes, OpError> {
                expect_inputs!(inputs, x);
                check_dtype_valid("x", x.dtype, $allowed)?;
                Ok([DataType::Bool].into())
            }
        }
    };
}

unary_predicate_op!(
    /// Marks the positions holding NaN.
    IsNan,
    NUMBER_OR_BOOL_DTYPES
);

unary_predicate_op!(
    /// Marks the positions holding positive or negative infinity.
    IsInf,
    NUMBER_OR_BOOL_DTYPES
);

unary_predicate_op!(
    /// Marks the positions holding finite values.
    IsFinite,
    NUMBER_OR_BOOL_DTYPES
);

/// Summarizes whether a float tensor contains any NaN or infinity.
///
/// The output is a single-element f32 tensor: the kernel writes a non-zero
/// value if an overflow status was detected.
#[derive(Clone, Debug, Default)]
pub struct FloatStatus {}

impl Infer for FloatStatus {
    fn name(&self) -> &str {
        "FloatStatus"
    }

    fn infer_shape(&self, inputs: &[Operand]) -> Result<OutputShapes, OpError> {
        expect_inputs!(inputs, _x);
        Ok([shape![1]].into())
    }

    fn infer_dtype(&self, inputs: &[Operand]) -> Result<OutputDTypes, OpError> {
        expect_inputs!(inputs, x);
        check_dtype_valid("x", x.dtype, F16_F32_DTYPES)?;
        Ok([DataType::Float32].into())
    }
}

/// Produces a tensor of the input's shape filled with the smallest positive
/// representable step of its element type.
///
/// The fill is a fixed constant per dtype, so the output folds whenever the
/// input shape is fully known; the input's contents are irrelevant.
#[derive(Clone, Debug, Default)]
pub struct Eps {}

impl Infer for Eps {
    fn name(&self) -> &str {
        "Eps"
    }

    fn infer_shape(&self, inputs: &[Operand]) -> Result<OutputShapes, OpError> {
        unary_shape(inputs)
    }

    fn infer_dtype(&self, inputs: &[Operand]) -> Result<OutputDTypes, OpError> {
        expect_inputs!(inputs, x);
        let dtype = check_dtype_valid("x", x.dtype, F16_F32_DTYPES)?;
        Ok([dtype].into())
    }

    fn infer_value(&self, inputs: &[Operand]) -> Result<Option<Value>, OpError> {
        expect_inputs!(inputs, x);
        if !x.shape.is_fully_known() {
            return Ok(None);
        }
        let fill = match x.dtype {
            DataType::Float16 => (2.0f64).powi(-14),
            _ => (2.0f64).powi(-16),
        };
        Ok(Some(Value::full_float(x.shape.clone(), x.dtype, fill)))
    }
}
