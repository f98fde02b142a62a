//! Checks applied to operand dtypes, shapes and attribute values.
//!
//! Each check returns the validated value on success and a typed [`OpError`]
//! naming the offending operand or attribute otherwise. Checks are total
//! functions with no side effects; operator contracts compose them and
//! propagate the first failure.

use crate::infer::OpError;
use crate::shape::{Dim, Shape};
use crate::value::{DataType, Operand};

/// Bound handling for [`check_int_range`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Bounds {
    /// `low <= value < high`
    LeftInclusive,
    /// `low <= value <= high`
    Inclusive,
    /// `low < value < high`
    Exclusive,
}

/// Check that an integer attribute lies within a range.
pub fn check_int_range(
    label: &str,
    value: i64,
    low: i64,
    high: i64,
    bounds: Bounds,
) -> Result<i64, OpError> {
    let ok = match bounds {
        Bounds::LeftInclusive => low <= value && value < high,
        Bounds::Inclusive => low <= value && value <= high,
        Bounds::Exclusive => low < value && value < high,
    };
    if ok {
        Ok(value)
    } else {
        let (left, right) = match bounds {
            Bounds::LeftInclusive => ('[', ')'),
            Bounds::Inclusive => ('[', ']'),
            Bounds::Exclusive => ('(', ')'),
        };
        Err(OpError::InvalidValue(format!(
            "{} must be in {}{}, {}{} but is {}",
            label, left, low, high, right, value
        )))
    }
}

/// Check that an operand's element type belongs to an allowed set.
pub fn check_dtype_valid(
    label: &str,
    dtype: DataType,
    allowed: &'static [DataType],
) -> Result<DataType, OpError> {
    if allowed.contains(&dtype) {
        Ok(dtype)
    } else {
        Err(OpError::UnsupportedDType {
            label: label.to_string(),
            actual: dtype,
            allowed,
        })
    }
}

/// Check that a group of operands have valid and mutually consistent element
/// types, returning the promoted type.
///
/// Every dtype must belong to `allowed`. Operands of rank > 0 must agree on
/// their dtype exactly. Rank-0 operands take the implicit conversion path:
/// they may carry any allowed dtype, and the result promotes over them using
/// the total promotion order.
pub fn check_dtypes_same_and_valid(
    args: &[(&str, &Operand)],
    allowed: &'static [DataType],
) -> Result<DataType, OpError> {
    let mut promoted: Option<DataType> = None;
    let mut tensor_arg: Option<(&str, DataType)> = None;

    for &(label, operand) in args {
        check_dtype_valid(label, operand.dtype, allowed)?;

        if !operand.is_scalar() {
            if let Some((first_label, first_dtype)) = tensor_arg {
                if first_dtype != operand.dtype {
                    return Err(OpError::DTypeMismatch {
                        label_a: first_label.to_string(),
                        dtype_a: first_dtype,
                        label_b: label.to_string(),
                        dtype_b: operand.dtype,
                    });
                }
            } else {
                tensor_arg = Some((label, operand.dtype));
            }
        }

        promoted = Some(match promoted {
            Some(dtype) => dtype.promote(operand.dtype),
            None => operand.dtype,
        });
    }

    promoted.ok_or(OpError::MissingInputs)
}

/// Check that two dimensions describe the same extent.
///
/// Unknown dimensions are exempt and match anything.
pub fn check_dims_match(label_a: &str, a: Dim, label_b: &str, b: Dim) -> Result<(), OpError> {
    if a.matches(b) {
        Ok(())
    } else {
        Err(OpError::IncompatibleShapes(format!(
            "{} ({}) does not match {} ({})",
            label_a, a, label_b, b
        )))
    }
}

/// Check that two shapes have equal rank and matching dimensions, with the
/// unknown-dimension exemption.
pub fn check_shapes_match(
    label_a: &str,
    a: &Shape,
    label_b: &str,
    b: &Shape,
) -> Result<(), OpError> {
    if a.matches(b) {
        Ok(())
    } else {
        Err(OpError::IncompatibleShapes(format!(
            "{} {} does not match {} {}",
            label_a, a, label_b, b
        )))
    }
}

/// Check that an operand has exactly `ndim` dimensions.
pub fn check_ndim(label: &str, operand: &Operand, ndim: usize) -> Result<(), OpError> {
    if operand.ndim() == ndim {
        Ok(())
    } else {
        Err(OpError::IncompatibleShapes(format!(
            "{} must have {} dims but has {}",
            label,
            ndim,
            operand.ndim()
        )))
    }
}

#[cfg(test)]
mod tests {
    use crate::infer::OpError;
    use crate::shape;
    use crate::shape::Dim;
    use crate::value::{DataType, NUMBER_DTYPES, Operand};

    use super::{
        Bounds, check_dims_match, check_dtype_valid, check_dtypes_same_and_valid, check_int_range,
        check_ndim, check_shapes_match,
    };

    #[test]
    fn test_check_int_range() {
        assert_eq!(check_int_range("axis", 0, 0, 3, Bounds::LeftInclusive), Ok(0));
        assert_eq!(check_int_range("axis", 2, 0, 3, Bounds::LeftInclusive), Ok(2));
        assert!(check_int_range("axis", 3, 0, 3, Bounds::LeftInclusive).is_err());
        assert_eq!(check_int_range("n", 3, 0, 3, Bounds::Inclusive), Ok(3));
        assert!(check_int_range("n", 0, 0, 3, Bounds::Exclusive).is_err());

        let err = check_int_range("axis", 5, -2, 2, Bounds::LeftInclusive)
            .err()
            .unwrap();
        assert_eq!(
            err,
            OpError::InvalidValue("axis must be in [-2, 2) but is 5".to_string())
        );
    }

    #[test]
    fn test_check_dtype_valid() {
        assert_eq!(
            check_dtype_valid("x", DataType::Float32, NUMBER_DTYPES),
            Ok(DataType::Float32)
        );
        let err = check_dtype_valid("x", DataType::Bool, NUMBER_DTYPES)
            .err()
            .unwrap();
        assert_eq!(
            err,
            OpError::UnsupportedDType {
                label: "x".to_string(),
                actual: DataType::Bool,
                allowed: NUMBER_DTYPES,
            }
        );
    }

    #[test]
    fn test_check_dtypes_same_and_valid() {
        let x = Operand::new(shape![2, 3], DataType::Float32);
        let y = Operand::new(shape![2, 3], DataType::Float32);
        let result = check_dtypes_same_and_valid(&[("x", &x), ("y", &y)], NUMBER_DTYPES);
        assert_eq!(result, Ok(DataType::Float32));

        // Two tensors of different dtypes are rejected.
        let y = Operand::new(shape![2, 3], DataType::Int32);
        let err = check_dtypes_same_and_valid(&[("x", &x), ("y", &y)], NUMBER_DTYPES)
            .err()
            .unwrap();
        assert!(matches!(err, OpError::DTypeMismatch { .. }));

        // A scalar operand takes the implicit conversion path and promotes.
        let scalar = Operand::new(shape![], DataType::Int32);
        let result = check_dtypes_same_and_valid(&[("x", &x), ("y", &scalar)], NUMBER_DTYPES);
        assert_eq!(result, Ok(DataType::Float32));

        let wide_scalar = Operand::new(shape![], DataType::Float64);
        let result =
            check_dtypes_same_and_valid(&[("x", &x), ("y", &wide_scalar)], NUMBER_DTYPES);
        assert_eq!(result, Ok(DataType::Float64));

        // Invalid dtype anywhere in the group fails.
        let bad = Operand::new(shape![], DataType::Bool);
        assert!(check_dtypes_same_and_valid(&[("x", &x), ("y", &bad)], NUMBER_DTYPES).is_err());
    }

    #[test]
    fn test_check_dims_and_shapes_match() {
        assert!(check_dims_match("a", Dim::Fixed(3), "b", Dim::Fixed(3)).is_ok());
        assert!(check_dims_match("a", Dim::Unknown, "b", Dim::Fixed(3)).is_ok());
        assert!(check_dims_match("a", Dim::Fixed(2), "b", Dim::Fixed(3)).is_err());

        assert!(check_shapes_match("a", &shape![2, 3], "b", &shape![2, 3]).is_ok());
        assert!(check_shapes_match("a", &shape![2, Dim::Unknown], "b", &shape![2, 5]).is_ok());
        assert!(check_shapes_match("a", &shape![2, 3], "b", &shape![2, 4]).is_err());
        assert!(check_shapes_match("a", &shape![2, 3], "b", &shape![2, 3, 1]).is_err());
    }

    #[test]
    fn test_check_ndim() {
        let x = Operand::new(shape![2, 3], DataType::Float32);
        assert!(check_ndim("x", &x, 2).is_ok());
        let err = check_ndim("x", &x, 3).err().unwrap();
        assert_eq!(
            err,
            OpError::IncompatibleShapes("x must have 3 dims but has 2".to_string())
        );
    }
}
