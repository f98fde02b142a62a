//! Operators that update the storage referenced by one of their operands.
//!
//! These flag a memory side effect so that the scheduler orders them after
//! all readers of the operand's prior value and before all readers of the
//! new value. Their outputs mirror the mutated operand's shape and dtype
//! and are never constant folded.

use crate::check::{
    Bounds, check_dims_match, check_dtype_valid, check_dtypes_same_and_valid, check_int_range,
    check_ndim, check_shapes_match,
};
use crate::infer::{Infer, OpError, OutputDTypes, OutputShapes, expect_inputs};
use crate::shape::{Dim, resolve_axis};
use crate::value::{DataType, NUMBER_DTYPES, Operand};

/// Define an accumulating assignment operator (AssignAdd/AssignSub).
///
/// The first operand is the parameter being updated; the second is the
/// delta, which must have the parameter's shape or be a scalar.
macro_rules! assign_op {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, Debug, Default)]
        pub struct $name {}

        impl Infer for $name {
            fn name(&self) -> &str {
                stringify!($name)
            }

            fn infer_shape(&self, inputs: &[Operand]) -> Result<OutputShapes, OpError> {
                expect_inputs!(inputs, variable, value);
                if !value.is_scalar() {
                    check_shapes_match("variable", &variable.shape, "value", &value.shape)?;
                }
                Ok([variable.shape.clone()].into())
            }

            fn infer_dtype(&self, inputs: &[Operand]) -> Result<OutputDTypes, OpError> {
                expect_inputs!(inputs, variable, value);
                check_dtypes_same_and_valid(
                    &[("variable", variable), ("value", value)],
                    NUMBER_DTYPES,
                )?;
                Ok([variable.dtype].into())
            }

            fn has_memory_side_effect(&self) -> bool {
                true
            }
        }
    };
}

assign_op!(
    /// Updates a parameter by adding a value to it.
    AssignAdd
);

assign_op!(
    /// Updates a parameter by subtracting a value from it.
    AssignSub
);

/// Element types accepted by [`InplaceAdd`] and [`InplaceSub`].
const INPLACE_DTYPES: &[DataType] = &[DataType::Int32, DataType::Float16, DataType::Float32];

/// Shared shape rule for the Inplace operators: `v` updates the rows of `x`
/// selected by the fixed index set.
fn inplace_shape(indices: &[i64], inputs: &[Operand]) -> Result<OutputShapes, OpError> {
    expect_inputs!(inputs, x, v);
    if x.ndim() != v.ndim() {
        return Err(OpError::IncompatibleShapes(format!(
            "x has rank {} but v has rank {}",
            x.ndim(),
            v.ndim()
        )));
    }
    if x.ndim() == 0 {
        return Err(OpError::IncompatibleShapes(
            "x must have at least 1 dim".to_string(),
        ));
    }

    check_dims_match(
        "size of indices",
        Dim::Fixed(indices.len()),
        "v's first dimension",
        v.dim(0),
    )?;

    if let Dim::Fixed(rows) = x.dim(0) {
        for &index in indices {
            check_int_range("indices", index, 0, rows as i64, Bounds::LeftInclusive)?;
        }
    }

    for dim in 1..x.ndim() {
        check_dims_match(
            &format!("v dim {}", dim),
            v.dim(dim),
            &format!("x dim {}", dim),
            x.dim(dim),
        )?;
    }

    Ok([x.shape.clone()].into())
}

/// Define an InplaceAdd/InplaceSub operator. The row-index set is a fixed
/// attribute; `v` supplies one row per index.
macro_rules! inplace_op {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, Debug)]
        pub struct $name {
            /// Indices into the first dimension of `x` selecting the rows to
            /// update.
            pub indices: Vec<i64>,
        }

        impl Infer for $name {
            fn name(&self) -> &str {
                stringify!($name)
            }

            fn infer_shape(&self, inputs: &[Operand]) -> Result<OutputShapes, OpError> {
                inplace_shape(&self.indices, inputs)
            }

            fn infer_dtype(&self, inputs: &[Operand]) -> Result<OutputDTypes, OpError> {
                expect_inputs!(inputs, x, v);
                check_dtypes_same_and_valid(&[("x", x), ("v", v)], INPLACE_DTYPES)?;
                Ok([x.dtype].into())
            }

            fn has_memory_side_effect(&self) -> bool {
                true
            }
        }
    };
}

inplace_op!(
    /// Adds `v` into the selected rows of `x`.
    InplaceAdd
);

inplace_op!(
    /// Subtracts `v` from the selected rows of `x`.
    InplaceSub
);

/// Element types accepted by [`IndexAdd`]'s tensor operands.
const INDEX_ADD_DTYPES: &[DataType] = &[
    DataType::Float64,
    DataType::Float32,
    DataType::Float16,
    DataType::Int32,
    DataType::Int16,
    DataType::Int8,
    DataType::UInt8,
];

/// Element types accepted by [`IndexAdd`]'s index operand.
const INDEX_DTYPES: &[DataType] = &[DataType::Int32];

/// Adds `y` into the slices of `x` selected by `indices` along `axis`.
#[derive(Clone, Debug)]
pub struct IndexAdd {
    /// The dimension along which to index.
    pub axis: i64,
}

impl Infer for IndexAdd {
    fn name(&self) -> &str {
        "IndexAdd"
    }

    fn infer_shape(&self, inputs: &[Operand]) -> Result<OutputShapes, OpError> {
        expect_inputs!(inputs, x, indices, y);
        if x.ndim() != y.ndim() {
            return Err(OpError::IncompatibleShapes(format!(
                "x has rank {} but y has rank {}",
                x.ndim(),
                y.ndim()
            )));
        }
        let x_rank = x.ndim() as i64;
        check_int_range("axis", self.axis, -x_rank - 1, x_rank, Bounds::Exclusive)?;
        let axis = resolve_axis(x.ndim(), self.axis)?;

        check_ndim("indices", indices, 1)?;
        check_dims_match(
            "size of indices",
            indices.dim(0),
            "dimension of y[axis]",
            y.dim(axis),
        )?;

        for dim in 0..x.ndim() {
            if dim != axis {
                check_dims_match(
                    &format!("x dim {}", dim),
                    x.dim(dim),
                    &format!("y dim {}", dim),
                    y.dim(dim),
                )?;
            }
        }

        Ok([x.shape.clone()].into())
    }

    fn infer_dtype(&self, inputs: &[Operand]) -> Result<OutputDTypes, OpError> {
        expect_inputs!(inputs, x, indices, y);
        check_dtypes_same_and_valid(&[("input_x", x), ("input_y", y)], INDEX_ADD_DTYPES)?;
        check_dtype_valid("indices", indices.dtype, INDEX_DTYPES)?;
        Ok([x.dtype].into())
    }

    fn has_memory_side_effect(&self) -> bool {
        true
    }
}
