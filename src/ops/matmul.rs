//! Matrix multiplication operators.

use smallvec::SmallVec;

use crate::check::{check_dims_match, check_dtypes_same_and_valid};
use crate::infer::{Infer, OpError, OutputDTypes, OutputShapes, expect_inputs};
use crate::shape::{Dim, Shape};
use crate::value::{DataType, Operand};

/// Element types accepted by the matrix multiplication operators.
const MATMUL_DTYPES: &[DataType] = &[
    DataType::Float16,
    DataType::Float32,
    DataType::Float64,
    DataType::Int8,
    DataType::Int16,
    DataType::Int32,
    DataType::Int64,
];

/// Pick the known dimension out of a matching pair.
fn merge_dim(a: Dim, b: Dim) -> Dim {
    match a {
        Dim::Unknown => b,
        _ => a,
    }
}

/// Compute the output shape of multiplying `x1` and `x2`, whose last two
/// dimensions are the matrices. Leading dimensions must match pairwise and
/// carry over to the output. Ranks must already be validated as equal and
/// at least 2.
fn matmul_output_shape(
    x1: &Shape,
    x2: &Shape,
    transpose_a: bool,
    transpose_b: bool,
) -> Result<Shape, OpError> {
    let ndim = x1.ndim();
    debug_assert!(ndim >= 2 && x2.ndim() == ndim);

    let mut out_dims: SmallVec<[Dim; 4]> = SmallVec::with_capacity(ndim);
    for i in 0..ndim - 2 {
        check_dims_match(
            &format!("x1 dim {}", i),
            x1.dim(i),
            &format!("x2 dim {}", i),
            x2.dim(i),
        )?;
        out_dims.push(merge_dim(x1.dim(i), x2.dim(i)));
    }

    let (a_rows, a_cols) = (x1.dim(ndim - 2), x1.dim(ndim - 1));
    let (b_rows, b_cols) = (x2.dim(ndim - 2), x2.dim(ndim - 1));

    let (rows, inner_a) = if transpose_a {
        (a_cols, a_rows)
    } else {
        (a_rows, a_cols)
    };
    let (inner_b, cols) = if transpose_b {
        (b_cols, b_rows)
    } else {
        (b_rows, b_cols)
    };

    // Unknown inner dimensions bypass the equality check.
    if !inner_a.matches(inner_b) {
        return Err(OpError::IncompatibleShapes(format!(
            "inner dimensions {} and {} do not match, with x1 {} (transpose_a={}), x2 {} (transpose_b={})",
            inner_a, inner_b, x1, transpose_a, x2, transpose_b,
        )));
    }

    out_dims.push(rows);
    out_dims.push(cols);
    Ok(Shape::from_dims(out_dims))
}

fn matmul_dtype(inputs: &[Operand]) -> Result<OutputDTypes, OpError> {
    expect_inputs!(inputs, x1, x2);
    let dtype = check_dtypes_same_and_valid(&[("x1", x1), ("x2", x2)], MATMUL_DTYPES)?;
    Ok([dtype].into())
}

/// Multiplies two matrices.
///
/// Both inputs must have rank 2. With `transpose_a`/`transpose_b` set, the
/// corresponding input is transposed before multiplication.
#[derive(Clone, Debug, Default)]
pub struct MatMul {
    pub transpose_a: bool,
    pub transpose_b: bool,
}

impl Infer for MatMul {
    fn name(&self) -> &str {
        "MatMul"
    }

    fn infer_shape(&self, inputs: &[Operand]) -> Result<OutputShapes, OpError> {
        expect_inputs!(inputs, x1, x2);
        crate::check::check_ndim("x1", x1, 2)?;
        crate::check::check_ndim("x2", x2, 2)?;
        let out = matmul_output_shape(&x1.shape, &x2.shape, self.transpose_a, self.transpose_b)?;
        Ok([out].into())
    }

    fn infer_dtype(&self, inputs: &[Operand]) -> Result<OutputDTypes, OpError> {
        matmul_dtype(inputs)
    }
}

/// Multiplies two batches of matrices.
///
/// Both inputs must have the same rank, at least 3. The last two dimensions
/// are the matrices; all leading dimensions are batch dimensions and must
/// match pairwise.
#[derive(Clone, Debug, Default)]
pub struct BatchMatMul {
    pub transpose_a: bool,
    pub transpose_b: bool,
}

impl Infer for BatchMatMul {
    fn name(&self) -> &str {
        "BatchMatMul"
    }

    fn infer_shape(&self, inputs: &[Operand]) -> Result<OutputShapes, OpError> {
        expect_inputs!(inputs, x1, x2);
        if x1.ndim() != x2.ndim() || x1.ndim() < 3 {
            return Err(OpError::IncompatibleShapes(format!(
                "x1 and x2 must have the same rank, at least 3, but have {} and {}",
                x1.ndim(),
                x2.ndim()
            )));
        }
        let out = matmul_output_shape(&x1.shape, &x2.shape, self.transpose_a, self.transpose_b)?;
        Ok([out].into())
    }

    fn infer_dtype(&self, inputs: &[Operand]) -> Result<OutputDTypes, OpError> {
        matmul_dtype(inputs)
    }
}
