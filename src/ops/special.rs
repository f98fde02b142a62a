//! Structural and specialized operators.

use crate::check::{
    Bounds, check_dims_match, check_dtype_valid, check_dtypes_same_and_valid, check_int_range,
    check_ndim, check_shapes_match,
};
use crate::infer::{Infer, OpError, OutputDTypes, OutputShapes, expect_inputs};
use crate::shape;
use crate::shape::{Dim, Shape};
use crate::value::{DataType, Operand, Value};

/// Element types accepted by [`NMSWithMask`].
const NMS_DTYPES: &[DataType] = &[DataType::Float16, DataType::Float32];

/// Non-maximum suppression over a `[N, 5]` tensor of boxes.
///
/// Each row holds 4 box coordinates and a score. The operator produces
/// three co-indexed outputs: the boxes reordered by score, the selected row
/// indices, and a boolean keep-mask. The suppression algorithm itself runs
/// in the kernel; this contract only fixes the output signature.
#[derive(Clone, Debug)]
pub struct NMSWithMask {
    /// Boxes overlapping a kept box with IOU above this threshold are
    /// suppressed.
    pub iou_threshold: f32,
}

impl Infer for NMSWithMask {
    fn name(&self) -> &str {
        "NMSWithMask"
    }

    fn infer_shape(&self, inputs: &[Operand]) -> Result<OutputShapes, OpError> {
        expect_inputs!(inputs, bboxes);
        check_ndim("bboxes", bboxes, 2)?;
        if let Dim::Fixed(rows) = bboxes.dim(0) {
            check_int_range(
                "bboxes.shape[0]",
                rows as i64,
                1,
                i64::MAX,
                Bounds::Inclusive,
            )?;
        }
        check_dims_match("bboxes.shape[1]", bboxes.dim(1), "box width", Dim::Fixed(5))?;

        let num = bboxes.dim(0);
        Ok([
            bboxes.shape.clone(),
            Shape::from_dims([num]),
            Shape::from_dims([num]),
        ]
        .into_iter()
        .collect())
    }

    fn infer_dtype(&self, inputs: &[Operand]) -> Result<OutputDTypes, OpError> {
        expect_inputs!(inputs, bboxes);
        let dtype = check_dtype_valid("bboxes", bboxes.dtype, NMS_DTYPES)?;
        Ok([dtype, DataType::Int32, DataType::Bool]
            .into_iter()
            .collect())
    }
}

/// Element types accepted by [`LinSpace`]'s endpoints.
const LIN_SPACE_DTYPES: &[DataType] = &[DataType::Float32];

/// Generates `num` evenly spaced values between two scalar endpoints,
/// inclusive of both.
#[derive(Clone, Debug, Default)]
pub struct LinSpace {}

impl Infer for LinSpace {
    fn name(&self) -> &str {
        "LinSpace"
    }

    fn infer_shape(&self, inputs: &[Operand]) -> Result<OutputShapes, OpError> {
        expect_inputs!(inputs, start, stop, num);
        check_ndim("start", start, 0)?;
        check_ndim("stop", stop, 0)?;

        let Some(value) = num.value.as_ref() else {
            return Err(OpError::NonConstInput("num must be const"));
        };
        let Some(num) = value.as_int_scalar() else {
            return Err(OpError::WrongValueKind {
                label: "num",
                expected: "an int",
            });
        };
        check_int_range("num", num, 1, i64::MAX, Bounds::Inclusive)?;

        Ok([shape![num as usize]].into())
    }

    fn infer_dtype(&self, inputs: &[Operand]) -> Result<OutputDTypes, OpError> {
        expect_inputs!(inputs, start, stop, _num);
        let dtype =
            check_dtypes_same_and_valid(&[("start", start), ("stop", stop)], LIN_SPACE_DTYPES)?;
        Ok([dtype].into())
    }
}

/// Element types accepted by [`MatrixInverse`].
const MATRIX_INVERSE_DTYPES: &[DataType] = &[DataType::Float32, DataType::Float64];

/// Inverts a batch of square matrices.
///
/// Construct with [`MatrixInverse::new`]; the `adjoint` attribute is part of
/// the operator's documented surface but is not currently supported and is
/// rejected at construction.
#[derive(Clone, Debug)]
pub struct MatrixInverse {
    adjoint: bool,
}

impl MatrixInverse {
    pub fn new(adjoint: bool) -> Result<MatrixInverse, OpError> {
        if adjoint {
            return Err(OpError::UnsupportedConfiguration(
                "MatrixInverse does not support adjoint=true",
            ));
        }
        Ok(MatrixInverse { adjoint })
    }

    pub fn adjoint(&self) -> bool {
        self.adjoint
    }
}

impl Infer for MatrixInverse {
    fn name(&self) -> &str {
        "MatrixInverse"
    }

    fn infer_shape(&self, inputs: &[Operand]) -> Result<OutputShapes, OpError> {
        expect_inputs!(inputs, x);
        if x.ndim() < 2 {
            return Err(OpError::IncompatibleShapes(format!(
                "x must have at least 2 dims but has {}",
                x.ndim()
            )));
        }
        check_dims_match(
            "x.shape[-1]",
            x.dim(x.ndim() - 1),
            "x.shape[-2]",
            x.dim(x.ndim() - 2),
        )?;
        Ok([x.shape.clone()].into())
    }

    fn infer_dtype(&self, inputs: &[Operand]) -> Result<OutputDTypes, OpError> {
        expect_inputs!(inputs, x);
        let dtype = check_dtype_valid("x", x.dtype, MATRIX_INVERSE_DTYPES)?;
        Ok([dtype].into())
    }
}

/// Element types accepted by [`HistogramFixedWidth`]'s inputs.
const HISTOGRAM_INPUT_DTYPES: &[DataType] =
    &[DataType::Float16, DataType::Float32, DataType::Int32];

/// Element types the histogram output may be configured to use.
const HISTOGRAM_OUTPUT_DTYPES: &[DataType] = &[DataType::Int32, DataType::Int64];

/// Counts values into `nbins` equal-width bins over a `[lo, hi]` range
/// supplied as the second input.
///
/// Values below the range land in the first bin and values at or above its
/// upper edge land in the last bin. Construct with
/// [`HistogramFixedWidth::new`], which validates the bin count and output
/// type.
#[derive(Clone, Debug)]
pub struct HistogramFixedWidth {
    nbins: usize,
    dtype: DataType,
}

impl HistogramFixedWidth {
    pub fn new(nbins: i64, dtype: DataType) -> Result<HistogramFixedWidth, OpError> {
        let nbins = check_int_range("nbins", nbins, 1, i64::MAX, Bounds::Inclusive)?;
        check_dtype_valid("dtype", dtype, HISTOGRAM_OUTPUT_DTYPES)?;
        Ok(HistogramFixedWidth {
            nbins: nbins as usize,
            dtype,
        })
    }

    pub fn nbins(&self) -> usize {
        self.nbins
    }
}

impl Infer for HistogramFixedWidth {
    fn name(&self) -> &str {
        "HistogramFixedWidth"
    }

    fn infer_shape(&self, inputs: &[Operand]) -> Result<OutputShapes, OpError> {
        expect_inputs!(inputs, _x, range);
        check_shapes_match("range", &range.shape, "expected", &shape![2])?;
        Ok([shape![self.nbins]].into())
    }

    fn infer_dtype(&self, inputs: &[Operand]) -> Result<OutputDTypes, OpError> {
        expect_inputs!(inputs, x, range);
        check_dtypes_same_and_valid(&[("x", x), ("range", range)], HISTOGRAM_INPUT_DTYPES)?;
        Ok([self.dtype].into())
    }

    fn infer_value(&self, inputs: &[Operand]) -> Result<Option<Value>, OpError> {
        expect_inputs!(inputs, x, range);
        let (Some(x), Some(range)) = (x.value.as_ref(), range.value.as_ref()) else {
            return Ok(None);
        };
        let (lo, hi) = (range.float_at(0), range.float_at(1));
        if !(hi > lo) {
            return Ok(None);
        }

        let nbins = self.nbins;
        let mut counts = vec![0i64; nbins];
        for i in 0..x.len() {
            let position = (x.float_at(i) - lo) / (hi - lo) * nbins as f64;
            let bin = (position.floor() as i64).clamp(0, nbins as i64 - 1) as usize;
            counts[bin] += 1;
        }
        Ok(Some(Value::from_ints(shape![nbins], self.dtype, counts)))
    }
}

/// Element types accepted by [`SquareSumAll`].
const SQUARE_SUM_ALL_DTYPES: &[DataType] = &[DataType::Float16, DataType::Float32];

/// Reduces each of two equal-shaped tensors to the scalar sum of its
/// squares, in a single invocation.
#[derive(Clone, Debug, Default)]
pub struct SquareSumAll {}

impl Infer for SquareSumAll {
    fn name(&self) -> &str {
        "SquareSumAll"
    }

    fn infer_shape(&self, inputs: &[Operand]) -> Result<OutputShapes, OpError> {
        expect_inputs!(inputs, x1, x2);
        check_shapes_match("x1_shape", &x1.shape, "x2_shape", &x2.shape)?;
        Ok([Shape::scalar(), Shape::scalar()].into_iter().collect())
    }

    fn infer_dtype(&self, inputs: &[Operand]) -> Result<OutputDTypes, OpError> {
        expect_inputs!(inputs, x1, x2);
        let dtype =
            check_dtypes_same_and_valid(&[("x1_type", x1), ("x2_type", x2)], SQUARE_SUM_ALL_DTYPES)?;
        Ok([dtype, dtype].into_iter().collect())
    }
}
