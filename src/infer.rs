//! The [`Infer`] trait for operator contracts, and inference errors.

use std::error::Error;
use std::fmt;
use std::fmt::Display;

use smallvec::SmallVec;

use crate::shape::Shape;
use crate::value::{DataType, Operand, Value};

/// Possible reasons why inference may reject an operator application.
///
/// All failures are surfaced synchronously at node-construction time. They
/// are definition errors, not transient faults, so there is no retry path.
#[derive(Debug, PartialEq)]
pub enum OpError {
    /// An attribute or operand is of the wrong kind (eg. a float where an
    /// int or int list is required).
    WrongValueKind {
        label: &'static str,
        expected: &'static str,
    },

    /// An operand's element type is outside the operator's allowed set.
    UnsupportedDType {
        label: String,
        actual: DataType,
        allowed: &'static [DataType],
    },

    /// Two operands that must share an element type do not.
    DTypeMismatch {
        label_a: String,
        dtype_a: DataType,
        label_b: String,
        dtype_b: DataType,
    },

    /// Input shapes are not compatible with each other or with operator
    /// attributes.
    IncompatibleShapes(String),

    /// An axis value is outside `[-ndim, ndim)`.
    InvalidAxis { axis: i64, ndim: usize },

    /// An operand that must be known at graph-construction time is not.
    NonConstInput(&'static str),

    /// A documented but currently disabled attribute combination.
    UnsupportedConfiguration(&'static str),

    /// The number of inputs was less than the required number.
    MissingInputs,

    /// An input or attribute has a value that is incorrect.
    InvalidValue(String),
}

impl Display for OpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpError::WrongValueKind { label, expected } => {
                write!(f, "{} must be {}", label, expected)
            }
            OpError::UnsupportedDType {
                label,
                actual,
                allowed,
            } => {
                write!(f, "{} has unsupported type {} (allowed: ", label, actual)?;
                for (i, dtype) in allowed.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", dtype)?;
                }
                write!(f, ")")
            }
            OpError::DTypeMismatch {
                label_a,
                dtype_a,
                label_b,
                dtype_b,
            } => write!(
                f,
                "{} has type {} but {} has type {}",
                label_a, dtype_a, label_b, dtype_b
            ),
            OpError::IncompatibleShapes(details) => {
                write!(f, "incompatible input shapes: {}", details)
            }
            OpError::InvalidAxis { axis, ndim } => {
                write!(f, "axis {} is out of range for rank {}", axis, ndim)
            }
            OpError::NonConstInput(details) => write!(f, "{}", details),
            OpError::UnsupportedConfiguration(details) => {
                write!(f, "unsupported configuration: {}", details)
            }
            OpError::MissingInputs => write!(f, "required inputs were missing"),
            OpError::InvalidValue(details) => {
                write!(f, "input or attribute has invalid value: {}", details)
            }
        }
    }
}

impl Error for OpError {}

/// An inference failure tagged with the operator it came from.
///
/// Graphs routinely have thousands of nodes, so every surfaced error names
/// the operator in addition to the operand or attribute that the inner
/// [`OpError`] names.
#[derive(Debug, PartialEq)]
pub struct NodeError {
    pub op: String,
    pub error: OpError,
}

impl Display for NodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.op, self.error)
    }
}

impl Error for NodeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.error)
    }
}

/// Inferred shapes of an operator's outputs.
///
/// This avoids allocations in the common case where an operator produces
/// exactly one output.
pub type OutputShapes = SmallVec<[Shape; 1]>;

/// Inferred element types of an operator's outputs.
pub type OutputDTypes = SmallVec<[DataType; 1]>;

/// Shape and element type of one inferred output.
#[derive(Clone, Debug, PartialEq)]
pub struct OutputMeta {
    pub shape: Shape,
    pub dtype: DataType,
}

/// The complete result of inference for one graph node.
///
/// Callers cache this on the node and recompute it only when the node's
/// inputs change. `value` is present when the operator constant-folded its
/// (single) output; multi-output operators never fold.
#[derive(Clone, Debug, PartialEq)]
pub struct Inference {
    pub outputs: SmallVec<[OutputMeta; 1]>,
    pub value: Option<Value>,
}

impl Inference {
    /// Shape and dtype of the only output.
    ///
    /// Panics if the operator has more than one output.
    pub fn single(&self) -> &OutputMeta {
        assert!(self.outputs.len() == 1, "operator has multiple outputs");
        &self.outputs[0]
    }
}

/// An operator contract: the static description of a primitive together
/// with its inference rules.
///
/// Implementations are pure functions of the operand descriptors and the
/// operator's own (immutable) attributes. A contract value is safe to share
/// across threads once constructed; concurrent [`infer`](Infer::infer) calls
/// require no locking.
pub trait Infer: Send + Sync {
    /// Return a display name for the operator.
    fn name(&self) -> &str;

    /// Compute the output shape(s) from the input shapes.
    fn infer_shape(&self, inputs: &[Operand]) -> Result<OutputShapes, OpError>;

    /// Validate the input element types and compute the output type(s).
    fn infer_dtype(&self, inputs: &[Operand]) -> Result<OutputDTypes, OpError>;

    /// Constant-fold the output if every required input value is known.
    ///
    /// Returns `Ok(None)` when folding is not supported for this operator or
    /// not possible for these inputs. Only called after `infer_shape` and
    /// `infer_dtype` have succeeded.
    fn infer_value(&self, _inputs: &[Operand]) -> Result<Option<Value>, OpError> {
        Ok(None)
    }

    /// True if this operator updates the storage of one of its operands.
    ///
    /// The caller must schedule such a node after all readers of the
    /// operand's prior value and before all readers of the new value.
    fn has_memory_side_effect(&self) -> bool {
        false
    }

    /// Run shape, dtype and value inference together.
    fn infer(&self, inputs: &[Operand]) -> Result<Inference, OpError> {
        let shapes = self.infer_shape(inputs)?;
        let dtypes = self.infer_dtype(inputs)?;
        debug_assert_eq!(shapes.len(), dtypes.len());
        let value = self.infer_value(inputs)?;
        let outputs = shapes
            .into_iter()
            .zip(dtypes)
            .map(|(shape, dtype)| OutputMeta { shape, dtype })
            .collect();
        Ok(Inference { outputs, value })
    }
}

/// Run inference for a graph node, tagging any failure with the operator
/// name.
pub fn infer_signature(op: &dyn Infer, inputs: &[Operand]) -> Result<Inference, NodeError> {
    op.infer(inputs).map_err(|error| NodeError {
        op: op.name().to_string(),
        error,
    })
}

/// Destructure an input slice into a fixed number of operands.
///
/// This is the common prologue of every inference method.
macro_rules! expect_inputs {
    ($inputs:expr, $($name:ident),+) => {
        let [$($name),+] = $inputs else {
            return Err($crate::infer::OpError::MissingInputs);
        };
    };
    // Trailing `..` allows extra inputs beyond the named ones.
    ($inputs:expr, $($name:ident),+, ..) => {
        let [$($name),+, ..] = $inputs else {
            return Err($crate::infer::OpError::MissingInputs);
        };
    };
}

pub(crate) use expect_inputs;
