//! opsig is the operator-definition and signature-inference layer of a
//! tensor computation framework.
//!
//! For each primitive operator it declares the static contract — name,
//! arity, attributes, operand mutability — and a pure inference function
//! that maps input shapes and element types (and, for constant-foldable
//! operators, input values) to the output shape, output dtype and
//! optionally a folded output value. A graph builder runs inference once
//! per node before any kernel executes, catching invalid operator
//! applications early and letting fully-constant subgraphs skip kernel
//! dispatch entirely.
//!
//! ## Usage
//!
//! ```
//! use opsig::ops::MatMul;
//! use opsig::{DataType, Infer, Operand, shape};
//!
//! let op = MatMul { transpose_a: false, transpose_b: false };
//! let a = Operand::new(shape![1, 3], DataType::Float32);
//! let b = Operand::new(shape![3, 4], DataType::Float32);
//!
//! let result = op.infer(&[a, b]).unwrap();
//! assert_eq!(result.single().shape, shape![1, 4]);
//! assert_eq!(result.single().dtype, DataType::Float32);
//! ```
//!
//! Inference is pure: contracts hold no mutable state, and a constructed
//! operator can serve concurrent `infer` calls from multiple threads. The
//! exception is the in-place family (AssignAdd, IndexAdd, ...), which
//! reports a memory side effect through
//! [`Infer::has_memory_side_effect`] so the caller can order readers and
//! writers correctly; their inference itself is still pure.

pub mod check;
pub mod infer;
pub mod ops;
pub mod registry;
pub mod shape;
pub mod value;

pub use infer::{Infer, Inference, NodeError, OpError, OutputMeta, infer_signature};
pub use registry::{OpAttrs, OpRegistry};
pub use shape::{AxisSpec, Dim, Shape, broadcast_shapes, reduce_shape, resolve_axis};
pub use value::{DataType, Operand, Value};
