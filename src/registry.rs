//! Name-based operator construction.
//!
//! Graph builders that deserialize models hold operator names and attribute
//! values rather than concrete types. [`OpRegistry`] maps a name to a
//! factory that builds the corresponding contract from an [`OpAttrs`]
//! record, running each operator's construction-time validation.

use rustc_hash::FxHashMap;

use crate::infer::{Infer, OpError};
use crate::ops;
use crate::value::DataType;

/// Attribute values a graph builder may supply when constructing an
/// operator.
///
/// Every field has the operator set's documented default, so builders only
/// set the fields an operator recognizes. Unrecognized fields are ignored
/// by the factory for that operator.
#[derive(Clone, Debug)]
pub struct OpAttrs {
    pub keep_dims: bool,
    pub transpose_a: bool,
    pub transpose_b: bool,
    pub exclusive: bool,
    pub reverse: bool,
    pub adjoint: bool,
    pub iou_threshold: f32,
    pub tolerance: f32,
    pub axis: i64,
    pub indices: Vec<i64>,
    pub nbins: i64,
    pub dtype: DataType,
}

impl Default for OpAttrs {
    fn default() -> OpAttrs {
        OpAttrs {
            keep_dims: false,
            transpose_a: false,
            transpose_b: false,
            exclusive: false,
            reverse: false,
            adjoint: false,
            iou_threshold: 0.5,
            tolerance: 1e-5,
            axis: 0,
            indices: Vec::new(),
            nbins: 1,
            dtype: DataType::Int32,
        }
    }
}

type OpFactory = fn(&OpAttrs) -> Result<Box<dyn Infer>, OpError>;

/// Registry of operator factories keyed by operator name.
pub struct OpRegistry {
    ops: FxHashMap<&'static str, OpFactory>,
}

impl OpRegistry {
    /// Create an empty registry.
    pub fn new() -> OpRegistry {
        OpRegistry {
            ops: FxHashMap::default(),
        }
    }

    /// Create a registry with every operator in this crate registered.
    pub fn with_all_ops() -> OpRegistry {
        let mut registry = OpRegistry::new();

        macro_rules! register_simple {
            ($($name:ident),* $(,)?) => {
                $(registry.register(stringify!($name), |_| {
                    Ok(Box::new(ops::$name::default()))
                });)*
            };
        }

        register_simple!(
            Add, Sub, Mul, Div, RealDiv, DivNoNan, MulNoNan, Pow, Minimum, Maximum, Mod, FloorDiv,
            FloorMod, TruncateDiv, TruncateMod, SquaredDifference, Xdivy, Xlogy, Atan2, BitwiseAnd,
            BitwiseOr, BitwiseXor, Equal, NotEqual, Greater, GreaterEqual, Less, LessEqual,
            LogicalAnd, LogicalOr, LogicalNot, EqualCount, Neg, Abs, Sign, Round, Square, Sqrt,
            Rsqrt, Reciprocal, Exp, Expm1, Log, Log1p, Erf, Erfc, Floor, Ceil, Cos, Sin, Tan, ACos,
            Asin, Atan, Cosh, Sinh, Acosh, Asinh, Atanh, BesselI0e, BesselI1e, Inv, Invert, IsNan,
            IsInf, IsFinite, FloatStatus, Eps, AssignAdd, AssignSub, LinSpace, SquareSumAll,
        );

        macro_rules! register_reduce {
            ($($name:ident),* $(,)?) => {
                $(registry.register(stringify!($name), |attrs| {
                    Ok(Box::new(ops::$name {
                        keep_dims: attrs.keep_dims,
                    }))
                });)*
            };
        }

        register_reduce!(
            ReduceSum, ReduceMean, ReduceProd, ReduceMax, ReduceMin, ReduceAll, ReduceAny,
        );

        macro_rules! register_matmul {
            ($($name:ident),* $(,)?) => {
                $(registry.register(stringify!($name), |attrs| {
                    Ok(Box::new(ops::$name {
                        transpose_a: attrs.transpose_a,
                        transpose_b: attrs.transpose_b,
                    }))
                });)*
            };
        }

        register_matmul!(MatMul, BatchMatMul);

        macro_rules! register_scan {
            ($($name:ident),* $(,)?) => {
                $(registry.register(stringify!($name), |attrs| {
                    Ok(Box::new(ops::$name {
                        exclusive: attrs.exclusive,
                        reverse: attrs.reverse,
                    }))
                });)*
            };
        }

        register_scan!(CumSum, CumProd);

        macro_rules! register_inplace {
            ($($name:ident),* $(,)?) => {
                $(registry.register(stringify!($name), |attrs| {
                    Ok(Box::new(ops::$name {
                        indices: attrs.indices.clone(),
                    }))
                });)*
            };
        }

        register_inplace!(InplaceAdd, InplaceSub);

        registry.register("IndexAdd", |attrs| {
            Ok(Box::new(ops::IndexAdd { axis: attrs.axis }))
        });
        registry.register("ApproximateEqual", |attrs| {
            Ok(Box::new(ops::ApproximateEqual {
                tolerance: attrs.tolerance,
            }))
        });
        registry.register("NMSWithMask", |attrs| {
            Ok(Box::new(ops::NMSWithMask {
                iou_threshold: attrs.iou_threshold,
            }))
        });
        registry.register("MatrixInverse", |attrs| {
            Ok(Box::new(ops::MatrixInverse::new(attrs.adjoint)?))
        });
        registry.register("HistogramFixedWidth", |attrs| {
            Ok(Box::new(ops::HistogramFixedWidth::new(
                attrs.nbins,
                attrs.dtype,
            )?))
        });

        registry
    }

    /// Register a factory for an operator name, replacing any existing one.
    pub fn register(&mut self, name: &'static str, factory: OpFactory) {
        self.ops.insert(name, factory);
    }

    /// Construct the operator contract registered under `name`.
    pub fn create(&self, name: &str, attrs: &OpAttrs) -> Result<Box<dyn Infer>, OpError> {
        let Some(factory) = self.ops.get(name) else {
            return Err(OpError::InvalidValue(format!(
                "no operator registered as \"{}\"",
                name
            )));
        };
        factory(attrs)
    }

    /// Names of all registered operators, in arbitrary order.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.ops.keys().copied()
    }
}

impl Default for OpRegistry {
    fn default() -> Self {
        OpRegistry::with_all_ops()
    }
}
