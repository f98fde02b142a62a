//! Operator contracts.
//!
//! Each operator is a struct whose fields are its typed attributes and
//! which implements [`Infer`](crate::infer::Infer). Operators are grouped
//! by family; everything is re-exported here.

mod binary;
mod fold;
mod inplace;
mod logic;
mod matmul;
mod reduce;
mod scan;
mod special;
mod unary;

pub use binary::{
    Add, Atan2, BitwiseAnd, BitwiseOr, BitwiseXor, Div, DivNoNan, FloorDiv, FloorMod, Maximum,
    Minimum, Mod, Mul, MulNoNan, Pow, RealDiv, SquaredDifference, Sub, TruncateDiv, TruncateMod,
    Xdivy, Xlogy,
};
pub use inplace::{AssignAdd, AssignSub, IndexAdd, InplaceAdd, InplaceSub};
pub use logic::{
    ApproximateEqual, Equal, EqualCount, Greater, GreaterEqual, Less, LessEqual, LogicalAnd,
    LogicalNot, LogicalOr, NotEqual,
};
pub use matmul::{BatchMatMul, MatMul};
pub use reduce::{
    ReduceAll, ReduceAny, ReduceMax, ReduceMean, ReduceMin, ReduceProd, ReduceSum,
};
pub use scan::{CumProd, CumSum};
pub use special::{HistogramFixedWidth, LinSpace, MatrixInverse, NMSWithMask, SquareSumAll};
pub use unary::{
    ACos, Abs, Acosh, Asin, Asinh, Atan, Atanh, BesselI0e, BesselI1e, Ceil, Cos, Cosh, Eps, Erf,
    Erfc, Exp, Expm1, FloatStatus, Floor, Inv, Invert, IsFinite, IsInf, IsNan, Log, Log1p, Neg,
    Reciprocal, Round, Rsqrt, Sign, Sin, Sinh, Sqrt, Square, Tan,
};
