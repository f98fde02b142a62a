//! Shapes, broadcasting and axis resolution.

use std::fmt;
use std::fmt::Display;
use std::iter::repeat;

use smallvec::SmallVec;

use crate::infer::OpError;

/// Size of one tensor dimension.
///
/// `Unknown` marks a dimension whose size is not fixed until runtime (a
/// dynamic batch or sequence length). Unknown dimensions are exempt from
/// equality checks against other dimensions.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Dim {
    Fixed(usize),
    Unknown,
}

impl Dim {
    /// Return the fixed size, or `None` for an unknown dimension.
    pub fn size(self) -> Option<usize> {
        match self {
            Dim::Fixed(size) => Some(size),
            Dim::Unknown => None,
        }
    }

    /// True if two dimensions are compatible as the same extent.
    ///
    /// Unknown dimensions are compatible with anything.
    pub fn matches(self, other: Dim) -> bool {
        match (self, other) {
            (Dim::Unknown, _) | (_, Dim::Unknown) => true,
            (Dim::Fixed(a), Dim::Fixed(b)) => a == b,
        }
    }
}

impl From<usize> for Dim {
    fn from(size: usize) -> Dim {
        Dim::Fixed(size)
    }
}

impl Display for Dim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dim::Fixed(size) => write!(f, "{}", size),
            Dim::Unknown => write!(f, "?"),
        }
    }
}

/// Ordered list of dimension sizes describing a tensor's rank and extents.
///
/// A rank-0 shape describes a scalar.
#[derive(Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct Shape {
    dims: SmallVec<[Dim; 4]>,
}

/// Construct a [`Shape`] from a list of dimension sizes.
///
/// Entries can be `usize` literals or [`Dim`] values, so
/// `shape![2, Dim::Unknown, 3]` describes a rank-3 shape with a dynamic
/// middle dimension.
#[macro_export]
macro_rules! shape {
    ($($dim:expr),* $(,)?) => {
        $crate::shape::Shape::from_dims([$($crate::shape::Dim::from($dim)),*])
    };
}

impl Shape {
    /// The rank-0 scalar shape.
    pub fn scalar() -> Shape {
        Shape {
            dims: SmallVec::new(),
        }
    }

    pub fn from_dims<I: IntoIterator<Item = Dim>>(dims: I) -> Shape {
        Shape {
            dims: dims.into_iter().collect(),
        }
    }

    /// Construct a shape from fully-known dimension sizes.
    pub fn from_sizes<I: IntoIterator<Item = usize>>(sizes: I) -> Shape {
        Shape {
            dims: sizes.into_iter().map(Dim::Fixed).collect(),
        }
    }

    /// Number of dimensions.
    pub fn ndim(&self) -> usize {
        self.dims.len()
    }

    pub fn dims(&self) -> &[Dim] {
        &self.dims
    }

    pub fn dim(&self, index: usize) -> Dim {
        self.dims[index]
    }

    /// Iterate over dimensions.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = Dim> + DoubleEndedIterator + '_ {
        self.dims.iter().copied()
    }

    /// Total element count, or `None` if any dimension is unknown.
    pub fn num_elements(&self) -> Option<usize> {
        let mut product = 1usize;
        for dim in self.iter() {
            product *= dim.size()?;
        }
        Some(product)
    }

    /// True if no dimension is [`Dim::Unknown`].
    pub fn is_fully_known(&self) -> bool {
        self.iter().all(|dim| dim.size().is_some())
    }

    /// True if every dimension of `self` matches the corresponding dimension
    /// of `other`, with unknown dimensions matching anything. Requires equal
    /// ranks.
    pub fn matches(&self, other: &Shape) -> bool {
        self.ndim() == other.ndim()
            && self
                .iter()
                .zip(other.iter())
                .all(|(a, b)| a.matches(b))
    }
}

impl Display for Shape {
    /// Format as eg. "[2, ?, 3]".
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, dim) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", dim)?;
        }
        write!(f, "]")
    }
}

impl<const N: usize> From<[usize; N]> for Shape {
    fn from(sizes: [usize; N]) -> Shape {
        Shape::from_sizes(sizes)
    }
}

/// Given the shapes of two inputs to a binary operation, return the shape
/// that will result from broadcasting them following NumPy rules.
///
/// Broadcasting works by left-padding the input shapes with 1s so they are
/// the same length, then matching dimensions starting from the right. For
/// each dimension, the values are compatible if they are the same or one of
/// them is 1 or unknown. The larger of the two values is the size of that
/// dimension in the output shape.
///
/// See <https://numpy.org/doc/stable/user/basics.broadcasting.html>
pub fn broadcast_shapes(a: &Shape, b: &Shape) -> Result<Shape, OpError> {
    let a_pad = b.ndim().saturating_sub(a.ndim());
    let b_pad = a.ndim().saturating_sub(b.ndim());

    let ones = || repeat(Dim::Fixed(1));
    let a_iter = a.iter().rev().chain(ones().take(a_pad));
    let b_iter = b.iter().rev().chain(ones().take(b_pad));

    let out_ndim = a.ndim().max(b.ndim());
    let mut result: SmallVec<[Dim; 4]> = SmallVec::with_capacity(out_ndim);
    for (pos, (dim_a, dim_b)) in a_iter.zip(b_iter).enumerate() {
        let out = match (dim_a, dim_b) {
            (a, b) if a == b => a,
            (Dim::Fixed(1), b) => b,
            (a, Dim::Fixed(1)) => a,
            // An unknown dim broadcasts with any fixed size. The non-1 fixed
            // size is kept; against 1 the result stays unknown.
            (Dim::Unknown, b) => b,
            (a, Dim::Unknown) => a,
            (Dim::Fixed(_), Dim::Fixed(_)) => {
                return Err(OpError::IncompatibleShapes(format!(
                    "dimension {} of {} does not broadcast against {}",
                    out_ndim - 1 - pos,
                    a,
                    b,
                )));
            }
        };
        result.push(out);
    }
    result.reverse();

    Ok(Shape { dims: result })
}

/// Resolve an axis given as a value in `[-ndim, ndim-1]` to the zero-based
/// dimension of a tensor with `ndim` dimensions.
///
/// Negative axis values count backwards from the last dimension.
pub fn resolve_axis(ndim: usize, axis: i64) -> Result<usize, OpError> {
    let ndim_i64 = ndim as i64;
    if axis < -ndim_i64 || axis >= ndim_i64 {
        return Err(OpError::InvalidAxis { axis, ndim });
    }
    if axis >= 0 {
        Ok(axis as usize)
    } else {
        Ok((ndim_i64 + axis) as usize)
    }
}

/// Resolve a sequence of axis values in `[-ndim, ndim-1]` to zero-based
/// dimension indexes, preserving order and duplicates.
pub fn resolve_axes(ndim: usize, axes: &[i64]) -> Result<SmallVec<[usize; 4]>, OpError> {
    axes.iter().map(|&axis| resolve_axis(ndim, axis)).collect()
}

/// Reduction axes for a reduce operator: a single axis or a list.
///
/// An empty list means "reduce over every axis".
#[derive(Clone, Debug, PartialEq)]
pub enum AxisSpec {
    Single(i64),
    Multi(Vec<i64>),
}

impl AxisSpec {
    /// The "reduce everything" default.
    pub fn all() -> AxisSpec {
        AxisSpec::Multi(Vec::new())
    }

    /// Resolve to a sorted, deduplicated set of dimension indexes for a
    /// tensor of rank `ndim`. The empty list resolves to every axis.
    pub fn resolve(&self, ndim: usize) -> Result<SmallVec<[usize; 4]>, OpError> {
        let mut resolved = match self {
            AxisSpec::Single(axis) => SmallVec::from_iter([resolve_axis(ndim, *axis)?]),
            AxisSpec::Multi(axes) if axes.is_empty() => (0..ndim).collect(),
            AxisSpec::Multi(axes) => resolve_axes(ndim, axes)?,
        };
        resolved.sort();
        resolved.dedup();
        Ok(resolved)
    }

    fn is_reduce_all(&self) -> bool {
        matches!(self, AxisSpec::Multi(axes) if axes.is_empty())
    }
}

impl From<i64> for AxisSpec {
    fn from(axis: i64) -> AxisSpec {
        AxisSpec::Single(axis)
    }
}

impl From<Vec<i64>> for AxisSpec {
    fn from(axes: Vec<i64>) -> AxisSpec {
        AxisSpec::Multi(axes)
    }
}

/// Compute the output shape of reducing `shape` over `axes`.
///
/// Reduced dimensions are kept with size 1 if `keep_dims` is true and
/// removed otherwise. Axes are normalized into `[0, ndim)` first; reducing
/// the same axis twice behaves as reducing it once.
pub fn reduce_shape(shape: &Shape, axes: &AxisSpec, keep_dims: bool) -> Result<Shape, OpError> {
    // The "reduce all" case does not depend on dimension indexes, so handle
    // it before axis resolution to keep rank-0 inputs valid.
    if axes.is_reduce_all() {
        if keep_dims {
            return Ok(Shape::from_sizes(std::iter::repeat(1).take(shape.ndim())));
        }
        return Ok(Shape::scalar());
    }

    let reduced = axes.resolve(shape.ndim())?;

    let mut out_dims: SmallVec<[Dim; 4]> = SmallVec::with_capacity(shape.ndim());
    for (i, dim) in shape.iter().enumerate() {
        if reduced.binary_search(&i).is_ok() {
            if keep_dims {
                out_dims.push(Dim::Fixed(1));
            }
        } else {
            out_dims.push(dim);
        }
    }
    Ok(Shape { dims: out_dims })
}
