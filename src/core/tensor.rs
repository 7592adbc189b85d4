//! Dense tensors over labelled subsystem axes.
//!
//! Every axis of a [`Tensor`] is tagged with the ket or bra side of one
//! [`KetSpace`]. Composition ([`Tensor::matmul`]) contracts each bra axis of
//! the left operand with the matching ket axis of the right operand and takes
//! the outer product over everything else, so operators, states and
//! projectors on disjoint subsystems compose as tensor products.

use crate::core::errors::TensorError;
use crate::core::space::{KetSpace, SpaceAxis};
use crate::core::utils::{self, TOLERANCE};
use ndarray::{Array1, Array2, ArrayD, Axis, IxDyn};
use num_complex::Complex64;

#[derive(Clone, Debug)]
pub struct Tensor {
    axes: Vec<SpaceAxis>,
    values: ArrayD<Complex64>,
}

impl Tensor {
    /// Creates a tensor, checking that `values` has one axis per label with matching extent.
    pub fn new(axes: Vec<SpaceAxis>, values: ArrayD<Complex64>) -> Result<Self, TensorError> {
        if axes.len() != values.ndim() {
            return Err(TensorError::DimensionMismatch {
                expected: axes.len(),
                got: values.ndim(),
            });
        }
        for (axis, &extent) in axes.iter().zip(values.shape()) {
            if axis.dim() != extent {
                return Err(TensorError::DimensionMismatch {
                    expected: axis.dim(),
                    got: extent,
                });
            }
        }
        if let Some(dup) = utils::find_duplicate(&axes) {
            return Err(TensorError::DuplicateAxis(dup.to_string()));
        }
        Ok(Self { axes, values })
    }

    pub fn scalar(value: Complex64) -> Self {
        Self {
            axes: Vec::new(),
            values: ArrayD::from_elem(IxDyn(&[]), value),
        }
    }

    pub fn one() -> Self {
        Self::scalar(Complex64::new(1.0, 0.0))
    }

    pub fn axes(&self) -> &[SpaceAxis] {
        &self.axes
    }

    pub fn values(&self) -> &ArrayD<Complex64> {
        &self.values
    }

    /// Subsystems carrying a ket axis, in axis order.
    pub fn kets(&self) -> Vec<KetSpace> {
        self.axes
            .iter()
            .filter_map(|axis| match axis {
                SpaceAxis::Ket(space) => Some(*space),
                SpaceAxis::Bra(_) => None,
            })
            .collect()
    }

    /// Subsystems carrying a bra axis, in axis order. For an operator these
    /// are the subsystems it consumes when composed on the left.
    pub fn bras(&self) -> Vec<KetSpace> {
        self.axes
            .iter()
            .filter_map(|axis| match axis {
                SpaceAxis::Bra(space) => Some(*space),
                SpaceAxis::Ket(_) => None,
            })
            .collect()
    }

    fn position(&self, axis: SpaceAxis) -> Option<usize> {
        self.axes.iter().position(|a| *a == axis)
    }

    /// Conjugate transpose: conjugates every entry and swaps ket and bra labels.
    pub fn ct(&self) -> Tensor {
        Tensor {
            axes: self.axes.iter().map(SpaceAxis::flipped).collect(),
            values: self.values.mapv(|c| c.conj()),
        }
    }

    pub fn scale(&self, factor: Complex64) -> Tensor {
        Tensor {
            axes: self.axes.clone(),
            values: self.values.mapv(|c| c * factor),
        }
    }

    /// Composes `self` with `other` (`self @ other`).
    ///
    /// # Arguments
    ///
    /// * `other` - The right operand. Each of its ket axes that matches a bra
    ///   axis of `self` is contracted; every other axis is carried through.
    ///
    /// # Returns
    ///
    /// The left operand's free axes followed by the right operand's free axes.
    ///
    /// # Errors
    ///
    /// Returns `TensorError::DuplicateAxis` if a free axis appears on both sides.
    pub fn matmul(&self, other: &Tensor) -> Result<Tensor, TensorError> {
        // (left bra position, right ket position) for every contracted subsystem
        let pairs: Vec<(usize, usize)> = self
            .axes
            .iter()
            .enumerate()
            .filter_map(|(i, axis)| match axis {
                SpaceAxis::Bra(space) => other.position(SpaceAxis::Ket(*space)).map(|j| (i, j)),
                SpaceAxis::Ket(_) => None,
            })
            .collect();

        let left_inner: Vec<usize> = pairs.iter().map(|&(i, _)| i).collect();
        let right_inner: Vec<usize> = pairs.iter().map(|&(_, j)| j).collect();
        let left_free: Vec<usize> = (0..self.axes.len())
            .filter(|i| !left_inner.contains(i))
            .collect();
        let right_free: Vec<usize> = (0..other.axes.len())
            .filter(|j| !right_inner.contains(j))
            .collect();

        let mut axes: Vec<SpaceAxis> = left_free.iter().map(|&i| self.axes[i]).collect();
        for &j in &right_free {
            let axis = other.axes[j];
            if axes.contains(&axis) {
                return Err(TensorError::DuplicateAxis(axis.to_string()));
            }
            axes.push(axis);
        }

        let m = extent(&self.axes, &left_free);
        let k = extent(&self.axes, &left_inner);
        let n = extent(&other.axes, &right_free);

        let left = matricize(&self.values, &left_free, &left_inner, m, k)?;
        let right = matricize(&other.values, &right_inner, &right_free, k, n)?;

        let shape: Vec<usize> = axes.iter().map(SpaceAxis::dim).collect();
        let values = left.dot(&right).into_shape_with_order(IxDyn(&shape))?;
        Ok(Tensor { axes, values })
    }

    /// Element-wise sum of two tensors over the same set of axes.
    ///
    /// # Errors
    ///
    /// Returns `TensorError::AxisMismatch` if the axis sets differ. Axis order
    /// may differ; `other` is permuted to match `self`.
    pub fn add(&self, other: &Tensor) -> Result<Tensor, TensorError> {
        let aligned = other.aligned_to(&self.axes)?;
        Ok(Tensor {
            axes: self.axes.clone(),
            values: &self.values + &aligned,
        })
    }

    pub fn sub(&self, other: &Tensor) -> Result<Tensor, TensorError> {
        let aligned = other.aligned_to(&self.axes)?;
        Ok(Tensor {
            axes: self.axes.clone(),
            values: &self.values - &aligned,
        })
    }

    /// Fixes each listed axis to one index, removing it from the result.
    ///
    /// # Errors
    ///
    /// * `TensorError::MissingAxis` - an axis is not on this tensor.
    /// * `TensorError::ValueOutOfRange` - an index is not below the axis dimension.
    pub fn slice(&self, fixes: &[(SpaceAxis, usize)]) -> Result<Tensor, TensorError> {
        let mut axes = self.axes.clone();
        let mut values = self.values.clone();
        for &(axis, value) in fixes {
            let i = axes
                .iter()
                .position(|a| *a == axis)
                .ok_or_else(|| TensorError::MissingAxis(axis.to_string()))?;
            if value >= axis.dim() {
                return Err(TensorError::ValueOutOfRange {
                    value,
                    dim: axis.dim(),
                });
            }
            values = values.index_axis_move(Axis(i), value);
            axes.remove(i);
        }
        Ok(Tensor { axes, values })
    }

    /// Sum of squared magnitudes of all entries.
    pub fn norm_sqr(&self) -> f64 {
        self.values.iter().map(|c| c.norm_sqr()).sum()
    }

    /// Contracts every ket axis with the bra axis of the same subsystem.
    ///
    /// # Errors
    ///
    /// Returns `TensorError::AxisMismatch` or `TensorError::MissingAxis` when
    /// the kets and bras do not pair up.
    pub fn trace(&self) -> Result<Complex64, TensorError> {
        let kets = self.kets();
        if kets.len() * 2 != self.axes.len() {
            return Err(TensorError::AxisMismatch);
        }
        let ket_positions = self.positions(kets.iter().map(|s| s.ket()))?;
        let bra_positions = self.positions(kets.iter().map(|s| s.ct()))?;
        let d = extent(&self.axes, &ket_positions);
        let matrix = matricize(&self.values, &ket_positions, &bra_positions, d, d)?;
        Ok(utils::trace(&matrix))
    }

    /// Values with axes permuted into `order`, which must name every axis exactly once.
    pub fn to_array(&self, order: &[SpaceAxis]) -> Result<ArrayD<Complex64>, TensorError> {
        self.aligned_to(order)
    }

    fn positions(&self, axes: impl Iterator<Item = SpaceAxis>) -> Result<Vec<usize>, TensorError> {
        axes.map(|axis| {
            self.position(axis)
                .ok_or_else(|| TensorError::MissingAxis(axis.to_string()))
        })
        .collect()
    }

    fn aligned_to(&self, order: &[SpaceAxis]) -> Result<ArrayD<Complex64>, TensorError> {
        if order.len() != self.axes.len() {
            return Err(TensorError::AxisMismatch);
        }
        let permutation = order
            .iter()
            .map(|axis| self.position(*axis).ok_or(TensorError::AxisMismatch))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(self
            .values
            .view()
            .permuted_axes(permutation)
            .as_standard_layout()
            .into_owned())
    }
}

fn extent(axes: &[SpaceAxis], positions: &[usize]) -> usize {
    positions.iter().map(|&i| axes[i].dim()).product()
}

/// Flattens `rows` axes into matrix rows and `cols` axes into matrix columns.
fn matricize(
    values: &ArrayD<Complex64>,
    rows: &[usize],
    cols: &[usize],
    m: usize,
    n: usize,
) -> Result<Array2<Complex64>, TensorError> {
    let order: Vec<usize> = rows.iter().chain(cols).copied().collect();
    let standard = values
        .view()
        .permuted_axes(order)
        .as_standard_layout()
        .into_owned();
    Ok(standard.into_shape_with_order((m, n))?)
}

/// Ordered product `t0 @ t1 @ ...`; the empty product is the scalar 1.
pub fn prod(tensors: impl IntoIterator<Item = Tensor>) -> Result<Tensor, TensorError> {
    tensors
        .into_iter()
        .try_fold(Tensor::one(), |acc, t| acc.matmul(&t))
}

/// Sum of tensors over the same axes; the empty sum is the scalar 0.
pub fn sum(tensors: impl IntoIterator<Item = Tensor>) -> Result<Tensor, TensorError> {
    let mut tensors = tensors.into_iter();
    let Some(first) = tensors.next() else {
        return Ok(Tensor::scalar(Complex64::new(0.0, 0.0)));
    };
    tensors.try_fold(first, |acc, t| acc.add(&t))
}

fn ket_axes(spaces: &[KetSpace]) -> Vec<SpaceAxis> {
    spaces.iter().map(KetSpace::ket).collect()
}

fn operator_axes(spaces: &[KetSpace]) -> Vec<SpaceAxis> {
    spaces
        .iter()
        .map(KetSpace::ket)
        .chain(spaces.iter().map(KetSpace::ct))
        .collect()
}

fn square_shape(spaces: &[KetSpace]) -> Vec<usize> {
    let dims = spaces.iter().map(KetSpace::dim);
    dims.clone().chain(dims).collect()
}

fn matrix_to_tensor(
    matrix: &Array2<Complex64>,
    spaces: &[KetSpace],
) -> Result<Tensor, TensorError> {
    let (rows, cols) = matrix.dim();
    if rows != cols {
        return Err(TensorError::NotSquareMatrix);
    }
    let size: usize = spaces.iter().map(KetSpace::dim).product();
    if size != rows {
        return Err(TensorError::DimensionMismatch {
            expected: size,
            got: rows,
        });
    }
    let values = matrix
        .as_standard_layout()
        .into_owned()
        .into_shape_with_order(IxDyn(&square_shape(spaces)))?;
    Tensor::new(operator_axes(spaces), values)
}

fn tensor_to_matrix(
    tensor: &Tensor,
    spaces: &[KetSpace],
) -> Result<Array2<Complex64>, TensorError> {
    let size: usize = spaces.iter().map(KetSpace::dim).product();
    Ok(tensor
        .to_array(&operator_axes(spaces))?
        .into_shape_with_order((size, size))?)
}

/// Linear operator: one ket and one bra axis per subsystem it acts on.
#[derive(Clone, Debug)]
pub struct OperatorTensor(Tensor);

impl OperatorTensor {
    pub fn of(tensor: Tensor) -> Self {
        Self(tensor)
    }

    /// Builds an operator from a dense matrix.
    ///
    /// Rows and columns are indexed row-major over `spaces`, the first space
    /// being the most significant.
    pub fn from_matrix(
        matrix: &Array2<Complex64>,
        spaces: &[KetSpace],
    ) -> Result<Self, TensorError> {
        matrix_to_tensor(matrix, spaces).map(Self)
    }

    pub(crate) fn diagonal(space: KetSpace, entry: impl Fn(usize) -> Complex64) -> Self {
        let mut matrix = Array2::<Complex64>::zeros((space.dim(), space.dim()));
        for i in 0..space.dim() {
            matrix[[i, i]] = entry(i);
        }
        Self(Tensor {
            axes: operator_axes(&[space]),
            values: matrix.into_dyn(),
        })
    }

    /// Identity over every listed subsystem.
    pub fn identity(spaces: &[KetSpace]) -> Self {
        Self(
            spaces
                .iter()
                .fold(Tensor::one(), |acc, space| Self::outer(acc, space.identity().0)),
        )
    }

    // factors on disjoint subsystems never share an axis
    fn outer(a: Tensor, b: Tensor) -> Tensor {
        let axes: Vec<SpaceAxis> = a.axes.iter().chain(&b.axes).copied().collect();
        let shape: Vec<usize> = axes.iter().map(SpaceAxis::dim).collect();
        let mut values = ArrayD::<Complex64>::zeros(IxDyn(&shape));
        let products = a
            .values
            .iter()
            .flat_map(|x| b.values.iter().map(move |y| x * y));
        for (slot, product) in values.iter_mut().zip(products) {
            *slot = product;
        }
        Tensor { axes, values }
    }

    pub fn tensor(&self) -> &Tensor {
        &self.0
    }

    pub fn into_tensor(self) -> Tensor {
        self.0
    }

    /// Subsystems the operator acts on.
    pub fn spaces(&self) -> Vec<KetSpace> {
        self.0.kets()
    }

    pub fn ct(&self) -> Self {
        Self(self.0.ct())
    }

    pub fn matmul(&self, other: &OperatorTensor) -> Result<Self, TensorError> {
        self.0.matmul(&other.0).map(Self)
    }

    pub fn add(&self, other: &OperatorTensor) -> Result<Self, TensorError> {
        self.0.add(&other.0).map(Self)
    }

    pub fn sub(&self, other: &OperatorTensor) -> Result<Self, TensorError> {
        self.0.sub(&other.0).map(Self)
    }

    /// Dense matrix over `spaces`, which must cover exactly the operator's subsystems.
    pub fn to_matrix(&self, spaces: &[KetSpace]) -> Result<Array2<Complex64>, TensorError> {
        tensor_to_matrix(&self.0, spaces)
    }
}

/// State vector: one ket axis per subsystem.
#[derive(Clone, Debug)]
pub struct PureStateTensor(Tensor);

impl PureStateTensor {
    pub fn of(tensor: Tensor) -> Self {
        Self(tensor)
    }

    /// Creates a normalized state from its amplitudes over `spaces`.
    pub fn from_vector(
        vector: &Array1<Complex64>,
        spaces: &[KetSpace],
    ) -> Result<Self, TensorError> {
        let size: usize = spaces.iter().map(KetSpace::dim).product();
        if vector.len() != size {
            return Err(TensorError::DimensionMismatch {
                expected: size,
                got: vector.len(),
            });
        }
        let norm_sqr: f64 = vector.iter().map(|c| c.norm_sqr()).sum();
        if (norm_sqr - 1.0).abs() > TOLERANCE {
            return Err(TensorError::NotNormalized(norm_sqr));
        }
        let shape: Vec<usize> = spaces.iter().map(KetSpace::dim).collect();
        let values = vector.to_owned().into_shape_with_order(IxDyn(&shape))?;
        Tensor::new(ket_axes(spaces), values).map(Self)
    }

    /// Product state with every listed subsystem in |0⟩.
    pub fn zeros(spaces: &[KetSpace]) -> Result<Self, TensorError> {
        let factors = spaces
            .iter()
            .map(|space| space.eigenstate(0).map(Self::into_tensor))
            .collect::<Result<Vec<_>, _>>()?;
        prod(factors).map(Self)
    }

    pub fn tensor(&self) -> &Tensor {
        &self.0
    }

    pub fn into_tensor(self) -> Tensor {
        self.0
    }

    pub fn spaces(&self) -> Vec<KetSpace> {
        self.0.kets()
    }

    /// Born weight ⟨ψ|ψ⟩.
    pub fn norm(&self) -> f64 {
        self.0.norm_sqr()
    }

    /// Rescales to unit norm. A vanishing state is returned unchanged.
    pub fn normalize(&self) -> Self {
        let norm = self.norm();
        if norm <= f64::EPSILON {
            return self.clone();
        }
        Self(self.0.scale(Complex64::new(1.0 / norm.sqrt(), 0.0)))
    }

    /// Amplitudes over `spaces`, which must cover exactly the state's subsystems.
    pub fn to_vector(&self, spaces: &[KetSpace]) -> Result<Array1<Complex64>, TensorError> {
        let size: usize = spaces.iter().map(KetSpace::dim).product();
        Ok(self
            .0
            .to_array(&ket_axes(spaces))?
            .into_shape_with_order(size)?)
    }
}

/// Density operator: one ket and one bra axis per subsystem.
#[derive(Clone, Debug)]
pub struct MixedStateTensor(Tensor);

impl MixedStateTensor {
    pub fn of(tensor: Tensor) -> Self {
        Self(tensor)
    }

    /// Creates a density operator from a unit-trace matrix over `spaces`.
    pub fn from_matrix(
        matrix: &Array2<Complex64>,
        spaces: &[KetSpace],
    ) -> Result<Self, TensorError> {
        let tr = utils::trace(matrix);
        if (tr - Complex64::new(1.0, 0.0)).norm() > TOLERANCE {
            return Err(TensorError::InvalidTrace(tr.re));
        }
        matrix_to_tensor(matrix, spaces).map(Self)
    }

    /// |ψ⟩⟨ψ|
    pub fn from_pure(state: &PureStateTensor) -> Result<Self, TensorError> {
        state.0.matmul(&state.0.ct()).map(Self)
    }

    pub fn tensor(&self) -> &Tensor {
        &self.0
    }

    pub fn into_tensor(self) -> Tensor {
        self.0
    }

    pub fn spaces(&self) -> Vec<KetSpace> {
        self.0.kets()
    }

    /// Born weight, the real part of the trace.
    ///
    /// # Errors
    ///
    /// Returns the trace error when the ket and bra axes do not pair up,
    /// which happens only for a tensor wrapped with [`MixedStateTensor::of`]
    /// that is not a density operator.
    pub fn norm(&self) -> Result<f64, TensorError> {
        Ok(self.0.trace()?.re)
    }

    /// Rescales to unit trace. A vanishing state is returned unchanged.
    pub fn normalize(&self) -> Result<Self, TensorError> {
        let norm = self.norm()?;
        if norm <= f64::EPSILON {
            return Ok(self.clone());
        }
        Ok(Self(self.0.scale(Complex64::new(1.0 / norm, 0.0))))
    }

    pub fn to_matrix(&self, spaces: &[KetSpace]) -> Result<Array2<Complex64>, TensorError> {
        tensor_to_matrix(&self.0, spaces)
    }
}

/// The quantity an operation acts on.
#[derive(Clone, Debug)]
pub enum StateTensor {
    Pure(PureStateTensor),
    Mixed(MixedStateTensor),
}

impl StateTensor {
    pub fn variant_name(&self) -> &'static str {
        match self {
            StateTensor::Pure(_) => "pure",
            StateTensor::Mixed(_) => "mixed",
        }
    }

    /// Subsystems the state is defined over.
    pub fn spaces(&self) -> Vec<KetSpace> {
        match self {
            StateTensor::Pure(tensor) => tensor.spaces(),
            StateTensor::Mixed(tensor) => tensor.spaces(),
        }
    }

    pub fn norm(&self) -> Result<f64, TensorError> {
        match self {
            StateTensor::Pure(tensor) => Ok(tensor.norm()),
            StateTensor::Mixed(tensor) => tensor.norm(),
        }
    }
}

impl From<PureStateTensor> for StateTensor {
    fn from(tensor: PureStateTensor) -> Self {
        StateTensor::Pure(tensor)
    }
}

impl From<MixedStateTensor> for StateTensor {
    fn from(tensor: MixedStateTensor) -> Self {
        StateTensor::Mixed(tensor)
    }
}
