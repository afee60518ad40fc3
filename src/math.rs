// math.rs
// Description: Dense f64 matrix used by every layer and block. Thin value type over
//              ndarray::Array2 whose binary operations check shapes and return new
//              matrices instead of mutating in place.
// History:
// - 2026-09-28: Move row softmax next to the matrix type and add shape checked algebra.
// - 2026-09-30: Add row/column reductions (sum, mean, population variance).
// Author: handgrad contributors

use ndarray::{Array2, Axis};
use rand::Rng;

use crate::error::NetError;

/// Direction of a reduction.
///
/// `Row` yields one value per row (`rows x 1`), `Col` one value per column (`1 x cols`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Along {
    Row,
    Col,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Matrix {
    data: Array2<f64>,
}

impl Matrix {
    /// Builds a matrix from explicit rows. Every row must hold exactly `i_cols` values.
    pub fn new(i_rows: usize, i_cols: usize, v_rows: Vec<Vec<f64>>) -> Result<Self, NetError> {
        if v_rows.len() != i_rows {
            return Err(NetError::shape("new", (i_rows, i_cols), (v_rows.len(), i_cols)));
        }
        let mut v_flat: Vec<f64> = Vec::with_capacity(i_rows * i_cols);
        for (i_row, v_row) in v_rows.into_iter().enumerate() {
            if v_row.len() != i_cols {
                return Err(NetError::RaggedRows {
                    row: i_row,
                    expected: i_cols,
                    actual: v_row.len(),
                });
            }
            v_flat.extend(v_row);
        }
        let data = Array2::from_shape_vec((i_rows, i_cols), v_flat)
            .map_err(|_| NetError::shape("new", (i_rows, i_cols), (i_rows, i_cols)))?;
        Ok(Self { data })
    }

    /// Builds a matrix from rows, taking the column count from the first row.
    pub fn from_rows(v_rows: Vec<Vec<f64>>) -> Result<Self, NetError> {
        let i_cols = v_rows.first().map_or(0, Vec::len);
        Self::new(v_rows.len(), i_cols, v_rows)
    }

    pub fn zeros(i_rows: usize, i_cols: usize) -> Self {
        Self {
            data: Array2::zeros((i_rows, i_cols)),
        }
    }

    /// Builds a matrix from a generator of `(i, j)`.
    pub fn from_fn(i_rows: usize, i_cols: usize, mut f: impl FnMut(usize, usize) -> f64) -> Self {
        Self {
            data: Array2::from_shape_fn((i_rows, i_cols), |(i, j)| f(i, j)),
        }
    }

    /// Uniform values in [0, 1).
    pub fn random<R: Rng + ?Sized>(i_rows: usize, i_cols: usize, rng: &mut R) -> Self {
        Self::from_fn(i_rows, i_cols, |_, _| rng.random::<f64>())
    }

    pub fn from_array(data: Array2<f64>) -> Self {
        Self { data }
    }

    pub fn as_array(&self) -> &Array2<f64> {
        &self.data
    }

    pub(crate) fn as_array_mut(&mut self) -> &mut Array2<f64> {
        &mut self.data
    }

    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    pub fn cols(&self) -> usize {
        self.data.ncols()
    }

    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.data[[i, j]]
    }

    pub fn row(&self, i: usize) -> Vec<f64> {
        self.data.row(i).to_vec()
    }

    pub fn col(&self, j: usize) -> Vec<f64> {
        self.data.column(j).to_vec()
    }

    pub fn to_rows(&self) -> Vec<Vec<f64>> {
        self.data.rows().into_iter().map(|r| r.to_vec()).collect()
    }

    /// Overwrites row `i`. Used by parameter owners updating a single row in place.
    pub fn set_row(&mut self, i: usize, v_row: &[f64]) -> Result<(), NetError> {
        if i >= self.rows() || v_row.len() != self.cols() {
            return Err(NetError::shape("set_row", self.shape(), (1, v_row.len())));
        }
        for (d_dst, &d_src) in self.data.row_mut(i).iter_mut().zip(v_row) {
            *d_dst = d_src;
        }
        Ok(())
    }

    fn check_same_shape(&self, other: &Matrix, op: &'static str) -> Result<(), NetError> {
        if self.shape() != other.shape() {
            return Err(NetError::shape(op, self.shape(), other.shape()));
        }
        Ok(())
    }

    pub fn add(&self, other: &Matrix) -> Result<Matrix, NetError> {
        self.check_same_shape(other, "add")?;
        Ok(Self::from_array(&self.data + &other.data))
    }

    pub fn subtract(&self, other: &Matrix) -> Result<Matrix, NetError> {
        self.check_same_shape(other, "subtract")?;
        Ok(Self::from_array(&self.data - &other.data))
    }

    /// Elementwise product.
    pub fn hadamard(&self, other: &Matrix) -> Result<Matrix, NetError> {
        self.check_same_shape(other, "hadamard")?;
        Ok(Self::from_array(&self.data * &other.data))
    }

    /// Elementwise quotient.
    pub fn divide(&self, other: &Matrix) -> Result<Matrix, NetError> {
        self.check_same_shape(other, "divide")?;
        Ok(Self::from_array(&self.data / &other.data))
    }

    pub fn multiply_scalar(&self, d_scalar: f64) -> Matrix {
        Self::from_array(self.data.mapv(|x| x * d_scalar))
    }

    /// Matrix product, `self.cols` must equal `other.rows`.
    pub fn multiply(&self, other: &Matrix) -> Result<Matrix, NetError> {
        if self.cols() != other.rows() {
            return Err(NetError::shape("multiply", self.shape(), other.shape()));
        }
        Ok(Self::from_array(self.data.dot(&other.data)))
    }

    pub fn transpose(&self) -> Matrix {
        Self::from_array(self.data.t().to_owned())
    }

    /// Elementwise map receiving the value and its coordinates.
    pub fn map(&self, mut f: impl FnMut(f64, usize, usize) -> f64) -> Matrix {
        Self::from_array(Array2::from_shape_fn(self.data.dim(), |(i, j)| {
            f(self.data[[i, j]], i, j)
        }))
    }

    /// Row-major fold over all elements with access to coordinates.
    pub fn reduce(&self, d_init: f64, mut f: impl FnMut(f64, f64, usize, usize) -> f64) -> f64 {
        self.data
            .indexed_iter()
            .fold(d_init, |d_acc, ((i, j), &d_v)| f(d_acc, d_v, i, j))
    }

    pub fn sum(&self) -> f64 {
        self.data.sum()
    }

    pub fn sum_along(&self, along: Along) -> Matrix {
        match along {
            Along::Row => Self::from_array(self.data.sum_axis(Axis(1)).insert_axis(Axis(1))),
            Along::Col => Self::from_array(self.data.sum_axis(Axis(0)).insert_axis(Axis(0))),
        }
    }

    /// Mean of all elements. NaN for an empty matrix.
    pub fn mean(&self) -> f64 {
        self.sum() / self.len() as f64
    }

    pub fn mean_along(&self, along: Along) -> Matrix {
        let d_count = match along {
            Along::Row => self.cols(),
            Along::Col => self.rows(),
        } as f64;
        self.sum_along(along).multiply_scalar(1.0 / d_count)
    }

    /// Population variance of all elements.
    pub fn variance(&self) -> f64 {
        let d_mean = self.mean();
        self.reduce(0.0, |d_acc, d_v, _, _| d_acc + (d_v - d_mean).powi(2)) / self.len() as f64
    }

    /// Population variance per row or per column.
    pub fn variance_along(&self, along: Along) -> Matrix {
        let a_mean = self.mean_along(along);
        let a_sq = self.map(|d_v, i, j| {
            let d_m = match along {
                Along::Row => a_mean.get(i, 0),
                Along::Col => a_mean.get(0, j),
            };
            (d_v - d_m).powi(2)
        });
        a_sq.mean_along(along)
    }

    /// Row-wise softmax with the row max subtracted before exponentiation.
    pub fn softmax(&self) -> Matrix {
        let mut a_result = self.data.clone();
        for mut a_row in a_result.rows_mut() {
            let d_max = a_row.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            a_row.mapv_inplace(|x| (x - d_max).exp());
            let d_sum = a_row.sum();
            a_row.mapv_inplace(|x| x / d_sum);
        }
        Self::from_array(a_result)
    }
}
