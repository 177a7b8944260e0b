//! Tensor-product basis data.
//!
//! A [`Basis`] holds the one-dimensional interpolation, gradient, and
//! quadrature-weight matrices of a tensor-product finite element basis. It
//! is inert data here; backends consult it when specializing operator
//! application. Creation is an optional backend operation.

use crate::error::{Error, Result};
use crate::Scalar;

#[derive(Debug, Clone)]
pub struct Basis {
    dim: usize,
    p1d: usize,
    q1d: usize,
    /// Q1d x P1d, row-major.
    interp1d: Vec<Scalar>,
    /// Q1d x P1d, row-major.
    grad1d: Vec<Scalar>,
    qweight1d: Vec<Scalar>,
}

impl Basis {
    /// Builds a tensor basis of `dim` dimensions with `p1d` nodes and `q1d`
    /// quadrature points per dimension, checking the matrix shapes.
    pub fn tensor(
        dim: usize,
        p1d: usize,
        q1d: usize,
        interp1d: Vec<Scalar>,
        grad1d: Vec<Scalar>,
        qweight1d: Vec<Scalar>,
    ) -> Result<Self> {
        if dim == 0 {
            return Err(Error::usage("basis dimension must be at least 1"));
        }
        if interp1d.len() != q1d * p1d || grad1d.len() != q1d * p1d {
            return Err(Error::usage(format!(
                "interp/grad matrices must be {q1d} x {p1d}"
            )));
        }
        if qweight1d.len() != q1d {
            return Err(Error::usage(format!(
                "quadrature weight vector must have {q1d} entries"
            )));
        }
        Ok(Self {
            dim,
            p1d,
            q1d,
            interp1d,
            grad1d,
            qweight1d,
        })
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Nodes per dimension.
    pub fn p1d(&self) -> usize {
        self.p1d
    }

    /// Quadrature points per dimension.
    pub fn q1d(&self) -> usize {
        self.q1d
    }

    /// Total nodes per element.
    pub fn num_nodes(&self) -> usize {
        self.p1d.pow(self.dim as u32)
    }

    /// Total quadrature points per element.
    pub fn num_qpoints(&self) -> usize {
        self.q1d.pow(self.dim as u32)
    }

    pub fn interp1d(&self) -> &[Scalar] {
        &self.interp1d
    }

    pub fn grad1d(&self) -> &[Scalar] {
        &self.grad1d
    }

    pub fn qweight1d(&self) -> &[Scalar] {
        &self.qweight1d
    }
}
