//! Element restrictions: the index maps between L-vectors and E-vectors.
//!
//! An L-vector holds each degree of freedom once; an E-vector holds one copy
//! per element referencing it. [`ElemRestriction::gather`] expands L to E and
//! [`ElemRestriction::scatter_add`] accumulates E back into L, summing where
//! elements share a degree of freedom.

use crate::error::{Error, Result};
use crate::vector::Vector;

/// An element-to-global index map.
#[derive(Debug, Clone)]
pub struct ElemRestriction {
    num_elem: usize,
    elem_size: usize,
    lsize: usize,
    /// `indices[e * elem_size + i]` is the L-vector index of node `i` of
    /// element `e`.
    indices: Vec<usize>,
}

impl ElemRestriction {
    /// Builds a restriction, checking the index table shape and bounds.
    pub fn new(
        num_elem: usize,
        elem_size: usize,
        lsize: usize,
        indices: Vec<usize>,
    ) -> Result<Self> {
        if elem_size == 0 {
            return Err(Error::usage("restriction element size must be nonzero"));
        }
        if indices.len() != num_elem * elem_size {
            return Err(Error::usage(format!(
                "restriction index table has {} entries, expected {} ({} elements x {} nodes)",
                indices.len(),
                num_elem * elem_size,
                num_elem,
                elem_size
            )));
        }
        if let Some(&bad) = indices.iter().find(|&&ix| ix >= lsize) {
            return Err(Error::usage(format!(
                "restriction index {bad} out of range for L-vector size {lsize}"
            )));
        }
        Ok(Self {
            num_elem,
            elem_size,
            lsize,
            indices,
        })
    }

    pub fn num_elem(&self) -> usize {
        self.num_elem
    }

    pub fn elem_size(&self) -> usize {
        self.elem_size
    }

    /// L-vector length this restriction maps from.
    pub fn lsize(&self) -> usize {
        self.lsize
    }

    /// E-vector length this restriction maps to.
    pub fn esize(&self) -> usize {
        self.num_elem * self.elem_size
    }

    /// Gathers `lvec` into `evec` (L to E).
    pub fn gather(&self, lvec: &mut Vector, evec: &mut Vector) -> Result<()> {
        self.check_lengths(lvec, evec)?;
        let src = lvec.read_host()?;
        let mut dst = evec.write_host()?;
        for (slot, &ix) in dst.iter_mut().zip(&self.indices) {
            *slot = src[ix];
        }
        Ok(())
    }

    /// Scatters `evec` into `lvec` with accumulation (E to L). Shared
    /// degrees of freedom sum their element contributions.
    pub fn scatter_add(&self, evec: &mut Vector, lvec: &mut Vector) -> Result<()> {
        self.check_lengths(lvec, evec)?;
        let src = evec.read_host()?;
        let mut dst = lvec.write_host()?;
        for (&value, &ix) in src.iter().zip(&self.indices) {
            dst[ix] += value;
        }
        Ok(())
    }

    fn check_lengths(&self, lvec: &Vector, evec: &Vector) -> Result<()> {
        if lvec.len() != self.lsize {
            return Err(Error::usage(format!(
                "L-vector length {} does not match restriction L-size {}",
                lvec.len(),
                self.lsize
            )));
        }
        if evec.len() != self.esize() {
            return Err(Error::usage(format!(
                "E-vector length {} does not match restriction E-size {}",
                evec.len(),
                self.esize()
            )));
        }
        Ok(())
    }
}
