//! Vectorized CPU backend.
//!
//! Same creation surface as the reference backend, but operator application
//! fans out over rayon. Elements are independent until the scatter-add, so
//! the element loop parallelizes cleanly; the accumulation back into the
//! L-vector stays serial to keep shared degrees of freedom race-free.

use std::sync::Arc;

use rayon::prelude::*;

use crate::backend::{Backend, MemType, Operation};
use crate::basis::Basis;
use crate::error::{Error, Result};
use crate::operator::{ApplyStrategy, Operator};
use crate::qfunction::{QFunction, QFunctionFn};
use crate::registry::Resource;
use crate::restriction::ElemRestriction;
use crate::vector::Vector;
use crate::Scalar;

pub const PREFIX: &str = "/cpu/self/opt";

/// Pointwise work per rayon task when no restriction is involved.
const POINT_CHUNK: usize = 1024;

pub fn init(_resource: &Resource) -> Result<Box<dyn Backend>> {
    Ok(Box::new(CpuOpt))
}

struct RayonStrategy;

impl ApplyStrategy for RayonStrategy {
    fn apply(
        &self,
        qf: &QFunction,
        restr: Option<&ElemRestriction>,
        input: &mut Vector,
        output: &mut Vector,
    ) -> Result<()> {
        if qf.num_inputs() != 1 || qf.num_outputs() != 1 {
            return Err(Error::usage(format!(
                "parallel apply needs a 1-in/1-out qfunction, '{}' is {}-in/{}-out",
                qf.name(),
                qf.num_inputs(),
                qf.num_outputs()
            )));
        }
        // The bare callback is Sync; the QFunction itself is not because of
        // its context slot.
        let f = qf.user_fn();
        match restr {
            Some(restr) => {
                let mut evec_in = Vector::new_host(restr.esize());
                let mut evec_out = Vector::new_host(restr.esize());
                restr.gather(input, &mut evec_in)?;
                {
                    let src = evec_in.read_host()?;
                    let mut dst = evec_out.write_host()?;
                    src.par_chunks(restr.elem_size())
                        .zip(dst.par_chunks_mut(restr.elem_size()))
                        .try_for_each(|(s, d)| f(s.len(), &[s], &mut [d]))?;
                }
                {
                    let mut out = output.write_host()?;
                    out.fill(0.0);
                }
                restr.scatter_add(&mut evec_out, output)
            }
            None => {
                if input.len() != output.len() {
                    return Err(Error::usage(format!(
                        "pointwise operator needs equal lengths, got {} and {}",
                        input.len(),
                        output.len()
                    )));
                }
                let src = input.read_host()?;
                let mut dst = output.write_host()?;
                src.par_chunks(POINT_CHUNK)
                    .zip(dst.par_chunks_mut(POINT_CHUNK))
                    .try_for_each(|(s, d)| f(s.len(), &[s], &mut [d]))
            }
        }
    }
}

pub struct CpuOpt;

impl Backend for CpuOpt {
    fn name(&self) -> &str {
        "cpu-opt"
    }

    fn preferred_mem_type(&self) -> MemType {
        MemType::Host
    }

    fn vector_create(&self, len: usize) -> Result<Vector> {
        Ok(Vector::new_host(len))
    }

    fn destroy(&mut self) -> Result<()> {
        Ok(())
    }

    fn supports(&self, operation: Operation) -> bool {
        !matches!(operation, Operation::CompositeOperatorCreate)
    }

    fn basis_create_tensor(
        &self,
        dim: usize,
        p1d: usize,
        q1d: usize,
        interp1d: Vec<Scalar>,
        grad1d: Vec<Scalar>,
        qweight1d: Vec<Scalar>,
    ) -> Result<Basis> {
        Basis::tensor(dim, p1d, q1d, interp1d, grad1d, qweight1d)
    }

    fn elem_restriction_create(
        &self,
        num_elem: usize,
        elem_size: usize,
        lsize: usize,
        indices: Vec<usize>,
    ) -> Result<ElemRestriction> {
        ElemRestriction::new(num_elem, elem_size, lsize, indices)
    }

    fn qfunction_create(
        &self,
        name: &str,
        num_inputs: usize,
        num_outputs: usize,
        user_fn: QFunctionFn,
    ) -> Result<QFunction> {
        Ok(QFunction::new(name, num_inputs, num_outputs, user_fn))
    }

    fn operator_create(
        &self,
        qf: Arc<QFunction>,
        restr: Option<Arc<ElemRestriction>>,
    ) -> Result<Operator> {
        Ok(Operator::new(qf, restr, Box::new(RayonStrategy)))
    }
}
