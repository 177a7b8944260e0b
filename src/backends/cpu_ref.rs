//! Serial reference backend.
//!
//! Host-resident vectors, serial operator application. Implements every
//! optional creation operation except `CompositeOperatorCreate`, which the
//! engine renders with the generic summing composite.

use std::sync::Arc;

use crate::backend::{Backend, MemType, Operation};
use crate::basis::Basis;
use crate::error::Result;
use crate::operator::{HostStrategy, Operator};
use crate::qfunction::{QFunction, QFunctionFn};
use crate::registry::Resource;
use crate::restriction::ElemRestriction;
use crate::vector::Vector;
use crate::Scalar;

pub const PREFIX: &str = "/cpu/self/ref";

pub fn init(_resource: &Resource) -> Result<Box<dyn Backend>> {
    Ok(Box::new(CpuRef))
}

pub struct CpuRef;

impl Backend for CpuRef {
    fn name(&self) -> &str {
        "cpu-ref"
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
        Ok(Operator::new(qf, restr, Box::new(HostStrategy)))
    }
}
