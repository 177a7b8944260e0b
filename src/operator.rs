//! Operators: a pointwise kernel applied over an optional element
//! restriction.
//!
//! How an operator runs is a backend decision, expressed through
//! [`ApplyStrategy`]. The serial [`HostStrategy`] lives here because it is
//! also the fallback the front end uses when a backend declines
//! `OperatorCreate`.
//!
//! [`CompositeOperator`] is the generic sum-of-suboperators form built by
//! the engine when a backend does not supply a specialized composite: each
//! sub-operator applies into a scratch vector and the results accumulate
//! into the output.

use std::sync::Arc;

use crate::context::ContextSlot;
use crate::error::{Error, Result};
use crate::qfunction::QFunction;
use crate::restriction::ElemRestriction;
use crate::vector::Vector;

/// Backend-supplied application recipe for one operator.
pub trait ApplyStrategy: Send + Sync {
    fn apply(
        &self,
        qf: &QFunction,
        restr: Option<&ElemRestriction>,
        input: &mut Vector,
        output: &mut Vector,
    ) -> Result<()>;
}

/// Serial host application.
///
/// With a restriction: gather the input L-vector into element form, run the
/// pointwise kernel over all element nodes, scatter-add back into the output
/// L-vector. Without one: apply the kernel directly, point per entry.
pub struct HostStrategy;

impl ApplyStrategy for HostStrategy {
    fn apply(
        &self,
        qf: &QFunction,
        restr: Option<&ElemRestriction>,
        input: &mut Vector,
        output: &mut Vector,
    ) -> Result<()> {
        match restr {
            Some(restr) => {
                let mut evec_in = Vector::new_host(restr.esize());
                let mut evec_out = Vector::new_host(restr.esize());
                restr.gather(input, &mut evec_in)?;
                {
                    let src = evec_in.read_host()?;
                    let mut dst = evec_out.write_host()?;
                    qf.apply(restr.esize(), &[&*src], &mut [&mut *dst])?;
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
                qf.apply(src.len(), &[&*src], &mut [&mut *dst])
            }
        }
    }
}

/// One applicable operator.
pub struct Operator {
    qf: Arc<QFunction>,
    restr: Option<Arc<ElemRestriction>>,
    strategy: Box<dyn ApplyStrategy>,
    context: ContextSlot,
}

impl Operator {
    pub fn new(
        qf: Arc<QFunction>,
        restr: Option<Arc<ElemRestriction>>,
        strategy: Box<dyn ApplyStrategy>,
    ) -> Self {
        Self {
            qf,
            restr,
            strategy,
            context: ContextSlot::new(),
        }
    }

    pub fn qfunction(&self) -> &Arc<QFunction> {
        &self.qf
    }

    pub fn restriction(&self) -> Option<&Arc<ElemRestriction>> {
        self.restr.as_ref()
    }

    pub fn context(&self) -> &ContextSlot {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut ContextSlot {
        &mut self.context
    }

    /// Applies the operator to `input`, writing `output`.
    pub fn apply(&self, input: &mut Vector, output: &mut Vector) -> Result<()> {
        self.strategy
            .apply(&self.qf, self.restr.as_deref(), input, output)
    }
}

/// A sum of sub-operators.
pub struct CompositeOperator {
    sub: Vec<Operator>,
}

impl CompositeOperator {
    /// The generic form: apply every sub-operator and sum the results. Used
    /// whenever the backend does not build a specialized composite.
    pub fn generic(sub: Vec<Operator>) -> Self {
        Self { sub }
    }

    pub fn num_sub(&self) -> usize {
        self.sub.len()
    }

    pub fn sub_operators(&self) -> &[Operator] {
        &self.sub
    }

    /// Applies each sub-operator into scratch storage and accumulates the
    /// results into `output`.
    pub fn apply(&self, input: &mut Vector, output: &mut Vector) -> Result<()> {
        {
            let mut out = output.write_host()?;
            out.fill(0.0);
        }
        for op in &self.sub {
            let mut scratch = Vector::new_host(output.len());
            op.apply(input, &mut scratch)?;
            let part = scratch.read_host()?;
            let mut out = output.write_host()?;
            for (acc, &value) in out.iter_mut().zip(part.iter()) {
                *acc += value;
            }
        }
        Ok(())
    }
}
