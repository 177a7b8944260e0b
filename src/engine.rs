//! The runtime handle tying a resolved backend, an error reporter, and a
//! context slot together.
//!
//! Every operation a caller performs on an [`Engine`] routes through the
//! backend and then through [`Reporter::filter`], so the handle's error mode
//! governs all of them uniformly. Resolution failures happen before a handle
//! (and its reporter) exists and are always returned to the caller.
//!
//! Optional operations the backend declines do not fail the caller when a
//! generic rendering exists: a declined `OperatorCreate` falls back to host
//! application and a declined `CompositeOperatorCreate` falls back to the
//! summing composite.

use std::sync::Arc;

use crate::backend::{Backend, MemType, Operation};
use crate::basis::Basis;
use crate::context::ContextSlot;
use crate::error::{ErrorMode, Reporter, Result};
use crate::operator::{CompositeOperator, HostStrategy, Operator};
use crate::qfunction::{QFunction, QFunctionFn};
use crate::registry::{Registry, Resource};
use crate::restriction::ElemRestriction;
use crate::vector::Vector;
use crate::Scalar;

/// A live runtime instance bound to one backend.
pub struct Engine {
    resource: Resource,
    reporter: Reporter,
    backend: Box<dyn Backend>,
    context: ContextSlot,
    destroyed: bool,
}

impl Engine {
    /// Resolves `resource` against `registry` and initializes the selected
    /// backend. The fresh handle reports errors in [`ErrorMode::Abort`].
    pub fn init(resource: &str, registry: &Registry) -> Result<Self> {
        let entry = registry.resolve(resource)?;
        let res = Resource::new(resource);
        let backend = (entry.init())(&res)?;
        Ok(Self {
            resource: res,
            reporter: Reporter::new(),
            backend,
            context: ContextSlot::new(),
            destroyed: false,
        })
    }

    /// The resource string this handle was initialized with.
    pub fn resource(&self) -> &Resource {
        &self.resource
    }

    /// The active backend's name.
    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// The handle's failure behavior.
    pub fn error_mode(&self) -> ErrorMode {
        self.reporter.mode()
    }

    /// Switches between aborting and returning on failure.
    pub fn set_error_mode(&self, mode: ErrorMode) {
        self.reporter.set_mode(mode);
    }

    /// The handle's own context slot.
    pub fn context(&self) -> &ContextSlot {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut ContextSlot {
        &mut self.context
    }

    /// Whether the backend provides `operation` natively.
    pub fn supports(&self, operation: Operation) -> bool {
        self.backend.supports(operation)
    }

    /// Residency the backend prefers for its vectors.
    pub fn preferred_mem_type(&self) -> MemType {
        self.backend.preferred_mem_type()
    }

    /// Creates a vector of `len` elements through the backend.
    pub fn vector_create(&self, len: usize) -> Result<Vector> {
        self.reporter.filter(self.backend.vector_create(len))
    }

    /// Creates a tensor-product basis through the backend.
    pub fn basis_create_tensor(
        &self,
        dim: usize,
        p1d: usize,
        q1d: usize,
        interp1d: Vec<Scalar>,
        grad1d: Vec<Scalar>,
        qweight1d: Vec<Scalar>,
    ) -> Result<Basis> {
        self.reporter.filter(self.backend.basis_create_tensor(
            dim, p1d, q1d, interp1d, grad1d, qweight1d,
        ))
    }

    /// Creates an element restriction through the backend.
    pub fn elem_restriction_create(
        &self,
        num_elem: usize,
        elem_size: usize,
        lsize: usize,
        indices: Vec<usize>,
    ) -> Result<ElemRestriction> {
        self.reporter.filter(
            self.backend
                .elem_restriction_create(num_elem, elem_size, lsize, indices),
        )
    }

    /// Creates a pointwise kernel through the backend.
    pub fn qfunction_create(
        &self,
        name: &str,
        num_inputs: usize,
        num_outputs: usize,
        user_fn: QFunctionFn,
    ) -> Result<QFunction> {
        self.reporter.filter(
            self.backend
                .qfunction_create(name, num_inputs, num_outputs, user_fn),
        )
    }

    /// Creates an operator. When the backend declines, the operator runs
    /// with the serial host strategy instead.
    pub fn operator_create(
        &self,
        qf: Arc<QFunction>,
        restr: Option<Arc<ElemRestriction>>,
    ) -> Result<Operator> {
        let result = match self.backend.operator_create(Arc::clone(&qf), restr.clone()) {
            Err(e) if e.is_unsupported() => Ok(Operator::new(qf, restr, Box::new(HostStrategy))),
            other => other,
        };
        self.reporter.filter(result)
    }

    /// Creates a composite operator. When the backend declines, the generic
    /// summing composite is built instead.
    pub fn composite_operator_create(&self, sub: Vec<Operator>) -> Result<CompositeOperator> {
        if !self.backend.supports(Operation::CompositeOperatorCreate) {
            return Ok(CompositeOperator::generic(sub));
        }
        self.reporter
            .filter(self.backend.composite_operator_create(sub))
    }
}

impl core::fmt::Debug for Engine {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Engine")
            .field("resource", &self.resource)
            .field("backend", &self.backend.name())
            .field("error_mode", &self.reporter.mode())
            .field("context", &self.context)
            .finish()
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        if !self.destroyed {
            self.destroyed = true;
            // Under Abort mode filter already terminates; under Return mode
            // there is no caller left to hand the error to, so report it on
            // the same stderr channel rather than dropping it.
            if let Err(e) = self.reporter.filter(self.backend.destroy()) {
                eprintln!("{}:{}: {}", e.location().file(), e.location().line(), e.message());
            }
        }
    }
}
