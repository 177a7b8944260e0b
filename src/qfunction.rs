//! User-supplied pointwise kernels.
//!
//! A [`QFunction`] wraps a caller's closure that evaluates some pointwise
//! physics at `q` quadrature points, together with its declared field counts
//! and a context slot for runtime constants. The core never interprets the
//! math; it only moves field slices in and out.

use core::fmt;

use crate::context::ContextSlot;
use crate::error::{Error, Result};
use crate::Scalar;

/// The user callback: `(num_points, inputs, outputs)`. Each input slice and
/// output slice holds one field's values across all `num_points` points.
pub type QFunctionFn =
    Box<dyn Fn(usize, &[&[Scalar]], &mut [&mut [Scalar]]) -> Result<()> + Send + Sync>;

/// A named pointwise kernel with fixed input/output arity.
pub struct QFunction {
    name: String,
    num_inputs: usize,
    num_outputs: usize,
    user_fn: QFunctionFn,
    context: ContextSlot,
}

impl QFunction {
    pub fn new(
        name: impl Into<String>,
        num_inputs: usize,
        num_outputs: usize,
        user_fn: QFunctionFn,
    ) -> Self {
        Self {
            name: name.into(),
            num_inputs,
            num_outputs,
            user_fn,
            context: ContextSlot::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn num_inputs(&self) -> usize {
        self.num_inputs
    }

    pub fn num_outputs(&self) -> usize {
        self.num_outputs
    }

    /// The kernel's private state slot (physics constants and the like).
    pub fn context(&self) -> &ContextSlot {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut ContextSlot {
        &mut self.context
    }

    /// Direct access to the user callback, for backends that fan
    /// application out across threads. Skips the arity check; callers
    /// validate field counts themselves.
    pub fn user_fn(
        &self,
    ) -> &(dyn Fn(usize, &[&[Scalar]], &mut [&mut [Scalar]]) -> Result<()> + Send + Sync) {
        &*self.user_fn
    }

    /// Invokes the user callback on `num_points` points, checking the field
    /// arity first. An arity mismatch is a usage error raised here rather
    /// than a slice panic inside the callback.
    pub fn apply(
        &self,
        num_points: usize,
        inputs: &[&[Scalar]],
        outputs: &mut [&mut [Scalar]],
    ) -> Result<()> {
        if inputs.len() != self.num_inputs {
            return Err(Error::usage(format!(
                "qfunction '{}' expects {} input field(s), got {}",
                self.name,
                self.num_inputs,
                inputs.len()
            )));
        }
        if outputs.len() != self.num_outputs {
            return Err(Error::usage(format!(
                "qfunction '{}' expects {} output field(s), got {}",
                self.name,
                self.num_outputs,
                outputs.len()
            )));
        }
        (self.user_fn)(num_points, inputs, outputs)
    }
}

impl fmt::Debug for QFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QFunction")
            .field("name", &self.name)
            .field("num_inputs", &self.num_inputs)
            .field("num_outputs", &self.num_outputs)
            .field("context", &self.context)
            .finish()
    }
}
