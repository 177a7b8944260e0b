//! wgpu device backend.
//!
//! Owns one [`GpuContext`] selected by the resource string's trailing
//! device ordinal, plus a module cache so repeated compilations of the same
//! (source, options) pair resolve without touching the device compiler.
//!
//! Vectors prefer device residency. Creation operations that are pure data
//! (basis, restriction, qfunction) behave as on the CPU backends; operator
//! creation is not accelerated here and reports unsupported, which sends
//! the front end down the host application path.

use std::sync::{Arc, Mutex};

use crate::backend::{Backend, MemType, Operation};
use crate::basis::Basis;
use crate::error::{Error, Result};
use crate::gpu::{CompileOption, GpuContext, Kernel, Module, ModuleCache};
use crate::qfunction::{QFunction, QFunctionFn};
use crate::registry::Resource;
use crate::restriction::ElemRestriction;
use crate::vector::Vector;
use crate::Scalar;

pub const PREFIX: &str = "/gpu/wgpu/ref";

pub fn init(resource: &Resource) -> Result<Box<dyn Backend>> {
    let ordinal = resource.device_ordinal(PREFIX.len());
    let ctx = Arc::new(GpuContext::new(ordinal)?);
    Ok(Box::new(WgpuRef {
        ctx,
        modules: Mutex::new(ModuleCache::new()),
    }))
}

pub struct WgpuRef {
    ctx: Arc<GpuContext>,
    modules: Mutex<ModuleCache>,
}

impl WgpuRef {
    /// The device context this backend runs on.
    pub fn context(&self) -> &Arc<GpuContext> {
        &self.ctx
    }

    /// Compiles `source` with `options`, hitting the cache on repeats.
    pub fn compile(&self, source: &str, options: &[CompileOption]) -> Result<Arc<Module>> {
        let mut cache = self
            .modules
            .lock()
            .map_err(|_| Error::resource("module cache lock poisoned"))?;
        cache.get_or_compile(&self.ctx, source, options)
    }

    /// Resolves an entry point in a compiled module.
    pub fn get_kernel(&self, module: &Module, name: &str) -> Result<Kernel> {
        self.ctx.get_kernel(module, name)
    }

    /// Number of distinct modules compiled so far.
    pub fn module_count(&self) -> usize {
        self.modules.lock().map(|c| c.len()).unwrap_or(0)
    }
}

impl Backend for WgpuRef {
    fn name(&self) -> &str {
        "wgpu-ref"
    }

    fn preferred_mem_type(&self) -> MemType {
        MemType::Device
    }

    fn vector_create(&self, len: usize) -> Result<Vector> {
        Ok(Vector::new_device(len, Arc::clone(&self.ctx)))
    }

    fn destroy(&mut self) -> Result<()> {
        // Buffers and modules drop with their owners; the device itself is
        // released when the last Arc to the context goes.
        Ok(())
    }

    fn supports(&self, operation: Operation) -> bool {
        !matches!(
            operation,
            Operation::OperatorCreate | Operation::CompositeOperatorCreate
        )
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
}
