//! Runtime kernel compilation and launch on the wgpu device layer.
//!
//! Device kernels arrive as WGSL source text plus an ordered list of
//! (name, integer) [`CompileOption`]s. The context prepends a standard
//! header — the scalar and index type aliases and the block-geometry
//! constants — renders each option as a `const NAME: i32 = value;`
//! definition, and hands the result to the device compiler inside a
//! validation error scope so a rejected kernel surfaces the compiler's full
//! diagnostic log, not just a status.
//!
//! [`GpuContext::compile`] itself never caches: callers that reuse modules
//! hold on to them, typically through a [`ModuleCache`] keyed by the
//! (source, options) fingerprint.
//!
//! Launch geometry is explicit. WGSL fixes the workgroup size when the
//! module is compiled, so the block dimensions requested at launch are
//! verified against the module's compiled `BLOCK_X/BLOCK_Y/BLOCK_Z` and a
//! mismatch is a usage error. Dispatches are asynchronous: they enqueue
//! work and return, with ordering left to the device queue.

use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::Arc;

use briny::prelude::*;

use crate::error::{Error, Result};
use crate::DeviceScalar;

/// Default workgroup geometry injected when the caller supplies none.
pub const DEFAULT_BLOCK: (u32, u32, u32) = (64, 1, 1);

const MAX_KERNEL_SOURCE_LEN: usize = 65536;

lazy_static::lazy_static! {
    /// One wgpu instance for the whole process; contexts select adapters
    /// from it by ordinal.
    static ref INSTANCE: wgpu::Instance = wgpu::Instance::default();
}

/// A named integer preprocessor definition for kernel compilation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CompileOption {
    pub name: String,
    pub value: i32,
}

impl CompileOption {
    pub fn new(name: impl Into<String>, value: i32) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// Wrapper validating kernel source text before it reaches the device
/// compiler.
pub struct KernelSource<'a>(pub &'a str);

impl Validate for KernelSource<'_> {
    fn validate(&self) -> core::result::Result<(), ValidationError> {
        let src = self.0;

        if src.is_empty() || src.len() > MAX_KERNEL_SOURCE_LEN {
            return Err(ValidationError);
        }

        // Disallow source inclusion; modules are self-contained text.
        if src.contains("#include") || src.contains("import") {
            return Err(ValidationError);
        }

        Ok(())
    }
}

/// A compiled kernel module: the shader artifact plus the geometry and
/// fingerprint it was compiled with.
#[derive(Debug)]
pub struct Module {
    module: wgpu::ShaderModule,
    fingerprint: u64,
    block: (u32, u32, u32),
}

impl Module {
    /// Hash of the (source, options) pair this module was built from.
    pub fn fingerprint(&self) -> u64 {
        self.fingerprint
    }

    /// The workgroup geometry the module was compiled for.
    pub fn block(&self) -> (u32, u32, u32) {
        self.block
    }
}

/// A resolved kernel entry point, ready to launch.
#[derive(Debug)]
pub struct Kernel {
    pipeline: wgpu::ComputePipeline,
    name: String,
    block: (u32, u32, u32),
}

impl Kernel {
    /// The entry-point name this kernel was resolved from.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// One opaque kernel argument, bound at its position's binding index.
///
/// No type checking happens here: a mismatch against the kernel's declared
/// bindings is a device-level validation failure at launch, not something
/// this layer can diagnose.
pub enum KernelArg<'a> {
    /// A storage buffer (vector data, output buffers, ...).
    Buffer(&'a wgpu::Buffer),
    /// A single signed integer, delivered as a tiny uniform buffer.
    Int(i32),
    /// A single unsigned integer.
    Uint(u32),
    /// A single device scalar.
    Scalar(DeviceScalar),
}

/// Device, queue, and adapter state for one GPU ordinal.
#[derive(Debug)]
pub struct GpuContext {
    device: wgpu::Device,
    queue: wgpu::Queue,
    ordinal: usize,
    adapter_name: String,
    max_block_volume: u32,
}

impl GpuContext {
    /// Opens the adapter at `ordinal` and requests a device + queue.
    ///
    /// Fails with a configuration error when the ordinal is out of range
    /// and a device error when the device request is refused.
    pub fn new(ordinal: usize) -> Result<Self> {
        let mut adapters = INSTANCE.enumerate_adapters(wgpu::Backends::all());
        if ordinal >= adapters.len() {
            return Err(Error::config(format!(
                "device ordinal {ordinal} out of range ({} adapter(s) present)",
                adapters.len()
            )));
        }
        let adapter = adapters.swap_remove(ordinal);
        let adapter_name = adapter.get_info().name;

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: None,
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            memory_hints: wgpu::MemoryHints::Performance,
            trace: wgpu::Trace::default(),
        }))
        .map_err(|e| Error::device(format!("device request failed: {e}")))?;

        let max_block_volume = device.limits().max_compute_invocations_per_workgroup;

        Ok(Self {
            device,
            queue,
            ordinal,
            adapter_name,
            max_block_volume,
        })
    }

    /// The selected device ordinal.
    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    /// Adapter name, for diagnostics.
    pub fn adapter_name(&self) -> &str {
        &self.adapter_name
    }

    /// The underlying wgpu device.
    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    /// The device's submission queue.
    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Compiles WGSL `source` with the given options.
    ///
    /// The standard header is prepended first: `alias Scalar`/`alias Index`,
    /// then one `const NAME: i32 = value;` per option, then defaults for any
    /// of `BLOCK_X`/`BLOCK_Y`/`BLOCK_Z` the caller did not supply. Kernels
    /// declare `@workgroup_size(BLOCK_X, BLOCK_Y, BLOCK_Z)` to pick the
    /// geometry up.
    ///
    /// On rejection the error carries the compiler's complete diagnostic.
    /// No caching happens here; see [`ModuleCache`].
    pub fn compile(&self, source: &str, options: &[CompileOption]) -> Result<Module> {
        KernelSource(source)
            .validate()
            .map_err(|_| Error::compile("kernel source rejected", "failed pre-compile validation"))?;

        let block = block_from_options(options);
        let volume = block.0 as u64 * block.1 as u64 * block.2 as u64;
        if volume == 0 || volume > u64::from(self.max_block_volume) {
            return Err(Error::config(format!(
                "block geometry {}x{}x{} exceeds device limit of {} invocations per workgroup",
                block.0, block.1, block.2, self.max_block_volume
            )));
        }

        let mut text = String::with_capacity(source.len() + 256);
        text.push_str("alias Scalar = f32;\nalias Index = i32;\n");
        for opt in options {
            if !is_ident(&opt.name) {
                return Err(Error::usage(format!(
                    "compile option name '{}' is not an identifier",
                    opt.name
                )));
            }
            text.push_str(&format!("const {}: i32 = {};\n", opt.name, opt.value));
        }
        for (name, value) in [
            ("BLOCK_X", block.0),
            ("BLOCK_Y", block.1),
            ("BLOCK_Z", block.2),
        ] {
            if !options.iter().any(|o| o.name == name) {
                text.push_str(&format!("const {name}: i32 = {value};\n"));
            }
        }
        text.push_str(source);

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("opforge-jit"),
            source: wgpu::ShaderSource::Wgsl(text.as_str().into()),
        });
        if let Some(err) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(Error::compile("shader compilation failed", err));
        }

        Ok(Module {
            module,
            fingerprint: fingerprint(source, options),
            block,
        })
    }

    /// Resolves the entry point `name` in `module` into a launchable
    /// kernel. Fails with the compiler diagnostic when the entry point does
    /// not exist or fails pipeline validation.
    pub fn get_kernel(&self, module: &Module, name: &str) -> Result<Kernel> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let pipeline = self
            .device
            .create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(name),
                layout: None,
                module: &module.module,
                entry_point: Some(name),
                cache: None,
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            });
        if let Some(err) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(Error::compile(
                format!("kernel entry point '{name}' could not be resolved"),
                err,
            ));
        }
        Ok(Kernel {
            pipeline,
            name: name.to_string(),
            block: module.block,
        })
    }

    /// Launches with one-dimensional geometry: `grid` workgroups of
    /// `block` invocations.
    pub fn launch(&self, kernel: &Kernel, grid: u32, block: u32, args: &[KernelArg]) -> Result<()> {
        self.launch_dim(kernel, grid, block, 1, 1, args)
    }

    /// Launches `grid` workgroups with explicit three-dimensional block
    /// geometry.
    ///
    /// The requested block must equal the geometry the module was compiled
    /// with; the dispatch is enqueued and the call returns without waiting
    /// for completion.
    pub fn launch_dim(
        &self,
        kernel: &Kernel,
        grid: u32,
        block_x: u32,
        block_y: u32,
        block_z: u32,
        args: &[KernelArg],
    ) -> Result<()> {
        if (block_x, block_y, block_z) != kernel.block {
            return Err(Error::usage(format!(
                "launch block {}x{}x{} does not match the {}x{}x{} geometry kernel '{}' was compiled with",
                block_x, block_y, block_z, kernel.block.0, kernel.block.1, kernel.block.2, kernel.name
            )));
        }
        if grid == 0 {
            return Err(Error::usage("launch grid size must be nonzero"));
        }

        // Scalar arguments become single-value uniform buffers created for
        // this launch; buffer arguments bind directly.
        let scratch: Vec<Option<wgpu::Buffer>> = args
            .iter()
            .map(|arg| match arg {
                KernelArg::Buffer(_) => None,
                KernelArg::Int(v) => Some(self.uniform_buffer(&v.to_le_bytes())),
                KernelArg::Uint(v) => Some(self.uniform_buffer(&v.to_le_bytes())),
                KernelArg::Scalar(v) => Some(self.uniform_buffer(&v.to_le_bytes())),
            })
            .collect();

        let entries: Vec<wgpu::BindGroupEntry> = args
            .iter()
            .zip(&scratch)
            .enumerate()
            .map(|(i, (arg, scratch_buf))| {
                let buffer = match arg {
                    KernelArg::Buffer(b) => *b,
                    _ => scratch_buf.as_ref().unwrap_or_else(|| unreachable!()),
                };
                wgpu::BindGroupEntry {
                    binding: i as u32,
                    resource: buffer.as_entire_binding(),
                }
            })
            .collect();

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("opforge-launch"),
            layout: &kernel.pipeline.get_bind_group_layout(0),
            entries: &entries,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("opforge-launch"),
            });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some(kernel.name.as_str()),
                timestamp_writes: None,
            });
            pass.set_pipeline(&kernel.pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.dispatch_workgroups(grid, 1, 1);
        }
        self.queue.submit(Some(encoder.finish()));

        if let Some(err) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(Error::device(format!(
                "launch of kernel '{}' failed: {err}",
                kernel.name
            )));
        }
        Ok(())
    }

    /// A zero-initialized storage buffer for `len` device scalars.
    pub fn create_storage_buffer(&self, len: usize) -> wgpu::Buffer {
        let size = (len.max(1) * size_of::<DeviceScalar>()) as u64;
        self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("opforge-storage"),
            size,
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_SRC
                | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    /// Writes `data` into `buffer` at offset zero. The copy is staged and
    /// ordered before any subsequently submitted work.
    pub fn upload(&self, buffer: &wgpu::Buffer, data: &[DeviceScalar]) {
        self.queue.write_buffer(buffer, 0, as_bytes(data));
    }

    /// Copies `len` scalars out of `buffer` through a staging buffer,
    /// blocking until the device has drained prior submissions.
    pub fn read_buffer(&self, buffer: &wgpu::Buffer, len: usize) -> Result<Vec<DeviceScalar>> {
        let size = (len.max(1) * size_of::<DeviceScalar>()) as u64;
        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("opforge-staging"),
            size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("opforge-readback"),
            });
        encoder.copy_buffer_to_buffer(buffer, 0, &staging, 0, size);
        self.queue.submit(Some(encoder.finish()));

        staging.slice(..).map_async(wgpu::MapMode::Read, |_| {});
        self.device
            .poll(wgpu::PollType::Wait)
            .map_err(|e| Error::device(format!("device poll failed: {e}")))?;

        let view = staging.slice(..).get_mapped_range();
        let scalars = bytes_to_scalar_slice(&view)?;
        let out = scalars[..len].to_vec();
        drop(view);
        staging.unmap();
        Ok(out)
    }

    fn uniform_buffer(&self, bytes: &[u8]) -> wgpu::Buffer {
        use wgpu::util::DeviceExt;
        self.device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("opforge-arg"),
                contents: bytes,
                usage: wgpu::BufferUsages::UNIFORM,
            })
    }
}

/// Fingerprint of a (source, options) pair. Distinct option sets yield
/// distinct fingerprints even for identical source text.
pub fn fingerprint(source: &str, options: &[CompileOption]) -> u64 {
    let mut hasher = DefaultHasher::new();
    source.hash(&mut hasher);
    for opt in options {
        opt.hash(&mut hasher);
    }
    hasher.finish()
}

/// Module cache keyed by (source, options) fingerprint, so a module is
/// compiled at most once per distinct pair for this cache's lifetime.
#[derive(Default)]
pub struct ModuleCache {
    entries: HashMap<u64, Arc<Module>>,
}

impl ModuleCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached module for the pair, compiling on first sight.
    pub fn get_or_compile(
        &mut self,
        ctx: &GpuContext,
        source: &str,
        options: &[CompileOption],
    ) -> Result<Arc<Module>> {
        let fp = fingerprint(source, options);
        if let Some(module) = self.entries.get(&fp) {
            return Ok(Arc::clone(module));
        }
        let module = Arc::new(ctx.compile(source, options)?);
        self.entries.insert(fp, Arc::clone(&module));
        Ok(module)
    }

    /// Number of distinct compiled modules held.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn block_from_options(options: &[CompileOption]) -> (u32, u32, u32) {
    let pick = |name: &str, default: u32| {
        options
            .iter()
            .find(|o| o.name == name)
            .map(|o| o.value.max(0) as u32)
            .unwrap_or(default)
    };
    (
        pick("BLOCK_X", DEFAULT_BLOCK.0),
        pick("BLOCK_Y", DEFAULT_BLOCK.1),
        pick("BLOCK_Z", DEFAULT_BLOCK.2),
    )
}

fn is_ident(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn as_bytes<T: Copy>(data: &[T]) -> &[u8] {
    let len = size_of_val(data);
    unsafe { std::slice::from_raw_parts(data.as_ptr() as *const u8, len) }
}

fn bytes_to_scalar_slice(data: &[u8]) -> Result<&[DeviceScalar]> {
    if data.as_ptr() as usize % align_of::<DeviceScalar>() != 0 {
        return Err(Error::device("unaligned readback buffer"));
    }
    if data.len() % size_of::<DeviceScalar>() != 0 {
        return Err(Error::device(
            "readback length is not a multiple of the scalar size",
        ));
    }
    let len = data.len() / size_of::<DeviceScalar>();
    let ptr = data.as_ptr() as *const DeviceScalar;
    unsafe { Ok(std::slice::from_raw_parts(ptr, len)) }
}
