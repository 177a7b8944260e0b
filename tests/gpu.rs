#![cfg(feature = "wgpu")]

use std::sync::Arc;

use opforge::backend::MemType;
use opforge::engine::Engine;
use opforge::error::ErrorCode;
use opforge::gpu::{CompileOption, GpuContext, ModuleCache};
use opforge::registry::Registry;

// Every test here skips quietly when the machine has no usable adapter.
fn context() -> Option<GpuContext> {
    GpuContext::new(0).ok()
}

const FILL_KERNEL: &str = r#"
@group(0) @binding(0) var<storage, read_write> out: array<Scalar>;

@compute @workgroup_size(BLOCK_X, BLOCK_Y, BLOCK_Z)
fn fill(@builtin(global_invocation_id) gid: vec3<u32>) {
    if (gid.x < arrayLength(&out)) {
        out[gid.x] = Scalar(N);
    }
}
"#;

#[test]
fn test_device_round_trip() {
    let reg = Registry::with_builtins().unwrap();
    let Ok(engine) = Engine::init("/gpu/wgpu/ref", &reg) else {
        return;
    };
    assert_eq!(engine.preferred_mem_type(), MemType::Device);

    let shared: Arc<[f64]> = Arc::from(vec![1.0, 2.0, 3.0, 4.0]);
    let mut v = engine.vector_create(4).unwrap();
    v.set_array_borrowed(Arc::clone(&shared)).unwrap();

    {
        let d = v.read_device().unwrap();
        assert_eq!(&*d, &[1.0f32, 2.0, 3.0, 4.0]);
    }
    {
        let h = v.read_host().unwrap();
        assert_eq!(&*h, &[1.0, 2.0, 3.0, 4.0]);
    }
    assert_eq!(v.lease_count(), 0);

    drop(v);
    assert_eq!(&*shared, &[1.0, 2.0, 3.0, 4.0]);
}

#[test]
fn test_device_write_invalidates_host() {
    let Some(ctx) = context() else { return };
    let ctx = Arc::new(ctx);

    let mut v = opforge::vector::Vector::new_device(3, ctx);
    v.set_array(vec![1.0, 1.0, 1.0]).unwrap();
    {
        let mut w = v.write_device().unwrap();
        w[1] = 9.0;
    }
    let h = v.read_host().unwrap();
    assert_eq!(&*h, &[1.0, 9.0, 1.0]);
}

#[test]
fn test_compile_failure_carries_diagnostic() {
    let Some(ctx) = context() else { return };

    let err = ctx.compile("fn broken( {", &[]).unwrap_err();
    assert_eq!(err.code(), ErrorCode::Compile);
    // The message embeds the compiler's log, not just a one-line status.
    assert!(err.message().contains('\n'));
    assert!(err.message().len() > "shader compilation failed".len());
}

#[test]
fn test_distinct_option_sets_yield_distinct_modules() {
    let Some(ctx) = context() else { return };
    let mut cache = ModuleCache::new();

    let m3 = cache
        .get_or_compile(&ctx, FILL_KERNEL, &[CompileOption::new("N", 3)])
        .unwrap();
    let m5 = cache
        .get_or_compile(&ctx, FILL_KERNEL, &[CompileOption::new("N", 5)])
        .unwrap();
    assert_ne!(m3.fingerprint(), m5.fingerprint());
    assert_eq!(cache.len(), 2);

    // Repeating an option set hits the cache.
    let m3_again = cache
        .get_or_compile(&ctx, FILL_KERNEL, &[CompileOption::new("N", 3)])
        .unwrap();
    assert_eq!(m3.fingerprint(), m3_again.fingerprint());
    assert_eq!(cache.len(), 2);
}

#[test]
fn test_kernel_writes_compile_option_value() {
    let Some(ctx) = context() else { return };

    let module = ctx
        .compile(FILL_KERNEL, &[CompileOption::new("N", 3)])
        .unwrap();
    let kernel = ctx.get_kernel(&module, "fill").unwrap();

    let buffer = ctx.create_storage_buffer(8);
    ctx.launch(&kernel, 1, 64, &[opforge::gpu::KernelArg::Buffer(&buffer)])
        .unwrap();

    let out = ctx.read_buffer(&buffer, 8).unwrap();
    assert_eq!(out, vec![3.0f32; 8]);
}

#[test]
fn test_single_invocation_launch() {
    let Some(ctx) = context() else { return };

    let options = [CompileOption::new("N", 3), CompileOption::new("BLOCK_X", 1)];
    let module = ctx.compile(FILL_KERNEL, &options).unwrap();
    let kernel = ctx.get_kernel(&module, "fill").unwrap();

    let buffer = ctx.create_storage_buffer(1);
    ctx.launch(&kernel, 1, 1, &[opforge::gpu::KernelArg::Buffer(&buffer)])
        .unwrap();
    assert_eq!(ctx.read_buffer(&buffer, 1).unwrap(), vec![3.0f32]);
}

#[test]
fn test_missing_entry_point_is_compile_error() {
    let Some(ctx) = context() else { return };

    let module = ctx
        .compile(FILL_KERNEL, &[CompileOption::new("N", 1)])
        .unwrap();
    let err = ctx.get_kernel(&module, "no_such_kernel").unwrap_err();
    assert_eq!(err.code(), ErrorCode::Compile);
}

#[test]
fn test_launch_block_mismatch_is_usage_error() {
    let Some(ctx) = context() else { return };

    let module = ctx
        .compile(FILL_KERNEL, &[CompileOption::new("N", 1)])
        .unwrap();
    let kernel = ctx.get_kernel(&module, "fill").unwrap();
    let buffer = ctx.create_storage_buffer(4);

    // Module compiled with the default 64x1x1 geometry.
    let err = ctx
        .launch(&kernel, 1, 32, &[opforge::gpu::KernelArg::Buffer(&buffer)])
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::Usage);
}

#[test]
fn test_out_of_range_ordinal_is_config_error() {
    let err = GpuContext::new(usize::MAX).unwrap_err();
    assert_eq!(err.code(), ErrorCode::Config);
}
