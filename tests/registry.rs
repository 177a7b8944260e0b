use opforge::backends::{cpu_opt, cpu_ref};
use opforge::error::ErrorCode;
use opforge::registry::{Registry, Resource, MAX_BACKENDS};

#[test]
fn test_resolve_longest_prefix_wins() {
    let mut reg = Registry::new();
    reg.register("/x/y", 10, cpu_ref::init).unwrap();
    reg.register("/x/y/ref", 20, cpu_ref::init).unwrap();

    // "/x/y/ref" does not lead "/x/y/other", so the shorter prefix is the
    // only full match.
    let entry = reg.resolve("/x/y/other").unwrap();
    assert_eq!(entry.prefix(), "/x/y");

    let entry = reg.resolve("/x/y/ref/0").unwrap();
    assert_eq!(entry.prefix(), "/x/y/ref");
}

#[test]
fn test_resolve_priority_breaks_equal_length() {
    let mut reg = Registry::new();
    reg.register("/x/y", 10, cpu_ref::init).unwrap();
    reg.register("/x/y", 30, cpu_ref::init).unwrap();
    reg.register("/x/y", 20, cpu_ref::init).unwrap();

    let entry = reg.resolve("/x/y/anything").unwrap();
    assert_eq!(entry.priority(), 30);
}

#[test]
fn test_resolve_priority_tie_keeps_first_registered() {
    let mut reg = Registry::new();
    reg.register("/x/y", 10, cpu_ref::init).unwrap();
    reg.register("/x/y", 10, cpu_opt::init).unwrap();

    // Both entries match with equal prefix and priority; the earlier
    // registration wins deterministically.
    let entry = reg.resolve("/x/y").unwrap();
    assert_eq!(entry.init() as usize, cpu_ref::init as usize);
}

#[test]
fn test_resolve_no_match_is_config_error() {
    let mut reg = Registry::new();
    reg.register("/cpu/self/ref", 50, cpu_ref::init).unwrap();

    let err = reg.resolve("/gpu/nonexistent").unwrap_err();
    assert_eq!(err.code(), ErrorCode::Config);
    assert!(err.message().contains("no suitable backend"));
}

#[test]
fn test_registry_capacity() {
    let mut reg = Registry::new();
    for i in 0..MAX_BACKENDS {
        reg.register(format!("/p/{i}"), 0, cpu_ref::init).unwrap();
    }
    let err = reg.register("/p/overflow", 0, cpu_ref::init).unwrap_err();
    assert_eq!(err.code(), ErrorCode::Resource);
}

#[test]
fn test_device_ordinal_parse() {
    let prefix = "/gpu/wgpu/ref";
    assert_eq!(Resource::new("/gpu/wgpu/ref/2").device_ordinal(prefix.len()), 2);
    assert_eq!(Resource::new("/gpu/wgpu/ref").device_ordinal(prefix.len()), 0);
    assert_eq!(Resource::new("/gpu/wgpu/ref/").device_ordinal(prefix.len()), 0);
    assert_eq!(Resource::new("/gpu/wgpu/ref/abc").device_ordinal(prefix.len()), 0);
    assert_eq!(
        Resource::new("/gpu/wgpu/ref/12/extra").device_ordinal(prefix.len()),
        12
    );
}

#[test]
fn test_builtins_resolve() {
    let reg = Registry::with_builtins().unwrap();
    assert_eq!(reg.resolve("/cpu/self/ref").unwrap().prefix(), "/cpu/self/ref");
    assert_eq!(reg.resolve("/cpu/self/opt").unwrap().prefix(), "/cpu/self/opt");
}
