use opforge::backend::{MemType, Operation};
use opforge::engine::Engine;
use opforge::error::{ErrorCode, ErrorMode};
use opforge::registry::Registry;

#[test]
fn test_init_cpu_ref() {
    let reg = Registry::with_builtins().unwrap();
    let engine = Engine::init("/cpu/self/ref", &reg).unwrap();
    assert_eq!(engine.backend_name(), "cpu-ref");
    assert_eq!(engine.preferred_mem_type(), MemType::Host);
    assert_eq!(engine.resource().as_str(), "/cpu/self/ref");
    assert_eq!(engine.error_mode(), ErrorMode::Abort);
}

#[test]
fn test_init_unknown_resource_returns_error() {
    let reg = Registry::with_builtins().unwrap();
    // No handle exists yet, so the failure comes back regardless of mode.
    let err = Engine::init("/fpga/self/ref", &reg).unwrap_err();
    assert_eq!(err.code(), ErrorCode::Config);
    assert!(err.message().contains("no suitable backend"));
}

#[test]
fn test_vector_create_through_engine() {
    let reg = Registry::with_builtins().unwrap();
    let engine = Engine::init("/cpu/self/ref", &reg).unwrap();
    let mut v = engine.vector_create(6).unwrap();
    assert_eq!(v.len(), 6);
    v.set_array(vec![1.0; 6]).unwrap();
    let r = v.read_host().unwrap();
    assert_eq!(&*r, &[1.0; 6]);
}

#[test]
fn test_return_mode_propagates_structured_error() {
    let reg = Registry::with_builtins().unwrap();
    let engine = Engine::init("/cpu/self/ref", &reg).unwrap();
    engine.set_error_mode(ErrorMode::Return);

    // Index 7 is out of range for an L-vector of size 4.
    let err = engine
        .elem_restriction_create(2, 2, 4, vec![0, 1, 2, 7])
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::Usage);
    assert!(!err.message().is_empty());
    assert!(err.location().line() > 0);
}

#[test]
fn test_context_slot_replace_returns_previous() {
    let reg = Registry::with_builtins().unwrap();
    let mut engine = Engine::init("/cpu/self/ref", &reg).unwrap();

    assert!(!engine.context().is_set());
    assert!(engine.context_mut().set(42u32).is_none());
    assert_eq!(engine.context().get::<u32>(), Some(&42));

    let previous = engine.context_mut().set("constants").unwrap();
    assert_eq!(previous.downcast_ref::<u32>(), Some(&42));
    assert_eq!(engine.context().get::<&str>(), Some(&"constants"));
    // Type-mismatched access reads as empty rather than failing.
    assert!(engine.context().get::<u32>().is_none());
}

#[test]
fn test_engine_debug_format() {
    let reg = Registry::with_builtins().unwrap();
    let engine = Engine::init("/cpu/self/ref", &reg).unwrap();
    let rendered = format!("{engine:?}");
    assert!(rendered.contains("cpu-ref"));
    assert!(rendered.contains("/cpu/self/ref"));
}

#[test]
fn test_failing_destroy_in_return_mode_does_not_panic() {
    use opforge::backend::{Backend, MemType};
    use opforge::error::Error;
    use opforge::registry::Resource;
    use opforge::vector::Vector;

    struct FailingDestroy;

    impl Backend for FailingDestroy {
        fn name(&self) -> &str {
            "failing-destroy"
        }

        fn preferred_mem_type(&self) -> MemType {
            MemType::Host
        }

        fn vector_create(&self, len: usize) -> opforge::Result<Vector> {
            Ok(Vector::new_host(len))
        }

        fn destroy(&mut self) -> opforge::Result<()> {
            Err(Error::device("teardown failed"))
        }
    }

    fn init(_resource: &Resource) -> opforge::Result<Box<dyn Backend>> {
        Ok(Box::new(FailingDestroy))
    }

    let mut reg = Registry::new();
    reg.register("/test/teardown", 1, init).unwrap();

    let engine = Engine::init("/test/teardown", &reg).unwrap();
    engine.set_error_mode(ErrorMode::Return);
    // The destroy error is reported on stderr during drop; the process
    // must survive it.
    drop(engine);
}

#[test]
fn test_capability_probe() {
    let reg = Registry::with_builtins().unwrap();
    let engine = Engine::init("/cpu/self/ref", &reg).unwrap();
    assert!(engine.supports(Operation::VectorCreate));
    assert!(engine.supports(Operation::OperatorCreate));
    assert!(!engine.supports(Operation::CompositeOperatorCreate));
}
