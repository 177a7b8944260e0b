use std::sync::Arc;

use rand::Rng;

use opforge::engine::Engine;
use opforge::error::ErrorCode;
use opforge::qfunction::QFunctionFn;
use opforge::registry::Registry;

fn scale_qf(factor: f64) -> QFunctionFn {
    Box::new(move |n: usize, inputs: &[&[f64]], outputs: &mut [&mut [f64]]| {
        for i in 0..n {
            outputs[0][i] = factor * inputs[0][i];
        }
        Ok(())
    })
}

#[test]
fn test_pointwise_operator() {
    let reg = Registry::with_builtins().unwrap();
    let engine = Engine::init("/cpu/self/ref", &reg).unwrap();

    let qf = Arc::new(engine.qfunction_create("double", 1, 1, scale_qf(2.0)).unwrap());
    let op = engine.operator_create(qf, None).unwrap();

    let mut input = engine.vector_create(4).unwrap();
    let mut output = engine.vector_create(4).unwrap();
    input.set_array(vec![1.0, 2.0, 3.0, 4.0]).unwrap();

    op.apply(&mut input, &mut output).unwrap();
    let r = output.read_host().unwrap();
    assert_eq!(&*r, &[2.0, 4.0, 6.0, 8.0]);
}

#[test]
fn test_restricted_operator_scatter_adds_shared_nodes() {
    let reg = Registry::with_builtins().unwrap();
    let engine = Engine::init("/cpu/self/ref", &reg).unwrap();

    // Two 2-node elements sharing the middle degree of freedom.
    let restr = Arc::new(
        engine
            .elem_restriction_create(2, 2, 3, vec![0, 1, 1, 2])
            .unwrap(),
    );
    let qf = Arc::new(engine.qfunction_create("identity", 1, 1, scale_qf(1.0)).unwrap());
    let op = engine.operator_create(qf, Some(restr)).unwrap();

    let mut input = engine.vector_create(3).unwrap();
    let mut output = engine.vector_create(3).unwrap();
    input.set_array(vec![1.0, 2.0, 3.0]).unwrap();

    op.apply(&mut input, &mut output).unwrap();
    let r = output.read_host().unwrap();
    assert_eq!(&*r, &[1.0, 4.0, 3.0]);
}

#[test]
fn test_composite_fallback_sums_suboperators() {
    let reg = Registry::with_builtins().unwrap();
    let engine = Engine::init("/cpu/self/ref", &reg).unwrap();

    let identity = Arc::new(engine.qfunction_create("identity", 1, 1, scale_qf(1.0)).unwrap());
    let double = Arc::new(engine.qfunction_create("double", 1, 1, scale_qf(2.0)).unwrap());
    let op_a = engine.operator_create(identity, None).unwrap();
    let op_b = engine.operator_create(double, None).unwrap();

    // The cpu backends decline composite creation, so this is the generic
    // summing form.
    let composite = engine.composite_operator_create(vec![op_a, op_b]).unwrap();
    assert_eq!(composite.num_sub(), 2);

    let mut input = engine.vector_create(3).unwrap();
    let mut output = engine.vector_create(3).unwrap();
    input.set_array(vec![1.0, 2.0, 3.0]).unwrap();

    composite.apply(&mut input, &mut output).unwrap();
    let r = output.read_host().unwrap();
    assert_eq!(&*r, &[3.0, 6.0, 9.0]);
}

#[test]
fn test_cpu_opt_matches_reference() {
    let reg = Registry::with_builtins().unwrap();
    let reference = Engine::init("/cpu/self/ref", &reg).unwrap();
    let optimized = Engine::init("/cpu/self/opt", &reg).unwrap();

    let mut rng = rand::rng();
    let data: Vec<f64> = (0..4096).map(|_| rng.random_range(-1.0..1.0)).collect();

    let mut results = Vec::new();
    for engine in [&reference, &optimized] {
        let qf = Arc::new(engine.qfunction_create("triple", 1, 1, scale_qf(3.0)).unwrap());
        let op = engine.operator_create(qf, None).unwrap();
        let mut input = engine.vector_create(data.len()).unwrap();
        let mut output = engine.vector_create(data.len()).unwrap();
        input.set_array(data.clone()).unwrap();
        op.apply(&mut input, &mut output).unwrap();
        results.push(output.read_host().unwrap().to_vec());
    }
    assert_eq!(results[0], results[1]);
}

#[test]
fn test_zero_node_restriction_is_rejected() {
    // A 0-node restriction would otherwise reach the element chunking in
    // the parallel backend with a zero chunk size.
    let err = opforge::restriction::ElemRestriction::new(1, 0, 4, vec![]).unwrap_err();
    assert_eq!(err.code(), ErrorCode::Usage);

    let reg = Registry::with_builtins().unwrap();
    let engine = Engine::init("/cpu/self/opt", &reg).unwrap();
    engine.set_error_mode(opforge::error::ErrorMode::Return);
    let err = engine.elem_restriction_create(1, 0, 4, vec![]).unwrap_err();
    assert_eq!(err.code(), ErrorCode::Usage);
}

#[test]
fn test_qfunction_arity_mismatch_is_usage_error() {
    let qf = opforge::qfunction::QFunction::new("double", 1, 1, scale_qf(2.0));
    let input = [1.0, 2.0];
    let err = qf.apply(2, &[&input, &input], &mut []).unwrap_err();
    assert_eq!(err.code(), ErrorCode::Usage);
}
