use std::sync::Arc;

use opforge::error::ErrorCode;
use opforge::vector::Vector;

#[test]
fn test_set_array_round_trip() {
    let mut v = Vector::new_host(4);
    v.set_array(vec![1.0, 2.0, 3.0, 4.0]).unwrap();
    let r = v.read_host().unwrap();
    assert_eq!(&*r, &[1.0, 2.0, 3.0, 4.0]);
}

#[test]
fn test_borrowed_array_survives_vector_untouched() {
    let shared: Arc<[f64]> = Arc::from(vec![1.0, 2.0, 3.0, 4.0]);
    let mut v = Vector::new_host(4);
    v.set_array_borrowed(Arc::clone(&shared)).unwrap();

    // A writable lease promotes to an owned copy before mutation.
    {
        let mut w = v.write_host().unwrap();
        w[0] = 99.0;
    }
    {
        let r = v.read_host().unwrap();
        assert_eq!(r[0], 99.0);
    }
    drop(v);
    assert_eq!(&*shared, &[1.0, 2.0, 3.0, 4.0]);
}

#[test]
fn test_lease_counts_return_to_zero() {
    let mut v = Vector::new_host(3);
    v.set_array(vec![0.5, 1.5, 2.5]).unwrap();
    {
        let _r = v.read_host().unwrap();
    }
    assert_eq!(v.lease_count(), 0);
    {
        let _w = v.write_host().unwrap();
    }
    assert_eq!(v.lease_count(), 0);
}

#[test]
fn test_never_written_reads_zeros() {
    let mut v = Vector::new_host(5);
    let r = v.read_host().unwrap();
    assert_eq!(&*r, &[0.0; 5]);
}

#[test]
fn test_wrong_length_attach_is_usage_error() {
    let mut v = Vector::new_host(4);
    let err = v.set_array(vec![1.0, 2.0]).unwrap_err();
    assert_eq!(err.code(), ErrorCode::Usage);
}

#[test]
fn test_host_only_vector_has_no_device() {
    let v = Vector::new_host(4);
    assert!(!v.has_device());
}
