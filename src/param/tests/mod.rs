use crate::errors::ConfigurationError;
use crate::param::{Castable, DType, HasDtype, Param, ParamMap, ParameterSet};
use crate::tensor::Tensor;

#[test]
fn test_param_clone_shares_storage() {
    let a = Param::new("w", Tensor::zeros(&[2, 2]));
    let b = a.clone();
    b.set_value(Tensor::ones(&[2, 2])).unwrap();
    assert_eq!(a.get_value(), Tensor::ones(&[2, 2]));
    assert!(a.ptr_eq(&b));
    assert_eq!(a.id(), b.id());
}

#[test]
fn test_param_detach_isolates() {
    let a = Param::new("w", Tensor::zeros(&[3]));
    let detached = a.detach();
    detached.set_value(Tensor::ones(&[3])).unwrap();
    assert_eq!(a.get_value(), Tensor::zeros(&[3]));
    assert_ne!(a.id(), detached.id());
    assert_eq!(detached.name().as_deref(), Some("w"));
}

#[test]
fn test_param_set_value_rejects_shape_change() {
    let a = Param::new("b", Tensor::zeros(&[3]));
    let err = a.set_value(Tensor::zeros(&[4])).unwrap_err();
    assert_eq!(
        err,
        ConfigurationError::ParamShapeMismatch {
            name: "b".to_string(),
            expected: vec![3],
            got: vec![4],
        }
    );
}

#[test]
fn test_param_cast_to_bf16() {
    let mut a = Param::new("w", Tensor::new(&[1.0, 1.001, -3.14159], &[3]));
    assert_eq!(a.dtype(), DType::Float32);
    a.set_dtype(DType::BFloat16).unwrap();
    assert_eq!(a.dtype(), DType::BFloat16);
    let v = a.get_value();
    // bf16 只有7位尾数：1.001 舍入为 1.0
    assert_eq!(v.to_vec()[0], 1.0);
    assert_eq!(v.to_vec()[1], 1.0);
    assert_eq!(v.to_vec()[2].to_bits() & 0xFFFF, 0);
    // 之后写入的值同样被舍入
    a.set_value(Tensor::new(&[0.1, 0.2, 0.3], &[3])).unwrap();
    assert!(a.get_value().to_vec().iter().all(|x| x.to_bits() & 0xFFFF == 0));
}

#[test]
fn test_parameter_set_dedups_by_identity() {
    let w = Param::new("w", Tensor::zeros(&[2, 2]));
    let b = Param::new("b", Tensor::zeros(&[2]));
    let set = ParameterSet::from_params(vec![w.clone(), b.clone(), w.clone()]).unwrap();
    assert_eq!(set.len(), 2);
    assert!(!set.is_empty());
    assert!(set.contains(&w));
    assert_eq!(set.names(), vec!["w".to_string(), "b".to_string()]);
    assert!(set.get_by_name("b").unwrap().ptr_eq(&b));
}

#[test]
fn test_parameter_set_rejects_missing_or_duplicate_names() {
    let unnamed = Param::unnamed(Tensor::zeros(&[2]));
    assert_eq!(
        ParameterSet::from_params(vec![unnamed]).unwrap_err(),
        ConfigurationError::MissingParamName { index: 0 }
    );

    let a = Param::new("same", Tensor::zeros(&[2]));
    let b = Param::new("same", Tensor::zeros(&[2]));
    assert_eq!(
        ParameterSet::from_params(vec![a, b]).unwrap_err(),
        ConfigurationError::DuplicateParamName("same".to_string())
    );
}

#[test]
fn test_param_map_keyed_by_identity() {
    let a = Param::new("a", Tensor::zeros(&[1]));
    let same_name = Param::new("a", Tensor::zeros(&[1]));
    let mut map = ParamMap::new();
    map.insert(&a, Tensor::ones(&[1]));
    assert!(map.contains(&a));
    assert!(map.contains(&a.clone()));
    assert!(!map.contains(&same_name));
    assert_eq!(map.len(), 1);
    assert!(!map.is_empty());
    let (id, value) = map.iter().next().unwrap();
    assert_eq!(*id, a.id());
    assert_eq!(value, &Tensor::ones(&[1]));
}
