use super::make_dbm;
use crate::assert_err;
use crate::config::DbmConfig;
use crate::errors::{ConfigurationError, DbmError};
use crate::models::dbm::{COMPILED_FIELDS, Dbm};
use crate::models::model::Model;
use crate::param::{Castable, DType, HasDtype};
use crate::tensor::Tensor;
use std::fs;

#[test]
fn test_state_round_trip_is_bit_exact() {
    let mut dbm = make_dbm(&[4, 3, 2], 5);
    dbm.set_monitoring_channel_prefix("valid_");
    dbm.sample_negative_phase().unwrap();

    let state = dbm.get_state().unwrap();
    let restored = Dbm::from_state(state).unwrap();

    let original = dbm.get_param_values().unwrap();
    let loaded = restored.get_param_values().unwrap();
    assert_eq!(original.len(), loaded.len());
    for (a, b) in original.iter().zip(&loaded) {
        assert!(a.bitwise_eq(b));
    }
    assert_eq!(
        restored.get_params().unwrap().names(),
        dbm.get_params().unwrap().names()
    );
    assert_eq!(restored.v_chains(), dbm.v_chains());
    assert_eq!(restored.h_chains(), dbm.h_chains());
    assert_eq!(restored.config(), dbm.config());
    assert_eq!(restored.lifecycle(), dbm.lifecycle());
}

#[test]
fn test_compiled_plan_is_excluded_and_rebuilt_lazily() {
    let mut dbm = make_dbm(&[4, 3, 2], 5);
    dbm.sample_negative_phase().unwrap();
    assert!(dbm.snapshot_fields().unwrap().contains("sweep_plan"));

    let state = dbm.get_state().unwrap();
    for name in COMPILED_FIELDS {
        assert!(!state.contains(name));
    }
    assert_eq!(
        state.field_names(),
        vec![
            "autonomous",
            "config",
            "h_chains",
            "inference_procedure",
            "lifecycle",
            "rbms",
            "rng",
            "v_chains"
        ]
    );

    let mut restored = Dbm::from_state(state).unwrap();
    assert!(!restored.is_compiled());
    restored.sample_negative_phase().unwrap();
    assert!(restored.is_compiled());
}

#[test]
fn test_restored_rng_continues_the_same_stream() {
    let mut dbm = make_dbm(&[4, 3, 2], 5);
    dbm.sample_negative_phase().unwrap();
    let mut restored = Dbm::from_state(dbm.get_state().unwrap()).unwrap();

    for _ in 0..3 {
        dbm.sample_negative_phase().unwrap();
        restored.sample_negative_phase().unwrap();
    }
    assert_eq!(restored.v_chains(), dbm.v_chains());
    assert_eq!(restored.h_chains(), dbm.h_chains());
}

#[test]
fn test_restored_params_are_independent_of_original() {
    let dbm = make_dbm(&[3, 2], 2);
    let restored = Dbm::from_state(dbm.get_state().unwrap()).unwrap();
    restored.stack().weights()[0]
        .set_value(Tensor::ones(&[3, 2]))
        .unwrap();
    assert_ne!(dbm.stack().weights()[0].get_value(), Tensor::ones(&[3, 2]));
    // 恢复后的 DBM 与恢复出的 RBM 仍然共享参数
    assert_eq!(
        restored.rbms()[0].weights().get_value(),
        Tensor::ones(&[3, 2])
    );
}

#[test]
fn test_set_state_merges_partial_state() {
    let source = make_dbm(&[3, 2], 2);
    let mut state = source.get_state().unwrap();
    assert!(state.remove("rng"));

    let mut target = make_dbm(&[3, 2], 2);
    target
        .stack()
        .bias_vis()
        .set_value(Tensor::ones(&[3]))
        .unwrap();
    target.set_state(state).unwrap();
    assert_eq!(
        target.stack().bias_vis().get_value(),
        source.stack().bias_vis().get_value()
    );
}

#[test]
fn test_set_state_rejects_inconsistent_chains() {
    let source = make_dbm(&[3, 2], 2);
    let mut state = source.get_state().unwrap();
    state.insert("v_chains", &Tensor::zeros(&[7, 3])).unwrap();
    let mut target = make_dbm(&[3, 2], 2);
    let chains_before = target.v_chains().clone();
    assert_err!(
        target.set_state(state),
        DbmError::Configuration(ConfigurationError::ParamShapeMismatch { .. })
    );
    assert_eq!(target.v_chains(), &chains_before);
}

#[test]
fn test_rejected_state_leaves_model_untouched() {
    let mut dbm = make_dbm(&[4, 3, 2], 5);
    dbm.sample_negative_phase().unwrap();
    let mut state = dbm.get_state().unwrap();
    // 链数改成7，但链状态仍是5条
    state.insert("config", &DbmConfig::new(7)).unwrap();

    let config_before = dbm.config().clone();
    let v_before = dbm.v_chains().clone();
    let h_before = dbm.h_chains().to_vec();
    let weight_before = dbm.stack().weights()[0].clone();
    let values_before = dbm.get_param_values().unwrap();

    assert_err!(
        dbm.set_state(state),
        DbmError::Configuration(ConfigurationError::ParamShapeMismatch { .. })
    );
    assert_eq!(dbm.negative_chains(), 5);
    assert_eq!(dbm.config(), &config_before);
    assert_eq!(dbm.v_chains(), &v_before);
    assert_eq!(dbm.h_chains(), h_before.as_slice());
    assert!(dbm.stack().weights()[0].ptr_eq(&weight_before));
    assert_eq!(dbm.get_param_values().unwrap(), values_before);
    assert!(dbm.is_compiled());

    // 仍能继续正常采样
    dbm.sample_negative_phase().unwrap();
    assert_eq!(dbm.v_chains().shape(), &[5, 4]);
}

#[test]
fn test_from_state_requires_core_fields() {
    let dbm = make_dbm(&[3, 2], 2);
    let mut state = dbm.get_state().unwrap();
    state.remove("rbms");
    assert_err!(
        Dbm::from_state(state),
        DbmError::Persistence(msg) if msg.contains("rbms")
    );
}

#[test]
fn test_save_and_load_file() {
    let temp_file = "test_dbm_save_and_load_file.bin";
    let mut dbm = make_dbm(&[4, 3, 2], 3);
    dbm.sample_negative_phase().unwrap();
    dbm.save(temp_file).unwrap();
    assert!(crate::utils::macro_for_unit_test::get_file_size_in_byte(temp_file).unwrap() > 4);

    let loaded = Dbm::load(temp_file).unwrap();
    fs::remove_file(temp_file).unwrap();

    for (a, b) in dbm
        .get_param_values()
        .unwrap()
        .iter()
        .zip(&loaded.get_param_values().unwrap())
    {
        assert!(a.bitwise_eq(b));
    }
    assert_eq!(loaded.h_chains(), dbm.h_chains());
}

#[test]
fn test_set_dtype_casts_every_param_and_donor() {
    let mut dbm = make_dbm(&[4, 3, 2], 3);
    assert_eq!(dbm.dtype(), DType::Float32);
    dbm.set_dtype(DType::BFloat16).unwrap();
    assert_eq!(dbm.dtype(), DType::BFloat16);
    for param in &dbm.get_params().unwrap() {
        assert_eq!(param.dtype(), DType::BFloat16);
        assert!(param.get_value().to_vec().iter().all(|x| x.to_bits() & 0xFFFF == 0));
    }
    assert_eq!(dbm.rbms()[0].bias_hid().dtype(), DType::BFloat16);

    // 数据类型随状态一起持久化
    let restored = Dbm::from_state(dbm.get_state().unwrap()).unwrap();
    assert_eq!(restored.dtype(), DType::BFloat16);
    dbm.sample_negative_phase().unwrap();
}
