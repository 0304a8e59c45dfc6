use super::{make_dbm, set_chains};
use crate::assert_err;
use crate::config::DbmConfig;
use crate::errors::{ConfigurationError, DbmError};
use crate::models::dbm::{Dbm, EnergyTermKind};
use crate::models::model::Model;
use crate::models::rbm::Rbm;
use crate::param::Param;
use crate::tensor::Tensor;
use approx::assert_abs_diff_eq;

/// 层宽[2, 2, 1]且参数取整洁数值的DBM
fn hand_built_dbm() -> Dbm {
    let rbm0 = Rbm::from_params(
        Param::new("bias_vis", Tensor::new(&[1., 2.], &[2])),
        Param::new("bias_hid", Tensor::new(&[9., 9.], &[2])),
        Param::new("W", Tensor::new(&[1., 0., 0., 1.], &[2, 2])),
    )
    .unwrap();
    let rbm1 = Rbm::from_params(
        Param::new("bias_vis", Tensor::new(&[0.5, -0.5], &[2])),
        Param::new("bias_hid", Tensor::new(&[3.], &[1])),
        Param::new("W", Tensor::new(&[1., 2.], &[2, 1])),
    )
    .unwrap();
    Dbm::new(vec![rbm0, rbm1], DbmConfig::new(2), None).unwrap()
}

fn hand_states() -> (Tensor, Vec<Tensor>) {
    (
        Tensor::new(&[1., 0., 1., 1.], &[2, 2]),
        vec![
            Tensor::new(&[1., 1., 0., 1.], &[2, 2]),
            Tensor::new(&[1., 0.], &[2, 1]),
        ],
    )
}

#[test]
fn test_expected_energy_by_hand() {
    let dbm = hand_built_dbm();
    let (v, h) = hand_states();
    let energy = dbm.expected_energy(&v, &h).unwrap();
    assert_eq!(energy.dimension(), 0);
    // 偏置项 2 - 0.25 + 1.5，成对项 1 + 1.5，未使用的第0个RBM的隐偏置不参与
    assert_abs_diff_eq!(energy, Tensor::scalar(-5.75), epsilon = 1e-6);
}

#[test]
fn test_energy_terms_decomposition() {
    let dbm = hand_built_dbm();
    let (v, h) = hand_states();
    let terms = dbm.energy_terms(&v, &h).unwrap();
    let kinds: Vec<_> = terms.iter().map(|t| t.kind).collect();
    assert_eq!(
        kinds,
        vec![
            EnergyTermKind::Bias,
            EnergyTermKind::Bias,
            EnergyTermKind::Bias,
            EnergyTermKind::Pairwise,
            EnergyTermKind::Pairwise,
        ]
    );
    // 每个成对项都只除以一次批大小
    assert_abs_diff_eq!(
        terms[4].statistic,
        Tensor::new(&[0.5, 0.5], &[2, 1]),
        epsilon = 1e-6
    );
}

#[test]
fn test_expected_energy_is_scalar_for_any_batch() {
    let dbm = make_dbm(&[4, 3, 2], 2);
    for batch in [1, 3, 8] {
        let v = Tensor::new(&vec![0.25; batch * 4], &[batch, 4]);
        let h = vec![
            Tensor::new(&vec![0.5; batch * 3], &[batch, 3]),
            Tensor::new(&vec![0.75; batch * 2], &[batch, 2]),
        ];
        let energy = dbm.expected_energy(&v, &h).unwrap();
        assert_eq!(energy.shape(), &[] as &[usize]);
        assert!(energy.number().unwrap().is_finite());
    }
}

#[test]
fn test_expected_energy_rejects_wrong_layer_count() {
    let dbm = make_dbm(&[4, 3, 2], 2);
    let v = Tensor::zeros(&[2, 4]);
    assert_err!(
        dbm.expected_energy(&v, &[Tensor::zeros(&[2, 3])]),
        DbmError::Configuration(ConfigurationError::HiddenLayerCountMismatch {
            expected: 2,
            got: 1
        })
    );
    assert_err!(
        dbm.expected_energy(&v, &[Tensor::zeros(&[2, 3]), Tensor::zeros(&[2, 5])]),
        DbmError::Configuration(ConfigurationError::ParamShapeMismatch { name, .. }) if name == "H_hat[1]"
    );
}

#[test]
fn test_neg_phase_grads_by_hand() {
    let mut dbm = hand_built_dbm();
    let (v, h) = hand_states();
    set_chains(&mut dbm, v, h);
    let grads = dbm.get_neg_phase_grads().unwrap();
    let stack = dbm.stack();

    assert_eq!(grads.len(), dbm.get_params().unwrap().len());
    assert_abs_diff_eq!(
        grads.get(stack.bias_vis()).unwrap().clone(),
        Tensor::new(&[-1., -0.5], &[2])
    );
    assert_abs_diff_eq!(
        grads.get(&stack.weights()[0]).unwrap().clone(),
        Tensor::new(&[-0.5, -1., 0., -0.5], &[2, 2])
    );
    assert_abs_diff_eq!(
        grads.get(&stack.bias_hid()[0]).unwrap().clone(),
        Tensor::new(&[-0.5, -1.], &[2])
    );
    assert_abs_diff_eq!(
        grads.get(&stack.weights()[1]).unwrap().clone(),
        Tensor::new(&[-0.5, -0.5], &[2, 1])
    );
    assert_abs_diff_eq!(
        grads.get(&stack.bias_hid()[1]).unwrap().clone(),
        Tensor::new(&[-0.5], &[1])
    );
}

#[test]
fn test_neg_phase_grads_match_finite_differences() {
    let mut dbm = make_dbm(&[4, 3, 2], 6);
    dbm.sample_negative_phase().unwrap();
    let grads = dbm.get_neg_phase_grads().unwrap();
    let v = dbm.v_chains().clone();
    let h = dbm.h_chains().to_vec();
    let eps = 0.5;

    for param in &dbm.get_params().unwrap() {
        let original = param.get_value();
        let analytic = grads.get(param).unwrap().to_vec();
        for k in 0..original.size() {
            let mut bumped = original.to_vec();
            bumped[k] += eps;
            param.set_value(Tensor::new(&bumped, original.shape())).unwrap();
            let e_plus = dbm.expected_energy(&v, &h).unwrap().number().unwrap();
            bumped[k] -= 2. * eps;
            param.set_value(Tensor::new(&bumped, original.shape())).unwrap();
            let e_minus = dbm.expected_energy(&v, &h).unwrap().number().unwrap();
            param.set_value(original.clone()).unwrap();

            let numeric = (e_plus - e_minus) / (2. * eps);
            assert_abs_diff_eq!(analytic[k], numeric, epsilon = 1e-4);
        }
    }
}

#[test]
fn test_neg_phase_grads_treat_chains_as_constants() {
    let mut dbm = make_dbm(&[3, 2], 4);
    let before = dbm.get_neg_phase_grads().unwrap();
    // 梯度只依赖链状态，改变参数不改变梯度
    dbm.stack().weights()[0]
        .set_value(Tensor::ones(&[3, 2]))
        .unwrap();
    let after = dbm.get_neg_phase_grads().unwrap();
    let w = &dbm.stack().weights()[0];
    assert_eq!(before.get(w), after.get(w));
    assert_eq!(dbm.v_chains().shape(), &[4, 3]);
    dbm.sample_negative_phase().unwrap();
}
