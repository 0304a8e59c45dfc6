/*
 * @Author       : 老董
 * @Description  : 期望能量及其关于参数的梯度（负相）。
 *
 * 期望能量 E = −( mean(V)·b_vis + Σ W⁰∘(VᵀH⁰/m)
 *               + Σᵢ [ mean(Hⁱ)·bⁱ + Σ Wⁱ⁺¹∘(HⁱᵀHⁱ⁺¹/m) ]
 *               + mean(H_top)·b_top )
 * 它对每个参数都是线性的，所以拆成若干“参数 ∘ 充分统计量”的项：
 * 能量是各项点积和的相反数，梯度就是对应统计量的相反数。
 * 统计量只由状态张量算出，状态在这里天然是常量，梯度不会流向采样过程
 */

use super::Dbm;
use crate::errors::{ConfigurationError, DbmError, DbmResult};
use crate::models::model::Model;
use crate::param::{Gradients, Param};
use crate::tensor::Tensor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnergyTermKind {
    /// 偏置 · 批平均激活
    Bias,
    /// 相邻两层间的权重 ∘ 批平均共激活
    Pairwise,
}

/// 能量中的一项：`−sum(param ∘ statistic)`
#[derive(Debug, Clone)]
pub struct EnergyTerm {
    pub kind: EnergyTermKind,
    pub param: Param,
    pub statistic: Tensor,
}

impl EnergyTerm {
    fn contribution(&self) -> Tensor {
        self.param.with_value(|p| p.dot_sum(self.statistic.clone()))
    }
}

impl Dbm {
    /// 把`(V, H)`下的期望能量拆成偏置项和成对项
    pub fn energy_terms(&self, v_hat: &Tensor, h_hat: &[Tensor]) -> DbmResult<Vec<EnergyTerm>> {
        let widths = self.stack.layer_widths();
        if h_hat.len() != widths.len() - 1 {
            return Err(ConfigurationError::HiddenLayerCountMismatch {
                expected: widths.len() - 1,
                got: h_hat.len(),
            }
            .into());
        }
        if v_hat.dimension() != 2 || v_hat.shape()[0] == 0 {
            return Err(ConfigurationError::InvalidDesignMatrix {
                shape: v_hat.shape().to_vec(),
            }
            .into());
        }
        let m = v_hat.shape()[0];
        let states: Vec<&Tensor> = std::iter::once(v_hat).chain(h_hat).collect();
        for (i, (state, &width)) in states.iter().zip(&widths).enumerate() {
            if state.shape() != [m, width] {
                return Err(ConfigurationError::ParamShapeMismatch {
                    name: if i == 0 {
                        "V_hat".to_string()
                    } else {
                        format!("H_hat[{}]", i - 1)
                    },
                    expected: vec![m, width],
                    got: state.shape().to_vec(),
                }
                .into());
            }
        }

        let biases = std::iter::once(self.stack.bias_vis()).chain(self.stack.bias_hid());
        let mut terms: Vec<EnergyTerm> = states
            .iter()
            .zip(biases)
            .map(|(state, bias)| EnergyTerm {
                kind: EnergyTermKind::Bias,
                param: bias.clone(),
                statistic: state.mean_axis(0),
            })
            .collect();
        for (pair, weight) in states.windows(2).zip(self.stack.weights()) {
            terms.push(EnergyTerm {
                kind: EnergyTermKind::Pairwise,
                param: weight.clone(),
                statistic: pair[0].transpose().mat_mul(pair[1]) * (1.0 / m as f32),
            });
        }
        Ok(terms)
    }

    /// `(V, H)`所定义的均场分布下的期望能量；也可以是一批二值观测上能量的平均。
    /// 结果总是形状为`[]`的标量
    pub fn expected_energy(&self, v_hat: &Tensor, h_hat: &[Tensor]) -> DbmResult<Tensor> {
        let total = self
            .energy_terms(v_hat, h_hat)?
            .iter()
            .fold(Tensor::scalar(0.0), |total, term| total + term.contribution());
        assert!(
            total.dimension() == 0,
            "期望能量必须完全归约为标量，实际形状为{:?}",
            total.shape()
        );
        Ok(total * -1.0)
    }

    /// 负相梯度：以当前负相链为状态计算期望能量，对每个参数求导。
    /// 返回的映射对`get_params()`中的每个参数都有一项
    pub fn get_neg_phase_grads(&self) -> DbmResult<Gradients> {
        let terms = self.energy_terms(&self.v_chains, &self.h_chains)?;
        let mut rval = Gradients::new();
        for param in &self.get_params()? {
            rval.insert(param, Tensor::zeros(&param.shape()));
        }
        for term in terms {
            let grad = term.statistic * -1.0;
            let accumulated = match rval.get(&term.param) {
                Some(previous) => previous + &grad,
                None => {
                    return Err(DbmError::NumericInvariant {
                        what: "负相梯度".to_string(),
                        detail: format!("参数`{}`不在参数集合中", term.param.display_name()),
                    });
                }
            };
            rval.insert(&term.param, accumulated);
        }
        Ok(rval)
    }
}
