/*
 * @Author       : 老董
 * @Description  : 把一串 RBM 堆叠成 DBM 的参数。
 *                 第i层权重取自第i个RBM的权重；可见层偏置取自最底层RBM的可见偏置；
 *                 第i个隐层偏置取自第i+1个RBM的可见偏置，只有最顶层RBM额外贡献它的隐偏置。
 *                 这些张量都是按引用复用的，修改任何一方另一方都可见
 */

use super::sampler::ChainLayer;
use crate::errors::ConfigurationError;
use crate::models::rbm::Rbm;
use crate::param::Param;

#[derive(Debug, Clone)]
pub struct StackParams {
    bias_vis: Param,
    weights: Vec<Param>,
    bias_hid: Vec<Param>,
}

impl StackParams {
    pub fn assemble(rbms: &[Rbm]) -> Result<Self, ConfigurationError> {
        let (bottom, top) = match (rbms.first(), rbms.last()) {
            (Some(bottom), Some(top)) => (bottom, top),
            _ => return Err(ConfigurationError::EmptyStack),
        };

        for (lower, pair) in rbms.windows(2).enumerate() {
            if pair[0].nhid() != pair[1].nvis() {
                return Err(ConfigurationError::LayerWidthMismatch {
                    lower,
                    upper: lower + 1,
                    lower_nhid: pair[0].nhid(),
                    upper_nvis: pair[1].nvis(),
                });
            }
        }

        let weights: Vec<Param> = rbms.iter().map(|rbm| rbm.weights().clone()).collect();
        let mut bias_hid: Vec<Param> = rbms[1..]
            .iter()
            .map(|rbm| rbm.bias_vis().clone())
            .collect();
        bias_hid.push(top.bias_hid().clone());

        for (i, w) in weights.iter().enumerate() {
            w.set_name(&format!("stack_weight[{i}]"));
        }
        for (i, b) in bias_hid.iter().enumerate() {
            b.set_name(&format!("stack_bias[{i}]"));
        }

        Ok(Self {
            bias_vis: bottom.bias_vis().clone(),
            weights,
            bias_hid,
        })
    }

    pub const fn bias_vis(&self) -> &Param {
        &self.bias_vis
    }

    pub fn weights(&self) -> &[Param] {
        &self.weights
    }

    pub fn bias_hid(&self) -> &[Param] {
        &self.bias_hid
    }

    /// 隐层数，恒等于权重矩阵数
    pub fn n_hidden(&self) -> usize {
        self.bias_hid.len()
    }

    /// 各层宽度，从可见层开始
    pub fn layer_widths(&self) -> Vec<usize> {
        std::iter::once(&self.bias_vis)
            .chain(&self.bias_hid)
            .map(|b| b.shape()[0])
            .collect()
    }

    pub fn bias_of(&self, layer: ChainLayer) -> &Param {
        match layer {
            ChainLayer::Visible => &self.bias_vis,
            ChainLayer::Hidden(i) => &self.bias_hid[i],
        }
    }

    pub fn is_weight(&self, param: &Param) -> bool {
        self.weights.iter().any(|w| w.ptr_eq(param))
    }

    /// 可见偏置在前，然后按层交替给出权重和隐偏置
    pub fn all_params(&self) -> Vec<Param> {
        std::iter::once(self.bias_vis.clone())
            .chain(
                self.weights
                    .iter()
                    .zip(&self.bias_hid)
                    .flat_map(|(w, b)| [w.clone(), b.clone()]),
            )
            .collect()
    }
}
