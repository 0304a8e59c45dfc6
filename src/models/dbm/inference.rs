/*
 * @Author       : 老董
 * @Description  : 变分（均场）推断的基本运算，以及依赖它们的监控量：熵、截断KL散度。
 *                 单侧/双侧更新给出的都是sigmoid之后的期望值（取值在(0,1)内），而非样本
 */

use super::Dbm;
use crate::errors::{ConfigurationError, DbmError, DbmResult};
use crate::models::model::MonitoringChannels;
use crate::tensor::Tensor;
use serde::{Deserialize, Serialize};

/// 一批输入上各隐层的均场估计，每个元素形状为`[batch, 层宽]`。用完即弃，不持久化
#[derive(Debug, Clone, PartialEq)]
pub struct MeanFieldEstimate {
    pub h_hat: Vec<Tensor>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InferenceProcedure {
    autonomous: bool,
    monitor_kl: bool,
}

impl InferenceProcedure {
    pub fn new(monitor_kl: bool) -> Self {
        Self {
            autonomous: false,
            monitor_kl,
        }
    }

    /// 标记为“自主”（能独立驱动训练）的推断过程。DBM 目前不接受这种推断过程
    pub const fn with_autonomous(mut self, autonomous: bool) -> Self {
        self.autonomous = autonomous;
        self
    }

    pub const fn autonomous(&self) -> bool {
        self.autonomous
    }

    pub const fn monitor_kl(&self) -> bool {
        self.monitor_kl
    }

    /// sigmoid(other·W + b)。`W`的行数须等于`other`的列数
    pub fn infer_h_hat_one_sided(&self, other_h_hat: &Tensor, w: &Tensor, b: &Tensor) -> Tensor {
        (other_h_hat.mat_mul(w) + b).sigmoid()
    }

    /// sigmoid(below·W_below + above·W_aboveᵀ + b)
    pub fn infer_h_hat_two_sided(
        &self,
        h_hat_below: &Tensor,
        w_below: &Tensor,
        h_hat_above: &Tensor,
        w_above: &Tensor,
        b: &Tensor,
    ) -> Tensor {
        let bottom_up = h_hat_below.mat_mul(w_below);
        let top_down = h_hat_above.mat_mul(&w_above.transpose());
        (bottom_up + top_down + b).sigmoid()
    }

    /// 迭代推断的起点：每个隐层都取sigmoid(偏置)，按行复制到整批
    pub fn init_h_hat(&self, model: &Dbm, v: &Tensor) -> MeanFieldEstimate {
        let batch = v.shape()[0];
        MeanFieldEstimate {
            h_hat: model
                .stack()
                .bias_hid()
                .iter()
                .map(|b| b.with_value(|b| b.sigmoid().repeat_rows(batch)))
                .collect(),
        }
    }

    /// 迭代均场推断（尚未实现）
    pub fn infer(&self, _model: &Dbm, _v: &Tensor) -> DbmResult<MeanFieldEstimate> {
        Err(DbmError::unsupported("DBM 的迭代均场推断尚未实现"))
    }

    /// 同`infer`，但返回每次不动点迭代后的估计
    pub fn infer_history(&self, _model: &Dbm, _v: &Tensor) -> DbmResult<Vec<MeanFieldEstimate>> {
        Err(DbmError::unsupported("DBM 的迭代均场推断尚未实现"))
    }

    /// 截断KL散度：期望能量 − 批平均熵，去掉了不可处理的配分函数项。
    /// 只适合作为训练过程中的相对监控量；返回形状为`[]`的标量（整批的平均值）
    pub fn truncated_kl(
        &self,
        model: &Dbm,
        v: &Tensor,
        obs: &MeanFieldEstimate,
    ) -> DbmResult<Tensor> {
        let entropy_term = model.entropy_h(&obs.h_hat)?.mean() * -1.0;
        let energy_term = model.expected_energy(v, &obs.h_hat)?;
        Ok(entropy_term + energy_term)
    }

    /// `monitor_kl`开启时给出每次迭代后的`trunc_KL_<i>`（i从1开始）
    pub fn get_monitoring_channels(
        &self,
        model: &Dbm,
        v: &Tensor,
    ) -> DbmResult<MonitoringChannels> {
        let mut rval = MonitoringChannels::new();
        if self.monitor_kl {
            let history = self.infer_history(model, v)?;
            for (i, obs) in history.iter().enumerate() {
                let kl = self.truncated_kl(model, v, obs)?;
                rval.insert(format!("trunc_KL_{}", i + 1), kl.number().unwrap_or(f32::NAN));
            }
        }
        Ok(rval)
    }
}

impl Dbm {
    /// 各隐层二值熵之和，返回形状为`[batch]`的逐样本向量
    pub fn entropy_h(&self, h_hat: &[Tensor]) -> DbmResult<Tensor> {
        let expected = self.stack.n_hidden();
        if h_hat.len() != expected {
            return Err(ConfigurationError::HiddenLayerCountMismatch {
                expected,
                got: h_hat.len(),
            }
            .into());
        }
        let mut layers = h_hat.iter().map(|h| h.binary_entropy().sum_axis(1));
        let first = layers.next().ok_or(ConfigurationError::EmptyStack)?;
        Ok(layers.fold(first, |total, layer| total + layer))
    }
}
