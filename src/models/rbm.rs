/*
 * @Author       : 老董
 * @Description  : 二值-二值受限玻尔兹曼机（RBM）。
 *                 在本crate中它主要作为 DBM 的组件模型：DBM 按引用复用它的偏置和权重。
 *                 权重矩阵的形状为`[nvis, nhid]`
 */

use crate::config::RbmConfig;
use crate::errors::{ConfigurationError, DbmError, DbmResult};
use crate::models::model::{Lifecycle, Model, ModelState};
use crate::param::{Castable, DType, Param, ParamRecord, ParameterSet};
use crate::tensor::Tensor;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// 权重矩阵各维度的含义：第0维对应可见单元（v），第1维对应隐单元（h）
pub const RBM_WEIGHTS_FORMAT: [&str; 2] = ["v", "h"];

/// 注意：`Clone`得到的是共享同一组参数的句柄，而非深拷贝；深拷贝请用`detach`
#[derive(Debug, Clone)]
pub struct Rbm {
    bias_vis: Param,
    bias_hid: Param,
    weights: Param,
    lifecycle: Lifecycle,
}

/// `Rbm`的持久化形式
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RbmRecord {
    pub bias_vis: ParamRecord,
    pub bias_hid: ParamRecord,
    pub weights: ParamRecord,
}

impl Rbm {
    /// 权重在`[-irange, irange]`内均匀初始化；可见偏置为0，隐偏置为`init_bias_hid`
    pub fn new(config: &RbmConfig) -> Result<Self, ConfigurationError> {
        config.validate()?;
        let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
        let weights = Tensor::new_random_seeded(
            -config.irange,
            config.irange,
            &[config.nvis, config.nhid],
            &mut rng,
        );
        Self::from_params(
            Param::new("bias_vis", Tensor::zeros(&[config.nvis])),
            Param::new(
                "bias_hid",
                Tensor::zeros(&[config.nhid]) + config.init_bias_hid,
            ),
            Param::new("W", weights),
        )
    }

    /// 用已有参数组装，检查三者形状相容
    pub fn from_params(
        bias_vis: Param,
        bias_hid: Param,
        weights: Param,
    ) -> Result<Self, ConfigurationError> {
        let bv = bias_vis.shape();
        let bh = bias_hid.shape();
        let w = weights.shape();
        if bv.len() != 1 || bh.len() != 1 {
            return Err(ConfigurationError::ParamShapeMismatch {
                name: bias_vis.display_name(),
                expected: vec![w.first().copied().unwrap_or(0)],
                got: bv,
            });
        }
        let expected = vec![bv[0], bh[0]];
        if w != expected {
            return Err(ConfigurationError::ParamShapeMismatch {
                name: weights.display_name(),
                expected,
                got: w,
            });
        }
        Ok(Self {
            bias_vis,
            bias_hid,
            weights,
            lifecycle: Lifecycle::new(),
        })
    }

    pub fn nvis(&self) -> usize {
        self.bias_vis.shape()[0]
    }

    pub fn nhid(&self) -> usize {
        self.bias_hid.shape()[0]
    }

    pub const fn bias_vis(&self) -> &Param {
        &self.bias_vis
    }

    pub const fn bias_hid(&self) -> &Param {
        &self.bias_hid
    }

    pub const fn weights(&self) -> &Param {
        &self.weights
    }

    pub const fn get_weights_format(&self) -> [&'static str; 2] {
        RBM_WEIGHTS_FORMAT
    }

    /// P(h=1 | v) = sigmoid(v·W + c)
    pub fn mean_h_given_v(&self, v: &Tensor) -> Tensor {
        let presigmoid = self.weights.with_value(|w| v.mat_mul(w));
        self.bias_hid.with_value(|c| (presigmoid + c).sigmoid())
    }

    /// P(v=1 | h) = sigmoid(h·Wᵀ + b)
    pub fn mean_v_given_h(&self, h: &Tensor) -> Tensor {
        let presigmoid = self.weights.with_value(|w| h.mat_mul(&w.transpose()));
        self.bias_vis.with_value(|b| (presigmoid + b).sigmoid())
    }

    pub fn to_record(&self) -> RbmRecord {
        RbmRecord {
            bias_vis: self.bias_vis.to_record(),
            bias_hid: self.bias_hid.to_record(),
            weights: self.weights.to_record(),
        }
    }

    pub fn from_record(record: RbmRecord) -> Result<Self, ConfigurationError> {
        Self::from_params(
            Param::from_record(record.bias_vis),
            Param::from_record(record.bias_hid),
            Param::from_record(record.weights),
        )
    }

    /// 深拷贝出一个与本RBM互不影响的RBM
    pub fn detach(&self) -> Self {
        Self {
            bias_vis: self.bias_vis.detach(),
            bias_hid: self.bias_hid.detach(),
            weights: self.weights.detach(),
            lifecycle: self.lifecycle.clone(),
        }
    }
}

impl Model for Rbm {
    fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    fn lifecycle_mut(&mut self) -> &mut Lifecycle {
        &mut self.lifecycle
    }

    fn get_params(&self) -> DbmResult<ParameterSet> {
        Ok(ParameterSet::from_params([
            self.bias_vis.clone(),
            self.bias_hid.clone(),
            self.weights.clone(),
        ])?)
    }

    /// F(v) = -v·b - Σⱼ softplus(cⱼ + (v·W)ⱼ)，返回形状为`[batch]`的向量
    fn free_energy(&self, v: &Tensor) -> DbmResult<Tensor> {
        let presigmoid = self.weights.with_value(|w| v.mat_mul(w));
        let hidden_term = self
            .bias_hid
            .with_value(|c| (presigmoid + c).softplus())
            .sum_axis(1);
        let visible_term = self
            .bias_vis
            .with_value(|b| v.mat_mul(&b.reshape(&[self.nvis(), 1])))
            .reshape(&[v.shape()[0]]);
        Ok((visible_term + hidden_term) * -1.0)
    }

    /// -∂F/∂v = b + sigmoid(v·W + c)·Wᵀ，形状同`v`
    fn score(&self, v: &Tensor) -> DbmResult<Tensor> {
        let mean_h = self.mean_h_given_v(v);
        let top_down = self.weights.with_value(|w| mean_h.mat_mul(&w.transpose()));
        Ok(self.bias_vis.with_value(|b| top_down + b))
    }

    fn get_input_dim(&self) -> DbmResult<usize> {
        Ok(self.nvis())
    }

    fn snapshot_fields(&self) -> DbmResult<ModelState> {
        let mut state = ModelState::new();
        state.insert("rbm", &self.to_record())?;
        state.insert("lifecycle", &self.lifecycle)?;
        Ok(state)
    }

    fn restore_fields(&mut self, mut state: ModelState) -> DbmResult<()> {
        if let Some(record) = state.take::<RbmRecord>("rbm")? {
            let restored = Self::from_record(record)?;
            self.bias_vis = restored.bias_vis;
            self.bias_hid = restored.bias_hid;
            self.weights = restored.weights;
        }
        if let Some(lifecycle) = state.take("lifecycle")? {
            self.lifecycle = lifecycle;
        }
        Ok(())
    }
}

impl Castable for Rbm {
    fn set_dtype(&mut self, dtype: DType) -> Result<(), DbmError> {
        self.bias_vis.set_dtype(dtype)?;
        self.bias_hid.set_dtype(dtype)?;
        self.weights.set_dtype(dtype)
    }
}
