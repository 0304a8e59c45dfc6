/*
 * @Author       : 老董
 * @Description  : 模型配置。只负责“读入+校验”，不涉及实验启动器（YAML 等由外部负责）。
 *                 JSON 中缺省的字段取`Default`中的值
 */

use crate::errors::{ComparisonOperator, ConfigurationError};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[cfg(test)]
mod tests;

/// DBM 的配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DbmConfig {
    /// 并行模拟的负相马尔可夫链数量，对所有层相同，构造后不再改变
    pub negative_chains: usize,
    /// 模型唯一随机数流的种子
    pub seed: u64,
    /// 是否在监控通道中输出每个参数的min/mean/max统计
    pub monitor_params: bool,
    /// 每见过多少样本调用一次`print_status`。
    /// 保留给独立训练路径使用：目前`learn_mini_batch`返回`Unsupported`，不会读取它
    pub print_interval: usize,
}

impl Default for DbmConfig {
    fn default() -> Self {
        Self {
            negative_chains: 100,
            seed: 17,
            monitor_params: false,
            print_interval: 10000,
        }
    }
}

impl DbmConfig {
    pub fn new(negative_chains: usize) -> Self {
        Self {
            negative_chains,
            ..Self::default()
        }
    }

    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub const fn with_monitor_params(mut self, monitor_params: bool) -> Self {
        self.monitor_params = monitor_params;
        self
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigurationError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConfigurationError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigurationError> {
        let text = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            ConfigurationError::Parse(format!("无法读取{}: {e}", path.as_ref().display()))
        })?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        at_least_one("negative_chains", self.negative_chains)?;
        at_least_one("print_interval", self.print_interval)
    }
}

/// 单层RBM（组件模型）的配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RbmConfig {
    pub nvis: usize,
    pub nhid: usize,
    /// 权重在`[-irange, irange]`内均匀初始化
    #[serde(default = "default_irange")]
    pub irange: f32,
    /// 隐单元偏置的初始值（可见单元偏置总是初始化为0）
    #[serde(default)]
    pub init_bias_hid: f32,
    #[serde(default = "default_rbm_seed")]
    pub seed: u64,
}

const fn default_irange() -> f32 {
    0.05
}

const fn default_rbm_seed() -> u64 {
    42
}

impl RbmConfig {
    pub const fn new(nvis: usize, nhid: usize) -> Self {
        Self {
            nvis,
            nhid,
            irange: default_irange(),
            init_bias_hid: 0.0,
            seed: default_rbm_seed(),
        }
    }

    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub const fn with_irange(mut self, irange: f32) -> Self {
        self.irange = irange;
        self
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigurationError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConfigurationError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        at_least_one("nvis", self.nvis)?;
        at_least_one("nhid", self.nhid)?;
        if !(self.irange >= 0.0) {
            return Err(ConfigurationError::ValueMustSatisfyComparison {
                value_name: "irange".to_string(),
                operator: ComparisonOperator::GreaterOrEqual,
                threshold: 0.0,
            });
        }
        Ok(())
    }
}

fn at_least_one(value_name: &str, value: usize) -> Result<(), ConfigurationError> {
    if value == 0 {
        return Err(ConfigurationError::ValueMustSatisfyComparison {
            value_name: value_name.to_string(),
            operator: ComparisonOperator::GreaterOrEqual,
            threshold: 1.0,
        });
    }
    Ok(())
}
