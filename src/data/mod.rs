//! 数据集接口
//!
//! 模型核心只通过`Dataset`向数据集索要一批独立样本：二维张量，第0维为样本，第1维为特征，
//! 且不含NaN/Inf。数据集的加载、视图转换（如图像的4维拓扑视图）均由数据集自己负责。

use crate::errors::{ConfigurationError, DbmError, DbmResult};
use crate::tensor::Tensor;

#[cfg(test)]
mod tests;

pub trait Dataset {
    /// 取`batch_size`个样本组成的设计矩阵，形状为`[batch_size, 特征数]`
    fn get_batch_design(&mut self, batch_size: usize) -> DbmResult<Tensor>;

    /// 每个样本的特征数
    fn num_features(&self) -> usize;
}

/// 完全驻留内存的稠密设计矩阵，按顺序循环取批
#[derive(Debug, Clone)]
pub struct DenseDesignMatrix {
    x: Tensor,
    cursor: usize,
}

impl DenseDesignMatrix {
    pub fn new(x: Tensor) -> DbmResult<Self> {
        if x.dimension() != 2 || x.shape()[0] == 0 {
            return Err(ConfigurationError::InvalidDesignMatrix {
                shape: x.shape().to_vec(),
            }
            .into());
        }
        if x.has_non_finite() {
            return Err(DbmError::NumericInvariant {
                what: "设计矩阵".to_string(),
                detail: format!("形状{:?}", x.shape()),
            });
        }
        Ok(Self { x, cursor: 0 })
    }

    pub fn num_examples(&self) -> usize {
        self.x.shape()[0]
    }
}

impl Dataset for DenseDesignMatrix {
    fn get_batch_design(&mut self, batch_size: usize) -> DbmResult<Tensor> {
        let n = self.num_examples();
        let d = self.num_features();
        let rows = self.x.data_as_slice();
        let mut data = Vec::with_capacity(batch_size * d);
        for _ in 0..batch_size {
            let start = self.cursor * d;
            data.extend_from_slice(&rows[start..start + d]);
            self.cursor = (self.cursor + 1) % n;
        }
        Ok(Tensor::new(&data, &[batch_size, d]))
    }

    fn num_features(&self) -> usize {
        self.x.shape()[1]
    }
}
