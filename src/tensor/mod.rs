/*
 * @Author       : 老董
 * @Date         : 2023-08-17 17:24:24
 * @Description  : 张量模块。DBM 的所有参数、负相马尔可夫链状态以及均场估计都用本结构体承载；
 *                 底层为`ndarray`的动态维度数组，数据类型固定为`f32`
 */

use ndarray::{Array, IxDyn};
use rand::Rng;
use rand::distributions::{Distribution, Uniform};
use serde::{Deserialize, Serialize};

mod activation;
mod ops;
mod print;
mod property;
mod shape;


/// 定义张量的结构体。其可以是标量、向量、矩阵或更高维度的数组。
/// 注：只要通Tensor初始化的都是张量（即使标量也是张量）；
/// 而通常意义上的数字（类型为usize、i32、f64等）就只是纯数（number），在这里不被认为是张量。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tensor {
    data: Array<f32, IxDyn>,
}

impl Tensor {
    /// 创建一个张量，若为标量，`shape`可以是[]、[1]、[1,1]、[1,1,1]...
    /// 若为向量，`shape`可以是[n]、[1,n]、[n,1]；
    /// 若为矩阵，`shape`可以是[n,m]；
    /// 注：`data`的长度必须和`shape`中所有元素的乘积相等，否则会panic。
    pub fn new(data: &[f32], shape: &[usize]) -> Self {
        let expected_len: usize = shape.iter().product();
        assert!(
            data.len() == expected_len,
            "数据长度{}与形状{:?}不匹配",
            data.len(),
            shape
        );
        let data = Array::from_shape_vec(IxDyn(shape), data.to_vec()).unwrap();
        Self { data }
    }

    /// 创建一个形状为`[]`（0阶）的标量张量
    pub fn scalar(value: f32) -> Self {
        Self {
            data: Array::from_elem(IxDyn(&[]), value),
        }
    }

    /// 创建一个全零张量
    pub fn zeros(shape: &[usize]) -> Self {
        Self {
            data: Array::zeros(IxDyn(shape)),
        }
    }

    /// 创建一个全1张量
    pub fn ones(shape: &[usize]) -> Self {
        Self {
            data: Array::ones(IxDyn(shape)),
        }
    }

    /// 创建一个随机张量，其值在[min, max]的闭区间。随机数流由调用方提供（用于确定性初始化）
    pub fn new_random_seeded<R: Rng + ?Sized>(
        min: f32,
        max: f32,
        shape: &[usize],
        rng: &mut R,
    ) -> Self {
        let uniform = Uniform::from(min..=max);
        let data = (0..shape.iter().product::<usize>())
            .map(|_| uniform.sample(rng))
            .collect::<Vec<_>>();
        Self::new(&data, shape)
    }

    /// 将一个向量（形状`[n]`）沿新的第0维复制`rows`次，得到形状`[rows, n]`的矩阵
    pub fn repeat_rows(&self, rows: usize) -> Self {
        assert!(self.dimension() == 1, "只有向量才能按行复制");
        let n = self.shape()[0];
        let broadcast = self
            .data
            .broadcast(IxDyn(&[rows, n]))
            .expect("向量广播为矩阵失败");
        Self {
            data: broadcast.to_owned(),
        }
    }
}

// 私有方法
impl Tensor {
    fn generate_index_array(&self, shape: &[usize]) -> Vec<usize> {
        shape.iter().map(|_| 0).collect()
    }
}
