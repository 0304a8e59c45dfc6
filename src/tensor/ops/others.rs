use crate::tensor::Tensor;
use ndarray::Axis;

impl From<f32> for Tensor {
    /// 实现 From<f32> trait 用于将`f32`类型转换为形状为`[]`的标量张量
    fn from(scalar: f32) -> Self {
        Self::scalar(scalar)
    }
}

impl Tensor {
    /// 对张量中的所有元素求和并返回一个形状为[]的标量。
    pub fn sum(&self) -> Self {
        Self::scalar(self.data.sum())
    }

    /// 对张量中的所有元素求均值并返回一个形状为[]的标量。空张量的均值记为0。
    pub fn mean(&self) -> Self {
        Self::scalar(self.data.mean().unwrap_or(0.0))
    }

    /// 沿指定维度求和，结果张量的阶数减1
    pub fn sum_axis(&self, axis: usize) -> Self {
        assert!(axis < self.dimension(), "维度超出范围");
        Self {
            data: self.data.sum_axis(Axis(axis)),
        }
    }

    /// 沿指定维度求均值，结果张量的阶数减1。
    /// 如形状为`[batch, n]`的批数据沿第0维求均值得到形状为`[n]`的向量
    pub fn mean_axis(&self, axis: usize) -> Self {
        assert!(axis < self.dimension(), "维度超出范围");
        assert!(self.shape()[axis] > 0, "不能对长度为0的维度求均值");
        Self {
            data: self.data.mean_axis(Axis(axis)).unwrap(),
        }
    }

    /// 所有元素中的最小值
    pub fn min(&self) -> f32 {
        self.data.iter().copied().fold(f32::INFINITY, f32::min)
    }

    /// 所有元素中的最大值
    pub fn max(&self) -> f32 {
        self.data.iter().copied().fold(f32::NEG_INFINITY, f32::max)
    }

    /// 矩阵每一列的L2范数，返回形状为`[列数]`的向量。
    /// 对权重矩阵`[nvis, nhid]`而言即每个隐单元对应权重向量的范数
    pub fn column_norms(&self) -> Self {
        assert!(self.dimension() == 2, "输入的张量维度必须为2");
        Self {
            data: self.data.mapv(|x| x * x).sum_axis(Axis(0)).mapv(f32::sqrt),
        }
    }

    /// 对每个元素应用`f`，返回新张量
    pub fn map<F: Fn(f32) -> f32>(&self, f: F) -> Self {
        Self {
            data: self.data.mapv(f),
        }
    }

    /// 对两个张量(或其中一个是标量或纯数)进行逐元素相乘，然后对结果求和，并返回一个形状为[]的标量。
    /// 这里只需保证两个张量的形状严格一致，或其中一个张量为标量即可运算
    pub fn dot_sum<T: Into<Self>>(&self, other: T) -> Self {
        let other = other.into();
        if !self.is_same_shape(&other) && !self.is_scalar() && !other.is_scalar() {
            panic!(
                "形状不一致且两个张量没有一个是标量，故无法进行点积和：第一个张量的形状为{:?}，第二个张量的形状为{:?}",
                self.shape(),
                other.shape()
            );
        }

        let product_tensor = self * &other;
        product_tensor.sum()
    }
}
