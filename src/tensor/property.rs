/*
 * @Author       : 老董
 * @Date         : 2023-10-21 03:22:26
 * @Description  : 本类仅包含一些属性方法，不包含任何运算方法，所以不会需要用到mut
 */

use super::Tensor;
use std::borrow::Cow;

impl Tensor {
    /// 若为向量，`shape`可以是[n]、[1,n]、[n,1]；
    /// 若为矩阵，`shape`可以是[n,m]；
    /// 若为更高维度的数组，`shape`可以是[c,n,m,...]。
    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    /// 张量的维（dim）数、阶（rank）数
    /// 即`shape()`的元素个数--如：形状为`[]`的标量阶数为0，向量阶数为1，矩阵阶数为2，以此类推
    pub fn dimension(&self) -> usize {
        self.data.ndim()
    }

    /// 计算张量中所有元素的数量
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// 判断两个张量的形状是否严格一致。如：形状为 [1, 4]，[1, 4]和[4]是不一致的，会返回false
    pub fn is_same_shape(&self, other: &Self) -> bool {
        self.shape() == other.shape()
    }

    /// 判断张量是否为标量
    pub fn is_scalar(&self) -> bool {
        self.shape().is_empty() || self.shape().iter().all(|x| *x == 1)
    }

    /// 转化为纯数（number）。若为标量，则返回Some(number)，否则返回None
    pub fn number(&self) -> Option<f32> {
        if self.is_scalar() {
            let index_array = self.generate_index_array(self.shape());
            Some(self.data[&index_array[..]])
        } else {
            None
        }
    }

    /// 以行优先顺序返回底层数据；标准布局时直接借用，否则复制一份
    pub fn data_as_slice(&self) -> Cow<'_, [f32]> {
        match self.data.as_slice() {
            Some(slice) => Cow::Borrowed(slice),
            None => Cow::Owned(self.to_vec()),
        }
    }

    /// 以行优先顺序复制出底层数据
    pub fn to_vec(&self) -> Vec<f32> {
        self.data.iter().copied().collect()
    }

    /// 所有元素是否都只取0或1
    pub fn is_binary(&self) -> bool {
        self.data.iter().all(|&x| x == 0.0 || x == 1.0)
    }

    /// 是否含有NaN或无穷大
    pub fn has_non_finite(&self) -> bool {
        self.data.iter().any(|x| !x.is_finite())
    }

    /// 判断两个张量的数据在位级别上是否完全一致（含形状）
    pub fn bitwise_eq(&self, other: &Self) -> bool {
        self.is_same_shape(other)
            && self
                .data
                .iter()
                .zip(other.data.iter())
                .all(|(a, b)| a.to_bits() == b.to_bits())
    }
}
