/*
 * @Author       : 老董
 * @Date         : 2023-08-17 17:24:24
 * @Description  : 张量的乘法，实现了张量与纯数的数乘以及两个张量“逐元素”相乘（哈达玛积）的运算，并返回一个新的张量。
 *                 注意：这里的乘法概念与线性代数中的矩阵乘法不同，矩阵乘法请用`mat_mul`。
 *                 两个操作数均为张量时支持 NumPy 风格的广播。
 */

use crate::errors::{Operator, TensorError};
use crate::tensor::Tensor;
use std::ops::Mul;

impl Mul<f32> for Tensor {
    type Output = Self;

    fn mul(self, scalar: f32) -> Self {
        Self {
            data: &self.data * scalar,
        }
    }
}

impl Mul<f32> for &Tensor {
    type Output = Tensor;

    fn mul(self, scalar: f32) -> Tensor {
        Tensor {
            data: &self.data * scalar,
        }
    }
}

impl Mul<Tensor> for f32 {
    type Output = Tensor;

    fn mul(self, tensor: Tensor) -> Tensor {
        Tensor {
            data: &tensor.data * self,
        }
    }
}

impl Mul for Tensor {
    type Output = Self;

    fn mul(self, other: Self) -> Self {
        mul_within_tensors(&self, &other)
    }
}

impl<'a> Mul<&'a Self> for Tensor {
    type Output = Self;

    fn mul(self, other: &'a Self) -> Self {
        mul_within_tensors(&self, other)
    }
}

impl<'b> Mul<&'b Tensor> for &Tensor {
    type Output = Tensor;

    fn mul(self, other: &'b Tensor) -> Tensor {
        mul_within_tensors(self, other)
    }
}

fn mul_within_tensors(tensor_1: &Tensor, tensor_2: &Tensor) -> Tensor {
    assert!(
        tensor_1.can_broadcast_with(tensor_2),
        "{}",
        TensorError::OperatorError {
            operator: Operator::Mul,
            tensor1_shape: tensor_1.shape().to_vec(),
            tensor2_shape: tensor_2.shape().to_vec(),
        }
    );
    Tensor {
        data: &tensor_1.data * &tensor_2.data,
    }
}
