/*
 * @Author       : 老董
 * @Date         : 2023-08-17 17:24:24
 * @Description  : 张量的减法，实现了两个张量“逐元素”（或张量与纯数）相减的运算，并返回一个新的张量。
 *                 两个操作数均为张量时支持 NumPy 风格的广播（broadcasting）。
 */

use crate::errors::{Operator, TensorError};
use crate::tensor::Tensor;
use std::ops::Sub;

/*↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓（不）带引用的张量 - f32↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓*/
impl Sub<f32> for Tensor {
    type Output = Self;

    fn sub(self, scalar: f32) -> Self {
        Self {
            data: &self.data - scalar,
        }
    }
}
impl Sub<f32> for &Tensor {
    type Output = Tensor;

    fn sub(self, scalar: f32) -> Tensor {
        Tensor {
            data: &self.data - scalar,
        }
    }
}
/*↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑（不）带引用的张量 - f32↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑*/

/*↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓（不）带引用的张量 -（不）带引用的张量↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓*/
impl Sub for Tensor {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        sub_within_tensors(&self, &other)
    }
}

impl<'a> Sub<&'a Self> for Tensor {
    type Output = Self;

    fn sub(self, other: &'a Self) -> Self {
        sub_within_tensors(&self, other)
    }
}

impl Sub<Tensor> for &Tensor {
    type Output = Tensor;

    fn sub(self, other: Tensor) -> Tensor {
        sub_within_tensors(self, &other)
    }
}

impl<'b> Sub<&'b Tensor> for &Tensor {
    type Output = Tensor;

    fn sub(self, other: &'b Tensor) -> Tensor {
        sub_within_tensors(self, other)
    }
}
/*↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑（不）带引用的张量 -（不）带引用的张量↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑*/

/// 两个张量相减，支持 NumPy 风格广播
///
/// # Panics
/// 如果形状不兼容（无法广播）
fn sub_within_tensors(tensor_1: &Tensor, tensor_2: &Tensor) -> Tensor {
    assert!(
        tensor_1.can_broadcast_with(tensor_2),
        "{}",
        TensorError::OperatorError {
            operator: Operator::Sub,
            tensor1_shape: tensor_1.shape().to_vec(),
            tensor2_shape: tensor_2.shape().to_vec(),
        }
    );
    Tensor {
        data: &tensor_1.data - &tensor_2.data,
    }
}
