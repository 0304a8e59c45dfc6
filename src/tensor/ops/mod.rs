pub mod add;
pub mod eq;
pub mod mat_mul;
pub mod mul;
pub mod others;
pub mod sub;

use super::Tensor;

impl Tensor {
    /// 判断两个张量的形状能否按 NumPy 规则广播：
    /// 从右向左对齐维度，每个维度必须相等或其中一个为 1
    pub fn can_broadcast_with(&self, other: &Self) -> bool {
        self.shape()
            .iter()
            .rev()
            .zip(other.shape().iter().rev())
            .all(|(&a, &b)| a == b || a == 1 || b == 1)
    }
}
