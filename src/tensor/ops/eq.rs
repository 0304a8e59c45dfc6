use crate::tensor::Tensor;
use approx::AbsDiffEq;

impl PartialEq for Tensor {
    fn eq(&self, other: &Self) -> bool {
        self.data == other.data
    }
}

impl PartialEq<f32> for Tensor {
    /// 仅当张量为标量且数值相等时为真
    fn eq(&self, other: &f32) -> bool {
        self.number() == Some(*other)
    }
}

// 供测试中的`assert_abs_diff_eq!`使用，形状不一致时直接判为不等
impl AbsDiffEq for Tensor {
    type Epsilon = f32;

    fn default_epsilon() -> f32 {
        f32::EPSILON
    }

    fn abs_diff_eq(&self, other: &Self, epsilon: f32) -> bool {
        self.is_same_shape(other)
            && self
                .data
                .iter()
                .zip(other.data.iter())
                .all(|(a, b)| a.abs_diff_eq(b, epsilon))
    }
}
