/*
 * @Author       : 老董
 * @Description  : 数据类型标记与类型转换能力接口。
 *                 存储始终是f32；转换为bf16时把每个元素舍入到bf16可表示的最近值（就近取偶），
 *                 之后所有写入该参数的值也按同样规则舍入
 */

use crate::errors::DbmError;
use crate::tensor::Tensor;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DType {
    #[default]
    Float32,
    BFloat16,
}

impl DType {
    pub fn cast(self, tensor: &Tensor) -> Tensor {
        match self {
            Self::Float32 => tensor.clone(),
            Self::BFloat16 => tensor.map(round_to_bf16),
        }
    }
}

/// 能报告自身数据类型的对象
pub trait HasDtype {
    fn dtype(&self) -> DType;
}

/// 能把自身持有的所有张量转换到指定数据类型的对象。
/// 每个持有参数的类型都显式实现它，而不是在运行时探测字段
pub trait Castable {
    fn set_dtype(&mut self, dtype: DType) -> Result<(), DbmError>;
}

/// f32 -> bf16 -> f32：低16位尾数就近取偶后清零，NaN 保持为 NaN
fn round_to_bf16(x: f32) -> f32 {
    if x.is_nan() {
        return x;
    }
    let bits = x.to_bits();
    let rounded = bits.wrapping_add(0x7FFF + ((bits >> 16) & 1));
    f32::from_bits(rounded & 0xFFFF_0000)
}
