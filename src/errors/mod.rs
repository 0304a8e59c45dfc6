/*
 * @Author       : 老董
 * @Description  : 错误类型。
 *                 - `TensorError`：张量层面的编程错误，只用于panic信息（同原来的张量模块）；
 *                 - `DbmError`：模型层面所有可恢复接口统一返回的错误，按成因分为
 *                   配置错误、尚不支持的操作、数值不变量被破坏、序列化字段名无效、持久化失败五类。
 *                 本crate中任何地方都不做重试。
 */

use thiserror::Error;
mod ops;
pub use self::ops::*;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum TensorError {
    // 张量二元运算
    #[error(
        "形状不一致，故无法{operator}：第一个张量的形状为{tensor1_shape:?}，第二个张量的形状为{tensor2_shape:?}"
    )]
    OperatorError {
        operator: Operator,
        tensor1_shape: Vec<usize>,
        tensor2_shape: Vec<usize>,
    },
}

/// 装配或配置阶段的错误：在构造时抛出，内部从不恢复，原样传给调用方
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigurationError {
    #[error("待堆叠的组件模型列表为空，至少需要1个RBM")]
    EmptyStack,
    #[error(
        "相邻层宽度不一致：第{lower}个RBM的隐单元数为{lower_nhid}，而第{upper}个RBM的可见单元数为{upper_nvis}"
    )]
    LayerWidthMismatch {
        lower: usize,
        upper: usize,
        lower_nhid: usize,
        upper_nvis: usize,
    },
    #[error("第{index}个参数没有名称")]
    MissingParamName { index: usize },
    #[error("参数名称`{0}`重复")]
    DuplicateParamName(String),
    #[error("参数`{name}`的形状应为{expected:?}，实际为{got:?}")]
    ParamShapeMismatch {
        name: String,
        expected: Vec<usize>,
        got: Vec<usize>,
    },
    #[error("隐层估计的数量应为{expected}，实际为{got}")]
    HiddenLayerCountMismatch { expected: usize, got: usize },
    #[error("参数值的数量应为{expected}，实际为{got}")]
    ParamValueCountMismatch { expected: usize, got: usize },
    #[error("{value_name}须{operator}{threshold}")]
    ValueMustSatisfyComparison {
        value_name: String,
        operator: ComparisonOperator,
        threshold: f32,
    },
    #[error("设计矩阵必须是非空的2阶张量，实际形状为{shape:?}")]
    InvalidDesignMatrix { shape: Vec<usize> },
    #[error("配置解析失败: {0}")]
    Parse(String),
}

/// 模型层面的统一错误类型
#[derive(Error, Debug)]
pub enum DbmError {
    #[error("配置错误: {0}")]
    Configuration(#[from] ConfigurationError),

    /// 明确声明的能力缺口（如自主训练、迭代均场推断），绝不以空操作代替
    #[error("尚不支持: {0}")]
    Unsupported(String),

    /// 参数或激活值中出现NaN/Inf
    #[error("数值不变量被破坏：{what}中含有NaN或Inf（{detail}）")]
    NumericInvariant { what: String, detail: String },

    /// 向序列化排除表注册了无效的字段名（注册表保持不变）
    #[error("无效的序列化字段名: {0:?}")]
    SerializationName(String),

    #[error("持久化失败: {0}")]
    Persistence(String),
}

impl DbmError {
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::Unsupported(message.into())
    }

    pub const fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported(_))
    }
}

impl From<std::io::Error> for DbmError {
    fn from(e: std::io::Error) -> Self {
        Self::Persistence(format!("IO 错误: {e}"))
    }
}

impl From<bincode::Error> for DbmError {
    fn from(e: bincode::Error) -> Self {
        Self::Persistence(format!("编解码错误: {e}"))
    }
}

pub type DbmResult<T> = Result<T, DbmError>;
