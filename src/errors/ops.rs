use std::fmt::{self, Display};

/// 张量的二元运算符
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Add,
    Sub,
    Mul,
}
impl Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let operation_name = match self {
            Operator::Add => "相加",
            Operator::Sub => "相减",
            Operator::Mul => "相乘",
        };
        write!(f, "{}", operation_name)
    }
}

/// 比较运算符
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOperator {
    GreaterOrEqual,
}
impl Display for ComparisonOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let operator_name = match self {
            ComparisonOperator::GreaterOrEqual => "≥",
        };
        write!(f, "{}", operator_name)
    }
}
