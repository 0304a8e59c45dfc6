//! # Only DBM
//!
//! `only_dbm`用纯rust实现深度玻尔兹曼机（DBM）的核心：
//! 把若干受限玻尔兹曼机（RBM）的参数按引用堆叠成一个多层模型，维护持久化的负相马尔可夫链，
//! 提供均场推断的基本运算、期望能量/熵/截断KL散度等监控量，以及负相梯度。
//!
//! 目前 DBM 只作为更大模型的组件使用，不能独立训练。
//!

pub mod config;
pub mod data;
pub mod errors;
pub mod models;
pub mod param;
pub mod tensor;
pub mod utils;
