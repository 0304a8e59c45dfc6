/*
 * @Author       : 老董
 * @Description  : 通用模型接口与生命周期管理
 *
 * # 持久化约定
 * - `snapshot_fields()` 给出模型全部字段的快照（每个字段各自用 bincode 编码）；
 * - `get_state()` = 快照 − 已注册的“序列化时排除”的字段名（编译产物必须注册在此）；
 * - `set_state()` 把持久化的字段合并回实例，编译产物不恢复，而是在首次使用时惰性重建。
 *
 * # 批大小模式
 * `compile_mode()`/`deploy_mode()` 成对包裹监控通道的计算；`in_compile_mode()` 保证
 * 无论被包裹的计算返回错误还是 panic，`deploy_mode()` 都恰好执行一次。
 */

use crate::data::Dataset;
use crate::errors::{ConfigurationError, DbmError, DbmResult};
use crate::param::{ParameterSet, Updates};
use crate::tensor::Tensor;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;

/// 监控通道：通道名 -> 数值
pub type MonitoringChannels = BTreeMap<String, f32>;

/// 与具体模型无关的生命周期状态：序列化排除表 + 监控通道前缀
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lifecycle {
    names_to_del: BTreeSet<String>,
    monitoring_channel_prefix: String,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册序列化时需要排除的字段名（并集语义，重复注册无副作用）。
    /// 先校验全部名称再写入：只要有一个无效，注册表就保持原样
    pub fn register_names_to_del<I, S>(&mut self, names: I) -> DbmResult<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let names: Vec<String> = names.into_iter().map(|n| n.as_ref().to_string()).collect();
        if let Some(invalid) = names.iter().find(|n| !is_valid_field_name(n)) {
            return Err(DbmError::SerializationName(invalid.clone()));
        }
        self.names_to_del.extend(names);
        Ok(())
    }

    pub const fn names_to_del(&self) -> &BTreeSet<String> {
        &self.names_to_del
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.names_to_del.contains(name)
    }

    pub fn set_monitoring_channel_prefix(&mut self, prefix: &str) {
        self.monitoring_channel_prefix = prefix.to_string();
    }

    pub fn monitoring_channel_prefix(&self) -> &str {
        &self.monitoring_channel_prefix
    }

    /// 读取时统一加上前缀；存储的通道名本身不含前缀
    pub fn prefix_channels(&self, channels: MonitoringChannels) -> MonitoringChannels {
        channels
            .into_iter()
            .map(|(name, value)| (format!("{}{}", self.monitoring_channel_prefix, name), value))
            .collect()
    }
}

/// 字段名：非空，以字母或下划线开头，其余为字母、数字或`_[].`，
/// 如`stack_weight[0]`、`learn_func.cache`
fn is_valid_field_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '[' | ']' | '.'))
        }
        _ => false,
    }
}

/// 模型的持久化状态：字段名 -> 该字段的 bincode 编码
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelState {
    fields: BTreeMap<String, Vec<u8>>,
}

impl ModelState {
    /// 状态文件魔数
    const STATE_MAGIC: &'static [u8; 4] = b"DBMS";
    /// 状态文件版本
    const STATE_VERSION: u32 = 1;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<T: Serialize + ?Sized>(&mut self, name: &str, value: &T) -> DbmResult<()> {
        self.fields
            .insert(name.to_string(), bincode::serialize(value)?);
        Ok(())
    }

    /// 取出并解码一个字段；字段不存在时返回`Ok(None)`
    pub fn take<T: DeserializeOwned>(&mut self, name: &str) -> DbmResult<Option<T>> {
        match self.fields.remove(name) {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes).map_err(|e| {
                DbmError::Persistence(format!("字段`{name}`解码失败: {e}"))
            })?)),
            None => Ok(None),
        }
    }

    /// 同`take`，但字段必须存在
    pub fn require<T: DeserializeOwned>(&mut self, name: &str) -> DbmResult<T> {
        self.take(name)?
            .ok_or_else(|| DbmError::Persistence(format!("状态中缺少字段`{name}`")))
    }

    pub fn remove(&mut self, name: &str) -> bool {
        self.fields.remove(name).is_some()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields.keys().map(String::as_str).collect()
    }

    /// 写入本地文件：魔数 + 版本 + bincode 编码的字段表
    pub fn save<P: AsRef<Path>>(&self, path: P) -> DbmResult<()> {
        let file = File::create(path.as_ref())?;
        let mut writer = BufWriter::new(file);
        writer.write_all(Self::STATE_MAGIC)?;
        writer.write_all(&Self::STATE_VERSION.to_le_bytes())?;
        bincode::serialize_into(&mut writer, &self.fields)?;
        writer.flush()?;
        Ok(())
    }

    /// 从本地文件加载
    pub fn load<P: AsRef<Path>>(path: P) -> DbmResult<Self> {
        let file = File::open(path.as_ref())?;
        let mut reader = BufReader::new(file);

        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if &magic != Self::STATE_MAGIC {
            return Err(DbmError::Persistence(
                "无效的状态文件：这不是由`ModelState::save()`保存的文件".to_string(),
            ));
        }

        let mut version_bytes = [0u8; 4];
        reader.read_exact(&mut version_bytes)?;
        let version = u32::from_le_bytes(version_bytes);
        if version != Self::STATE_VERSION {
            return Err(DbmError::Persistence(format!(
                "不支持的状态文件版本: {version}"
            )));
        }

        let fields = bincode::deserialize_from(&mut reader)?;
        Ok(Self { fields })
    }
}

/// 模型 trait
///
/// 除`lifecycle`/`get_params`/`snapshot_fields`/`restore_fields`外都有默认实现；
/// 不具备的能力（如自主训练、自由能）默认返回`DbmError::Unsupported`
pub trait Model {
    fn lifecycle(&self) -> &Lifecycle;

    fn lifecycle_mut(&mut self) -> &mut Lifecycle;

    /// 定义模型的全部参数（即使是不参与学习的参数也应包含在内）
    fn get_params(&self) -> DbmResult<ParameterSet>;

    /// 参数当前值的拷贝，顺序同`get_params`
    fn get_param_values(&self) -> DbmResult<Vec<Tensor>> {
        Ok(self.get_params()?.iter().map(|p| p.get_value()).collect())
    }

    /// 按`get_params`的顺序写入参数值
    fn set_param_values(&mut self, values: &[Tensor]) -> DbmResult<()> {
        let params = self.get_params()?;
        if params.len() != values.len() {
            return Err(ConfigurationError::ParamValueCountMismatch {
                expected: params.len(),
                got: values.len(),
            }
            .into());
        }
        for (param, value) in params.iter().zip(values) {
            param.set_value(value.clone())?;
        }
        Ok(())
    }

    /// 检查（并按需修正）作用在本模型参数上的更新，供通用训练算法调用
    fn censor_updates(&self, _updates: &mut Updates) {}

    /// 在数据`v`（第0维为样本，第1维为特征）上计算的监控量
    fn get_monitoring_channels(&mut self, _v: &Tensor) -> DbmResult<MonitoringChannels> {
        Ok(MonitoringChannels::new())
    }

    fn set_monitoring_channel_prefix(&mut self, prefix: &str) {
        self.lifecycle_mut().set_monitoring_channel_prefix(prefix);
    }

    /// 若有共享变量的尺寸依赖批大小，将其切换为构图/调试用的尺寸
    fn compile_mode(&mut self) {}

    /// 若有共享变量的尺寸依赖批大小，将其切换回运行时尺寸
    fn deploy_mode(&mut self) {}

    /// 在`compile_mode`中执行`f`，之后无论成功、出错还是 panic 都执行一次`deploy_mode`
    fn in_compile_mode<R, F>(&mut self, f: F) -> DbmResult<R>
    where
        Self: Sized,
        F: FnOnce(&mut Self) -> DbmResult<R>,
    {
        self.compile_mode();
        let result = panic::catch_unwind(AssertUnwindSafe(|| f(&mut *self)));
        self.deploy_mode();
        match result {
            Ok(result) => result,
            Err(payload) => panic::resume_unwind(payload),
        }
    }

    /// 重建所有编译产物；产生的字段名必须注册到排除表
    fn redo_compiled(&mut self) -> DbmResult<()> {
        Ok(())
    }

    fn register_names_to_del<I, S>(&mut self, names: I) -> DbmResult<()>
    where
        Self: Sized,
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.lifecycle_mut().register_names_to_del(names)
    }

    /// 全部字段的快照（含编译产物）
    fn snapshot_fields(&self) -> DbmResult<ModelState>;

    /// 把`state`中出现的字段合并回本实例
    fn restore_fields(&mut self, state: ModelState) -> DbmResult<()>;

    /// 持久化用的状态：快照中去掉所有已注册排除的字段
    fn get_state(&self) -> DbmResult<ModelState> {
        let mut state = self.snapshot_fields()?;
        for name in self.lifecycle().names_to_del() {
            state.remove(name);
        }
        Ok(state)
    }

    fn set_state(&mut self, state: ModelState) -> DbmResult<()> {
        self.restore_fields(state)
    }

    /// 训练一个 epoch，返回是否需要继续训练
    fn train(&mut self, _dataset: &mut dyn Dataset) -> DbmResult<bool> {
        Err(DbmError::unsupported("本模型不能独立训练"))
    }

    /// 每个样本的自由能，返回形状为`[batch]`的向量
    fn free_energy(&self, _v: &Tensor) -> DbmResult<Tensor> {
        Err(DbmError::unsupported("本模型没有可处理的自由能"))
    }

    /// 得分函数：对数概率关于`v`的梯度
    fn score(&self, _v: &Tensor) -> DbmResult<Tensor> {
        Err(DbmError::unsupported("本模型没有可处理的得分函数"))
    }

    fn get_input_dim(&self) -> DbmResult<usize> {
        Err(DbmError::unsupported("本模型未提供输入维度"))
    }
}
