/*
 * @Author       : 老董
 * @Description  : 参数存储（ParameterStore）
 *
 * `Param` 是 `Rc<RefCell<ParamInner>>` 的薄封装：
 * - Clone 语义：多个 `Param` 引用同一块存储，任何一方`set_value`另一方都可见；
 * - DBM 从组件 RBM 装配参数时正是借此“按引用复用”张量，因而修改 DBM 的参数也会改变
 *   提供参数的 RBM（反之亦然）；需要隔离时请用`detach()`得到一份独立拷贝；
 * - 身份由创建时分配的`ParamId`决定，与名称、取值无关。
 */

use crate::errors::{ConfigurationError, DbmError};
use crate::tensor::Tensor;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

mod dtype;
pub use dtype::{Castable, DType, HasDtype};

#[cfg(test)]
mod tests;

static NEXT_PARAM_ID: AtomicU64 = AtomicU64::new(1);

/// 参数的唯一标识（进程内唯一）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParamId(u64);

impl ParamId {
    fn next() -> Self {
        Self(NEXT_PARAM_ID.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Debug)]
struct ParamInner {
    id: ParamId,
    name: Option<String>,
    value: Tensor,
    dtype: DType,
}

/// 共享、可变、具名的参数张量句柄
#[derive(Clone)]
pub struct Param {
    inner: Rc<RefCell<ParamInner>>,
}

impl Param {
    pub fn new(name: &str, value: Tensor) -> Self {
        Self::build(Some(name.to_string()), value)
    }

    /// 创建一个尚未命名的参数。未命名参数不能进入`ParameterSet`
    pub fn unnamed(value: Tensor) -> Self {
        Self::build(None, value)
    }

    fn build(name: Option<String>, value: Tensor) -> Self {
        Self {
            inner: Rc::new(RefCell::new(ParamInner {
                id: ParamId::next(),
                name,
                value,
                dtype: DType::Float32,
            })),
        }
    }

    pub fn id(&self) -> ParamId {
        self.inner.borrow().id
    }

    pub fn name(&self) -> Option<String> {
        self.inner.borrow().name.clone()
    }

    pub fn set_name(&self, name: &str) {
        self.inner.borrow_mut().name = Some(name.to_string());
    }

    /// 显示用名称，未命名时为`<unnamed>`
    pub fn display_name(&self) -> String {
        self.name().unwrap_or_else(|| "<unnamed>".to_string())
    }

    /// 取得当前值的拷贝
    pub fn get_value(&self) -> Tensor {
        self.inner.borrow().value.clone()
    }

    /// 借用当前值做只读计算，避免拷贝
    pub fn with_value<R>(&self, f: impl FnOnce(&Tensor) -> R) -> R {
        f(&self.inner.borrow().value)
    }

    /// 写入新值，形状必须与原值一致；写入时按当前数据类型舍入
    pub fn set_value(&self, value: Tensor) -> Result<(), ConfigurationError> {
        let mut inner = self.inner.borrow_mut();
        if !inner.value.is_same_shape(&value) {
            return Err(ConfigurationError::ParamShapeMismatch {
                name: inner.name.clone().unwrap_or_else(|| "<unnamed>".to_string()),
                expected: inner.value.shape().to_vec(),
                got: value.shape().to_vec(),
            });
        }
        inner.value = inner.dtype.cast(&value);
        Ok(())
    }

    pub fn shape(&self) -> Vec<usize> {
        self.inner.borrow().value.shape().to_vec()
    }

    /// 深拷贝出一个新身份的参数：名称、值、数据类型相同，但此后互不影响
    pub fn detach(&self) -> Self {
        Self::from_record(self.to_record())
    }

    /// 是否与`other`指向同一块存储
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Param {
    /// 导出为可序列化的记录（不含身份）
    pub fn to_record(&self) -> ParamRecord {
        let inner = self.inner.borrow();
        ParamRecord {
            name: inner.name.clone(),
            value: inner.value.clone(),
            dtype: inner.dtype,
        }
    }

    /// 从记录重建参数，得到一个新的身份
    pub fn from_record(record: ParamRecord) -> Self {
        let param = Self::build(record.name, record.value);
        param.inner.borrow_mut().dtype = record.dtype;
        param
    }
}

/// `Param`的持久化形式
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamRecord {
    pub name: Option<String>,
    pub value: Tensor,
    pub dtype: DType,
}

impl HasDtype for Param {
    fn dtype(&self) -> DType {
        self.inner.borrow().dtype
    }
}

impl Castable for Param {
    fn set_dtype(&mut self, dtype: DType) -> Result<(), DbmError> {
        let mut inner = self.inner.borrow_mut();
        inner.value = dtype.cast(&inner.value);
        inner.dtype = dtype;
        Ok(())
    }
}

impl fmt::Debug for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Param")
            .field("id", &inner.id)
            .field("name", &inner.name)
            .field("shape", &inner.value.shape())
            .field("dtype", &inner.dtype)
            .finish()
    }
}

/// 去重后的参数集合。
/// 按身份去重：即使同一个张量被两个层同时引用，也只出现一次；
/// 每个参数必须有非空且唯一的名称（监控通道的键由名称生成）
#[derive(Debug, Clone, Default)]
pub struct ParameterSet {
    params: Vec<Param>,
}

impl ParameterSet {
    pub fn from_params<I: IntoIterator<Item = Param>>(
        params: I,
    ) -> Result<Self, ConfigurationError> {
        let mut seen_ids = HashSet::new();
        let mut seen_names = HashSet::new();
        let mut unique = Vec::new();
        for (index, param) in params.into_iter().enumerate() {
            if !seen_ids.insert(param.id()) {
                continue;
            }
            let name = match param.name() {
                Some(name) if !name.is_empty() => name,
                _ => return Err(ConfigurationError::MissingParamName { index }),
            };
            if !seen_names.insert(name.clone()) {
                return Err(ConfigurationError::DuplicateParamName(name));
            }
            unique.push(param);
        }
        Ok(Self { params: unique })
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Param> {
        self.params.iter()
    }

    pub fn contains(&self, param: &Param) -> bool {
        self.params.iter().any(|p| p.ptr_eq(param))
    }

    pub fn get_by_name(&self, name: &str) -> Option<&Param> {
        self.params
            .iter()
            .find(|p| p.name().as_deref() == Some(name))
    }

    pub fn names(&self) -> Vec<String> {
        self.params.iter().map(Param::display_name).collect()
    }
}

impl<'a> IntoIterator for &'a ParameterSet {
    type Item = &'a Param;
    type IntoIter = std::slice::Iter<'a, Param>;

    fn into_iter(self) -> Self::IntoIter {
        self.params.iter()
    }
}

/// 以参数身份为键的张量映射，用作梯度字典和更新字典
#[derive(Debug, Clone, Default)]
pub struct ParamMap {
    entries: BTreeMap<ParamId, Tensor>,
}

/// 参数 -> 梯度
pub type Gradients = ParamMap;
/// 参数 -> 即将写入的新值
pub type Updates = ParamMap;

impl ParamMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, param: &Param, value: Tensor) -> Option<Tensor> {
        self.entries.insert(param.id(), value)
    }

    pub fn get(&self, param: &Param) -> Option<&Tensor> {
        self.entries.get(&param.id())
    }

    pub fn contains(&self, param: &Param) -> bool {
        self.entries.contains_key(&param.id())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ParamId, &Tensor)> {
        self.entries.iter()
    }
}
