/*
 * @Author       : 老董
 * @Description  : 深度玻尔兹曼机（DBM）。
 *                 由若干 RBM 堆叠而成，自己只维护负相马尔可夫链、随机数流和编译产物。
 *                 目前只作为更大模型的组件使用：不能独立训练，也没有迭代推断
 */

use crate::config::DbmConfig;
use crate::data::Dataset;
use crate::errors::{DbmError, DbmResult};
use crate::models::model::{Lifecycle, Model, ModelState, MonitoringChannels};
use crate::models::rbm::Rbm;
use crate::param::{Castable, DType, HasDtype, Param, ParameterSet, Updates};
use crate::tensor::Tensor;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{info, warn};

mod energy;
mod inference;
mod persist;
mod sampler;
mod stack;

pub use energy::{EnergyTerm, EnergyTermKind};
pub use inference::{InferenceProcedure, MeanFieldEstimate};
pub use sampler::{COMPILED_FIELDS, ChainLayer, SamplingUpdates, Source, SweepPlan, SweepStep};
pub use stack::StackParams;

#[cfg(test)]
mod tests;

/// 注意：DBM 与提供参数的 RBM 共享张量，对任何一方参数的修改另一方都可见；
/// 需要隔离时调用`detach_from_donors`
#[derive(Debug)]
pub struct Dbm {
    config: DbmConfig,
    rbms: Vec<Rbm>,
    stack: StackParams,
    inference_procedure: InferenceProcedure,
    autonomous: bool,
    v_chains: Tensor,
    h_chains: Vec<Tensor>,
    rng: ChaCha8Rng,
    lifecycle: Lifecycle,
    sweep_plan: Option<SweepPlan>,
}

impl Dbm {
    /// `rbms`的第一个是可见层RBM；`inference_procedure`为`None`时使用默认（非自主）推断
    pub fn new(
        rbms: Vec<Rbm>,
        config: DbmConfig,
        inference_procedure: Option<InferenceProcedure>,
    ) -> DbmResult<Self> {
        config.validate()?;
        let inference_procedure = inference_procedure.unwrap_or_default();
        if inference_procedure.autonomous() {
            return Err(DbmError::unsupported("No such thing as an autonomous DBM yet"));
        }
        let stack = StackParams::assemble(&rbms)?;
        let rng = ChaCha8Rng::seed_from_u64(config.seed);

        let mut dbm = Self {
            config,
            rbms,
            stack,
            inference_procedure,
            autonomous: false,
            v_chains: Tensor::zeros(&[0, 0]),
            h_chains: Vec::new(),
            rng,
            lifecycle: Lifecycle::new(),
            sweep_plan: None,
        };
        dbm.reset_rng();
        dbm.redo_everything()?;
        info!(
            layers = ?dbm.stack.layer_widths(),
            negative_chains = dbm.config.negative_chains,
            "已构造 DBM"
        );
        Ok(dbm)
    }

    /// 把随机数流重置到配置的种子
    pub fn reset_rng(&mut self) {
        self.rng = ChaCha8Rng::seed_from_u64(self.config.seed);
    }

    /// 重建所有负相链（自主模式下还会重新编译），不改变权重和偏置
    pub fn redo_everything(&mut self) -> DbmResult<()> {
        if self.autonomous {
            self.redo_compiled()?;
        }
        self.v_chains = self.make_chains(&self.stack.bias_vis().clone());
        let bias_hid = self.stack.bias_hid().to_vec();
        self.h_chains = bias_hid.iter().map(|b| self.make_chains(b)).collect();
        info!(
            negative_chains = self.config.negative_chains,
            "已重建负相链"
        );
        Ok(())
    }

    /// 某一层全部负相链的初始状态，形状为`[negative_chains, 层宽]`。
    /// 每个单元只按自身偏置独立初始化：`u < sigmoid(b)`时为1，不做预烧
    pub fn make_chains(&mut self, bias: &Param) -> Tensor {
        let thresh = bias.with_value(|b| b.sigmoid().repeat_rows(self.config.negative_chains));
        thresh.bernoulli_seeded(&mut self.rng)
    }

    pub const fn config(&self) -> &DbmConfig {
        &self.config
    }

    pub fn rbms(&self) -> &[Rbm] {
        &self.rbms
    }

    pub const fn stack(&self) -> &StackParams {
        &self.stack
    }

    pub const fn inference_procedure(&self) -> &InferenceProcedure {
        &self.inference_procedure
    }

    pub const fn autonomous(&self) -> bool {
        self.autonomous
    }

    pub const fn negative_chains(&self) -> usize {
        self.config.negative_chains
    }

    pub const fn v_chains(&self) -> &Tensor {
        &self.v_chains
    }

    pub fn h_chains(&self) -> &[Tensor] {
        &self.h_chains
    }

    pub fn get_weights_format(&self) -> [&'static str; 2] {
        self.rbms[0].get_weights_format()
    }

    /// 以日志形式输出各参数的min/mean/max以及权重列范数的统计
    pub fn print_status(&self) {
        let stats = |t: &Tensor| (t.min(), t.mean().number().unwrap_or(f32::NAN), t.max());
        info!(bias_vis = ?self.stack.bias_vis().with_value(stats), "DBM 状态");
        for (i, (w, b)) in self
            .stack
            .weights()
            .iter()
            .zip(self.stack.bias_hid())
            .enumerate()
        {
            info!(
                layer = i,
                weights = ?w.with_value(stats),
                norms = ?w.with_value(|w| stats(&w.column_norms())),
                bias_hid = ?b.with_value(stats),
                "DBM 状态"
            );
        }
    }

    /// 参数与负相链中都不得出现NaN/Inf
    pub fn check_numerics(&self) -> DbmResult<()> {
        for param in self.stack.all_params() {
            if param.with_value(Tensor::has_non_finite) {
                return Err(DbmError::NumericInvariant {
                    what: format!("参数`{}`", param.display_name()),
                    detail: format!("形状{:?}", param.shape()),
                });
            }
        }
        let chains = std::iter::once(&self.v_chains).chain(&self.h_chains);
        for (i, chain) in chains.enumerate() {
            if chain.has_non_finite() {
                return Err(DbmError::NumericInvariant {
                    what: format!("第{i}层负相链"),
                    detail: format!("形状{:?}", chain.shape()),
                });
            }
        }
        Ok(())
    }

    /// 构造学习函数。DBM 目前不需要独立学习
    pub fn make_learn_func(&self, _v: &Tensor) -> DbmResult<()> {
        Err(DbmError::unsupported(
            "DBM 不能独立学习，只能作为更大模型的组件使用",
        ))
    }

    pub fn learn(&mut self, dataset: &mut dyn Dataset, batch_size: usize) -> DbmResult<()> {
        let x = dataset.get_batch_design(batch_size)?;
        self.learn_mini_batch(&x)
    }

    pub fn learn_mini_batch(&mut self, x: &Tensor) -> DbmResult<()> {
        self.make_learn_func(x)
    }

    /// 从模型中抽取一批样本（尚未实现）
    pub fn random_design_matrix(&mut self, _batch_size: usize) -> DbmResult<Tensor> {
        Err(DbmError::unsupported("DBM 尚不能生成随机设计矩阵"))
    }

    /// 把参数换成互相独立的深拷贝，此后与提供参数的 RBM 不再互相影响
    pub fn detach_from_donors(&mut self) -> DbmResult<()> {
        let rbms = self.rbms.iter().map(Rbm::detach).collect();
        self.replace_rbms(rbms)
    }

    fn replace_rbms(&mut self, rbms: Vec<Rbm>) -> DbmResult<()> {
        self.stack = StackParams::assemble(&rbms)?;
        self.rbms = rbms;
        Ok(())
    }
}

impl Model for Dbm {
    fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    fn lifecycle_mut(&mut self) -> &mut Lifecycle {
        &mut self.lifecycle
    }

    fn get_params(&self) -> DbmResult<ParameterSet> {
        let bias_vis = self.stack.bias_vis();
        if bias_vis.name().is_none_or(|name| name.is_empty()) {
            warn!("可见层偏置没有名称，已命名为`stack_bias_vis`");
            bias_vis.set_name("stack_bias_vis");
        }
        Ok(ParameterSet::from_params(self.stack.all_params())?)
    }

    fn censor_updates(&self, updates: &mut Updates) {
        for rbm in &self.rbms {
            rbm.censor_updates(updates);
        }
    }

    fn get_monitoring_channels(&mut self, _v: &Tensor) -> DbmResult<MonitoringChannels> {
        self.in_compile_mode(|dbm| {
            let mut rval = MonitoringChannels::new();
            if dbm.config.monitor_params {
                for param in &dbm.get_params()? {
                    let name = param.display_name();
                    param.with_value(|value| {
                        rval.insert(format!("{name}_min"), value.min());
                        rval.insert(
                            format!("{name}_mean"),
                            value.mean().number().unwrap_or(f32::NAN),
                        );
                        rval.insert(format!("{name}_max"), value.max());
                    });
                    if dbm.stack.is_weight(param) {
                        let norms = param.with_value(Tensor::column_norms);
                        rval.insert(format!("{name}_norms_min"), norms.min());
                        rval.insert(
                            format!("{name}_norms_mean"),
                            norms.mean().number().unwrap_or(f32::NAN),
                        );
                        rval.insert(format!("{name}_norms_max"), norms.max());
                    }
                }
            }
            Ok(dbm.lifecycle.prefix_channels(rval))
        })
    }

    fn redo_compiled(&mut self) -> DbmResult<()> {
        self.compile_sweep_plan().map(|_| ())
    }

    fn snapshot_fields(&self) -> DbmResult<ModelState> {
        self.snapshot()
    }

    fn restore_fields(&mut self, state: ModelState) -> DbmResult<()> {
        self.restore(state)
    }

    fn get_input_dim(&self) -> DbmResult<usize> {
        Ok(self.rbms[0].nvis())
    }
}

impl HasDtype for Dbm {
    fn dtype(&self) -> DType {
        self.stack.bias_vis().dtype()
    }
}

impl Castable for Dbm {
    /// 依次转换每个 RBM（也就转换了共享的全部参数）和负相链，然后核对每个参数的类型
    fn set_dtype(&mut self, dtype: DType) -> Result<(), DbmError> {
        for (i, rbm) in self.rbms.iter_mut().enumerate() {
            if let Err(e) = rbm.set_dtype(dtype) {
                warn!(rbm = i, error = %e, "RBM 数据类型转换失败");
                return Err(e);
            }
        }
        self.v_chains = dtype.cast(&self.v_chains);
        self.h_chains = self.h_chains.iter().map(|h| dtype.cast(h)).collect();
        for param in self.stack.all_params() {
            assert_eq!(
                param.dtype(),
                dtype,
                "参数`{}`的数据类型未能转换",
                param.display_name()
            );
        }
        Ok(())
    }
}
