/*
 * @Author       : 老董
 * @Description  : 负相采样器。每次学习步对整个层栈做一次自底向上的吉布斯扫描：
 *                 1. 可见层：只由第0隐层的旧状态单侧决定；
 *                 2. 除最顶层外的每个隐层：下方用本轮刚采到的新样本，上方用上一轮的旧状态；
 *                 3. 最顶层：只由其下方层本轮的新样本单侧决定。
 *                 各层并非同时更新，这是一种“新下旧上”的非对称吉布斯扫描。
 *
 *                 扫描计划`SweepPlan`即本模型的“编译产物”：首次采样时惰性生成，
 *                 注册在序列化排除表中，不随模型持久化
 */

use super::Dbm;
use crate::errors::{ConfigurationError, DbmResult};
use crate::models::model::Model;
use crate::tensor::Tensor;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// 编译时产生的字段名，必须全部注册到序列化排除表
pub const COMPILED_FIELDS: [&str; 1] = ["sweep_plan"];

/// 马尔可夫链中的一层
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ChainLayer {
    Visible,
    Hidden(usize),
}

/// 一次扫描得到的新样本：层 -> 新状态。由调用方负责写回链状态
pub type SamplingUpdates = BTreeMap<ChainLayer, Tensor>;

/// 条件分布的输入来源：`fresh`为真时取本轮扫描已采到的新样本，否则取链的旧状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub layer: ChainLayer,
    pub fresh: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SweepStep {
    /// 只有一侧相邻层。`transpose`为真时使用`weight`号权重的转置（自上而下）
    OneSided {
        target: ChainLayer,
        source: Source,
        weight: usize,
        transpose: bool,
    },
    /// 中间隐层：下方经`w_below`自下而上，上方经`w_above`的转置自上而下
    TwoSided {
        target: usize,
        below: Source,
        above: Source,
        w_below: usize,
        w_above: usize,
    },
}

impl SweepStep {
    pub const fn target(&self) -> ChainLayer {
        match self {
            Self::OneSided { target, .. } => *target,
            Self::TwoSided { target, .. } => ChainLayer::Hidden(*target),
        }
    }
}

/// 一次完整扫描的步骤序列
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepPlan {
    steps: Vec<SweepStep>,
}

impl SweepPlan {
    pub fn build(n_hidden: usize) -> Self {
        assert!(n_hidden >= 1, "至少需要1个隐层");
        let stale = |layer| Source { layer, fresh: false };
        let fresh = |layer| Source { layer, fresh: true };

        let mut steps = vec![SweepStep::OneSided {
            target: ChainLayer::Visible,
            source: stale(ChainLayer::Hidden(0)),
            weight: 0,
            transpose: true,
        }];

        for i in 0..n_hidden - 1 {
            let below = if i == 0 {
                ChainLayer::Visible
            } else {
                ChainLayer::Hidden(i - 1)
            };
            steps.push(SweepStep::TwoSided {
                target: i,
                below: fresh(below),
                above: stale(ChainLayer::Hidden(i + 1)),
                w_below: i,
                w_above: i + 1,
            });
        }

        let top = n_hidden - 1;
        let below_top = if top == 0 {
            ChainLayer::Visible
        } else {
            ChainLayer::Hidden(top - 1)
        };
        steps.push(SweepStep::OneSided {
            target: ChainLayer::Hidden(top),
            source: fresh(below_top),
            weight: top,
            transpose: false,
        });

        Self { steps }
    }

    pub fn steps(&self) -> &[SweepStep] {
        &self.steps
    }
}

impl Dbm {
    /// 生成扫描计划并把产生的字段注册到序列化排除表
    pub(super) fn compile_sweep_plan(&mut self) -> DbmResult<SweepPlan> {
        self.in_compile_mode(|dbm| {
            let plan = SweepPlan::build(dbm.stack.n_hidden());
            dbm.sweep_plan = Some(plan.clone());
            dbm.register_names_to_del(COMPILED_FIELDS)?;
            debug!(n_hidden = dbm.stack.n_hidden(), "已生成负相扫描计划");
            Ok(plan)
        })
    }

    pub const fn sweep_plan(&self) -> Option<&SweepPlan> {
        self.sweep_plan.as_ref()
    }

    pub const fn is_compiled(&self) -> bool {
        self.sweep_plan.is_some()
    }

    fn ensure_compiled(&mut self) -> DbmResult<SweepPlan> {
        match &self.sweep_plan {
            Some(plan) => Ok(plan.clone()),
            None => self.compile_sweep_plan(),
        }
    }

    /// 链中某层的当前状态
    pub fn chain(&self, layer: ChainLayer) -> &Tensor {
        match layer {
            ChainLayer::Visible => &self.v_chains,
            ChainLayer::Hidden(i) => &self.h_chains[i],
        }
    }

    fn resolve<'a>(&'a self, fresh: &'a SamplingUpdates, source: Source) -> &'a Tensor {
        match fresh.get(&source.layer) {
            Some(sample) if source.fresh => sample,
            _ => self.chain(source.layer),
        }
    }

    /// 按扫描计划对整个层栈采一次新样本，不修改链状态
    pub fn get_sampling_updates(&mut self) -> DbmResult<SamplingUpdates> {
        let plan = self.ensure_compiled()?;
        let ip = &self.inference_procedure;
        let weights = self.stack.weights();
        let mut rval = SamplingUpdates::new();

        for step in plan.steps() {
            let b = self.stack.bias_of(step.target()).get_value();
            let prob = match *step {
                SweepStep::OneSided {
                    source,
                    weight,
                    transpose,
                    ..
                } => {
                    let w = weights[weight].get_value();
                    let w = if transpose { w.transpose() } else { w };
                    ip.infer_h_hat_one_sided(self.resolve(&rval, source), &w, &b)
                }
                SweepStep::TwoSided {
                    below,
                    above,
                    w_below,
                    w_above,
                    ..
                } => ip.infer_h_hat_two_sided(
                    self.resolve(&rval, below),
                    &weights[w_below].get_value(),
                    self.resolve(&rval, above),
                    &weights[w_above].get_value(),
                    &b,
                ),
            };
            let sample = prob.bernoulli_seeded(&mut self.rng);
            rval.insert(step.target(), sample);
        }

        Ok(rval)
    }

    /// 把新样本写回链状态。形状必须与原状态一致，否则整批都不写入
    pub fn commit_sampling_updates(&mut self, updates: SamplingUpdates) -> DbmResult<()> {
        for (layer, sample) in &updates {
            if let ChainLayer::Hidden(i) = *layer {
                if i >= self.h_chains.len() {
                    return Err(ConfigurationError::HiddenLayerCountMismatch {
                        expected: self.h_chains.len(),
                        got: i + 1,
                    }
                    .into());
                }
            }
            let current = self.chain(*layer);
            if !current.is_same_shape(sample) {
                return Err(ConfigurationError::ParamShapeMismatch {
                    name: format!("{layer:?}"),
                    expected: current.shape().to_vec(),
                    got: sample.shape().to_vec(),
                }
                .into());
            }
        }
        for (layer, sample) in updates {
            match layer {
                ChainLayer::Visible => self.v_chains = sample,
                ChainLayer::Hidden(i) => self.h_chains[i] = sample,
            }
        }
        Ok(())
    }

    /// 一个学习步的负相：检查数值、采样、写回
    pub fn sample_negative_phase(&mut self) -> DbmResult<()> {
        self.check_numerics()?;
        let updates = self.get_sampling_updates()?;
        self.commit_sampling_updates(updates)?;
        debug!(
            negative_chains = self.config.negative_chains,
            v_active = self.v_chains.sum().number().unwrap_or(0.0),
            "完成一次负相扫描"
        );
        Ok(())
    }
}
