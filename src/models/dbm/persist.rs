/*
 * @Author       : 老董
 * @Description  : DBM 的持久化。
 *                 每个字段单独用 bincode 编码，参数值可以逐位还原；
 *                 扫描计划属于编译产物，恢复时一律丢弃，首次采样时再重建
 */

use super::{Dbm, InferenceProcedure, StackParams};
use crate::config::DbmConfig;
use crate::errors::{ConfigurationError, DbmResult};
use crate::models::model::{Lifecycle, Model, ModelState};
use crate::models::rbm::{Rbm, RbmRecord};
use crate::tensor::Tensor;
use rand_chacha::ChaCha8Rng;
use tracing::info;

impl Dbm {
    pub(super) fn snapshot(&self) -> DbmResult<ModelState> {
        let mut state = ModelState::new();
        state.insert("config", &self.config)?;
        state.insert("autonomous", &self.autonomous)?;
        state.insert("inference_procedure", &self.inference_procedure)?;
        let records: Vec<RbmRecord> = self.rbms.iter().map(Rbm::to_record).collect();
        state.insert("rbms", &records)?;
        state.insert("v_chains", &self.v_chains)?;
        state.insert("h_chains", &self.h_chains)?;
        state.insert("rng", &self.rng)?;
        state.insert("lifecycle", &self.lifecycle)?;
        if let Some(plan) = &self.sweep_plan {
            state.insert("sweep_plan", plan)?;
        }
        Ok(state)
    }

    /// 先解码并核对全部字段，全部通过后才写回；出错时本实例保持原样
    pub(super) fn restore(&mut self, mut state: ModelState) -> DbmResult<()> {
        let config = state.take::<DbmConfig>("config")?;
        if let Some(config) = &config {
            config.validate()?;
        }
        let autonomous = state.take::<bool>("autonomous")?;
        let inference_procedure = state.take::<InferenceProcedure>("inference_procedure")?;
        let rbms = state
            .take::<Vec<RbmRecord>>("rbms")?
            .map(|records| {
                records
                    .into_iter()
                    .map(Rbm::from_record)
                    .collect::<Result<Vec<_>, _>>()
            })
            .transpose()?;
        let stack = rbms.as_deref().map(StackParams::assemble).transpose()?;
        let v_chains = state.take::<Tensor>("v_chains")?;
        let h_chains = state.take::<Vec<Tensor>>("h_chains")?;
        let rng = state.take::<ChaCha8Rng>("rng")?;
        let lifecycle = state.take::<Lifecycle>("lifecycle")?;
        state.remove("sweep_plan");

        check_chain_shapes(
            config.as_ref().unwrap_or(&self.config).negative_chains,
            &stack.as_ref().unwrap_or(&self.stack).layer_widths(),
            v_chains.as_ref().unwrap_or(&self.v_chains),
            h_chains.as_deref().unwrap_or(self.h_chains.as_slice()),
        )?;

        if let Some(config) = config {
            self.config = config;
        }
        if let Some(autonomous) = autonomous {
            self.autonomous = autonomous;
        }
        if let Some(ip) = inference_procedure {
            self.inference_procedure = ip;
        }
        if let (Some(rbms), Some(stack)) = (rbms, stack) {
            self.rbms = rbms;
            self.stack = stack;
        }
        if let Some(v_chains) = v_chains {
            self.v_chains = v_chains;
        }
        if let Some(h_chains) = h_chains {
            self.h_chains = h_chains;
        }
        if let Some(rng) = rng {
            self.rng = rng;
        }
        if let Some(lifecycle) = lifecycle {
            self.lifecycle = lifecycle;
        }
        self.sweep_plan = None;
        Ok(())
    }

    /// 从持久化状态重建一个新实例
    pub fn from_state(mut state: ModelState) -> DbmResult<Self> {
        let config: DbmConfig = state.require("config")?;
        let records: Vec<RbmRecord> = state.require("rbms")?;
        let ip = state.take::<InferenceProcedure>("inference_procedure")?;
        let rbms = records
            .into_iter()
            .map(Rbm::from_record)
            .collect::<Result<Vec<_>, _>>()?;
        let mut dbm = Self::new(rbms, config, ip)?;
        dbm.set_state(state)?;
        info!(layers = ?dbm.stack.layer_widths(), "已从持久化状态恢复 DBM");
        Ok(dbm)
    }

    pub fn save<P: AsRef<std::path::Path>>(&self, path: P) -> DbmResult<()> {
        self.get_state()?.save(path)
    }

    pub fn load<P: AsRef<std::path::Path>>(path: P) -> DbmResult<Self> {
        Self::from_state(ModelState::load(path)?)
    }
}

/// 各层链状态的形状必须是`[negative_chains, 层宽]`
fn check_chain_shapes(
    negative_chains: usize,
    widths: &[usize],
    v_chains: &Tensor,
    h_chains: &[Tensor],
) -> DbmResult<()> {
    if h_chains.len() != widths.len() - 1 {
        return Err(ConfigurationError::HiddenLayerCountMismatch {
            expected: widths.len() - 1,
            got: h_chains.len(),
        }
        .into());
    }
    let chains = std::iter::once(v_chains).chain(h_chains);
    for (i, (chain, &width)) in chains.zip(widths).enumerate() {
        let expected = vec![negative_chains, width];
        if chain.shape() != expected.as_slice() {
            return Err(ConfigurationError::ParamShapeMismatch {
                name: format!("chains[{i}]"),
                expected,
                got: chain.shape().to_vec(),
            }
            .into());
        }
    }
    Ok(())
}
