use crate::config::{DbmConfig, RbmConfig};
use crate::models::dbm::{ChainLayer, Dbm, SamplingUpdates};
use crate::models::rbm::Rbm;
use crate::tensor::Tensor;

mod energy_tests;
mod persist_tests;

/// 按层宽依次构造RBM，相邻RBM的种子不同
fn make_rbms(widths: &[usize]) -> Vec<Rbm> {
    widths
        .windows(2)
        .enumerate()
        .map(|(i, pair)| {
            Rbm::new(&RbmConfig::new(pair[0], pair[1]).with_irange(0.5).with_seed(i as u64 + 1))
                .unwrap()
        })
        .collect()
}

fn make_dbm(widths: &[usize], negative_chains: usize) -> Dbm {
    Dbm::new(make_rbms(widths), DbmConfig::new(negative_chains), None).unwrap()
}

/// 直接写入全部链状态
fn set_chains(dbm: &mut Dbm, v: Tensor, h: Vec<Tensor>) {
    let mut updates = SamplingUpdates::new();
    updates.insert(ChainLayer::Visible, v);
    for (i, h) in h.into_iter().enumerate() {
        updates.insert(ChainLayer::Hidden(i), h);
    }
    dbm.commit_sampling_updates(updates).unwrap();
}
