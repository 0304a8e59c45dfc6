/*
 * @Author       : 老董
 * @Description  : 逐元素的激活函数、信息量计算以及伯努利采样
 */

use super::Tensor;
use rand::Rng;

impl Tensor {
    /// sigmoid(x) = 1 / (1 + e^(-x))，按x的正负分别计算以避免`exp`溢出
    pub fn sigmoid(&self) -> Self {
        self.map(stable_sigmoid)
    }

    /// softplus(x) = ln(1 + e^x)，写成 max(x, 0) + ln(1 + e^(-|x|)) 以避免溢出
    pub fn softplus(&self) -> Self {
        self.map(|x| x.max(0.0) + (-x.abs()).exp().ln_1p())
    }

    /// 逐元素的二值熵：-p·ln(p) - (1-p)·ln(1-p)，单位为nat。
    /// 约定 0·ln(0) = 0，故p取0或1时熵为0而不是NaN
    pub fn binary_entropy(&self) -> Self {
        self.map(|p| -x_ln_x(p) - x_ln_x(1.0 - p))
    }

    /// 以本张量的每个元素为成功概率，逐元素独立地抽取伯努利样本，结果只含0或1。
    /// 抽样方式：从[0,1)均匀分布中取`u`，`u < p`时为1
    pub fn bernoulli_seeded<R: Rng + ?Sized>(&self, rng: &mut R) -> Self {
        self.map_with_rng(rng, |p, u| if u < p { 1.0 } else { 0.0 })
    }

    fn map_with_rng<R, F>(&self, rng: &mut R, f: F) -> Self
    where
        R: Rng + ?Sized,
        F: Fn(f32, f32) -> f32,
    {
        let mut out = self.clone();
        for x in out.data.iter_mut() {
            let u: f32 = rng.r#gen();
            *x = f(*x, u);
        }
        out
    }
}

fn stable_sigmoid(x: f32) -> f32 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

fn x_ln_x(x: f32) -> f32 {
    if x <= 0.0 { 0.0 } else { x * x.ln() }
}
