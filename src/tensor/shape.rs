use super::Tensor;
use ndarray::IxDyn;

impl Tensor {
    /// 改变张量的形状（元素总数必须一致，否则panic）
    pub fn reshape(&self, shape: &[usize]) -> Self {
        let total_elements: usize = shape.iter().product();
        assert!(
            self.size() == total_elements,
            "新形状{:?}的元素数量与原张量形状{:?}不一致",
            shape,
            self.shape()
        );
        let data = self
            .data
            .as_standard_layout()
            .into_owned()
            .into_shape(IxDyn(shape))
            .unwrap();
        Self { data }
    }

    /// 张量的转置：交换第0维和第1维，1阶及以下的张量原样返回。
    /// 注：返回的张量总是标准（行优先）内存布局
    pub fn transpose(&self) -> Self {
        if self.dimension() <= 1 {
            self.clone()
        } else {
            let mut axes: Vec<usize> = (0..self.dimension()).collect();
            axes.swap(0, 1);
            let permuted = self.data.view().permuted_axes(axes);
            Self {
                data: permuted.as_standard_layout().into_owned(),
            }
        }
    }
}
