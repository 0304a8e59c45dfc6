use crate::data::{Dataset, DenseDesignMatrix};
use crate::errors::DbmError;
use crate::tensor::Tensor;

#[test]
fn test_dense_design_matrix_cycles_through_examples() {
    let x = Tensor::new(&[1., 2., 3., 4., 5., 6.], &[3, 2]);
    let mut dataset = DenseDesignMatrix::new(x).unwrap();
    assert_eq!(dataset.num_features(), 2);

    let batch = dataset.get_batch_design(2).unwrap();
    assert_eq!(batch, Tensor::new(&[1., 2., 3., 4.], &[2, 2]));
    // 第2批从第3个样本开始并绕回开头
    let batch = dataset.get_batch_design(2).unwrap();
    assert_eq!(batch, Tensor::new(&[5., 6., 1., 2.], &[2, 2]));
}

#[test]
fn test_dense_design_matrix_rejects_nan() {
    let x = Tensor::new(&[1., f32::NAN], &[1, 2]);
    assert!(matches!(
        DenseDesignMatrix::new(x),
        Err(DbmError::NumericInvariant { .. })
    ));
}
