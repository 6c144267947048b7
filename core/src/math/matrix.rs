use ndarray::{Array1, Array2, ArrayView2, Axis};

pub struct MatrixHelper;

impl MatrixHelper {
    /// Stacks equally long rows into a matrix, one row per sample.
    pub fn stack_rows(rows: &[Vec<f64>]) -> Option<Array2<f64>> {
        let width = rows.first()?.len();
        if rows.iter().any(|row| row.len() != width) {
            return None;
        }
        let flat: Vec<f64> = rows.iter().flatten().copied().collect();
        Array2::from_shape_vec((rows.len(), width), flat).ok()
    }

    /// Elementwise mean over samples (rows).
    pub fn column_means(samples: ArrayView2<f64>) -> Option<Array1<f64>> {
        samples.mean_axis(Axis(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_means_average_each_channel() {
        let matrix = MatrixHelper::stack_rows(&[vec![1.0, 10.0], vec![3.0, 30.0]]).unwrap();
        let means = MatrixHelper::column_means(matrix.view()).unwrap();
        assert_eq!(means.to_vec(), vec![2.0, 20.0]);
    }

    #[test]
    fn ragged_rows_are_rejected() {
        assert!(MatrixHelper::stack_rows(&[vec![1.0], vec![1.0, 2.0]]).is_none());
        assert!(MatrixHelper::stack_rows(&[]).is_none());
    }
}
