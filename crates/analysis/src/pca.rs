//! Principal component analysis of 3D point clouds.

use larreco_types::Point;
use nalgebra::{Matrix3, SymmetricEigen};

#[derive(Clone, Debug, PartialEq)]
pub struct PcaResult {
    pub centroid: Point,
    /// Eigenvalues of the covariance, largest first.
    pub eigenvalues: [f32; 3],
    /// Unit eigenvectors matching `eigenvalues`.
    pub axes: [Point; 3],
}

impl PcaResult {
    pub fn principal_axis(&self) -> Point {
        self.axes[0]
    }
}

/// Eigen-decomposition of the covariance of `points`; `None` for an empty set.
pub fn pca<'a>(points: impl IntoIterator<Item = &'a Point>) -> Option<PcaResult> {
    let points: Vec<&Point> = points.into_iter().collect();
    if points.is_empty() {
        return None;
    }

    let n = points.len() as f32;
    let centroid = points.iter().fold(Point::zeros(), |acc, p| acc + *p) / n;

    let mut covariance = Matrix3::<f32>::zeros();
    for p in &points {
        let d = *p - centroid;
        covariance += d * d.transpose();
    }
    covariance /= n;

    let eigen = SymmetricEigen::new(covariance);
    let mut order = [0usize, 1, 2];
    order.sort_by(|&a, &b| eigen.eigenvalues[b].total_cmp(&eigen.eigenvalues[a]));

    let eigenvalues = order.map(|i| eigen.eigenvalues[i]);
    let axes = order.map(|i| {
        let axis: Point = eigen.eigenvectors.column(i).into_owned();
        axis.normalize()
    });

    Some(PcaResult {
        centroid,
        eigenvalues,
        axes,
    })
}
