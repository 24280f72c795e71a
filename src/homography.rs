//! Homography estimation from point correspondences.
//!
//! - Direct Linear Transform on Hartley-normalized points.
//! - RANSAC over minimal 4-point samples, refit on the consensus set.

use nalgebra::{DMatrix, Matrix3, Point2, SymmetricEigen, Vector3};
use rand::{seq::index, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::trace;

use crate::{
    config::RansacConfig,
    error::{Error, Result},
};

/// Smallest number of correspondences that determines a homography.
pub const MIN_POINTS: usize = 4;

const EPS: f64 = 1e-12;

pub trait HomographyEstimator {
    /// `H` such that `dst[i] ~ H * src[i]` in homogeneous coordinates.
    fn estimate(&self, src: &[Point2<f64>], dst: &[Point2<f64>]) -> Result<Matrix3<f64>>;
}

/// Maps `p` through `h`; `None` when it lands on the line at infinity.
pub fn project(h: &Matrix3<f64>, p: &Point2<f64>) -> Option<Point2<f64>> {
    let v = h * Vector3::new(p.x, p.y, 1.0);

    if v.z.abs() < EPS || !v.x.is_finite() || !v.y.is_finite() {
        return None;
    }

    return Some(Point2::new(v.x / v.z, v.y / v.z));
}

pub fn reprojection_error(h: &Matrix3<f64>, src: &Point2<f64>, dst: &Point2<f64>) -> f64 {
    return match project(h, src) {
        Some(p) => (p - dst).norm(),
        None => f64::INFINITY,
    };
}

/// Translate the centroid to the origin and scale the mean distance to sqrt(2).
fn normalize_points(pts: &[Point2<f64>]) -> (Matrix3<f64>, Vec<Point2<f64>>) {
    let n = pts.len() as f64;
    let cx = pts.iter().map(|p| p.x).sum::<f64>() / n;
    let cy = pts.iter().map(|p| p.y).sum::<f64>() / n;

    let mean_dist = pts.iter().map(|p| ((p.x - cx).powi(2) + (p.y - cy).powi(2)).sqrt()).sum::<f64>() / n;
    let s = if mean_dist > EPS { std::f64::consts::SQRT_2 / mean_dist } else { 1.0 };

    let t = Matrix3::new(s, 0.0, -s * cx, 0.0, s, -s * cy, 0.0, 0.0, 1.0);
    let normalized = pts.iter().map(|p| Point2::new(s * (p.x - cx), s * (p.y - cy))).collect();

    return (t, normalized);
}

fn check_lengths(src: &[Point2<f64>], dst: &[Point2<f64>]) -> Result<()> {
    if src.len() != dst.len() {
        return Err(Error::Estimation(format!(
            "point sets differ in length ({} vs {})",
            src.len(),
            dst.len()
        )));
    }
    if src.len() < MIN_POINTS {
        return Err(Error::InsufficientCorrespondences { needed: MIN_POINTS, got: src.len() });
    }

    return Ok(());
}

/// Least-squares homography through all given pairs (at least 4).
pub fn estimate_dlt(src: &[Point2<f64>], dst: &[Point2<f64>]) -> Result<Matrix3<f64>> {
    check_lengths(src, dst)?;

    let n = src.len();
    let (t_src, src_n) = normalize_points(src);
    let (t_dst, dst_n) = normalize_points(dst);

    let mut a = DMatrix::<f64>::zeros(2 * n, 9);
    for i in 0..n {
        let (sx, sy) = (src_n[i].x, src_n[i].y);
        let (dx, dy) = (dst_n[i].x, dst_n[i].y);

        a[(2 * i, 3)] = -sx;
        a[(2 * i, 4)] = -sy;
        a[(2 * i, 5)] = -1.0;
        a[(2 * i, 6)] = dy * sx;
        a[(2 * i, 7)] = dy * sy;
        a[(2 * i, 8)] = dy;

        a[(2 * i + 1, 0)] = sx;
        a[(2 * i + 1, 1)] = sy;
        a[(2 * i + 1, 2)] = 1.0;
        a[(2 * i + 1, 6)] = -dx * sx;
        a[(2 * i + 1, 7)] = -dx * sy;
        a[(2 * i + 1, 8)] = -dx;
    }

    // Null vector of A from the 9x9 normal matrix; a thin SVD of an 8x9 A would drop it
    let ata = a.transpose() * &a;
    let eig = SymmetricEigen::new(ata);

    let min_idx = (0..9)
        .min_by(|&i, &j| eig.eigenvalues[i].abs().total_cmp(&eig.eigenvalues[j].abs()))
        .unwrap_or(0);
    let h = eig.eigenvectors.column(min_idx);
    let h_norm = Matrix3::new(h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], h[8]);

    let t_dst_inv = t_dst.try_inverse().ok_or(Error::DegenerateHomography)?;
    let h = t_dst_inv * h_norm * t_src;

    if h[(2, 2)].abs() < EPS || h.iter().any(|v| !v.is_finite()) {
        return Err(Error::DegenerateHomography);
    }

    return Ok(h / h[(2, 2)]);
}

fn collinear(a: &Point2<f64>, b: &Point2<f64>, c: &Point2<f64>) -> bool {
    let cross = (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x);
    return cross.abs() < 1e-6;
}

/// True when some three of the four points lie on one line.
fn degenerate_sample(pts: &[Point2<f64>; 4]) -> bool {
    return collinear(&pts[0], &pts[1], &pts[2])
        || collinear(&pts[0], &pts[1], &pts[3])
        || collinear(&pts[0], &pts[2], &pts[3])
        || collinear(&pts[1], &pts[2], &pts[3]);
}

/// Iterations needed to draw one all-inlier sample with probability `confidence`.
fn adaptive_iterations(inlier_ratio: f64, confidence: f64, max_iterations: usize) -> usize {
    if inlier_ratio >= 1.0 {
        return 1;
    }
    let p_good = inlier_ratio.powi(MIN_POINTS as i32);
    if p_good <= EPS {
        return max_iterations;
    }

    let k = (1.0 - confidence).ln() / (1.0 - p_good).ln();
    if !k.is_finite() {
        return max_iterations;
    }

    return (k.ceil() as usize).clamp(1, max_iterations);
}

/// RANSAC estimator for outlier-tolerant homography fitting.
#[derive(Debug, Clone, Default)]
pub struct RansacHomography {
    config: RansacConfig,
}

impl RansacHomography {
    pub fn new(config: RansacConfig) -> Self {
        return RansacHomography { config };
    }

    fn inliers(&self, h: &Matrix3<f64>, src: &[Point2<f64>], dst: &[Point2<f64>]) -> Vec<usize> {
        return src.iter()
            .zip(dst)
            .enumerate()
            .filter(|(_, (s, d))| reprojection_error(h, s, d) < self.config.inlier_threshold)
            .map(|(i, _)| i)
            .collect()
    }
}

impl HomographyEstimator for RansacHomography {
    fn estimate(&self, src: &[Point2<f64>], dst: &[Point2<f64>]) -> Result<Matrix3<f64>> {
        check_lengths(src, dst)?;

        let n = src.len();
        let mut rng = match self.config.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };

        let mut best: Option<(Matrix3<f64>, Vec<usize>)> = None;
        let mut max_iterations = self.config.max_iterations;
        let mut iterations = 0;

        while iterations < max_iterations {
            iterations += 1;

            let sample = index::sample(&mut rng, n, MIN_POINTS);
            let mut sample_src = [Point2::origin(); MIN_POINTS];
            let mut sample_dst = [Point2::origin(); MIN_POINTS];
            for (k, i) in sample.iter().enumerate() {
                sample_src[k] = src[i];
                sample_dst[k] = dst[i];
            }

            if degenerate_sample(&sample_src) || degenerate_sample(&sample_dst) {
                continue;
            }

            let Ok(h) = estimate_dlt(&sample_src, &sample_dst) else {
                continue;
            };

            let inliers = self.inliers(&h, src, dst);
            let improved = best.as_ref().map_or(true, |(_, b)| inliers.len() > b.len());

            if improved {
                let ratio = inliers.len() as f64 / n as f64;
                max_iterations = adaptive_iterations(ratio, self.config.confidence, self.config.max_iterations)
                    .max(iterations.min(self.config.max_iterations));
                best = Some((h, inliers));
            }
        }

        let (h, inliers) = best.ok_or(Error::DegenerateHomography)?;
        trace!(iterations, inliers = inliers.len(), total = n, "ransac");

        if inliers.len() < MIN_POINTS {
            return Ok(h);
        }

        let inlier_src: Vec<_> = inliers.iter().map(|&i| src[i]).collect();
        let inlier_dst: Vec<_> = inliers.iter().map(|&i| dst[i]).collect();

        // Keep the sample model if the refit drifts off the consensus set
        return match estimate_dlt(&inlier_src, &inlier_dst) {
            Ok(refined) if self.inliers(&refined, src, dst).len() >= inliers.len() => Ok(refined),
            _ => Ok(h),
        };
    }
}
