//! Planar homography estimation: normalized DLT inside a RANSAC loop.

use rand::rngs::StdRng;
use rand::seq::index::sample;
use rand::SeedableRng;
use tracing::debug;

use crate::types::Homography;

const SAMPLE_SIZE: usize = 4;
const MAX_ITERATIONS: usize = 2000;
const CONFIDENCE: f64 = 0.995;
const RANSAC_SEED: u64 = 0x0a11_c0de;

/// Estimated transform plus a per-correspondence inlier flag.
#[derive(Debug, Clone, PartialEq)]
pub struct RansacFit {
    pub transform: Homography,
    pub inliers: Vec<bool>,
}

impl RansacFit {
    pub fn inlier_count(&self) -> usize {
        self.inliers.iter().filter(|&&i| i).count()
    }
}

/// Robustly fit a homography mapping `src[i]` onto `dst[i]`.
///
/// Returns `None` when fewer than four correspondences are given or no
/// non-degenerate model could be fitted. The random sampler is seeded, so
/// the same input always produces the same fit.
pub fn find_homography(
    src: &[(f64, f64)],
    dst: &[(f64, f64)],
    reprojection_threshold: f64,
) -> Option<RansacFit> {
    let n = src.len().min(dst.len());
    if n < SAMPLE_SIZE {
        return None;
    }
    let threshold_sq = reprojection_threshold * reprojection_threshold;
    let mut rng = StdRng::seed_from_u64(RANSAC_SEED);

    let mut best: Option<(Homography, Vec<bool>, usize)> = None;
    let mut max_iters = MAX_ITERATIONS;
    let mut iter = 0;
    while iter < max_iters {
        iter += 1;
        let picked = sample(&mut rng, n, SAMPLE_SIZE).into_vec();
        let s: Vec<(f64, f64)> = picked.iter().map(|&i| src[i]).collect();
        let d: Vec<(f64, f64)> = picked.iter().map(|&i| dst[i]).collect();
        if has_collinear_triple(&s) || has_collinear_triple(&d) {
            continue;
        }
        let Some(h) = solve_dlt(&s, &d) else {
            continue;
        };

        let mask = inlier_mask(&h, &src[..n], &dst[..n], threshold_sq);
        let count = mask.iter().filter(|&&m| m).count();
        if best.as_ref().map_or(true, |(_, _, c)| count > *c) {
            max_iters = max_iters.min(adaptive_iterations(count, n));
            best = Some((h, mask, count));
        }
    }

    let (h, mask, count) = best?;
    if count < SAMPLE_SIZE {
        return None;
    }

    // Least-squares refit over the consensus set; keep it only if it does not
    // lose support.
    let (inl_src, inl_dst): (Vec<_>, Vec<_>) = (0..n)
        .filter(|&i| mask[i])
        .map(|i| (src[i], dst[i]))
        .unzip();
    let (transform, inliers) = match solve_dlt(&inl_src, &inl_dst) {
        Some(refined) => {
            let refined_mask = inlier_mask(&refined, &src[..n], &dst[..n], threshold_sq);
            if refined_mask.iter().filter(|&&m| m).count() >= count {
                (refined, refined_mask)
            } else {
                (h, mask)
            }
        }
        None => (h, mask),
    };

    debug!(iterations = iter, inliers = count, total = n, "ransac finished");
    Some(RansacFit { transform, inliers })
}

fn adaptive_iterations(inliers: usize, total: usize) -> usize {
    let w = inliers as f64 / total as f64;
    let p_good = w.powi(SAMPLE_SIZE as i32);
    if p_good >= 1.0 - f64::EPSILON {
        return 1;
    }
    if p_good <= f64::EPSILON {
        return MAX_ITERATIONS;
    }
    let needed = (1.0 - CONFIDENCE).ln() / (1.0 - p_good).ln();
    (needed.ceil().max(1.0) as usize).min(MAX_ITERATIONS)
}

fn inlier_mask(
    h: &Homography,
    src: &[(f64, f64)],
    dst: &[(f64, f64)],
    threshold_sq: f64,
) -> Vec<bool> {
    src.iter()
        .zip(dst)
        .map(|(&(x, y), &(u, v))| match h.project(x, y) {
            Some((px, py)) => (px - u).powi(2) + (py - v).powi(2) <= threshold_sq,
            None => false,
        })
        .collect()
}

fn has_collinear_triple(points: &[(f64, f64)]) -> bool {
    for i in 0..points.len() {
        for j in i + 1..points.len() {
            for k in j + 1..points.len() {
                let (a, b, c) = (points[i], points[j], points[k]);
                let cross = (b.0 - a.0) * (c.1 - a.1) - (b.1 - a.1) * (c.0 - a.0);
                if cross.abs() < 1e-6 {
                    return true;
                }
            }
        }
    }
    false
}

/// Similarity transform moving the centroid to the origin with mean
/// distance sqrt(2), plus the normalized points.
fn normalize(points: &[(f64, f64)]) -> ([[f64; 3]; 3], Vec<(f64, f64)>) {
    let n = points.len() as f64;
    let cx = points.iter().map(|p| p.0).sum::<f64>() / n;
    let cy = points.iter().map(|p| p.1).sum::<f64>() / n;
    let mean_dist = points
        .iter()
        .map(|p| ((p.0 - cx).powi(2) + (p.1 - cy).powi(2)).sqrt())
        .sum::<f64>()
        / n;
    let s = if mean_dist > 1e-12 {
        std::f64::consts::SQRT_2 / mean_dist
    } else {
        1.0
    };
    let t = [[s, 0.0, -s * cx], [0.0, s, -s * cy], [0.0, 0.0, 1.0]];
    let normalized = points
        .iter()
        .map(|p| (s * (p.0 - cx), s * (p.1 - cy)))
        .collect();
    (t, normalized)
}

/// Direct linear transform with h33 fixed to 1. Exactly determined for four
/// points, least squares (normal equations) beyond that.
fn solve_dlt(src: &[(f64, f64)], dst: &[(f64, f64)]) -> Option<Homography> {
    if src.len() < SAMPLE_SIZE || src.len() != dst.len() {
        return None;
    }
    let (t_src, ns) = normalize(src);
    let (t_dst, nd) = normalize(dst);

    let mut ata = [[0.0f64; 8]; 8];
    let mut atb = [0.0f64; 8];
    for (&(x, y), &(u, v)) in ns.iter().zip(&nd) {
        let rows = [
            ([x, y, 1.0, 0.0, 0.0, 0.0, -x * u, -y * u], u),
            ([0.0, 0.0, 0.0, x, y, 1.0, -x * v, -y * v], v),
        ];
        for (row, rhs) in rows {
            for i in 0..8 {
                atb[i] += row[i] * rhs;
                for j in 0..8 {
                    ata[i][j] += row[i] * row[j];
                }
            }
        }
    }

    let h = solve_linear(ata, atb)?;
    let hn = [[h[0], h[1], h[2]], [h[3], h[4], h[5]], [h[6], h[7], 1.0]];
    let t_dst_inv = invert_similarity(&t_dst)?;
    let m = mat_mul(&mat_mul(&t_dst_inv, &hn), &t_src);
    if m[2][2].abs() < 1e-12 {
        return None;
    }
    let scale = m[2][2];
    let mut out = [[0.0; 3]; 3];
    for (r, row) in m.iter().enumerate() {
        for (c, v) in row.iter().enumerate() {
            out[r][c] = v / scale;
        }
    }
    if out.iter().flatten().any(|v| !v.is_finite()) {
        return None;
    }
    Some(Homography(out))
}

/// Gaussian elimination with partial pivoting. `None` for singular systems.
fn solve_linear(mut a: [[f64; 8]; 8], mut b: [f64; 8]) -> Option<[f64; 8]> {
    for col in 0..8 {
        let pivot = (col..8).max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))?;
        if a[pivot][col].abs() < 1e-10 {
            return None;
        }
        a.swap(col, pivot);
        b.swap(col, pivot);
        for row in col + 1..8 {
            let factor = a[row][col] / a[col][col];
            for k in col..8 {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }
    let mut x = [0.0; 8];
    for row in (0..8).rev() {
        let tail: f64 = (row + 1..8).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }
    Some(x)
}

fn invert_similarity(t: &[[f64; 3]; 3]) -> Option<[[f64; 3]; 3]> {
    let s = t[0][0];
    if s.abs() < 1e-12 {
        return None;
    }
    Some([
        [1.0 / s, 0.0, -t[0][2] / s],
        [0.0, 1.0 / s, -t[1][2] / s],
        [0.0, 0.0, 1.0],
    ])
}

fn mat_mul(a: &[[f64; 3]; 3], b: &[[f64; 3]; 3]) -> [[f64; 3]; 3] {
    let mut out = [[0.0; 3]; 3];
    for r in 0..3 {
        for c in 0..3 {
            out[r][c] = (0..3).map(|k| a[r][k] * b[k][c]).sum();
        }
    }
    out
}
