use crate::prelude::{StageError, StageResult};

/// Piecewise-cubic Akima interpolant through strictly increasing knots.
///
/// Knot slopes follow the Akima weighting of neighbouring secant slopes, with
/// two extrapolated secants on each end. Points outside the knot range are
/// evaluated on the nearest end segment.
#[derive(Debug, Clone)]
pub struct AkimaSpline {
    x: Vec<f64>,
    y: Vec<f64>,
    slopes: Vec<f64>,
}

impl AkimaSpline {
    pub fn new(x: &[f64], y: &[f64]) -> StageResult<Self> {
        if x.len() != y.len() {
            return Err(StageError::Degenerate(format!(
                "knot arrays differ in length ({} vs {})",
                x.len(),
                y.len()
            )));
        }
        if x.len() < 2 {
            return Err(StageError::Degenerate(format!(
                "interpolation needs at least two knots, got {}",
                x.len()
            )));
        }
        if x.iter().chain(y).any(|value| !value.is_finite()) {
            return Err(StageError::Degenerate("non-finite knot".into()));
        }
        if x.windows(2).any(|pair| pair[1] <= pair[0]) {
            return Err(StageError::Degenerate(
                "knot coordinates are not strictly increasing".into(),
            ));
        }

        let secants: Vec<f64> = x
            .windows(2)
            .zip(y.windows(2))
            .map(|(xs, ys)| (ys[1] - ys[0]) / (xs[1] - xs[0]))
            .collect();

        let slopes = if secants.len() == 1 {
            vec![secants[0]; 2]
        } else {
            akima_slopes(&secants)
        };

        Ok(Self {
            x: x.to_vec(),
            y: y.to_vec(),
            slopes,
        })
    }

    pub fn evaluate(&self, at: f64) -> f64 {
        let segment = self.segment(at);
        let (x0, x1) = (self.x[segment], self.x[segment + 1]);
        let (y0, y1) = (self.y[segment], self.y[segment + 1]);
        let (d0, d1) = (self.slopes[segment], self.slopes[segment + 1]);

        let h = x1 - x0;
        let t = (at - x0) / h;
        let t2 = t * t;
        let t3 = t2 * t;
        let h00 = 2.0 * t3 - 3.0 * t2 + 1.0;
        let h10 = t3 - 2.0 * t2 + t;
        let h01 = -2.0 * t3 + 3.0 * t2;
        let h11 = t3 - t2;
        h00 * y0 + h10 * h * d0 + h01 * y1 + h11 * h * d1
    }

    pub fn evaluate_all(&self, points: &[f64]) -> Vec<f64> {
        points.iter().map(|&at| self.evaluate(at)).collect()
    }

    fn segment(&self, at: f64) -> usize {
        let last = self.x.len() - 2;
        // partition_point gives the first knot strictly greater than `at`.
        let upper = self.x.partition_point(|&knot| knot <= at);
        upper.saturating_sub(1).min(last)
    }
}

fn akima_slopes(secants: &[f64]) -> Vec<f64> {
    let count = secants.len();
    let before = 2.0 * secants[0] - secants[1];
    let before2 = 2.0 * before - secants[0];
    let after = 2.0 * secants[count - 1] - secants[count - 2];
    let after2 = 2.0 * after - secants[count - 1];

    let mut extended = Vec::with_capacity(count + 4);
    extended.push(before2);
    extended.push(before);
    extended.extend_from_slice(secants);
    extended.push(after);
    extended.push(after2);

    let jumps: Vec<f64> = extended
        .windows(2)
        .map(|pair| (pair[1] - pair[0]).abs())
        .collect();

    let knots = count + 1;
    let weights: Vec<(f64, f64)> = (0..knots).map(|i| (jumps[i + 2], jumps[i])).collect();
    let largest = weights
        .iter()
        .map(|(right, left)| right + left)
        .fold(0.0, f64::max);

    weights
        .iter()
        .enumerate()
        .map(|(i, &(right, left))| {
            let total = right + left;
            if total > 1e-9 * largest {
                (right * extended[i + 1] + left * extended[i + 2]) / total
            } else {
                0.5 * (extended[i] + extended[i + 3])
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passes_through_every_knot() {
        let x = [0.0, 0.1, 0.25, 0.3, 0.6, 0.8, 1.0];
        let y = [0.0, -2236.3, -2460.6, -1864.9, -331.2, 181.0, 53.3];
        let spline = AkimaSpline::new(&x, &y).unwrap();
        for (&xi, &yi) in x.iter().zip(&y) {
            assert!((spline.evaluate(xi) - yi).abs() < 1e-9, "knot {xi}");
        }
    }

    #[test]
    fn reproduces_straight_lines() {
        let x = [0.0, 0.2, 0.5, 0.7, 1.0];
        let y: Vec<f64> = x.iter().map(|v| 3.0 * v - 1.0).collect();
        let spline = AkimaSpline::new(&x, &y).unwrap();
        for i in 0..=20 {
            let at = i as f64 / 20.0;
            assert!((spline.evaluate(at) - (3.0 * at - 1.0)).abs() < 1e-12);
        }
    }

    #[test]
    fn two_knots_interpolate_linearly() {
        let spline = AkimaSpline::new(&[0.0, 2.0], &[1.0, 5.0]).unwrap();
        assert!((spline.evaluate(0.5) - 2.0).abs() < 1e-12);
        assert!((spline.evaluate(2.5) - 6.0).abs() < 1e-12);
    }

    #[test]
    fn flat_segments_stay_flat() {
        let x = [0.0, 1.0, 2.0, 3.0, 4.0, 5.0];
        let y = [0.0, 0.0, 0.0, 1.0, 1.0, 1.0];
        let spline = AkimaSpline::new(&x, &y).unwrap();
        assert!(spline.evaluate(0.5).abs() < 1e-12);
        assert!(spline.evaluate(1.5).abs() < 1e-12);
        assert!((spline.evaluate(4.5) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn rejects_unsorted_or_short_input() {
        assert!(AkimaSpline::new(&[0.0], &[1.0]).is_err());
        assert!(AkimaSpline::new(&[0.0, 0.5, 0.5], &[1.0, 2.0, 3.0]).is_err());
        assert!(AkimaSpline::new(&[0.0, 1.0], &[1.0]).is_err());
    }
}
