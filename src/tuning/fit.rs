//! Ordinary least squares parabola fit via the normal equations.
//!
//! Twenty samples and three unknowns: forming `AᵀA x = Aᵀb` and solving the
//! 3x3 system directly is exact, allocation-free and runs in microseconds,
//! which matters because the fit happens inside the calibration routine on
//! the instrument itself.

/// Solve a 3x3 linear system in place by Gaussian elimination.
///
/// The calibration normal equations are well conditioned over the sweep
/// ranges used here (the Vandermonde moments of 20 distinct points), so no
/// pivoting is needed.
pub fn solve_3x3(a: &mut [[f32; 3]; 3], b: &mut [f32; 3]) -> [f32; 3] {
    // Forward elimination with pivot-row normalization
    for i in 0..3 {
        let diag = a[i][i];
        for j in i..3 {
            a[i][j] /= diag;
        }
        b[i] /= diag;

        for k in (i + 1)..3 {
            let factor = a[k][i];
            for j in i..3 {
                a[k][j] -= factor * a[i][j];
            }
            b[k] -= factor * b[i];
        }
    }

    // Back substitution
    let mut x = [0.0f32; 3];
    for i in (0..3).rev() {
        x[i] = b[i];
        for j in (i + 1)..3 {
            x[i] -= a[i][j] * x[j];
        }
    }
    x
}

/// Fit `y = a + b*x + c*x^2` to the given points, returning `[a, b, c]`.
pub fn fit_parabola(x: &[f32], y: &[f32]) -> [f32; 3] {
    debug_assert_eq!(x.len(), y.len());

    // Running moments: s[k] = sum(x^k), t[k] = sum(x^k * y)
    let mut s = [0.0f32; 5];
    let mut t = [0.0f32; 3];

    for (&xi, &yi) in x.iter().zip(y) {
        let xi2 = xi * xi;

        s[0] += 1.0;
        s[1] += xi;
        s[2] += xi2;
        s[3] += xi2 * xi;
        s[4] += xi2 * xi2;

        t[0] += yi;
        t[1] += xi * yi;
        t[2] += xi2 * yi;
    }

    let mut ata = [
        [s[0], s[1], s[2]],
        [s[1], s[2], s[3]],
        [s[2], s[3], s[4]],
    ];
    let mut atb = [t[0], t[1], t[2]];

    solve_3x3(&mut ata, &mut atb)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn solves_known_system() {
        // x + y + z = 6, 2y + 5z = -4, 2x + 5y - z = 27  =>  (5, 3, -2)
        let mut a = [[1.0, 1.0, 1.0], [0.0, 2.0, 5.0], [2.0, 5.0, -1.0]];
        let mut b = [6.0, -4.0, 27.0];
        let x = solve_3x3(&mut a, &mut b);
        assert_relative_eq!(x[0], 5.0, epsilon = 1e-4);
        assert_relative_eq!(x[1], 3.0, epsilon = 1e-4);
        assert_relative_eq!(x[2], -2.0, epsilon = 1e-4);
    }

    #[test]
    fn recovers_exact_parabola() {
        let (a, b, c) = (2.0f32, 3.0f32, 4.0f32);
        let x: Vec<f32> = (1..=5).map(|i| i as f32).collect();
        let y: Vec<f32> = x.iter().map(|&xi| a + b * xi + c * xi * xi).collect();

        let coeffs = fit_parabola(&x, &y);
        assert_relative_eq!(coeffs[0], a, epsilon = 1e-2);
        assert_relative_eq!(coeffs[1], b, epsilon = 1e-2);
        assert_relative_eq!(coeffs[2], c, epsilon = 1e-3);
    }

    #[test]
    fn recovers_calibration_shaped_data() {
        // The real use: ~20 points over the pitch sweep range with a gentle
        // quadratic distortion, plus float-level noise
        let (a, b, c) = (-1.2f32, 1.03f32, -0.0008f32);
        let x: Vec<f32> = (0..20).map(|i| 30.0 + 80.0 * i as f32 / 19.0).collect();
        let y: Vec<f32> = x
            .iter()
            .enumerate()
            .map(|(i, &xi)| {
                let noise = if i % 2 == 0 { 1e-4 } else { -1e-4 };
                a + b * xi + c * xi * xi + noise
            })
            .collect();

        let coeffs = fit_parabola(&x, &y);
        assert_relative_eq!(coeffs[0], a, epsilon = 0.05);
        assert_relative_eq!(coeffs[1], b, epsilon = 0.005);
        assert_relative_eq!(coeffs[2], c, epsilon = 1e-4);
    }

    #[test]
    fn fit_residuals_are_small() {
        let x: Vec<f32> = (0..20).map(|i| 30.0 + 1.5 * i as f32).collect();
        let y: Vec<f32> = x.iter().map(|&xi| 0.5 + 0.99 * xi + 0.001 * xi * xi).collect();
        let coeffs = fit_parabola(&x, &y);

        for (&xi, &yi) in x.iter().zip(&y) {
            let fitted = coeffs[0] + xi * (coeffs[1] + xi * coeffs[2]);
            assert!((fitted - yi).abs() < 0.01, "residual at {xi}");
        }
    }
}
