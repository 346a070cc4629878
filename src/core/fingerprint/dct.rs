//! Orthonormal 2-D DCT-II restricted to the low-frequency corner.
//!
//! Only the `k x k` lowest-frequency coefficients are evaluated, as two
//! separable 1-D passes with a precomputed cosine table.

use std::f64::consts::{FRAC_1_SQRT_2, PI};

/// Low-frequency DCT-II of a row-major `n x n` matrix.
///
/// Returns `k * k` coefficients in row-major order, where the row index is
/// the vertical frequency. Scaling is `2 * c(u) * c(v) / n` with
/// `c(0) = 1/sqrt(2)` and `c(k) = 1` otherwise, matching the orthonormal
/// transform.
pub fn dct2_low_frequency(input: &[f64], n: usize, k: usize) -> Vec<f64> {
    debug_assert_eq!(input.len(), n * n);
    debug_assert!(k <= n);

    let cosines = cosine_table(n, k);

    // Horizontal pass: rows[y * k + u] = sum_x f(x, y) cos(...)
    let mut rows = vec![0.0f64; n * k];
    for y in 0..n {
        let row = &input[y * n..(y + 1) * n];
        for u in 0..k {
            let basis = &cosines[u * n..(u + 1) * n];
            rows[y * k + u] = row.iter().zip(basis).map(|(f, c)| f * c).sum();
        }
    }

    // Vertical pass
    let scale = 2.0 / n as f64;
    let mut out = vec![0.0f64; k * k];
    for v in 0..k {
        let basis = &cosines[v * n..(v + 1) * n];
        for u in 0..k {
            let sum: f64 = (0..n).map(|y| rows[y * k + u] * basis[y]).sum();
            out[v * k + u] = scale * weight(u) * weight(v) * sum;
        }
    }

    out
}

fn weight(index: usize) -> f64 {
    if index == 0 {
        FRAC_1_SQRT_2
    } else {
        1.0
    }
}

/// `table[f * n + x] = cos((2x + 1) f pi / 2n)`
fn cosine_table(n: usize, k: usize) -> Vec<f64> {
    let mut table = Vec::with_capacity(n * k);
    for f in 0..k {
        for x in 0..n {
            table.push(((2 * x + 1) as f64 * f as f64 * PI / (2 * n) as f64).cos());
        }
    }
    table
}
