//! Radix-2 FFT with a precomputed plan.

use std::f64::consts::PI;

/// Precomputed bit-reversal table and twiddle factors for one FFT size.
pub struct Plan {
    n: usize,
    rev: Vec<usize>,
    cos: Vec<f64>,
    sin: Vec<f64>,
}

impl Plan {
    /// Creates a plan for `n` points. `n` must be a power of two.
    pub fn new(n: usize) -> Self {
        assert!(n.is_power_of_two(), "fft size must be a power of two, got {n}");
        let bits = n.trailing_zeros();
        let rev = (0..n)
            .map(|i| if bits == 0 { 0 } else { i.reverse_bits() >> (usize::BITS - bits) })
            .collect();
        let (cos, sin) = (0..n / 2)
            .map(|k| {
                let angle = -2.0 * PI * k as f64 / n as f64;
                (angle.cos(), angle.sin())
            })
            .unzip();
        Self { n, rev, cos, sin }
    }

    /// Returns the transform size.
    pub fn len(&self) -> usize {
        self.n
    }

    /// Transforms `real`/`imag` in place. Both must have `self.len()` elements.
    pub fn forward(&self, real: &mut [f64], imag: &mut [f64]) {
        debug_assert_eq!(real.len(), self.n);
        debug_assert_eq!(imag.len(), self.n);

        for i in 0..self.n {
            let j = self.rev[i];
            if i < j {
                real.swap(i, j);
                imag.swap(i, j);
            }
        }

        let mut size = 2;
        while size <= self.n {
            let half = size / 2;
            let stride = self.n / size;
            for start in (0..self.n).step_by(size) {
                for k in 0..half {
                    let (w_r, w_i) = (self.cos[k * stride], self.sin[k * stride]);
                    let u = start + k;
                    let v = u + half;
                    let t_r = w_r * real[v] - w_i * imag[v];
                    let t_i = w_r * imag[v] + w_i * real[v];
                    real[v] = real[u] - t_r;
                    imag[v] = imag[u] - t_i;
                    real[u] += t_r;
                    imag[u] += t_i;
                }
            }
            size *= 2;
        }
    }

    /// Writes `|X[k]|^2` for `k in 0..=n/2` into `power`.
    pub fn power_spectrum(&self, real: &[f64], imag: &[f64], power: &mut [f64]) {
        for (k, p) in power.iter_mut().enumerate().take(self.n / 2 + 1) {
            *p = real[k] * real[k] + imag[k] * imag[k];
        }
    }
}
