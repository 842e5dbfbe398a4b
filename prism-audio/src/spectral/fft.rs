//! In-place radix-2 FFT for the fixed STFT frame sizes.
//!
//! Only power-of-two lengths are supported; every caller sizes its frames
//! from [`Quality`](super::Quality), so the length check is a debug assertion.
//! Twiddles are generated per butterfly stage, which keeps the transform free
//! of tables and allocations.

use std::f64::consts::PI;

/// Complex number for FFT operations (SIMD-friendly layout)
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[repr(C)]
pub struct Complex {
    pub re: f32,
    pub im: f32,
}

impl Complex {
    pub const ZERO: Complex = Complex::new(0.0, 0.0);

    #[inline(always)]
    pub const fn new(re: f32, im: f32) -> Self {
        Self { re, im }
    }

    #[inline(always)]
    pub fn from_polar(mag: f32, phase: f32) -> Self {
        let (sin, cos) = phase.sin_cos();
        Self {
            re: mag * cos,
            im: mag * sin,
        }
    }

    #[inline(always)]
    pub fn magnitude(self) -> f32 {
        (self.re * self.re + self.im * self.im).sqrt()
    }

    #[inline(always)]
    pub fn phase(self) -> f32 {
        self.im.atan2(self.re)
    }

    #[inline(always)]
    pub fn mul(self, other: Self) -> Self {
        Self {
            re: self.re * other.re - self.im * other.im,
            im: self.re * other.im + self.im * other.re,
        }
    }

    #[inline(always)]
    pub fn add(self, other: Self) -> Self {
        Self {
            re: self.re + other.re,
            im: self.im + other.im,
        }
    }

    #[inline(always)]
    pub fn sub(self, other: Self) -> Self {
        Self {
            re: self.re - other.re,
            im: self.im - other.im,
        }
    }

    #[inline(always)]
    pub fn scale(self, s: f32) -> Self {
        Self {
            re: self.re * s,
            im: self.im * s,
        }
    }

    #[inline(always)]
    pub fn conj(self) -> Self {
        Self {
            re: self.re,
            im: -self.im,
        }
    }

    #[inline(always)]
    pub fn is_finite(self) -> bool {
        self.re.is_finite() && self.im.is_finite()
    }
}

/// In-place Cooley-Tukey FFT.
///
/// `inverse` selects the inverse transform, which also divides every output
/// by `data.len()`, so `fft(x, true)` undoes `fft(x, false)`.
pub fn fft(data: &mut [Complex], inverse: bool) {
    let n = data.len();
    debug_assert!(n.is_power_of_two(), "FFT length {} is not a power of two", n);
    if n < 2 {
        return;
    }

    // Bit-reversal permutation
    let shift = usize::BITS - n.trailing_zeros();
    for i in 0..n {
        let j = i.reverse_bits() >> shift;
        if i < j {
            data.swap(i, j);
        }
    }

    // Butterfly passes
    let sign = if inverse { 1.0 } else { -1.0 };
    let mut len = 2;
    while len <= n {
        let half = len / 2;
        let theta = sign * 2.0 * PI / len as f64;

        for j in 0..half {
            let (sin, cos) = (theta * j as f64).sin_cos();
            let w = Complex::new(cos as f32, sin as f32);

            let mut start = 0;
            while start < n {
                let a = start + j;
                let b = a + half;
                let t = data[b].mul(w);
                data[b] = data[a].sub(t);
                data[a] = data[a].add(t);
                start += len;
            }
        }
        len <<= 1;
    }

    if inverse {
        let norm = 1.0 / n as f32;
        for x in data.iter_mut() {
            *x = x.scale(norm);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::Xorshift64;

    fn random_frame(n: usize, seed: u64) -> Vec<Complex> {
        let mut rng = Xorshift64::new(seed);
        (0..n)
            .map(|_| Complex::new(rng.next_bipolar(), rng.next_bipolar()))
            .collect()
    }

    #[test]
    fn test_fft_roundtrip_all_sizes() {
        for &n in &[2usize, 8, 64, 1024, 2048, 4096, 8192] {
            let original = random_frame(n, n as u64);
            let mut data = original.clone();

            fft(&mut data, false);
            fft(&mut data, true);

            let max_err = original
                .iter()
                .zip(&data)
                .map(|(a, b)| a.sub(*b).magnitude())
                .fold(0.0f32, f32::max);
            assert!(max_err < 1e-4, "n={} max error {}", n, max_err);
        }
    }

    #[test]
    fn test_fft_matches_rustfft() {
        use rustfft::{num_complex::Complex as RefComplex, FftPlanner};

        let n = 2048;
        let mut data = random_frame(n, 7);
        let mut reference: Vec<RefComplex<f32>> =
            data.iter().map(|c| RefComplex::new(c.re, c.im)).collect();

        fft(&mut data, false);
        FftPlanner::new().plan_fft_forward(n).process(&mut reference);

        for (ours, theirs) in data.iter().zip(&reference) {
            assert!((ours.re - theirs.re).abs() < 1e-2, "{} vs {}", ours.re, theirs.re);
            assert!((ours.im - theirs.im).abs() < 1e-2, "{} vs {}", ours.im, theirs.im);
        }
    }

    #[test]
    fn test_fft_impulse_is_flat() {
        let mut data = vec![Complex::ZERO; 16];
        data[0] = Complex::new(1.0, 0.0);
        fft(&mut data, false);
        for bin in &data {
            assert!((bin.re - 1.0).abs() < 1e-6);
            assert!(bin.im.abs() < 1e-6);
        }
    }

    #[test]
    fn test_fft_sine_peak_bin() {
        let n = 1024;
        let bin = 37;
        let mut data: Vec<Complex> = (0..n)
            .map(|i| {
                let x = 2.0 * std::f32::consts::PI * bin as f32 * i as f32 / n as f32;
                Complex::new(x.cos(), 0.0)
            })
            .collect();
        fft(&mut data, false);

        let peak = (0..n / 2)
            .max_by(|&a, &b| data[a].magnitude().total_cmp(&data[b].magnitude()))
            .unwrap();
        assert_eq!(peak, bin);
        assert!((data[bin].magnitude() - n as f32 / 2.0).abs() < 0.1);
    }
}
