//! Small in-place radix-2 FFT for the spectral features.
//!
//! Only power-of-two sizes are supported; the analysis frame size is fixed.

use std::f32::consts::PI;

/// Precomputed twiddles and bit-reversal table for one transform size.
#[derive(Debug, Clone)]
pub struct Fft {
    size: usize,
    cos: Vec<f32>,
    sin: Vec<f32>,
    reversed: Vec<usize>,
}

impl Fft {
    /// Plan a transform of `size` points.
    ///
    /// # Panics
    ///
    /// Panics if `size` is not a power of two.
    #[must_use]
    pub fn new(size: usize) -> Self {
        assert!(size.is_power_of_two(), "FFT size must be a power of two, got {size}");
        let half = size / 2;
        let cos = (0..half).map(|k| (2.0 * PI * k as f32 / size as f32).cos()).collect();
        let sin = (0..half).map(|k| -(2.0 * PI * k as f32 / size as f32).sin()).collect();
        let bits = size.trailing_zeros();
        let reversed = (0..size)
            .map(|i| if bits == 0 { 0 } else { i.reverse_bits() >> (usize::BITS - bits) })
            .collect();
        Self {
            size,
            cos,
            sin,
            reversed,
        }
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Forward transform of (`re`, `im`) in place.
    pub fn process(&self, re: &mut [f32], im: &mut [f32]) {
        debug_assert_eq!(re.len(), self.size);
        debug_assert_eq!(im.len(), self.size);

        for i in 0..self.size {
            let j = self.reversed[i];
            if i < j {
                re.swap(i, j);
                im.swap(i, j);
            }
        }

        let mut len = 2;
        while len <= self.size {
            let half = len / 2;
            let stride = self.size / len;
            for start in (0..self.size).step_by(len) {
                for k in 0..half {
                    let (wr, wi) = (self.cos[k * stride], self.sin[k * stride]);
                    let (a, b) = (start + k, start + k + half);
                    let tr = re[b] * wr - im[b] * wi;
                    let ti = re[b] * wi + im[b] * wr;
                    re[b] = re[a] - tr;
                    im[b] = im[a] - ti;
                    re[a] += tr;
                    im[a] += ti;
                }
            }
            len *= 2;
        }
    }

    /// Power spectrum (`|X[k]|^2`, bins `0..=size/2`) of a real frame.
    #[must_use]
    pub fn power_spectrum(&self, frame: &[f32]) -> Vec<f32> {
        let mut re = frame.to_vec();
        re.resize(self.size, 0.0);
        let mut im = vec![0.0; self.size];
        self.process(&mut re, &mut im);
        (0..=self.size / 2).map(|k| re[k] * re[k] + im[k] * im[k]).collect()
    }
}

/// Periodic Hann window of `size` points.
#[must_use]
pub fn hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|n| 0.5 - 0.5 * (2.0 * PI * n as f32 / size as f32).cos())
        .collect()
}
