//! # Fast Fourier Transform (FFT) Module
//!
//! Autocorrelation through the power spectrum (Wiener–Khinchin).
//!
//! The pitch tracker needs the unnormalized autocorrelation of every frame
//! it analyses. Computed directly that is O(n²) per frame; through a
//! zero-padded FFT it is O(n log n) and equal up to float rounding.

use std::sync::Arc;

use rustfft::{Fft, FftPlanner, num_complex::Complex};

/// Direct-sum autocorrelation: `c[i] = Σ_j x[j]·x[j+i]` for every lag.
pub fn autocorrelate_direct(signal: &[f32]) -> Vec<f32> {
    let n = signal.len();
    (0..n)
        .map(|lag| {
            signal[..n - lag]
                .iter()
                .zip(&signal[lag..])
                .map(|(a, b)| a * b)
                .sum()
        })
        .collect()
}

/// Cached forward/inverse plans for FFT autocorrelation.
pub struct FftAutocorrelator {
    planner: FftPlanner<f32>,
    plans: Option<(usize, Arc<dyn Fft<f32>>, Arc<dyn Fft<f32>>)>,
}

impl std::fmt::Debug for FftAutocorrelator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FftAutocorrelator")
            .field("fft_len", &self.plans.as_ref().map(|p| p.0))
            .finish()
    }
}

impl Default for FftAutocorrelator {
    fn default() -> Self {
        Self::new()
    }
}

impl FftAutocorrelator {
    pub fn new() -> Self {
        Self {
            planner: FftPlanner::new(),
            plans: None,
        }
    }

    fn plans_for(&mut self, len: usize) -> (Arc<dyn Fft<f32>>, Arc<dyn Fft<f32>>) {
        if let Some((cached, forward, inverse)) = &self.plans {
            if *cached == len {
                return (forward.clone(), inverse.clone());
            }
        }
        let forward = self.planner.plan_fft_forward(len);
        let inverse = self.planner.plan_fft_inverse(len);
        self.plans = Some((len, forward.clone(), inverse.clone()));
        (forward, inverse)
    }

    /// Same result as [`autocorrelate_direct`], via the power spectrum.
    ///
    /// The signal is zero-padded to at least twice its length so the
    /// circular correlation does not wrap around.
    pub fn autocorrelate(&mut self, signal: &[f32]) -> Vec<f32> {
        let n = signal.len();
        if n == 0 {
            return Vec::new();
        }
        let fft_len = (2 * n).next_power_of_two();
        let (forward, inverse) = self.plans_for(fft_len);

        let mut buffer: Vec<Complex<f32>> = signal
            .iter()
            .map(|&sample| Complex { re: sample, im: 0.0 })
            .chain(std::iter::repeat(Complex { re: 0.0, im: 0.0 }))
            .take(fft_len)
            .collect();

        forward.process(&mut buffer);
        for bin in buffer.iter_mut() {
            *bin = Complex {
                re: bin.norm_sqr(),
                im: 0.0,
            };
        }
        inverse.process(&mut buffer);

        // rustfft does not normalize the inverse transform.
        let scale = 1.0 / fft_len as f32;
        buffer.iter().take(n).map(|c| c.re * scale).collect()
    }
}
