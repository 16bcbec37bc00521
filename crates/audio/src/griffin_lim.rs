//! Griffin-Lim phase retrieval.

use birdclef_core::{GriffinLimConfig, Spectrogram};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rustfft::num_complex::Complex;
use std::f32::consts::PI;

use crate::stft::{hann_window, istft, stft};

/// Reconstructs a waveform from a magnitude-like spectrogram.
#[derive(Debug, Clone)]
pub struct GriffinLim {
    n_fft: usize,
    hop_length: usize,
    /// Показатель степени входной спектрограммы (`|X|^power`).
    power: f32,
    window: Vec<f32>,
    config: GriffinLimConfig,
}

impl GriffinLim {
    pub fn new(n_fft: usize, hop_length: usize, power: f32, config: GriffinLimConfig) -> Self {
        Self {
            n_fft,
            hop_length,
            power,
            window: hann_window(n_fft),
            config,
        }
    }

    /// Восстановить сигнал по спектрограмме `[freq][frame]` со значениями `|X|^power`.
    ///
    /// Длина результата — `hop * (frames - 1)`.
    pub fn reconstruct(&self, spec: &Spectrogram) -> Vec<f32> {
        let n_frames = spec.num_frames();
        let n_bins = spec.num_bins();
        let inv_power = 1.0 / self.power;

        // Модуль в раскладке [frame][freq], как у stft().
        let magnitude: Vec<Vec<f32>> = (0..n_frames)
            .map(|t| {
                spec.data
                    .iter()
                    .map(|row| row[t].max(0.0).powf(inv_power))
                    .collect()
            })
            .collect();

        let mut angles: Vec<Vec<Complex<f32>>> = match self.config.seed {
            Some(seed) => {
                let mut rng = StdRng::seed_from_u64(seed);
                (0..n_frames)
                    .map(|_| {
                        (0..n_bins)
                            .map(|_| Complex::from_polar(1.0, 2.0 * PI * rng.gen::<f32>()))
                            .collect()
                    })
                    .collect()
            }
            None => vec![vec![Complex::new(1.0, 0.0); n_bins]; n_frames],
        };

        let length = self.hop_length * n_frames.saturating_sub(1);
        let momentum = self.config.momentum / (1.0 + self.config.momentum);
        let mut previous: Option<Vec<Vec<Complex<f32>>>> = None;

        for _ in 0..self.config.n_iter {
            let inverse = istft(
                &combine(&magnitude, &angles),
                self.n_fft,
                self.hop_length,
                &self.window,
                Some(length),
            );
            let rebuilt = stft(&inverse, self.n_fft, self.hop_length, &self.window);

            angles = rebuilt.clone();
            if let Some(prev) = &previous {
                for (a_row, p_row) in angles.iter_mut().zip(prev.iter()) {
                    for (a, p) in a_row.iter_mut().zip(p_row.iter()) {
                        *a -= *p * momentum;
                    }
                }
            }
            for row in angles.iter_mut() {
                for a in row.iter_mut() {
                    let norm = a.norm() + 1e-16;
                    *a /= norm;
                }
            }
            previous = Some(rebuilt);
        }

        istft(
            &combine(&magnitude, &angles),
            self.n_fft,
            self.hop_length,
            &self.window,
            Some(length),
        )
    }
}

fn combine(magnitude: &[Vec<f32>], angles: &[Vec<Complex<f32>>]) -> Vec<Vec<Complex<f32>>> {
    magnitude
        .iter()
        .zip(angles.iter())
        .map(|(m_row, a_row)| m_row.iter().zip(a_row.iter()).map(|(&m, &a)| a * m).collect())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stft::magnitude_pow;

    fn to_freq_major(frames: &[Vec<f32>]) -> Spectrogram {
        let bins = frames.first().map_or(0, Vec::len);
        Spectrogram::new(
            (0..bins)
                .map(|k| frames.iter().map(|f| f[k]).collect())
                .collect(),
        )
    }

    #[test]
    fn test_output_length() {
        let gl = GriffinLim::new(256, 64, 2.0, GriffinLimConfig { n_iter: 2, ..Default::default() });
        let spec = Spectrogram::zeros(129, 20);
        let wave = gl.reconstruct(&spec);
        assert_eq!(wave.len(), 64 * 19);
        assert!(wave.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_reconstruction_matches_magnitude() {
        let n_fft = 256;
        let hop = 64;
        let signal: Vec<f32> = (0..4096)
            .map(|i| (2.0 * PI * 500.0 * i as f32 / 8000.0).sin() * 0.5)
            .collect();
        let window = hann_window(n_fft);
        let target = magnitude_pow(&stft(&signal, n_fft, hop, &window), 2.0);

        let gl = GriffinLim::new(n_fft, hop, 2.0, GriffinLimConfig::default());
        let wave = gl.reconstruct(&to_freq_major(&target));
        let rebuilt = magnitude_pow(&stft(&wave, n_fft, hop, &window), 2.0);

        // Спектральная сходимость по модулю (фаза не обязана совпадать).
        let num: f32 = target
            .iter()
            .flatten()
            .zip(rebuilt.iter().flatten())
            .map(|(a, b)| (a.sqrt() - b.sqrt()).powi(2))
            .sum();
        let den: f32 = target.iter().flatten().sum();
        assert!(num / den < 0.1, "spectral convergence {}", num / den);
    }
}
