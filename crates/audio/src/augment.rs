//! Аугментации: гауссов шум с заданным SNR и частотная маска.

use birdclef_core::Spectrogram;
use rand::Rng;
use std::f32::consts::PI;
use std::ops::Range;

/// Стандартная нормальная величина (Box–Muller).
fn standard_normal<R: Rng + ?Sized>(rng: &mut R) -> f32 {
    // 1 - u: исключаем ln(0).
    let u1: f32 = 1.0 - rng.gen::<f32>();
    let u2: f32 = rng.gen::<f32>();
    (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
}

/// Add white Gaussian noise so that the result has the requested SNR (dB).
///
/// Scale follows `torchaudio.functional.add_noise`: the noise is rescaled so
/// that `10 * log10(E_signal / E_noise) == snr_db`. Silent input stays silent.
pub fn add_noise<R: Rng + ?Sized>(samples: &mut [f32], snr_db: f32, rng: &mut R) {
    if samples.is_empty() {
        return;
    }
    let noise: Vec<f32> = (0..samples.len()).map(|_| standard_normal(rng)).collect();

    let signal_energy: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
    let noise_energy: f64 = noise.iter().map(|&n| (n as f64) * (n as f64)).sum();
    if signal_energy == 0.0 || noise_energy == 0.0 {
        return;
    }

    let scale = (signal_energy / noise_energy).sqrt() * 10f64.powf(-snr_db as f64 / 20.0);
    for (s, n) in samples.iter_mut().zip(noise.iter()) {
        *s += (scale * *n as f64) as f32;
    }
}

/// Zero a random contiguous band of bins (`FrequencyMasking`).
///
/// Band width is `floor(u * mask_param)`, start is `floor(v * (bins - width))`.
/// Returns the masked range.
pub fn frequency_mask<R: Rng + ?Sized>(
    spec: &mut Spectrogram,
    mask_param: usize,
    rng: &mut R,
) -> Range<usize> {
    let bins = spec.num_bins();
    let max_width = mask_param.min(bins) as f64;

    let value = rng.gen::<f64>() * max_width;
    let min_value = rng.gen::<f64>() * (bins as f64 - value);
    let start = min_value as usize;
    let end = (start + value as usize).min(bins);

    for row in &mut spec.data[start..end] {
        row.iter_mut().for_each(|v| *v = 0.0);
    }
    start..end
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_noise_hits_target_snr() {
        let mut rng = StdRng::seed_from_u64(7);
        let clean: Vec<f32> = (0..32000).map(|i| (i as f32 * 0.03).sin()).collect();
        let mut noisy = clean.clone();
        add_noise(&mut noisy, 10.0, &mut rng);

        let signal: f64 = clean.iter().map(|&s| (s as f64).powi(2)).sum();
        let noise: f64 = clean
            .iter()
            .zip(noisy.iter())
            .map(|(c, n)| ((n - c) as f64).powi(2))
            .sum();
        let snr = 10.0 * (signal / noise).log10();
        assert!((snr - 10.0).abs() < 0.01, "snr = {}", snr);
    }

    #[test]
    fn test_noise_keeps_silence() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut silent = vec![0.0_f32; 100];
        add_noise(&mut silent, 10.0, &mut rng);
        assert!(silent.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_standard_normal_moments() {
        let mut rng = StdRng::seed_from_u64(42);
        let n = 20000;
        let xs: Vec<f32> = (0..n).map(|_| standard_normal(&mut rng)).collect();
        let mean = xs.iter().sum::<f32>() / n as f32;
        let var = xs.iter().map(|x| (x - mean).powi(2)).sum::<f32>() / n as f32;
        assert!(mean.abs() < 0.05);
        assert!((var - 1.0).abs() < 0.05);
    }

    #[test]
    fn test_frequency_mask_band() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..50 {
            let mut spec = Spectrogram::new(vec![vec![1.0; 5]; 128]);
            let band = frequency_mask(&mut spec, 40, &mut rng);
            assert!(band.end <= 128);
            assert!(band.len() < 40);
            for (bin, row) in spec.data.iter().enumerate() {
                let expected = if band.contains(&bin) { 0.0 } else { 1.0 };
                assert!(row.iter().all(|&v| v == expected));
            }
        }
    }

    #[test]
    fn test_frequency_mask_wider_than_spectrogram() {
        let mut rng = StdRng::seed_from_u64(9);
        let mut spec = Spectrogram::new(vec![vec![1.0; 3]; 8]);
        let band = frequency_mask(&mut spec, 40, &mut rng);
        assert!(band.end <= 8);
    }
}
