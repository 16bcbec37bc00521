//! Растяжение спектрограммы во времени (phase vocoder) и приведение длины.
//!
//! Используется не для изменения темпа, а чтобы любой клип давал
//! одинаковое число фреймов.

use birdclef_core::Spectrogram;
use rustfft::num_complex::Complex;
use std::f32::consts::PI;

/// Ожидаемое приращение фазы на бин: `linspace(0, π·hop, n_freq)`.
pub fn phase_advance(n_freq: usize, hop_length: usize) -> Vec<f32> {
    let end = PI * hop_length as f32;
    match n_freq {
        0 => Vec::new(),
        1 => vec![0.0],
        n => (0..n).map(|i| end * i as f32 / (n - 1) as f32).collect(),
    }
}

/// Number of output frames for `frames` input frames at `rate`.
pub fn stretched_len(frames: usize, rate: f64) -> usize {
    (frames as f64 / rate).ceil() as usize
}

/// Phase vocoder over a complex spectrogram `[bin][frame]`.
///
/// `rate > 1` shortens, `rate < 1` lengthens; output has
/// `ceil(frames / rate)` frames.
pub fn phase_vocoder(
    spec: &[Vec<Complex<f32>>],
    rate: f64,
    phase_advance: &[f32],
) -> Vec<Vec<Complex<f32>>> {
    if rate == 1.0 {
        return spec.to_vec();
    }

    let two_pi = 2.0 * PI;

    spec.iter()
        .zip(phase_advance.iter())
        .map(|(row, &advance)| {
            let frames = row.len();
            if frames == 0 {
                return Vec::new();
            }
            let out_len = stretched_len(frames, rate);

            // Два нулевых фрейма в конце, чтобы idx + 1 не выходил за границы.
            let padded: Vec<Complex<f32>> = row
                .iter()
                .copied()
                .chain(std::iter::repeat(Complex::new(0.0, 0.0)).take(2))
                .collect();

            let mut phase_acc = row[0].arg();
            let mut out = Vec::with_capacity(out_len);
            for i in 0..out_len {
                let t = i as f64 * rate;
                let idx = t.floor() as usize;
                let alpha = (t - t.floor()) as f32;

                let c0 = padded[idx.min(padded.len() - 2)];
                let c1 = padded[(idx + 1).min(padded.len() - 1)];

                let mag = alpha * c1.norm() + (1.0 - alpha) * c0.norm();
                out.push(Complex::from_polar(mag, phase_acc));

                let mut dphase = c1.arg() - c0.arg() - advance;
                dphase -= two_pi * (dphase / two_pi).round_ties_even();
                phase_acc += dphase + advance;
            }
            out
        })
        .collect()
}

/// Растянуть вещественную спектрограмму и взять вещественную часть результата.
pub fn stretch_real(spec: &Spectrogram, rate: f64, hop_length: usize) -> Spectrogram {
    let advance = phase_advance(spec.num_bins(), hop_length);
    let complex: Vec<Vec<Complex<f32>>> = spec
        .data
        .iter()
        .map(|row| row.iter().map(|&v| Complex::new(v, 0.0)).collect())
        .collect();

    let stretched = phase_vocoder(&complex, rate, &advance);
    Spectrogram::new(
        stretched
            .into_iter()
            .map(|row| row.into_iter().map(|c| c.re).collect())
            .collect(),
    )
}

/// Crop or zero-pad every row to exactly `target` frames.
pub fn fit_frames(mut spec: Spectrogram, target: usize) -> Spectrogram {
    for row in spec.data.iter_mut() {
        row.resize(target, 0.0);
    }
    spec
}

/// Привести спектрограмму к `target` фреймам.
///
/// Короче цели — растягиваем с rate `actual / target` (< 1), длиннее —
/// сжимаем с тем же отношением (> 1); затем обрезаем/дополняем до `target`.
/// Ровно `target` фреймов возвращается без изменений.
pub fn regularize_length(spec: Spectrogram, target: usize, hop_length: usize) -> Spectrogram {
    let actual = spec.num_frames();
    if actual == target {
        return spec;
    }
    if actual == 0 {
        return Spectrogram::zeros(spec.num_bins(), target);
    }

    let rate = actual as f64 / target as f64;
    let stretched = stretch_real(&spec, rate, hop_length);
    fit_frames(stretched, target)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_advance_endpoints() {
        let adv = phase_advance(128, 1024);
        assert_eq!(adv.len(), 128);
        assert_eq!(adv[0], 0.0);
        assert!((adv[127] - PI * 1024.0).abs() < 1e-2);
    }

    #[test]
    fn test_stretched_len() {
        // Погрешность деления может дать лишний фрейм, его срезает fit_frames.
        assert!((157..=158).contains(&stretched_len(100, 100.0 / 157.0)));
        assert!((157..=158).contains(&stretched_len(227, 227.0 / 157.0)));
        assert_eq!(stretched_len(10, 0.5), 20);
    }

    #[test]
    fn test_rate_one_is_identity() {
        let spec = vec![vec![Complex::new(1.0, 2.0), Complex::new(-3.0, 0.5)]];
        let out = phase_vocoder(&spec, 1.0, &[0.0]);
        assert_eq!(out, spec);
    }

    #[test]
    fn test_constant_magnitude_is_preserved() {
        // Положительная константа: фаза 0, модуль интерполируется без изменений.
        let spec = Spectrogram::new(vec![vec![2.0; 10]; 3]);
        let out = stretch_real(&spec, 0.5, 1);
        assert_eq!(out.num_frames(), 20);
        for row in &out.data[..1] {
            // Бин 0 имеет нулевое приращение фазы.
            for &v in &row[..18] {
                assert!((v - 2.0).abs() < 1e-4, "{}", v);
            }
        }
    }

    #[test]
    fn test_regularize_lengthens_short_input() {
        let spec = Spectrogram::new(vec![vec![-40.0; 100]; 128]);
        let out = regularize_length(spec, 157, 1024);
        assert_eq!(out.num_bins(), 128);
        assert_eq!(out.num_frames(), 157);
    }

    #[test]
    fn test_regularize_shortens_long_input() {
        let spec = Spectrogram::new(vec![vec![-40.0; 227]; 128]);
        let out = regularize_length(spec, 157, 1024);
        assert_eq!(out.num_frames(), 157);
    }

    #[test]
    fn test_shortening_compresses_whole_clip() {
        // Бин 0: нулевое приращение фазы, вещественная часть = интерполированный модуль.
        let ramp: Vec<f32> = (0..314).map(|i| i as f32).collect();
        let out = regularize_length(Spectrogram::new(vec![ramp]), 157, 1024);
        assert_eq!(out.num_frames(), 157);

        let row = &out.data[0];
        // Обрезка без сжатия дала бы ~156 в последнем фрейме.
        assert!(row[156] > 300.0, "last frame {}", row[156]);
        assert!((row[78] - 156.0).abs() < 2.0, "middle frame {}", row[78]);
        assert!(row.windows(2).all(|w| w[1] >= w[0]));
    }

    #[test]
    fn test_regularize_exact_is_untouched() {
        let spec = Spectrogram::new(vec![(0..157).map(|i| i as f32).collect(); 4]);
        let out = regularize_length(spec.clone(), 157, 1024);
        assert_eq!(out, spec);
    }

    #[test]
    fn test_regularize_empty_gives_zeros() {
        let spec = Spectrogram::new(vec![Vec::new(); 4]);
        let out = regularize_length(spec, 157, 1024);
        assert_eq!(out.num_bins(), 4);
        assert_eq!(out.num_frames(), 157);
    }
}
