//! Centered short-time Fourier transform and its inverse.
//!
//! Совместимо с `torch.stft(center=True, pad_mode="reflect")`: сигнал
//! дополняется отражением на `n_fft / 2` с каждой стороны, что дает
//! `len / hop + 1` фреймов.

use rustfft::{num_complex::Complex, FftPlanner};
use std::f32::consts::PI;

/// Create Hann window (periodic for STFT).
pub fn hann_window(length: usize) -> Vec<f32> {
    (0..length)
        .map(|n| 0.5 * (1.0 - (2.0 * PI * n as f32 / length as f32).cos()))
        .collect()
}

/// Индекс с отражением от границ (`reflect`, без повтора крайнего сэмпла).
///
/// Для сигналов короче паддинга отражение повторяется периодически.
fn reflect_index(idx: isize, n: isize) -> Option<usize> {
    if n <= 0 {
        return None;
    }
    if n == 1 {
        return Some(0);
    }
    let period = 2 * (n - 1);
    let mut i = idx.rem_euclid(period);
    if i >= n {
        i = period - i;
    }
    Some(i as usize)
}

/// Number of frames produced by [`stft`] for a signal of `len` samples.
pub fn num_frames(len: usize, hop_length: usize) -> usize {
    len / hop_length + 1
}

/// Complex STFT, layout `[frame][freq]` with `n_fft / 2 + 1` one-sided bins.
pub fn stft(
    samples: &[f32],
    n_fft: usize,
    hop_length: usize,
    window: &[f32],
) -> Vec<Vec<Complex<f32>>> {
    let num_frames = num_frames(samples.len(), hop_length);
    let pad = (n_fft / 2) as isize;
    let n = samples.len() as isize;

    let mut planner = FftPlanner::<f32>::new();
    let fft = planner.plan_fft_forward(n_fft);

    let mut frames = Vec::with_capacity(num_frames);
    for frame_idx in 0..num_frames {
        // center=True: окно центрируется на позиции frame_idx * hop_length
        let start = frame_idx as isize * hop_length as isize - pad;

        let mut buffer: Vec<Complex<f32>> = (0..n_fft)
            .map(|i| {
                let sample = reflect_index(start + i as isize, n)
                    .map_or(0.0, |idx| samples[idx] * window[i]);
                Complex::new(sample, 0.0)
            })
            .collect();

        fft.process(&mut buffer);
        buffer.truncate(n_fft / 2 + 1);
        frames.push(buffer);
    }

    frames
}

/// Power-like spectrum `|X|^power` for every frame, layout `[frame][freq]`.
pub fn magnitude_pow(frames: &[Vec<Complex<f32>>], power: f32) -> Vec<Vec<f32>> {
    let half = power / 2.0;
    frames
        .iter()
        .map(|frame| {
            frame
                .iter()
                .map(|c| {
                    let sq = c.re * c.re + c.im * c.im;
                    if power == 2.0 {
                        sq
                    } else if power == 1.0 {
                        sq.sqrt()
                    } else {
                        sq.powf(half)
                    }
                })
                .collect()
        })
        .collect()
}

/// Inverse of [`stft`] by windowed overlap-add.
///
/// `length` — желаемая длина результата; по умолчанию `hop * (frames - 1)`.
pub fn istft(
    frames: &[Vec<Complex<f32>>],
    n_fft: usize,
    hop_length: usize,
    window: &[f32],
    length: Option<usize>,
) -> Vec<f32> {
    let num_frames = frames.len();
    let out_len = length.unwrap_or(hop_length * num_frames.saturating_sub(1));
    if num_frames == 0 {
        return vec![0.0; out_len];
    }

    let mut planner = FftPlanner::<f32>::new();
    let ifft = planner.plan_fft_inverse(n_fft);

    let total = n_fft + hop_length * (num_frames - 1);
    let mut signal = vec![0.0_f32; total];
    let mut window_sum = vec![0.0_f32; total];
    let n_bins = n_fft / 2 + 1;
    let scale = 1.0 / n_fft as f32;

    for (t, frame) in frames.iter().enumerate() {
        // Восстанавливаем полный спектр по эрмитовой симметрии.
        let mut buffer = vec![Complex::new(0.0_f32, 0.0); n_fft];
        for k in 0..n_bins.min(frame.len()) {
            buffer[k] = frame[k];
        }
        buffer[0].im = 0.0;
        if n_fft % 2 == 0 {
            buffer[n_fft / 2].im = 0.0;
        }
        for k in 1..n_bins {
            let mirror = n_fft - k;
            if mirror > k {
                buffer[mirror] = buffer[k].conj();
            }
        }

        ifft.process(&mut buffer);

        let start = t * hop_length;
        for i in 0..n_fft {
            signal[start + i] += buffer[i].re * scale * window[i];
            window_sum[start + i] += window[i] * window[i];
        }
    }

    for (s, w) in signal.iter_mut().zip(window_sum.iter()) {
        if *w > 1e-11 {
            *s /= *w;
        }
    }

    let pad = n_fft / 2;
    let mut out: Vec<f32> = signal.into_iter().skip(pad).take(out_len).collect();
    out.resize(out_len, 0.0);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hann_window() {
        let window = hann_window(400);
        assert_eq!(window.len(), 400);
        assert!(window[0].abs() < 1e-6); // Should start at 0
        assert!((window[200] - 1.0).abs() < 0.01); // Peak near center
    }

    #[test]
    fn test_reflect_index() {
        // [a b c d] -> pad 2: c b | a b c d | c b
        assert_eq!(reflect_index(-1, 4), Some(1));
        assert_eq!(reflect_index(-2, 4), Some(2));
        assert_eq!(reflect_index(4, 4), Some(2));
        assert_eq!(reflect_index(5, 4), Some(1));
        assert_eq!(reflect_index(3, 1), Some(0));
        assert_eq!(reflect_index(0, 0), None);
    }

    #[test]
    fn test_frame_count() {
        let samples = vec![0.0; 160_000];
        let window = hann_window(2048);
        let frames = stft(&samples, 2048, 1024, &window);
        assert_eq!(frames.len(), 157);
        assert_eq!(frames[0].len(), 1025);
    }

    #[test]
    fn test_sine_peak_bin() {
        let sr = 8000.0;
        let n_fft = 256;
        let samples: Vec<f32> = (0..2048)
            .map(|i| (2.0 * PI * 1000.0 * i as f32 / sr).sin())
            .collect();
        let window = hann_window(n_fft);
        let frames = stft(&samples, n_fft, 64, &window);
        let power = magnitude_pow(&frames, 2.0);

        let mid = &power[power.len() / 2];
        let peak = mid
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(k, _)| k)
            .unwrap();
        // 1000 Hz * 256 / 8000 = bin 32
        assert_eq!(peak, 32);
    }

    #[test]
    fn test_istft_reconstructs_signal() {
        let n_fft = 512;
        let hop = 128;
        let samples: Vec<f32> = (0..4096)
            .map(|i| (i as f32 * 0.05).sin() * 0.5 + (i as f32 * 0.011).cos() * 0.25)
            .collect();
        let window = hann_window(n_fft);
        let frames = stft(&samples, n_fft, hop, &window);
        let rebuilt = istft(&frames, n_fft, hop, &window, Some(samples.len()));

        assert_eq!(rebuilt.len(), samples.len());
        let max_err = samples
            .iter()
            .zip(rebuilt.iter())
            .map(|(a, b)| (a - b).abs())
            .fold(0.0_f32, f32::max);
        assert!(max_err < 1e-3, "max error {}", max_err);
    }
}
