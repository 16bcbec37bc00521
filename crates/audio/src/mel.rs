//! Mel-спектрограмма, совместимая с `torchaudio.transforms.MelSpectrogram`.
//!
//! - STFT с center=true, reflect-паддинг, периодическое окно Hann
//! - амплитудный спектр в степени `power` (8.0 для BirdCLEF)
//! - HTK или Slaney шкала, опциональная Slaney-нормализация площади
//!
//! Здесь же живут перевод в децибелы и обращение mel-фильтров для
//! диагностической реконструкции.

use birdclef_core::{FeatureConfig, MelNorm, MelScale, Spectrogram};
use tracing::warn;

use crate::stft::{hann_window, magnitude_pow, stft};

/// Нижняя граница мощности перед логарифмом.
pub const DB_AMIN: f32 = 1e-10;

/// Один треугольный фильтр, хранятся только ненулевые веса.
#[derive(Debug, Clone)]
struct SparseFilter {
    start: usize,
    weights: Vec<f32>,
}

/// Mel filterbank mapping `n_freqs` linear bins onto `n_mels` mel bins.
#[derive(Debug, Clone)]
pub struct MelFilterbank {
    n_freqs: usize,
    filters: Vec<SparseFilter>,
}

impl MelFilterbank {
    /// Построить фильтры как `torchaudio.functional.melscale_fbanks`.
    pub fn new(
        n_mels: usize,
        n_fft: usize,
        sample_rate: f32,
        f_min: f32,
        f_max: f32,
        scale: MelScale,
        norm: MelNorm,
    ) -> Self {
        let dense = create_mel_filterbank(n_mels, n_fft, sample_rate, f_min, f_max, scale, norm);
        Self::from_dense(&dense)
    }

    /// Filters for a feature config.
    pub fn from_config(config: &FeatureConfig) -> Self {
        Self::new(
            config.n_mels,
            config.n_fft,
            config.sample_rate as f32,
            config.f_min,
            config.f_max,
            config.mel_scale,
            config.mel_norm,
        )
    }

    fn from_dense(dense: &[Vec<f32>]) -> Self {
        let n_freqs = dense.first().map_or(0, Vec::len);
        let mut empty = 0;
        let filters = dense
            .iter()
            .map(|row| {
                let first = row.iter().position(|&w| w > 0.0);
                let last = row.iter().rposition(|&w| w > 0.0);
                match (first, last) {
                    (Some(s), Some(e)) => SparseFilter {
                        start: s,
                        weights: row[s..=e].to_vec(),
                    },
                    _ => {
                        empty += 1;
                        SparseFilter {
                            start: 0,
                            weights: Vec::new(),
                        }
                    }
                }
            })
            .collect();

        if empty > 0 {
            warn!(
                "{} mel filters have all-zero weights; n_mels may be too high for n_fft",
                empty
            );
        }

        Self { n_freqs, filters }
    }

    pub fn n_mels(&self) -> usize {
        self.filters.len()
    }

    pub fn n_freqs(&self) -> usize {
        self.n_freqs
    }

    /// Dense weights `[n_mels][n_freqs]`.
    pub fn to_dense(&self) -> Vec<Vec<f32>> {
        self.filters
            .iter()
            .map(|f| {
                let mut row = vec![0.0; self.n_freqs];
                row[f.start..f.start + f.weights.len()].copy_from_slice(&f.weights);
                row
            })
            .collect()
    }

    /// Применить фильтры к спектру `[frame][freq]`, результат `[mel][frame]`.
    pub fn apply(&self, spectrum: &[Vec<f32>]) -> Spectrogram {
        let data = self
            .filters
            .iter()
            .map(|filter| {
                spectrum
                    .iter()
                    .map(|frame| {
                        frame[filter.start..]
                            .iter()
                            .zip(filter.weights.iter())
                            .map(|(s, w)| s * w)
                            .sum::<f32>()
                    })
                    .collect()
            })
            .collect();
        Spectrogram::new(data)
    }

    /// Approximate inverse: non-negative least squares `min ||F·S - M||`, `S >= 0`.
    ///
    /// Решается проективным градиентом с шагом `1 / ||F||²`. Результат —
    /// линейная спектрограмма `[freq][frame]`.
    pub fn inverse(&self, mel: &Spectrogram, n_iter: usize) -> Spectrogram {
        let n_frames = mel.num_frames();
        let n_freqs = self.n_freqs;
        if n_frames == 0 || n_freqs == 0 {
            return Spectrogram::zeros(n_freqs, n_frames);
        }

        let lipschitz = self.spectral_norm_sq();
        if lipschitz <= 0.0 {
            return Spectrogram::zeros(n_freqs, n_frames);
        }
        let step = 1.0 / lipschitz;

        let target: Vec<Vec<f64>> = mel
            .data
            .iter()
            .map(|row| row.iter().map(|&v| v as f64).collect())
            .collect();

        // S_0 = max(0, Fᵀ M) / L
        let mut s = self.transpose_apply(&target, n_frames);
        for row in s.iter_mut() {
            for v in row.iter_mut() {
                *v = (*v * step).max(0.0);
            }
        }

        for _ in 0..n_iter {
            let mut residual = self.forward_f64(&s, n_frames);
            for (r_row, t_row) in residual.iter_mut().zip(target.iter()) {
                for (r, t) in r_row.iter_mut().zip(t_row.iter()) {
                    *r -= t;
                }
            }
            let grad = self.transpose_apply(&residual, n_frames);
            for (s_row, g_row) in s.iter_mut().zip(grad.iter()) {
                for (v, g) in s_row.iter_mut().zip(g_row.iter()) {
                    *v = (*v - step * g).max(0.0);
                }
            }
        }

        Spectrogram::new(
            s.into_iter()
                .map(|row| row.into_iter().map(|v| v as f32).collect())
                .collect(),
        )
    }

    /// `F · S` для `S` в раскладке `[freq][frame]`.
    fn forward_f64(&self, s: &[Vec<f64>], n_frames: usize) -> Vec<Vec<f64>> {
        self.filters
            .iter()
            .map(|filter| {
                let mut out = vec![0.0_f64; n_frames];
                for (j, &w) in filter.weights.iter().enumerate() {
                    let row = &s[filter.start + j];
                    for (o, v) in out.iter_mut().zip(row.iter()) {
                        *o += w as f64 * v;
                    }
                }
                out
            })
            .collect()
    }

    /// `Fᵀ · M` для `M` в раскладке `[mel][frame]`.
    fn transpose_apply(&self, m: &[Vec<f64>], n_frames: usize) -> Vec<Vec<f64>> {
        let mut out = vec![vec![0.0_f64; n_frames]; self.n_freqs];
        for (filter, m_row) in self.filters.iter().zip(m.iter()) {
            for (j, &w) in filter.weights.iter().enumerate() {
                let row = &mut out[filter.start + j];
                for (o, v) in row.iter_mut().zip(m_row.iter()) {
                    *o += w as f64 * v;
                }
            }
        }
        out
    }

    /// Оценка `||F||₂²` степенным методом на `FᵀF`.
    fn spectral_norm_sq(&self) -> f64 {
        let mut x = vec![vec![1.0_f64]; self.n_freqs];
        let mut estimate = 0.0;
        for _ in 0..50 {
            let y = self.transpose_apply(&self.forward_f64(&x, 1), 1);
            let norm = y.iter().map(|r| r[0] * r[0]).sum::<f64>().sqrt();
            if norm == 0.0 {
                return 0.0;
            }
            estimate = norm;
            x = y.into_iter().map(|r| vec![r[0] / norm]).collect();
        }
        // Небольшой запас, чтобы шаг гарантированно не превышал 1/L.
        estimate * 1.01
    }
}

/// Параметризованный mel-экстрактор.
#[derive(Debug, Clone)]
pub struct MelSpectrogramExtractor {
    config: FeatureConfig,
    window: Vec<f32>,
    filterbank: MelFilterbank,
}

impl MelSpectrogramExtractor {
    /// Создать mel-экстрактор с фильтрами, сгенерированными по конфигурации.
    pub fn new(config: FeatureConfig) -> Self {
        let window = hann_window(config.n_fft);
        let filterbank = MelFilterbank::from_config(&config);
        Self {
            config,
            window,
            filterbank,
        }
    }

    pub fn config(&self) -> &FeatureConfig {
        &self.config
    }

    pub fn filterbank(&self) -> &MelFilterbank {
        &self.filterbank
    }

    /// Mel spectrogram `[n_mels][frames]` of `|STFT|^power`, no log scaling.
    pub fn extract(&self, samples: &[f32]) -> Spectrogram {
        let frames = stft(
            samples,
            self.config.n_fft,
            self.config.hop_length,
            &self.window,
        );
        let spectrum = magnitude_pow(&frames, self.config.power);
        self.filterbank.apply(&spectrum)
    }
}

/// `10 * log10(max(x, 1e-10))` (AmplitudeToDB, stype="power", ref=1, без top_db).
pub fn amplitude_to_db(spec: &Spectrogram) -> Spectrogram {
    Spectrogram::new(
        spec.data
            .iter()
            .map(|row| row.iter().map(|&v| 10.0 * v.max(DB_AMIN).log10()).collect())
            .collect(),
    )
}

/// Inverse of [`amplitude_to_db`]: `10^(db / 10)`.
pub fn db_to_power(spec: &Spectrogram) -> Spectrogram {
    Spectrogram::new(
        spec.data
            .iter()
            .map(|row| row.iter().map(|&v| 10.0_f32.powf(v / 10.0)).collect())
            .collect(),
    )
}

/// Convert frequency to Slaney Mel scale.
/// Slaney uses linear below 1000 Hz, log above.
fn hz_to_mel_slaney(hz: f32) -> f32 {
    let f_min = 0.0;
    let f_sp = 200.0 / 3.0; // ~66.67 Hz
    let min_log_hz = 1000.0;
    let min_log_mel = (min_log_hz - f_min) / f_sp;
    let logstep = (6.4f32).ln() / 27.0;

    if hz >= min_log_hz {
        min_log_mel + ((hz / min_log_hz).ln() / logstep)
    } else {
        (hz - f_min) / f_sp
    }
}

/// Convert Slaney Mel scale to frequency.
fn mel_to_hz_slaney(mel: f32) -> f32 {
    let f_min = 0.0;
    let f_sp = 200.0 / 3.0;
    let min_log_hz = 1000.0;
    let min_log_mel = (min_log_hz - f_min) / f_sp;
    let logstep = (6.4f32).ln() / 27.0;

    if mel >= min_log_mel {
        min_log_hz * (logstep * (mel - min_log_mel)).exp()
    } else {
        f_min + f_sp * mel
    }
}

/// Конвертация Hz → mel по HTK шкале (полностью логарифмическая).
fn hz_to_mel_htk(hz: f32) -> f32 {
    2595.0 * (1.0 + hz / 700.0).log10()
}

/// Конвертация mel → Hz по HTK шкале.
fn mel_to_hz_htk(mel: f32) -> f32 {
    700.0 * (10.0_f32.powf(mel / 2595.0) - 1.0)
}

/// Треугольный filterbank `[n_mels][n_fft/2 + 1]`.
pub fn create_mel_filterbank(
    n_mels: usize,
    n_fft: usize,
    sample_rate: f32,
    f_min: f32,
    f_max: f32,
    scale: MelScale,
    norm: MelNorm,
) -> Vec<Vec<f32>> {
    let (hz_to_mel, mel_to_hz): (fn(f32) -> f32, fn(f32) -> f32) = match scale {
        MelScale::Htk => (hz_to_mel_htk, mel_to_hz_htk),
        MelScale::Slaney => (hz_to_mel_slaney, mel_to_hz_slaney),
    };

    let n_freqs = n_fft / 2 + 1;

    // linspace(0, sr / 2, n_freqs)
    let nyquist = sample_rate / 2.0;
    let fft_freqs: Vec<f32> = (0..n_freqs)
        .map(|i| {
            if n_freqs > 1 {
                i as f32 * nyquist / (n_freqs - 1) as f32
            } else {
                0.0
            }
        })
        .collect();

    let mel_min = hz_to_mel(f_min);
    let mel_max = hz_to_mel(f_max);

    let hz_points: Vec<f32> = (0..n_mels + 2)
        .map(|i| mel_to_hz(mel_min + i as f32 * (mel_max - mel_min) / (n_mels + 1) as f32))
        .collect();

    let mut filterbank = vec![vec![0.0_f32; n_freqs]; n_mels];

    for (m, filter) in filterbank.iter_mut().enumerate() {
        let f_left = hz_points[m];
        let f_center = hz_points[m + 1];
        let f_right = hz_points[m + 2];

        let enorm = match norm {
            MelNorm::None => 1.0,
            // Slaney normalization: 2 / (f_right - f_left)
            MelNorm::Slaney => 2.0 / (f_right - f_left),
        };

        for (k, &freq) in fft_freqs.iter().enumerate() {
            let down = (freq - f_left) / (f_center - f_left);
            let up = (f_right - freq) / (f_right - f_center);
            filter[k] = down.min(up).max(0.0) * enorm;
        }
    }

    filterbank
}
