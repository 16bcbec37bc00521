//! Конфигурационные структуры пайплайна признаков и датасетов.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{BirdClefError, BirdResult};

/// Конфигурация извлечения признаков (mel-спектрограмма + пост-обработка).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    /// Длительность клипа в секундах.
    pub seconds: usize,

    /// Целевая частота дискретизации в Гц.
    pub sample_rate: usize,

    /// Минимальная частота для mel-фильтра.
    pub f_min: f32,

    /// Максимальная частота для mel-фильтра.
    pub f_max: f32,

    /// Размер окна FFT (длина окна совпадает с n_fft).
    pub n_fft: usize,

    /// Количество mel-бинов.
    pub n_mels: usize,

    /// Шаг между фреймами.
    pub hop_length: usize,

    /// Показатель степени для амплитудного спектра (2.0 = power).
    pub power: f32,

    /// Шкала mel-фильтров.
    pub mel_scale: MelScale,

    /// Нормализация площади mel-фильтров.
    pub mel_norm: MelNorm,

    /// Параметры PCEN.
    pub pcen: PcenConfig,

    /// Параметры аугментаций.
    pub augment: AugmentConfig,

    /// Параметры обратного преобразования (mel → waveform).
    pub griffin_lim: GriffinLimConfig,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self::birdclef()
    }
}

impl FeatureConfig {
    /// 5-second clips at 32 kHz, 128 HTK mel bins between 50 Hz and 16 kHz.
    pub fn birdclef() -> Self {
        Self {
            seconds: 5,
            sample_rate: 32000,
            f_min: 50.0,
            f_max: 16000.0,
            n_fft: 2048,
            n_mels: 128,
            hop_length: 1024,
            power: 8.0,
            mel_scale: MelScale::Htk,
            mel_norm: MelNorm::None,
            pcen: PcenConfig::default(),
            augment: AugmentConfig::default(),
            griffin_lim: GriffinLimConfig::default(),
        }
    }

    /// Load a config from a JSON file. Missing fields fall back to [`FeatureConfig::birdclef`].
    pub fn from_json_file(path: impl AsRef<Path>) -> BirdResult<Self> {
        let data = std::fs::read(path.as_ref())?;
        let config: Self = serde_json::from_slice(&data)?;
        config.validate()?;
        Ok(config)
    }

    /// Количество сэмплов в одном клипе на целевой частоте.
    pub fn clip_samples(&self) -> usize {
        self.seconds * self.sample_rate
    }

    /// Целевое число временных фреймов: `seconds * sample_rate / hop_length + 1`.
    pub fn target_frames(&self) -> usize {
        self.clip_samples() / self.hop_length + 1
    }

    /// Число частотных бинов одностороннего STFT.
    pub fn n_freqs(&self) -> usize {
        self.n_fft / 2 + 1
    }

    /// Проверить согласованность параметров.
    pub fn validate(&self) -> BirdResult<()> {
        if self.seconds == 0 || self.sample_rate == 0 {
            return Err(BirdClefError::Config(
                "seconds and sample_rate must be positive".into(),
            ));
        }
        if self.n_fft == 0 || self.hop_length == 0 || self.n_mels == 0 {
            return Err(BirdClefError::Config(
                "n_fft, hop_length and n_mels must be positive".into(),
            ));
        }
        if !(self.f_min >= 0.0 && self.f_min < self.f_max) {
            return Err(BirdClefError::Config(format!(
                "invalid mel frequency range [{}, {}]",
                self.f_min, self.f_max
            )));
        }
        if self.f_max > self.sample_rate as f32 / 2.0 {
            return Err(BirdClefError::Config(format!(
                "f_max {} exceeds Nyquist frequency {}",
                self.f_max,
                self.sample_rate / 2
            )));
        }
        if self.power <= 0.0 {
            return Err(BirdClefError::Config("power must be positive".into()));
        }
        if !(0.0..=1.0).contains(&self.augment.probability) {
            return Err(BirdClefError::Config(format!(
                "augmentation probability {} is outside [0, 1]",
                self.augment.probability
            )));
        }
        Ok(())
    }
}

/// Шкала mel-фильтров.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MelScale {
    /// HTK: полностью логарифмическая шкала (по умолчанию в torchaudio).
    Htk,
    /// Slaney: линейная ниже 1000 Гц, логарифмическая выше.
    Slaney,
}

/// Нормализация mel-фильтров.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MelNorm {
    /// Треугольники с пиком 1.0.
    None,
    /// Slaney: площадь каждого фильтра нормирована на ширину полосы.
    Slaney,
}

/// Три переключателя пайплайна, которые задаются на уровне датасета.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineSwitches {
    /// PCEN вместо перевода в децибелы.
    pub pcen: bool,
    /// Шум на waveform и частотная маска на mel (каждая с вероятностью 0.5).
    pub augment: bool,
    /// Случайное смещение начала клипа внутри файла.
    pub random_offset: bool,
}

impl PipelineSwitches {
    pub fn new(pcen: bool, augment: bool, random_offset: bool) -> Self {
        Self {
            pcen,
            augment,
            random_offset,
        }
    }
}

/// Per-channel energy normalization parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PcenConfig {
    pub gain: f64,
    pub bias: f64,
    pub power: f64,
    /// Постоянная времени сглаживающего фильтра в секундах.
    pub time_constant: f64,
    pub eps: f64,
    /// Множитель, применяемый к mel-мощности перед PCEN (2^31).
    pub input_scale: f64,
}

impl Default for PcenConfig {
    fn default() -> Self {
        Self {
            gain: 0.98,
            bias: 2.0,
            power: 0.5,
            time_constant: 0.4,
            eps: 1e-6,
            input_scale: 2f64.powi(31),
        }
    }
}

/// Augmentation parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AugmentConfig {
    /// Вероятность применения каждой аугментации.
    pub probability: f64,
    /// SNR добавляемого гауссова шума, дБ.
    pub noise_snr_db: f32,
    /// Максимальная ширина частотной маски в mel-бинах.
    pub freq_mask_param: usize,
}

impl Default for AugmentConfig {
    fn default() -> Self {
        Self {
            probability: 0.5,
            noise_snr_db: 10.0,
            freq_mask_param: 40,
        }
    }
}

/// Inverse transform parameters (mel → linear spectrogram → waveform).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GriffinLimConfig {
    /// Итерации Griffin-Lim.
    pub n_iter: usize,
    /// Momentum (fast Griffin-Lim). 0.0 отключает ускорение.
    pub momentum: f32,
    /// Итерации проективного градиента при обращении mel-фильтров.
    pub inverse_mel_iter: usize,
    /// Seed для начальных фаз. `None` — нулевые фазы.
    pub seed: Option<u64>,
}

impl Default for GriffinLimConfig {
    fn default() -> Self {
        Self {
            n_iter: 32,
            momentum: 0.99,
            inverse_mel_iter: 200,
            seed: Some(0),
        }
    }
}

/// Environment variable overriding the metadata directory.
pub const DATA_DIR_ENV: &str = "BIRDCLEF_DATA_DIR";

/// Environment variable overriding the audio root directory.
pub const AUDIO_DIR_ENV: &str = "BIRDCLEF_AUDIO_DIR";

/// Расположение метаданных и аудио на диске.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataConfig {
    /// Основная директория с `base/` и `repeated/`.
    pub data_dir: PathBuf,

    /// Запасная директория, если в основной нет CSV.
    pub fallback_data_dir: PathBuf,

    /// Корень, относительно которого резолвятся `filename` из метаданных.
    pub audio_root: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("../data"),
            fallback_data_dir: PathBuf::from("data"),
            audio_root: PathBuf::from("../data/train_audio"),
        }
    }
}

impl DataConfig {
    /// Конфигурация по умолчанию с переопределениями из окружения.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(dir) = std::env::var_os(DATA_DIR_ENV) {
            config.data_dir = PathBuf::from(dir);
            config.audio_root = config.data_dir.join("train_audio");
        }
        if let Some(dir) = std::env::var_os(AUDIO_DIR_ENV) {
            config.audio_root = PathBuf::from(dir);
        }
        config
    }

    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    pub fn with_fallback_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.fallback_data_dir = dir.into();
        self
    }

    pub fn with_audio_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.audio_root = dir.into();
        self
    }
}
