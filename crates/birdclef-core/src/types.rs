//! Общие типы пайплайна.
//!
//! Буферы аудио, mel-спектрограммы и записи датасета.

use candle_core::{Device, Tensor};
use std::path::PathBuf;

use crate::error::BirdResult;

// ---------------------------------------------------------------------------
// Аудио-буфер
// ---------------------------------------------------------------------------

/// Буфер необработанного аудио.
#[derive(Debug, Clone)]
pub struct AudioBuffer {
    /// Аудио-сэмплы (interleaved, нормализованы к [-1.0, 1.0]).
    pub samples: Vec<f32>,

    /// Частота дискретизации в Гц.
    pub sample_rate: usize,

    /// Количество каналов.
    pub channels: usize,
}

impl AudioBuffer {
    /// Создать новый буфер аудио.
    pub fn new(samples: Vec<f32>, sample_rate: usize, channels: usize) -> Self {
        Self {
            samples,
            sample_rate,
            channels,
        }
    }

    /// Длительность в секундах.
    pub fn duration(&self) -> f32 {
        if self.sample_rate == 0 || self.channels == 0 {
            return 0.0;
        }
        self.samples.len() as f32 / (self.sample_rate * self.channels) as f32
    }

    /// Количество сэмплов на канал.
    pub fn num_samples(&self) -> usize {
        if self.channels == 0 {
            return 0;
        }
        self.samples.len() / self.channels
    }
}

/// Metadata of an audio file, available without decoding it fully.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioInfo {
    pub sample_rate: usize,
    pub channels: usize,
    /// Frames per channel. `None` when the container does not report it.
    pub num_frames: Option<u64>,
}

// ---------------------------------------------------------------------------
// Mel-спектрограмма
// ---------------------------------------------------------------------------

/// Спектрограмма в раскладке `[bin][frame]`.
///
/// Внутреннее представление всех шагов после STFT: PCEN, маскирование и
/// растяжение работают построчно по каждому частотному каналу.
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrogram {
    /// `data[bin][frame]`.
    pub data: Vec<Vec<f32>>,
}

impl Spectrogram {
    pub fn new(data: Vec<Vec<f32>>) -> Self {
        Self { data }
    }

    /// Нулевая спектрограмма заданной формы.
    pub fn zeros(num_bins: usize, num_frames: usize) -> Self {
        Self {
            data: vec![vec![0.0; num_frames]; num_bins],
        }
    }

    /// Количество частотных (mel) бинов.
    pub fn num_bins(&self) -> usize {
        self.data.len()
    }

    /// Количество временных фреймов.
    pub fn num_frames(&self) -> usize {
        self.data.first().map_or(0, Vec::len)
    }

    /// Тензор формы `[1, bins, frames]`.
    pub fn to_tensor(&self, device: &Device) -> BirdResult<Tensor> {
        let bins = self.num_bins();
        let frames = self.num_frames();
        let flat: Vec<f32> = self.data.iter().flatten().copied().collect();
        Ok(Tensor::from_vec(flat, (1, bins, frames), device)?)
    }

    /// Обратное к [`Spectrogram::to_tensor`]: принимает `[1, bins, frames]` или `[bins, frames]`.
    pub fn from_tensor(tensor: &Tensor) -> BirdResult<Self> {
        let tensor = match tensor.rank() {
            3 => tensor.squeeze(0)?,
            _ => tensor.clone(),
        };
        let data: Vec<Vec<f32>> = tensor.to_dtype(candle_core::DType::F32)?.to_vec2()?;
        Ok(Self { data })
    }
}

// ---------------------------------------------------------------------------
// Запись датасета
// ---------------------------------------------------------------------------

/// One dataset item: features, class index and the resolved audio path.
#[derive(Debug, Clone)]
pub struct AudioItem {
    /// Тензор признаков формы `[1, n_mels, frames]`.
    pub input: Tensor,

    /// Индекс класса (argmax one-hot строки).
    pub label: u32,

    /// Полный путь к аудиофайлу.
    pub filename: PathBuf,
}
