//! # birdclef-core
//!
//! Базовые типы, конфигурация и ошибки для пайплайна признаков BirdCLEF.
//!
//! - Общие типы данных (`AudioBuffer`, `Spectrogram`, `AudioItem`)
//! - Конфигурация извлечения признаков и расположения данных
//! - Унифицированная обработка ошибок через `BirdClefError`
//! - Trait [`Dataset`] — индексируемая коллекция примеров

pub mod config;
pub mod debug;
pub mod error;
pub mod traits;
pub mod types;

pub use config::{
    AugmentConfig, DataConfig, FeatureConfig, GriffinLimConfig, MelNorm, MelScale, PcenConfig,
    PipelineSwitches,
};
pub use error::{BirdClefError, BirdResult};
pub use traits::Dataset;
pub use types::{AudioBuffer, AudioInfo, AudioItem, Spectrogram};
