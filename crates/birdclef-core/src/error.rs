//! Error types for the BirdCLEF feature pipeline.

use thiserror::Error;

/// Main error type for feature extraction and dataset operations.
#[derive(Error, Debug)]
pub enum BirdClefError {
    /// Audio decoding / resampling / DSP errors.
    #[error("Audio error: {0}")]
    Audio(String),

    /// Configuration errors.
    #[error("Config error: {0}")]
    Config(String),

    /// Metadata table errors (missing columns, malformed rows).
    #[error("Metadata error: {0}")]
    Metadata(String),

    /// Неизвестный ключ в реестре датасетов.
    #[error("{key} is not an existing dataset, choose one from [{}]", valid.join(", "))]
    UnknownDataset {
        /// Запрошенный ключ.
        key: String,
        /// Все допустимые ключи.
        valid: Vec<String>,
    },

    /// Индекс за пределами таблицы метаданных.
    #[error("Index {index} out of range for dataset of length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    /// I/O errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Candle tensor errors.
    #[error("Tensor error: {0}")]
    Candle(#[from] candle_core::Error),

    /// JSON parsing errors.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV parsing errors.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl BirdClefError {
    /// `true`, если ошибка вызвана отсутствием файла на диске.
    ///
    /// Используется загрузчиком метаданных, чтобы решить, пробовать ли
    /// запасную директорию.
    pub fn is_not_found(&self) -> bool {
        match self {
            BirdClefError::Io(e) => e.kind() == std::io::ErrorKind::NotFound,
            BirdClefError::Csv(e) => match e.kind() {
                csv::ErrorKind::Io(io) => io.kind() == std::io::ErrorKind::NotFound,
                _ => false,
            },
            _ => false,
        }
    }
}

/// Result type alias for pipeline operations.
pub type BirdResult<T> = Result<T, BirdClefError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_dataset_message_lists_keys() {
        let err = BirdClefError::UnknownDataset {
            key: "bogus_key".to_string(),
            valid: vec!["train_base".to_string(), "train_simple".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("bogus_key"));
        assert!(msg.contains("train_base, train_simple"));
    }

    #[test]
    fn test_is_not_found() {
        let err: BirdClefError =
            std::io::Error::new(std::io::ErrorKind::NotFound, "missing").into();
        assert!(err.is_not_found());
        assert!(!BirdClefError::Config("x".into()).is_not_found());
    }
}
