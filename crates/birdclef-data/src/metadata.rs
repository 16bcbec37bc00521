//! Таблицы метаданных (`filename`, `primary_label`) и их загрузка с диска.

use std::path::{Path, PathBuf};

use birdclef_core::{BirdClefError, BirdResult};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Метки упрощённого трёхклассового набора.
pub const SIMPLE_CLASSES: [&str; 3] = ["thrnig1", "wlwwar", "barswa"];

/// Имена CSV трёх разбиений.
pub const SPLIT_FILES: [&str; 3] = ["train_metadata.csv", "val_metadata.csv", "test_metadata.csv"];

/// One metadata row. Other CSV columns are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataRow {
    pub filename: String,
    pub primary_label: String,
}

/// Read-only metadata table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataTable {
    rows: Vec<MetadataRow>,
}

impl MetadataTable {
    pub fn new(rows: Vec<MetadataRow>) -> Self {
        Self { rows }
    }

    /// Прочитать CSV с заголовком; нужны колонки `filename` и `primary_label`.
    pub fn from_csv(path: impl AsRef<Path>) -> BirdResult<Self> {
        let path = path.as_ref();
        let mut reader = csv::Reader::from_path(path)?;

        let headers = reader.headers()?.clone();
        for column in ["filename", "primary_label"] {
            if !headers.iter().any(|h| h == column) {
                return Err(BirdClefError::Metadata(format!(
                    "{}: missing column '{}'",
                    path.display(),
                    column
                )));
            }
        }

        let rows = reader
            .deserialize()
            .collect::<Result<Vec<MetadataRow>, csv::Error>>()?;
        Ok(Self { rows })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[MetadataRow] {
        &self.rows
    }

    pub fn row(&self, index: usize) -> Option<&MetadataRow> {
        self.rows.get(index)
    }

    /// Колонка `primary_label`.
    pub fn labels(&self) -> Vec<&str> {
        self.rows.iter().map(|r| r.primary_label.as_str()).collect()
    }

    /// Строки, чья метка входит в `classes`; порядок сохраняется.
    pub fn filter_labels<S: AsRef<str>>(&self, classes: &[S]) -> Self {
        let rows = self
            .rows
            .iter()
            .filter(|r| classes.iter().any(|c| c.as_ref() == r.primary_label))
            .cloned()
            .collect();
        Self { rows }
    }
}

/// Метаданные train/val/test одного источника.
#[derive(Debug, Clone, Default)]
pub struct SplitTables {
    pub train: MetadataTable,
    pub val: MetadataTable,
    pub test: MetadataTable,
}

impl SplitTables {
    /// Загрузить `<dir>/<source>/{train,val,test}_metadata.csv`.
    pub fn load(dir: &Path, source: &str) -> BirdResult<Self> {
        let base = dir.join(source);
        let [train, val, test] = SPLIT_FILES.map(|name| base.join(name));
        Ok(Self {
            train: MetadataTable::from_csv(train)?,
            val: MetadataTable::from_csv(val)?,
            test: MetadataTable::from_csv(test)?,
        })
    }

    /// Загрузить из `primary`, а при отсутствии файлов один раз повторить в `fallback`.
    ///
    /// Возвращает таблицы и директорию, из которой они прочитаны.
    pub fn load_with_fallback(
        primary: &Path,
        fallback: &Path,
        source: &str,
    ) -> BirdResult<(Self, PathBuf)> {
        match Self::load(primary, source) {
            Ok(tables) => {
                info!("Loaded {} metadata from {}", source, primary.display());
                Ok((tables, primary.to_path_buf()))
            }
            Err(e) if e.is_not_found() => {
                warn!(
                    "{} metadata not found under {}, retrying in {}",
                    source,
                    primary.display(),
                    fallback.display()
                );
                let tables = Self::load(fallback, source)?;
                Ok((tables, fallback.to_path_buf()))
            }
            Err(e) => Err(e),
        }
    }

    /// Те же разбиения, отфильтрованные по набору меток.
    pub fn filter_labels<S: AsRef<str>>(&self, classes: &[S]) -> Self {
        Self {
            train: self.train.filter_labels(classes),
            val: self.val.filter_labels(classes),
            test: self.test.filter_labels(classes),
        }
    }
}
