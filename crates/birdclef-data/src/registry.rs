//! Реестр именованных датасетов.
//!
//! Ключ вида `{split}_{source}[_pcen][_augm][_offset]` задаёт разбиение,
//! источник метаданных и переключатели пайплайна:
//!
//! | Источник   | Разбиения       | Варианты                                            |
//! |------------|-----------------|-----------------------------------------------------|
//! | `base`     | train/val/test  | `""`, `_pcen`                                       |
//! | `simple`   | train/val/test  | `""`, `_pcen`                                       |
//! | `base`, `simple` | train     | `_augm`, `_offset`, `_pcen_augm`, `_pcen_augm_offset` |
//! | `repeated` | train/val/test  | `""`, `_pcen`; train: `_pcen_augm_offset`            |
//!
//! Val/test всегда используют метки train-разбиения того же источника как словарь.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use birdclef_core::{BirdClefError, BirdResult, DataConfig, FeatureConfig, PipelineSwitches};
use tracing::info;

use crate::dataset::LabeledAudioDataset;
use crate::metadata::{MetadataTable, SplitTables, SIMPLE_CLASSES};

/// Разбиение данных.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Split {
    Train,
    Val,
    Test,
}

impl Split {
    pub const ALL: [Split; 3] = [Split::Train, Split::Val, Split::Test];

    pub fn as_str(&self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Val => "val",
            Split::Test => "test",
        }
    }
}

/// Источник метаданных.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// `<data_dir>/base/*.csv`.
    Base,
    /// `base`, отфильтрованный по [`SIMPLE_CLASSES`].
    Simple,
    /// `<data_dir>/repeated/*.csv`, загружается при первом обращении.
    Repeated,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Base => "base",
            Source::Simple => "simple",
            Source::Repeated => "repeated",
        }
    }
}

/// Registry entry: which metadata and which pipeline switches a key selects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetSpec {
    pub key: String,
    pub source: Source,
    pub split: Split,
    pub switches: PipelineSwitches,
}

impl DatasetSpec {
    fn new(source: Source, split: Split, switches: PipelineSwitches) -> Self {
        let mut key = format!("{}_{}", split.as_str(), source.as_str());
        if switches.pcen {
            key.push_str("_pcen");
        }
        if switches.augment {
            key.push_str("_augm");
        }
        if switches.random_offset {
            key.push_str("_offset");
        }
        Self {
            key,
            source,
            split,
            switches,
        }
    }
}

/// All registry entries, in listing order.
pub fn dataset_specs() -> Vec<DatasetSpec> {
    let plain = PipelineSwitches::new(false, false, false);
    let pcen = PipelineSwitches::new(true, false, false);
    let train_only = [
        PipelineSwitches::new(false, true, false),
        PipelineSwitches::new(false, false, true),
        PipelineSwitches::new(true, true, false),
        PipelineSwitches::new(true, true, true),
    ];

    let mut specs = Vec::new();
    for source in [Source::Base, Source::Simple] {
        for split in Split::ALL {
            specs.push(DatasetSpec::new(source, split, plain));
            specs.push(DatasetSpec::new(source, split, pcen));
            if split == Split::Train {
                specs.extend(
                    train_only
                        .iter()
                        .map(|&switches| DatasetSpec::new(source, split, switches)),
                );
            }
        }
    }
    for split in Split::ALL {
        specs.push(DatasetSpec::new(Source::Repeated, split, plain));
        specs.push(DatasetSpec::new(Source::Repeated, split, pcen));
    }
    specs.push(DatasetSpec::new(
        Source::Repeated,
        Split::Train,
        PipelineSwitches::new(true, true, true),
    ));
    specs
}

/// Все допустимые ключи.
pub fn dataset_keys() -> Vec<String> {
    dataset_specs().into_iter().map(|s| s.key).collect()
}

/// Найти запись по ключу или вернуть [`BirdClefError::UnknownDataset`].
pub fn lookup(key: &str) -> BirdResult<DatasetSpec> {
    let specs = dataset_specs();
    match specs.iter().position(|s| s.key == key) {
        Some(pos) => Ok(specs[pos].clone()),
        None => Err(BirdClefError::UnknownDataset {
            key: key.to_string(),
            valid: specs.into_iter().map(|s| s.key).collect(),
        }),
    }
}

/// Named dataset registry backed by on-disk metadata.
///
/// `base` metadata is read at construction; `repeated` on first use.
#[derive(Debug)]
pub struct DatasetRegistry {
    data: DataConfig,
    features: FeatureConfig,
    base_dir: PathBuf,
    base: SplitTables,
    simple: SplitTables,
    repeated: OnceLock<SplitTables>,
}

impl DatasetRegistry {
    /// Загрузить `base` метаданные (с одной попыткой в запасной директории).
    pub fn new(data: DataConfig, features: FeatureConfig) -> BirdResult<Self> {
        features.validate()?;
        let (base, base_dir) =
            SplitTables::load_with_fallback(&data.data_dir, &data.fallback_data_dir, "base")?;
        let simple = base.filter_labels(&SIMPLE_CLASSES);

        info!(
            "Registry: base train/val/test = {}/{}/{} rows, simple = {}/{}/{}",
            base.train.len(),
            base.val.len(),
            base.test.len(),
            simple.train.len(),
            simple.val.len(),
            simple.test.len()
        );

        Ok(Self {
            data,
            features,
            base_dir,
            base,
            simple,
            repeated: OnceLock::new(),
        })
    }

    /// Registry with [`DataConfig::from_env`] and the default feature config.
    pub fn from_env() -> BirdResult<Self> {
        Self::new(DataConfig::from_env(), FeatureConfig::default())
    }

    /// Directory the `base` metadata was actually read from.
    pub fn data_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn data_config(&self) -> &DataConfig {
        &self.data
    }

    pub fn keys(&self) -> Vec<String> {
        dataset_keys()
    }

    fn repeated(&self) -> BirdResult<&SplitTables> {
        if let Some(tables) = self.repeated.get() {
            return Ok(tables);
        }
        let (tables, dir) = SplitTables::load_with_fallback(
            &self.data.data_dir,
            &self.data.fallback_data_dir,
            "repeated",
        )?;
        info!("Loaded repeated metadata from {}", dir.display());
        Ok(self.repeated.get_or_init(|| tables))
    }

    fn tables(&self, source: Source) -> BirdResult<&SplitTables> {
        match source {
            Source::Base => Ok(&self.base),
            Source::Simple => Ok(&self.simple),
            Source::Repeated => self.repeated(),
        }
    }

    /// Metadata table selected by a key, without building the dataset.
    pub fn metadata(&self, key: &str) -> BirdResult<&MetadataTable> {
        let spec = lookup(key)?;
        let tables = self.tables(spec.source)?;
        Ok(split_table(tables, spec.split))
    }

    /// Построить датасет по ключу.
    pub fn get_dataset(&self, key: &str) -> BirdResult<LabeledAudioDataset> {
        let spec = lookup(key)?;
        let tables = self.tables(spec.source)?;
        let metadata = split_table(tables, spec.split).clone();
        let classes = tables.train.labels();

        info!("Building dataset '{}' ({} rows)", key, metadata.len());
        LabeledAudioDataset::with_config(
            metadata,
            &classes,
            spec.switches,
            &self.data.audio_root,
            self.features.clone(),
        )
    }
}

fn split_table(tables: &SplitTables, split: Split) -> &MetadataTable {
    match split {
        Split::Train => &tables.train,
        Split::Val => &tables.val,
        Split::Test => &tables.test,
    }
}

/// Resolve a key against the registry built from the environment.
///
/// Unknown keys fail before any metadata is read.
pub fn get_dataset(key: &str) -> BirdResult<LabeledAudioDataset> {
    lookup(key)?;
    DatasetRegistry::from_env()?.get_dataset(key)
}
