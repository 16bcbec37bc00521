//! Labeled audio dataset: metadata rows → (features, class index, path).

use std::path::PathBuf;

use birdclef_core::{
    AudioItem, BirdClefError, BirdResult, Dataset, FeatureConfig, PipelineSwitches,
};
use tracing::info;

use crate::labels::LabelBinarizer;
use crate::metadata::MetadataTable;
use crate::pipeline::FeaturePipeline;

/// Dataset over a metadata table.
///
/// Labels are encoded once at construction; features are computed on every
/// [`Dataset::get`] and not cached.
#[derive(Debug, Clone)]
pub struct LabeledAudioDataset {
    metadata: MetadataTable,
    binarizer: LabelBinarizer,
    labels: Vec<u32>,
    audio_root: PathBuf,
    pipeline: FeaturePipeline,
}

impl LabeledAudioDataset {
    /// Create a dataset with the default feature configuration.
    ///
    /// `classes` may be in any order and contain duplicates.
    pub fn new<S: AsRef<str>>(
        metadata: MetadataTable,
        classes: &[S],
        switches: PipelineSwitches,
        audio_root: impl Into<PathBuf>,
    ) -> BirdResult<Self> {
        Self::with_config(
            metadata,
            classes,
            switches,
            audio_root,
            FeatureConfig::default(),
        )
    }

    pub fn with_config<S: AsRef<str>>(
        metadata: MetadataTable,
        classes: &[S],
        switches: PipelineSwitches,
        audio_root: impl Into<PathBuf>,
        config: FeatureConfig,
    ) -> BirdResult<Self> {
        let binarizer = LabelBinarizer::fit(classes);
        let labels = binarizer.encode(&metadata.labels());
        let pipeline = FeaturePipeline::new(config, switches)?;

        info!(
            "Dataset: {} rows, {} classes, switches {:?}",
            metadata.len(),
            binarizer.num_classes(),
            switches
        );

        Ok(Self {
            metadata,
            binarizer,
            labels,
            audio_root: audio_root.into(),
            pipeline,
        })
    }

    pub fn num_classes(&self) -> usize {
        self.binarizer.num_classes()
    }

    /// Отсортированный словарь классов; индекс метки — позиция в нём.
    pub fn classes(&self) -> &[String] {
        self.binarizer.classes()
    }

    /// Индекс класса строки без вычисления признаков.
    pub fn label(&self, index: usize) -> BirdResult<u32> {
        self.labels
            .get(index)
            .copied()
            .ok_or(BirdClefError::IndexOutOfRange {
                index,
                len: self.len(),
            })
    }

    /// Полный путь к аудио строки.
    pub fn filename(&self, index: usize) -> BirdResult<PathBuf> {
        self.metadata
            .row(index)
            .map(|row| self.audio_root.join(&row.filename))
            .ok_or(BirdClefError::IndexOutOfRange {
                index,
                len: self.len(),
            })
    }

    pub fn metadata(&self) -> &MetadataTable {
        &self.metadata
    }

    pub fn pipeline(&self) -> &FeaturePipeline {
        &self.pipeline
    }
}

impl Dataset for LabeledAudioDataset {
    type Item = AudioItem;

    fn len(&self) -> usize {
        self.metadata.len()
    }

    fn get(&self, index: usize) -> BirdResult<AudioItem> {
        let filename = self.filename(index)?;
        let label = self.label(index)?;
        let input = self.pipeline.transform(&filename)?;
        Ok(AudioItem {
            input,
            label,
            filename,
        })
    }
}
