//! Батчевая итерация по датасету.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use birdclef_core::{AudioItem, BirdClefError, BirdResult, Dataset};
use candle_core::Tensor;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::dataset::LabeledAudioDataset;
use crate::registry::{lookup, DatasetRegistry};

/// Options for [`DataLoader`].
///
/// Unrecognized keys are kept in `extra` and reported, never rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataLoaderOptions {
    pub batch_size: usize,
    pub shuffle: bool,
    /// Отбросить последний неполный батч.
    pub drop_last: bool,
    /// Seed перемешивания. `None` — из энтропии ОС.
    pub seed: Option<u64>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Default for DataLoaderOptions {
    fn default() -> Self {
        Self {
            batch_size: 1,
            shuffle: false,
            drop_last: false,
            seed: None,
            extra: BTreeMap::new(),
        }
    }
}

impl DataLoaderOptions {
    pub fn from_json_str(json: &str) -> BirdResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> BirdResult<Self> {
        let data = std::fs::read(path.as_ref())?;
        Ok(serde_json::from_slice(&data)?)
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_drop_last(mut self, drop_last: bool) -> Self {
        self.drop_last = drop_last;
        self
    }
}

/// Stacked batch of dataset items.
#[derive(Debug, Clone)]
pub struct Batch {
    /// `[B, 1, n_mels, frames]`.
    pub inputs: Tensor,
    /// `[B]`, `u32`.
    pub labels: Tensor,
    pub filenames: Vec<PathBuf>,
}

impl Batch {
    /// Собрать батч из элементов одинаковой формы.
    pub fn collate(items: Vec<AudioItem>) -> BirdResult<Self> {
        if items.is_empty() {
            return Err(BirdClefError::Config("cannot collate an empty batch".into()));
        }
        let size = items.len();
        let mut inputs = Vec::with_capacity(size);
        let mut labels = Vec::with_capacity(size);
        let mut filenames = Vec::with_capacity(size);
        for item in items {
            inputs.push(item.input);
            labels.push(item.label);
            filenames.push(item.filename);
        }

        let inputs = Tensor::stack(&inputs, 0)?;
        let labels = Tensor::from_vec(labels, size, inputs.device())?;
        Ok(Self {
            inputs,
            labels,
            filenames,
        })
    }

    pub fn len(&self) -> usize {
        self.filenames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filenames.is_empty()
    }
}

/// Batching loader over any dataset of [`AudioItem`]s.
#[derive(Debug)]
pub struct DataLoader<D> {
    dataset: D,
    options: DataLoaderOptions,
}

impl<D: Dataset<Item = AudioItem>> DataLoader<D> {
    pub fn new(dataset: D, options: DataLoaderOptions) -> BirdResult<Self> {
        if options.batch_size == 0 {
            return Err(BirdClefError::Config("batch_size must be positive".into()));
        }
        for (key, value) in &options.extra {
            warn!("Unsupported dataloader option '{}' = {} is ignored", key, value);
        }
        Ok(Self { dataset, options })
    }

    pub fn dataset(&self) -> &D {
        &self.dataset
    }

    pub fn options(&self) -> &DataLoaderOptions {
        &self.options
    }

    /// Количество батчей за эпоху.
    pub fn num_batches(&self) -> usize {
        let n = self.dataset.len();
        let b = self.options.batch_size;
        if self.options.drop_last {
            n / b
        } else {
            n.div_ceil(b)
        }
    }

    /// Порядок индексов эпохи.
    fn order(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.dataset.len()).collect();
        if self.options.shuffle {
            let mut rng = match self.options.seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            };
            order.shuffle(&mut rng);
        }
        order
    }

    /// Итератор по батчам одной эпохи. Ошибка элемента завершает батч ошибкой.
    pub fn iter(&self) -> BatchIter<'_, D> {
        BatchIter {
            loader: self,
            order: self.order(),
            position: 0,
            remaining: self.num_batches(),
        }
    }
}

/// Iterator returned by [`DataLoader::iter`].
pub struct BatchIter<'a, D> {
    loader: &'a DataLoader<D>,
    order: Vec<usize>,
    position: usize,
    remaining: usize,
}

impl<D: Dataset<Item = AudioItem>> Iterator for BatchIter<'_, D> {
    type Item = BirdResult<Batch>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;

        let end = (self.position + self.loader.options.batch_size).min(self.order.len());
        let indices = &self.order[self.position..end];
        self.position = end;
        debug!("Loading batch of {} items", indices.len());

        let items: BirdResult<Vec<AudioItem>> = indices
            .iter()
            .map(|&idx| self.loader.dataset.get(idx))
            .collect();
        Some(items.and_then(Batch::collate))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<'a, D: Dataset<Item = AudioItem>> IntoIterator for &'a DataLoader<D> {
    type Item = BirdResult<Batch>;
    type IntoIter = BatchIter<'a, D>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl DatasetRegistry {
    /// Датасет по ключу, обёрнутый в загрузчик.
    pub fn get_dataloader(
        &self,
        key: &str,
        options: DataLoaderOptions,
    ) -> BirdResult<DataLoader<LabeledAudioDataset>> {
        DataLoader::new(self.get_dataset(key)?, options)
    }
}

/// [`crate::get_dataset`] followed by [`DataLoader::new`].
pub fn get_dataloader(
    key: &str,
    options: DataLoaderOptions,
) -> BirdResult<DataLoader<LabeledAudioDataset>> {
    lookup(key)?;
    DatasetRegistry::from_env()?.get_dataloader(key, options)
}
