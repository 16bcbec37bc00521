//! # birdclef-data
//!
//! Feature pipeline and labeled datasets for BirdCLEF.
//!
//! - [`FeaturePipeline`]: audio file → `[1, n_mels, frames]` tensor
//! - [`LabeledAudioDataset`]: metadata rows → features + class index
//! - [`DatasetRegistry`]: named dataset configurations (`train_simple`, ...)
//! - [`DataLoader`]: batching and shuffling
//!
//! ```ignore
//! use birdclef_data::{get_dataloader, DataLoaderOptions};
//!
//! let loader = get_dataloader("train_simple", DataLoaderOptions::default().with_batch_size(16))?;
//! for batch in &loader {
//!     let batch = batch?;
//!     println!("{:?}", batch.inputs.dims());
//! }
//! ```

mod dataloader;
mod dataset;
mod labels;
mod metadata;
mod pipeline;
mod registry;

pub use dataloader::{get_dataloader, Batch, BatchIter, DataLoader, DataLoaderOptions};
pub use dataset::LabeledAudioDataset;
pub use labels::{argmax, LabelBinarizer};
pub use metadata::{MetadataRow, MetadataTable, SplitTables, SIMPLE_CLASSES, SPLIT_FILES};
pub use pipeline::FeaturePipeline;
pub use registry::{
    dataset_keys, dataset_specs, get_dataset, lookup, DatasetRegistry, DatasetSpec, Source, Split,
};
