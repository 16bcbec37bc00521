//! Integration tests: CSV metadata → registry → datasets and dataloaders.

mod common;

use std::collections::BTreeSet;

use birdclef_core::{BirdClefError, DataConfig, Dataset, FeatureConfig};
use birdclef_data::{DataLoaderOptions, DatasetRegistry, SIMPLE_CLASSES};
use common::{temp_dir, write_dataset, write_metadata, TRAIN_ROWS, VAL_ROWS};

fn registry_for(root: &std::path::Path) -> DatasetRegistry {
    let (data_dir, audio_root) = write_dataset(root);
    let config = DataConfig::default()
        .with_data_dir(data_dir)
        .with_fallback_data_dir(root.join("no-fallback"))
        .with_audio_root(audio_root);
    DatasetRegistry::new(config, FeatureConfig::default()).unwrap()
}

#[test]
fn test_train_simple_has_three_classes() {
    let dir = temp_dir("simple");
    let registry = registry_for(&dir);

    let ds = registry.get_dataset("train_simple").unwrap();
    let labels: BTreeSet<&str> = ds.classes().iter().map(String::as_str).collect();
    let expected: BTreeSet<&str> = SIMPLE_CLASSES.iter().copied().collect();
    assert_eq!(labels, expected);

    let expected_rows = TRAIN_ROWS
        .iter()
        .filter(|(label, _)| SIMPLE_CLASSES.contains(label))
        .count();
    assert_eq!(ds.len(), expected_rows);

    let item = ds.get(0).unwrap();
    assert_eq!(item.input.dims(), &[1, 128, 157]);
    assert_eq!(item.label, 0); // barswa — первый в отсортированном словаре
    assert!(item.filename.ends_with("barswa/XC1.wav"));
}

#[test]
fn test_val_uses_training_vocabulary() {
    let dir = temp_dir("vocab");
    let registry = registry_for(&dir);

    let train = registry.get_dataset("train_base").unwrap();
    let val = registry.get_dataset("val_base").unwrap();
    assert_eq!(val.len(), VAL_ROWS.len());
    assert_eq!(val.classes(), train.classes());
    assert_eq!(val.num_classes(), 6);

    let val_simple = registry.get_dataset("val_simple_pcen").unwrap();
    assert_eq!(val_simple.num_classes(), 3);
    assert_eq!(val_simple.len(), 2);
    // barswa, thrnig1 в словаре [barswa, thrnig1, wlwwar]
    assert_eq!(val_simple.label(0).unwrap(), 0);
    assert_eq!(val_simple.label(1).unwrap(), 1);
}

#[test]
fn test_metadata_matches_built_dataset() {
    let dir = temp_dir("metadata");
    let registry = registry_for(&dir);

    let table = registry.metadata("val_simple_pcen").unwrap();
    let ds = registry.get_dataset("val_simple_pcen").unwrap();
    assert_eq!(table.len(), ds.len());
    assert_eq!(table.labels(), ds.metadata().labels());

    let switches = ds.pipeline().switches();
    assert!(switches.pcen && !switches.augment && !switches.random_offset);
    assert_eq!(ds.pipeline().target_frames(), 157);

    assert!(matches!(
        registry.metadata("no_such_key"),
        Err(BirdClefError::UnknownDataset { .. })
    ));
}

#[test]
fn test_unknown_key_error_lists_keys() {
    let dir = temp_dir("bogus");
    let registry = registry_for(&dir);

    let err = registry.get_dataset("bogus_key").unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("bogus_key"), "{}", msg);
    for key in registry.keys() {
        assert!(msg.contains(&key), "{} not listed in {}", key, msg);
    }
}

#[test]
fn test_fallback_directory_is_used() {
    let dir = temp_dir("fallback");
    let (data_dir, audio_root) = write_dataset(&dir);
    let config = DataConfig::default()
        .with_data_dir(dir.join("missing"))
        .with_fallback_data_dir(&data_dir)
        .with_audio_root(audio_root);

    let registry = DatasetRegistry::new(config, FeatureConfig::default()).unwrap();
    assert_eq!(registry.data_dir(), data_dir.as_path());
    assert_eq!(
        registry.get_dataset("test_base").unwrap().len(),
        common::TEST_ROWS.len()
    );
}

#[test]
fn test_missing_metadata_everywhere_is_not_found() {
    let dir = temp_dir("nowhere");
    let config = DataConfig::default()
        .with_data_dir(dir.join("a"))
        .with_fallback_data_dir(dir.join("b"));
    let err = DatasetRegistry::new(config, FeatureConfig::default()).unwrap_err();
    assert!(err.is_not_found(), "{}", err);
}

#[test]
fn test_repeated_split_is_loaded_lazily() {
    let dir = temp_dir("repeated");
    let registry = registry_for(&dir);

    let err = registry.get_dataset("train_repeated").unwrap_err();
    assert!(err.is_not_found(), "{}", err);

    let data_dir = registry.data_config().data_dir.clone();
    let doubled: Vec<(&str, &str)> = TRAIN_ROWS.iter().chain(TRAIN_ROWS.iter()).copied().collect();
    write_metadata(&data_dir, "repeated", "train", &doubled);
    write_metadata(&data_dir, "repeated", "val", &VAL_ROWS);
    write_metadata(&data_dir, "repeated", "test", &common::TEST_ROWS);

    let ds = registry.get_dataset("train_repeated_pcen_augm_offset").unwrap();
    assert_eq!(ds.len(), 2 * TRAIN_ROWS.len());
    assert_eq!(ds.get(3).unwrap().input.dims(), &[1, 128, 157]);
}

#[test]
fn test_out_of_range_item() {
    let dir = temp_dir("range");
    let registry = registry_for(&dir);
    let ds = registry.get_dataset("test_simple").unwrap();
    assert!(matches!(
        ds.get(ds.len()),
        Err(BirdClefError::IndexOutOfRange { .. })
    ));
}

#[test]
fn test_dataloader_batches() {
    let dir = temp_dir("loader");
    let registry = registry_for(&dir);

    let options = DataLoaderOptions::from_json_str(
        r#"{"batch_size": 2, "shuffle": true, "seed": 7, "num_workers": 4}"#,
    )
    .unwrap();
    let loader = registry.get_dataloader("train_simple_augm", options).unwrap();
    assert_eq!(loader.num_batches(), 2);

    let mut seen = 0;
    for batch in &loader {
        let batch = batch.unwrap();
        assert_eq!(&batch.inputs.dims()[1..], &[1, 128, 157]);
        assert_eq!(batch.labels.dims(), &[batch.len()]);
        seen += batch.len();
    }
    assert_eq!(seen, loader.dataset().len());
}
