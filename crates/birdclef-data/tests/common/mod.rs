//! Фикстуры: синтетические WAV и CSV во временной директории.

#![allow(dead_code)]

use std::f32::consts::PI;
use std::path::{Path, PathBuf};

use hound::{SampleFormat, WavSpec, WavWriter};

/// Чистая временная директория для одного теста.
pub fn temp_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("birdclef-data-{}-{}", name, std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

/// Моно-чирп 16-bit PCM: частота растёт от `f0` до `f1`.
pub fn write_chirp(path: &Path, sample_rate: u32, seconds: f32, f0: f32, f1: f32) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::create(path, spec).unwrap();
    let n = (sample_rate as f32 * seconds) as usize;
    let sr = sample_rate as f32;
    for i in 0..n {
        let t = i as f32 / sr;
        let freq = f0 + (f1 - f0) * t / seconds.max(1e-3) / 2.0;
        let v = (2.0 * PI * freq * t).sin() * 0.4;
        writer.write_sample((v * i16::MAX as f32) as i16).unwrap();
    }
    writer.finalize().unwrap();
}

/// Записать `<dir>/<source>/<split>_metadata.csv` с лишней колонкой `rating`.
pub fn write_metadata(dir: &Path, source: &str, split: &str, rows: &[(&str, &str)]) {
    let base = dir.join(source);
    std::fs::create_dir_all(&base).unwrap();
    let mut writer = csv::Writer::from_path(base.join(format!("{}_metadata.csv", split))).unwrap();
    writer
        .write_record(["primary_label", "filename", "rating"])
        .unwrap();
    for (label, filename) in rows {
        writer.write_record([*label, *filename, "4.0"]).unwrap();
    }
    writer.flush().unwrap();
}

pub const TRAIN_ROWS: [(&str, &str); 7] = [
    ("barswa", "barswa/XC1.wav"),
    ("abethr1", "abethr1/XC2.wav"),
    ("thrnig1", "thrnig1/XC3.wav"),
    ("wlwwar", "wlwwar/XC4.wav"),
    ("comsan", "comsan/XC5.wav"),
    ("barswa", "barswa/XC6.wav"),
    ("eaywag1", "eaywag1/XC7.wav"),
];

pub const VAL_ROWS: [(&str, &str); 3] = [
    ("barswa", "barswa/XC8.wav"),
    ("comsan", "comsan/XC9.wav"),
    ("thrnig1", "thrnig1/XC10.wav"),
];

pub const TEST_ROWS: [(&str, &str); 2] = [
    ("wlwwar", "wlwwar/XC11.wav"),
    ("abethr1", "abethr1/XC12.wav"),
];

/// Полный набор: `base` метаданные в `<root>/data`, аудио в `<root>/audio`.
///
/// Возвращает `(data_dir, audio_root)`.
pub fn write_dataset(root: &Path) -> (PathBuf, PathBuf) {
    let data_dir = root.join("data");
    let audio_root = root.join("audio");
    write_metadata(&data_dir, "base", "train", &TRAIN_ROWS);
    write_metadata(&data_dir, "base", "val", &VAL_ROWS);
    write_metadata(&data_dir, "base", "test", &TEST_ROWS);

    for (i, (_, filename)) in TRAIN_ROWS
        .iter()
        .chain(VAL_ROWS.iter())
        .chain(TEST_ROWS.iter())
        .enumerate()
    {
        let seconds = 0.5 + 0.25 * (i % 4) as f32;
        write_chirp(&audio_root.join(filename), 32000, seconds, 1000.0, 6000.0);
    }
    (data_dir, audio_root)
}
