//! Integration tests: WAV → mono → resample → mel → dB / PCEN.

use std::f32::consts::PI;
use std::path::PathBuf;

use audio::{
    amplitude_to_db, load_wav, loader::to_mono, pcen, MelSpectrogramExtractor, Resampler,
};
use birdclef_core::FeatureConfig;
use hound::{SampleFormat, WavSpec, WavWriter};

fn fixtures_dir() -> PathBuf {
    let dir = std::env::temp_dir().join(format!("birdclef-audio-it-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

/// Стерео-синус, 16-bit PCM.
fn write_stereo_sine(path: &PathBuf, freq: f32, sample_rate: u32, seconds: f32) {
    let spec = WavSpec {
        channels: 2,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::create(path, spec).unwrap();
    let n = (sample_rate as f32 * seconds) as usize;
    for i in 0..n {
        let v = (2.0 * PI * freq * i as f32 / sample_rate as f32).sin() * 0.5;
        let s = (v * i16::MAX as f32) as i16;
        writer.write_sample(s).unwrap();
        writer.write_sample(s).unwrap();
    }
    writer.finalize().unwrap();
}

/// Mel bin with the most energy, averaged over time.
fn peak_bin(data: &[Vec<f32>]) -> usize {
    data.iter()
        .map(|row| row.iter().sum::<f32>() / row.len() as f32)
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(i, _)| i)
        .unwrap()
}

#[test]
fn test_resampled_tone_lands_in_same_mel_bin() {
    let dir = fixtures_dir();
    let native = dir.join("tone_32k.wav");
    let low_rate = dir.join("tone_16k.wav");
    write_stereo_sine(&native, 3000.0, 32000, 2.0);
    write_stereo_sine(&low_rate, 3000.0, 16000, 2.0);

    let config = FeatureConfig::default();
    let extractor = MelSpectrogramExtractor::new(config.clone());
    let resampler = Resampler::new(config.sample_rate);

    let a = resampler
        .resample(&to_mono(&load_wav(&native).expect("Failed to load WAV")))
        .expect("Resampling failed");
    let b = resampler
        .resample(&to_mono(&load_wav(&low_rate).expect("Failed to load WAV")))
        .expect("Resampling failed");

    assert_eq!(a.sample_rate, 32000);
    assert_eq!(b.sample_rate, 32000);
    assert!((a.samples.len() as i64 - b.samples.len() as i64).abs() <= 2);

    let mel_a = amplitude_to_db(&extractor.extract(&a.samples));
    let mel_b = amplitude_to_db(&extractor.extract(&b.samples));

    eprintln!(
        "📊 peak bins: native={}, resampled={}",
        peak_bin(&mel_a.data),
        peak_bin(&mel_b.data)
    );
    assert!((peak_bin(&mel_a.data) as i64 - peak_bin(&mel_b.data) as i64).abs() <= 1);
}

#[test]
fn test_mel_statistics_sanity() {
    let dir = fixtures_dir();
    let path = dir.join("tone_stats.wav");
    write_stereo_sine(&path, 2000.0, 32000, 5.0);

    let config = FeatureConfig::default();
    let buffer = to_mono(&load_wav(&path).expect("Failed to load WAV"));
    let extractor = MelSpectrogramExtractor::new(config.clone());
    let mel = extractor.extract(&buffer.samples);

    assert_eq!(mel.num_bins(), 128);
    assert_eq!(mel.num_frames(), config.target_frames());

    let db = amplitude_to_db(&mel);
    let values: Vec<f32> = db.data.iter().flatten().copied().collect();
    let min = values.iter().cloned().fold(f32::INFINITY, f32::min);
    let max = values.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    let mean = values.iter().sum::<f32>() / values.len() as f32;

    eprintln!("📈 dB stats: min={:.2} max={:.2} mean={:.2}", min, max, mean);

    assert!(min >= -100.0 - 1e-3, "dB floor is 10*log10(1e-10)");
    assert!(max > 0.0, "power-8 tone must exceed 0 dB");
    assert!(mean.is_finite());

    let normalized = pcen(&mel, &config.pcen, config.sample_rate, config.hop_length);
    assert_eq!(normalized.num_bins(), mel.num_bins());
    assert_eq!(normalized.num_frames(), mel.num_frames());
    assert!(normalized.data.iter().flatten().all(|v| v.is_finite() && *v >= 0.0));
}
