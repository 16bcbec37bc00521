//! # audio
//!
//! Audio processing module for the BirdCLEF feature pipeline.
//!
//! This crate handles:
//! - Audio decoding (WAV via hound, OGG/FLAC/MP3 via symphonia) and WAV saving
//! - Audio resampling to the target sample rate (32kHz)
//! - STFT / ISTFT and mel spectrogram extraction
//! - Amplitude scaling: decibels or PCEN
//! - Augmentations, phase-vocoder time stretch and Griffin-Lim

pub mod augment;
pub mod griffin_lim;
pub mod loader;
pub mod mel;
pub mod pcen;
pub mod resample;
pub mod stft;
pub mod stretch;

pub use griffin_lim::GriffinLim;
pub use loader::{load_audio, load_segment, load_wav, probe_audio, save_wav, to_mono};
pub use mel::{amplitude_to_db, db_to_power, MelFilterbank, MelSpectrogramExtractor};
pub use pcen::pcen;
pub use resample::Resampler;
pub use stretch::regularize_length;
