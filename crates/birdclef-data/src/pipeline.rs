//! Feature pipeline: audio file → fixed-shape mel tensor.

use std::path::Path;

use audio::augment::{add_noise, frequency_mask};
use audio::{
    amplitude_to_db, db_to_power, load_segment, pcen, probe_audio, regularize_length, to_mono,
    GriffinLim, MelSpectrogramExtractor, Resampler,
};
use birdclef_core::{
    AudioBuffer, BirdClefError, BirdResult, FeatureConfig, PipelineSwitches, Spectrogram,
};
use candle_core::{Device, Tensor};
use rand::Rng;
use tracing::debug;

/// Feature pipeline for one dataset.
///
/// Combines all steps:
/// 1. Load a clip (optionally from a random offset) and downmix to mono
/// 2. Resample to the target rate
/// 3. Waveform augmentation (Gaussian noise, 10 dB SNR)
/// 4. Mel spectrogram (`|STFT|^power`)
/// 5. Spectral augmentation (frequency masking)
/// 6. Decibels or PCEN
/// 7. Time-stretch / crop to the target frame count
///
/// Конфигурация неизменна после создания, поэтому пайплайн можно делить
/// между потоками.
#[derive(Debug, Clone)]
pub struct FeaturePipeline {
    config: FeatureConfig,
    switches: PipelineSwitches,
    extractor: MelSpectrogramExtractor,
    resampler: Resampler,
    device: Device,
}

impl FeaturePipeline {
    /// Create a pipeline from a feature config and the three switches.
    pub fn new(config: FeatureConfig, switches: PipelineSwitches) -> BirdResult<Self> {
        config.validate()?;
        Ok(Self {
            extractor: MelSpectrogramExtractor::new(config.clone()),
            resampler: Resampler::new(config.sample_rate),
            config,
            switches,
            device: Device::Cpu,
        })
    }

    /// Pipeline with the default BirdCLEF configuration.
    pub fn with_switches(switches: PipelineSwitches) -> BirdResult<Self> {
        Self::new(FeatureConfig::default(), switches)
    }

    pub fn config(&self) -> &FeatureConfig {
        &self.config
    }

    pub fn switches(&self) -> PipelineSwitches {
        self.switches
    }

    /// Число фреймов на выходе: `seconds * sample_rate / hop_length + 1`.
    pub fn target_frames(&self) -> usize {
        self.config.target_frames()
    }

    /// Run the pipeline on a file using the thread-local RNG.
    ///
    /// Returns a tensor of shape `[1, n_mels, target_frames]`.
    pub fn transform(&self, path: impl AsRef<Path>) -> BirdResult<Tensor> {
        let mut rng = rand::thread_rng();
        self.transform_with_rng(path, &mut rng)
    }

    /// Same as [`FeaturePipeline::transform`] with an explicit RNG.
    pub fn transform_with_rng<R: Rng + ?Sized>(
        &self,
        path: impl AsRef<Path>,
        rng: &mut R,
    ) -> BirdResult<Tensor> {
        let path = path.as_ref();
        let buffer = self.load_clip(path, rng)?;
        let features = self.features(&buffer, rng)?;
        features.to_tensor(&self.device)
    }

    /// Шаг 1: загрузить `clip_samples` фреймов, при необходимости со случайного смещения.
    fn load_clip<R: Rng + ?Sized>(&self, path: &Path, rng: &mut R) -> BirdResult<AudioBuffer> {
        let clip = self.config.clip_samples();

        let offset = if self.switches.random_offset {
            match probe_audio(path)?.num_frames {
                Some(total) if total > clip as u64 => rng.gen_range(0..total - clip as u64),
                Some(_) => 0,
                None => {
                    debug!("{}: unknown length, loading from the start", path.display());
                    0
                }
            }
        } else {
            0
        };

        let buffer = load_segment(path, offset, Some(clip))?;
        Ok(to_mono(&buffer))
    }

    /// Шаги 2–7 над уже загруженным моно-буфером.
    pub fn features<R: Rng + ?Sized>(
        &self,
        buffer: &AudioBuffer,
        rng: &mut R,
    ) -> BirdResult<Spectrogram> {
        let augment = self.config.augment;

        if buffer.sample_rate != self.resampler.target_sample_rate() {
            debug!(
                "Wrong sample rate {} Hz: resampling audio to {} Hz",
                buffer.sample_rate,
                self.resampler.target_sample_rate()
            );
        }
        let mut waveform = self.resampler.resample(&to_mono(buffer))?;

        if self.switches.augment && rng.gen_bool(augment.probability) {
            add_noise(&mut waveform.samples, augment.noise_snr_db, rng);
        }

        let mut mel = self.extractor.extract(&waveform.samples);

        if self.switches.augment && rng.gen_bool(augment.probability) {
            let band = frequency_mask(&mut mel, augment.freq_mask_param, rng);
            debug!("Frequency mask over mel bins {:?}", band);
        }

        let scaled = if self.switches.pcen {
            pcen(
                &mel,
                &self.config.pcen,
                self.config.sample_rate,
                self.config.hop_length,
            )
        } else {
            amplitude_to_db(&mel)
        };

        let frames = scaled.num_frames();
        let target = self.target_frames();
        if birdclef_core::debug::enabled() {
            eprintln!(
                "DEBUG pipeline: samples={} mel_frames={} target={} pcen={}",
                waveform.samples.len(),
                frames,
                target,
                self.switches.pcen
            );
        }

        Ok(regularize_length(scaled, target, self.config.hop_length))
    }

    /// Диагностическая реконструкция waveform из dB-признаков.
    ///
    /// Обрезает до `target_frames`, переводит дБ в мощность, обращает
    /// mel-фильтры (NNLS) и восстанавливает фазу Griffin-Lim. С потерями.
    pub fn inverse_transform(&self, mel: &Tensor) -> BirdResult<Vec<f32>> {
        if self.switches.pcen {
            return Err(BirdClefError::Config(
                "inverse transform requires decibel-scaled features, PCEN is not invertible"
                    .into(),
            ));
        }

        let mut spec = Spectrogram::from_tensor(mel)?;
        let target = self.target_frames();
        for row in spec.data.iter_mut() {
            row.truncate(target);
        }

        let power = db_to_power(&spec);
        let linear = self
            .extractor
            .filterbank()
            .inverse(&power, self.config.griffin_lim.inverse_mel_iter);

        let griffin_lim = GriffinLim::new(
            self.config.n_fft,
            self.config.hop_length,
            self.config.power,
            self.config.griffin_lim,
        );
        Ok(griffin_lim.reconstruct(&linear))
    }
}
