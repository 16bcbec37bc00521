//! Audio resampling.

use birdclef_core::{AudioBuffer, BirdClefError, BirdResult};
use rubato::{FftFixedInOut, Resampler as RubatoResampler};
use tracing::debug;

/// Audio resampler for converting sample rates.
#[derive(Debug, Clone, Copy)]
pub struct Resampler {
    target_sample_rate: usize,
}

impl Resampler {
    /// Create a new resampler with target sample rate.
    pub fn new(target_sample_rate: usize) -> Self {
        Self { target_sample_rate }
    }

    pub fn target_sample_rate(&self) -> usize {
        self.target_sample_rate
    }

    /// Resample audio buffer to target sample rate.
    ///
    /// Equal rates return the input unchanged.
    pub fn resample(&self, buffer: &AudioBuffer) -> BirdResult<AudioBuffer> {
        if buffer.sample_rate == self.target_sample_rate {
            return Ok(buffer.clone());
        }

        // Ensure mono audio
        if buffer.channels != 1 {
            return Err(BirdClefError::Audio(
                "Resampling requires mono audio. Use to_mono() first.".to_string(),
            ));
        }

        debug!(
            "Resampling {} samples: {} Hz -> {} Hz",
            buffer.samples.len(),
            buffer.sample_rate,
            self.target_sample_rate
        );

        let ratio = self.target_sample_rate as f64 / buffer.sample_rate as f64;

        let mut resampler = FftFixedInOut::<f32>::new(
            buffer.sample_rate,
            self.target_sample_rate,
            1024,
            1, // mono
        )
        .map_err(|e| BirdClefError::Audio(format!("Failed to create resampler: {}", e)))?;

        // FftFixedInOut подбирает размер входного чанка сам (кратный НОД частот).
        let chunk_size = resampler.input_frames_next();
        let output_chunk_size = resampler.output_frames_next();

        let mut output = Vec::with_capacity((buffer.samples.len() as f64 * ratio) as usize + 1);

        // Process in chunks
        let mut pos = 0;
        while pos + chunk_size <= buffer.samples.len() {
            let input_chunk = vec![buffer.samples[pos..pos + chunk_size].to_vec()];
            let output_chunk = resampler
                .process(&input_chunk, None)
                .map_err(|e| BirdClefError::Audio(format!("Resampling failed: {}", e)))?;
            output.extend_from_slice(&output_chunk[0]);
            pos += chunk_size;
        }

        // Handle remaining samples (pad with zeros if needed)
        if pos < buffer.samples.len() {
            let mut remaining = buffer.samples[pos..].to_vec();
            remaining.resize(chunk_size, 0.0);
            let input_chunk = vec![remaining];
            let output_chunk = resampler
                .process(&input_chunk, None)
                .map_err(|e| BirdClefError::Audio(format!("Resampling failed: {}", e)))?;

            // Only take the proportional amount of output
            let remaining_ratio = (buffer.samples.len() - pos) as f64 / chunk_size as f64;
            let take = (output_chunk_size as f64 * remaining_ratio) as usize;
            output.extend_from_slice(&output_chunk[0][..take.min(output_chunk[0].len())]);
        }

        Ok(AudioBuffer::new(output, self.target_sample_rate, 1))
    }
}

impl Default for Resampler {
    fn default() -> Self {
        Self::new(32000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resampler_no_change() {
        let samples: Vec<f32> = (0..1024).map(|i| (i as f32 * 0.01).sin()).collect();
        let buffer = AudioBuffer::new(samples, 32000, 1);
        let resampler = Resampler::new(32000);
        let result = resampler.resample(&buffer).unwrap();

        assert_eq!(result.sample_rate, 32000);
        assert_eq!(result.samples, buffer.samples);
    }

    #[test]
    fn test_resampler_upsamples_length() {
        let buffer = AudioBuffer::new(vec![0.1; 16000], 16000, 1);
        let result = Resampler::new(32000).resample(&buffer).unwrap();

        assert_eq!(result.sample_rate, 32000);
        let expected = 32000_i64;
        assert!((result.samples.len() as i64 - expected).abs() <= 2);
    }

    #[test]
    fn test_resampler_rejects_stereo() {
        let buffer = AudioBuffer::new(vec![0.0; 200], 16000, 2);
        assert!(Resampler::new(32000).resample(&buffer).is_err());
    }
}
