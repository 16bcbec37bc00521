//! Audio file loading.
//!
//! WAV goes through `hound` (with seeking), everything else (OGG/Vorbis,
//! FLAC, MP3) through `symphonia`.

use birdclef_core::{AudioBuffer, AudioInfo, BirdClefError, BirdResult};
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use std::fs::File;
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::debug;

fn is_wav(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("wav"))
}

/// Сохраняем `NotFound` как I/O-ошибку, остальное — как ошибку аудио.
fn hound_error(e: hound::Error, what: &str) -> BirdClefError {
    match e {
        hound::Error::IoError(io) => BirdClefError::Io(io),
        other => BirdClefError::Audio(format!("{}: {}", what, other)),
    }
}

/// Read sample rate, channel count and length without decoding the file.
pub fn probe_audio(path: impl AsRef<Path>) -> BirdResult<AudioInfo> {
    let path = path.as_ref();
    if is_wav(path) {
        let reader = WavReader::open(path).map_err(|e| hound_error(e, "Failed to open WAV"))?;
        let spec = reader.spec();
        return Ok(AudioInfo {
            sample_rate: spec.sample_rate as usize,
            channels: spec.channels as usize,
            num_frames: Some(reader.duration() as u64),
        });
    }

    let format = open_format(path)?;
    let track = format
        .default_track()
        .ok_or_else(|| BirdClefError::Audio(format!("No audio tracks in {}", path.display())))?;
    let params = &track.codec_params;
    let sample_rate = params
        .sample_rate
        .ok_or_else(|| BirdClefError::Audio(format!("Unknown sample rate: {}", path.display())))?;

    Ok(AudioInfo {
        sample_rate: sample_rate as usize,
        channels: params.channels.map(|c| c.count()).unwrap_or(1),
        num_frames: params.n_frames,
    })
}

/// Load a whole audio file.
pub fn load_audio(path: impl AsRef<Path>) -> BirdResult<AudioBuffer> {
    load_segment(path, 0, None)
}

/// Load a WAV file and return an AudioBuffer.
pub fn load_wav(path: impl AsRef<Path>) -> BirdResult<AudioBuffer> {
    load_wav_segment(path.as_ref(), 0, None)
}

/// Загрузить фрагмент файла: `num_frames` фреймов начиная с `offset`.
///
/// Если файл короче, возвращается столько фреймов, сколько есть
/// (возможно, ноль). `None` — до конца файла.
pub fn load_segment(
    path: impl AsRef<Path>,
    offset: u64,
    num_frames: Option<usize>,
) -> BirdResult<AudioBuffer> {
    let path = path.as_ref();
    if is_wav(path) {
        load_wav_segment(path, offset, num_frames)
    } else {
        load_symphonia_segment(path, offset, num_frames)
    }
}

fn load_wav_segment(path: &Path, offset: u64, num_frames: Option<usize>) -> BirdResult<AudioBuffer> {
    let mut reader =
        WavReader::open(path).map_err(|e| hound_error(e, "Failed to open WAV"))?;

    let spec = reader.spec();
    let sample_rate = spec.sample_rate as usize;
    let channels = spec.channels as usize;

    let start = offset.min(reader.duration() as u64) as u32;
    reader
        .seek(start)
        .map_err(|e| BirdClefError::Audio(format!("Failed to seek WAV: {}", e)))?;

    let limit = num_frames.map_or(usize::MAX, |n| n.saturating_mul(channels));

    let samples: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader
            .into_samples::<f32>()
            .take(limit)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| BirdClefError::Audio(format!("Failed to read samples: {}", e)))?,
        SampleFormat::Int => {
            let bits = spec.bits_per_sample;
            let max_val = (1u32 << (bits - 1)) as f32;
            reader
                .into_samples::<i32>()
                .take(limit)
                .map(|s| s.map(|v| v as f32 / max_val))
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| BirdClefError::Audio(format!("Failed to read samples: {}", e)))?
        }
    };

    Ok(AudioBuffer::new(samples, sample_rate, channels))
}

fn open_format(path: &Path) -> BirdResult<Box<dyn FormatReader>> {
    let file = File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| {
            BirdClefError::Audio(format!("Failed to probe {}: {}", path.display(), e))
        })?;

    Ok(probed.format)
}

/// Декодирование через symphonia: пропускаем первые `offset` фреймов и
/// останавливаемся, как только набрали нужное количество.
fn load_symphonia_segment(
    path: &Path,
    offset: u64,
    num_frames: Option<usize>,
) -> BirdResult<AudioBuffer> {
    let mut format = open_format(path)?;
    let track = format
        .default_track()
        .ok_or_else(|| BirdClefError::Audio(format!("No audio tracks in {}", path.display())))?;

    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| BirdClefError::Audio(format!("Unknown sample rate: {}", path.display())))?
        as usize;
    let mut channels = track.codec_params.channels.map(|c| c.count()).unwrap_or(1);
    let track_id = track.id;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| BirdClefError::Audio(format!("Failed to create decoder: {}", e)))?;

    let mut skip = offset as usize * channels;
    let limit = num_frames.map_or(usize::MAX, |n| n.saturating_mul(channels));
    let mut samples = Vec::new();

    while samples.len() < limit {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(BirdClefError::Audio(format!("Decode error: {}", e))),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(SymphoniaError::DecodeError(e)) => {
                debug!("Skipping corrupt packet in {}: {}", path.display(), e);
                continue;
            }
            Err(e) => return Err(BirdClefError::Audio(format!("Decode error: {}", e))),
        };

        let spec = *decoded.spec();
        channels = spec.channels.count();
        let capacity = decoded.capacity() as u64;
        let mut sample_buf = SampleBuffer::<f32>::new(capacity, spec);
        sample_buf.copy_interleaved_ref(decoded);

        let mut chunk = sample_buf.samples();
        if skip > 0 {
            let n = skip.min(chunk.len());
            chunk = &chunk[n..];
            skip -= n;
        }
        let room = limit - samples.len();
        samples.extend_from_slice(&chunk[..chunk.len().min(room)]);
    }

    Ok(AudioBuffer::new(samples, sample_rate, channels))
}

/// Convert stereo audio to mono by averaging channels.
pub fn to_mono(buffer: &AudioBuffer) -> AudioBuffer {
    if buffer.channels <= 1 {
        return buffer.clone();
    }

    let mono_samples: Vec<f32> = buffer
        .samples
        .chunks(buffer.channels)
        .map(|chunk| chunk.iter().sum::<f32>() / chunk.len() as f32)
        .collect();

    AudioBuffer::new(mono_samples, buffer.sample_rate, 1)
}

/// Write mono samples as a 32-bit float WAV file.
pub fn save_wav(path: impl AsRef<Path>, samples: &[f32], sample_rate: usize) -> BirdResult<()> {
    let spec = WavSpec {
        channels: 1,
        sample_rate: sample_rate as u32,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };
    let mut writer = WavWriter::create(path.as_ref(), spec)
        .map_err(|e| hound_error(e, "Failed to create WAV"))?;
    for &s in samples {
        writer
            .write_sample(s)
            .map_err(|e| hound_error(e, "Failed to write sample"))?;
    }
    writer
        .finalize()
        .map_err(|e| hound_error(e, "Failed to finalize WAV"))?;
    Ok(())
}
