//! Per-channel energy normalization (PCEN).
//!
//! Поведение совпадает с `librosa.pcen`: сглаживание IIR-фильтром первого
//! порядка вдоль времени с начальным состоянием, равным первому фрейму,
//! затем адаптивная компрессия `(S / (eps + M)^gain + bias)^power - bias^power`.

use birdclef_core::{PcenConfig, Spectrogram};

/// Коэффициент сглаживания `b` для постоянной времени в фреймах.
pub fn smoothing_coefficient(time_constant: f64, sample_rate: usize, hop_length: usize) -> f64 {
    let t_frames = time_constant * sample_rate as f64 / hop_length as f64;
    ((1.0 + 4.0 * t_frames * t_frames).sqrt() - 1.0) / (2.0 * t_frames * t_frames)
}

/// Apply PCEN to a mel power spectrogram `[mel][frame]`.
///
/// Input is multiplied by `config.input_scale` first. Computation runs in
/// `f64`; power-8 mel energies scaled by 2^31 overflow `f32` intermediates.
pub fn pcen(
    mel_power: &Spectrogram,
    config: &PcenConfig,
    sample_rate: usize,
    hop_length: usize,
) -> Spectrogram {
    let b = smoothing_coefficient(config.time_constant, sample_rate, hop_length);
    let bias_pow = config.bias.powf(config.power);

    let data = mel_power
        .data
        .iter()
        .map(|row| {
            let mut smooth = row.first().map_or(0.0, |&v| v as f64 * config.input_scale);
            row.iter()
                .map(|&v| {
                    let s = v as f64 * config.input_scale;
                    smooth = (1.0 - b) * smooth + b * s;

                    // exp(-gain * (log(eps) + log1p(M / eps))) == (eps + M)^-gain
                    let gain = (-config.gain * (config.eps.ln() + (smooth / config.eps).ln_1p())).exp();

                    let out = if config.power == 0.0 {
                        (s * gain).ln_1p()
                    } else if config.bias == 0.0 {
                        (config.power * (s.ln() + gain.ln())).exp()
                    } else {
                        bias_pow * (config.power * (s * gain / config.bias).ln_1p()).exp_m1()
                    };
                    out as f32
                })
                .collect()
        })
        .collect();

    Spectrogram::new(data)
}
