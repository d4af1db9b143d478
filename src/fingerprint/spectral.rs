//! Spectral-feature fingerprint.
//!
//! The leading window is decoded to mono, resampled to the analysis rate and
//! cut into 2048-point Hann frames with a 512-sample hop. Per-frame features
//! are averaged over the window and concatenated into a 29-value vector:
//!
//! | values | feature                                   |
//! |--------|-------------------------------------------|
//! | 1      | spectral centroid (fraction of Nyquist)   |
//! | 1      | 85% rolloff (fraction of Nyquist)         |
//! | 1      | zero-crossing rate                        |
//! | 13     | MFCC (40 mel bands, dB, DCT-II) / 100     |
//! | 12     | chroma, per-frame max-normalized          |
//! | 1      | tempo / 200 BPM                           |
//!
//! The vector is L2-normalized, rounded to two decimals and hashed with
//! BLAKE3. This tolerates tiny numeric differences but it is a heuristic:
//! equal fingerprints mean "very likely the same recording", nothing more.

use std::f32::consts::PI;
use std::path::Path;

use super::decode;
use super::fft::{hann_window, Fft};
use super::{Computed, Deadline, FingerprintError};

pub const FRAME_SIZE: usize = 2048;
pub const HOP_SIZE: usize = 512;
pub const MEL_BANDS: usize = 40;
pub const MFCC_COUNT: usize = 13;
pub const CHROMA_BINS: usize = 12;
pub const FEATURE_LEN: usize = 3 + MFCC_COUNT + CHROMA_BINS + 1;

const ROLLOFF_FRACTION: f32 = 0.85;
const QUANTIZATION: f32 = 100.0;
const MIN_BPM: f32 = 60.0;
const MAX_BPM: f32 = 200.0;
/// Frames between deadline checks.
const DEADLINE_STRIDE: usize = 64;

/// Analysis parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectralConfig {
    pub sample_rate: u32,
    pub window_secs: f64,
}

impl SpectralConfig {
    #[must_use]
    pub fn new(sample_rate: u32, window_secs: f64) -> Self {
        Self {
            sample_rate,
            window_secs,
        }
    }
}

impl Default for SpectralConfig {
    fn default() -> Self {
        Self::new(22_050, 30.0)
    }
}

/// Time-averaged features of one window.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectralFeatures {
    pub centroid: f32,
    pub rolloff: f32,
    pub zero_crossing_rate: f32,
    pub mfcc: [f32; MFCC_COUNT],
    pub chroma: [f32; CHROMA_BINS],
    pub tempo_bpm: f32,
}

impl SpectralFeatures {
    /// Raw concatenated vector (before normalization).
    #[must_use]
    pub fn to_vector(&self) -> Vec<f32> {
        let mut v = Vec::with_capacity(FEATURE_LEN);
        v.push(self.centroid);
        v.push(self.rolloff);
        v.push(self.zero_crossing_rate);
        v.extend(self.mfcc.iter().map(|c| c / 100.0));
        v.extend_from_slice(&self.chroma);
        v.push(self.tempo_bpm / MAX_BPM);
        v
    }

    /// Hex BLAKE3 digest of the normalized, quantized vector.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        hash_vector(&self.to_vector())
    }
}

/// L2-normalize `vector`; an all-zero vector is returned unchanged.
#[must_use]
pub fn l2_normalize(vector: &[f32]) -> Vec<f32> {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm <= f32::EPSILON || !norm.is_finite() {
        return vector.iter().map(|v| if v.is_finite() { *v } else { 0.0 }).collect();
    }
    vector.iter().map(|v| v / norm).collect()
}

/// Normalize, quantize to two decimals and hash.
#[must_use]
pub fn hash_vector(vector: &[f32]) -> String {
    let mut hasher = blake3::Hasher::new();
    for value in l2_normalize(vector) {
        let quantized = (value * QUANTIZATION).round() as i32;
        hasher.update(&quantized.to_le_bytes());
    }
    hasher.finalize().to_hex().to_string()
}

/// Fingerprint the leading window of `path`.
pub(crate) fn fingerprint(path: &Path, config: &SpectralConfig, deadline: &Deadline) -> Result<Computed, FingerprintError> {
    let audio = decode::load_window(path, config.window_secs, config.sample_rate, deadline)?;
    let features = extract_features(&audio.samples, audio.sample_rate, deadline)?;
    Ok(Computed {
        fingerprint: features.fingerprint(),
        duration_secs: audio.duration_secs(),
    })
}

/// Compute the averaged features of mono `samples` at `sample_rate`.
pub fn extract_features(samples: &[f32], sample_rate: u32, deadline: &Deadline) -> Result<SpectralFeatures, FingerprintError> {
    if samples.is_empty() || sample_rate == 0 {
        return Err(FingerprintError::EmptyStream);
    }

    let analyzer = Analyzer::new(sample_rate);
    let frames = frame_starts(samples.len());
    let mut sums = FrameSums::default();
    let mut flux = Vec::with_capacity(frames.len());
    let mut previous: Option<Vec<f32>> = None;
    let mut frame = vec![0.0f32; FRAME_SIZE];

    for (i, &start) in frames.iter().enumerate() {
        if i % DEADLINE_STRIDE == 0 {
            deadline.check()?;
        }

        let end = (start + FRAME_SIZE).min(samples.len());
        frame.fill(0.0);
        frame[..end - start].copy_from_slice(&samples[start..end]);

        sums.zcr += zero_crossing_rate(&frame[..end - start]);
        for (x, w) in frame.iter_mut().zip(&analyzer.window) {
            *x *= w;
        }

        let power = analyzer.fft.power_spectrum(&frame);
        let magnitude: Vec<f32> = power.iter().map(|p| p.sqrt()).collect();

        sums.centroid += analyzer.centroid(&magnitude);
        sums.rolloff += analyzer.rolloff(&magnitude);
        for (acc, c) in sums.mfcc.iter_mut().zip(analyzer.mfcc(&power)) {
            *acc += c;
        }
        for (acc, c) in sums.chroma.iter_mut().zip(analyzer.chroma(&power)) {
            *acc += c;
        }

        if let Some(prev) = &previous {
            flux.push(
                magnitude
                    .iter()
                    .zip(prev)
                    .map(|(now, before)| (now - before).max(0.0))
                    .sum::<f32>(),
            );
        }
        previous = Some(magnitude);
    }

    let count = frames.len() as f32;
    let frame_rate = sample_rate as f32 / HOP_SIZE as f32;
    Ok(SpectralFeatures {
        centroid: sums.centroid / count,
        rolloff: sums.rolloff / count,
        zero_crossing_rate: sums.zcr / count,
        mfcc: sums.mfcc.map(|c| c / count),
        chroma: sums.chroma.map(|c| c / count),
        tempo_bpm: estimate_tempo(&flux, frame_rate),
    })
}

#[derive(Default)]
struct FrameSums {
    centroid: f32,
    rolloff: f32,
    zcr: f32,
    mfcc: [f32; MFCC_COUNT],
    chroma: [f32; CHROMA_BINS],
}

/// Frame start offsets; short inputs get a single zero-padded frame.
fn frame_starts(len: usize) -> Vec<usize> {
    if len <= FRAME_SIZE {
        return vec![0];
    }
    (0..=len - FRAME_SIZE).step_by(HOP_SIZE).collect()
}

fn zero_crossing_rate(samples: &[f32]) -> f32 {
    if samples.len() < 2 {
        return 0.0;
    }
    let crossings = samples
        .windows(2)
        .filter(|w| (w[0] >= 0.0) != (w[1] >= 0.0))
        .count();
    crossings as f32 / samples.len() as f32
}

/// Autocorrelation of the onset envelope over the 60-200 BPM lag range.
fn estimate_tempo(onsets: &[f32], frame_rate: f32) -> f32 {
    let min_lag = (60.0 * frame_rate / MAX_BPM).floor().max(1.0) as usize;
    let max_lag = (60.0 * frame_rate / MIN_BPM).ceil() as usize;
    if onsets.len() <= max_lag {
        return 0.0;
    }

    let mean = onsets.iter().sum::<f32>() / onsets.len() as f32;
    let centered: Vec<f32> = onsets.iter().map(|o| o - mean).collect();

    let mut best: Option<(usize, f32)> = None;
    for lag in min_lag..=max_lag {
        let score: f32 = centered.iter().zip(&centered[lag..]).map(|(a, b)| a * b).sum();
        if score > 0.0 && best.map_or(true, |(_, s)| score > s) {
            best = Some((lag, score));
        }
    }

    best.map_or(0.0, |(lag, _)| 60.0 * frame_rate / lag as f32)
}

/// Precomputed per-rate tables.
struct Analyzer {
    fft: Fft,
    window: Vec<f32>,
    frequencies: Vec<f32>,
    nyquist: f32,
    mel_filters: Vec<Vec<f32>>,
    dct: Vec<Vec<f32>>,
    pitch_classes: Vec<Option<usize>>,
}

impl Analyzer {
    fn new(sample_rate: u32) -> Self {
        let bins = FRAME_SIZE / 2 + 1;
        let sr = sample_rate as f32;
        let frequencies: Vec<f32> = (0..bins).map(|k| k as f32 * sr / FRAME_SIZE as f32).collect();
        let pitch_classes = frequencies
            .iter()
            .map(|&f| {
                (f >= 27.5).then(|| {
                    let semitones = (12.0 * (f / 440.0).log2()).round() as i32 + 9;
                    semitones.rem_euclid(12) as usize
                })
            })
            .collect();

        Self {
            fft: Fft::new(FRAME_SIZE),
            window: hann_window(FRAME_SIZE),
            mel_filters: mel_filterbank(sr, bins),
            dct: dct_matrix(),
            frequencies,
            nyquist: sr / 2.0,
            pitch_classes,
        }
    }

    fn centroid(&self, magnitude: &[f32]) -> f32 {
        let total: f32 = magnitude.iter().sum();
        if total <= f32::EPSILON {
            return 0.0;
        }
        let weighted: f32 = magnitude.iter().zip(&self.frequencies).map(|(m, f)| m * f).sum();
        weighted / total / self.nyquist
    }

    fn rolloff(&self, magnitude: &[f32]) -> f32 {
        let total: f32 = magnitude.iter().sum();
        if total <= f32::EPSILON {
            return 0.0;
        }
        let threshold = total * ROLLOFF_FRACTION;
        let mut cumulative = 0.0;
        for (m, f) in magnitude.iter().zip(&self.frequencies) {
            cumulative += m;
            if cumulative >= threshold {
                return f / self.nyquist;
            }
        }
        1.0
    }

    fn mfcc(&self, power: &[f32]) -> [f32; MFCC_COUNT] {
        let log_mel: Vec<f32> = self
            .mel_filters
            .iter()
            .map(|filter| {
                let energy: f32 = filter.iter().zip(power).map(|(w, p)| w * p).sum();
                10.0 * (energy + 1e-10).log10()
            })
            .collect();

        let mut out = [0.0; MFCC_COUNT];
        for (coef, basis) in out.iter_mut().zip(&self.dct) {
            *coef = basis.iter().zip(&log_mel).map(|(b, m)| b * m).sum();
        }
        out
    }

    fn chroma(&self, power: &[f32]) -> [f32; CHROMA_BINS] {
        let mut out = [0.0; CHROMA_BINS];
        for (p, class) in power.iter().zip(&self.pitch_classes) {
            if let Some(class) = class {
                out[*class] += p;
            }
        }
        let max = out.iter().copied().fold(0.0f32, f32::max);
        if max > f32::EPSILON {
            for c in &mut out {
                *c /= max;
            }
        }
        out
    }
}

fn hz_to_mel(hz: f32) -> f32 {
    2595.0 * (1.0 + hz / 700.0).log10()
}

fn mel_to_hz(mel: f32) -> f32 {
    700.0 * (10f32.powf(mel / 2595.0) - 1.0)
}

/// Triangular HTK-style mel filters spanning 0 Hz to Nyquist.
fn mel_filterbank(sample_rate: f32, bins: usize) -> Vec<Vec<f32>> {
    let max_mel = hz_to_mel(sample_rate / 2.0);
    let edges: Vec<f32> = (0..MEL_BANDS + 2)
        .map(|i| mel_to_hz(max_mel * i as f32 / (MEL_BANDS + 1) as f32))
        .collect();
    let bin_hz = sample_rate / FRAME_SIZE as f32;

    (0..MEL_BANDS)
        .map(|band| {
            let (lo, center, hi) = (edges[band], edges[band + 1], edges[band + 2]);
            (0..bins)
                .map(|k| {
                    let f = k as f32 * bin_hz;
                    if f <= lo || f >= hi {
                        0.0
                    } else if f <= center {
                        (f - lo) / (center - lo)
                    } else {
                        (hi - f) / (hi - center)
                    }
                })
                .collect()
        })
        .collect()
}

/// Orthonormal DCT-II basis, `MFCC_COUNT` x `MEL_BANDS`.
fn dct_matrix() -> Vec<Vec<f32>> {
    let n = MEL_BANDS as f32;
    (0..MFCC_COUNT)
        .map(|k| {
            let scale = if k == 0 { (1.0 / n).sqrt() } else { (2.0 / n).sqrt() };
            (0..MEL_BANDS)
                .map(|m| scale * (PI * k as f32 * (m as f32 + 0.5) / n).cos())
                .collect()
        })
        .collect()
}
