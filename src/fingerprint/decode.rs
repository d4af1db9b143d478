//! Decoding to mono PCM with symphonia and resampling with rubato.

use std::fs::File;
use std::io::ErrorKind;
use std::path::Path;

use rubato::{FastFixedIn, PolynomialDegree, Resampler};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use super::{Deadline, FingerprintError, TimedReader};

/// Mono samples in `[-1, 1]` at `sample_rate`.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct DecodedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl DecodedAudio {
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / f64::from(self.sample_rate)
    }
}

impl MediaSource for TimedReader<File> {
    fn is_seekable(&self) -> bool {
        true
    }

    fn byte_len(&self) -> Option<u64> {
        self.get_ref().metadata().ok().map(|m| m.len())
    }
}

fn map_symphonia(path: &Path, error: SymphoniaError, deadline: &Deadline) -> FingerprintError {
    match error {
        SymphoniaError::IoError(e) => deadline.map_io(path, e),
        SymphoniaError::Unsupported(what) => FingerprintError::Unsupported(what.to_string()),
        SymphoniaError::DecodeError(what) => FingerprintError::Decode(what.to_string()),
        other => FingerprintError::Decode(other.to_string()),
    }
}

/// Decode at most `max_secs` of the first audio track of `path`, mixed to mono.
///
/// Packets the codec rejects are skipped; the deadline is checked before
/// every packet.
pub(crate) fn decode_mono(path: &Path, max_secs: f64, deadline: &Deadline) -> Result<DecodedAudio, FingerprintError> {
    let file = File::open(path).map_err(|e| FingerprintError::from_io(path, e))?;
    let mss = MediaSourceStream::new(Box::new(TimedReader::new(file, *deadline)), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| map_symphonia(path, e, deadline))?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| FingerprintError::Unsupported("no decodable audio track".to_string()))?;
    let track_id = track.id;
    let mut sample_rate = track.codec_params.sample_rate;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| map_symphonia(path, e, deadline))?;

    let mut mono: Vec<f32> = Vec::new();
    let mut buffer: Option<SampleBuffer<f32>> = None;

    loop {
        deadline.check()?;

        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == ErrorKind::UnexpectedEof => break,
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(map_symphonia(path, e, deadline)),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(msg)) => {
                log::trace!("Skipping undecodable packet in {}: {}", path.display(), msg);
                continue;
            }
            Err(e) => return Err(map_symphonia(path, e, deadline)),
        };

        let spec = *decoded.spec();
        let rate = *sample_rate.get_or_insert(spec.rate);
        let channels = spec.channels.count().max(1);
        let needed = decoded.capacity() * channels;

        if buffer.as_ref().map_or(true, |b| b.capacity() < needed) {
            buffer = Some(SampleBuffer::new(decoded.capacity() as u64, spec));
        }
        if let Some(buf) = buffer.as_mut() {
            buf.copy_interleaved_ref(decoded);
            for frame in buf.samples().chunks(channels) {
                mono.push(frame.iter().sum::<f32>() / channels as f32);
            }
        }

        let limit = (max_secs * f64::from(rate)) as usize;
        if limit > 0 && mono.len() >= limit {
            mono.truncate(limit);
            break;
        }
    }

    let sample_rate = sample_rate.unwrap_or(0);
    if mono.is_empty() || sample_rate == 0 {
        return Err(FingerprintError::EmptyStream);
    }

    Ok(DecodedAudio {
        samples: mono,
        sample_rate,
    })
}

/// Resample to `target_rate`; a no-op when the rate already matches.
pub(crate) fn resample(audio: DecodedAudio, target_rate: u32) -> Result<DecodedAudio, FingerprintError> {
    if audio.sample_rate == target_rate || audio.samples.is_empty() {
        return Ok(audio);
    }

    let ratio = f64::from(target_rate) / f64::from(audio.sample_rate);
    let mut resampler = FastFixedIn::<f32>::new(ratio, 1.0, PolynomialDegree::Septic, audio.samples.len(), 1)
        .map_err(|e| FingerprintError::Decode(format!("resampler setup: {e}")))?;

    let mut output = resampler
        .process(&[audio.samples.as_slice()], None)
        .map_err(|e| FingerprintError::Decode(format!("resampling: {e}")))?;

    let samples = output.pop().unwrap_or_default();
    if samples.is_empty() {
        return Err(FingerprintError::EmptyStream);
    }

    Ok(DecodedAudio {
        samples,
        sample_rate: target_rate,
    })
}

/// Decode the leading window of `path` and bring it to `target_rate`.
pub(crate) fn load_window(
    path: &Path,
    window_secs: f64,
    target_rate: u32,
    deadline: &Deadline,
) -> Result<DecodedAudio, FingerprintError> {
    let decoded = decode_mono(path, window_secs, deadline)?;
    log::trace!(
        "Decoded {:.2}s at {} Hz from {}",
        decoded.duration_secs(),
        decoded.sample_rate,
        path.display()
    );
    deadline.check()?;
    resample(decoded, target_rate)
}
