//! WAV (RIFF) decoding and encoding.
//!
//! Decoding accepts integer PCM (8, 16, 24, 32 bit) and IEEE float (32, 64
//! bit), including `WAVE_FORMAT_EXTENSIBLE` headers. Unknown chunks are
//! skipped. Encoding always writes 16-bit integer PCM.

use std::path::Path;

use crate::error::AudioError;
use crate::format::Format;

const FORMAT_PCM: u16 = 0x0001;
const FORMAT_FLOAT: u16 = 0x0003;
const FORMAT_EXTENSIBLE: u16 = 0xFFFE;

/// Decoded mono audio with samples normalized to [-1, 1].
#[derive(Debug, Clone)]
pub struct Pcm {
    /// Sample rate of `samples`; `channels` is always 1.
    pub format: Format,
    pub samples: Vec<f32>,
}

impl Pcm {
    /// Returns the duration in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.format.duration(self.samples.len()).as_secs_f64()
    }
}

/// Reads a WAV file into mono f32 samples.
///
/// Multichannel files keep only the first channel.
pub fn read_wav(path: impl AsRef<Path>) -> Result<Pcm, AudioError> {
    let path = path.as_ref();
    let decode_err = |reason: String| AudioError::Decode {
        path: path.to_path_buf(),
        reason,
    };

    let bytes = std::fs::read(path).map_err(|e| decode_err(e.to_string()))?;
    let wav = parse_riff(&bytes).map_err(decode_err)?;
    if wav.channels > 1 {
        tracing::warn!(
            path = %path.display(),
            channels = wav.channels,
            "audio has multiple channels, using the first one"
        );
    }
    wav.first_channel()
}

/// Encodes interleaved 16-bit samples as a WAV file image.
pub fn encode_wav(samples: &[i16], format: Format) -> Vec<u8> {
    let bits_per_sample = 16u16;
    let block_align = format.channels * bits_per_sample / 8;
    let byte_rate = format.sample_rate * u32::from(block_align);
    let data_size = (samples.len() * 2) as u32;

    let mut wav = Vec::with_capacity(44 + samples.len() * 2);
    wav.extend_from_slice(b"RIFF");
    wav.extend_from_slice(&(36 + data_size).to_le_bytes());
    wav.extend_from_slice(b"WAVE");

    wav.extend_from_slice(b"fmt ");
    wav.extend_from_slice(&16u32.to_le_bytes());
    wav.extend_from_slice(&FORMAT_PCM.to_le_bytes());
    wav.extend_from_slice(&format.channels.to_le_bytes());
    wav.extend_from_slice(&format.sample_rate.to_le_bytes());
    wav.extend_from_slice(&byte_rate.to_le_bytes());
    wav.extend_from_slice(&block_align.to_le_bytes());
    wav.extend_from_slice(&bits_per_sample.to_le_bytes());

    wav.extend_from_slice(b"data");
    wav.extend_from_slice(&data_size.to_le_bytes());
    for s in samples {
        wav.extend_from_slice(&s.to_le_bytes());
    }
    wav
}

/// Writes mono samples in [-1, 1] as a 16-bit PCM WAV file.
pub fn write_wav(path: impl AsRef<Path>, pcm: &Pcm) -> Result<(), AudioError> {
    let path = path.as_ref();
    let samples: Vec<i16> = pcm
        .samples
        .iter()
        .map(|&s| (s * 32767.0).clamp(-32768.0, 32767.0) as i16)
        .collect();
    let bytes = encode_wav(&samples, Format::mono(pcm.format.sample_rate));
    std::fs::write(path, bytes).map_err(|e| AudioError::Write {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// The parts of a RIFF file needed for decoding.
struct RiffWave<'a> {
    tag: u16,
    channels: u16,
    sample_rate: u32,
    bits_per_sample: u16,
    block_align: usize,
    data: &'a [u8],
}

fn parse_riff(bytes: &[u8]) -> Result<RiffWave<'_>, String> {
    if bytes.len() < 12 || &bytes[0..4] != b"RIFF" || &bytes[8..12] != b"WAVE" {
        return Err("missing RIFF/WAVE header".into());
    }

    let mut fmt: Option<&[u8]> = None;
    let mut data: Option<&[u8]> = None;
    let mut pos = 12;
    while pos + 8 <= bytes.len() {
        let id = &bytes[pos..pos + 4];
        let size = u32_at(bytes, pos + 4) as usize;
        let start = pos + 8;
        // Streaming writers may leave the size unset; clamp to what is there.
        let end = start.saturating_add(size).min(bytes.len());
        match id {
            b"fmt " => fmt = Some(&bytes[start..end]),
            b"data" => data = Some(&bytes[start..end]),
            _ => {}
        }
        pos = end + (size & 1);
    }

    let fmt = fmt.ok_or("missing fmt chunk")?;
    let data = data.ok_or("missing data chunk")?;
    if fmt.len() < 16 {
        return Err(format!("fmt chunk too short: {} bytes", fmt.len()));
    }

    let mut tag = u16_at(fmt, 0);
    let channels = u16_at(fmt, 2);
    let sample_rate = u32_at(fmt, 4);
    let block_align = u16_at(fmt, 12) as usize;
    let bits_per_sample = u16_at(fmt, 14);
    if tag == FORMAT_EXTENSIBLE {
        if fmt.len() < 26 {
            return Err("extensible fmt chunk too short".into());
        }
        tag = u16_at(fmt, 24);
    }
    if channels == 0 {
        return Err("zero channels".into());
    }
    if sample_rate == 0 {
        return Err("zero sample rate".into());
    }

    Ok(RiffWave {
        tag,
        channels,
        sample_rate,
        bits_per_sample,
        block_align,
        data,
    })
}

impl RiffWave<'_> {
    fn first_channel(&self) -> Result<Pcm, AudioError> {
        let width = usize::from(self.bits_per_sample / 8);
        let decode: fn(&[u8]) -> f32 = match (self.tag, self.bits_per_sample) {
            (FORMAT_PCM, 8) => |b| (f32::from(b[0]) - 128.0) / 128.0,
            (FORMAT_PCM, 16) => |b| f32::from(i16::from_le_bytes([b[0], b[1]])) / 32768.0,
            (FORMAT_PCM, 24) => |b| (i32::from_le_bytes([0, b[0], b[1], b[2]]) >> 8) as f32 / 8_388_608.0,
            (FORMAT_PCM, 32) => |b| i32::from_le_bytes([b[0], b[1], b[2], b[3]]) as f32 / 2_147_483_648.0,
            (FORMAT_FLOAT, 32) => |b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]),
            (FORMAT_FLOAT, 64) => |b| {
                f64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]) as f32
            },
            (tag, bits) => {
                return Err(AudioError::UnsupportedFormat(format!(
                    "format tag {tag:#06x} with {bits} bits per sample"
                )));
            }
        };

        let frame = self.block_align.max(width * usize::from(self.channels));
        let samples = self.data.chunks_exact(frame).map(|f| decode(&f[..width])).collect();
        Ok(Pcm {
            format: Format::mono(self.sample_rate),
            samples,
        })
    }
}

fn u16_at(b: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([b[at], b[at + 1]])
}

fn u32_at(b: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([b[at], b[at + 1], b[at + 2], b[at + 3]])
}
