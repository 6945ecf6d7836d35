//! Audio decoding for channel assets
//!
//! WAV is always decodable via hound. MP3/FLAC/OGG need the
//! `symphonia-decode` feature. The session only needs the length of the
//! media, so `probe_audio` reads headers and leaves the samples alone.

use std::io::Cursor;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};

/// Decoded audio
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    /// Interleaved samples (L, R, L, R, ...)
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    /// Number of channels (1 = mono, 2 = stereo)
    pub channels: u8,
}

impl DecodedAudio {
    /// Total number of frames (samples per channel)
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.samples.len() / self.channels as usize
        }
    }

    /// Playing time of the media
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frames() as f64 / self.sample_rate as f64)
    }
}

/// Stream parameters read without decoding samples
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioInfo {
    pub sample_rate: u32,
    pub channels: u8,
    /// Samples per channel
    pub frames: u64,
}

impl AudioInfo {
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frames as f64 / self.sample_rate as f64)
    }
}

impl From<&DecodedAudio> for AudioInfo {
    fn from(decoded: &DecodedAudio) -> Self {
        Self {
            sample_rate: decoded.sample_rate,
            channels: decoded.channels,
            frames: decoded.frames() as u64,
        }
    }
}

/// Read WAV stream parameters from the header
pub fn probe_wav(data: &[u8]) -> Result<AudioInfo> {
    let reader = hound::WavReader::new(Cursor::new(data)).context("failed to parse WAV header")?;
    let spec = reader.spec();
    let frames = reader.duration() as u64;

    // The header may promise more than the file holds
    let bytes_per_frame = u64::from(spec.bits_per_sample.div_ceil(8)) * u64::from(spec.channels);
    if bytes_per_frame == 0 || frames * bytes_per_frame > data.len() as u64 {
        return Err(anyhow!(
            "WAV data chunk is truncated ({frames} frames declared, {} bytes present)",
            data.len()
        ));
    }

    Ok(AudioInfo {
        sample_rate: spec.sample_rate,
        channels: spec.channels as u8,
        frames,
    })
}

/// Decode WAV audio using hound
pub fn decode_wav(data: &[u8]) -> Result<DecodedAudio> {
    let reader = hound::WavReader::new(Cursor::new(data)).context("failed to parse WAV header")?;

    let spec = reader.spec();
    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<Result<Vec<_>, _>>()
            .context("failed to read float samples")?,
        hound::SampleFormat::Int => {
            let max_val = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / max_val))
                .collect::<Result<Vec<_>, _>>()
                .context("failed to read int samples")?
        }
    };

    Ok(DecodedAudio {
        samples,
        sample_rate: spec.sample_rate,
        channels: spec.channels as u8,
    })
}

/// Decode audio using symphonia (MP3, FLAC, OGG, ...)
#[cfg(feature = "symphonia-decode")]
pub fn decode_audio_symphonia(data: &[u8]) -> Result<DecodedAudio> {
    use symphonia::core::audio::SampleBuffer;
    use symphonia::core::codecs::DecoderOptions;
    use symphonia::core::formats::FormatOptions;
    use symphonia::core::io::MediaSourceStream;
    use symphonia::core::meta::MetadataOptions;
    use symphonia::core::probe::Hint;

    let mss = MediaSourceStream::new(Box::new(Cursor::new(data.to_vec())), Default::default());

    let probed = symphonia::default::get_probe()
        .format(
            &Hint::new(),
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .context("failed to probe audio format")?;

    let mut format = probed.format;
    let track = format
        .default_track()
        .ok_or_else(|| anyhow!("no audio track found"))?;

    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| anyhow!("no sample rate"))?;
    let channels = track
        .codec_params
        .channels
        .map(|c| c.count() as u8)
        .unwrap_or(2);

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .context("failed to create decoder")?;
    let track_id = track.id;

    let mut samples: Vec<f32> = Vec::new();
    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(symphonia::core::errors::Error::IoError(e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => return Err(e).context("failed to read packet"),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = decoder.decode(&packet).context("failed to decode packet")?;
        let spec = *decoded.spec();
        let mut sample_buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        sample_buf.copy_interleaved_ref(decoded);
        samples.extend(sample_buf.samples());
    }

    Ok(DecodedAudio {
        samples,
        sample_rate,
        channels,
    })
}

/// Read the length of MP3/FLAC/OGG media from container metadata, falling
/// back to a full decode when the container does not say
#[cfg(feature = "symphonia-decode")]
pub fn probe_audio_symphonia(data: &[u8]) -> Result<AudioInfo> {
    use symphonia::core::formats::FormatOptions;
    use symphonia::core::io::MediaSourceStream;
    use symphonia::core::meta::MetadataOptions;
    use symphonia::core::probe::Hint;

    let mss = MediaSourceStream::new(Box::new(Cursor::new(data.to_vec())), Default::default());
    let probed = symphonia::default::get_probe()
        .format(
            &Hint::new(),
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .context("failed to probe audio format")?;

    let track = probed
        .format
        .default_track()
        .ok_or_else(|| anyhow!("no audio track found"))?;
    let params = &track.codec_params;

    match (params.sample_rate, params.n_frames) {
        (Some(sample_rate), Some(frames)) => Ok(AudioInfo {
            sample_rate,
            channels: params.channels.map(|c| c.count() as u8).unwrap_or(2),
            frames,
        }),
        _ => decode_audio_symphonia(data).map(|decoded| AudioInfo::from(&decoded)),
    }
}

/// Read stream parameters from raw bytes without decoding, where the
/// format allows it
pub fn probe_audio(data: &[u8]) -> Result<AudioInfo> {
    if data.len() >= 4 && &data[0..4] == b"RIFF" {
        return probe_wav(data);
    }

    #[cfg(feature = "symphonia-decode")]
    {
        probe_audio_symphonia(data)
    }

    #[cfg(not(feature = "symphonia-decode"))]
    {
        Err(anyhow!(
            "unsupported audio format (enable symphonia-decode feature for MP3/FLAC)"
        ))
    }
}

/// Decode audio from raw bytes
///
/// Tries WAV first, then symphonia formats if the feature is enabled.
pub fn decode_audio(data: &[u8]) -> Result<DecodedAudio> {
    if data.len() >= 4 && &data[0..4] == b"RIFF" {
        return decode_wav(data);
    }

    #[cfg(feature = "symphonia-decode")]
    {
        decode_audio_symphonia(data)
    }

    #[cfg(not(feature = "symphonia-decode"))]
    {
        Err(anyhow!(
            "unsupported audio format (enable symphonia-decode feature for MP3/FLAC)"
        ))
    }
}

/// Synthesize a sine-wave WAV in memory. Used by tests and demo assets.
pub fn sine_wav(freq: f32, duration_secs: f32, sample_rate: u32) -> Result<Vec<u8>> {
    let num_samples = (sample_rate as f32 * duration_secs) as usize;
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
        for i in 0..num_samples {
            let t = i as f32 / sample_rate as f32;
            let sample = (2.0 * std::f32::consts::PI * freq * t).sin();
            writer.write_sample((sample * i16::MAX as f32) as i16)?;
        }
        writer.finalize()?;
    }

    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_wav_mono() {
        let wav = sine_wav(440.0, 0.1, 48000).unwrap();
        let decoded = decode_wav(&wav).unwrap();

        assert_eq!(decoded.channels, 1);
        assert_eq!(decoded.sample_rate, 48000);
        assert_eq!(decoded.frames(), 4800);
    }

    #[test]
    fn test_duration() {
        let wav = sine_wav(220.0, 0.5, 8000).unwrap();
        let decoded = decode_audio(&wav).unwrap();
        assert_eq!(decoded.duration(), Duration::from_millis(500));
    }

    #[test]
    fn test_decode_audio_detects_wav() {
        let wav = sine_wav(440.0, 0.1, 44100).unwrap();
        let decoded = decode_audio(&wav).unwrap();
        assert_eq!(decoded.sample_rate, 44100);
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(decode_audio(b"RIFFnot really a wav file").is_err());
        assert!(decode_audio(b"plain text").is_err());
    }

    #[test]
    fn test_probe_matches_full_decode() {
        let wav = sine_wav(330.0, 0.25, 16000).unwrap();
        let probed = probe_audio(&wav).unwrap();
        let decoded = decode_audio(&wav).unwrap();

        assert_eq!(probed, AudioInfo::from(&decoded));
        assert_eq!(probed.frames, 4000);
        assert_eq!(probed.duration(), Duration::from_millis(250));
    }

    #[test]
    fn test_probe_rejects_truncated_data() {
        let wav = sine_wav(440.0, 0.5, 8000).unwrap();
        let cut = &wav[..wav.len() / 2];
        assert!(probe_wav(cut).is_err());
        assert!(probe_audio(b"plain text").is_err());
    }

    #[test]
    fn test_probe_header_only_wav() {
        let wav = sine_wav(440.0, 0.0, 8000).unwrap();
        let probed = probe_wav(&wav).unwrap();
        assert_eq!(probed.frames, 0);
        assert_eq!(probed.duration(), Duration::ZERO);
    }

    #[test]
    fn test_empty_audio_has_zero_duration() {
        let decoded = DecodedAudio {
            samples: vec![],
            sample_rate: 0,
            channels: 0,
        };
        assert_eq!(decoded.frames(), 0);
        assert_eq!(decoded.duration(), Duration::ZERO);
    }
}
